/// Free SRAM block scan and fill.
pub mod b007;
