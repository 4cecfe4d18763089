/// Hardware unique key confidentiality.
pub mod c003;
