/// Counter contract across a provoked reset.
pub mod v001;
