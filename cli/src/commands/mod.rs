pub mod filter;
pub mod inspect;
