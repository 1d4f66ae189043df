pub mod crypto;
pub mod sanitize;
