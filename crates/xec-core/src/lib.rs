//! # xec-core
//! Foundation types, scripts and traits for the XEC wallet.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod slp;
pub mod traits;
pub mod types;
