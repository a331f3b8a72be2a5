//! Type definitions for jcop-remote

pub mod atr;
pub mod error;
pub mod status;

pub use atr::Atr;
pub use error::{Error, Result};
pub use status::StatusWord;
