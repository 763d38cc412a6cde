//! Mekan Common Types and Utilities
//!
//! Shared entities, configuration, and error handling for the restaurant
//! directory services.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::MekanConfig;
pub use error::{Error, Result};
pub use types::ValidationErrors;
