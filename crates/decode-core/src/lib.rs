//! Decode core crate - shared types, error taxonomy, configuration, and the
//! call policy used for every external service request.

pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::DecodeConfig;
pub use error::{DecodeError, ErrorCategory, Result, ServiceError};
pub use policy::{call_with_retry, CallPolicy};
pub use types::*;
