//! Request-level models shared by the HTTP layer
//!
//! Invalid input returns ValidationError, not panic.

pub mod validation;

pub use validation::{require, ValidationError};
