//! Core addresses, constants, traits, and error types.
//!
//! This module has no dependency on the other layers and defines the
//! abstractions they plug into.

mod address;
mod constants;
mod error;
mod traits;

pub use address::*;
pub use constants::*;
pub use error::*;
pub use traits::*;
