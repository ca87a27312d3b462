//! Data Models
//!
//! Configuration and result structures shared across services.

pub mod result;
pub mod settings;

pub use result::*;
pub use settings::*;
