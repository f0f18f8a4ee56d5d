pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod model;
pub mod store;

// re-export the pieces tests and the binary reach for most
pub use crate::error::{ReconError, Result};
pub use crate::model::*;
