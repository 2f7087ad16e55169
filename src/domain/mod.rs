//! # Domain Layer
//!
//! Source records, embedding documents, sync bookkeeping and the text
//! rendering that turns a record into something worth embedding.
//! This layer is independent of external frameworks and infrastructure.

mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
