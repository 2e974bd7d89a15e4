//! Schema contracts for tool input and output.
//!
//! A schema type is a serde data type plus semantic checks that the type
//! system cannot express (non-empty collections, numeric ranges). Parsing
//! raw JSON into the type is the structural half of validation and
//! [`Schema::check`] is the semantic half.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A semantic rule violated by an otherwise well-formed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SchemaViolation(pub String);

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Data type usable as a tool input or output.
pub trait Schema: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Check semantic constraints. The default accepts any parsed value.
    fn check(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), SchemaViolation> {
    if condition {
        Ok(())
    } else {
        Err(SchemaViolation(message()))
    }
}
