//! Core types for recordchain
//!
//! This crate defines the foundational types used by the record engine:
//! - Value: scalar attribute values
//! - Error: error type hierarchy
//! - Id: temporary id allocation and id classification
//! - Config: per-record configuration and engine policies
//! - Schema: record kinds, attribute sentinels, relation descriptors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod id;
pub mod schema;
pub mod value;

pub use config::{
    ConfigOverride, EngineConfig, ReadinessPolicy, RecordConfig, TemporaryIdPolicy,
    CONFIG_FILE_NAME,
};
pub use error::{Error, Result};
pub use id::{is_empty_id, is_permanent_id, is_temporary_id, next_temporary_id, IdAllocator};
pub use schema::{AttributeDef, AttributeType, RecordKind, RecordKindBuilder, RelationDescriptor};
pub use value::Value;
