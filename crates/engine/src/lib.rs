//! Record versioning engine for recordchain
//!
//! This crate turns the core types into live records:
//! - Record: immutable versions, merge, identity transitions
//! - EventRegistry: per-chain `id-set` / `can-be-created` listeners
//! - Binder: relation subscriptions and foreign-key denormalization
//! - Dispatcher: deferred event firing
//! - Engine: context that creates records and drains their events
//!
//! Events never fire inside the call that caused them. Callers drain the
//! engine with [`Engine::run_pending`] once their own work is done.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod binder;
pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod record;

pub use dispatcher::{Dispatcher, DispatcherStats};
pub use engine::Engine;
pub use events::{CanBeCreatedListener, EventRegistry, IdSetEvent, IdSetListener, ListenerId};
pub use record::{Attribute, Attributes, Patch, PlainObject, Record};

pub use recordchain_core::{
    AttributeDef, AttributeType, ConfigOverride, EngineConfig, Error, ReadinessPolicy,
    RecordConfig, RecordKind, RecordKindBuilder, RelationDescriptor, Result, TemporaryIdPolicy,
    Value,
};
