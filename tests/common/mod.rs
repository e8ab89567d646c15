//! Shared test utilities for the integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

pub use recordchain::{
    Attribute, ConfigOverride, Engine, EngineConfig, Error, IdSetEvent, ListenerId, Patch,
    ReadinessPolicy, Record, RecordConfig, RecordKind, RelationDescriptor, TemporaryIdPolicy,
    Value,
};
pub use recordchain_core::AttributeType;

// ============================================================================
// Initialization
// ============================================================================

/// Route `tracing` output through the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

/// Plain record without relations
pub static USER: Lazy<Arc<RecordKind>> = Lazy::new(|| {
    RecordKind::builder("User")
        .attribute("id", AttributeType::Id)
        .attribute("name", AttributeType::String)
        .build()
});

/// Plain record without relations
pub static IMAGE: Lazy<Arc<RecordKind>> = Lazy::new(|| {
    RecordKind::builder("Image")
        .attribute("id", AttributeType::Id)
        .attribute("url", AttributeType::String)
        .build()
});

/// Depends on a `User` (denormalized into `userId`) and an `Image` (kept as a
/// nested record)
pub static PROFILE_IMAGE: Lazy<Arc<RecordKind>> = Lazy::new(|| {
    RecordKind::builder("ProfileImage")
        .attribute("id", AttributeType::Id)
        .attribute("name", AttributeType::String)
        .attribute("userId", AttributeType::Number)
        .relation(RelationDescriptor::new("User").foreign_key("userId"))
        .relation(RelationDescriptor::new("Image"))
        .build()
});

/// Engine with the strict readiness policy
pub fn strict_engine() -> Engine {
    Engine::with_config(EngineConfig {
        readiness: ReadinessPolicy::Strict,
        ..EngineConfig::default()
    })
    .expect("strict config is valid")
}

/// Engine that omits temporary ids from serialized output
pub fn omitting_engine() -> Engine {
    Engine::with_config(EngineConfig {
        temporary_ids: TemporaryIdPolicy::Omit,
        ..EngineConfig::default()
    })
    .expect("omit config is valid")
}

/// Integer id of a record
pub fn int_id(record: &Record) -> i64 {
    record
        .id()
        .and_then(Value::as_int)
        .expect("record has an integer id")
}

/// JSON form of a record
pub fn json(record: &Record) -> serde_json::Value {
    record.to_json()
}

// ============================================================================
// Recorder - collects listener calls
// ============================================================================

/// Ordered log of listener calls, shareable into `Send` closures
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.calls.lock().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// `id-set` listener that logs `label` with the new id
    pub fn id_set(&self, label: &'static str) -> impl FnOnce(IdSetEvent) + Send + 'static {
        let recorder = self.clone();
        move |event| {
            let id = event.record.id().cloned().unwrap_or(Value::Null);
            recorder.push(format!("{label}:{id}"));
        }
    }

    /// `can-be-created` listener that logs `label`
    pub fn can_be_created(&self, label: &'static str) -> impl FnOnce(Record) + Send + 'static {
        let recorder = self.clone();
        move |_| recorder.push(label)
    }
}
