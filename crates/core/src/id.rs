//! Temporary id allocation and id classification
//!
//! Two id regimes share one attribute:
//!
//! - **Temporary**: a strictly negative `Int` minted locally before any
//!   backing store has seen the record. Never zero, never reused.
//! - **Permanent**: anything an external authority hands back, normally a
//!   positive `Int` or an opaque `String` token.
//!
//! "Empty" ids (`Null`, `0`, `""`) count as not supplied.

use crate::value::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Generator of unique temporary ids
///
/// Ids are strictly decreasing, starting at `-1`.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    /// Create an allocator whose first id is `-1`
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(-1),
        }
    }

    /// Mint the next temporary id
    pub fn next_id(&self) -> i64 {
        self.next.fetch_sub(1, Ordering::Relaxed)
    }

    /// Peek at the id the next call will return
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static TEMPORARY_IDS: IdAllocator = IdAllocator::new();

/// Mint a process-unique temporary id
pub fn next_temporary_id() -> i64 {
    TEMPORARY_IDS.next_id()
}

/// `true` for temporary (negative integer) ids
pub fn is_temporary_id(id: &Value) -> bool {
    matches!(id, Value::Int(i) if *i < 0)
}

/// `true` for ids that count as "not supplied"
pub fn is_empty_id(id: &Value) -> bool {
    match id {
        Value::Null => true,
        Value::Int(0) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// `true` for ids issued by an external authority
pub fn is_permanent_id(id: &Value) -> bool {
    !is_temporary_id(id) && !is_empty_id(id)
}
