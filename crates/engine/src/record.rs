//! Versioned records
//!
//! A [`Record`] is one immutable version of a logical entity. Every mutation
//! goes through [`Record::merge`], which returns a *new* `Record` and leaves
//! the receiver untouched. Versions of one entity share an
//! [`EventRegistry`]; nothing else crosses version boundaries.
//!
//! ## Identity
//!
//! A record without an id gets a temporary (negative) one at construction.
//! The backing store later merges in the permanent id, which fires the
//! chain's `id-set` listeners on the next dispatcher drain. Once permanent,
//! the id never changes.
//!
//! ## Relations
//!
//! Associations may hold other records that are still new. The relation
//! binder subscribes to their `id-set` events, denormalizes their permanent
//! id into the declared foreign key when it arrives, and fires this record's
//! `can-be-created` listeners once every relation is resolved.
//!
//! ## Invariants
//!
//! - A permanent id is never replaced by a different one (`IdConflict`)
//! - A merge that changes nothing returns the same instance
//! - Every listener fires at most once
//! - Snapshots are never mutated after construction

use crate::binder::{self, Binding};
use crate::engine::Engine;
use crate::events::{self, EventRegistry, IdSetEvent, ListenerId};
use parking_lot::Mutex;
use recordchain_core::{
    is_empty_id, is_permanent_id, is_temporary_id, next_temporary_id, ConfigOverride, Error,
    ReadinessPolicy, RecordConfig, RecordKind, Result, TemporaryIdPolicy, Value,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Attribute snapshot: a persistent ordered map with structural sharing
pub type Attributes = im::OrdMap<String, Attribute>;

/// Serialized form of a record
pub type PlainObject = BTreeMap<String, Value>;

// ============================================================================
// Attribute
// ============================================================================

/// One attribute value: a scalar, or a related record
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Scalar value (including denormalized foreign keys)
    Value(Value),
    /// Related record, typically one that has no permanent id yet
    Record(Record),
}

impl Attribute {
    /// Scalar value, if this is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(v) => Some(v),
            Attribute::Record(_) => None,
        }
    }

    /// Related record, if this is one
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Attribute::Record(r) => Some(r),
            Attribute::Value(_) => None,
        }
    }

    /// `true` for related records
    pub fn is_record(&self) -> bool {
        matches!(self, Attribute::Record(_))
    }
}

// Records compare by identity: two handles are equal only if they are the
// same version.
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Attribute::Value(a), Attribute::Value(b)) => a == b,
            (Attribute::Record(a), Attribute::Record(b)) => Record::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Record> for Attribute {
    fn from(r: Record) -> Self {
        Attribute::Record(r)
    }
}

impl From<&Record> for Attribute {
    fn from(r: &Record) -> Self {
        Attribute::Record(r.clone())
    }
}

macro_rules! attribute_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Attribute {
                fn from(v: $ty) -> Self {
                    Attribute::Value(Value::from(v))
                }
            }
        )*
    };
}

attribute_from_value!(Value, bool, i32, i64, u32, f64, &str, String, ());

// ============================================================================
// Patch
// ============================================================================

/// Ordered partial data for construction and merge
///
/// Later entries for the same name win.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    entries: Vec<(String, Attribute)>,
}

impl Patch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Attribute>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add an entry
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Attribute>) {
        self.entries.push((name.into(), value.into()));
    }

    /// The effective value for `name`
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the patch has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Patch
where
    K: Into<String>,
    V: Into<Attribute>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Patch {
    type Item = (String, Attribute);
    type IntoIter = std::vec::IntoIter<(String, Attribute)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// Record
// ============================================================================

/// One immutable snapshot.
///
/// The registry only points at the chain head weakly. A version produced by
/// the relation binder has no caller to own it, so the version it replaced
/// keeps it alive through `successor`. Ownership therefore runs from the
/// handles callers hold towards newer versions, and dropping those handles
/// frees the chain even when two records relate to each other.
pub(crate) struct Version {
    pub(crate) kind: Arc<RecordKind>,
    pub(crate) config: RecordConfig,
    pub(crate) data: Attributes,
    pub(crate) revision: u64,
    pub(crate) bindings: Mutex<Vec<Binding>>,
    successor: Mutex<Option<Arc<Version>>>,
}

impl Drop for Version {
    fn drop(&mut self) {
        if !self.bindings.get_mut().is_empty() {
            binder::unbind(self);
        }
    }
}

/// Handle to one version of a logical record
///
/// Cloning is cheap and yields the same version.
#[derive(Clone)]
pub struct Record {
    chain: Arc<EventRegistry>,
    version: Arc<Version>,
}

impl Record {
    /// Build a version on `chain`, minting a temporary id if needed, and bind
    /// its unresolved relations. The new version becomes the chain head.
    pub(crate) fn construct(
        chain: Arc<EventRegistry>,
        kind: Arc<RecordKind>,
        config: RecordConfig,
        mut data: Attributes,
    ) -> Record {
        let needs_id = match data.get(&config.id_attribute) {
            None => true,
            Some(Attribute::Value(id)) => is_empty_id(id),
            Some(Attribute::Record(_)) => false,
        };
        if needs_id {
            let id = next_temporary_id();
            trace!(target: "recordchain::merge", kind = kind.name(), id, "Minted temporary id");
            data.insert(config.id_attribute.clone(), Attribute::Value(Value::Int(id)));
        }

        let data = binder::denormalize(&kind, data);
        let version = Arc::new(Version {
            kind,
            config,
            data,
            revision: chain.next_revision(),
            bindings: Mutex::new(Vec::new()),
            successor: Mutex::new(None),
        });
        binder::bind(&chain, &version);
        chain.set_head(&version);
        Record { chain, version }
    }

    pub(crate) fn from_parts(chain: Arc<EventRegistry>, version: Arc<Version>) -> Record {
        Record { chain, version }
    }

    pub(crate) fn registry_arc(&self) -> &Arc<EventRegistry> {
        &self.chain
    }

    pub(crate) fn version(&self) -> &Arc<Version> {
        &self.version
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get an attribute
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.version.data.get(name)
    }

    /// Get a scalar attribute
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Attribute::as_value)
    }

    /// Get a related record
    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Attribute::as_record)
    }

    /// Current value of the id attribute
    pub fn id(&self) -> Option<&Value> {
        self.get_value(&self.version.config.id_attribute)
    }

    /// The full attribute snapshot
    pub fn snapshot(&self) -> &Attributes {
        &self.version.data
    }

    /// Record kind
    pub fn kind(&self) -> &RecordKind {
        &self.version.kind
    }

    /// Record configuration of this version
    pub fn config(&self) -> &RecordConfig {
        &self.version.config
    }

    /// Position of this version in its chain, starting at 0
    pub fn revision(&self) -> u64 {
        self.version.revision
    }

    /// The chain's event registry
    pub fn registry(&self) -> &EventRegistry {
        &self.chain
    }

    /// Engine this record belongs to
    pub fn engine(&self) -> Engine {
        Engine::from_shared(Arc::clone(self.chain.engine()))
    }

    /// The newest version of this record's chain
    ///
    /// Versions produced by the readiness cascade are only reachable through
    /// here. If the head itself has been dropped, this is the newest version
    /// this handle still keeps alive.
    pub fn latest(&self) -> Record {
        let version = match self.chain.head() {
            Some(head) => head,
            None => {
                let mut version = Arc::clone(&self.version);
                loop {
                    let next = version.successor.lock().clone();
                    match next {
                        Some(next) => version = next,
                        None => break,
                    }
                }
                version
            }
        };
        Record::from_parts(Arc::clone(&self.chain), version)
    }

    /// `true` if `a` and `b` are the same version
    pub fn ptr_eq(a: &Record, b: &Record) -> bool {
        Arc::ptr_eq(&a.version, &b.version)
    }

    /// `true` if both handles belong to the same logical record
    pub fn same_chain(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.chain, &other.chain)
    }

    /// `true` if `previous` differs from this version's snapshot
    pub fn is_changed(&self, previous: &Attributes) -> bool {
        !previous.ptr_eq(&self.version.data) && !same_attributes(previous, &self.version.data)
    }

    // ========================================================================
    // Identity and readiness
    // ========================================================================

    /// `true` while the record has no permanent id (or is forced temporary)
    pub fn is_new_record(&self) -> bool {
        self.version.config.force_temporary || self.id().map_or(false, is_temporary_id)
    }

    /// `true` once the record carries its permanent id
    pub fn is_resolved(&self) -> bool {
        !self.is_new_record()
    }

    /// `true` when every relation is absent or points at a permanent record
    ///
    /// Evaluated fresh on every call.
    pub fn can_be_created(&self) -> bool {
        self.version.kind.relations().iter().all(|relation| {
            match self.version.data.get(&relation.association) {
                Some(Attribute::Record(related)) => !related.is_new_record(),
                _ => true,
            }
        })
    }

    /// Record that the backing store has been asked to create this entity
    ///
    /// The flag is shared by every version of the chain.
    pub fn mark_create_called(&self) {
        self.chain.mark_create_called();
    }

    /// `true` once [`Record::mark_create_called`] ran on any version
    pub fn is_create_called(&self) -> bool {
        self.chain.is_create_called()
    }

    /// `true` for new records nobody has asked the backing store to create
    pub fn create_needs_to_be_called(&self) -> bool {
        self.is_new_record() && !self.is_create_called()
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge `patch` over this version.
    ///
    /// See [`Record::merge_with_config`].
    pub fn merge(&self, patch: Patch) -> Result<Record> {
        self.merge_with_config(patch, &ConfigOverride::default())
    }

    /// Merge `patch` and `overrides` over this version.
    ///
    /// Returns `self` (the same instance) when nothing changes. Otherwise
    /// returns a new version sharing this chain's registry. Its relation
    /// subscriptions replace this version's. A temporary-to-permanent
    /// transition schedules the chain's `id-set` listeners. A transition to
    /// ready schedules its `can-be-created` listeners.
    ///
    /// Empty id values (`Null`, `0`, `""`) in `patch` are ignored.
    ///
    /// # Errors
    ///
    /// `IdConflict` if the record already has a permanent id and `patch`
    /// carries a different non-empty one. Nothing changes on error.
    pub fn merge_with_config(&self, patch: Patch, overrides: &ConfigOverride) -> Result<Record> {
        let current_id_attribute = &self.version.config.id_attribute;
        if !self.is_new_record() {
            if let Some(Attribute::Value(attempted)) = patch.get(current_id_attribute) {
                let existing = self.id().cloned().unwrap_or(Value::Null);
                if !is_empty_id(attempted) && *attempted != existing {
                    debug!(
                        target: "recordchain::merge",
                        kind = self.kind().name(),
                        %existing,
                        %attempted,
                        "Rejected id change"
                    );
                    return Err(Error::id_conflict(
                        current_id_attribute.clone(),
                        existing,
                        attempted.clone(),
                    ));
                }
            }
        }

        let config = self.version.config.merged(overrides);
        let mut data = self.version.data.clone();
        for (name, value) in patch {
            let empty_id = name == config.id_attribute
                && matches!(&value, Attribute::Value(id) if is_empty_id(id));
            if empty_id {
                continue;
            }
            data.insert(name, value);
        }
        let data = binder::denormalize(&self.version.kind, data);

        if config == self.version.config && same_attributes(&data, &self.version.data) {
            trace!(target: "recordchain::merge", kind = self.kind().name(), "Merge changed nothing");
            return Ok(self.clone());
        }

        let next = self.supersede(data, config);
        debug!(
            target: "recordchain::merge",
            kind = next.kind().name(),
            id = ?next.id(),
            revision = next.revision(),
            "Merged new version"
        );
        Ok(next)
    }

    /// Produce the next version from already-merged data, migrate relation
    /// subscriptions and schedule whatever transitions occurred.
    pub(crate) fn supersede(&self, data: Attributes, config: RecordConfig) -> Record {
        let next = Record::construct(
            Arc::clone(&self.chain),
            Arc::clone(&self.version.kind),
            config,
            data,
        );
        binder::unbind(&self.version);

        if self.is_new_record() && !next.is_new_record() {
            debug!(
                target: "recordchain::merge",
                kind = next.kind().name(),
                id = ?next.id(),
                "Id became permanent"
            );
            events::schedule_id_set(&next, self);
        }
        if next.is_new_record() && !self.can_be_created() && next.can_be_created() {
            debug!(
                target: "recordchain::merge",
                kind = next.kind().name(),
                id = ?next.id(),
                "Record can now be created"
            );
            events::schedule_can_be_created(&next);
        }
        next
    }

    /// [`Record::supersede`] for versions nobody asked for. This version
    /// keeps the result alive.
    pub(crate) fn supersede_unclaimed(&self, data: Attributes, config: RecordConfig) -> Record {
        let next = self.supersede(data, config);
        *self.version.successor.lock() = Some(Arc::clone(&next.version));
        next
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Register a listener for this record's temporary-to-permanent transition.
    ///
    /// # Errors
    ///
    /// `AlreadyResolved` if the record is not new.
    pub fn on_id_set<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: FnOnce(IdSetEvent) + Send + 'static,
    {
        if !self.is_new_record() {
            return Err(Error::AlreadyResolved {
                operation: "on_id_set",
            });
        }
        Ok(self.chain.push_id_set(Box::new(listener)))
    }

    /// Like [`Record::on_id_set`], but a record that already has its
    /// permanent id gets the listener scheduled right away with itself and no
    /// previous version. Returns `None` in that case.
    pub fn on_id_set_or_now<F>(&self, listener: F) -> Option<ListenerId>
    where
        F: FnOnce(IdSetEvent) + Send + 'static,
    {
        if self.is_new_record() {
            return Some(self.chain.push_id_set(Box::new(listener)));
        }
        let record = self.clone();
        self.chain.dispatcher().submit("id-set-now", move || {
            listener(IdSetEvent {
                record,
                previous: None,
            })
        });
        None
    }

    /// Retract an `id-set` listener before it fires. Returns `false` if it
    /// already fired or was never registered on this chain.
    pub fn clear_on_id_set(&self, listener: ListenerId) -> bool {
        self.chain.remove_id_set(listener)
    }

    /// Register a listener for "every relation now has a permanent id".
    ///
    /// If the record is already ready, the engine's [`ReadinessPolicy`]
    /// decides: `Immediate` schedules the listener with this version,
    /// `Strict` rejects the registration.
    ///
    /// # Errors
    ///
    /// - `AlreadyResolved` if the record is not new.
    /// - `AlreadyCanBeCreated` if it is already ready under the strict policy.
    pub fn on_can_be_created<F>(&self, listener: F) -> Result<()>
    where
        F: FnOnce(Record) + Send + 'static,
    {
        if !self.is_new_record() {
            return Err(Error::AlreadyResolved {
                operation: "on_can_be_created",
            });
        }
        if self.can_be_created() {
            return match self.chain.config().readiness {
                ReadinessPolicy::Strict => Err(Error::AlreadyCanBeCreated),
                ReadinessPolicy::Immediate => {
                    let record = self.clone();
                    self.chain
                        .dispatcher()
                        .submit("can-be-created-now", move || listener(record));
                    Ok(())
                }
            };
        }
        self.chain.push_can_be_created(Box::new(listener));
        Ok(())
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Plain attribute map for the transport layer.
    ///
    /// Related records and association attributes are never included. A new
    /// record's id is relabeled or omitted per the engine's
    /// [`TemporaryIdPolicy`].
    pub fn to_plain_object(&self) -> PlainObject {
        let kind = &self.version.kind;
        let mut out: PlainObject = self
            .version
            .data
            .iter()
            .filter(|(name, _)| !kind.is_association(name))
            .filter_map(|(name, attr)| attr.as_value().map(|v| (name.clone(), v.clone())))
            .collect();

        if self.is_new_record() {
            if let Some(id) = out.remove(&self.version.config.id_attribute) {
                let policy = self.chain.config();
                if policy.temporary_ids == TemporaryIdPolicy::ClientId {
                    out.insert(policy.client_id_attribute.clone(), id);
                }
            }
        }
        out
    }

    /// [`Record::to_plain_object`] as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.to_plain_object()
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::from(v)))
                .collect(),
        )
    }

    /// `true` if the id is permanent (ignores `force_temporary`)
    pub fn has_permanent_id(&self) -> bool {
        self.id().map_or(false, is_permanent_id)
    }
}

/// Snapshot equality for the no-op merge check. Scalars compare with
/// [`Value::same_value`], related records by version identity.
fn same_attributes(a: &Attributes, b: &Attributes) -> bool {
    a.ptr_eq(b)
        || (a.len() == b.len()
            && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                ka == kb
                    && match (va, vb) {
                        (Attribute::Value(x), Attribute::Value(y)) => x.same_value(y),
                        (Attribute::Record(x), Attribute::Record(y)) => Record::ptr_eq(x, y),
                        _ => false,
                    }
            }))
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("kind", &self.kind().name())
            .field("revision", &self.revision())
            .field("id", &self.id())
            .field("new", &self.is_new_record())
            .field("attributes", &self.version.data.keys().collect::<Vec<_>>())
            .finish()
    }
}
