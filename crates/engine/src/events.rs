//! Per-chain event registry
//!
//! One [`EventRegistry`] is shared by every version of one logical record.
//! It is the single mutable seam in an otherwise immutable version chain:
//! listeners live here, not on snapshots, so a listener registered on
//! version N still fires when version N+2 gets its permanent id.
//!
//! ## Firing protocol
//!
//! Firing swaps the whole list out under the lock, releases the lock, and
//! then calls every captured listener once in registration order. Listeners
//! added while a round is running wait for the next round. Listeners are
//! `FnOnce`, so they cannot be called twice.

use crate::dispatcher::Dispatcher;
use crate::engine::EngineShared;
use crate::record::{Record, Version};
use parking_lot::Mutex;
use recordchain_core::EngineConfig;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for a registered `id-set` listener, used to retract it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Payload delivered to `id-set` listeners
#[derive(Debug, Clone)]
pub struct IdSetEvent {
    /// The version that carries the permanent id
    pub record: Record,
    /// The version it superseded. `None` when `on_id_set_or_now` fired for
    /// a record that was already permanent.
    pub previous: Option<Record>,
}

/// Listener for the temporary-to-permanent transition
pub type IdSetListener = Box<dyn FnOnce(IdSetEvent) + Send>;

/// Listener for "every relation is resolved"
pub type CanBeCreatedListener = Box<dyn FnOnce(Record) + Send>;

#[derive(Default)]
struct RegistryState {
    on_id_set: Vec<(ListenerId, IdSetListener)>,
    on_can_be_created: Vec<(ListenerId, CanBeCreatedListener)>,
    head: Weak<Version>,
}

/// Listener lists and chain-level state shared across one version chain
pub struct EventRegistry {
    engine: Arc<EngineShared>,
    state: Mutex<RegistryState>,
    revisions: AtomicU64,
    create_called: AtomicBool,
}

impl EventRegistry {
    pub(crate) fn new(engine: Arc<EngineShared>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            state: Mutex::new(RegistryState::default()),
            revisions: AtomicU64::new(0),
            create_called: AtomicBool::new(false),
        })
    }

    pub(crate) fn engine(&self) -> &Arc<EngineShared> {
        &self.engine
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.engine.dispatcher
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.engine.config
    }

    pub(crate) fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn set_head(&self, version: &Arc<Version>) {
        self.state.lock().head = Arc::downgrade(version);
    }

    /// Newest version of the chain, if anything still holds it
    pub(crate) fn head(&self) -> Option<Arc<Version>> {
        self.state.lock().head.upgrade()
    }

    pub(crate) fn push_id_set(&self, listener: IdSetListener) -> ListenerId {
        let id = ListenerId::next();
        self.state.lock().on_id_set.push((id, listener));
        trace!(target: "recordchain::events", listener = %id, "Registered id-set listener");
        id
    }

    pub(crate) fn remove_id_set(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        match state.on_id_set.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                let removed = state.on_id_set.remove(index);
                drop(state);
                drop(removed);
                trace!(target: "recordchain::events", listener = %id, "Cleared id-set listener");
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_can_be_created(&self, listener: CanBeCreatedListener) -> ListenerId {
        let id = ListenerId::next();
        self.state.lock().on_can_be_created.push((id, listener));
        trace!(target: "recordchain::events", listener = %id, "Registered can-be-created listener");
        id
    }

    fn take_id_set(&self) -> Vec<(ListenerId, IdSetListener)> {
        std::mem::take(&mut self.state.lock().on_id_set)
    }

    fn take_can_be_created(&self) -> Vec<(ListenerId, CanBeCreatedListener)> {
        std::mem::take(&mut self.state.lock().on_can_be_created)
    }

    /// Number of `id-set` listeners waiting to fire
    pub fn id_set_listener_count(&self) -> usize {
        self.state.lock().on_id_set.len()
    }

    /// Number of `can-be-created` listeners waiting to fire
    pub fn can_be_created_listener_count(&self) -> usize {
        self.state.lock().on_can_be_created.len()
    }

    /// Revision number the next version of this chain will get
    pub fn next_revision_number(&self) -> u64 {
        self.revisions.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_create_called(&self) {
        self.create_called.store(true, Ordering::Release);
    }

    pub(crate) fn is_create_called(&self) -> bool {
        self.create_called.load(Ordering::Acquire)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("on_id_set", &self.id_set_listener_count())
            .field("on_can_be_created", &self.can_be_created_listener_count())
            .field("revisions", &self.next_revision_number())
            .field("create_called", &self.is_create_called())
            .finish()
    }
}

/// Queue an `id-set` round for `record`'s chain.
pub(crate) fn schedule_id_set(record: &Record, previous: &Record) {
    let registry = Arc::clone(record.registry_arc());
    let record = record.clone();
    let previous = previous.clone();
    registry
        .dispatcher()
        .submit("id-set", move || fire_id_set(record, previous));
}

/// Queue a `can-be-created` round for `record`'s chain.
pub(crate) fn schedule_can_be_created(record: &Record) {
    let registry = Arc::clone(record.registry_arc());
    let record = record.clone();
    registry
        .dispatcher()
        .submit("can-be-created", move || fire_can_be_created(record));
}

fn fire_id_set(record: Record, previous: Record) {
    let listeners = record.registry_arc().take_id_set();
    debug!(
        target: "recordchain::events",
        kind = record.kind().name(),
        id = ?record.id(),
        listeners = listeners.len(),
        "Firing id-set"
    );
    for (id, listener) in listeners {
        trace!(target: "recordchain::events", listener = %id, "Invoking id-set listener");
        listener(IdSetEvent {
            record: record.clone(),
            previous: Some(previous.clone()),
        });
    }
}

fn fire_can_be_created(record: Record) {
    // Readiness is re-checked against the chain head: a merge queued after
    // this round may have attached another unresolved relation.
    let head = record.latest();
    if !(head.is_new_record() && head.can_be_created()) {
        debug!(
            target: "recordchain::events",
            kind = head.kind().name(),
            id = ?head.id(),
            revision = head.revision(),
            "Chain no longer ready, keeping can-be-created listeners"
        );
        return;
    }

    let listeners = head.registry_arc().take_can_be_created();
    debug!(
        target: "recordchain::events",
        kind = head.kind().name(),
        id = ?head.id(),
        listeners = listeners.len(),
        "Firing can-be-created"
    );
    for (id, listener) in listeners {
        trace!(target: "recordchain::events", listener = %id, "Invoking can-be-created listener");
        listener(head.clone());
    }
}
