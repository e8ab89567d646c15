//! Engine context
//!
//! An [`Engine`] owns the engine-wide policies and the [`Dispatcher`] every
//! record it creates fires its events through. Cloning an `Engine` is cheap
//! and yields a handle to the same context.

use crate::dispatcher::{Dispatcher, DispatcherStats};
use crate::events::EventRegistry;
use crate::record::{Attributes, Patch, Record};
use recordchain_core::{EngineConfig, RecordConfig, RecordKind, Result, CONFIG_FILE_NAME};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) dispatcher: Dispatcher,
}

/// Context that creates records and drains their events
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    /// Engine with default policies
    pub fn new() -> Self {
        Self::from_shared(Arc::new(EngineShared {
            config: EngineConfig::default(),
            dispatcher: Dispatcher::new(),
        }))
    }

    /// Engine with explicit policies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_shared(Arc::new(EngineShared {
            config,
            dispatcher: Dispatcher::new(),
        })))
    }

    /// Engine configured from `recordchain.toml` in `dir`.
    ///
    /// On first open the default config file is written.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        EngineConfig::write_default_if_missing(&path)?;
        let config = EngineConfig::from_file(&path)?;
        info!(
            target: "recordchain::engine",
            path = %path.display(),
            readiness = ?config.readiness,
            temporary_ids = ?config.temporary_ids,
            "Opened engine"
        );
        Self::with_config(config)
    }

    pub(crate) fn from_shared(shared: Arc<EngineShared>) -> Self {
        Self { shared }
    }

    /// Engine policies
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The event dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    /// Create a record with the kind's default configuration.
    pub fn create(&self, kind: &Arc<RecordKind>, data: Patch) -> Record {
        self.create_with_config(kind, kind.config().clone(), data)
    }

    /// Create a record.
    ///
    /// A missing or empty id gets a temporary id. Related records that are
    /// still new get an `id-set` subscription. The record starts a fresh
    /// version chain with its own event registry.
    pub fn create_with_config(
        &self,
        kind: &Arc<RecordKind>,
        config: RecordConfig,
        data: Patch,
    ) -> Record {
        let attributes: Attributes = data.into_iter().collect();
        let chain = EventRegistry::new(Arc::clone(&self.shared));
        let record = Record::construct(chain, Arc::clone(kind), config, attributes);
        debug!(
            target: "recordchain::merge",
            kind = kind.name(),
            id = ?record.id(),
            ready = record.can_be_created(),
            "Created record"
        );
        record
    }

    /// Run every deferred event task, including ones queued along the way.
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        self.shared.dispatcher.run_pending()
    }

    /// Number of queued event tasks
    pub fn pending(&self) -> usize {
        self.shared.dispatcher.pending()
    }

    /// Dispatcher metrics
    pub fn stats(&self) -> DispatcherStats {
        self.shared.dispatcher.stats()
    }

    /// `true` if both handles point at the same engine
    pub fn ptr_eq(a: &Engine, b: &Engine) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("dispatcher", &self.shared.dispatcher)
            .finish()
    }
}
