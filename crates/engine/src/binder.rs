//! Relation binding
//!
//! Keeps a dependent record's relations in step with the records they point
//! at:
//!
//! - [`denormalize`] copies a related record's permanent id into the declared
//!   foreign key and drops the nested record from the snapshot. Temporary ids
//!   are never copied.
//! - [`bind`] subscribes the new version to the `id-set` event of every
//!   related record that is still new.
//! - [`unbind`] retracts those subscriptions when the version is superseded,
//!   so stale snapshots are never notified.
//!
//! The subscription holds only weak references to the dependent. A related
//! record never keeps its dependents alive.

use crate::events::{EventRegistry, IdSetEvent, ListenerId};
use crate::record::{Attribute, Attributes, Record, Version};
use recordchain_core::{is_permanent_id, RecordKind, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// A live subscription from a dependent version to a related record
pub(crate) struct Binding {
    association: String,
    related: Arc<EventRegistry>,
    listener: ListenerId,
}

/// Collapse resolved foreign-key relations into their foreign keys.
pub(crate) fn denormalize(kind: &RecordKind, mut data: Attributes) -> Attributes {
    for relation in kind.relations() {
        let Some(foreign_key) = relation.foreign_key.as_ref() else {
            continue;
        };
        let resolved_id = match data.get(&relation.association) {
            Some(Attribute::Record(related)) if !related.is_new_record() => {
                related.id().filter(|id| is_permanent_id(id)).cloned()
            }
            _ => None,
        };
        if let Some(id) = resolved_id {
            trace!(
                target: "recordchain::binder",
                association = %relation.association,
                foreign_key = %foreign_key,
                %id,
                "Denormalized foreign key"
            );
            data.insert(foreign_key.clone(), Attribute::Value(id));
            data.remove(&relation.association);
        }
    }
    data
}

/// Subscribe `version` to every unresolved related record it holds.
pub(crate) fn bind(chain: &Arc<EventRegistry>, version: &Arc<Version>) {
    let mut bindings = Vec::new();
    for relation in version.kind.relations() {
        let Some(Attribute::Record(related)) = version.data.get(&relation.association) else {
            continue;
        };
        if !related.is_new_record() {
            continue;
        }

        let dependent_chain = Arc::downgrade(chain);
        let dependent_version = Arc::downgrade(version);
        let association = relation.association.clone();

        // The held snapshot may predate the related record's id-set round.
        let latest = related.latest();
        if !latest.is_new_record() {
            trace!(
                target: "recordchain::binder",
                kind = version.kind.name(),
                %association,
                "Relation already resolved elsewhere in its chain"
            );
            let event = IdSetEvent {
                record: latest,
                previous: Some(related.clone()),
            };
            chain.dispatcher().submit("relation-resolved", move || {
                on_related_id_set(dependent_chain, dependent_version, association, event)
            });
            continue;
        }

        let listener = related.registry_arc().push_id_set(Box::new(move |event| {
            on_related_id_set(dependent_chain, dependent_version, association, event)
        }));

        trace!(
            target: "recordchain::binder",
            kind = version.kind.name(),
            association = %relation.association,
            %listener,
            "Bound relation"
        );
        bindings.push(Binding {
            association: relation.association.clone(),
            related: Arc::clone(related.registry_arc()),
            listener,
        });
    }
    *version.bindings.lock() = bindings;
}

/// Retract every subscription `version` holds.
pub(crate) fn unbind(version: &Version) {
    let bindings = std::mem::take(&mut *version.bindings.lock());
    for binding in bindings {
        let removed = binding.related.remove_id_set(binding.listener);
        trace!(
            target: "recordchain::binder",
            association = %binding.association,
            listener = %binding.listener,
            removed,
            "Unbound relation"
        );
    }
}

/// `id-set` handler installed by [`bind`].
fn on_related_id_set(
    dependent_chain: Weak<EventRegistry>,
    dependent_version: Weak<Version>,
    association: String,
    event: IdSetEvent,
) {
    let (Some(chain), Some(version)) = (dependent_chain.upgrade(), dependent_version.upgrade())
    else {
        trace!(
            target: "recordchain::binder",
            %association,
            "Dependent dropped before its relation resolved"
        );
        return;
    };
    let dependent = Record::from_parts(chain, version);

    let still_related = matches!(
        dependent.get(&association),
        Some(Attribute::Record(held)) if held.same_chain(&event.record)
    );
    if !still_related {
        trace!(
            target: "recordchain::binder",
            %association,
            "Dependent no longer references the resolved record"
        );
        return;
    }

    let data = dependent
        .snapshot()
        .update(association.clone(), Attribute::Record(event.record.clone()));
    let config = dependent.config().clone();
    let next = dependent.supersede_unclaimed(data, config);

    let related_id = event.record.id().cloned().unwrap_or(Value::Null);
    debug!(
        target: "recordchain::binder",
        kind = next.kind().name(),
        %association,
        %related_id,
        ready = next.can_be_created(),
        revision = next.revision(),
        "Relation resolved"
    );
}
