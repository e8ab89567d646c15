//! recordchain - immutable versioned records for client-side data layers
//!
//! Every record is an immutable snapshot. Merging data produces a new
//! version; versions of one entity share their event listeners. Records
//! created before the backing store assigned them an id carry a temporary
//! (negative) id and announce the permanent one through an `id-set` event.
//! Records whose relations are still unsaved announce when they become
//! creatable through a `can-be-created` event.
//!
//! # Quick Start
//!
//! ```
//! use recordchain::{Engine, Patch, RecordKind, RelationDescriptor};
//!
//! let users = RecordKind::builder("User").build();
//! let images = RecordKind::builder("ProfileImage")
//!     .relation(RelationDescriptor::new("User").foreign_key("userId"))
//!     .build();
//!
//! let engine = Engine::new();
//! let user = engine.create(&users, Patch::new().set("name", "Ada"));
//! let image = engine.create(&images, Patch::new().set("User", &user));
//! assert!(!image.can_be_created());
//!
//! // The backing store saved the user.
//! let saved = user.merge(Patch::new().set("id", 973)).unwrap();
//! assert!(!saved.is_new_record());
//!
//! // Deferred events run when the caller drains the engine.
//! engine.run_pending();
//! assert!(image.latest().can_be_created());
//! ```
//!
//! # Architecture
//!
//! - `recordchain-core`: values, ids, configuration, schema, errors
//! - `recordchain-engine`: records, event registries, relation binding and
//!   the deferred dispatcher

pub use recordchain_engine::*;
