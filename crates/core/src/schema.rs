//! Record kinds
//!
//! A [`RecordKind`] is the static definition shared by every record of one
//! type: its name, its documented attributes, its relation descriptors and
//! its default [`RecordConfig`]. Kinds are built once and shared as
//! `Arc<RecordKind>`; versions never copy the relation list.
//!
//! Attribute types are advisory. Nothing in the engine checks that a
//! `Number` attribute holds a number.

use crate::config::RecordConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Documentation-only attribute type sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// Identity attribute (temporary or permanent id)
    Id,
    /// Numeric attribute
    Number,
    /// Text attribute
    String,
    /// Boolean attribute
    Boolean,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::Id => "id",
            AttributeType::Number => "number",
            AttributeType::String => "string",
            AttributeType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name
    pub name: String,
    /// Advisory type
    pub ty: AttributeType,
}

/// A declared relation to another record kind
///
/// `association` is the attribute that holds the related record while it is
/// unresolved. `foreign_key`, when declared, receives the related record's
/// permanent id once it has one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Attribute holding the related record
    pub association: String,
    /// Optional denormalized foreign-key attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

impl RelationDescriptor {
    /// Relation without a foreign key
    pub fn new(association: impl Into<String>) -> Self {
        Self {
            association: association.into(),
            foreign_key: None,
        }
    }

    /// Declare the foreign-key attribute
    pub fn foreign_key(mut self, attribute: impl Into<String>) -> Self {
        self.foreign_key = Some(attribute.into());
        self
    }
}

/// Static definition of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKind {
    name: String,
    attributes: Vec<AttributeDef>,
    relations: Vec<RelationDescriptor>,
    config: RecordConfig,
}

impl RecordKind {
    /// Start building a kind
    pub fn builder(name: impl Into<String>) -> RecordKindBuilder {
        RecordKindBuilder {
            kind: RecordKind {
                name: name.into(),
                attributes: Vec::new(),
                relations: Vec::new(),
                config: RecordConfig::default(),
            },
        }
    }

    /// Kind name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documented attributes
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Relation descriptors
    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// Default configuration for new records of this kind
    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// Look up a relation by association name
    pub fn relation(&self, association: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.association == association)
    }

    /// `true` if `name` is a declared association attribute
    pub fn is_association(&self, name: &str) -> bool {
        self.relation(name).is_some()
    }
}

/// Builder for [`RecordKind`]
#[derive(Debug)]
pub struct RecordKindBuilder {
    kind: RecordKind,
}

impl RecordKindBuilder {
    /// Document an attribute
    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.kind.attributes.push(AttributeDef {
            name: name.into(),
            ty,
        });
        self
    }

    /// Declare a relation
    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.kind.relations.push(relation);
        self
    }

    /// Set the default record configuration
    pub fn config(mut self, config: RecordConfig) -> Self {
        self.kind.config = config;
        self
    }

    /// Finish the kind
    pub fn build(self) -> Arc<RecordKind> {
        Arc::new(self.kind)
    }
}
