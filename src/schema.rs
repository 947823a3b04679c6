//! Dialect-agnostic structural schema.
//!
//! What a dialect adapter (XSD, JSON Schema, Avro, ...) hands over after
//! parsing, and what `to_schema` hands back for serialization: named nodes
//! with a shape, cardinality, and the nullable/attribute flags.
//!
//! ```json
//! {"root": {"name": "Order", "type": "structure", "fields": [
//!     {"name": "id", "type": "scalar", "scalar": "string", "attribute": true},
//!     {"name": "Item", "type": "ref", "target": "Item", "min_occurs": 0, "max_occurs": "unbounded"}
//! ]}, "definitions": {"Item": {"name": "Item", "type": "structure", "fields": []}}}
//! ```
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{Occurs, Scalar};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub root: SchemaNode,
    /// Named types reachable through `ref` nodes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: IndexMap<String, SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub required: bool,
    #[serde(default = "one")]
    pub min_occurs: u32,
    #[serde(default = "one_bounded")]
    pub max_occurs: Occurs,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub attribute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Scalar {
        scalar: ScalarKind,
    },
    Structure {
        #[serde(default)]
        fields: Vec<SchemaNode>,
        #[serde(default, skip_serializing_if = "is_false")]
        open: bool,
    },
    Ref {
        target: String,
    },
    /// Value is exactly one of the alternatives; their names are labels.
    Choice {
        alternatives: Vec<SchemaNode>,
    },
}

/// Normalized scalar vocabulary; dialect spellings arrive as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    #[serde(alias = "text", alias = "token")]
    String,
    Number,
    Decimal,
    #[serde(alias = "float")]
    Double,
    #[serde(alias = "int", alias = "long", alias = "short")]
    Integer,
    #[serde(alias = "bool")]
    Boolean,
    Date,
    #[serde(alias = "dateTime", alias = "timestamp")]
    DateTime,
    Time,
    #[serde(alias = "bytes", alias = "base64Binary")]
    Binary,
    #[serde(alias = "anyType")]
    Any,
    Null,
}

fn yes() -> bool { true }
fn one() -> u32 { 1 }
fn one_bounded() -> Occurs { Occurs::Bounded(1) }
fn is_true(b: &bool) -> bool { *b }
fn is_false(b: &bool) -> bool { !*b }

impl ScalarKind {
    /// Temporal and binary kinds travel as strings in the type algebra.
    pub fn semantic(self) -> Scalar {
        match self {
            ScalarKind::String
            | ScalarKind::Date
            | ScalarKind::DateTime
            | ScalarKind::Time
            | ScalarKind::Binary => Scalar::String,
            ScalarKind::Number | ScalarKind::Decimal | ScalarKind::Double => Scalar::Number,
            ScalarKind::Integer => Scalar::Integer,
            ScalarKind::Boolean => Scalar::Boolean,
            ScalarKind::Any => Scalar::Any,
            ScalarKind::Null => Scalar::Null,
        }
    }

    pub fn from_semantic(scalar: Scalar) -> Self {
        match scalar {
            Scalar::String => ScalarKind::String,
            Scalar::Number => ScalarKind::Number,
            Scalar::Integer => ScalarKind::Integer,
            Scalar::Boolean => ScalarKind::Boolean,
            Scalar::Null => ScalarKind::Null,
            Scalar::Any => ScalarKind::Any,
        }
    }
}

impl SchemaNode {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
            min_occurs: 1,
            max_occurs: Occurs::Bounded(1),
            nullable: false,
            attribute: false,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarKind) -> Self {
        Self::new(name, Shape::Scalar { scalar })
    }

    pub fn structure(name: impl Into<String>, fields: Vec<SchemaNode>) -> Self {
        Self::new(name, Shape::Structure { fields, open: false })
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, Shape::Ref { target: target.into() })
    }

    pub fn choice(name: impl Into<String>, alternatives: Vec<SchemaNode>) -> Self {
        Self::new(name, Shape::Choice { alternatives })
    }

    pub fn open(mut self) -> Self {
        if let Shape::Structure { open, .. } = &mut self.shape {
            *open = true;
        }
        self
    }

    pub fn optional(self) -> Self {
        let max = self.max_occurs;
        self.occurs(0, max)
    }

    /// Zero-or-more.
    pub fn repeated(self) -> Self {
        self.occurs(0, Occurs::Unbounded)
    }

    pub fn occurs(mut self, min: u32, max: Occurs) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self.required = min >= 1;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn attribute(mut self) -> Self {
        self.attribute = true;
        self
    }

    /// `(required, min, max)` after reconciling the flag with the bounds:
    /// not required means min 0, required means min ≥ 1, max ≥ min.
    pub fn cardinality(&self) -> (bool, u32, Occurs) {
        let min = if self.required { self.min_occurs.max(1) } else { 0 };
        let min = if self.min_occurs == 0 { 0 } else { min };
        let max = match self.max_occurs {
            Occurs::Bounded(m) if m < min => Occurs::Bounded(min),
            other => other,
        };
        (min >= 1, min, max)
    }

    pub fn is_repeated(&self) -> bool {
        self.max_occurs.is_many()
    }
}
