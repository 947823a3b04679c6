//! Rendering a [`SchemaDocument`] in a concrete dialect's own syntax.
//!
//! Only JSON Schema is rendered here; other dialects plug in through
//! [`DialectAdapter`] without touching the bridge itself.
use serde_json::{Map, Value, json};

use crate::schema::{ScalarKind, SchemaDocument, SchemaNode, Shape};
use crate::types::Occurs;

use super::Dialect;

pub const DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

pub trait DialectAdapter {
    fn dialect(&self) -> Dialect;
    fn render(&self, doc: &SchemaDocument) -> Value;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaAdapter;

impl DialectAdapter for JsonSchemaAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::JsonSchema
    }

    fn render(&self, doc: &SchemaDocument) -> Value {
        let mut out = Map::new();
        out.insert("$schema".into(), Value::from(DRAFT));
        out.insert("title".into(), Value::from(doc.root.name.clone()));
        if let Value::Object(body) = node_schema(&doc.root) {
            out.extend(body);
        }
        if !doc.definitions.is_empty() {
            let defs = doc
                .definitions
                .iter()
                .map(|(name, node)| (name.clone(), node_schema(node)))
                .collect::<Map<_, _>>();
            out.insert("$defs".into(), Value::Object(defs));
        }
        Value::Object(out)
    }
}

/// Schema for one node including its cardinality and nullability.
fn node_schema(node: &SchemaNode) -> Value {
    let value = shape_schema(&node.shape);
    let value = if node.nullable { nullable(value) } else { value };
    if !node.is_repeated() {
        return value;
    }
    let mut o = json!({ "type": "array", "items": value });
    if node.min_occurs > 0 {
        o["minItems"] = Value::from(node.min_occurs);
    }
    if let Occurs::Bounded(max) = node.max_occurs {
        o["maxItems"] = Value::from(max);
    }
    o
}

/// `{}` and `{"type": "null"}` already accept null.
fn nullable(inner: Value) -> Value {
    if inner == json!({}) || inner == json!({ "type": "null" }) {
        inner
    } else {
        json!({ "anyOf": [inner, { "type": "null" }] })
    }
}

fn shape_schema(shape: &Shape) -> Value {
    match shape {
        Shape::Scalar { scalar } => scalar_schema(*scalar),
        Shape::Structure { fields, open } => {
            let mut props = Map::new();
            let mut required = Vec::new();
            for field in fields {
                props.insert(field.name.clone(), node_schema(field));
                if field.cardinality().0 {
                    required.push(Value::from(field.name.clone()));
                }
            }
            let mut o = json!({ "type": "object", "properties": props });
            if !required.is_empty() {
                o["required"] = Value::Array(required);
            }
            o["additionalProperties"] = Value::from(*open);
            o
        }
        Shape::Ref { target } => json!({ "$ref": format!("#/$defs/{target}") }),
        Shape::Choice { alternatives } => {
            json!({ "oneOf": alternatives.iter().map(node_schema).collect::<Vec<_>>() })
        }
    }
}

fn scalar_schema(kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::String => json!({ "type": "string" }),
        ScalarKind::Number | ScalarKind::Decimal | ScalarKind::Double => json!({ "type": "number" }),
        ScalarKind::Integer => json!({ "type": "integer" }),
        ScalarKind::Boolean => json!({ "type": "boolean" }),
        ScalarKind::Date => json!({ "type": "string", "format": "date" }),
        ScalarKind::DateTime => json!({ "type": "string", "format": "date-time" }),
        ScalarKind::Time => json!({ "type": "string", "format": "time" }),
        ScalarKind::Binary => json!({ "type": "string", "contentEncoding": "base64" }),
        ScalarKind::Any => json!({}),
        ScalarKind::Null => json!({ "type": "null" }),
    }
}
