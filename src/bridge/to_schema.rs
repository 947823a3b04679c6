use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticCode, Location};
use crate::path::ATTRIBUTE_PREFIX;
use crate::schema::{ScalarKind, SchemaDocument, SchemaNode, Shape};
use crate::types::{self, FieldSlot, Occurs, RecordType, Scalar, SemanticType};

use super::Dialect;

/// Output schema plus the approximations made to fit the dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub schema: SchemaDocument,
    /// Only `SchemaConversionLoss` warnings; pointers address the type tree.
    pub diagnostics: Vec<Diagnostic>,
}

/// Structural schema for `ty`, rooted at a node named `root_name`.
pub fn to_schema(ty: &SemanticType, root_name: &str, dialect: Dialect) -> Conversion {
    let mut emitter = Emitter { dialect, diagnostics: Vec::new() };
    let mut root = emitter.type_node(root_name, ty, "");
    emitter.settle_nullability(&mut root, "");
    debug!(%dialect, losses = emitter.diagnostics.len(), "emitted output schema");
    Conversion {
        schema: SchemaDocument { root, definitions: IndexMap::new() },
        diagnostics: emitter.diagnostics,
    }
}

struct Emitter {
    dialect: Dialect,
    diagnostics: Vec<Diagnostic>,
}

impl Emitter {
    fn loss(&mut self, pointer: &str, message: String) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticCode::SchemaConversionLoss,
            message,
            Location::at(pointer),
        ));
    }

    /// Node with exactly-one cardinality; callers adjust occurrences.
    fn type_node(&mut self, name: &str, ty: &SemanticType, pointer: &str) -> SchemaNode {
        match ty {
            SemanticType::Scalar(s) => SchemaNode::scalar(name, ScalarKind::from_semantic(*s)),
            SemanticType::Array(el) => {
                let mut node = match el.as_ref() {
                    // arrays of arrays need a named level in between
                    SemanticType::Array(_) => {
                        let mut item = self.type_node("item", el, &format!("{pointer}/items"));
                        item.min_occurs = 0;
                        item.max_occurs = Occurs::Unbounded;
                        item.required = false;
                        self.settle_nullability(&mut item, pointer);
                        SchemaNode::structure(name, vec![item])
                    }
                    _ => self.type_node(name, el, &format!("{pointer}/items")),
                };
                node.min_occurs = 0;
                node.max_occurs = Occurs::Unbounded;
                node.required = false;
                node
            }
            SemanticType::Record(record) => self.record_node(name, record, pointer),
            SemanticType::Union(alts) => self.union_node(name, alts, pointer),
            SemanticType::Generic(_) | SemanticType::Function { .. } => {
                self.loss(pointer, format!("`{ty}` has no {} representation; emitted as any", self.dialect));
                SchemaNode::scalar(name, ScalarKind::Any)
            }
        }
    }

    fn record_node(&mut self, name: &str, record: &RecordType, pointer: &str) -> SchemaNode {
        let fields = record
            .fields
            .iter()
            .map(|(key, slot)| self.slot_node(key, slot, &format!("{pointer}/{}", escape_pointer(key))))
            .collect();
        SchemaNode::new(name, Shape::Structure { fields, open: record.open_ended })
    }

    fn slot_node(&mut self, key: &str, slot: &FieldSlot, pointer: &str) -> SchemaNode {
        let (name, is_attribute) = match key.strip_prefix(ATTRIBUTE_PREFIX) {
            Some(bare) => (bare, true),
            None => (key, false),
        };
        let mut node = self.type_node(name, &slot.ty, pointer);

        if matches!(slot.ty, SemanticType::Array(_)) {
            (node.min_occurs, node.max_occurs) = if slot.is_repeated() {
                (slot.min_occurs, slot.max_occurs)
            } else {
                (0, Occurs::Unbounded)
            };
            node.required = node.min_occurs >= 1;
        } else {
            node.min_occurs = slot.min_occurs;
            node.max_occurs = slot.max_occurs;
            node.required = slot.required;
        }
        node.nullable |= slot.nullable;

        if is_attribute {
            if self.dialect.capabilities().attributes {
                node.attribute = true;
            } else {
                self.loss(pointer, format!("attribute `{name}` emitted as a plain {} field", self.dialect));
            }
        }
        self.settle_nullability(&mut node, pointer);
        node
    }

    fn union_node(&mut self, name: &str, alts: &[SemanticType], pointer: &str) -> SchemaNode {
        let had_null = alts.iter().any(SemanticType::is_null);
        let rest: Vec<SemanticType> = alts.iter().filter(|t| !t.is_null()).cloned().collect();

        let mut node = match rest.as_slice() {
            [] => SchemaNode::scalar(name, ScalarKind::Null),
            [single] => self.type_node(name, single, pointer),
            _ if self.dialect.supports_union_of(&rest) => {
                let alternatives = rest
                    .iter()
                    .enumerate()
                    .map(|(i, alt)| {
                        let mut node = self.type_node(&format!("option{}", i + 1), alt, &format!("{pointer}/{i}"));
                        self.settle_nullability(&mut node, pointer);
                        node
                    })
                    .collect();
                SchemaNode::choice(name, alternatives)
            }
            _ => {
                let approx = common_denominator(&rest);
                self.loss(
                    pointer,
                    format!(
                        "union `{}` is not representable in {}; approximated as `{approx}`",
                        SemanticType::union(rest.iter().cloned()),
                        self.dialect
                    ),
                );
                self.type_node(name, &approx, pointer)
            }
        };
        if had_null && !rest.is_empty() {
            node.nullable = true;
        }
        node
    }

    /// Dialects without null turn nullable nodes into optional ones.
    fn settle_nullability(&mut self, node: &mut SchemaNode, pointer: &str) {
        if node.nullable && !self.dialect.capabilities().nullability {
            node.nullable = false;
            node.required = false;
            node.min_occurs = 0;
            self.loss(pointer, format!("{} has no null; `{}` emitted as optional", self.dialect, node.name));
        }
    }
}

/// Single type every alternative fits into, as close as the members allow.
fn common_denominator(alts: &[SemanticType]) -> SemanticType {
    if alts.iter().all(|t| *t == SemanticType::integer()) {
        return SemanticType::integer();
    }
    if alts.iter().all(SemanticType::is_numeric) {
        return SemanticType::number();
    }
    if alts.iter().all(|t| matches!(t, SemanticType::Record(_))) {
        return types::widen_all(alts.iter().cloned());
    }
    if alts.iter().all(|t| matches!(t, SemanticType::Array(_))) {
        let elements: Vec<SemanticType> = alts.iter().filter_map(|t| t.element().cloned()).collect();
        let element = types::widen_all(elements);
        return match element {
            SemanticType::Union(inner) => SemanticType::array(common_denominator(&inner)),
            other => SemanticType::array(other),
        };
    }
    if alts.iter().all(|t| matches!(t, SemanticType::Scalar(_))) {
        return SemanticType::Scalar(Scalar::String);
    }
    SemanticType::any()
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
