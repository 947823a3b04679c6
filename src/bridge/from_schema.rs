use indexmap::IndexMap;
use tracing::debug;

use crate::env::TypeEnvironment;
use crate::error::BridgeError;
use crate::path;
use crate::schema::{SchemaDocument, SchemaNode, Shape};
use crate::types::{self, FieldSlot, RecordType, SemanticType};

/// Nesting cap for schema traversal; real schemas stay far below it.
pub const MAX_SCHEMA_DEPTH: usize = 128;

/// Build the environment for one input. `root_prefix` names the input in
/// paths; it defaults to the schema root's own name.
pub fn from_schema(doc: &SchemaDocument, root_prefix: Option<&str>) -> Result<TypeEnvironment, BridgeError> {
    let prefix = root_prefix.unwrap_or(&doc.root.name);
    let mut walker = Walker {
        doc,
        entries: IndexMap::new(),
        expanding: Vec::new(),
        optional_marks: Vec::new(),
        depth: 0,
    };
    walker.node_slot(&doc.root, prefix)?;
    debug!(root = %prefix, paths = walker.entries.len(), "built type environment");
    Ok(TypeEnvironment::from_entries(walker.entries))
}

struct Walker<'a> {
    doc: &'a SchemaDocument,
    entries: IndexMap<String, SemanticType>,
    /// Definitions currently being expanded, outermost first.
    expanding: Vec<String>,
    /// `expanding.len()` at each optional node on the current walk.
    optional_marks: Vec<usize>,
    depth: usize,
}

impl Walker<'_> {
    /// Registers `path` (and `path[*]` for repeated nodes) and everything
    /// below it; returns the slot the parent record stores.
    fn node_slot(&mut self, node: &SchemaNode, at: &str) -> Result<FieldSlot, BridgeError> {
        let (_, min, max) = node.cardinality();
        let index = self.entries.insert_full(at.to_string(), SemanticType::any()).0;

        let element = node
            .is_repeated()
            .then(|| self.entries.insert_full(path::element(at), SemanticType::any()).0);
        let value_path = if element.is_some() { path::element(at) } else { at.to_string() };

        let optional = min == 0;
        if optional {
            self.optional_marks.push(self.expanding.len());
        }
        let value = self.shape_type(&node.shape, &value_path);
        if optional {
            self.optional_marks.pop();
        }
        let mut value = value?;
        if node.nullable {
            value = SemanticType::union([value, SemanticType::null()]);
        }

        let ty = match element {
            Some(element) => {
                self.set(element, value.clone());
                SemanticType::array(value)
            }
            None => value,
        };
        self.set(index, ty.clone());

        let mut slot = FieldSlot::with_occurs(ty, min, max);
        slot.nullable = node.nullable;
        Ok(slot)
    }

    fn set(&mut self, index: usize, ty: SemanticType) {
        if let Some((_, slot_ty)) = self.entries.get_index_mut(index) {
            *slot_ty = ty;
        }
    }

    fn shape_type(&mut self, shape: &Shape, at: &str) -> Result<SemanticType, BridgeError> {
        self.depth += 1;
        if self.depth > MAX_SCHEMA_DEPTH {
            return Err(BridgeError::DepthExceeded { limit: MAX_SCHEMA_DEPTH, path: at.to_string() });
        }
        let ty = match shape {
            Shape::Scalar { scalar } => SemanticType::Scalar(scalar.semantic()),
            Shape::Structure { fields, open } => {
                let mut record = RecordType { fields: IndexMap::new(), open_ended: *open };
                for field in fields {
                    let (key, child) = if field.attribute {
                        (path::attribute_key(&field.name), path::attribute(at, &field.name))
                    } else {
                        (field.name.clone(), path::child(at, &field.name))
                    };
                    let slot = self.node_slot(field, &child)?;
                    record.fields.insert(key, slot);
                }
                SemanticType::Record(record)
            }
            Shape::Ref { target } => {
                if let Some(start) = self.expanding.iter().position(|t| t == target) {
                    // recursion through an optional node ends wherever the data does
                    if self.optional_marks.iter().any(|&mark| mark > start) {
                        debug!(%target, path = at, "recursive reference left open");
                        self.depth -= 1;
                        return Ok(SemanticType::Record(RecordType { fields: IndexMap::new(), open_ended: true }));
                    }
                    let mut chain = self.expanding[start..].to_vec();
                    chain.push(target.clone());
                    return Err(BridgeError::Cycle { chain });
                }
                let def = self.doc.definitions.get(target).ok_or_else(|| BridgeError::UnknownReference {
                    target: target.clone(),
                    path: at.to_string(),
                })?;
                self.expanding.push(target.clone());
                let ty = self.shape_type(&def.shape, at);
                self.expanding.pop();
                let ty = ty?;
                if def.nullable { SemanticType::union([ty, SemanticType::null()]) } else { ty }
            }
            Shape::Choice { alternatives } => {
                // each alternative registers its paths apart; shared paths unify
                let outer = std::mem::take(&mut self.entries);
                let mut reached: IndexMap<String, SemanticType> = IndexMap::new();
                let mut arms = Vec::with_capacity(alternatives.len());
                for alt in alternatives {
                    let ty = self.shape_type(&alt.shape, at);
                    for (key, found) in std::mem::take(&mut self.entries) {
                        let merged = match reached.get(&key) {
                            Some(seen) => types::unify(seen, &found),
                            None => found,
                        };
                        reached.insert(key, merged);
                    }
                    let ty = ty?;
                    let ty = if alt.is_repeated() { SemanticType::array(ty) } else { ty };
                    arms.push(if alt.nullable { SemanticType::union([ty, SemanticType::null()]) } else { ty });
                }
                self.entries = outer;
                self.entries.extend(reached);
                SemanticType::union(arms)
            }
        };
        self.depth -= 1;
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Resolution;
    use crate::schema::ScalarKind;
    use crate::types::Occurs;
    use pretty_assertions::assert_eq;

    fn order_schema() -> SchemaDocument {
        SchemaDocument {
            root: SchemaNode::structure("Order", vec![
                SchemaNode::scalar("id", ScalarKind::String).attribute(),
                SchemaNode::scalar("note", ScalarKind::String).optional(),
                SchemaNode::scalar("discount", ScalarKind::Decimal).nullable(),
                SchemaNode::structure("Items", vec![
                    SchemaNode::structure("Item", vec![
                        SchemaNode::scalar("price", ScalarKind::Decimal),
                        SchemaNode::scalar("quantity", ScalarKind::Integer),
                    ])
                    .repeated(),
                ]),
            ]),
            definitions: IndexMap::new(),
        }
    }

    #[test]
    fn every_field_gets_a_path() {
        let env = from_schema(&order_schema(), None).unwrap();
        let paths: Vec<&str> = env.paths().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![
            "Order",
            "Order.@id",
            "Order.note",
            "Order.discount",
            "Order.Items",
            "Order.Items.Item",
            "Order.Items.Item[*]",
            "Order.Items.Item[*].price",
            "Order.Items.Item[*].quantity",
        ]);
    }

    #[test]
    fn repeated_becomes_array_and_element_path_is_symbolic() {
        let env = from_schema(&order_schema(), None).unwrap();
        let SemanticType::Array(el) = env.lookup("Order.Items.Item").unwrap() else {
            panic!("Item should be an array");
        };
        assert_eq!(env.lookup("Order.Items.Item[*]"), Some(el.as_ref()));
        assert_eq!(env.lookup("Order.Items.Item[*].price"), Some(&SemanticType::number()));
    }

    #[test]
    fn optionality_and_nullability_stay_independent() {
        let env = from_schema(&order_schema(), None).unwrap();
        let Some(SemanticType::Record(order)) = env.lookup("Order") else { panic!("record root") };

        let note = &order.fields["note"];
        assert!(!note.required && !note.nullable);
        assert_eq!(note.ty, SemanticType::string());

        let discount = &order.fields["discount"];
        assert!(discount.required && discount.nullable);
        assert_eq!(discount.ty, SemanticType::union([SemanticType::number(), SemanticType::null()]));

        let items = &order.fields["Items"];
        let SemanticType::Record(items) = &items.ty else { panic!() };
        let item = &items.fields["Item"];
        assert_eq!((item.required, item.min_occurs, item.max_occurs), (false, 0, Occurs::Unbounded));
        assert!(order.fields.contains_key("@id"));
    }

    #[test]
    fn root_prefix_renames_the_input() {
        let env = from_schema(&order_schema(), Some("input")).unwrap();
        assert_eq!(env.resolve("input.Items.Item[*].quantity").unwrap(), Resolution::Found(SemanticType::integer()));
        assert!(env.lookup("Order").is_none());
    }

    #[test]
    fn references_expand_and_cycles_are_reported() {
        let mut doc = SchemaDocument {
            root: SchemaNode::structure("Tree", vec![SchemaNode::reference("node", "Node")]),
            definitions: IndexMap::new(),
        };
        doc.definitions.insert(
            "Node".into(),
            SchemaNode::structure("Node", vec![SchemaNode::scalar("label", ScalarKind::String)]),
        );
        let env = from_schema(&doc, None).unwrap();
        assert_eq!(env.lookup("Tree.node.label"), Some(&SemanticType::string()));

        doc.definitions.insert(
            "Node".into(),
            SchemaNode::structure("Node", vec![SchemaNode::reference("child", "Node")]),
        );
        assert_eq!(
            from_schema(&doc, None).unwrap_err(),
            BridgeError::Cycle { chain: vec!["Node".into(), "Node".into()] }
        );

        doc.root = SchemaNode::reference("x", "Missing");
        assert!(matches!(from_schema(&doc, None), Err(BridgeError::UnknownReference { .. })));
    }

    #[test]
    fn recursion_through_optional_fields_stays_open() {
        let mut doc = SchemaDocument {
            root: SchemaNode::structure("Tree", vec![SchemaNode::reference("node", "Node")]),
            definitions: IndexMap::new(),
        };
        doc.definitions.insert(
            "Node".into(),
            SchemaNode::structure("Node", vec![
                SchemaNode::scalar("label", ScalarKind::String),
                SchemaNode::reference("children", "Node").repeated(),
                SchemaNode::reference("parent", "Node").optional(),
            ]),
        );
        let env = from_schema(&doc, None).unwrap();
        let open = SemanticType::Record(RecordType { fields: IndexMap::new(), open_ended: true });
        assert_eq!(env.lookup("Tree.node.label"), Some(&SemanticType::string()));
        assert_eq!(env.lookup("Tree.node.children"), Some(&SemanticType::array(open.clone())));
        assert_eq!(env.lookup("Tree.node.parent"), Some(&open));
        assert!(matches!(
            env.resolve("Tree.node.children[*].label").unwrap(),
            Resolution::Unknown { open_record: Some(_), .. }
        ));
    }

    #[test]
    fn nesting_past_the_cap_is_rejected() {
        let mut node = SchemaNode::scalar("leaf", ScalarKind::String);
        for i in 0..=MAX_SCHEMA_DEPTH {
            node = SchemaNode::structure(format!("s{i}"), vec![node]);
        }
        let doc = SchemaDocument { root: node, definitions: IndexMap::new() };
        assert!(matches!(
            from_schema(&doc, None),
            Err(BridgeError::DepthExceeded { limit: MAX_SCHEMA_DEPTH, .. })
        ));
    }

    #[test]
    fn choice_alternatives_sharing_a_field_unify_it() {
        let doc = SchemaDocument {
            root: SchemaNode::structure("P", vec![SchemaNode::choice("m", vec![
                SchemaNode::structure("a", vec![
                    SchemaNode::scalar("x", ScalarKind::String),
                    SchemaNode::scalar("only_a", ScalarKind::Boolean),
                ]),
                SchemaNode::structure("b", vec![SchemaNode::scalar("x", ScalarKind::Integer)]),
            ])]),
            definitions: IndexMap::new(),
        };
        let env = from_schema(&doc, None).unwrap();
        let either = SemanticType::union([SemanticType::string(), SemanticType::integer()]);
        assert_eq!(env.lookup("P.m.x"), Some(&either));
        assert_eq!(env.lookup("P.m.only_a"), Some(&SemanticType::boolean()));
        assert_eq!(env.resolve("P.m.x").unwrap(), Resolution::Found(either));
        let paths: Vec<&str> = env.paths().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["P", "P.m", "P.m.x", "P.m.only_a"]);
    }

    #[test]
    fn choices_become_unions() {
        let doc = SchemaDocument {
            root: SchemaNode::structure("Payment", vec![SchemaNode::choice("method", vec![
                SchemaNode::scalar("iban", ScalarKind::String),
                SchemaNode::scalar("card", ScalarKind::Integer),
            ])]),
            definitions: IndexMap::new(),
        };
        let env = from_schema(&doc, None).unwrap();
        assert_eq!(
            env.lookup("Payment.method"),
            Some(&SemanticType::Union(vec![SemanticType::string(), SemanticType::integer()]))
        );
    }

    #[test]
    fn open_structures_stay_open() {
        let doc = SchemaDocument {
            root: SchemaNode::structure("Doc", vec![SchemaNode::structure("extra", vec![]).open()]),
            definitions: IndexMap::new(),
        };
        let env = from_schema(&doc, None).unwrap();
        assert!(matches!(env.lookup("Doc.extra"), Some(SemanticType::Record(r)) if r.open_ended));
    }
}
