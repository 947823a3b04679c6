//! Type environment: everything statically known about the inputs.
//!
//! Immutable once built. Entries sit behind an `Arc`, so clones are cheap and
//! one environment can serve any number of concurrent inference runs. Scoped
//! locals (lambda parameters, `let`) live in a persistent chain layered on
//! top; binding one returns a new environment and leaves the original as is.
use std::sync::Arc;

use indexmap::IndexMap;

use crate::path::{self, PathError, Segment};
use crate::types::SemanticType;

#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    entries: Arc<IndexMap<String, SemanticType>>,
    scope: Option<Arc<Binding>>,
}

#[derive(Debug)]
struct Binding {
    name: String,
    ty: SemanticType,
    parent: Option<Arc<Binding>>,
}

/// Outcome of resolving a path against the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(SemanticType),
    Unknown {
        /// Longest prefix that did resolve (empty when nothing did).
        known_prefix: String,
        /// Nearest enclosing openEnded record on the way, if any.
        open_record: Option<String>,
    },
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in insertion order; the first one is the root.
    pub fn from_entries(entries: IndexMap<String, SemanticType>) -> Self {
        Self { entries: Arc::new(entries), scope: None }
    }

    /// Environment covering several named inputs. Later inputs win on
    /// (unlikely) path collisions.
    pub fn combine<I>(envs: I) -> Self
    where
        I: IntoIterator<Item = TypeEnvironment>,
    {
        let mut entries = IndexMap::new();
        for env in envs {
            entries.extend(env.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by canonical path text. Locals are not consulted.
    pub fn lookup(&self, path: &str) -> Option<&SemanticType> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&str, &SemanticType)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn root(&self) -> Option<(&str, &SemanticType)> {
        self.entries.get_index(0).map(|(k, v)| (k.as_str(), v))
    }

    /// Innermost local named `name`.
    pub fn local(&self, name: &str) -> Option<&SemanticType> {
        let mut cursor = self.scope.as_deref();
        while let Some(binding) = cursor {
            if binding.name == name {
                return Some(&binding.ty);
            }
            cursor = binding.parent.as_deref();
        }
        None
    }

    /// New environment with `name` bound for the rest of a lexical scope.
    pub fn bind(&self, name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            scope: Some(Arc::new(Binding {
                name: name.into(),
                ty,
                parent: self.scope.clone(),
            })),
        }
    }

    /// Resolve a path: locals first, then the exact entry, then structural
    /// navigation from the longest known prefix.
    pub fn resolve(&self, raw: &str) -> Result<Resolution, PathError> {
        let segments = path::parse(raw)?;

        if let Some(Segment::Field(head)) = segments.first() {
            if let Some(ty) = self.local(head) {
                return Ok(navigate(ty, &segments[1..], head));
            }
        }

        let canonical = path::render(&segments);
        if let Some(ty) = self.entries.get(&canonical) {
            return Ok(Resolution::Found(ty.clone()));
        }

        for cut in (1..segments.len()).rev() {
            let prefix = path::render(&segments[..cut]);
            if let Some(ty) = self.entries.get(&prefix) {
                return Ok(navigate(ty, &segments[cut..], &prefix));
            }
        }
        Ok(Resolution::Unknown { known_prefix: String::new(), open_record: None })
    }
}

/// Walk `segments` down from `ty`, whose own path is `base`.
pub fn navigate(ty: &SemanticType, segments: &[Segment], base: &str) -> Resolution {
    let mut walker = Walker { open_record: None, known: base.to_string() };
    match walker.step(ty, segments, base) {
        Some(found) => Resolution::Found(found),
        None => Resolution::Unknown { known_prefix: walker.known, open_record: walker.open_record },
    }
}

struct Walker {
    open_record: Option<String>,
    known: String,
}

impl Walker {
    fn step(&mut self, ty: &SemanticType, segments: &[Segment], at: &str) -> Option<SemanticType> {
        let Some((seg, rest)) = segments.split_first() else {
            return Some(ty.clone());
        };
        self.known = at.to_string();

        match (ty, seg) {
            // nothing is known below Any, and nothing is wrong either
            (SemanticType::Scalar(crate::types::Scalar::Any), _) => Some(SemanticType::any()),
            (SemanticType::Union(alts), _) => {
                let found: Vec<SemanticType> = alts
                    .iter()
                    .filter(|a| !a.is_null())
                    .filter_map(|a| self.step(a, segments, at))
                    .collect();
                if found.is_empty() { None } else { Some(SemanticType::union(found)) }
            }
            (SemanticType::Array(el), Segment::Element) => {
                self.step(el, rest, &path::element(at))
            }
            // field over a repeated node projects across its elements
            (SemanticType::Array(el), _) => {
                self.step(el, segments, &path::element(at)).map(SemanticType::array)
            }
            (SemanticType::Record(record), _) => {
                let key = seg.key()?;
                if record.open_ended {
                    self.open_record = Some(at.to_string());
                }
                let slot = record.fields.get(&key)?;
                let next = path::child(at, &seg.to_string());
                self.step(&slot.ty, rest, &next)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSlot;
    use pretty_assertions::assert_eq;

    fn item() -> SemanticType {
        SemanticType::record(
            [
                ("price", FieldSlot::required(SemanticType::number())),
                ("quantity", FieldSlot::required(SemanticType::integer())),
            ],
            false,
        )
    }

    fn order_env() -> TypeEnvironment {
        let items = SemanticType::record([("Item", FieldSlot::repeated(item()))], false);
        let order = SemanticType::record(
            [
                ("Items", FieldSlot::required(items.clone())),
                ("Meta", FieldSlot::required(SemanticType::record(Vec::<(String, FieldSlot)>::new(), true))),
            ],
            false,
        );
        let mut entries = IndexMap::new();
        entries.insert("Order".to_string(), order);
        entries.insert("Order.Items".to_string(), items);
        entries.insert("Order.Items.Item".to_string(), SemanticType::array(item()));
        entries.insert("Order.Items.Item[*]".to_string(), item());
        entries.insert("Order.Items.Item[*].price".to_string(), SemanticType::number());
        TypeEnvironment::from_entries(entries)
    }

    #[test]
    fn exact_and_indexed_lookup() {
        let env = order_env();
        assert_eq!(env.resolve("Order.Items.Item").unwrap(), Resolution::Found(SemanticType::array(item())));
        assert_eq!(env.resolve("Order.Items.Item[3].price").unwrap(), Resolution::Found(SemanticType::number()));
        assert_eq!(env.root().map(|(k, _)| k), Some("Order"));
    }

    #[test]
    fn navigates_past_the_last_entry() {
        let env = order_env();
        assert_eq!(
            env.resolve("Order.Items.Item[*].quantity").unwrap(),
            Resolution::Found(SemanticType::integer())
        );
        // implicit projection over the repeated element
        assert_eq!(
            env.resolve("Order.Items.Item.quantity").unwrap(),
            Resolution::Found(SemanticType::array(SemanticType::integer()))
        );
    }

    #[test]
    fn unknown_paths_report_context() {
        let env = order_env();
        assert_eq!(
            env.resolve("Order.NonExistentField").unwrap(),
            Resolution::Unknown { known_prefix: "Order".into(), open_record: None }
        );
        assert_eq!(
            env.resolve("Order.Meta.anything").unwrap(),
            Resolution::Unknown { known_prefix: "Order.Meta".into(), open_record: Some("Order.Meta".into()) }
        );
        assert_eq!(
            env.resolve("Customer.id").unwrap(),
            Resolution::Unknown { known_prefix: String::new(), open_record: None }
        );
        assert!(env.resolve("Order..x").is_err());
    }

    #[test]
    fn locals_shadow_and_stay_scoped() {
        let env = order_env();
        let inner = env.bind("i", item());
        assert_eq!(inner.resolve("i.price").unwrap(), Resolution::Found(SemanticType::number()));
        assert!(env.local("i").is_none());

        let shadowed = inner.bind("i", SemanticType::string());
        assert_eq!(shadowed.local("i"), Some(&SemanticType::string()));
        assert_eq!(inner.local("i"), Some(&item()));
    }

    #[test]
    fn any_absorbs_navigation() {
        let env = TypeEnvironment::new().bind("x", SemanticType::any());
        assert_eq!(env.resolve("x.a.b[*].c").unwrap(), Resolution::Found(SemanticType::any()));
    }

    #[test]
    fn nullable_record_navigates_through_null() {
        let rec = SemanticType::union([item(), SemanticType::null()]);
        let env = TypeEnvironment::new().bind("r", rec);
        assert_eq!(env.resolve("r.price").unwrap(), Resolution::Found(SemanticType::number()));
    }

    #[test]
    fn combine_and_share_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypeEnvironment>();

        let a = order_env();
        let mut other = IndexMap::new();
        other.insert("Customer".to_string(), SemanticType::string());
        let both = TypeEnvironment::combine([a.clone(), TypeEnvironment::from_entries(other)]);
        assert_eq!(both.len(), a.len() + 1);
        assert_eq!(both.lookup("Customer"), Some(&SemanticType::string()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let env = both.clone();
                std::thread::spawn(move || env.resolve("Order.Items.Item[*].price").unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Resolution::Found(SemanticType::number()));
        }
    }
}
