//! Semantic type algebra.
//!
//! The closed set of types every other module speaks, independent of any
//! schema dialect's type names, plus the operations the engine leans on:
//! - `is_assignable`: structural compatibility (Integer ⊑ Number, open records)
//! - `unify`: "could be either"; flat, deduplicated unions
//! - `widen`: merges record/array alternatives of heterogeneous literals
//!
//! Values are plain trees: cloning is the sharing model, nothing aliases.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticType {
    Scalar(Scalar),
    Array(Box<SemanticType>),
    Record(RecordType),
    /// Flattened, deduplicated, at least two members, never nests a Union.
    /// Build through [`SemanticType::union`] to keep that shape.
    Union(Vec<SemanticType>),
    /// Placeholder that only appears inside function signatures.
    Generic(String),
    Function {
        params: Vec<SemanticType>,
        ret: Box<SemanticType>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordType {
    pub fields: IndexMap<String, FieldSlot>,
    /// Tolerates fields beyond the declared ones.
    pub open_ended: bool,
}

/// Upper cardinality bound. Serialized as a number or `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OccursRepr", into = "OccursRepr")]
pub enum Occurs {
    Bounded(u32),
    Unbounded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub ty: SemanticType,
    pub required: bool,
    pub min_occurs: u32,
    pub max_occurs: Occurs,
    /// Orthogonal to `required`: a present field may still hold null.
    pub nullable: bool,
}

// ---------------------------- Constructors -------------------------------- //

impl SemanticType {
    pub const ANY: SemanticType = SemanticType::Scalar(Scalar::Any);

    pub fn string() -> Self { Self::Scalar(Scalar::String) }
    pub fn number() -> Self { Self::Scalar(Scalar::Number) }
    pub fn integer() -> Self { Self::Scalar(Scalar::Integer) }
    pub fn boolean() -> Self { Self::Scalar(Scalar::Boolean) }
    pub fn null() -> Self { Self::Scalar(Scalar::Null) }
    pub fn any() -> Self { Self::ANY }

    pub fn array(element: SemanticType) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn generic(id: impl Into<String>) -> Self {
        Self::Generic(id.into())
    }

    pub fn function(params: Vec<SemanticType>, ret: SemanticType) -> Self {
        Self::Function { params, ret: Box::new(ret) }
    }

    pub fn record<I, K>(fields: I, open_ended: bool) -> Self
    where
        I: IntoIterator<Item = (K, FieldSlot)>,
        K: Into<String>,
    {
        Self::Record(RecordType {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            open_ended,
        })
    }

    /// Canonical union: flattens, drops duplicates, absorbs into Any,
    /// folds Integer into Number, and collapses a single member.
    /// No members at all means nothing is known, which is Any.
    pub fn union<I>(members: I) -> Self
    where
        I: IntoIterator<Item = SemanticType>,
    {
        let mut flat: Vec<SemanticType> = Vec::new();
        for member in members {
            match member {
                SemanticType::Union(inner) => {
                    for m in inner { push_unique(&mut flat, m); }
                }
                other => push_unique(&mut flat, other),
            }
        }
        if flat.iter().any(SemanticType::is_any) {
            return SemanticType::ANY;
        }
        if flat.contains(&SemanticType::number()) {
            flat.retain(|t| *t != SemanticType::integer());
        }
        match flat.len() {
            0 => SemanticType::ANY,
            1 => flat.remove(0),
            _ => SemanticType::Union(flat),
        }
    }
}

fn push_unique(out: &mut Vec<SemanticType>, ty: SemanticType) {
    if !out.contains(&ty) {
        out.push(ty);
    }
}

impl FieldSlot {
    /// Exactly one, always present.
    pub fn required(ty: SemanticType) -> Self {
        Self::with_occurs(ty, 1, Occurs::Bounded(1))
    }

    /// Zero or one.
    pub fn optional(ty: SemanticType) -> Self {
        Self::with_occurs(ty, 0, Occurs::Bounded(1))
    }

    /// Zero-or-more field: an array slot with open cardinality.
    pub fn repeated(element: SemanticType) -> Self {
        Self::with_occurs(SemanticType::array(element), 0, Occurs::Unbounded)
    }

    /// Normalizes so that `min <= max` and `required` follows `min >= 1`.
    pub fn with_occurs(ty: SemanticType, min_occurs: u32, max_occurs: Occurs) -> Self {
        let max_occurs = match max_occurs {
            Occurs::Bounded(max) if max < min_occurs => Occurs::Bounded(min_occurs),
            other => other,
        };
        Self {
            ty,
            required: min_occurs >= 1,
            min_occurs,
            max_occurs,
            nullable: false,
        }
    }

    /// Marks the slot nullable and adds the Null alternative to its type.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.ty = unify(&self.ty, &SemanticType::null());
        self
    }

    /// Slot for a value computed by a record-construction property.
    pub fn from_inferred(ty: SemanticType) -> Self {
        let nullable = ty.contains_null() && !ty.is_null();
        let mut slot = match ty {
            SemanticType::Array(_) => Self::with_occurs(ty, 0, Occurs::Unbounded),
            other => Self::required(other),
        };
        slot.nullable = nullable;
        slot
    }

    pub fn is_repeated(&self) -> bool {
        match self.max_occurs {
            Occurs::Unbounded => true,
            Occurs::Bounded(max) => max > 1,
        }
    }
}

impl Occurs {
    pub fn is_many(self) -> bool {
        !matches!(self, Occurs::Bounded(0 | 1))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OccursRepr {
    Bounded(u32),
    Keyword(String),
}

impl TryFrom<OccursRepr> for Occurs {
    type Error = String;
    fn try_from(repr: OccursRepr) -> Result<Self, Self::Error> {
        match repr {
            OccursRepr::Bounded(n) => Ok(Occurs::Bounded(n)),
            OccursRepr::Keyword(k) if k == "unbounded" || k == "*" => Ok(Occurs::Unbounded),
            OccursRepr::Keyword(k) => Err(format!("expected a number or \"unbounded\", found {k:?}")),
        }
    }
}

impl From<Occurs> for OccursRepr {
    fn from(occurs: Occurs) -> Self {
        match occurs {
            Occurs::Bounded(n) => OccursRepr::Bounded(n),
            Occurs::Unbounded => OccursRepr::Keyword("unbounded".to_string()),
        }
    }
}

// ----------------------------- Predicates --------------------------------- //

impl SemanticType {
    pub fn is_any(&self) -> bool {
        matches!(self, SemanticType::Scalar(Scalar::Any))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SemanticType::Scalar(Scalar::Null))
    }

    pub fn contains_null(&self) -> bool {
        match self {
            SemanticType::Union(alts) => alts.iter().any(SemanticType::is_null),
            other => other.is_null(),
        }
    }

    /// Drops the Null alternative; a bare Null stays Null.
    pub fn without_null(&self) -> SemanticType {
        match self {
            SemanticType::Union(alts) => {
                SemanticType::union(alts.iter().filter(|t| !t.is_null()).cloned())
            }
            other => other.clone(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        is_assignable(self, &SemanticType::number())
    }

    pub fn is_boolean(&self) -> bool {
        is_assignable(self, &SemanticType::boolean())
    }

    pub fn element(&self) -> Option<&SemanticType> {
        match self {
            SemanticType::Array(el) => Some(el),
            _ => None,
        }
    }

    pub fn has_generics(&self) -> bool {
        match self {
            SemanticType::Generic(_) => true,
            SemanticType::Scalar(_) => false,
            SemanticType::Array(el) => el.has_generics(),
            SemanticType::Record(r) => r.fields.values().any(|f| f.ty.has_generics()),
            SemanticType::Union(alts) => alts.iter().any(SemanticType::has_generics),
            SemanticType::Function { params, ret } => {
                params.iter().any(SemanticType::has_generics) || ret.has_generics()
            }
        }
    }
}

// --------------------------- Assignability -------------------------------- //

/// Can a value of type `from` flow where `to` is expected?
pub fn is_assignable(from: &SemanticType, to: &SemanticType) -> bool {
    use SemanticType as T;
    match (from, to) {
        (T::Scalar(Scalar::Any), _) | (_, T::Scalar(Scalar::Any)) => true,
        (T::Generic(_), _) | (_, T::Generic(_)) => true,
        (T::Union(alts), _) => alts.iter().all(|a| is_assignable(a, to)),
        (_, T::Union(alts)) => alts.iter().any(|b| is_assignable(from, b)),
        (T::Scalar(a), T::Scalar(b)) => a == b || (*a == Scalar::Integer && *b == Scalar::Number),
        (T::Array(a), T::Array(b)) => is_assignable(a, b),
        (T::Record(a), T::Record(b)) => record_assignable(a, b),
        (T::Function { params: pa, ret: ra }, T::Function { params: pb, ret: rb }) => {
            pa.len() == pb.len()
                && pb.iter().zip(pa).all(|(b, a)| is_assignable(b, a))
                && is_assignable(ra, rb)
        }
        _ => false,
    }
}

fn record_assignable(src: &RecordType, dst: &RecordType) -> bool {
    for (name, want) in &dst.fields {
        match src.fields.get(name) {
            Some(have) => {
                if !is_assignable(&have.ty, &want.ty) { return false; }
                if want.required && !have.required { return false; }
            }
            // an open source may still carry the field at runtime
            None => {
                if want.required && !src.open_ended { return false; }
            }
        }
    }
    dst.open_ended || src.fields.keys().all(|k| dst.fields.contains_key(k))
}

// ------------------------------ Unify (∪) --------------------------------- //

pub fn unify(a: &SemanticType, b: &SemanticType) -> SemanticType {
    if a == b {
        return a.clone();
    }
    SemanticType::union([a.clone(), b.clone()])
}

pub fn unify_all<I>(types: I) -> SemanticType
where
    I: IntoIterator<Item = SemanticType>,
{
    SemanticType::union(types)
}

// -------------------------------- Widen ----------------------------------- //

/// Merges the record alternatives of a union into one record and the array
/// alternatives into one array; scalars stay union members.
pub fn widen(ty: &SemanticType) -> SemanticType {
    match ty {
        SemanticType::Union(alts) => widen_all(alts.iter().cloned()),
        other => other.clone(),
    }
}

/// Element type for a literal whose members have the given types.
pub fn widen_all<I>(types: I) -> SemanticType
where
    I: IntoIterator<Item = SemanticType>,
{
    let mut records: Vec<RecordType> = Vec::new();
    let mut elements: Vec<SemanticType> = Vec::new();
    let mut saw_array = false;
    let mut rest: Vec<SemanticType> = Vec::new();

    let flat = types.into_iter().flat_map(|t| match t {
        SemanticType::Union(alts) => alts,
        other => vec![other],
    });
    for ty in flat {
        match ty {
            SemanticType::Record(r) => records.push(r),
            SemanticType::Array(el) => {
                saw_array = true;
                elements.push(*el);
            }
            other => rest.push(other),
        }
    }

    if !records.is_empty() {
        rest.push(SemanticType::Record(merge_records(&records)));
    }
    if saw_array {
        rest.push(SemanticType::array(widen_all(elements)));
    }
    SemanticType::union(rest)
}

/// A field is required only when every record requires it; fields missing
/// from some record become optional.
pub fn merge_records(records: &[RecordType]) -> RecordType {
    let mut out = RecordType {
        fields: IndexMap::new(),
        open_ended: records.iter().any(|r| r.open_ended),
    };
    let names: Vec<&String> = {
        let mut seen: IndexMap<&String, ()> = IndexMap::new();
        for r in records {
            for k in r.fields.keys() { seen.insert(k, ()); }
        }
        seen.into_keys().collect()
    };

    for name in names {
        let slots: Vec<&FieldSlot> = records.iter().filter_map(|r| r.fields.get(name)).collect();
        let everywhere = slots.len() == records.len();
        let ty = widen_all(slots.iter().map(|s| s.ty.clone()));
        let min_occurs = if everywhere {
            slots.iter().map(|s| s.min_occurs).min().unwrap_or(0)
        } else {
            0
        };
        let max_occurs = slots.iter().fold(Occurs::Bounded(0), |acc, s| match (acc, s.max_occurs) {
            (Occurs::Unbounded, _) | (_, Occurs::Unbounded) => Occurs::Unbounded,
            (Occurs::Bounded(a), Occurs::Bounded(b)) => Occurs::Bounded(a.max(b)),
        });
        let mut slot = FieldSlot::with_occurs(ty, min_occurs, max_occurs);
        slot.required = everywhere && slots.iter().all(|s| s.required);
        slot.nullable = slots.iter().any(|s| s.nullable);
        out.fields.insert(name.clone(), slot);
    }
    out
}

// ------------------------- Operator helpers ------------------------------- //

/// Result of an arithmetic operator. Integer only survives when both sides
/// are Integer and the operator keeps integrality (`/` does not).
pub fn numeric_result(left: &SemanticType, right: &SemanticType, keeps_integer: bool) -> SemanticType {
    let integral = |t: &SemanticType| *t == SemanticType::integer();
    if keeps_integer && integral(left) && integral(right) {
        SemanticType::integer()
    } else {
        SemanticType::number()
    }
}

/// Any scalar renders as text; containers do not.
pub fn is_string_coercible(ty: &SemanticType) -> bool {
    match ty {
        SemanticType::Scalar(_) | SemanticType::Generic(_) => true,
        SemanticType::Union(alts) => alts.iter().all(is_string_coercible),
        _ => false,
    }
}

/// Equality across these types can ever be true.
pub fn is_comparable(left: &SemanticType, right: &SemanticType) -> bool {
    if left.is_null() || right.is_null() {
        return true;
    }
    let (l, r) = (left.without_null(), right.without_null());
    is_assignable(&l, &r) || is_assignable(&r, &l) || (l.is_numeric() && r.is_numeric())
}

/// Ordering (`<`, `>=`, ...) is defined on comparable scalars only.
pub fn is_orderable(left: &SemanticType, right: &SemanticType) -> bool {
    let scalarish = |t: &SemanticType| match t.without_null() {
        SemanticType::Scalar(_) | SemanticType::Generic(_) => true,
        SemanticType::Union(alts) => alts.iter().all(|a| matches!(a, SemanticType::Scalar(_))),
        _ => false,
    };
    scalarish(left) && scalarish(right) && is_comparable(left, right)
}

// ------------------------------- Display ---------------------------------- //

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scalar::String => "String",
            Scalar::Number => "Number",
            Scalar::Integer => "Integer",
            Scalar::Boolean => "Boolean",
            Scalar::Null => "Null",
            Scalar::Any => "Any",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Scalar(s) => write!(f, "{s}"),
            SemanticType::Array(el) => write!(f, "Array<{el}>"),
            SemanticType::Record(r) => write!(f, "{r}"),
            SemanticType::Union(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 { f.write_str(" | ")?; }
                    match alt {
                        SemanticType::Function { .. } => write!(f, "({alt})")?,
                        _ => write!(f, "{alt}")?,
                    }
                }
                Ok(())
            }
            SemanticType::Generic(id) => f.write_str(id),
            SemanticType::Function { params, ret } => {
                f.write_str("(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, slot)) in self.fields.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            let mark = if slot.required { "" } else { "?" };
            write!(f, "{name}{mark}: {}", slot.ty)?;
        }
        if self.open_ended {
            if !self.fields.is_empty() { f.write_str(", ")?; }
            f.write_str("...")?;
        }
        f.write_str("}")
    }
}

// ------------------------------- Tests ------------------------------------ //
