//! Function signatures and call-site instantiation.
//!
//! Signatures are written with placeholders (`Generic("T")`); every call
//! gets a fresh [`Substitution`] that binds them from the argument types and
//! is then applied to the remaining parameters and to the return type.
use std::fmt;

use indexmap::IndexMap;

use crate::types::{self, SemanticType};

// ----------------------------- Signatures --------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<SemanticType>,
    pub ret: SemanticType,
    /// Last parameter repeats; at least `params.len()` arguments.
    pub variadic: bool,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, params: Vec<SemanticType>, ret: SemanticType) -> Self {
        Self { name: name.into(), params, ret, variadic: false }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn accepts_arity(&self, n: usize) -> bool {
        if self.variadic { n >= self.params.len() } else { n == self.params.len() }
    }

    /// Declared parameter type for argument `index`, if the signature has one.
    pub fn param_for(&self, index: usize) -> Option<&SemanticType> {
        match self.params.get(index) {
            Some(p) => Some(p),
            None if self.variadic => self.params.last(),
            None => None,
        }
    }

    /// Human-readable arity for diagnostics.
    pub fn arity_text(&self) -> String {
        let n = self.params.len();
        let plural = if n == 1 { "" } else { "s" };
        if self.variadic { format!("at least {n} argument{plural}") } else { format!("{n} argument{plural}") }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 { f.write_str(", ")?; }
            write!(f, "{p}")?;
        }
        if self.variadic { f.write_str("...")?; }
        write!(f, ") -> {}", self.ret)
    }
}

// ------------------------------ Registry ---------------------------------- //

/// Name → signature. Read-only during inference, so one registry serves
/// any number of concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct FunctionSignatureRegistry {
    signatures: IndexMap<String, FunctionSignature>,
}

impl FunctionSignatureRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        use SemanticType as T;
        let t = || T::generic("T");
        let r = || T::generic("R");
        let a = || T::generic("A");
        let arr = T::array;
        let func = T::function;

        let mut reg = Self::empty();
        reg.register(FunctionSignature::new("map", vec![arr(t()), func(vec![t()], r())], arr(r())));
        reg.register(FunctionSignature::new("filter", vec![arr(t()), func(vec![t()], T::boolean())], arr(t())));
        reg.register(FunctionSignature::new("reduce", vec![arr(t()), func(vec![a(), t()], a()), a()], a()));
        for name in ["sum", "avg", "average"] {
            reg.register(FunctionSignature::new(name, vec![arr(T::number())], T::number()));
        }
        reg.register(FunctionSignature::new("count", vec![arr(T::any())], T::integer()));
        for name in ["min", "max", "first", "last"] {
            reg.register(FunctionSignature::new(name, vec![arr(t())], t()));
        }
        for name in ["distinct", "sort", "reverse"] {
            reg.register(FunctionSignature::new(name, vec![arr(t())], arr(t())));
        }
        reg.register(FunctionSignature::new("sortBy", vec![arr(t()), func(vec![t()], T::any())], arr(t())));
        reg.register(FunctionSignature::new("flatten", vec![arr(arr(t()))], arr(t())));
        for name in ["size", "length"] {
            reg.register(FunctionSignature::new(name, vec![T::any()], T::integer()));
        }
        for name in ["isEmpty", "exists"] {
            reg.register(FunctionSignature::new(name, vec![T::any()], T::boolean()));
        }
        reg.register(FunctionSignature::new("keys", vec![T::any()], arr(T::string())));
        for name in ["upper", "lower", "trim"] {
            reg.register(FunctionSignature::new(name, vec![T::string()], T::string()));
        }
        reg.register(FunctionSignature::new(
            "substring",
            vec![T::string(), T::integer(), T::integer()],
            T::string(),
        ));
        for name in ["contains", "startsWith", "endsWith"] {
            reg.register(FunctionSignature::new(name, vec![T::string(), T::string()], T::boolean()));
        }
        reg.register(FunctionSignature::new("split", vec![T::string(), T::string()], arr(T::string())));
        reg.register(FunctionSignature::new("join", vec![arr(T::string()), T::string()], T::string()));
        reg.register(FunctionSignature::new("concat", vec![T::string()], T::string()).variadic());
        reg.register(FunctionSignature::new("coalesce", vec![t()], t()).variadic());
        reg.register(FunctionSignature::new("toString", vec![T::any()], T::string()));
        reg.register(FunctionSignature::new("toNumber", vec![T::any()], T::number()));
        reg.register(FunctionSignature::new("toInteger", vec![T::any()], T::integer()));
        reg.register(FunctionSignature::new("abs", vec![T::number()], T::number()));
        for name in ["round", "floor", "ceil"] {
            reg.register(FunctionSignature::new(name, vec![T::number()], T::integer()));
        }
        reg.register(FunctionSignature::new("now", vec![], T::string()));
        reg.register(FunctionSignature::new("formatDate", vec![T::string(), T::string()], T::string()));
        reg
    }

    /// Adds or replaces a signature.
    pub fn register(&mut self, signature: FunctionSignature) {
        self.signatures.insert(signature.name.clone(), signature);
    }

    pub fn with(mut self, signature: FunctionSignature) -> Self {
        self.register(signature);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.signatures.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

// ---------------------------- Substitution -------------------------------- //

/// Placeholder bindings for one call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: IndexMap<String, SemanticType>,
}

/// A placeholder saw two argument types neither of which covers the other.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub placeholder: String,
    pub bound: SemanticType,
    pub found: SemanticType,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, placeholder: &str) -> Option<&SemanticType> {
        self.bindings.get(placeholder)
    }

    /// Match `actual` against `param`, binding placeholders on first sight
    /// and widening a binding when a later argument covers it. Structural
    /// mismatches are left to the assignability check on the applied type.
    pub fn bind(&mut self, param: &SemanticType, actual: &SemanticType) -> Result<(), Conflict> {
        use SemanticType as T;
        if actual.is_any() {
            self.bind_any(param);
            return Ok(());
        }
        match (param, actual) {
            (T::Generic(id), _) => self.bind_placeholder(id, actual),
            (T::Array(p), T::Array(a)) => self.bind(p, a),
            // alternative arrays merge into one element type
            (T::Array(_), T::Union(_)) => match types::widen(&actual.without_null()) {
                T::Array(a) => self.bind(param, &T::Array(a)),
                _ => Ok(()),
            },
            (T::Function { params: pp, ret: pr }, T::Function { params: ap, ret: ar }) => {
                for (p, a) in pp.iter().zip(ap) {
                    if !a.is_any() {
                        self.bind(p, a)?;
                    }
                }
                self.bind(pr, ar)
            }
            _ => Ok(()),
        }
    }

    fn bind_placeholder(&mut self, id: &str, actual: &SemanticType) -> Result<(), Conflict> {
        if actual.is_null() {
            return Ok(());
        }
        let actual = actual.without_null();
        match self.bindings.get(id) {
            None => {
                self.bindings.insert(id.to_string(), actual);
                Ok(())
            }
            Some(bound) if types::is_assignable(&actual, bound) => Ok(()),
            Some(bound) if types::is_assignable(bound, &actual) => {
                self.bindings.insert(id.to_string(), actual);
                Ok(())
            }
            Some(bound) => Err(Conflict {
                placeholder: id.to_string(),
                bound: bound.clone(),
                found: actual,
            }),
        }
    }

    /// An Any argument says nothing; every placeholder it touches becomes Any.
    fn bind_any(&mut self, param: &SemanticType) {
        match param {
            SemanticType::Generic(id) => {
                self.bindings.insert(id.clone(), SemanticType::any());
            }
            SemanticType::Array(el) => self.bind_any(el),
            SemanticType::Function { params, ret } => {
                params.iter().for_each(|p| self.bind_any(p));
                self.bind_any(ret);
            }
            SemanticType::Union(alts) => alts.iter().for_each(|a| self.bind_any(a)),
            SemanticType::Record(r) => r.fields.values().for_each(|f| self.bind_any(&f.ty)),
            SemanticType::Scalar(_) => {}
        }
    }

    /// Replace placeholders; unbound ones become Any.
    pub fn apply(&self, ty: &SemanticType) -> SemanticType {
        use SemanticType as T;
        match ty {
            T::Generic(id) => self.bindings.get(id).cloned().unwrap_or(T::ANY),
            T::Scalar(_) => ty.clone(),
            T::Array(el) => T::array(self.apply(el)),
            T::Union(alts) => T::union(alts.iter().map(|a| self.apply(a))),
            T::Record(r) => {
                let mut r = r.clone();
                for slot in r.fields.values_mut() {
                    slot.ty = self.apply(&slot.ty);
                }
                T::Record(r)
            }
            T::Function { params, ret } => {
                T::function(params.iter().map(|p| self.apply(p)).collect(), self.apply(ret))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn catalog_covers_the_builtins() {
        let reg = FunctionSignatureRegistry::builtin();
        for name in ["map", "filter", "reduce", "sum", "avg", "average", "count", "concat", "coalesce", "now"] {
            assert!(reg.get(name).is_some(), "missing {name}");
        }
        assert!(reg.get("frobnicate").is_none());
        assert_eq!(
            reg.get("map").unwrap().to_string(),
            "map(Array<T>, (T) -> R) -> Array<R>"
        );
    }

    #[test]
    fn arity_rules() {
        let reg = FunctionSignatureRegistry::builtin();
        let sum = reg.get("sum").unwrap();
        assert!(sum.accepts_arity(1) && !sum.accepts_arity(2) && !sum.accepts_arity(0));

        let concat = reg.get("concat").unwrap();
        assert!(concat.accepts_arity(1) && concat.accepts_arity(5) && !concat.accepts_arity(0));
        assert_eq!(concat.param_for(4), Some(&SemanticType::string()));
        assert_eq!(sum.param_for(1), None);
        assert_eq!(concat.arity_text(), "at least 1 argument");
    }

    #[test]
    fn binds_through_arrays_and_functions() {
        let reg = FunctionSignatureRegistry::builtin();
        let map = reg.get("map").unwrap();
        let mut s = Substitution::new();
        s.bind(&map.params[0], &SemanticType::array(SemanticType::integer())).unwrap();
        assert_eq!(s.apply(&map.params[1]), SemanticType::function(vec![SemanticType::integer()], SemanticType::any()));

        let lambda = SemanticType::function(vec![SemanticType::integer()], SemanticType::string());
        s.bind(&map.params[1], &lambda).unwrap();
        assert_eq!(s.apply(&map.ret), SemanticType::array(SemanticType::string()));
    }

    #[test]
    fn later_arguments_may_widen_but_not_contradict() {
        let mut s = Substitution::new();
        let t = SemanticType::generic("T");
        s.bind(&t, &SemanticType::integer()).unwrap();
        s.bind(&t, &SemanticType::number()).unwrap();
        assert_eq!(s.get("T"), Some(&SemanticType::number()));
        s.bind(&t, &SemanticType::integer()).unwrap();
        assert_eq!(s.get("T"), Some(&SemanticType::number()));

        let err = s.bind(&t, &SemanticType::string()).unwrap_err();
        assert_eq!(err.placeholder, "T");
        assert_eq!(err.found, SemanticType::string());
    }

    #[test]
    fn union_of_arrays_binds_the_merged_element() {
        let reg = FunctionSignatureRegistry::builtin();
        let first = reg.get("first").unwrap();
        let either = SemanticType::union([
            SemanticType::array(SemanticType::integer()),
            SemanticType::array(SemanticType::string()),
        ]);
        let mut s = Substitution::new();
        s.bind(&first.params[0], &either).unwrap();
        assert_eq!(s.apply(&first.ret), SemanticType::union([SemanticType::integer(), SemanticType::string()]));
    }

    #[test]
    fn null_and_any_arguments() {
        let t = SemanticType::generic("T");
        let mut s = Substitution::new();
        s.bind(&t, &SemanticType::null()).unwrap();
        assert_eq!(s.get("T"), None);
        s.bind(&t, &SemanticType::union([SemanticType::string(), SemanticType::null()])).unwrap();
        assert_eq!(s.get("T"), Some(&SemanticType::string()));

        let mut s = Substitution::new();
        s.bind(&SemanticType::array(t.clone()), &SemanticType::any()).unwrap();
        assert_eq!(s.apply(&t), SemanticType::any());
        assert_eq!(Substitution::new().apply(&SemanticType::array(t)), SemanticType::array(SemanticType::any()));
    }

    #[test]
    fn custom_signatures_extend_the_catalog() {
        let reg = FunctionSignatureRegistry::empty()
            .with(FunctionSignature::new("lookupRate", vec![SemanticType::string()], SemanticType::number()));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["lookupRate"]);
    }
}
