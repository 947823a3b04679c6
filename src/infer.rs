//! Static type inference over a transformation AST.
//!
//! One recursive visitor, no state across calls. Every problem becomes a
//! [`Diagnostic`] and the offending subexpression recovers with a type that
//! keeps the rest of the walk useful, usually Any, or the operator's nominal
//! result. Each diagnostic carries a JSON Pointer into the AST's own JSON
//! form (`/args/0/body/left`), so callers can map it back to source.
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::ast::{BinaryOp, Expr, Literal, Node, Property, Span, UnaryOp};
use crate::diagnostic::{Diagnostic, DiagnosticCode, Location, Summary};
use crate::env::{Resolution, TypeEnvironment, navigate};
use crate::path;
use crate::registry::{Conflict, FunctionSignatureRegistry, Substitution};
use crate::types::{self, FieldSlot, RecordType, SemanticType};

/// Nesting beyond this is treated as malformed input.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No diagnostics at all.
    Full,
    /// Something was recovered from; the type is a best effort.
    Partial,
    /// The input itself was malformed.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    #[serde(rename = "type", serialize_with = "as_text")]
    pub ty: SemanticType,
    pub diagnostics: Vec<Diagnostic>,
    pub confidence: Confidence,
}

fn as_text<S: Serializer>(ty: &SemanticType, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(ty)
}

impl InferenceResult {
    pub fn summary(&self) -> Summary {
        Summary::of(&self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Infer the type of `expr` against `env`, collecting every diagnostic.
/// `None` stands for an AST the parser failed to produce.
pub fn infer(expr: Option<&Expr>, env: &TypeEnvironment, registry: &FunctionSignatureRegistry) -> InferenceResult {
    let Some(expr) = expr else {
        return InferenceResult {
            ty: SemanticType::ANY,
            diagnostics: vec![Diagnostic::new(
                DiagnosticCode::InternalError,
                "no expression to analyze",
                Location::default(),
            )],
            confidence: Confidence::None,
        };
    };

    let mut engine = Engine {
        registry,
        diagnostics: Vec::new(),
        pointer: String::new(),
        depth: 0,
        too_deep: false,
    };
    let ty = engine.expr(expr, env);
    let confidence = if engine.diagnostics.iter().any(|d| d.code == DiagnosticCode::InternalError) {
        Confidence::None
    } else if engine.diagnostics.is_empty() {
        Confidence::Full
    } else {
        Confidence::Partial
    };
    debug!(%ty, diagnostics = engine.diagnostics.len(), ?confidence, "inferred expression");
    InferenceResult { ty, diagnostics: engine.diagnostics, confidence }
}

// ------------------------------- Engine ----------------------------------- //

struct Engine<'a> {
    registry: &'a FunctionSignatureRegistry,
    diagnostics: Vec<Diagnostic>,
    /// JSON Pointer of the node being visited.
    pointer: String,
    depth: usize,
    too_deep: bool,
}

impl Engine<'_> {
    fn within<R>(&mut self, segment: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let len = self.pointer.len();
        self.pointer.push('/');
        self.pointer.push_str(segment);
        let out = f(self);
        self.pointer.truncate(len);
        out
    }

    fn descend(&mut self, segment: &str, expr: &Expr, env: &TypeEnvironment) -> SemanticType {
        self.within(segment, |e| e.expr(expr, env))
    }

    fn report(&mut self, code: DiagnosticCode, message: String, span: Option<Span>) {
        trace!(%code, pointer = %self.pointer, %message, "diagnostic");
        let location = Location { pointer: self.pointer.clone(), span };
        self.diagnostics.push(Diagnostic::new(code, message, location));
    }

    fn report_at(&mut self, segment: &str, code: DiagnosticCode, message: String, span: Option<Span>) {
        self.within(segment, |e| e.report(code, message, span));
    }

    fn expr(&mut self, expr: &Expr, env: &TypeEnvironment) -> SemanticType {
        if self.depth >= MAX_DEPTH {
            if !self.too_deep {
                self.too_deep = true;
                self.report(
                    DiagnosticCode::InternalError,
                    format!("expression nests deeper than {MAX_DEPTH} levels"),
                    expr.span,
                );
            }
            return SemanticType::ANY;
        }
        self.depth += 1;
        let ty = self.node(expr, env);
        self.depth -= 1;
        ty
    }

    fn node(&mut self, expr: &Expr, env: &TypeEnvironment) -> SemanticType {
        let span = expr.span;
        match &expr.node {
            Node::Literal { value } => literal_type(value),
            Node::Path { path } => self.path(path, env, span),
            Node::Member { target, field } => {
                let target = self.descend("target", target, env);
                self.member(&target, field, span)
            }
            Node::Index { target, index } => {
                let target_ty = self.descend("target", target, env);
                let index_ty = self.descend("index", index, env);
                self.index(&target_ty, &index_ty, index, span)
            }
            Node::Unary { op, operand } => {
                let ty = self.descend("operand", operand, env);
                self.unary(*op, &ty, operand.span)
            }
            Node::Binary { op, left, right } => {
                let l = self.descend("left", left, env);
                let r = self.descend("right", right, env);
                self.binary(*op, &l, &r, (left.span, right.span), span)
            }
            Node::Call { function, args } => {
                let args: Vec<(String, &Expr)> =
                    args.iter().enumerate().map(|(i, a)| (format!("args/{i}"), a)).collect();
                self.call(function, &args, env, span)
            }
            Node::Pipe { input, call } => match &call.node {
                Node::Call { function, args } => {
                    let mut all = vec![("input".to_string(), input.as_ref())];
                    all.extend(args.iter().enumerate().map(|(i, a)| (format!("call/args/{i}"), a)));
                    self.call(function, &all, env, span)
                }
                _ => {
                    self.descend("input", input, env);
                    self.report_at(
                        "call",
                        DiagnosticCode::InternalError,
                        "the right-hand side of `|>` must be a function call".to_string(),
                        call.span,
                    );
                    SemanticType::ANY
                }
            },
            Node::Lambda { params, body } => self.lambda(params, body, &[], env),
            Node::Record { properties } => self.record(properties, env),
            Node::Array { elements } => {
                if elements.is_empty() {
                    return SemanticType::array(SemanticType::ANY);
                }
                let members: Vec<SemanticType> = elements
                    .iter()
                    .enumerate()
                    .map(|(i, el)| self.descend(&format!("elements/{i}"), el, env))
                    .collect();
                SemanticType::array(types::widen_all(members))
            }
            Node::Conditional { condition, then, otherwise } => {
                let cond = self.descend("condition", condition, env);
                if !cond.without_null().is_boolean() {
                    self.report_at(
                        "condition",
                        DiagnosticCode::TypeMismatch,
                        format!("condition must be Boolean, found `{cond}`"),
                        condition.span,
                    );
                }
                let then_ty = self.descend("then", then, env);
                let else_ty = match otherwise {
                    Some(otherwise) => self.descend("otherwise", otherwise, env),
                    None => SemanticType::null(),
                };
                types::unify(&then_ty, &else_ty)
            }
            Node::Let { name, value, body } => {
                let value_ty = self.descend("value", value, env);
                let scope = env.bind(name.clone(), value_ty);
                self.descend("body", body, &scope)
            }
        }
    }

    // ---- Paths and access ---- //

    fn path(&mut self, raw: &str, env: &TypeEnvironment, span: Option<Span>) -> SemanticType {
        match env.resolve(raw) {
            Ok(Resolution::Found(ty)) => ty,
            Ok(Resolution::Unknown { known_prefix, open_record }) => {
                let message = match (open_record, known_prefix.is_empty()) {
                    (Some(open), _) => format!("`{raw}` is not declared; `{open}` is open-ended, treating it as Any"),
                    (None, false) => format!("`{raw}` does not exist under `{known_prefix}`; treating it as Any"),
                    (None, true) => format!("`{raw}` does not match any input; treating it as Any"),
                };
                self.report(DiagnosticCode::UnknownPath, message, span);
                SemanticType::ANY
            }
            Err(e) => {
                self.report(DiagnosticCode::InternalError, e.to_string(), span);
                SemanticType::ANY
            }
        }
    }

    fn member(&mut self, target: &SemanticType, field: &str, span: Option<Span>) -> SemanticType {
        let segments = match path::parse(field) {
            Ok(segments) => segments,
            Err(e) => {
                self.report(DiagnosticCode::InternalError, e.to_string(), span);
                return SemanticType::ANY;
            }
        };
        match navigate(target, &segments, "") {
            Resolution::Found(ty) => ty,
            Resolution::Unknown { open_record, .. } => {
                let message = if open_record.is_some() {
                    format!("`{field}` is not declared on open-ended `{target}`; treating it as Any")
                } else {
                    format!("`{target}` has no field `{field}`; treating it as Any")
                };
                self.report(DiagnosticCode::UnknownPath, message, span);
                SemanticType::ANY
            }
        }
    }

    fn index(&mut self, target: &SemanticType, index: &SemanticType, index_expr: &Expr, span: Option<Span>) -> SemanticType {
        let base = types::widen(&target.without_null());
        match &base {
            _ if base.is_any() => SemanticType::ANY,
            SemanticType::Array(el) => {
                if !types::is_assignable(&index.without_null(), &SemanticType::integer()) {
                    self.report_at(
                        "index",
                        DiagnosticCode::TypeMismatch,
                        format!("array index must be Integer, found `{index}`"),
                        index_expr.span,
                    );
                }
                el.as_ref().clone()
            }
            SemanticType::Record(_) => match &index_expr.node {
                Node::Literal { value: Literal::String(key) } => self.member(&base, key, span),
                _ if types::is_assignable(&index.without_null(), &SemanticType::string()) => SemanticType::ANY,
                _ => {
                    self.report_at(
                        "index",
                        DiagnosticCode::TypeMismatch,
                        format!("record key must be String, found `{index}`"),
                        index_expr.span,
                    );
                    SemanticType::ANY
                }
            },
            _ => {
                self.report(DiagnosticCode::TypeMismatch, format!("`{target}` cannot be indexed"), span);
                SemanticType::ANY
            }
        }
    }

    // ---- Operators ---- //

    fn unary(&mut self, op: UnaryOp, operand: &SemanticType, span: Option<Span>) -> SemanticType {
        let value = operand.without_null();
        match op {
            UnaryOp::Neg => {
                if !value.is_numeric() {
                    let message = format!("`{op}` expects a Number, found `{operand}`");
                    self.report_at("operand", DiagnosticCode::TypeMismatch, message, span);
                    return SemanticType::number();
                }
                if value == SemanticType::integer() { value } else { SemanticType::number() }
            }
            UnaryOp::Not => {
                if !value.is_boolean() {
                    let message = format!("`{op}` expects a Boolean, found `{operand}`");
                    self.report_at("operand", DiagnosticCode::TypeMismatch, message, span);
                }
                SemanticType::boolean()
            }
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &SemanticType,
        right: &SemanticType,
        (left_span, right_span): (Option<Span>, Option<Span>),
        span: Option<Span>,
    ) -> SemanticType {
        let (l, r) = (left.without_null(), right.without_null());
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                for (side, ty, raw, at) in [("left", &l, left, left_span), ("right", &r, right, right_span)] {
                    if !ty.is_numeric() {
                        let message = format!("`{op}` expects Number operands, found `{raw}`");
                        self.report_at(side, DiagnosticCode::TypeMismatch, message, at);
                    }
                }
                types::numeric_result(&l, &r, op != BinaryOp::Div)
            }
            BinaryOp::Concat => {
                for (side, raw, at) in [("left", left, left_span), ("right", right, right_span)] {
                    if !types::is_string_coercible(raw) {
                        let message = format!("`{op}` expects text-like operands, found `{raw}`");
                        self.report_at(side, DiagnosticCode::TypeMismatch, message, at);
                    }
                }
                SemanticType::string()
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if !types::is_comparable(left, right) {
                    let message = format!("`{left}` and `{right}` are never equal");
                    self.report(DiagnosticCode::IncomparableTypes, message, span);
                }
                SemanticType::boolean()
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !types::is_orderable(left, right) {
                    let message = format!("`{left}` {op} `{right}` has no meaningful ordering");
                    self.report(DiagnosticCode::IncomparableTypes, message, span);
                }
                SemanticType::boolean()
            }
            BinaryOp::And | BinaryOp::Or => {
                for (side, ty, raw, at) in [("left", &l, left, left_span), ("right", &r, right, right_span)] {
                    if !ty.is_boolean() {
                        let message = format!("`{op}` expects Boolean operands, found `{raw}`");
                        self.report_at(side, DiagnosticCode::TypeMismatch, message, at);
                    }
                }
                SemanticType::boolean()
            }
            BinaryOp::Coalesce => {
                if left.is_null() { right.clone() } else { types::unify(&l, right) }
            }
        }
    }

    // ---- Calls ---- //

    /// `args` pairs each argument with its pointer segment relative to the
    /// call, so pipes can present their input as the first argument.
    fn call(&mut self, name: &str, args: &[(String, &Expr)], env: &TypeEnvironment, span: Option<Span>) -> SemanticType {
        let registry = self.registry;
        let Some(sig) = registry.get(name) else {
            self.report(DiagnosticCode::UnknownFunction, format!("unknown function `{name}`"), span);
            for (segment, arg) in args {
                match &arg.node {
                    Node::Lambda { params, body } => {
                        self.within(segment, |e| e.lambda(params, body, &[], env));
                    }
                    _ => {
                        self.descend(segment, arg, env);
                    }
                }
            }
            return SemanticType::ANY;
        };

        if !sig.accepts_arity(args.len()) {
            let message = format!("`{name}` takes {}, found {}", sig.arity_text(), args.len());
            self.report(DiagnosticCode::ArityMismatch, message, span);
        }

        let mut subst = Substitution::new();
        let mut actual: Vec<Option<SemanticType>> = vec![None; args.len()];
        let mut flagged = vec![false; args.len()];

        // values first, so lambdas see every placeholder the values pin down
        for (i, (segment, arg)) in args.iter().enumerate() {
            if arg.is_lambda() {
                continue;
            }
            let ty = self.descend(segment, arg, env);
            if let Some(param) = sig.param_for(i) {
                if let Err(conflict) = subst.bind(param, &ty) {
                    self.report_at(segment, DiagnosticCode::TypeMismatch, conflict_message(name, i, &conflict), arg.span);
                    flagged[i] = true;
                }
            }
            actual[i] = Some(ty);
        }

        for (i, (segment, arg)) in args.iter().enumerate() {
            let Node::Lambda { params, body } = &arg.node else { continue };
            let expected = sig.param_for(i).map(|p| subst.apply(p));
            let expected_params: &[SemanticType] = match &expected {
                Some(SemanticType::Function { params: supplied, .. }) => {
                    if supplied.len() != params.len() {
                        let message = format!(
                            "lambda passed to `{name}` takes {} parameter(s), but `{name}` supplies {}",
                            params.len(),
                            supplied.len()
                        );
                        self.report_at(segment, DiagnosticCode::ArityMismatch, message, arg.span);
                        flagged[i] = true;
                    }
                    supplied
                }
                _ => &[],
            };
            let ty = self.within(segment, |e| e.lambda(params, body, expected_params, env));
            if let Some(param) = sig.param_for(i) {
                if let Err(conflict) = subst.bind(param, &ty) {
                    self.report_at(segment, DiagnosticCode::TypeMismatch, conflict_message(name, i, &conflict), arg.span);
                    flagged[i] = true;
                }
            }
            actual[i] = Some(ty);
        }

        for (i, (segment, arg)) in args.iter().enumerate() {
            let (Some(param), Some(found)) = (sig.param_for(i), &actual[i]) else { continue };
            if flagged[i] {
                continue;
            }
            let expected = subst.apply(param);
            if let Some(message) = argument_mismatch(name, i, found, &expected) {
                self.report_at(segment, DiagnosticCode::TypeMismatch, message, arg.span);
            }
        }

        subst.apply(&sig.ret)
    }

    /// Parameters take `expected` where given, Any otherwise.
    fn lambda(&mut self, params: &[String], body: &Expr, expected: &[SemanticType], env: &TypeEnvironment) -> SemanticType {
        let mut scope = env.clone();
        let mut param_types = Vec::with_capacity(params.len());
        for (i, name) in params.iter().enumerate() {
            let ty = expected.get(i).cloned().unwrap_or(SemanticType::ANY);
            scope = scope.bind(name.clone(), ty.clone());
            param_types.push(ty);
        }
        let ret = self.descend("body", body, &scope);
        SemanticType::function(param_types, ret)
    }

    // ---- Construction ---- //

    fn record(&mut self, properties: &[Property], env: &TypeEnvironment) -> SemanticType {
        let mut scope = env.clone();
        let mut record = RecordType::default();
        for (i, property) in properties.iter().enumerate() {
            let segment = format!("properties/{i}/value");
            match property {
                Property::Field { name, value } => {
                    let ty = self.descend(&segment, value, &scope);
                    record.fields.insert(name.clone(), FieldSlot::from_inferred(ty));
                }
                Property::Let { name, value } => {
                    let ty = self.descend(&segment, value, &scope);
                    scope = scope.bind(name.clone(), ty);
                }
            }
        }
        SemanticType::Record(record)
    }
}

fn literal_type(value: &Literal) -> SemanticType {
    match value {
        Literal::Null => SemanticType::null(),
        Literal::Boolean(_) => SemanticType::boolean(),
        Literal::Integer(_) => SemanticType::integer(),
        Literal::Number(_) => SemanticType::number(),
        Literal::String(_) => SemanticType::string(),
    }
}

fn conflict_message(function: &str, index: usize, conflict: &Conflict) -> String {
    format!(
        "argument {} of `{function}` is `{}`, but `{}` is already `{}` here",
        index + 1,
        conflict.found,
        conflict.placeholder,
        conflict.bound
    )
}

/// Null arguments pass (calls propagate null); lambdas are judged on what
/// they return.
fn argument_mismatch(function: &str, index: usize, found: &SemanticType, expected: &SemanticType) -> Option<String> {
    match (found, expected) {
        (SemanticType::Function { ret: found_ret, .. }, SemanticType::Function { ret: want_ret, .. }) => {
            (!types::is_assignable(found_ret, want_ret)).then(|| {
                format!("lambda passed to `{function}` returns `{found_ret}`, expected `{want_ret}`")
            })
        }
        _ if found.is_null() => None,
        _ => (!types::is_assignable(&found.without_null(), expected)).then(|| {
            format!("argument {} of `{function}` expects `{expected}`, found `{found}`", index + 1)
        }),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::from_schema;
    use crate::schema::{ScalarKind, SchemaDocument, SchemaNode};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn env() -> TypeEnvironment {
        let doc = SchemaDocument {
            root: SchemaNode::structure("Order", vec![
                SchemaNode::scalar("id", ScalarKind::String).attribute(),
                SchemaNode::scalar("Total", ScalarKind::Decimal),
                SchemaNode::scalar("Status", ScalarKind::String).optional(),
                SchemaNode::scalar("Discount", ScalarKind::Decimal).nullable(),
                SchemaNode::structure("Items", vec![
                    SchemaNode::structure("Item", vec![
                        SchemaNode::scalar("price", ScalarKind::Decimal),
                        SchemaNode::scalar("quantity", ScalarKind::Integer),
                    ])
                    .repeated(),
                ]),
                SchemaNode::structure("Extra", vec![]).open(),
            ]),
            definitions: IndexMap::new(),
        };
        from_schema(&doc, None).unwrap()
    }

    fn run(expr: &Expr) -> InferenceResult {
        infer(Some(expr), &env(), &FunctionSignatureRegistry::builtin())
    }

    fn items() -> Expr {
        Expr::path("Order.Items.Item")
    }

    fn codes(result: &InferenceResult) -> Vec<DiagnosticCode> {
        result.diagnostics.iter().map(|d| d.code).collect()
    }

    fn item_type() -> SemanticType {
        SemanticType::record(
            [
                ("price", FieldSlot::required(SemanticType::number())),
                ("quantity", FieldSlot::required(SemanticType::integer())),
            ],
            false,
        )
    }

    #[test]
    fn literals() {
        assert_eq!(run(&Expr::int(1)).ty, SemanticType::integer());
        assert_eq!(run(&Expr::number(1.5)).ty, SemanticType::number());
        assert_eq!(run(&Expr::string("x")).ty, SemanticType::string());
        assert_eq!(run(&Expr::boolean(true)).ty, SemanticType::boolean());
        assert_eq!(run(&Expr::null()).ty, SemanticType::null());
    }

    #[test]
    fn sum_of_mapped_line_totals_is_a_clean_number() {
        let line_total = Expr::lambda(
            ["i"],
            Expr::binary(BinaryOp::Mul, Expr::path("i.price"), Expr::path("i.quantity")),
        );
        let expr = Expr::call("sum", vec![Expr::pipe(items(), Expr::call("map", vec![line_total]))]);
        let result = run(&expr);
        assert_eq!(result.ty, SemanticType::number());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.confidence, Confidence::Full);
    }

    #[test]
    fn sum_of_records_is_one_mismatch_recovering_as_number() {
        let result = run(&Expr::call("sum", vec![items()]));
        assert_eq!(result.ty, SemanticType::number());
        assert_eq!(codes(&result), vec![DiagnosticCode::TypeMismatch]);
        assert_eq!(result.diagnostics[0].location.pointer, "/args/0");
        assert_eq!(result.confidence, Confidence::Partial);
    }

    #[test]
    fn unknown_field_is_a_warning_and_any() {
        let result = run(&Expr::path("Order.NonExistentField"));
        assert_eq!(result.ty, SemanticType::any());
        assert_eq!(codes(&result), vec![DiagnosticCode::UnknownPath]);
        assert!(!result.has_errors());
        assert!(result.diagnostics[0].message.contains("under `Order`"));

        let open = run(&Expr::path("Order.Extra.whatever"));
        assert!(open.diagnostics[0].message.contains("`Order.Extra` is open-ended"));
    }

    #[test]
    fn map_returns_array_of_the_lambda_result() {
        let expr = Expr::call("map", vec![items(), Expr::lambda(["i"], Expr::member(Expr::path("i"), "quantity"))]);
        let result = run(&expr);
        assert_eq!(result.ty, SemanticType::array(SemanticType::integer()));
        assert!(result.diagnostics.is_empty());

        let projected = run(&Expr::path("Order.Items.Item.price"));
        assert_eq!(projected.ty, SemanticType::array(SemanticType::number()));
    }

    #[test]
    fn filter_keeps_element_type_and_wants_a_boolean_predicate() {
        let ok = Expr::call("filter", vec![
            items(),
            Expr::lambda(["i"], Expr::binary(BinaryOp::Gt, Expr::path("i.price"), Expr::int(10))),
        ]);
        assert_eq!(run(&ok).ty, SemanticType::array(item_type()));

        let bad = Expr::call("filter", vec![items(), Expr::lambda(["i"], Expr::path("i.price"))]);
        let result = run(&bad);
        assert_eq!(result.ty, SemanticType::array(item_type()));
        assert_eq!(codes(&result), vec![DiagnosticCode::TypeMismatch]);
        assert_eq!(result.diagnostics[0].location.pointer, "/args/1");
    }

    #[test]
    fn reduce_learns_the_accumulator_from_the_seed() {
        let expr = Expr::call("reduce", vec![
            items(),
            Expr::lambda(["acc", "i"], Expr::binary(BinaryOp::Add, Expr::path("acc"), Expr::path("i.quantity"))),
            Expr::int(0),
        ]);
        let result = run(&expr);
        assert_eq!(result.ty, SemanticType::integer());
        assert!(result.diagnostics.is_empty());

        let widened = Expr::call("reduce", vec![
            items(),
            Expr::lambda(["acc", "i"], Expr::binary(BinaryOp::Add, Expr::path("acc"), Expr::path("i.price"))),
            Expr::int(0),
        ]);
        assert_eq!(run(&widened).ty, SemanticType::number());
    }

    #[test]
    fn call_errors() {
        let unknown = run(&Expr::call("frobnicate", vec![Expr::path("Order.Nope")]));
        assert_eq!(codes(&unknown), vec![DiagnosticCode::UnknownFunction, DiagnosticCode::UnknownPath]);
        assert_eq!(unknown.ty, SemanticType::any());

        let arity = run(&Expr::call("upper", vec![Expr::string("a"), Expr::string("b")]));
        assert_eq!(codes(&arity), vec![DiagnosticCode::ArityMismatch]);
        assert_eq!(arity.ty, SemanticType::string());

        let lambda = run(&Expr::call("map", vec![items(), Expr::lambda(["a", "b"], Expr::path("a"))]));
        assert_eq!(codes(&lambda), vec![DiagnosticCode::ArityMismatch]);
        assert_eq!(lambda.diagnostics[0].location.pointer, "/args/1");

        let conflict = run(&Expr::call("coalesce", vec![Expr::int(1), Expr::string("x")]));
        assert_eq!(codes(&conflict), vec![DiagnosticCode::TypeMismatch]);
        assert_eq!(conflict.diagnostics[0].location.pointer, "/args/1");
    }

    #[test]
    fn nullable_arguments_are_tolerated() {
        let result = run(&Expr::call("abs", vec![Expr::path("Order.Discount")]));
        assert!(result.diagnostics.is_empty());
        let result = run(&Expr::call("coalesce", vec![Expr::path("Order.Discount"), Expr::int(0)]));
        assert_eq!(result.ty, SemanticType::number());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn independent_errors_are_counted_once_each() {
        let expr = Expr::record(vec![
            Property::field("a", Expr::call("sum", vec![items()])),
            Property::field("b", Expr::call("upper", vec![Expr::int(1)])),
            Property::field("c", Expr::path("Order.Nope")),
            Property::field("d", Expr::binary(BinaryOp::Mul, Expr::string("x"), Expr::int(2))),
        ]);
        let result = run(&expr);
        assert_eq!(result.diagnostics.len(), 4, "{:#?}", result.diagnostics);
        let pointers: Vec<&str> = result.diagnostics.iter().map(|d| d.location.pointer.as_str()).collect();
        assert_eq!(pointers, vec![
            "/properties/0/value/args/0",
            "/properties/1/value/args/0",
            "/properties/2/value",
            "/properties/3/value/left",
        ]);
    }

    #[test]
    fn operators() {
        let int_add = run(&Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2)));
        assert_eq!(int_add.ty, SemanticType::integer());
        let div = run(&Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(2)));
        assert_eq!(div.ty, SemanticType::number());
        let concat = run(&Expr::binary(BinaryOp::Concat, Expr::string("n"), Expr::int(2)));
        assert_eq!((concat.ty, concat.diagnostics.len()), (SemanticType::string(), 0));

        let cmp = run(&Expr::binary(BinaryOp::Eq, Expr::string("a"), Expr::int(1)));
        assert_eq!(cmp.ty, SemanticType::boolean());
        assert_eq!(codes(&cmp), vec![DiagnosticCode::IncomparableTypes]);

        let coalesce = run(&Expr::binary(BinaryOp::Coalesce, Expr::path("Order.Discount"), Expr::int(0)));
        assert_eq!(coalesce.ty, SemanticType::number());

        let not = run(&Expr::unary(UnaryOp::Not, Expr::int(1)));
        assert_eq!((not.ty.clone(), codes(&not)), (SemanticType::boolean(), vec![DiagnosticCode::TypeMismatch]));
        assert_eq!(not.diagnostics[0].location.pointer, "/operand");
    }

    #[test]
    fn conditionals_unify_branches() {
        let expr = Expr::conditional(
            Expr::binary(BinaryOp::Gt, Expr::path("Order.Total"), Expr::int(100)),
            Expr::string("big"),
            None,
        );
        let result = run(&expr);
        assert_eq!(result.ty, SemanticType::union([SemanticType::string(), SemanticType::null()]));

        let bad = run(&Expr::conditional(Expr::path("Order.Total"), Expr::int(1), Some(Expr::number(2.0))));
        assert_eq!(bad.ty, SemanticType::number());
        assert_eq!(codes(&bad), vec![DiagnosticCode::TypeMismatch]);
        assert_eq!(bad.diagnostics[0].location.pointer, "/condition");
    }

    #[test]
    fn records_bind_lets_for_later_properties() {
        let expr = Expr::record(vec![
            Property::binding("n", Expr::call("count", vec![items()])),
            Property::field("count", Expr::path("n")),
            Property::field("discount", Expr::path("Order.Discount")),
            Property::field("prices", Expr::path("Order.Items.Item.price")),
        ]);
        let SemanticType::Record(record) = run(&expr).ty else { panic!("record expected") };
        assert_eq!(record.fields.keys().collect::<Vec<_>>(), vec!["count", "discount", "prices"]);
        assert_eq!(record.fields["count"].ty, SemanticType::integer());
        assert!(record.fields["discount"].nullable && record.fields["discount"].required);
        assert!(!record.fields["prices"].required);

        // a let is not visible to properties before it
        let early = Expr::record(vec![
            Property::field("x", Expr::path("later")),
            Property::binding("later", Expr::int(1)),
        ]);
        assert_eq!(codes(&run(&early)), vec![DiagnosticCode::UnknownPath]);
    }

    #[test]
    fn array_literals_widen() {
        let expr = Expr::array(vec![Expr::int(1), Expr::number(2.0)]);
        assert_eq!(run(&expr).ty, SemanticType::array(SemanticType::number()));
        assert_eq!(run(&Expr::array(vec![])).ty, SemanticType::array(SemanticType::any()));

        let records = Expr::array(vec![
            Expr::record(vec![Property::field("a", Expr::int(1))]),
            Expr::record(vec![Property::field("b", Expr::string("x"))]),
        ]);
        let SemanticType::Array(el) = run(&records).ty else { panic!() };
        let SemanticType::Record(r) = *el else { panic!() };
        assert!(!r.fields["a"].required && !r.fields["b"].required);
    }

    #[test]
    fn let_shadows_inputs() {
        let expr = Expr::let_in("Order", Expr::string("x"), Expr::call("upper", vec![Expr::path("Order")]));
        let result = run(&expr);
        assert_eq!(result.ty, SemanticType::string());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn member_and_index_access() {
        let first = run(&Expr::index(items(), Expr::int(0)));
        assert_eq!(first.ty, item_type());

        let price = run(&Expr::member(Expr::index(items(), Expr::int(0)), "price"));
        assert_eq!(price.ty, SemanticType::number());

        let bad_index = run(&Expr::index(items(), Expr::string("zero")));
        assert_eq!(codes(&bad_index), vec![DiagnosticCode::TypeMismatch]);
        assert_eq!(bad_index.diagnostics[0].location.pointer, "/index");

        let attr = run(&Expr::member(Expr::path("Order"), "@id"));
        assert_eq!(attr.ty, SemanticType::string());

        let missing = run(&Expr::member(Expr::path("Order"), "nope"));
        assert_eq!(codes(&missing), vec![DiagnosticCode::UnknownPath]);
    }

    #[test]
    fn standalone_lambda_is_a_function_of_any() {
        let result = run(&Expr::lambda(["x"], Expr::int(1)));
        assert_eq!(result.ty, SemanticType::function(vec![SemanticType::any()], SemanticType::integer()));
    }

    #[test]
    fn malformed_input() {
        let missing = infer(None, &env(), &FunctionSignatureRegistry::builtin());
        assert_eq!((missing.ty.clone(), missing.confidence), (SemanticType::any(), Confidence::None));
        assert_eq!(codes(&missing), vec![DiagnosticCode::InternalError]);

        let pipe = run(&Expr::pipe(items(), Expr::path("sum")));
        assert_eq!(codes(&pipe), vec![DiagnosticCode::InternalError]);
        assert_eq!(pipe.diagnostics[0].location.pointer, "/call");
        assert_eq!(pipe.confidence, Confidence::None);

        // debug builds need more than the default test-thread stack here
        let deep = std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                let mut deep = Expr::boolean(true);
                for _ in 0..(MAX_DEPTH + 20) {
                    deep = Expr::unary(UnaryOp::Not, deep);
                }
                run(&deep)
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(codes(&deep), vec![DiagnosticCode::InternalError]);
        assert_eq!(deep.ty, SemanticType::boolean());
    }

    #[test]
    fn spans_flow_into_locations() {
        let expr = Expr::call("sum", vec![items().with_span(4, 20)]).with_span(0, 21);
        let result = run(&expr);
        assert_eq!(result.diagnostics[0].location.span, Some(Span { start: 4, end: 20 }));
    }

    #[test]
    fn result_serializes_type_as_text() {
        let result = run(&Expr::call("sum", vec![items()]));
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["type"], "Number");
        assert_eq!(v["confidence"], "partial");
        assert_eq!(v["diagnostics"][0]["code"], "TypeMismatch");
        assert_eq!(v["diagnostics"][0]["severity"], "error");
    }
}
