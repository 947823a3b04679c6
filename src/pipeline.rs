//! One-call flow: input schema → environment → inferred type → output schema.
use serde::Serialize;
use tracing::{debug, warn};

use crate::ast::Expr;
use crate::bridge::{self, Dialect};
use crate::diagnostic::{Diagnostic, DiagnosticCode, Location};
use crate::env::TypeEnvironment;
use crate::infer::{self, Confidence, InferenceResult};
use crate::registry::FunctionSignatureRegistry;
use crate::schema::SchemaDocument;
use crate::types::SemanticType;

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Name the transformation uses for the input; the schema root's name
    /// when unset.
    pub input_name: Option<String>,
    /// Root name of the emitted schema.
    pub root_name: Option<String>,
    pub dialect: Dialect,
}

pub const DEFAULT_ROOT_NAME: &str = "output";

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub result: InferenceResult,
    pub output: SchemaDocument,
    /// Inference diagnostics followed by conversion losses.
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Analyze `expr` against a single input schema. A schema that cannot be
/// flattened (cycle, dangling reference) yields an `InternalError` and an
/// Any result rather than an `Err`: the caller still gets an output schema.
pub fn analyze(
    schema: &SchemaDocument,
    expr: Option<&Expr>,
    registry: &FunctionSignatureRegistry,
    options: &AnalysisOptions,
) -> Analysis {
    match bridge::from_schema(schema, options.input_name.as_deref()) {
        Ok(env) => analyze_with_env(&env, expr, registry, options),
        Err(e) => {
            warn!(error = %e, "input schema could not be flattened");
            let result = InferenceResult {
                ty: SemanticType::ANY,
                diagnostics: vec![Diagnostic::new(DiagnosticCode::InternalError, e.to_string(), Location::default())],
                confidence: Confidence::None,
            };
            finish(result, options)
        }
    }
}

/// Same as [`analyze`] for a prebuilt (possibly shared) environment.
pub fn analyze_with_env(
    env: &TypeEnvironment,
    expr: Option<&Expr>,
    registry: &FunctionSignatureRegistry,
    options: &AnalysisOptions,
) -> Analysis {
    finish(infer::infer(expr, env, registry), options)
}

fn finish(result: InferenceResult, options: &AnalysisOptions) -> Analysis {
    let root = options.root_name.as_deref().unwrap_or(DEFAULT_ROOT_NAME);
    let conversion = bridge::to_schema(&result.ty, root, options.dialect);
    let mut diagnostics = result.diagnostics.clone();
    diagnostics.extend(conversion.diagnostics);
    debug!(root, dialect = %options.dialect, diagnostics = diagnostics.len(), "analysis finished");
    Analysis { result, output: conversion.schema, diagnostics }
}
