//! Structured diagnostics handed to whatever presents them.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Referenced field is not in the environment; treated as Any.
    UnknownPath,
    /// Operand or argument not assignable to what the operation needs.
    TypeMismatch,
    UnknownFunction,
    ArityMismatch,
    /// `to_schema` approximated something the dialect cannot express.
    SchemaConversionLoss,
    /// Equality/ordering between types that can never compare equal.
    IncomparableTypes,
    /// Malformed input (missing AST, runaway nesting, schema cycle).
    InternalError,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::UnknownPath
            | DiagnosticCode::SchemaConversionLoss
            | DiagnosticCode::IncomparableTypes => Severity::Warning,
            DiagnosticCode::TypeMismatch
            | DiagnosticCode::UnknownFunction
            | DiagnosticCode::ArityMismatch
            | DiagnosticCode::InternalError => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UnknownPath => "UnknownPath",
            DiagnosticCode::TypeMismatch => "TypeMismatch",
            DiagnosticCode::UnknownFunction => "UnknownFunction",
            DiagnosticCode::ArityMismatch => "ArityMismatch",
            DiagnosticCode::SchemaConversionLoss => "SchemaConversionLoss",
            DiagnosticCode::IncomparableTypes => "IncomparableTypes",
            DiagnosticCode::InternalError => "InternalError",
        }
    }
}

/// Where a diagnostic points: a JSON Pointer into the AST (or into the
/// inferred type for conversion losses) plus the parser's span when known.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub pointer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Location {
    pub fn at(pointer: impl Into<String>) -> Self {
        Self { pointer: pointer.into(), span: None }
    }
}

/// Error/warning tally for a diagnostics list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        diagnostics.iter().fold(Summary::default(), |mut acc, d| {
            match d.severity {
                Severity::Error => acc.errors += 1,
                Severity::Warning => acc.warnings += 1,
            }
            acc
        })
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Severity::Error => "error", Severity::Warning => "warning" })
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pointer = if self.pointer.is_empty() { "/" } else { &self.pointer };
        match self.span {
            Some(span) => write!(f, "{pointer} ({}..{})", span.start, span.end),
            None => f.write_str(pointer),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] at {}: {}", self.severity, self.code, self.location, self.message)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        write!(
            f,
            "{} error{}, {} warning{}",
            self.errors, plural(self.errors), self.warnings, plural(self.warnings)
        )
    }
}
