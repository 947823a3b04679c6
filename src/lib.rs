//! Design-time type analysis for schema-driven data transformations.
//!
//! Given the structural schema of a transformation's input and the parsed
//! transformation AST, infer the type each expression produces, report
//! problems as structured diagnostics, and derive the schema of the output.
//!
//! ```no_run
//! use xform_typeck::{AnalysisOptions, FunctionSignatureRegistry, analyze, path_de};
//!
//! let schema = path_de::load_file(std::path::Path::new("order.schema.json"), None)?;
//! let expr = path_de::load_file(std::path::Path::new("mapping.ast.json"), None)?;
//! let analysis = analyze(&schema, Some(&expr), &FunctionSignatureRegistry::builtin(), &AnalysisOptions::default());
//! for d in &analysis.diagnostics {
//!     eprintln!("{d}");
//! }
//! # Ok::<(), xform_typeck::LoadError>(())
//! ```
pub mod ast;
pub mod bridge;
pub mod diagnostic;
pub mod env;
pub mod error;
pub mod infer;
pub mod path;
pub mod path_de;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod types;

pub use ast::Expr;
pub use bridge::{Dialect, from_schema, to_schema};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use env::TypeEnvironment;
pub use error::{BridgeError, LoadError};
pub use infer::{Confidence, InferenceResult, infer};
pub use pipeline::{Analysis, AnalysisOptions, analyze, analyze_with_env};
pub use registry::{FunctionSignature, FunctionSignatureRegistry};
pub use schema::SchemaDocument;
pub use types::SemanticType;
