//! Thin CLI: check | schema | env
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use xform_typeck::bridge::{DialectAdapter, JsonSchemaAdapter};
use xform_typeck::diagnostic::Summary;
use xform_typeck::{
    AnalysisOptions, Diagnostic, Dialect, Expr, FunctionSignatureRegistry, InferenceResult,
    SchemaDocument, Severity, TypeEnvironment, analyze_with_env, from_schema, infer, path_de,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// type-check transformation ASTs against the schema of their input
#[derive(Parser, Debug)]
#[command(name = "xform-typeck", version)]
pub struct CommandLineInterface {
    /// debug logging for this crate (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer every input AST and print its diagnostics
    Check(CheckCmd),
    /// infer one AST and print the schema of what it produces
    Schema(SchemaCmd),
    /// list every path the input schema makes known
    Env(EnvCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// structural schema of the transformation's input (.json)
    #[arg(long, short)]
    schema: PathBuf,

    /// JSON Pointer selecting the schema document inside the file (e.g. /inputs/0)
    #[arg(long)]
    json_pointer: Option<String>,

    /// name the transformation uses for its input (defaults to the schema root's name)
    #[arg(long)]
    input_name: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// One or more AST files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,
}

#[derive(clap::Parser, Debug)]
struct SchemaCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// AST file
    #[arg(long, short)]
    input: PathBuf,

    /// target dialect whose limits the output schema respects
    #[arg(long, default_value_t = Dialect::JsonSchema)]
    dialect: Dialect,

    /// root name of the output schema
    #[arg(long, default_value = xform_typeck::pipeline::DEFAULT_ROOT_NAME)]
    root_name: String,

    /// render as JSON Schema instead of the structural form
    #[arg(long)]
    json_schema: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct EnvCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    #[serde(flatten)]
    result: InferenceResult,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<TypeEnvironment> {
        let doc: SchemaDocument = path_de::load_file(&self.schema, self.json_pointer.as_deref())
            .with_context(|| format!("loading schema {}", self.schema.display()))?;
        let env = from_schema(&doc, self.input_name.as_deref())
            .with_context(|| format!("flattening schema {}", self.schema.display()))?;
        debug!(paths = env.len(), "environment ready");
        Ok(env)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Returns whether any error diagnostic was produced.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Schema(target) => target.run(),
            Command::Env(target) => target.run(),
        }
    }
}

impl CheckCmd {
    fn run(&self) -> Result<bool> {
        let env = self.schema_settings.load()?;
        let registry = FunctionSignatureRegistry::builtin();
        let files = resolve_file_path_patterns(&self.input)?;

        // one environment and registry shared by every worker
        let reports: Vec<FileReport> = files
            .par_iter()
            .map(|path| FileReport {
                file: path.to_string_lossy().to_string(),
                result: check_file(path, &env, &registry),
            })
            .collect();

        let all: Vec<Diagnostic> = reports.iter().flat_map(|r| r.result.diagnostics.clone()).collect();
        let summary = Summary::of(&all);
        match self.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
            Format::Text => {
                for report in &reports {
                    print_report(report);
                }
                let line = format!("{} file(s): {summary}", reports.len());
                if summary.has_errors() { eprintln!("{}", line.red().bold()) } else { eprintln!("{}", line.green()) }
            }
        }
        Ok(summary.has_errors())
    }
}

fn check_file(path: &Path, env: &TypeEnvironment, registry: &FunctionSignatureRegistry) -> InferenceResult {
    match path_de::load_file::<Expr>(path, None) {
        Ok(expr) => infer(Some(&expr), env, registry),
        Err(error) => {
            warn!(file = %path.display(), %error, "AST did not decode");
            let mut result = infer(None, env, registry);
            for d in &mut result.diagnostics {
                d.message = format!("{}: {error}", d.message);
            }
            result
        }
    }
}

fn print_report(report: &FileReport) {
    let confidence = format!("{:?}", report.result.confidence).to_lowercase();
    println!("{}: {} ({confidence})", report.file.bold(), report.result.ty.to_string().cyan());
    for d in &report.result.diagnostics {
        let head = format!("{}[{}]", d.severity, d.code);
        let head = match d.severity {
            Severity::Error => head.red().bold(),
            Severity::Warning => head.yellow().bold(),
        };
        println!("  {head} at {}: {}", d.location, d.message);
    }
}

impl SchemaCmd {
    fn run(&self) -> Result<bool> {
        let env = self.schema_settings.load()?;
        let expr: Expr = path_de::load_file(&self.input, None)
            .with_context(|| format!("loading AST {}", self.input.display()))?;
        let options = AnalysisOptions {
            input_name: self.schema_settings.input_name.clone(),
            root_name: Some(self.root_name.clone()),
            dialect: self.dialect,
        };
        let analysis = analyze_with_env(&env, Some(&expr), &FunctionSignatureRegistry::builtin(), &options);
        for d in &analysis.diagnostics {
            eprintln!("{d}");
        }

        let rendered = if self.json_schema {
            JsonSchemaAdapter.render(&analysis.output)
        } else {
            serde_json::to_value(&analysis.output)?
        };
        let source = serde_json::to_string_pretty(&rendered)?;
        match self.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                std::fs::write(out, &source).with_context(|| format!("writing {}", out.display()))?;
            }
            None => println!("{source}"),
        }
        Ok(analysis.has_errors())
    }
}

impl EnvCmd {
    fn run(&self) -> Result<bool> {
        let env = self.schema_settings.load()?;
        for (path, ty) in env.paths() {
            println!("{}  {}", path.bold(), ty.to_string().cyan());
        }
        Ok(false)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
