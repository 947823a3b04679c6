//! Conformance runner: every case under `conformance/` names an input schema,
//! a transformation AST, and the type and diagnostic codes it must produce.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;

use xform_typeck::{AnalysisOptions, Dialect, Expr, FunctionSignatureRegistry, SchemaDocument, analyze, path_de};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    schema: SchemaDocument,
    #[serde(default)]
    input_name: Option<String>,
    #[serde(default)]
    dialect: Dialect,
    /// `null` stands for an AST the parser failed to produce.
    expression: Option<Expr>,
    expect: Expectation,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Expectation {
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaseFile {
    One(Case),
    Many(Vec<Case>),
}

fn main() -> Result<ExitCode> {
    let pattern = std::env::args().nth(1).unwrap_or_else(|| {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("conformance");
        format!("{}/**/*.json", root.display())
    });

    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("bad glob pattern: {pattern}"))?
        .collect::<Result<_, _>>()?;
    files.sort();
    anyhow::ensure!(!files.is_empty(), "no conformance cases match {pattern}");

    let registry = FunctionSignatureRegistry::builtin();
    let (mut passed, mut failed) = (0usize, 0usize);
    for file in &files {
        let cases = match path_de::load_file::<CaseFile>(file, None) {
            Ok(CaseFile::One(case)) => vec![case],
            Ok(CaseFile::Many(cases)) => cases,
            Err(error) => {
                eprintln!("{} {}: {error}", "✗ unreadable".red().bold(), file.display());
                failed += 1;
                continue;
            }
        };
        for case in cases {
            match run_case(&case, &registry) {
                Ok(()) => {
                    passed += 1;
                    eprintln!("{} {}", "✓".green(), case.name);
                }
                Err(mismatch) => {
                    failed += 1;
                    eprintln!("{} {} ({})", "✗".red().bold(), case.name, file.display());
                    eprintln!("    {mismatch}");
                }
            }
        }
    }

    let summary = format!("{passed} passed, {failed} failed");
    if failed == 0 {
        eprintln!("{}", summary.green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", summary.red().bold());
        Ok(ExitCode::FAILURE)
    }
}

fn run_case(case: &Case, registry: &FunctionSignatureRegistry) -> Result<(), String> {
    let options = AnalysisOptions {
        input_name: case.input_name.clone(),
        root_name: None,
        dialect: case.dialect,
    };
    let analysis = analyze(&case.schema, case.expression.as_ref(), registry, &options);

    if let Some(want) = &case.expect.ty {
        let got = analysis.result.ty.to_string();
        if &got != want {
            return Err(format!("type: expected `{want}`, got `{got}`"));
        }
    }
    let got: Vec<&str> = analysis.diagnostics.iter().map(|d| d.code.as_str()).collect();
    if got != case.expect.codes {
        let detail: Vec<String> = analysis.diagnostics.iter().map(ToString::to_string).collect();
        return Err(format!("codes: expected {:?}, got {:?}\n    {}", case.expect.codes, got, detail.join("\n    ")));
    }
    Ok(())
}
