//! Hard failures. Type problems are never errors here; they are diagnostics.
use std::path::PathBuf;

use thiserror::Error;

/// Schema traversal that cannot produce an environment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("schema reference cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("reference to undefined schema type `{target}` at {path}")]
    UnknownReference { target: String, path: String },

    #[error("schema nesting exceeds {limit} levels at {path}")]
    DepthExceeded { limit: usize, path: String },
}

/// Reading ASTs, schemas and case files from disk or JSON.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("at JSON path {path} → {message}")]
    Decode { path: String, message: String },

    #[error("JSON pointer `{pointer}` selects nothing")]
    Pointer { pointer: String },
}
