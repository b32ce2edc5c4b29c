//! # Deferguard Core
//!
//! Enforces a house rule on Go code: every exported method implementing a
//! method of a designated interface starts with a deferred
//! instrumentation call, or is exempted by a skip marker. Includes:
//! - Go parsing into an owned syntax model (tree-sitter-go)
//! - Package listing for Go modules
//! - A caching package loader with type resolution and method sets
//! - Interface collection and structural matching
//! - The call-site grammar validator and generator
//! - The byte-offset patch engine
//!
//! A [`Session`] drives one invocation in check, inject or remove mode.

#![warn(clippy::all)]

pub mod analysis;
pub mod callsite;
pub mod config;
pub mod loader;
pub mod patch;
pub mod session;
pub mod source;
pub mod syntax;
pub mod types;

// Re-export commonly used types
pub use analysis::{
    collect_interfaces, locate, match_implementations, CandidateType, DeclarationRef, Interface,
    MatchedMethod,
};
pub use callsite::{Grammar, Malformation, Outcome};
pub use config::{CallSpec, ConfigError, GuardConfig, RemoveTarget};
pub use loader::{LoadError, Loader, Package, PackageId};
pub use patch::{apply, FileEditSet, Patch, PatchError};
pub use session::{Applied, CheckReport, EditPlan, Formatter, GoFmt, Session, Stage, Violation};
pub use source::{ModuleSource, PackageSource, PackageUnit};
pub use syntax::{GoParser, SyntaxError};
pub use types::{satisfies, MethodSet, Type};

/// Deferguard version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for deferguard components, logging to stderr.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = format!("deferguard_core={level}").parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Error types for deferguard operations
#[derive(thiserror::Error, Debug)]
pub enum GuardError {
    /// Package loading or type resolution failed
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// A patch list could not be applied
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A rewritten file could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by an external collaborator
    #[error("{0}")]
    External(#[from] anyhow::Error),
}

/// Result type for deferguard operations
pub type Result<T> = std::result::Result<T, GuardError>;
