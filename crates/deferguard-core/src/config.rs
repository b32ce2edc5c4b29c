//! Run configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::resolve::guess_package_name;
use crate::types::Type;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid call spec {0:?}: expected <import path> or <alias>=<import path>")]
    InvalidCall(String),

    #[error("Invalid remove target {0:?}: expected <package>.<Call>")]
    InvalidTarget(String),

    #[error("No {0} packages given")]
    NoPackages(&'static str),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The instrumentation call: the package providing it and its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSpec {
    /// Import path of the instrumentation package
    pub import_path: String,
    /// Local name the package is imported under, if not its last element
    pub alias: Option<String>,
    /// Name of the call; the formatted variant adds the format suffix
    pub name: String,
}

impl Default for CallSpec {
    fn default() -> Self {
        Self {
            import_path: "example.com/instrument".to_string(),
            alias: None,
            name: "Enter".to_string(),
        }
    }
}

impl CallSpec {
    /// Parse `path` or `alias=path`.
    pub fn parse(spec: &str, name: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidCall(spec.to_string());
        let (alias, import_path) = match spec.split_once('=') {
            Some((alias, path)) => (Some(alias.trim().to_string()), path.trim()),
            None => (None, spec.trim()),
        };
        if import_path.is_empty() || import_path.contains(char::is_whitespace) {
            return Err(invalid());
        }
        let call = Self {
            import_path: import_path.to_string(),
            alias,
            name: name.to_string(),
        };
        // Without an alias the guessed package name must be usable in source.
        if !is_identifier(&call.package_ident()) {
            return Err(invalid());
        }
        Ok(call)
    }

    /// Identifier the call is qualified with in source: the alias, or the
    /// package name guessed from the import path.
    pub fn package_ident(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => guess_package_name(&self.import_path),
        }
    }
}

/// A named type by import path and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn matches(&self, ty: &Type) -> bool {
        ty.as_named()
            .is_some_and(|named| named.is(&self.package, &self.name))
    }
}

/// The `pkg.Call` pair that remove mode strips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTarget {
    pub package: String,
    pub name: String,
}

impl RemoveTarget {
    pub fn parse(target: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTarget(target.to_string());
        let (package, name) = target.trim().rsplit_once('.').ok_or_else(invalid)?;
        if !is_identifier(package) || !is_identifier(name) {
            return Err(invalid());
        }
        Ok(Self {
            package: package.to_string(),
            name: name.to_string(),
        })
    }
}

/// Configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Instrumentation call to require, insert or validate
    pub call: CallSpec,
    /// Pass a leading context parameter as the first call argument
    pub context_param: bool,
    /// Type recognized as the context parameter
    pub context_type: TypeName,
    /// Comment text that exempts a function from the missing-call check
    pub skip_marker: String,
    /// Suffix naming the formatted call variant
    pub format_suffix: String,
    /// Precision of the string placeholder
    pub string_preview: usize,
    /// Call stripped by remove mode
    pub remove_target: Option<RemoveTarget>,
    /// Package patterns declaring the interfaces
    pub interface_packages: Vec<String>,
    /// Package patterns declaring the implementations
    pub implementation_packages: Vec<String>,
    /// Print diffs instead of writing files
    pub dry_run: bool,
    /// Run the formatter on written files
    pub run_formatter: bool,
    /// Formatter command, invoked as `<formatter> -w <files>`
    pub formatter: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            call: CallSpec::default(),
            context_param: true,
            context_type: TypeName {
                package: "context".to_string(),
                name: "Context".to_string(),
            },
            skip_marker: "deferguard:skip".to_string(),
            format_suffix: "f".to_string(),
            string_preview: 64,
            remove_target: None,
            interface_packages: Vec::new(),
            implementation_packages: Vec::new(),
            dry_run: false,
            run_formatter: false,
            formatter: "gofmt".to_string(),
        }
    }
}

impl GuardConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Remove target, defaulting to the configured call.
    pub fn remove_target(&self) -> RemoveTarget {
        self.remove_target.clone().unwrap_or_else(|| RemoveTarget {
            package: self.call.package_ident(),
            name: self.call.name.clone(),
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}
