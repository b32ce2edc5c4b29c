//! Package listing.
//!
//! Turns package patterns and import paths into concrete package units
//! (import path, directory, file list). The loader only ever talks to the
//! [`PackageSource`] trait; [`ModuleSource`] is the implementation used by the
//! command line, rooted at a directory that holds a `go.mod`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

/// One package as produced by the listing collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUnit {
    pub import_path: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// External package-listing service.
pub trait PackageSource {
    /// Expand a user pattern (`./...`, `./pkg`, `example.com/mod/...`) into
    /// package units, sorted by import path.
    fn expand(&self, pattern: &str) -> Result<Vec<PackageUnit>>;

    /// Locate a single package by import path.
    fn find(&self, import_path: &str) -> Result<Option<PackageUnit>>;
}

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Build target used for file selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub goos: String,
    pub goarch: String,
}

impl BuildTarget {
    pub fn host() -> Self {
        let goos = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let goarch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "powerpc64" => "ppc64",
            "loongarch64" => "loong64",
            other => other,
        };
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
        }
    }

    fn tag_enabled(&self, tag: &str) -> bool {
        tag == self.goos
            || tag == self.goarch
            || (tag == "unix" && UNIX_OS.contains(&self.goos.as_str()))
            || tag == "gc"
            || tag.starts_with("go1.")
    }

    /// Filename suffix rules: `name_GOOS.go`, `name_GOARCH.go`,
    /// `name_GOOS_GOARCH.go`.
    fn file_name_matches(&self, file_name: &str) -> bool {
        let stem = file_name.trim_end_matches(".go");
        let parts: Vec<&str> = stem.split('_').collect();
        // The first element is never a constraint: `linux.go` is a plain file.
        let tail = &parts[1.min(parts.len())..];
        match tail {
            [.., os, arch] if KNOWN_OS.contains(os) && KNOWN_ARCH.contains(arch) => {
                *os == self.goos && *arch == self.goarch
            }
            [.., last] if KNOWN_OS.contains(last) => *last == self.goos,
            [.., last] if KNOWN_ARCH.contains(last) => *last == self.goarch,
            _ => true,
        }
    }

    /// Evaluate the `//go:build` line of a file header, if any.
    fn header_matches(&self, source: &str) -> bool {
        for line in source.lines() {
            let line = line.trim();
            if let Some(captures) = build_line_regex().captures(line) {
                return match eval_constraint(&captures[1], &|tag| self.tag_enabled(tag)) {
                    Some(enabled) => enabled,
                    None => {
                        debug!("unparsable build constraint {:?}, keeping file", line);
                        true
                    }
                };
            }
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            break;
        }
        true
    }
}

fn build_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^//go:build\s+(.+)$").expect("valid build regex"))
}

fn module_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*module\s+"?([^"\s]+)"?\s*$"#).expect("valid module regex")
    })
}

/// Evaluate a build constraint expression. `None` when it does not parse.
fn eval_constraint(expr: &str, enabled: &dyn Fn(&str) -> bool) -> Option<bool> {
    let tokens = tokenize_constraint(expr)?;
    let mut parser = ConstraintParser {
        tokens: &tokens,
        pos: 0,
        enabled,
    };
    let value = parser.or_expr()?;
    (parser.pos == tokens.len()).then_some(value)
}

fn tokenize_constraint(expr: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' | ')' | '!' => {
                tokens.push(c.to_string());
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return None;
                }
                tokens.push(format!("{c}{c}"));
                i += 2;
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct ConstraintParser<'a> {
    tokens: &'a [String],
    pos: usize,
    enabled: &'a dyn Fn(&str) -> bool,
}

impl ConstraintParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn or_expr(&mut self) -> Option<bool> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("||") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Some(value)
    }

    fn and_expr(&mut self) -> Option<bool> {
        let mut value = self.unary()?;
        while self.peek() == Some("&&") {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<bool> {
        match self.peek()? {
            "!" => {
                self.pos += 1;
                Some(!self.unary()?)
            }
            "(" => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.peek() != Some(")") {
                    return None;
                }
                self.pos += 1;
                Some(value)
            }
            "&&" | "||" | ")" => None,
            tag => {
                let value = (self.enabled)(tag);
                self.pos += 1;
                Some(value)
            }
        }
    }
}

/// Package source rooted at a Go module.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    root: PathBuf,
    module_path: String,
    goroot: Option<PathBuf>,
    target: BuildTarget,
}

impl ModuleSource {
    /// Open the module whose `go.mod` lives in `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let go_mod = root.join("go.mod");
        let content = fs::read_to_string(&go_mod)
            .with_context(|| format!("reading {}", go_mod.display()))?;
        let module_path = module_line_regex()
            .captures(&content)
            .map(|c| c[1].to_string())
            .ok_or_else(|| anyhow!("{}: no module directive", go_mod.display()))?;
        Ok(Self {
            root,
            module_path,
            goroot: std::env::var_os("GOROOT").map(PathBuf::from),
            target: BuildTarget::host(),
        })
    }

    /// Walk up from `start` to the nearest directory holding a `go.mod`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        let mut dir = Some(start);
        while let Some(current) = dir {
            if current.join("go.mod").is_file() {
                return Self::new(current);
            }
            dir = current.parent();
        }
        bail!("no go.mod found in {} or any parent", start.display())
    }

    pub fn with_goroot(mut self, goroot: Option<PathBuf>) -> Self {
        if goroot.is_some() {
            self.goroot = goroot;
        }
        self
    }

    pub fn with_target(mut self, target: BuildTarget) -> Self {
        self.target = target;
        self
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, import_path: &str) -> Option<PathBuf> {
        if import_path == self.module_path {
            return Some(self.root.clone());
        }
        if let Some(rest) = import_path.strip_prefix(&format!("{}/", self.module_path)) {
            return Some(self.root.join(rest));
        }
        let vendored = self.root.join("vendor").join(import_path);
        if vendored.is_dir() {
            return Some(vendored);
        }
        let goroot = self.goroot.as_ref()?.join("src").join(import_path);
        goroot.is_dir().then_some(goroot)
    }

    fn import_path_for(&self, dir: &Path, base: &Path, base_path: &str) -> Result<String> {
        let rel = dir.strip_prefix(base)?;
        let mut path = base_path.to_string();
        for component in rel.components() {
            path.push('/');
            path.push_str(&component.as_os_str().to_string_lossy());
        }
        Ok(path)
    }

    fn unit_in_dir(&self, dir: &Path, import_path: &str) -> Result<Option<PackageUnit>> {
        let files = self.go_files(dir)?;
        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(PackageUnit {
            import_path: import_path.to_string(),
            dir: dir.to_path_buf(),
            files,
        }))
    }

    fn go_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file()
                || !name.ends_with(".go")
                || name.ends_with("_test.go")
                || name.starts_with('.')
                || name.starts_with('_')
                || !self.target.file_name_matches(name)
            {
                continue;
            }
            let source = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            if !self.target.header_matches(&source) {
                debug!("excluding {} by build constraint", path.display());
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    fn walk(&self, base: &Path, base_path: &str) -> Result<Vec<PackageUnit>> {
        let mut units = Vec::new();
        let walker = WalkDir::new(base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !(name.starts_with('.')
                    || name.starts_with('_')
                    || name == "testdata"
                    || name == "vendor"
                    || entry.path().join("go.mod").is_file())
            });
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let import_path = self.import_path_for(entry.path(), base, base_path)?;
            if let Some(unit) = self.unit_in_dir(entry.path(), &import_path)? {
                units.push(unit);
            }
        }
        Ok(units)
    }
}

impl PackageSource for ModuleSource {
    fn expand(&self, pattern: &str) -> Result<Vec<PackageUnit>> {
        let (prefix, recursive) = match pattern.strip_suffix("/...") {
            Some(prefix) => (prefix, true),
            None if pattern == "..." => (".", true),
            None => (pattern, false),
        };

        let (dir, import_path) = if prefix == "." || prefix.starts_with("./") {
            let rel = prefix.trim_start_matches('.').trim_start_matches('/');
            let dir = if rel.is_empty() {
                self.root.clone()
            } else {
                self.root.join(rel)
            };
            let import_path = if rel.is_empty() {
                self.module_path.clone()
            } else {
                format!("{}/{}", self.module_path, rel)
            };
            (dir, import_path)
        } else {
            let dir = self
                .dir_for(prefix)
                .ok_or_else(|| anyhow!("cannot find package {prefix:?}"))?;
            (dir, prefix.to_string())
        };

        let mut units = if recursive {
            self.walk(&dir, &import_path)?
        } else {
            self.unit_in_dir(&dir, &import_path)?.into_iter().collect()
        };
        if units.is_empty() {
            bail!("pattern {pattern:?} matched no packages");
        }
        units.sort_by(|a, b| a.import_path.cmp(&b.import_path));
        debug!("pattern {} expanded to {} packages", pattern, units.len());
        Ok(units)
    }

    fn find(&self, import_path: &str) -> Result<Option<PackageUnit>> {
        match self.dir_for(import_path) {
            Some(dir) if dir.is_dir() => self.unit_in_dir(&dir, import_path),
            _ => Ok(None),
        }
    }
}
