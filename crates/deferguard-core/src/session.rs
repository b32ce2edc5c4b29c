//! Per-invocation orchestration.
//!
//! A [`Session`] owns the configuration and the package loader for one
//! run and moves through [`Stage`]s. Analysis (loading, matching,
//! validation, patch computation) never touches the filesystem; files are
//! only written by [`Session::apply`], in sorted order, after every patch
//! of the run has been computed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use crate::analysis::{collect_interfaces, locate, match_implementations, DeclarationRef};
use crate::callsite::{context_param, render_call, Grammar, Outcome};
use crate::config::{ConfigError, GuardConfig};
use crate::loader::{Loader, PackageId};
use crate::patch::{apply, ensure_import, removal_range, FileEditSet, Patch, PatchError};
use crate::source::PackageSource;
use crate::syntax::{DeclId, Position};
use crate::{GuardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loaded,
    Matched,
    Validated,
    Reported,
    Patched,
}

/// A declaration that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub file: PathBuf,
    pub offset: usize,
    pub position: Position,
    /// `Type.Method`.
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.position.line,
            self.position.column,
            self.name,
            self.outcome
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Sorted by file, then offset.
    pub violations: Vec<Violation>,
    /// Number of declarations validated.
    pub checked: usize,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone)]
struct FileEdit {
    original: String,
    edits: FileEditSet,
}

/// Every patch of a run, per file, in file name order.
#[derive(Debug, Clone, Default)]
pub struct EditPlan {
    files: BTreeMap<PathBuf, FileEdit>,
}

impl EditPlan {
    fn push(&mut self, path: &Path, original: &str, patch: Patch) {
        self.files
            .entry(path.to_path_buf())
            .or_insert_with(|| FileEdit {
                original: original.to_string(),
                edits: FileEditSet::new(),
            })
            .edits
            .push(patch);
    }

    fn seal(mut self) -> Self {
        for file in self.files.values_mut() {
            file.edits.sort();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn edits(&self, path: &Path) -> Option<&FileEditSet> {
        self.files.get(path).map(|file| &file.edits)
    }

    pub fn patch_count(&self) -> usize {
        self.files.values().map(|file| file.edits.len()).sum()
    }

    /// New content of every touched file.
    pub fn render(&self) -> std::result::Result<Vec<(PathBuf, String)>, PatchError> {
        self.files
            .iter()
            .map(|(path, file)| Ok((path.clone(), apply(&file.original, file.edits.patches())?)))
            .collect()
    }

    /// Unified diff of every touched file.
    pub fn diff(&self) -> std::result::Result<String, PatchError> {
        let mut output = String::new();
        for (path, file) in &self.files {
            let updated = apply(&file.original, file.edits.patches())?;
            let patch = diffy::create_patch(&file.original, &updated).to_string();
            let hunks = patch.splitn(3, '\n').nth(2).unwrap_or_default();
            output.push_str(&format!(
                "--- {0}\n+++ {0}\n{1}",
                path.display(),
                hunks
            ));
        }
        Ok(output)
    }

    /// Write every file in name order. Stops at the first failure; files
    /// already written stay written.
    pub fn write(&self) -> Result<Vec<PathBuf>> {
        let rendered = self.render()?;
        let mut written = Vec::with_capacity(rendered.len());
        for (path, content) in rendered {
            std::fs::write(&path, content).map_err(|source| GuardError::Write {
                path: path.clone(),
                source,
            })?;
            info!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// What [`Session::apply`] did with a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Diff(String),
    Written(Vec<PathBuf>),
}

/// External source formatter run over written files.
pub trait Formatter {
    fn format(&self, files: &[PathBuf]) -> anyhow::Result<()>;
}

/// Runs `<command> -w <files>`.
#[derive(Debug, Clone)]
pub struct GoFmt {
    command: String,
}

impl GoFmt {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Formatter for GoFmt {
    fn format(&self, files: &[PathBuf]) -> anyhow::Result<()> {
        let status = Command::new(&self.command)
            .arg("-w")
            .args(files)
            .status()
            .with_context(|| format!("failed to run {}", self.command))?;
        if !status.success() {
            bail!("{} exited with {}", self.command, status);
        }
        Ok(())
    }
}

/// A matched declaration with everything validation and insertion need.
#[derive(Debug, Clone)]
struct Target {
    package: PackageId,
    decl: DeclarationRef,
    context: Option<String>,
    call: String,
}

pub struct Session {
    config: GuardConfig,
    loader: Loader,
    stage: Stage,
}

impl Session {
    pub fn new(config: GuardConfig, source: Box<dyn PackageSource>) -> Result<Self> {
        Ok(Self {
            config,
            loader: Loader::new(source)?,
            stage: Stage::Idle,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, stage: Stage) {
        debug!("Stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Report every matched declaration that lacks a conforming call.
    pub fn check(&mut self) -> Result<CheckReport> {
        let targets = self.analyze()?;
        let outcomes = self.validate(&targets);

        let mut violations = Vec::new();
        for (target, outcome) in targets.iter().zip(outcomes) {
            if outcome.is_conforming() {
                continue;
            }
            let pkg = self.loader.package(target.package);
            violations.push(Violation {
                file: pkg.files[target.decl.file].path.clone(),
                offset: pkg.decl(target.decl.decl).name_span.start,
                position: target.decl.position,
                name: target.decl.name.clone(),
                outcome,
            });
        }
        violations.sort_by(|a, b| (&a.file, a.offset).cmp(&(&b.file, b.offset)));

        self.advance(Stage::Reported);
        info!(
            "Checked {} declarations, {} violations",
            targets.len(),
            violations.len()
        );
        Ok(CheckReport {
            violations,
            checked: targets.len(),
        })
    }

    /// Plan insertion of the call into every non-conforming declaration,
    /// plus the import in every touched file that lacks it.
    pub fn inject(&mut self) -> Result<EditPlan> {
        let targets = self.analyze()?;
        let outcomes = self.validate(&targets);

        let mut plan = EditPlan::default();
        let mut touched: BTreeSet<PackageFile> = BTreeSet::new();
        for (target, outcome) in targets.iter().zip(outcomes) {
            if outcome.is_conforming() {
                continue;
            }
            let pkg = self.loader.package(target.package);
            let file = &pkg.files[target.decl.file];
            let Some(body) = &pkg.decl(target.decl.decl).body else {
                continue;
            };
            let after_brace = file.source[body.open + 1..].trim_start_matches([' ', '\t']);
            let trailing = if after_brace.starts_with('\n') || after_brace.starts_with("\r\n") {
                ""
            } else {
                "\n"
            };
            plan.push(
                &file.path,
                &file.source,
                Patch::insert(body.open + 1, format!("\n\t{}{}", target.call, trailing)),
            );
            touched.insert(PackageFile(target.package, target.decl.file));
        }

        for PackageFile(package, index) in touched {
            let file = &self.loader.package(package).files[index];
            if let Some(patch) = ensure_import(file, &self.config.call) {
                debug!("Adding import {} to {}", self.config.call.import_path, file.path.display());
                plan.push(&file.path, &file.source, patch);
            }
        }

        info!(
            "Planned {} patches across {} files",
            plan.patch_count(),
            plan.files.len()
        );
        Ok(plan.seal())
    }

    /// Plan removal of the configured target call from every function of
    /// the implementation packages.
    pub fn remove(&mut self) -> Result<EditPlan> {
        let target = self.config.remove_target();
        let grammar = Grammar::for_target(&target, &self.config.format_suffix);
        let packages = self.load(&self.config.implementation_packages.clone(), "implementation")?;
        self.advance(Stage::Loaded);

        let mut plan = EditPlan::default();
        for id in packages {
            let pkg = self.loader.package(id);
            for file in &pkg.files {
                for func in &file.funcs {
                    let (Some(body), Some(stmt)) = (&func.body, grammar.find(func)) else {
                        continue;
                    };
                    let (start, end) = removal_range(body, stmt);
                    debug!("Removing {}.{} from {}", target.package, target.name, func.display_name());
                    plan.push(&file.path, &file.source, Patch::delete(start, end));
                }
            }
        }
        self.advance(Stage::Validated);

        info!(
            "Planned {} removals across {} files",
            plan.patch_count(),
            plan.files.len()
        );
        Ok(plan.seal())
    }

    /// Write the plan, or render it as a diff in dry-run mode. The
    /// formatter runs on written files; its failure is only logged.
    pub fn apply(&mut self, plan: &EditPlan, formatter: Option<&dyn Formatter>) -> Result<Applied> {
        if self.config.dry_run {
            let diff = plan.diff()?;
            self.advance(Stage::Patched);
            return Ok(Applied::Diff(diff));
        }
        let written = plan.write()?;
        if let Some(formatter) = formatter.filter(|_| !written.is_empty()) {
            if let Err(e) = formatter.format(&written) {
                warn!("Formatter failed: {:#}", e);
            }
        }
        self.advance(Stage::Patched);
        Ok(Applied::Written(written))
    }

    fn load(&mut self, patterns: &[String], kind: &'static str) -> Result<Vec<PackageId>> {
        if patterns.is_empty() {
            return Err(ConfigError::NoPackages(kind).into());
        }
        let mut ids = Vec::new();
        for pattern in patterns {
            for unit in self.loader.source().expand(pattern)? {
                let id = self.loader.load_checked(&unit)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Load, match and locate: every declaration that must carry the call.
    fn analyze(&mut self) -> Result<Vec<Target>> {
        let iface_packages = self.load(&self.config.interface_packages.clone(), "interface")?;
        let impl_packages =
            self.load(&self.config.implementation_packages.clone(), "implementation")?;
        self.advance(Stage::Loaded);

        let interfaces = collect_interfaces(&mut self.loader, &iface_packages)?;
        let mut targets = Vec::new();
        for package in impl_packages {
            let matched = match_implementations(&mut self.loader, package, &interfaces)?;
            let ids: BTreeSet<DeclId> = matched
                .iter()
                .flat_map(|candidate| candidate.methods.iter().map(|m| m.decl))
                .collect();
            for decl in locate(self.loader.package(package), &ids) {
                let (params, results) = self.loader.resolved_params(package, decl.decl)?;
                targets.push(Target {
                    package,
                    context: context_param(&self.config, &params).map(str::to_string),
                    call: render_call(&self.config, &params, &results),
                    decl,
                });
            }
        }
        self.advance(Stage::Matched);
        info!("Matched {} declarations", targets.len());
        Ok(targets)
    }

    fn validate(&mut self, targets: &[Target]) -> Vec<Outcome> {
        let grammar = Grammar::new(&self.config);
        let outcomes = targets
            .iter()
            .map(|target| {
                let decl = self.loader.package(target.package).decl(target.decl.decl);
                let outcome = grammar.validate(decl, target.context.as_deref());
                debug!("{}: {}", target.decl.name, outcome);
                outcome
            })
            .collect();
        self.advance(Stage::Validated);
        outcomes
    }
}

/// A file by package and index, ordered for deterministic import patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PackageFile(PackageId, usize);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_plan_diff_and_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.go");
        std::fs::write(&path, "package p\n\nfunc f() {\n}\n").unwrap();

        let mut plan = EditPlan::default();
        plan.push(
            &path,
            "package p\n\nfunc f() {\n}\n",
            Patch::insert(21, "\n\tdefer t.Enter()()"),
        );
        let plan = plan.seal();
        assert_eq!(plan.patch_count(), 1);

        let diff = plan.diff().unwrap();
        let header = format!("--- {0}\n+++ {0}\n@@", path.display());
        assert!(diff.starts_with(&header), "{diff}");
        assert!(diff.contains("+\tdefer t.Enter()()"));

        assert_eq!(plan.write().unwrap(), vec![path.clone()]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "package p\n\nfunc f() {\n\tdefer t.Enter()()\n}\n"
        );
    }

    #[test]
    fn test_empty_plan_renders_nothing() {
        let plan = EditPlan::default().seal();
        assert!(plan.is_empty());
        assert_eq!(plan.diff().unwrap(), "");
        assert!(plan.write().unwrap().is_empty());
    }
}
