//! Throwaway Go modules for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use deferguard_core::{CallSpec, GuardConfig, ModuleSource, Session};
use tempfile::TempDir;

pub const CONTEXT_STUB: &str = r#"package context

type Context interface {
	Done() <-chan struct{}
	Err() error
}
"#;

pub const TRACE_PACKAGE: &str = r#"package trace

import "context"

func Enter(ctx context.Context) func(context.Context) {
	return func(context.Context) {}
}
"#;

/// A module `example.com/app` with a stub GOROOT providing `context`.
pub struct GoModule {
    pub root: TempDir,
    pub goroot: TempDir,
}

impl GoModule {
    pub fn new(files: &[(&str, &str)]) -> anyhow::Result<Self> {
        let root = TempDir::new()?;
        let goroot = TempDir::new()?;
        fs::write(root.path().join("go.mod"), "module example.com/app\n\ngo 1.22\n")?;
        let module = Self { root, goroot };
        module.write_goroot("context/context.go", CONTEXT_STUB)?;
        module.write("trace/trace.go", TRACE_PACKAGE)?;
        for (path, content) in files {
            module.write(path, content)?;
        }
        Ok(module)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> anyhow::Result<()> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn write_goroot(&self, rel: &str, content: &str) -> anyhow::Result<()> {
        let path = self.goroot.path().join("src").join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn read(&self, rel: &str) -> anyhow::Result<String> {
        Ok(fs::read_to_string(self.path(rel))?)
    }

    pub fn session(&self, config: GuardConfig) -> anyhow::Result<Session> {
        let source = ModuleSource::new(self.root.path())?
            .with_goroot(Some(self.goroot.path().to_path_buf()));
        Ok(Session::new(config, Box::new(source))?)
    }
}

/// Interfaces in `./api`, implementations in `./impl`, call `trace.Enter`.
pub fn config() -> GuardConfig {
    GuardConfig {
        call: CallSpec {
            import_path: "example.com/app/trace".to_string(),
            alias: None,
            name: "Enter".to_string(),
        },
        interface_packages: vec!["./api".to_string()],
        implementation_packages: vec!["./impl".to_string()],
        ..GuardConfig::default()
    }
}
