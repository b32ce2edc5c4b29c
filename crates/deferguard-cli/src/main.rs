use std::process::ExitCode;

use anyhow::Result;
use clap::ArgMatches;
use deferguard_core::{init_tracing, Applied, Formatter, GoFmt, ModuleSource, Session};
use tracing::info;

mod commands;
use commands::{assemble_config, build_command, mode, path_arg, Mode};

fn main() -> ExitCode {
    let matches = build_command().get_matches();

    // Initialize logging
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("deferguard: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let (mode, sub) = mode(matches)?;
    let config = assemble_config(sub)?;

    let source = match path_arg(sub, "module") {
        Some(root) => ModuleSource::new(root)?,
        None => ModuleSource::discover(std::env::current_dir()?)?,
    }
    .with_goroot(path_arg(sub, "goroot"));
    info!(
        "Module {} at {}",
        source.module_path(),
        source.root().display()
    );

    let formatter = config
        .run_formatter
        .then(|| GoFmt::new(config.formatter.clone()));
    let mut session = Session::new(config, Box::new(source))?;

    let plan = match mode {
        Mode::Check => {
            let report = session.check()?;
            for violation in &report.violations {
                println!("{violation}");
            }
            return Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            });
        }
        Mode::Inject => session.inject()?,
        Mode::Remove => session.remove()?,
    };

    match session.apply(&plan, formatter.as_ref().map(|f| f as &dyn Formatter))? {
        Applied::Diff(diff) => print!("{diff}"),
        Applied::Written(files) => info!("Updated {} files", files.len()),
    }
    Ok(ExitCode::SUCCESS)
}
