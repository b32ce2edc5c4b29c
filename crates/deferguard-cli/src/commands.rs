//! Command-line definition and configuration assembly.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use deferguard_core::{CallSpec, GuardConfig, RemoveTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Inject,
    Remove,
}

impl Mode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "check" => Some(Mode::Check),
            "inject" => Some(Mode::Inject),
            "remove" => Some(Mode::Remove),
            _ => None,
        }
    }
}

pub fn build_command() -> Command {
    Command::new("deferguard")
        .version(deferguard_core::VERSION)
        .about("Check, insert or strip deferred instrumentation calls in Go methods")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file; flags override its values")
                .global(true),
        )
        .arg(
            Arg::new("module")
                .long("module")
                .value_name("DIR")
                .help("Module root holding go.mod (default: nearest enclosing module)")
                .global(true),
        )
        .arg(
            Arg::new("goroot")
                .long("goroot")
                .value_name("DIR")
                .help("GOROOT used to load standard packages (default: $GOROOT)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(package_args(
            Command::new("check").about("Report methods lacking a conforming call"),
        ))
        .subcommand(rewrite_args(package_args(
            Command::new("inject").about("Insert the call where it is missing"),
        )))
        .subcommand(rewrite_args(
            Command::new("remove")
                .about("Strip the call from implementation packages")
                .arg(
                    Arg::new("impl")
                        .long("impl")
                        .value_name("PATTERN")
                        .help("Implementation package pattern")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_name("PKG.CALL")
                        .help("Call to strip (default: the configured call)"),
                ),
        ))
}

fn package_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("iface")
                .long("iface")
                .value_name("PATTERN")
                .help("Interface package pattern")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("impl")
                .long("impl")
                .value_name("PATTERN")
                .help("Implementation package pattern")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("call")
                .long("call")
                .value_name("[ALIAS=]IMPORT_PATH")
                .help("Package providing the instrumentation call"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("Name of the instrumentation call"),
        )
        .arg(
            Arg::new("no-context")
                .long("no-context")
                .help("Do not pass a leading context parameter to the call")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-marker")
                .long("skip-marker")
                .value_name("TEXT")
                .help("Comment exempting a method from the check"),
        )
}

fn rewrite_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print a diff instead of writing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fmt")
                .long("fmt")
                .help("Run the formatter on written files")
                .action(ArgAction::SetTrue),
        )
}

/// Mode and subcommand matches.
pub fn mode(matches: &ArgMatches) -> Result<(Mode, &ArgMatches)> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("no subcommand given");
    };
    match Mode::from_name(name) {
        Some(mode) => Ok((mode, sub)),
        None => bail!("unknown subcommand {name}"),
    }
}

/// Build the run configuration: the config file first, then flags.
pub fn assemble_config(sub: &ArgMatches) -> Result<GuardConfig> {
    let mut config = match sub.get_one::<String>("config") {
        Some(path) => GuardConfig::from_json_file(path)?,
        None => GuardConfig::default(),
    };

    if let Some(patterns) = values(sub, "iface") {
        config.interface_packages = patterns;
    }
    if let Some(patterns) = values(sub, "impl") {
        config.implementation_packages = patterns;
    }

    let name = string(sub, "name");
    match string(sub, "call") {
        Some(spec) => {
            let name = name.unwrap_or_else(|| config.call.name.clone());
            config.call = CallSpec::parse(&spec, &name)?;
        }
        None => {
            if let Some(name) = name {
                config.call.name = name;
            }
        }
    }

    if flag(sub, "no-context") {
        config.context_param = false;
    }
    if let Some(marker) = string(sub, "skip-marker") {
        config.skip_marker = marker;
    }
    if let Some(target) = string(sub, "target") {
        config.remove_target = Some(RemoveTarget::parse(&target)?);
    }
    if flag(sub, "dry-run") {
        config.dry_run = true;
    }
    if flag(sub, "fmt") {
        config.run_formatter = true;
    }
    Ok(config)
}

pub fn path_arg(matches: &ArgMatches, id: &str) -> Option<PathBuf> {
    string(matches, id).map(PathBuf::from)
}

// Subcommands define different argument sets; unknown ids read as absent.
fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn values(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .try_get_many::<String>(id)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}
