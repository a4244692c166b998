/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};
use clap_complete::Shell;

use g3_node_resolver::BackendChoice;

const ARGS_COMPLETION: &str = "completion";
const ARGS_VERSION: &str = "version";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_CONFIG_FILE: &str = "config-file";
const ARGS_BACKEND: &str = "backend";
const ARGS_TIMEOUT: &str = "timeout";
const ARGS_CONTROLLER_SOCKET: &str = "controller-socket";
const ARGS_NODELIST: &str = "nodelist";
const ARGS_JSON: &str = "json";
const ARGS_STATS: &str = "stats";

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
pub struct ProcArgs {
    pub verbose_level: u8,
    pub config_file: Option<PathBuf>,
    pub backend: Option<BackendChoice>,
    pub timeout: Option<Duration>,
    pub controller_socket: Option<PathBuf>,
    pub nodelist: Option<PathBuf>,
    pub output_json: bool,
    pub print_stats: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    match humanize_rs::duration::parse(s) {
        Ok(d) => Ok(d),
        Err(humanize_rs::ParseError::MissingUnit) => u64::from_str(s)
            .map(Duration::from_secs)
            .map_err(|_| format!("invalid duration {s}")),
        Err(e) => Err(format!("invalid humanize duration {s}: {e}")),
    }
}

fn parse_backend(s: &str) -> Result<BackendChoice, String> {
    BackendChoice::from_str(s).map_err(|_| format!("unsupported backend {s}"))
}

fn build_cli_args() -> Command {
    Command::new(PKG_NAME)
        .about("Show the nodes of the local cluster")
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('c')
                .long("config-file"),
        )
        .arg(
            Arg::new(ARGS_BACKEND)
                .help("Backend to query: controller, config-service or prefer-controller")
                .num_args(1)
                .value_name("BACKEND")
                .value_parser(parse_backend)
                .short('b')
                .long("backend"),
        )
        .arg(
            Arg::new(ARGS_TIMEOUT)
                .help("Timeout for the whole query")
                .num_args(1)
                .value_name("TIMEOUT")
                .value_parser(parse_duration)
                .short('t')
                .long("timeout"),
        )
        .arg(
            Arg::new(ARGS_CONTROLLER_SOCKET)
                .help("Unix socket path of the cluster controller")
                .num_args(1)
                .value_name("SOCKET PATH")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .long("controller-socket"),
        )
        .arg(
            Arg::new(ARGS_NODELIST)
                .help("Cluster config file with the nodelist section")
                .num_args(1)
                .value_name("CONF FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .long("nodelist"),
        )
        .arg(
            Arg::new(ARGS_JSON)
                .help("Print the nodes as json")
                .action(ArgAction::SetTrue)
                .long("json"),
        )
        .arg(
            Arg::new(ARGS_STATS)
                .help("Print resolver stats to stderr when done")
                .action(ArgAction::SetTrue)
                .hide(true)
                .long("stats"),
        )
}

fn parse_matches(args: &ArgMatches) -> ProcArgs {
    ProcArgs {
        verbose_level: args.get_count(ARGS_VERBOSE),
        config_file: args.get_one::<PathBuf>(ARGS_CONFIG_FILE).cloned(),
        backend: args.get_one::<BackendChoice>(ARGS_BACKEND).copied(),
        timeout: args.get_one::<Duration>(ARGS_TIMEOUT).copied(),
        controller_socket: args.get_one::<PathBuf>(ARGS_CONTROLLER_SOCKET).cloned(),
        nodelist: args.get_one::<PathBuf>(ARGS_NODELIST).cloned(),
        output_json: args.get_flag(ARGS_JSON),
        print_stats: args.get_flag(ARGS_STATS),
    }
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args = build_cli_args().get_matches();

    if let Some(target) = args.get_one::<Shell>(ARGS_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(None);
    }

    if args.get_flag(ARGS_VERSION) {
        println!("{PKG_NAME} {PKG_VERSION}");
        return Ok(None);
    }

    let proc_args = parse_matches(&args);
    if let Some(path) = &proc_args.config_file
        && !path.is_file()
    {
        return Err(anyhow!("config file {} is not a regular file", path.display()));
    }
    Ok(Some(proc_args))
}
