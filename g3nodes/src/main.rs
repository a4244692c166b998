/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use log::debug;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        g3nodes::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let _log_guard =
        g3nodes::log::setup(proc_args.verbose_level).context("failed to setup logger")?;

    let config = g3nodes::config::load(&proc_args).context(format!(
        "failed to load config, opts: {:?}",
        &proc_args
    ))?;
    debug!("loaded resolver config: {config:?}");

    g3nodes::run(&proc_args, config)
}
