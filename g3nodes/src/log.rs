/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io::{self, IsTerminal, Write};

use anstyle::{AnsiColor, Color, Style};
use chrono::Local;
use slog::{Drain, KV, Level, OwnedKVList, Record, slog_o};
use slog_scope::GlobalLoggerGuard;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const COLOR_MAGENTA: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));
const COLOR_RED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
const COLOR_YELLOW: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
const COLOR_GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
const COLOR_CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
const COLOR_BLUE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue)));
const STYLE_BOLD: Style = Style::new().bold();

#[derive(Default)]
struct KvCollector {
    pairs: Vec<(String, String)>,
}

impl slog::Serializer for KvCollector {
    fn emit_arguments(&mut self, key: slog::Key, val: &fmt::Arguments) -> slog::Result {
        self.pairs.push((key.to_string(), val.to_string()));
        Ok(())
    }
}

/// Writes one line per record to stderr.
struct StderrDrain {
    console: bool,
}

impl StderrDrain {
    fn write_plain<IO: Write>(
        &self,
        io: &mut IO,
        record: &Record,
        kv: &KvCollector,
    ) -> io::Result<()> {
        write!(io, "{} {}", Local::now().format(TIME_FORMAT), record.level())?;
        for (k, v) in &kv.pairs {
            write!(io, " {k}: {v},")?;
        }
        writeln!(io, " {} <{}:{}>", record.msg(), record.module(), record.line())
    }

    fn write_console<IO: Write>(
        &self,
        io: &mut IO,
        record: &Record,
        kv: &KvCollector,
    ) -> io::Result<()> {
        let level_color = match record.level() {
            Level::Critical => COLOR_MAGENTA,
            Level::Error => COLOR_RED,
            Level::Warning => COLOR_YELLOW,
            Level::Info => COLOR_GREEN,
            Level::Debug => COLOR_CYAN,
            Level::Trace => COLOR_BLUE,
        };
        let bold_s = STYLE_BOLD.render();
        let bold_e = STYLE_BOLD.render_reset();

        write!(
            io,
            "{} {}{}{}",
            Local::now().format(TIME_FORMAT),
            level_color.render(),
            record.level(),
            level_color.render_reset()
        )?;
        for (k, v) in &kv.pairs {
            write!(io, " {bold_s}{k}{bold_e}={v},")?;
        }
        writeln!(
            io,
            " {bold_s}{}{bold_e} <{}:{}>",
            record.msg(),
            record.module(),
            record.line()
        )
    }
}

impl Drain for StderrDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        let mut kv = KvCollector::default();
        let _ = record.kv().serialize(record, &mut kv);
        let _ = values.serialize(record, &mut kv);

        let mut buf: Vec<u8> = Vec::with_capacity(256);
        let _ = if self.console {
            self.write_console(&mut buf, record, &kv)
        } else {
            self.write_plain(&mut buf, record, &kv)
        };
        let _ = io::stderr().lock().write_all(&buf);
        Ok(())
    }
}

fn log_level(verbose_level: u8) -> log::Level {
    match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

pub fn setup(verbose_level: u8) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let drain = StderrDrain {
        console: io::stderr().is_terminal(),
    };
    let logger = slog::Logger::root(drain.fuse(), slog_o!());

    let scope_guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(log_level(verbose_level))?;
    Ok(scope_guard)
}
