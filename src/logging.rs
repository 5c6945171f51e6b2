//! Console and log-file output.
//!
//! Both sinks share one line format, `[<local time>] [<LEVEL>] <message>`, so the log file the
//! technicians read on the imaging PC matches what the console shows. Success events are logged
//! at info level under [`OK_TARGET`] and rendered as `OK`.

use rayosx_core::constants::OK_TARGET;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Label printed for an event.
pub fn level_label(level: &Level, target: &str) -> &'static str {
    if target == OK_TARGET && *level == Level::INFO {
        return "OK";
    }
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// `[timestamp] [LEVEL] message` lines.
pub struct AgentLogFormat;

impl<S, N> FormatEvent<S, N> for AgentLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let timestamp = chrono::Local::now().format("%d/%m/%Y %H:%M:%S");
        write!(
            writer,
            "[{}] [{}] ",
            timestamp,
            level_label(metadata.level(), metadata.target())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Open `log_file` for appending, creating it if needed. Earlier runs' lines are kept.
pub fn open_log_file(log_file: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(log_file)
}

/// Install the global subscriber: console plus an append-only file at `log_file`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. If the file cannot be opened the agent
/// keeps running with console output only and the failure is reported once.
pub fn init(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_error) = match open_log_file(log_file) {
        Ok(file) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(AgentLogFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(AgentLogFormat))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(
            "Could not open log file {}: {}; logging to console only",
            log_file.display(),
            e
        );
    }
}
