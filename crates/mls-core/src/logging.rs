//! Logging init: file under the XDG state dir, or stderr when no file can
//! be opened.

use anyhow::Result;
use std::fs;
use std::io;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset: library debug detail plus
/// the telemetry JSON stream emitted under the `mls::telemetry` target.
const DEFAULT_DIRECTIVES: &str = "info,mls=debug,mls::telemetry=info";

/// Per-event writer handle: the shared log file, or stderr when the file
/// handle could not be cloned for this event.
enum LogWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct FileMakeWriter(fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or(LogWriter::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn init_with_writer(writer: BoxMakeWriter) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
}

/// Initialize structured logging to `mls.log` in the XDG state directory.
/// Returns Err when the log file cannot be placed or opened so the caller
/// can fall back to `init_logging_stderr`.
pub fn init_logging() -> Result<()> {
    let log_path = xdg::BaseDirectories::with_prefix("mls")?.place_state_file("mls.log")?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    init_with_writer(BoxMakeWriter::new(FileMakeWriter(file)));
    tracing::info!("mls logging initialized at {}", log_path.display());
    Ok(())
}

/// Initialize logging to stderr only (no file).
pub fn init_logging_stderr() {
    init_with_writer(BoxMakeWriter::new(io::stderr));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_are_valid() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }
}
