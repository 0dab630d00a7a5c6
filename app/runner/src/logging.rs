//! FILENAME: app/runner/src/logging.rs
// PURPOSE: Process-wide log sink for report runs.
// FORMAT: seq|level|category|message

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::Lazy;

// ============================================================================
// UNIFIED LOGGING SYSTEM
// ============================================================================

/// Global sequence counter, shared by every run in the process.
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Log file of the run in progress. `None` between runs.
pub static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));


static LOGGER: UnifiedLogger = UnifiedLogger;

pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Installs the unified logger behind the `log` facade.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Parses `error` / `warn` / `info` / `debug` / `trace` / `off`.
pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    raw.trim().parse().ok()
}

/// Starts a fresh log file for one run, truncating any previous content.
pub fn open_log_file(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    Ok(())
}

/// Flushes and detaches the current run's log file.
pub fn close_log_file() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(mut file) = guard.take() {
            let _ = file.flush();
        }
    }
}

pub fn level_code(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

pub fn format_line(seq: u64, level: &str, category: &str, message: &str) -> String {
    format!("{}|{}|{}|{}", seq, level, category, message)
}

/// Write a log line in unified format to the run's file and stdout.
pub fn write_log(level: &str, category: &str, message: &str) {
    let line = format_line(next_seq(), level, category, message);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            if let Err(e) = writeln!(file, "{}", line) {
                eprintln!("[LOG_ERROR] Failed to write: {}", e);
            }
            let _ = file.flush();
        }
    }

    println!("{}", line);
}

/// Short category for a record: the last path segment of its target.
fn category(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

struct UnifiedLogger;

impl Log for UnifiedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        write_log(
            level_code(record.level()),
            category(record.target()),
            &record.args().to_string(),
        );
    }

    fn flush(&self) {
        if let Ok(mut guard) = LOG_FILE.lock() {
            if let Some(ref mut file) = *guard {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        assert_eq!(format_line(7, "W", "runner", "partial"), "7|W|runner|partial");
    }

    #[test]
    fn category_is_last_target_segment() {
        assert_eq!(category("app_lib::runner"), "runner");
        assert_eq!(category("RUN"), "RUN");
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("INFO"), Some(LevelFilter::Info));
        assert_eq!(parse_level(" debug "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn sequence_increases() {
        let a = next_seq();
        let b = next_seq();
        assert!(b > a);
    }

    #[test]
    fn run_log_file_receives_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("heating_matrix.log");

        open_log_file(&path).unwrap();
        write_log("I", "runner", "Results saved");
        close_log_file();
        write_log("I", "runner", "after close");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().any(|l| l.ends_with("|I|runner|Results saved")));
        assert!(!content.contains("after close"));
    }
}
