use chrono::Local;
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

static INIT: OnceLock<Result<PathBuf, String>> = OnceLock::new();

/// `~/.local/share/clockcast/logs`
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("clockcast")
        .join("logs"))
}

pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level).unwrap_or(LevelFilter::Info)
}

/// Installs the file logger once per process. Later calls return the result
/// of the first one.
pub fn init_logger(level: &str) -> Result<PathBuf, Error> {
    let result = INIT.get_or_init(|| install(parse_level(level)).map_err(|e| e.to_string()));
    result
        .clone()
        .map_err(|msg| Error::new(ErrorKind::Other, msg))
}

fn install(level: LevelFilter) -> Result<PathBuf, Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let path = log_dir.join(format!("clockcast-{}.log", Local::now().format("%Y-%m-%d")));
    let log_file = OpenOptions::new().create(true).append(true).open(&path)?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Debug)
        .build();

    WriteLogger::init(level, config, log_file)
        .map_err(|e| Error::new(ErrorKind::Other, format!("Logger initialization failed: {}", e)))?;
    Ok(path)
}

/// stderr logger for when the file logger cannot be installed.
pub fn init_fallback(level: &str) {
    let _ = env_logger::Builder::new()
        .filter_level(parse_level(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("TRACE"), LevelFilter::Trace);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn test_init_is_idempotent() {
        let first = init_logger("debug").map_err(|e| e.to_string());
        let second = init_logger("trace").map_err(|e| e.to_string());
        assert_eq!(first, second);
    }
}
