use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum LogLevel {
    ERROR,
    WARN,
    #[default]
    INFO,
    DEBUG,
    VERBOSE,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::ERROR => LevelFilter::Error,
            LogLevel::WARN => LevelFilter::Warn,
            LogLevel::INFO => LevelFilter::Info,
            LogLevel::DEBUG => LevelFilter::Debug,
            LogLevel::VERBOSE => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::ERROR),
            "warn" | "warning" => Ok(LogLevel::WARN),
            "info" => Ok(LogLevel::INFO),
            "debug" => Ok(LogLevel::DEBUG),
            "verbose" | "trace" => Ok(LogLevel::VERBOSE),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Console output plus `error.log` and `combined.log` under `log_dir`.
pub fn setup_logging(level: LogLevel, log_dir: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fs::create_dir_all(log_dir)?;

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::BrightBlack);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let files = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Utc::now().to_rfc3339(),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(
            fern::Dispatch::new()
                .level(LevelFilter::Error)
                .chain(fern::log_file(log_dir.join("error.log"))?),
        )
        .chain(fern::log_file(log_dir.join("combined.log"))?);

    fern::Dispatch::new()
        .level(level.into())
        .level_for("serenity", LevelFilter::Warn)
        .level_for("tracing", LevelFilter::Warn)
        .level_for("rustls", LevelFilter::Warn)
        .level_for("h2", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(console)
        .chain(files)
        .apply()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("Debug".parse::<LogLevel>(), Ok(LogLevel::DEBUG));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::VERBOSE));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn deserializes_any_case_and_serializes_upper_case() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }

        let parsed: Wrapper = toml::from_str("level = \"warning\"").unwrap();
        assert_eq!(parsed.level, LogLevel::WARN);
        assert!(toml::from_str::<Wrapper>("level = \"chatty\"").is_err());
        assert_eq!(toml::to_string(&parsed).unwrap().trim(), "level = \"WARN\"");
    }

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(LogLevel::INFO < LogLevel::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::VERBOSE), LevelFilter::Trace);
    }
}
