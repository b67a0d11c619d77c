//! Logger initialization.
//!
//! `RUST_LOG` is read first; the configured level then overrides it for
//! this crate and the core library. Noisy dependencies are capped.

use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use log::LevelFilter;

use crate::config::LogFormat;

/// Installs the global logger. Safe to call more than once; later calls
/// are ignored.
pub fn init_logger(level: &str, format: LogFormat) -> Result<()> {
    let level =
        LevelFilter::from_str(level).map_err(|_| anyhow!("Unknown log level: '{}'", level))?;

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    builder.filter_module("sqlx", LevelFilter::Warn);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("tower_http", LevelFilter::Info);
    builder.filter_module("redirect_handler", level);
    builder.filter_module("redirect_handler_core", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
        }
    }

    // Already initialized in tests or by an embedding binary.
    let _ = builder.try_init();
    Ok(())
}
