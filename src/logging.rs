// src/logging.rs

use crate::errors::{LuminaError, LuminaResult};
use crate::models::ApiCallLog;
use flexi_logger::{FileSpec, Logger};
use std::fs::OpenOptions;
use std::io::Write;

/// Starts the `log` facade writing to `logs/` so the terminal stays clean.
/// The returned handle must be kept alive for the lifetime of the program.
pub fn init_logging(log_level: &str) -> LuminaResult<flexi_logger::LoggerHandle> {
    Logger::try_with_str(log_level)
        .map_err(|e| LuminaError::config_error(format!("Invalid log level: {}", e)))?
        .log_to_file(FileSpec::default().directory("logs").basename("lumina"))
        .start()
        .map_err(|e| LuminaError::config_error(format!("Failed to start logger: {}", e)))
}

/// Logs an API call to the `api_calls.log` file.
pub fn log_api_call(log: &ApiCallLog) {
    let log_entry = format!(
        "[{}] {} - {} - Status: {} - Time: {}ms\n",
        log.timestamp.to_rfc3339(),
        log.endpoint,
        log.request_summary,
        log.response_status,
        log.response_time_ms
    );

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("api_calls.log");

    match file {
        Ok(mut file) => {
            if let Err(e) = file.write_all(log_entry.as_bytes()) {
                log::warn!("Failed to write to api_calls.log: {}", e);
            }
        }
        Err(e) => log::warn!("Failed to open api_calls.log: {}", e),
    }
}
