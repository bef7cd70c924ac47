use std::path::Path;

use crate::app::error::AppError;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Configured adb path, or plain `adb` from `PATH` when unset.
pub fn resolve_adb_program(config_command_path: &str) -> String {
    let normalized = normalize_command_path(config_command_path);
    if normalized.is_empty() {
        "adb".to_string()
    } else {
        normalized
    }
}

pub fn validate_adb_program(program: &str, trace_id: &str) -> Result<(), AppError> {
    if program.trim().is_empty() {
        return Err(AppError::config("ADB command is empty", trace_id));
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(AppError::config(
            "ADB path must point to an executable file",
            trace_id,
        ));
    }
    if !path.exists() {
        return Err(AppError::config(
            format!("ADB executable not found at '{program}'"),
            trace_id,
        ));
    }
    Ok(())
}

/// Picks the device serial: explicit flag, then configured serial, then
/// `ANDROID_SERIAL`. `None` lets adb pick the only attached device.
pub fn resolve_serial(explicit: Option<&str>, configured: &str) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| Some(configured.to_string()))
        .map(|serial| serial.trim().to_string())
        .filter(|serial| !serial.is_empty())
        .or_else(|| {
            std::env::var("ANDROID_SERIAL")
                .ok()
                .map(|serial| serial.trim().to_string())
                .filter(|serial| !serial.is_empty())
        })
}
