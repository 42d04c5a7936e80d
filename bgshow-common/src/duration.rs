use std::time::Duration;
use std::str::FromStr;
use anyhow::{Result, Context};

/// Accepts human-readable durations ("10s", "1m 30s") or a bare number of
/// milliseconds ("10000").
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if let Ok(millis) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }

    humantime::Duration::from_str(trimmed)
        .map(|d| d.into())
        .with_context(|| format!("Invalid duration format: {}", duration_str))
}
