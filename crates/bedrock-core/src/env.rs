//! Small environment-variable parsing helpers shared by every binary's
//! `Config::from_env`, following the pattern already used throughout this
//! workspace (`std::env::var` + `.unwrap_or_else` / `.expect`).

use std::time::Duration;

pub fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn var_required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{key} must be set"))
}

pub fn duration_ms_or(key: &str, default_ms: u64) -> Duration {
    let millis = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(millis)
}

pub fn u32_or(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
