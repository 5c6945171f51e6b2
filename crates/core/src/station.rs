//! Station identification.
//!
//! Uploads carry the name of the machine they came from so the intake server can tell imaging
//! rooms apart.

use std::path::Path;

const HOST_ENV_VARS: &[&str] = &["COMPUTERNAME", "HOSTNAME", "HOST"];

/// Resolve the station name once at startup.
///
/// Order: explicit override, then the usual host name environment variables, then
/// `/etc/hostname`, then `"unknown"`.
pub fn resolve_station_name(override_name: Option<&str>) -> String {
    resolve_with(override_name, |key| std::env::var(key).ok(), Path::new("/etc/hostname"))
}

fn resolve_with(
    override_name: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    hostname_file: &Path,
) -> String {
    if let Some(name) = override_name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    for key in HOST_ENV_VARS {
        if let Some(value) = env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            return value;
        }
    }

    std::fs::read_to_string(hostname_file)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
