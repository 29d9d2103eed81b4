//! Environment helpers shared by the service binaries.

use std::env;
use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when unset or invalid.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Boolean flag: `true`/`1`/`yes` enable, `false`/`0`/`no` disable, anything else is `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "true" | "1" | "yes") => true,
        Ok(v) if matches!(v.as_str(), "false" | "0" | "no") => false,
        _ => default,
    }
}

/// Non-empty string variable.
pub fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
