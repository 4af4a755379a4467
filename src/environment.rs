use std::env;
use std::str::FromStr;
use tracing::warn;

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// Empty segments are dropped, so an unset variable yields an empty vector.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Returns a trimmed, non-empty environment variable.
pub fn get_env_var(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an environment variable, falling back to `default` when it is unset
/// or malformed. Malformed values are logged.
pub fn get_env_parsed<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match get_env_var(var) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using default {:?}", raw, var, default);
                default
            }
        },
        None => default,
    }
}

/// Boolean flags accept true/false, 1/0, yes/no and on/off.
pub fn get_env_bool(var: &str, default: bool) -> bool {
    match get_env_var(var).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        Some(v) => {
            warn!("Invalid boolean '{}' for {}, using default {}", v, var, default);
            default
        }
        None => default,
    }
}
