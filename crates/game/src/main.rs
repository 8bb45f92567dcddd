use std::env;

use engine::{run_app, LoopConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const START_LEVEL_ENV_VAR: &str = "BARFLY_START_LEVEL";
const DEBUG_BOUNDS_ENV_VAR: &str = "BARFLY_DEBUG_BOUNDS";

fn main() {
    init_tracing();
    info!("=== Barfly Startup ===");

    let defaults = LoopConfig::default();
    let config = LoopConfig {
        start_level: read_env_setting(START_LEVEL_ENV_VAR, defaults.start_level, parse_start_level),
        debug_bounds: read_env_setting(DEBUG_BOUNDS_ENV_VAR, defaults.debug_bounds, parse_flag),
        ..defaults
    };

    if let Err(err) = run_app(config) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Unset keeps `fallback`; unreadable or unparsable values warn and keep it.
fn read_env_setting<T: Copy>(var: &'static str, fallback: T, parse: fn(&str) -> Option<T>) -> T {
    match env::var(var) {
        Ok(value) => parse(&value).unwrap_or_else(|| {
            warn!(env_var = var, value = value.as_str(), "invalid env var value; using default");
            fallback
        }),
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(env_var = var, error = %err, "unable to read env var; using default");
            fallback
        }
    }
}

fn parse_start_level(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_level_accepts_padded_indices_only() {
        assert_eq!(parse_start_level(" 1 "), Some(1));
        assert_eq!(parse_start_level("-1"), None);
        assert_eq!(parse_start_level("street"), None);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn unset_variable_keeps_fallback() {
        let value = read_env_setting(
            "BARFLY_TEST_VARIABLE_THAT_IS_NEVER_SET",
            7usize,
            parse_start_level,
        );
        assert_eq!(value, 7);
    }
}
