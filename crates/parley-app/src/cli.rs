//! CLI argument definitions for the Parley terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use parley_core::ParleyConfig;
use std::path::PathBuf;

/// Parley: a terminal chat client for a remote conversational AI service.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Caller identifier sent with every request.
    #[arg(short = 'u', long = "user")]
    pub user_id: Option<String>,

    /// Per-attempt upstream timeout in seconds.
    #[arg(short = 't', long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Disable the medical disclaimer.
    #[arg(long = "no-disclaimer")]
    pub no_disclaimer: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG > PARLEY_LOG > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        for var in ["RUST_LOG", "PARLEY_LOG"] {
            if let Ok(level) = std::env::var(var) {
                if !level.trim().is_empty() {
                    return level;
                }
            }
        }
        config_level.to_string()
    }

    /// Fold flag overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ParleyConfig) {
        if let Some(ref user) = self.user_id {
            if !user.trim().is_empty() {
                config.general.user_id = user.trim().to_string();
            }
        }
        if let Some(secs) = self.timeout_secs {
            config.upstream.timeout_secs = secs;
        }
        if self.no_disclaimer {
            config.chat.medical_disclaimer = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "parley",
            "--config",
            "/tmp/p.toml",
            "--user",
            "desk-1",
            "--timeout",
            "45",
            "--no-disclaimer",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/p.toml"));
        assert_eq!(args.user_id.as_deref(), Some("desk-1"));
        assert_eq!(args.timeout_secs, Some(45));
        assert!(args.no_disclaimer);
    }

    #[test]
    fn test_apply_overrides() {
        let args = CliArgs::parse_from(["parley", "-u", " nurse ", "-t", "60", "--no-disclaimer"]);
        let mut config = ParleyConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.user_id, "nurse");
        assert_eq!(config.upstream.timeout_secs, 60);
        assert!(!config.chat.medical_disclaimer);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = CliArgs::parse_from(["parley"]);
        let mut config = ParleyConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.user_id, "parley_user");
        assert_eq!(config.upstream.timeout_secs, 30);
        assert!(config.chat.medical_disclaimer);
    }

    #[test]
    fn test_log_level_flag_wins() {
        let args = CliArgs::parse_from(["parley", "--log-level", "debug"]);
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_log_level_env_precedence() {
        let args = CliArgs::parse_from(["parley"]);

        std::env::set_var("RUST_LOG", "parley_chat=trace");
        std::env::set_var("PARLEY_LOG", "warn");
        assert_eq!(args.resolve_log_level("info"), "parley_chat=trace");

        std::env::remove_var("RUST_LOG");
        assert_eq!(args.resolve_log_level("info"), "warn");

        std::env::remove_var("PARLEY_LOG");
        assert_eq!(args.resolve_log_level("info"), "info");
    }
}
