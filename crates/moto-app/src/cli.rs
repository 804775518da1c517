//! CLI argument definitions for the Moto terminal front-end.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Moto: ask a motorbike specialist about prices and specs in Bangladesh.
#[derive(Parser, Debug)]
#[command(name = "moto", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Generation model name, e.g. gemini-2.5-flash.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MOTO_CONFIG env var > platform default (~/.moto/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MOTO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the model name.
    ///
    /// Priority: --model flag > config file value.
    pub fn resolve_model(&self, config_model: &str) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config_model.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".moto").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".moto").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::parse_from(["moto", "-c", "/tmp/moto.toml", "-l", "debug", "-m", "gemini-2.5-pro"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/moto.toml"));
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert_eq!(args.resolve_model("gemini-2.5-flash"), "gemini-2.5-pro");
    }

    #[test]
    fn test_config_values_used_without_flags() {
        let args = CliArgs::parse_from(["moto"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert_eq!(args.resolve_model("gemini-2.5-flash"), "gemini-2.5-flash");
    }
}
