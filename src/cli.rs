//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// nsgroup-sync - keep identity provider groups in step with cluster namespaces
#[derive(Parser, Debug)]
#[command(name = "nsgroup-sync")]
#[command(version)]
#[command(about = "Creates and deletes Keycloak groups as cluster namespaces come and go")]
#[command(
    long_about = "Every namespace matching NAMESPACE_FILTER gets one group per entry of \
GROUP_POSTFIXES, named <namespace>-<postfix>. At startup all groups are reconciled; \
afterwards namespace events add or remove groups one namespace at a time."
)]
pub struct Cli {
    /// TOML file with settings; environment variables override it
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run the startup sync once and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["nsgroup-sync"]).unwrap();
        assert!(!cli.once);
        assert_eq!(cli.config, None);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "nsgroup-sync",
            "--config",
            "/etc/nsgroup-sync.toml",
            "--once",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert!(cli.once);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/nsgroup-sync.toml")));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["nsgroup-sync", "--log-format", "xml"]).is_err());
    }
}
