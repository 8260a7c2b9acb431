//! `clap`-derived argument structure. Kept separate from validation so the
//! parsed shape and the security-checked shape can never be confused with
//! each other.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// TailPost: tails a log source and ships batches to an HTTP(S) sink.
#[derive(Parser, Debug)]
#[command(name = "tailpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the agent's YAML configuration file.
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Address the health/ready/metrics HTTP server binds to.
    #[arg(long, default_value = "0.0.0.0:9090")]
    pub metrics_addr: SocketAddr,

    /// `tracing` filter directive, e.g. "info", "debug", "tailpost=debug,warn".
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, default_value = "console", value_parser = ["console", "json"])]
    pub log_format: String,
}

/// Parses `std::env::args_os()` into a [`Cli`]. Exits the process on
/// `--help`/`--version` or a parse error, per clap's default behavior.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_arguments() {
        let cli = Cli::parse_from(["tailpost", "--config", "agent.yaml"]);
        assert_eq!(cli.config, PathBuf::from("agent.yaml"));
        assert_eq!(cli.metrics_addr, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, "console");
    }

    #[test]
    fn parses_all_arguments() {
        let cli = Cli::parse_from([
            "tailpost",
            "--config",
            "agent.yaml",
            "--metrics-addr",
            "127.0.0.1:8080",
            "--log-level",
            "tailpost=debug",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.metrics_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.log_level, "tailpost=debug");
        assert_eq!(cli.log_format, "json");
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["tailpost", "--config", "agent.yaml", "--log-format", "xml"]);
        assert!(result.is_err());
    }
}
