use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "care-referrals")]
#[command(about = "Community healthcare referral service and resource geocoder")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, default_value = "care-referrals.toml")]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve,

    /// Geocode a resource spreadsheet export offline
    Geocode {
        /// JSON array of raw resource rows
        #[arg(long)]
        input: String,

        /// Where to write the geocoded resources (JSON)
        #[arg(long)]
        output: String,

        /// Optional CSV file for geocoding diagnostics
        #[arg(long)]
        errors: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geocode_command() {
        let cli = Cli::parse_from([
            "care-referrals",
            "--verbose",
            "geocode",
            "--input",
            "rows.json",
            "--output",
            "out/resources.json",
            "--errors",
            "out/errors.csv",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("care-referrals.toml"));
        match cli.command {
            Command::Geocode { input, output, errors } => {
                assert_eq!(input, "rows.json");
                assert_eq!(output, "out/resources.json");
                assert_eq!(errors.as_deref(), Some("out/errors.csv"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_with_config() {
        let cli = Cli::parse_from(["care-referrals", "--config", "prod.toml", "serve"]);
        assert_eq!(cli.config, PathBuf::from("prod.toml"));
        assert!(matches!(cli.command, Command::Serve));
    }
}
