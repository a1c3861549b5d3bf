//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use url::Url;

#[derive(Parser)]
#[command(
    name = "shellcache",
    version,
    about = "Offline cache and update orchestration for a web application shell",
    long_about = "Drive the shellcache engine against an on-disk cache store.\n\n\
                  Install and activate cache generations, route requests through the\n\
                  cache-first and network-first strategies, check for and apply new\n\
                  application versions, and simulate push notifications."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the effective configuration (file, defaults and environment) to the config file.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },

    /// Pre-cache the install manifest into the current static generation.
    Install,

    /// Delete cache generations left over from earlier versions.
    Activate,

    /// Route one request through the worker.
    Fetch(FetchArgs),

    /// Show stored generations and persisted version state.
    Status,

    /// Check for a newer application version.
    Check {
        /// Ignore the check throttle.
        #[arg(long)]
        force: bool,
    },

    /// Apply the pending update: purge caches and reload.
    Apply {
        /// Page location to reload from (default: the configured origin).
        #[arg(long, value_name = "URL")]
        location: Option<Url>,
    },

    /// Show a push notification and simulate clicking it.
    Push {
        /// Push payload; JSON or plain text.
        #[arg(value_name = "PAYLOAD")]
        payload: String,
    },

    /// Run the update scheduler. Every line on stdin counts as a focus event.
    Watch {
        /// Page location the scheduler starts from.
        #[arg(long, value_name = "URL")]
        location: Option<Url>,
    },
}

#[derive(Args)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the origin.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Treat the request as a top-level navigation.
    #[arg(long)]
    pub navigate: bool,

    /// HTTP method.
    #[arg(long, default_value = "GET")]
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["shellcache", "check", "--force", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Check { force: true }));
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::try_parse_from(["shellcache", "fetch", "/calendar", "--navigate"]).unwrap();
        match cli.command {
            Command::Fetch(args) => {
                assert_eq!(args.url, "/calendar");
                assert!(args.navigate);
                assert_eq!(args.method, "GET");
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_init_with_config_path() {
        let cli = Cli::try_parse_from(["shellcache", "--config", "/tmp/sc.json", "init", "--force"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sc.json")));
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn test_apply_rejects_bad_location() {
        assert!(Cli::try_parse_from(["shellcache", "apply", "--location", "not a url"]).is_err());
    }
}
