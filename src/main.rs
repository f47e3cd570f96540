use anyhow::Result;
use clap::Parser;
use nixup::application::CheckOptions;
use nixup::commands;
use std::path::PathBuf;

/// nixup - NixOS update checker
///
/// Compares the packages of the running system against nixpkgs and reports
/// which ones have newer versions available.
///
/// Examples:
///   nixup check          # Check for updates (uses caches when fresh)
///   nixup check --fetch  # Re-query nixpkgs before checking
///   nixup status         # Status-bar JSON
#[derive(Parser, Debug)]
#[command(author, version = env!("NIXUP_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache directory (overrides defaults; also via NIXUP_CACHE_DIR)
    #[arg(long = "cache-dir", env = "NIXUP_CACHE_DIR", value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check for available updates
    Check(CheckArgs),

    /// Print the number of available updates from the last check
    Count,

    /// List available updates from the last check
    List,

    /// Print status-bar JSON
    Status,

    /// List installed packages
    Installed(InstalledArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Rescan the installed system closure
    #[arg(long)]
    pub rescan: bool,

    /// Recompute the report even if a recent one exists
    #[arg(long)]
    pub recheck: bool,

    /// Re-query the package index
    #[arg(long)]
    pub fetch: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct InstalledArgs {
    /// Rescan the installed system closure
    #[arg(long)]
    pub rescan: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = nixup::runtime::RealRuntime;

    match cli.command {
        Commands::Check(args) => {
            let options = CheckOptions {
                rescan: args.rescan,
                recheck: args.recheck,
                fetch: args.fetch,
            };
            commands::check(runtime, cli.cache_dir, options, args.json).await?
        }
        Commands::Count => commands::count(runtime, cli.cache_dir)?,
        Commands::List => commands::list(runtime, cli.cache_dir)?,
        Commands::Status => commands::status(runtime, cli.cache_dir)?,
        Commands::Installed(args) => {
            commands::installed(runtime, cli.cache_dir, args.rescan).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_check_parsing() {
        let cli = Cli::try_parse_from(["nixup", "check", "--fetch", "--json"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert!(args.fetch);
                assert!(args.json);
                assert!(!args.rescan);
                assert!(!args.recheck);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_read_only_commands() {
        for name in ["count", "list", "status"] {
            assert!(Cli::try_parse_from(["nixup", name]).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_cli_installed_rescan() {
        let cli = Cli::try_parse_from(["nixup", "installed", "--rescan"]).unwrap();
        match cli.command {
            Commands::Installed(args) => assert!(args.rescan),
            _ => panic!("Expected Installed command"),
        }
    }

    #[test]
    fn test_cli_global_cache_dir_parsing() {
        let cli = Cli::try_parse_from(["nixup", "--cache-dir", "/tmp/c", "count"]).unwrap();
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));

        let cli = Cli::try_parse_from(["nixup", "status", "--cache-dir", "/tmp/d"]).unwrap();
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/d")));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["nixup"]).is_err());
        assert!(Cli::try_parse_from(["nixup", "upgrade"]).is_err());
    }
}
