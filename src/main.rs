//! # Redirect Handler CLI (`redirects`)
//!
//! Manage the redirect table and serve redirects over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! redirects --config ./config/redirects.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `redirects init` | Create the SQLite database and schema |
//! | `redirects list` | List redirects grouped by host |
//! | `redirects add <source> <target>` | Add a redirect |
//! | `redirects remove <source>` | Remove one redirect |
//! | `redirects remove-all` | Remove every redirect |
//! | `redirects remove-by-host <host>` | Remove the redirects of one host |
//! | `redirects import <file>` | Import redirects from CSV |
//! | `redirects export` | Export redirects as CSV |
//! | `redirects serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use redirect_handler::add::{self, AddArgs};
use redirect_handler::export::{self, ExportArgs};
use redirect_handler::{config, import, list, logging, migrate, remove, server};
use redirect_handler_core::models::DEFAULT_STATUS_CODE;
use redirect_handler_core::RedirectType;

/// Redirect Handler CLI: chain-consistent URL redirects.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/redirects.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "redirects",
    about = "Redirect Handler: chain-consistent URL redirects",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/redirects.toml")]
    config: PathBuf,

    /// Log level override (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// List redirects, grouped by host.
    List {
        /// Only list redirects of this host.
        #[arg(long)]
        host: Option<String>,

        /// Regular expression matched against source and target.
        #[arg(long = "match")]
        pattern: Option<String>,
    },

    /// Add a redirect.
    ///
    /// Predecessor redirects are collapsed onto the new target and a
    /// redirect pointing back at the new source is removed.
    Add {
        /// Relative path that triggers the redirect.
        source: String,

        /// Relative path or absolute URI to redirect to.
        target: String,

        #[arg(long, default_value_t = DEFAULT_STATUS_CODE)]
        status: u16,

        /// Only valid for this host. Without it the redirect applies to all hosts.
        #[arg(long)]
        host: Option<String>,

        /// Replace an existing redirect with the same source.
        #[arg(long)]
        force: bool,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        creator: Option<String>,

        /// `manual` or `generated`.
        #[arg(long = "type")]
        kind: Option<RedirectType>,

        /// Start of the activation window, e.g. `2024-05-01T10:00:00+02:00`.
        #[arg(long)]
        start: Option<String>,

        /// End of the activation window, same format as `--start`.
        #[arg(long)]
        end: Option<String>,
    },

    /// Remove a single redirect.
    Remove {
        /// Source path as shown by `redirects list`.
        source: String,

        #[arg(long)]
        host: Option<String>,
    },

    /// Remove all redirects.
    RemoveAll,

    /// Remove all redirects of a host; `all` removes those valid for all hosts.
    RemoveByHost { host: String },

    /// Import redirects from a CSV file.
    ///
    /// Columns: source, target, status, hosts (`|`-separated), start, end,
    /// comment, creator, type. Only the first three are required.
    Import {
        file: PathBuf,

        #[arg(long, default_value = ",")]
        delimiter: String,
    },

    /// Export redirects as CSV.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        /// Only redirects whose activation window contains now.
        #[arg(long)]
        only_active: bool,

        #[arg(long = "type")]
        kind: Option<RedirectType>,

        /// Omit the header line.
        #[arg(long)]
        no_header: bool,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    let level = cli.log_level.as_deref().unwrap_or(&cfg.log.level);
    logging::init_logger(level, cfg.log.format)?;

    let ok = match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
            true
        }
        Commands::List { host, pattern } => {
            list::run_list(&cfg, host.as_deref(), pattern.as_deref()).await?;
            true
        }
        Commands::Add {
            source,
            target,
            status,
            host,
            force,
            comment,
            creator,
            kind,
            start,
            end,
        } => {
            let args = AddArgs {
                source,
                target,
                status_code: status,
                host,
                force,
                comment,
                creator,
                kind,
                start,
                end,
            };
            add::run_add(&cfg, args).await?
        }
        Commands::Remove { source, host } => {
            remove::run_remove(&cfg, &source, host.as_deref()).await?
        }
        Commands::RemoveAll => {
            remove::run_remove_all(&cfg).await?;
            true
        }
        Commands::RemoveByHost { host } => {
            remove::run_remove_by_host(&cfg, &host).await?;
            true
        }
        Commands::Import { file, delimiter } => {
            let delimiter = import::parse_delimiter(&delimiter)?;
            import::run_import(&cfg, &file, delimiter).await?
        }
        Commands::Export {
            output,
            host,
            only_active,
            kind,
            no_header,
        } => {
            let args = ExportArgs {
                host,
                only_active,
                kind,
                include_header: !no_header,
            };
            export::run_export(&cfg, output.as_deref(), &args).await?;
            true
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
