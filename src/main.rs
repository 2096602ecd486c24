//! # Context Relevance CLI (`ctxr`)
//!
//! Records business context for analytics clients and answers two
//! questions about it: what was going on for a client on a given date, and
//! what might explain the change between two reporting periods.
//!
//! ## Usage
//!
//! ```bash
//! ctxr --config ./config/ctxr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxr init` | Create the SQLite database and run schema migrations |
//! | `ctxr categories` | List the category registry |
//! | `ctxr add` | Record a context entry |
//! | `ctxr list <client>` | List a client's entries |
//! | `ctxr get <id>` | Show one entry |
//! | `ctxr edit <id>` | Edit an entry |
//! | `ctxr supersede <id> --by <id>` | Retire an entry in favor of another |
//! | `ctxr active <client>` | Entries active on a date |
//! | `ctxr explain <client>` | Entries explaining a period-over-period change |
//! | `ctxr serve` | Start the HTTP API |
//! | `ctxr completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Record a week-long promotion
//! ctxr add --client acme --category promotion --title "Summer sale" \
//!     --start 2024-06-01 --end 2024-06-07 --magnitude major
//!
//! # What was relevant on June 20th?
//! ctxr active acme --date 2024-06-20
//!
//! # Why is August up year over year?
//! ctxr explain acme --current 2024-08-01..2024-08-31 --comparison 2023-08-01..2023-08-31
//! ```

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use context_relevance::{config, entries, logging, migrate, report, server};
use context_relevance_core::models::{DateInterval, EntryPatch, Magnitude, NewContextEntry};

/// Context Relevance CLI: decides which recorded business events matter for
/// a date or a period-over-period comparison.
#[derive(Parser)]
#[command(
    name = "ctxr",
    about = "Context Relevance: which business events explain your numbers",
    version,
    long_about = "Context Relevance stores business context (promotions, launches, site issues, \
    strategy changes) per client and decides which entries are relevant on a given date, and \
    which ones explain a change between a current and a comparison period."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ctxr.toml`. Database, server, logging, and
    /// category settings are read from this file.
    #[arg(long, global = true, default_value = "./config/ctxr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `context_entries` table.
    /// Running it again is a no-op.
    Init,

    /// List the category registry, built-ins plus configured overrides.
    Categories,

    /// Record a new context entry and print its id.
    ///
    /// Give either `--date` for a single-day event or `--start` (and
    /// usually `--end`) for an interval, not both.
    Add {
        #[arg(long)]
        client: String,

        /// Category key, e.g. `promotion`. Unknown keys are treated as `other`.
        #[arg(long)]
        category: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Event date (YYYY-MM-DD).
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<NaiveDate>,

        /// Interval start (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Interval end (YYYY-MM-DD), inclusive.
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,

        /// minor, moderate, or major.
        #[arg(long)]
        magnitude: Option<Magnitude>,

        /// Override the category's comparison-significance default.
        #[arg(long)]
        significant: Option<bool>,
    },

    /// List a client's entries in insertion order.
    List {
        client: String,

        /// Include entries that have been superseded.
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show one entry.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Edit an existing entry. Only the given fields change.
    Edit {
        id: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Switch to a single-day event on this date.
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<NaiveDate>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long, conflicts_with = "clear_magnitude")]
        magnitude: Option<Magnitude>,

        #[arg(long)]
        clear_magnitude: bool,

        #[arg(long, conflicts_with = "clear_significant")]
        significant: Option<bool>,

        /// Drop the significance override and use the category default.
        #[arg(long)]
        clear_significant: bool,
    },

    /// Retire an entry in favor of the one that replaced it.
    Supersede {
        id: String,

        /// Id of the replacing entry.
        #[arg(long)]
        by: String,
    },

    /// Entries active for a client on a date.
    Active {
        client: String,

        /// Reference date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        json: bool,
    },

    /// Entries that may explain the change between two periods.
    Explain {
        client: String,

        /// Current period as START..END (inclusive).
        #[arg(long, value_parser = parse_interval)]
        current: DateInterval,

        /// Comparison period as START..END (inclusive).
        #[arg(long, value_parser = parse_interval)]
        comparison: DateInterval,

        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

/// Parse `START..END` into an inclusive interval.
fn parse_interval(s: &str) -> Result<DateInterval, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{}'", s))?;
    let start: NaiveDate = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid start date '{}': {}", start, e))?;
    let end: NaiveDate = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid end date '{}': {}", end, e))?;
    DateInterval::new(start, end).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "ctxr", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Categories => {
            entries::run_categories(&cfg)?;
        }
        Commands::Add {
            client,
            category,
            title,
            description,
            date,
            start,
            end,
            magnitude,
            significant,
        } => {
            let new = NewContextEntry {
                client_id: client,
                category,
                title,
                description,
                event_date: date,
                start_date: start,
                end_date: end,
                magnitude,
                comparison_significant: significant,
            };
            entries::run_add(&cfg, new).await?;
        }
        Commands::List { client, all, json } => {
            entries::run_list(&cfg, &client, all, json).await?;
        }
        Commands::Get { id, json } => {
            entries::run_get(&cfg, &id, json).await?;
        }
        Commands::Edit {
            id,
            category,
            title,
            description,
            date,
            start,
            end,
            magnitude,
            clear_magnitude,
            significant,
            clear_significant,
        } => {
            let patch = EntryPatch {
                category,
                title,
                description,
                event_date: date,
                start_date: start,
                end_date: end,
                magnitude,
                clear_magnitude,
                comparison_significant: significant,
                clear_comparison_significant: clear_significant,
            };
            entries::run_edit(&cfg, &id, patch).await?;
        }
        Commands::Supersede { id, by } => {
            entries::run_supersede(&cfg, &id, &by).await?;
        }
        Commands::Active { client, date, json } => {
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            report::run_active(&cfg, &client, date, json).await?;
        }
        Commands::Explain {
            client,
            current,
            comparison,
            json,
        } => {
            report::run_explain(&cfg, &client, current, comparison, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        let interval = parse_interval("2024-08-01..2024-08-31").unwrap();
        assert_eq!(interval.days(), 31);
        assert!(parse_interval("2024-08-01").is_err());
        assert!(parse_interval("2024-08-31..2024-08-01").is_err());
        assert!(parse_interval("2024-13-01..2024-08-01").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
