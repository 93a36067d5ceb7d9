//! dash-harvest — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use dash_harvest_cli::cli::export_cmd::{self, effective_config, ExportOptions};
use dash_harvest_cli::cli::replay_cmd;

#[derive(Parser)]
#[command(
    name = "dash-harvest",
    about = "dash-harvest — export every page of a paginated dashboard table to one TSV file",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a dashboard in Chromium and export the matching widgets.
    Export {
        /// Dashboard URL.
        url: String,

        /// Widget title to export. Repeatable; defaults to the built-in titles.
        #[arg(long = "title")]
        titles: Vec<String>,

        /// Directory for export files (also DASH_HARVEST_OUT_DIR).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Export file name (default all_dialogs.txt).
        #[arg(long)]
        filename: Option<String>,

        /// Per-page wait for the table to change after "next", in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Page ceiling per widget.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Page load timeout in milliseconds.
        #[arg(long, default_value = "30000")]
        navigation_timeout_ms: u64,

        /// How long to wait for widgets to render after load, in milliseconds.
        #[arg(long, default_value = "15000")]
        settle_ms: u64,

        /// Show the browser window instead of running headless.
        #[arg(long)]
        headed: bool,

        /// Chromium profile directory (reuse a logged-in session).
        #[arg(long)]
        user_data_dir: Option<PathBuf>,
    },

    /// Export from saved HTML snapshots, one file per page, in order.
    Replay {
        /// Snapshot files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Treat files as full pages and cut out the widget with this title.
        #[arg(long)]
        title: Option<String>,

        /// Directory for the export file (also DASH_HARVEST_OUT_DIR).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Export file name (default all_dialogs.txt).
        #[arg(long)]
        filename: Option<String>,

        /// Page ceiling.
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Export {
            url,
            titles,
            out_dir,
            filename,
            timeout_ms,
            max_pages,
            navigation_timeout_ms,
            settle_ms,
            headed,
            user_data_dir,
        } => {
            export_cmd::run(ExportOptions {
                url,
                titles,
                out_dir,
                filename,
                timeout_ms,
                max_pages,
                navigation_timeout_ms,
                settle_ms,
                headed,
                user_data_dir,
            })
            .await
        }

        Commands::Replay {
            files,
            title,
            out_dir,
            filename,
            max_pages,
        } => {
            let config = effective_config(filename.as_deref(), None, max_pages);
            replay_cmd::run(&files, title.as_deref(), out_dir.as_deref(), &config).await
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "dash-harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    result
}
