mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cockpit",
    about = "Run shell commands on a cockpit server and follow their output",
    version,
    propagate_version = true
)]
struct Cli {
    /// Server base URL (default: http://127.0.0.1:8080)
    #[arg(long, global = true, env = "COCKPIT_URL")]
    url: Option<String>,

    /// YAML client config file
    #[arg(long, global = true, env = "COCKPIT_CONFIG")]
    config: Option<PathBuf>,

    /// Entries fetched per history page
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log connection lifecycle to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List commands, newest first
    List {
        /// Page through the whole history instead of the first page
        #[arg(long)]
        all: bool,

        /// Keep printing changes until Ctrl-C
        #[arg(long, short = 'f')]
        follow: bool,
    },

    /// Print a command's output, oldest line first
    Logs {
        id: String,

        /// Page through the whole log instead of the newest page
        #[arg(long)]
        all: bool,

        /// Keep printing new lines until Ctrl-C
        #[arg(long, short = 'f')]
        follow: bool,
    },

    /// Start a shell command on the server
    Run {
        /// Stream the command's output until it finishes
        #[arg(long, short = 'f')]
        follow: bool,

        /// Command line, joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show one command
    Show { id: String },

    /// Delete a command and its logs
    Rm { id: String },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = settings::resolve(cli.config.as_deref(), cli.url.as_deref(), cli.page_size)
        .and_then(|config| {
            let ctx = cmd::Ctx::new(&config, cli.json)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(dispatch(&ctx, cli.command))
        });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(ctx: &cmd::Ctx, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List { all, follow } => cmd::list::run(ctx, all, follow).await,
        Commands::Logs { id, all, follow } => cmd::logs::run(ctx, &id, all, follow).await,
        Commands::Run { follow, command } => cmd::run::run(ctx, &command.join(" "), follow).await,
        Commands::Show { id } => cmd::show::run(ctx, &id).await,
        Commands::Rm { id } => cmd::rm::run(ctx, &id).await,
    }
}
