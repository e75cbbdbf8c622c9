mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    epic::EpicSubcommand, feature::FeatureSubcommand, migrate::MigrateSubcommand,
    story::StorySubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "forge",
    about = "Git-integrated atomic state manager — features, epics, and stories with transactional history",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .forge/ or .git/)
    #[arg(long, global = true, env = "FORGE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the workspace in the current git repository
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        project: Option<String>,
    },

    /// Manage features
    Feature {
        #[command(subcommand)]
        subcommand: FeatureSubcommand,
    },

    /// Manage epics
    Epic {
        #[command(subcommand)]
        subcommand: EpicSubcommand,
    },

    /// Manage stories
    Story {
        #[command(subcommand)]
        subcommand: StorySubcommand,
    },

    /// Check filesystem, record store, and git for drift
    Validate {
        /// Restrict the check to one feature
        #[arg(long)]
        feature: Option<String>,
    },

    /// Record store schema migrations
    Migrate {
        #[command(subcommand)]
        subcommand: MigrateSubcommand,
    },

    /// Show recent commits, optionally for one feature
    History {
        /// Feature name (omit for the whole managed tree)
        feature: Option<String>,

        /// Maximum number of commits
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { project } => cmd::init::run(&root, project.as_deref(), cli.json),
        Commands::Feature { subcommand } => cmd::feature::run(&root, subcommand, cli.json),
        Commands::Epic { subcommand } => cmd::epic::run(&root, subcommand, cli.json),
        Commands::Story { subcommand } => cmd::story::run(&root, subcommand, cli.json),
        Commands::Validate { feature } => cmd::validate::run(&root, feature.as_deref(), cli.json),
        Commands::Migrate { subcommand } => cmd::migrate::run(&root, subcommand, cli.json),
        Commands::History { feature, limit } => {
            cmd::history::run(&root, feature.as_deref(), limit, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
