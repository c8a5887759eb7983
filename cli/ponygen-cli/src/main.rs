mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::ConnectArgs;

#[derive(Parser)]
#[command(name = "ponygen")]
#[command(about = "Generate Pony ORM entities from an existing database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the database and print (or write) the entity module
    #[command(name = "gen")]
    Generate {
        #[command(flatten)]
        target: ConnectArgs,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Generate from a schema snapshot instead of a live database
        #[arg(long, conflicts_with = "connect")]
        from_snapshot: Option<PathBuf>,
    },
    /// Save the database schema as a TOML snapshot
    Introspect {
        #[command(flatten)]
        target: ConnectArgs,
        #[arg(short, long, default_value = "./schema/schema.toml")]
        output: PathBuf,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            target,
            out,
            from_snapshot,
        } => commands::generate::run(&target, out.as_deref(), from_snapshot.as_deref()).await,
        Commands::Introspect { target, output } => commands::introspect::run(&target, &output).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
