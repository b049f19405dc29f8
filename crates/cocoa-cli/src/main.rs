use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod render;

#[derive(Parser)]
#[command(name = "cocoa")]
#[command(about = "Local Cocoa CLI - progressive file search and resumable answers", long_about = None)]
struct Cli {
    /// Also write logs to a daily rolling file under the config directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Backend URL, overriding client.toml and the environment
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search indexed files, printing hits as each stage arrives
    Search {
        /// Query text
        #[arg(required = true)]
        query: Vec<String>,

        /// Print the final search state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a question and stream the answer
    Ask {
        /// Question text
        #[arg(required = true)]
        question: Vec<String>,

        /// Continue a paused answer with its resume token
        #[arg(long)]
        resume: Option<String>,
    },
    /// Read lines from stdin: plain text searches, /ask asks
    Interactive,
    /// Inspect or edit client.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the path of client.toml
    Path,
    /// Write a default client.toml if none exists
    Init,
    /// Set one configuration key
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_file)?;

    match cli.command {
        Commands::Search { query, json } => {
            let mut controller = commands::connect(cli.backend.as_deref())?;
            commands::search::run(&mut controller, &query.join(" "), json).await?
        }
        Commands::Ask { question, resume } => {
            let mut controller = commands::connect(cli.backend.as_deref())?;
            commands::ask::run(&mut controller, &question.join(" "), resume.as_deref()).await?
        }
        Commands::Interactive => {
            let mut controller = commands::connect(cli.backend.as_deref())?;
            commands::interactive::run(&mut controller).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show()?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init => commands::config::init()?,
            ConfigAction::Set { key, value } => commands::config::set(&key, &value)?,
        },
    }

    Ok(())
}
