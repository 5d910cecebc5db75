//! Toolwright command-line entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolwright::app::App;
use toolwright::config::Config;
use toolwright::validate;

#[derive(Parser)]
#[command(name = "toolwright", about = "Self-extending tool agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a task through the agent loop.
    Run {
        /// The task to accomplish.
        task: String,
    },
    /// Inspect or manage the tool library.
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },
    /// Statically validate a Lua tool source file without running it.
    Validate {
        /// Path to the Lua source.
        file: PathBuf,
        /// Expected global entry point; defaults to the file stem.
        #[arg(long)]
        entry_point: Option<String>,
    },
}

#[derive(Subcommand)]
enum ToolsCommand {
    /// List every registered tool.
    List,
    /// Show one tool's schema.
    Show { name: String },
    /// Delete a tool from storage, the index, and the registry.
    Delete { name: String },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> toolwright::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { task } => {
            let app = App::bootstrap(Config::from_env()?).await?;
            let outcome = app.run_task(&task).await?;
            println!("{}", outcome.answer);
            tracing::info!(iterations = outcome.iterations, "run complete");
        }
        Command::Tools { command } => {
            let app = App::bootstrap(Config::from_env()?).await?;
            match command {
                ToolsCommand::List => {
                    for name in app.list_tools().await {
                        println!("{}", name);
                    }
                }
                ToolsCommand::Show { name } => match app.tool_schema(&name).await {
                    Some(schema) => {
                        let rendered = serde_json::to_string_pretty(&schema)
                            .unwrap_or_else(|e| format!("(unrenderable schema: {})", e));
                        println!("{}", rendered);
                    }
                    None => {
                        eprintln!("tool '{}' is not registered", name);
                        std::process::exit(1);
                    }
                },
                ToolsCommand::Delete { name } => {
                    app.delete_tool(&name).await?;
                    println!("deleted '{}'", name);
                }
            }
        }
        Command::Validate { file, entry_point } => {
            let code = std::fs::read_to_string(&file).map_err(|e| {
                toolwright::Error::Storage(toolwright::error::StorageError::Io {
                    path: file.display().to_string(),
                    source: e,
                })
            })?;
            let entry = entry_point.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            });
            let result = validate::validate(&code, &entry);
            println!("{}", result.summary());
            if !result.passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
