use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storage_testing::errors::{Result, TestingError};
use storage_testing::{run_scenario, scenario};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "storage-scenario")]
#[command(about = "Replay volume lifecycle scenarios against the tracker")]
struct ScenarioCli {
    #[command(subcommand)]
    command: ScenarioCommand,
}

#[derive(Debug, Subcommand)]
enum ScenarioCommand {
    /// Run bundled scenarios (all of them unless --name or --file is given)
    Run {
        #[arg(long, conflicts_with = "file")]
        name: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Print outcomes as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List bundled scenario names
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = ScenarioCli::parse();

    match cli.command {
        ScenarioCommand::List => {
            for name in scenario::list_names()? {
                println!("{}", name);
            }
            Ok(())
        }
        ScenarioCommand::Run { name, file, json } => {
            let scenarios = match (name, file) {
                (_, Some(path)) => vec![scenario::load_from_path(&path)?],
                (Some(name), None) => vec![scenario::load_by_name(&name)?],
                (None, None) => scenario::list_names()?
                    .iter()
                    .map(|name| scenario::load_by_name(name))
                    .collect::<Result<Vec<_>>>()?,
            };

            let mut failed = Vec::new();
            for scenario in &scenarios {
                let outcome = run_scenario(scenario).await;
                if json {
                    match serde_json::to_string(&outcome) {
                        Ok(line) => println!("{}", line),
                        Err(error) => eprintln!("failed to encode outcome: {}", error),
                    }
                } else {
                    print!("{}", outcome);
                }
                if !outcome.passed() {
                    failed.push((outcome.name.clone(), outcome.mismatches.len()));
                }
            }

            match failed.into_iter().next() {
                Some((scenario_name, mismatches)) => Err(TestingError::ScenarioFailed {
                    scenario_name,
                    mismatches,
                }),
                None => Ok(()),
            }
        }
    }
}
