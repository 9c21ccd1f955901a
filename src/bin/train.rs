use clap::Parser;
use dotenv::dotenv;
use log::info;
use mistral_sql::cli::train::{ TrainCli, TrainCommand };
use mistral_sql::train;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let cli = TrainCli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &cli.command {
        TrainCommand::Prepare(args) => {
            let plan = train::prepare(args)?;
            info!(
                "Prepared {} examples; final adapter will be checkpoint-{}",
                plan.schedule.num_examples,
                plan.schedule.final_checkpoint().unwrap_or(0)
            );
        }
        TrainCommand::Plan(args) => {
            let plan = train::plan(args)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        TrainCommand::Checkpoints(args) => {
            let entries = train::checkpoints(args)?;
            if entries.is_empty() {
                info!("No checkpoints in {}", args.output_dir.display());
            }
        }
    }

    Ok(())
}
