//! Data preparation and scheduling for LoRA fine-tuning runs.
//!
//! Gradient updates happen in an external trainer that consumes the
//! tokenized dataset and `training_plan.json` written here.

pub mod dataset;
pub mod plan;
pub mod tokenize;

use log::info;
use std::fs::{ self, File };
use std::io::{ BufWriter, Write };
use std::path::{ Path, PathBuf };
use thiserror::Error;

use crate::adapter::{ self, AdapterError, CheckpointEntry };
use crate::cli::train::{ CheckpointArgs, PrepareArgs, RunArgs };
use self::dataset::load_dataset;
use self::plan::{ TrainingPlan, TrainingSchedule };
use self::tokenize::{ fetch_tokenizer, ExampleTokenizer, TokenizedExample };

pub const TOKENIZED_DATASET_FILE: &str = "tokenized_train.jsonl";
pub const PLAN_FILE: &str = "training_plan.json";

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("failed to read dataset '{}': {source}", .path.display())]
    DatasetIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dataset '{}' has no records", .0.display())]
    EmptyDataset(PathBuf),
    #[error("invalid dataset record on line {line}: {source}")]
    DatasetRecord {
        line: usize,
        source: serde_json::Error,
    },
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("model hub error: {0}")]
    Hub(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn build_plan(run: &RunArgs, num_examples: usize) -> TrainingPlan {
    let training_args = run.training_arguments();
    let schedule = TrainingSchedule::compute(num_examples, &training_args);
    TrainingPlan {
        base_model: run.base_model.clone(),
        dataset_path: run.dataset.to_string_lossy().into_owned(),
        tokenized_dataset: None,
        max_length: None,
        lora: run.lora_config(),
        training_args,
        schedule,
    }
}

fn log_schedule(schedule: &TrainingSchedule) {
    info!("Examples: {}", schedule.num_examples);
    info!("Optimizer steps per epoch: {}", schedule.steps_per_epoch);
    info!("Total optimizer steps: {}", schedule.total_steps);
    info!("Checkpoints at steps: {:?}", schedule.checkpoint_steps);
    info!("Checkpoints retained: {:?}", schedule.retained_checkpoints);
}

/// Computes the schedule for a dataset without tokenizing it.
pub fn plan(run: &RunArgs) -> Result<TrainingPlan, TrainError> {
    let records = load_dataset(&run.dataset)?;
    let plan = build_plan(run, records.len());
    log_schedule(&plan.schedule);
    Ok(plan)
}

/// Tokenizes the dataset and writes it together with the plan into the
/// output directory. Returns the written plan.
pub fn prepare(args: &PrepareArgs) -> Result<TrainingPlan, TrainError> {
    let run = &args.run;
    let records = load_dataset(&run.dataset)?;
    info!("Loaded {} records from {}", records.len(), run.dataset.display());

    let tokenizer_path = match &args.tokenizer {
        Some(path) => path.clone(),
        None => fetch_tokenizer(&run.base_model, &args.hf_home, args.hf_token.clone())?,
    };
    let tokenizer = ExampleTokenizer::from_file(&tokenizer_path, args.max_length)?;
    let examples = tokenizer.encode_records(&records)?;
    let truncated = examples.iter().filter(|e| e.input_ids.len() >= tokenizer.max_length()).count();
    if truncated > 0 {
        info!("{} examples reached max length {}", truncated, tokenizer.max_length());
    }

    fs::create_dir_all(&run.output_dir)?;
    let tokenized_path = run.output_dir.join(TOKENIZED_DATASET_FILE);
    write_examples(&tokenized_path, &examples)?;
    info!("Wrote {} tokenized examples to {}", examples.len(), tokenized_path.display());

    let mut plan = build_plan(run, examples.len());
    plan.tokenized_dataset = Some(tokenized_path.to_string_lossy().into_owned());
    plan.max_length = Some(args.max_length);
    let plan_path = write_plan(&run.output_dir, &plan)?;
    log_schedule(&plan.schedule);
    info!("Wrote training plan to {}", plan_path.display());
    Ok(plan)
}

pub fn write_examples(path: &Path, examples: &[TokenizedExample]) -> Result<(), TrainError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for example in examples {
        serde_json::to_writer(&mut writer, example)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_plan(output_dir: &Path, plan: &TrainingPlan) -> Result<PathBuf, TrainError> {
    let path = output_dir.join(PLAN_FILE);
    fs::write(&path, serde_json::to_string_pretty(plan)?)?;
    Ok(path)
}

/// Lists checkpoints and, when asked, rotates them down to `keep`.
pub fn checkpoints(args: &CheckpointArgs) -> Result<Vec<CheckpointEntry>, TrainError> {
    if args.prune {
        let removed = adapter::prune_checkpoints(&args.output_dir, args.keep)?;
        info!("Pruned {} checkpoints", removed.len());
    }
    let entries = adapter::list_checkpoints(&args.output_dir)?;
    for entry in &entries {
        info!("checkpoint step {:>6}  {}", entry.step, entry.path.display());
    }
    Ok(entries)
}
