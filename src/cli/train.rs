use clap::{ Args as ClapArgs, Parser, Subcommand };
use std::path::PathBuf;

use crate::adapter::{ LoraConfig, TargetModules };
use crate::train::plan::TrainingArguments;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Prepares LoRA fine-tuning runs and manages their checkpoints", long_about = None)]
pub struct TrainCli {
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: TrainCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TrainCommand {
    /// Tokenize the dataset and write the training plan into the output directory.
    Prepare(PrepareArgs),
    /// Print the step and checkpoint schedule for the dataset without tokenizing.
    Plan(RunArgs),
    /// List (and optionally rotate) checkpoints in the output directory.
    Checkpoints(CheckpointArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Base model to fine-tune (hub identifier).
    #[arg(long, env = "BASE_MODEL", default_value = "mistralai/Mistral-7B-Instruct-v0.1")]
    pub base_model: String,

    /// Chat-format JSONL dataset, one {"messages": [...]} object per line.
    #[arg(long, env = "DATASET_PATH", default_value = "/workspace/diagnostico.jsonl")]
    pub dataset: PathBuf,

    /// Directory receiving checkpoints and prepared artifacts.
    #[arg(long, env = "OUTPUT_DIR", default_value = "./mistral-lora-out")]
    pub output_dir: PathBuf,

    // --- LoRA Args ---
    #[arg(long, env = "LORA_R", default_value = "16")]
    pub lora_r: u32,

    #[arg(long, env = "LORA_ALPHA", default_value = "32")]
    pub lora_alpha: f64,

    #[arg(long, env = "LORA_DROPOUT", default_value = "0.05")]
    pub lora_dropout: f64,

    /// Modules receiving adapters, comma separated.
    #[arg(long, env = "LORA_TARGET_MODULES", value_delimiter = ',', default_value = "q_proj,v_proj")]
    pub target_modules: Vec<String>,

    // --- Trainer Args ---
    #[arg(long, env = "NUM_TRAIN_EPOCHS", default_value = "3")]
    pub epochs: u32,

    #[arg(long, env = "LEARNING_RATE", default_value = "2e-4")]
    pub learning_rate: f64,

    #[arg(long, env = "BATCH_SIZE", default_value = "1")]
    pub batch_size: u32,

    #[arg(long, env = "GRADIENT_ACCUMULATION_STEPS", default_value = "8")]
    pub gradient_accumulation_steps: u32,

    #[arg(long, env = "LOGGING_STEPS", default_value = "10")]
    pub logging_steps: u32,

    #[arg(long, env = "SAVE_STEPS", default_value = "100")]
    pub save_steps: u32,

    #[arg(long, env = "SAVE_TOTAL_LIMIT", default_value = "2")]
    pub save_total_limit: u32,

    /// Train in half precision (only meaningful on CUDA devices).
    #[arg(long, env = "FP16", default_value = "false")]
    pub fp16: bool,
}

impl RunArgs {
    pub fn lora_config(&self) -> LoraConfig {
        LoraConfig {
            r: self.lora_r,
            lora_alpha: self.lora_alpha,
            target_modules: TargetModules::List(self.target_modules.clone()),
            lora_dropout: self.lora_dropout,
            base_model_name_or_path: Some(self.base_model.clone()),
            ..LoraConfig::default()
        }
    }

    pub fn training_arguments(&self) -> TrainingArguments {
        TrainingArguments {
            output_dir: self.output_dir.to_string_lossy().into_owned(),
            per_device_train_batch_size: self.batch_size,
            gradient_accumulation_steps: self.gradient_accumulation_steps,
            num_train_epochs: self.epochs,
            learning_rate: self.learning_rate,
            fp16: self.fp16,
            logging_steps: self.logging_steps,
            save_steps: self.save_steps,
            save_total_limit: self.save_total_limit,
            ..TrainingArguments::default()
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Local tokenizer.json. Fetched from the hub for the base model when unset.
    #[arg(long, env = "TOKENIZER_PATH")]
    pub tokenizer: Option<PathBuf>,

    /// Maximum tokens per example; longer examples are truncated.
    #[arg(long, env = "MAX_LENGTH", default_value = "1024")]
    pub max_length: usize,

    /// Cache directory for hub downloads.
    #[arg(long, env = "HF_HOME", default_value = "/workspace/hf-cache")]
    pub hf_home: PathBuf,

    /// Access token for the model-hosting service.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckpointArgs {
    #[arg(long, env = "OUTPUT_DIR", default_value = "./mistral-lora-out")]
    pub output_dir: PathBuf,

    /// Delete all but the newest --keep checkpoints.
    #[arg(long, default_value = "false")]
    pub prune: bool,

    #[arg(long, env = "SAVE_TOTAL_LIMIT", default_value = "2")]
    pub keep: usize,
}
