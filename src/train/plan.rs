use serde::{ Deserialize, Serialize };

use crate::adapter::LoraConfig;

/// Trainer hyper-parameters, named as the trainer consuming the plan expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArguments {
    pub output_dir: String,
    pub per_device_train_batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub num_train_epochs: u32,
    pub learning_rate: f64,
    pub fp16: bool,
    pub logging_steps: u32,
    pub save_steps: u32,
    pub save_total_limit: u32,
    pub remove_unused_columns: bool,
    pub report_to: String,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            output_dir: "./mistral-lora-out".to_string(),
            per_device_train_batch_size: 1,
            gradient_accumulation_steps: 8,
            num_train_epochs: 3,
            learning_rate: 2e-4,
            fp16: false,
            logging_steps: 10,
            save_steps: 100,
            save_total_limit: 2,
            remove_unused_columns: false,
            report_to: "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSchedule {
    pub num_examples: usize,
    pub steps_per_epoch: u64,
    pub total_steps: u64,
    pub logging_steps: Vec<u64>,
    /// Every step a checkpoint is written at.
    pub checkpoint_steps: Vec<u64>,
    /// Checkpoints still on disk when the run ends.
    pub retained_checkpoints: Vec<u64>,
}

impl TrainingSchedule {
    pub fn compute(num_examples: usize, args: &TrainingArguments) -> Self {
        let batch = u64::from(args.per_device_train_batch_size.max(1));
        let accum = u64::from(args.gradient_accumulation_steps.max(1));
        let batches_per_epoch = (num_examples as u64).div_ceil(batch);
        let steps_per_epoch = (batches_per_epoch / accum).max(1);
        let total_steps = steps_per_epoch * u64::from(args.num_train_epochs);

        let logging_steps = every(u64::from(args.logging_steps), total_steps);

        let mut checkpoint_steps = every(u64::from(args.save_steps), total_steps);
        if total_steps > 0 && checkpoint_steps.last() != Some(&total_steps) {
            checkpoint_steps.push(total_steps);
        }

        let keep = args.save_total_limit as usize;
        let retained_checkpoints = if keep == 0 {
            checkpoint_steps.clone()
        } else {
            checkpoint_steps[checkpoint_steps.len().saturating_sub(keep)..].to_vec()
        };

        Self {
            num_examples,
            steps_per_epoch,
            total_steps,
            logging_steps,
            checkpoint_steps,
            retained_checkpoints,
        }
    }

    pub fn final_checkpoint(&self) -> Option<u64> {
        self.checkpoint_steps.last().copied()
    }
}

fn every(interval: u64, total: u64) -> Vec<u64> {
    if interval == 0 {
        return Vec::new();
    }
    (1..=total / interval).map(|i| i * interval).collect()
}

/// Everything an external trainer needs to run the fine-tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub base_model: String,
    pub dataset_path: String,
    pub tokenized_dataset: Option<String>,
    pub max_length: Option<usize>,
    pub lora: LoraConfig,
    pub training_args: TrainingArguments,
    pub schedule: TrainingSchedule,
}
