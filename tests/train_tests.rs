use clap::Parser;
use mistral_sql::adapter::{ AdapterCheckpoint, TargetModules };
use mistral_sql::cli::train::{ TrainCli, TrainCommand };
use mistral_sql::train::{ self, plan::TrainingPlan, TrainError, PLAN_FILE, TOKENIZED_DATASET_FILE };
use serde_json::{ json, Value };
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_dataset(dir: &Path, records: usize) -> String {
    let mut lines = Vec::new();
    for i in 0..records {
        lines.push(json!({
            "messages": [
                {"role": "system", "content": "sql only"},
                {"role": "user", "content": format!("select from t{}", i)},
                {"role": "assistant", "content": "select t from t"}
            ]
        }).to_string());
    }
    let path = dir.join("dataset.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().into_owned()
}

fn write_tokenizer(dir: &Path) -> String {
    let tokenizer_json = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "[": 1, "INST": 2, "]": 3, "select": 5, "from": 6, "t": 7 },
            "unk_token": "[UNK]"
        }
    });
    let path = dir.join("tokenizer.json");
    fs::write(&path, tokenizer_json.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_plan_reports_schedule_for_dataset() {
    let tmp = TempDir::new().unwrap();
    let dataset = write_dataset(tmp.path(), 56);

    let cli = TrainCli::try_parse_from(["mistral-sql-train", "plan", "--dataset", dataset.as_str()]).unwrap();
    let TrainCommand::Plan(args) = cli.command else {
        panic!("expected plan");
    };

    let plan = train::plan(&args).unwrap();
    assert_eq!(plan.schedule.num_examples, 56);
    assert_eq!(plan.schedule.total_steps, 21);
    assert_eq!(plan.schedule.final_checkpoint(), Some(21));
    assert_eq!(plan.lora.base_model_name_or_path.as_deref(), Some("mistralai/Mistral-7B-Instruct-v0.1"));
}

#[test]
fn test_plan_rejects_empty_dataset() {
    let tmp = TempDir::new().unwrap();
    let dataset = write_dataset(tmp.path(), 0);

    let cli = TrainCli::try_parse_from(["mistral-sql-train", "plan", "--dataset", dataset.as_str()]).unwrap();
    let TrainCommand::Plan(args) = cli.command else {
        panic!("expected plan");
    };

    assert!(matches!(train::plan(&args), Err(TrainError::EmptyDataset(_))));
}

#[test]
fn test_prepare_writes_tokenized_dataset_and_plan() {
    let tmp = TempDir::new().unwrap();
    let dataset = write_dataset(tmp.path(), 3);
    let tokenizer = write_tokenizer(tmp.path());
    let output_dir = tmp.path().join("out");
    let output = output_dir.to_string_lossy().into_owned();

    let cli = TrainCli::try_parse_from([
        "mistral-sql-train",
        "prepare",
        "--dataset",
        dataset.as_str(),
        "--tokenizer",
        tokenizer.as_str(),
        "--output-dir",
        output.as_str(),
        "--max-length",
        "12",
        "--target-modules",
        "q_proj,k_proj,v_proj",
    ]).unwrap();
    let TrainCommand::Prepare(args) = cli.command else {
        panic!("expected prepare");
    };

    let plan = train::prepare(&args).unwrap();
    assert_eq!(plan.max_length, Some(12));
    assert_eq!(
        plan.lora.target_modules,
        TargetModules::List(vec!["q_proj".into(), "k_proj".into(), "v_proj".into()])
    );

    let tokenized = fs::read_to_string(output_dir.join(TOKENIZED_DATASET_FILE)).unwrap();
    let rows: Vec<Value> = tokenized.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(rows.len(), 3);
    // "[INST] select from t0 [/INST] select t from t"; "t0" and "[/" are unknown
    assert_eq!(rows[0]["input_ids"], json!([1, 2, 3, 5, 6, 0, 0, 2, 3, 5, 7, 6]));
    assert_eq!(rows[0]["attention_mask"].as_array().unwrap().len(), 12);

    let written: TrainingPlan =
        serde_json::from_str(&fs::read_to_string(output_dir.join(PLAN_FILE)).unwrap()).unwrap();
    assert_eq!(written, plan);
    assert_eq!(written.schedule.total_steps, 3);
}

#[test]
fn test_checkpoints_prune_and_serve_latest() {
    let tmp = TempDir::new().unwrap();
    for step in [7, 14, 21] {
        let dir = tmp.path().join(format!("checkpoint-{}", step));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("adapter_config.json"),
            json!({"r": 16, "lora_alpha": 32, "lora_dropout": 0.05, "target_modules": "q_proj|v_proj"}).to_string(),
        ).unwrap();
        fs::write(dir.join("adapter_model.bin"), b"weights").unwrap();
    }
    let output = tmp.path().to_string_lossy().into_owned();

    let cli = TrainCli::try_parse_from([
        "mistral-sql-train",
        "checkpoints",
        "--output-dir",
        output.as_str(),
        "--prune",
        "--keep",
        "2",
    ]).unwrap();
    let TrainCommand::Checkpoints(args) = cli.command else {
        panic!("expected checkpoints");
    };

    let remaining: Vec<u64> = train::checkpoints(&args).unwrap().iter().map(|e| e.step).collect();
    assert_eq!(remaining, vec![14, 21]);

    // a limit of 0 keeps every checkpoint
    let cli = TrainCli::try_parse_from([
        "mistral-sql-train",
        "checkpoints",
        "--output-dir",
        output.as_str(),
        "--prune",
        "--keep",
        "0",
    ]).unwrap();
    let TrainCommand::Checkpoints(args) = cli.command else {
        panic!("expected checkpoints");
    };
    assert_eq!(train::checkpoints(&args).unwrap().len(), 2);

    let adapter = AdapterCheckpoint::resolve(tmp.path(), None).unwrap();
    assert_eq!(adapter.step, Some(21));
    assert_eq!(adapter.config.target_modules, TargetModules::Pattern("q_proj|v_proj".into()));
    assert_eq!(adapter.config.bias, "none");
}
