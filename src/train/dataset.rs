use serde::{ Deserialize, Serialize };
use std::fs::File;
use std::io::{ BufRead, BufReader };
use std::path::Path;

use super::TrainError;
use crate::config::prompt::format_training_conversation;
use crate::models::chat::ChatMessage;

/// One chat-format training record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub messages: Vec<ChatMessage>,
}

impl DatasetRecord {
    pub fn training_text(&self) -> String {
        format_training_conversation(&self.messages)
    }
}

/// Loads a JSONL dataset. A file without records is an error, since no
/// training step could be taken on it.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<DatasetRecord>, TrainError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TrainError::DatasetIo {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_dataset(BufReader::new(file))?;
    if records.is_empty() {
        return Err(TrainError::EmptyDataset(path.to_path_buf()));
    }
    Ok(records)
}

/// Parses JSONL records, skipping blank lines. Errors carry 1-based line numbers.
pub fn parse_dataset<R: BufRead>(reader: R) -> Result<Vec<DatasetRecord>, TrainError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DatasetRecord = serde_json::from_str(&line).map_err(|source| {
            TrainError::DatasetRecord { line: idx + 1, source }
        })?;
        records.push(record);
    }
    Ok(records)
}
