use hf_hub::api::sync::ApiBuilder;
use hf_hub::Cache;
use log::info;
use serde::{ Deserialize, Serialize };
use std::path::{ Path, PathBuf };
use tokenizers::{ Tokenizer, TruncationParams };

use super::TrainError;
use super::dataset::DatasetRecord;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedExample {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// Fetches `tokenizer.json` for `model_id` into the hub cache under `hf_home`.
/// Without an explicit token, the login stored under `hf_home` is used.
pub fn fetch_tokenizer(model_id: &str, hf_home: &Path, token: Option<String>) -> Result<PathBuf, TrainError> {
    info!("Fetching {} for {} (cache: {})", TOKENIZER_FILE, model_id, hf_home.display());
    let mut builder = ApiBuilder::from_cache(Cache::new(hf_home.join("hub")));
    if let Some(token) = explicit_token(token) {
        builder = builder.with_token(Some(token));
    }
    let api = builder.build().map_err(|e| TrainError::Hub(e.to_string()))?;
    api.model(model_id.to_string())
        .get(TOKENIZER_FILE)
        .map_err(|e| TrainError::Hub(e.to_string()))
}

fn explicit_token(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}

/// Base-model tokenizer with special tokens added and truncation applied.
/// Examples are encoded one at a time, so no padding is needed.
pub struct ExampleTokenizer {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl ExampleTokenizer {
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self, TrainError> {
        let path = path.as_ref();
        let mut tokenizer = Tokenizer::from_file(path)
            .map_err(|e| TrainError::Tokenizer(format!("failed to load '{}': {}", path.display(), e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length, ..Default::default() }))
            .map_err(|e| TrainError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(None);
        Ok(Self { tokenizer, max_length })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode(&self, text: &str) -> Result<TokenizedExample, TrainError> {
        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| TrainError::Tokenizer(e.to_string()))?;
        Ok(TokenizedExample {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    pub fn encode_records(&self, records: &[DatasetRecord]) -> Result<Vec<TokenizedExample>, TrainError> {
        records.iter().map(|r| self.encode(&r.training_text())).collect()
    }
}
