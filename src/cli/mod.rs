pub mod train;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Serves a LoRA-adapted model behind a chat-completions endpoint that answers with SQL", long_about = None)]
pub struct Args {
    // --- Model / Adapter Args ---
    /// Base model the adapter was trained on (hub identifier).
    #[arg(long, env = "BASE_MODEL", default_value = "mistralai/Mistral-7B-Instruct-v0.1")]
    pub base_model: String,

    /// Training output directory, or an adapter directory itself.
    #[arg(long, env = "ADAPTER_DIR", default_value = "mistral-lora-out")]
    pub adapter_dir: String,

    /// Checkpoint inside the adapter directory (e.g. checkpoint-21). Latest when unset.
    #[arg(long, env = "ADAPTER_CHECKPOINT")]
    pub adapter_checkpoint: Option<String>,

    /// Access token for the model-hosting service, sent as a bearer token to the generator.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    // --- Generation Backend Args ---
    /// Generation backend type (tgi, ollama)
    #[arg(long, env = "GENERATOR_TYPE", default_value = "tgi")]
    pub generator_type: String,

    /// Base URL of the generation backend (e.g., http://localhost:8080 for TGI)
    #[arg(long, env = "GENERATOR_BASE_URL")] // No default, let adapters handle defaults if None
    pub generator_base_url: Option<String>,

    /// Model name on the generation backend (the Ollama model built with the adapter)
    #[arg(long, env = "GENERATOR_MODEL")]
    pub generator_model: Option<String>,

    /// Adapter id passed per request to backends that multiplex adapters. Must match the id the
    /// runtime registered the adapter under. When unset, a local generator gets the absolute
    /// checkpoint path and a remote one gets no id.
    #[arg(long, env = "ADAPTER_ID")]
    pub adapter_id: Option<String>,

    /// Maximum number of new tokens generated per request.
    #[arg(long, env = "MAX_NEW_TOKENS", default_value = "256")]
    pub max_new_tokens: u32,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
