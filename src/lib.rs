pub mod adapter;
pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod server;
pub mod sql;
pub mod train;

use adapter::AdapterCheckpoint;
use agent::CompletionAgent;
use cli::Args;
use llm::LlmConfig;
use llm::generate::{ new_client, GenerationParams };
use log::{ info, warn };
use reqwest::Url;
use server::Server;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Base Model: {}", args.base_model);
    info!("Adapter Dir: {}", args.adapter_dir);
    info!("Adapter Checkpoint: {}", args.adapter_checkpoint.as_deref().unwrap_or("latest"));
    info!("Generator Type: {}", args.generator_type);
    info!("Generator Base URL: {}", args.generator_base_url.as_deref().unwrap_or("adapter default"));
    info!("Max New Tokens: {}", args.max_new_tokens);
    info!("Access Token Set: {}", args.hf_token.is_some());
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let adapter = AdapterCheckpoint::resolve(&args.adapter_dir, args.adapter_checkpoint.as_deref())?;
    info!(
        "Adapter loaded: {} (r={}, alpha={}, targets={:?})",
        adapter.path.display(),
        adapter.config.r,
        adapter.config.lora_alpha,
        adapter.config.target_modules
    );
    adapter.check_base_model(&args.base_model);

    let llm_config = LlmConfig {
        llm_type: args.generator_type.parse()?,
        api_key: args.hf_token.clone().filter(|k| !k.trim().is_empty()),
        model: args.generator_model.clone(),
        base_url: args.generator_base_url.clone(),
        adapter_id: default_adapter_id(
            args.adapter_id.as_deref(),
            &adapter.path,
            args.generator_base_url.as_deref()
        ),
    };
    let generator = new_client(&llm_config)?;
    info!(
        "Generator configured: Type={}, Model={}, BaseURL={:?}",
        llm_config.llm_type,
        generator.get_model(),
        generator.get_base_url()
    );

    let params = GenerationParams { max_new_tokens: args.max_new_tokens };
    let agent = Arc::new(CompletionAgent::new(generator, params));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}

/// An explicit id wins. Otherwise a generator on this host gets the absolute
/// checkpoint path and a remote one gets no id.
fn default_adapter_id(explicit: Option<&str>, adapter_path: &Path, base_url: Option<&str>) -> Option<String> {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return Some(id.to_string());
    }
    if !is_local_url(base_url) {
        warn!("Generator is remote and --adapter-id is unset; using the runtime's default adapter");
        return None;
    }
    let path = std::fs::canonicalize(adapter_path).unwrap_or_else(|_| adapter_path.to_path_buf());
    Some(path.to_string_lossy().into_owned())
}

fn is_local_url(base_url: Option<&str>) -> bool {
    let Some(url) = base_url else {
        return true;
    };
    match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"),
        None => false,
    }
}
