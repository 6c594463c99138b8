use dotenvy::dotenv;
use std::sync::Arc;

pub mod app_config;
pub mod commands;
pub mod core;
pub mod credentials;
pub mod services;

use crate::app_config::AppConfig;
use crate::commands::common::Command;
use crate::core::claim_system::ClaimSystem;
use crate::credentials::CredentialStore;
use crate::services::forma::FormaClient;
use crate::services::inference::OpenAiClient;

pub fn initialize_environment() {
    pretty_env_logger::init();
    dotenv().ok();
}

/// Wires the real services together from the app configuration.
pub fn initialize_system() -> Result<ClaimSystem, Box<dyn std::error::Error>> {
    let config = AppConfig::new()?;
    let forma = Arc::new(FormaClient::new(&config.api_base_url));
    let inference = Arc::new(OpenAiClient::new(&config));
    let credentials = CredentialStore::from_config(&config)?;
    Ok(ClaimSystem::new(forma, inference, credentials, config))
}

pub async fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let system = initialize_system()?;
    let mut stdout = std::io::stdout();
    commands::cli::execute_command(&system, command, &mut stdout).await
}
