use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub openai_api_url: String,
    pub github_models_api_url: String,
    pub openai_model: String,
    pub github_model: String,
    /// Override for the credentials file path. When unset, the store lives
    /// at `~/.clawbackrc.json`.
    pub credentials_file: Option<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // Start off with default values
            .set_default("api_base_url", "https://api.joinforma.com")?
            .set_default("openai_api_url", "https://api.openai.com/v1")?
            .set_default("github_models_api_url", "https://models.github.ai/inference")?
            .set_default("openai_model", "gpt-4o-mini")?
            .set_default("github_model", "openai/gpt-4.1")?
            // Add in an optional local config file
            .add_source(File::with_name("config").required(false))
            // Add in settings from environment variables (with a prefix of CLAWBACK)
            .add_source(Environment::with_prefix("CLAWBACK"))
            .build()?;

        settings.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.joinforma.com".to_string(),
            openai_api_url: "https://api.openai.com/v1".to_string(),
            github_models_api_url: "https://models.github.ai/inference".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            github_model: "openai/gpt-4.1".to_string(),
            credentials_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_production_api() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "https://api.joinforma.com");
        assert!(config.credentials_file.is_none());
    }
}
