// src/credentials.rs

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use crate::app_config::AppConfig;

const CREDENTIALS_FILENAME: &str = ".clawbackrc.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credentials {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// The single local credentials record, read and written wholesale. Built
/// once at startup and passed down explicitly - there is no ambient global.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn Error>> {
        let path = match &config.credentials_file {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .ok_or("Could not determine your home directory.")?
                .join(CREDENTIALS_FILENAME),
        };
        Ok(Self::new(path))
    }

    fn load(&self) -> Option<Credentials> {
        let raw = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// The token to authenticate with: a CLI-provided override wins over the
    /// stored one.
    pub fn access_token(&self, override_token: Option<&str>) -> Option<String> {
        if let Some(token) = override_token {
            return Some(token.to_string());
        }
        self.load().map(|credentials| credentials.access_token)
    }

    pub fn stored_email(&self) -> Option<String> {
        self.load().and_then(|credentials| credentials.email)
    }

    /// Replaces the stored access token, preserving a previously stored email
    /// unless a new one is given.
    pub fn store_access_token(
        &self,
        access_token: &str,
        email: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        let email = email
            .map(str::to_string)
            .or_else(|| self.stored_email());

        let credentials = Credentials {
            access_token: access_token.to_string(),
            email,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(&credentials)?)?;
        Ok(())
    }
}
