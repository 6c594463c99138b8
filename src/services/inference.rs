// src/services/inference.rs

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use itertools::Itertools;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::app_config::AppConfig;
use crate::core::file_system::FileSystem;
use crate::core::models::BenefitWithCategories;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("You must either specify a GitHub Token or OpenAI API Key")]
    MissingApiKey,

    #[error("The model returned an unexpected response: {0}")]
    EmptyResponse(String),

    #[error("The model returned a response that wasn't a valid category: {0}")]
    UnknownCategory(String),

    #[error("The model returned a response that wasn't a valid claim: {0}")]
    UnparsableClaim(String),

    #[error("Something went wrong while inferring claim details - got `{status}` from the inference API: {body}")]
    UnexpectedStatus { status: String, body: String },

    #[error("Failed to read receipt file '{path}': {source}")]
    ReceiptRead {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// API keys for the inference backends. OpenAI wins when both are set.
#[derive(Debug, Clone, Default)]
pub struct InferenceKeys {
    pub openai_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl InferenceKeys {
    pub fn is_configured(&self) -> bool {
        self.openai_api_key.is_some() || self.github_token.is_some()
    }
}

/// A benefit/category pair picked by the model from a merchant name and a
/// description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSelection {
    pub benefit: String,
    pub category: String,
}

/// Full claim details read off a receipt image. Untrusted model output; the
/// caller feeds it through the same validation pipeline as manual input.
#[derive(Debug, Clone, Deserialize)]
pub struct InferredClaimDetails {
    pub benefit: String,
    pub category: String,
    pub amount: String,
    pub merchant: String,
    pub purchase_date: String,
    pub description: String,
}

#[async_trait]
pub trait InferenceApiTrait: Send + Sync {
    async fn infer_category_and_benefit(
        &self,
        keys: &InferenceKeys,
        merchant: &str,
        description: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredSelection, InferenceError>;

    async fn infer_claim_from_receipt(
        &self,
        keys: &InferenceKeys,
        receipt_path: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredClaimDetails, InferenceError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Speaks the OpenAI chat-completions wire format, against either the OpenAI
/// API or GitHub Models depending on which key is supplied.
pub struct OpenAiClient {
    client: Client,
    openai_api_url: String,
    github_models_api_url: String,
    openai_model: String,
    github_model: String,
}

struct Backend<'a> {
    api_url: &'a str,
    model: &'a str,
    api_key: &'a str,
}

impl OpenAiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            openai_api_url: config.openai_api_url.clone(),
            github_models_api_url: config.github_models_api_url.clone(),
            openai_model: config.openai_model.clone(),
            github_model: config.github_model.clone(),
        }
    }

    fn backend<'a>(&'a self, keys: &'a InferenceKeys) -> Result<Backend<'a>, InferenceError> {
        if keys.openai_api_key.is_some() && keys.github_token.is_some() {
            warn!("Both an OpenAI API key and a GitHub token were provided. Defaulting to OpenAI.");
        }

        if let Some(api_key) = keys.openai_api_key.as_deref() {
            Ok(Backend {
                api_url: &self.openai_api_url,
                model: &self.openai_model,
                api_key,
            })
        } else if let Some(api_key) = keys.github_token.as_deref() {
            Ok(Backend {
                api_url: &self.github_models_api_url,
                model: &self.github_model,
                api_key,
            })
        } else {
            Err(InferenceError::MissingApiKey)
        }
    }

    async fn chat_completion(
        &self,
        backend: &Backend<'_>,
        content: serde_json::Value,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", backend.api_url);
        debug!("Requesting chat completion from {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(backend.api_key)
            .json(&serde_json::json!({
                "model": backend.model,
                "messages": [{ "role": "user", "content": content }],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::UnexpectedStatus {
                status: status.to_string(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|_| InferenceError::EmptyResponse(body.clone()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(InferenceError::EmptyResponse(body))
    }
}

fn category_prompt(
    merchant: &str,
    description: &str,
    benefits: &[BenefitWithCategories],
) -> String {
    let valid_categories = benefits
        .iter()
        .flat_map(|benefit| benefit.categories.iter())
        .map(|category| category.label())
        .join("\n");

    format!(
        "Your job is to predict the category for an expense claim based on the name of the \
         merchant and a description of what was purchased. You should give a single, specific \
         answer without any extra words or punctuation.\n\n\
         Here are the possible categories:\n\n{valid_categories}\n\n\
         Please predict the category for the following claim:\n\n\
         Merchant: {merchant}\nDescription: {description}"
    )
}

fn receipt_prompt(benefits: &[BenefitWithCategories]) -> String {
    let valid_categories = benefits
        .iter()
        .flat_map(|benefit| {
            benefit
                .categories
                .iter()
                .map(|category| format!("{} (benefit: {})", category.label(), benefit.benefit.name()))
        })
        .join("\n");

    format!(
        "Read this receipt and extract the details of the expense as JSON with exactly these \
         keys: benefit, category, amount, merchant, purchase_date, description. The amount must \
         use the format 0.00 with no currency symbol. The purchase_date must use the YYYY-MM-DD \
         format. The category must be one of the categories listed below, and the benefit must \
         be that category's benefit. Reply with the JSON object only, no other words and no code \
         fences.\n\nHere are the possible categories:\n\n{valid_categories}"
    )
}

/// Finds the benefit owning a category label returned by the model.
fn selection_for_label(
    label: &str,
    benefits: &[BenefitWithCategories],
) -> Option<InferredSelection> {
    benefits
        .iter()
        .find(|benefit| {
            benefit
                .categories
                .iter()
                .any(|category| category.matches(label))
        })
        .map(|benefit| InferredSelection {
            benefit: benefit.benefit.name().to_string(),
            category: label.to_string(),
        })
}

/// Models occasionally wrap JSON in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[async_trait]
impl InferenceApiTrait for OpenAiClient {
    async fn infer_category_and_benefit(
        &self,
        keys: &InferenceKeys,
        merchant: &str,
        description: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredSelection, InferenceError> {
        let backend = self.backend(keys)?;
        let prompt = category_prompt(merchant, description, benefits);

        let content = self
            .chat_completion(&backend, serde_json::Value::String(prompt))
            .await?;
        let label = content.trim();

        selection_for_label(label, benefits)
            .ok_or_else(|| InferenceError::UnknownCategory(label.to_string()))
    }

    async fn infer_claim_from_receipt(
        &self,
        keys: &InferenceKeys,
        receipt_path: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredClaimDetails, InferenceError> {
        let backend = self.backend(keys)?;

        let bytes = FileSystem::read(receipt_path).map_err(|source| InferenceError::ReceiptRead {
            path: receipt_path.to_string(),
            source,
        })?;
        let data_url = format!(
            "data:{};base64,{}",
            FileSystem::mime_type(receipt_path),
            BASE64.encode(bytes)
        );

        let content = serde_json::json!([
            { "type": "text", "text": receipt_prompt(benefits) },
            { "type": "image_url", "image_url": { "url": data_url } },
        ]);

        let reply = self.chat_completion(&backend, content).await?;
        let details: InferredClaimDetails = serde_json::from_str(strip_code_fences(&reply))
            .map_err(|_| InferenceError::UnparsableClaim(reply.clone()))?;
        Ok(details)
    }
}

/// Canned inference results for tests.
#[derive(Default)]
pub struct MockInferenceService {
    selection: Option<InferredSelection>,
    details: Option<InferredClaimDetails>,
}

impl MockInferenceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, selection: InferredSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_details(mut self, details: InferredClaimDetails) -> Self {
        self.details = Some(details);
        self
    }
}

#[async_trait]
impl InferenceApiTrait for MockInferenceService {
    async fn infer_category_and_benefit(
        &self,
        keys: &InferenceKeys,
        _merchant: &str,
        _description: &str,
        _benefits: &[BenefitWithCategories],
    ) -> Result<InferredSelection, InferenceError> {
        if !keys.is_configured() {
            return Err(InferenceError::MissingApiKey);
        }
        self.selection
            .clone()
            .ok_or_else(|| InferenceError::EmptyResponse("no canned selection".to_string()))
    }

    async fn infer_claim_from_receipt(
        &self,
        keys: &InferenceKeys,
        _receipt_path: &str,
        _benefits: &[BenefitWithCategories],
    ) -> Result<InferredClaimDetails, InferenceError> {
        if !keys.is_configured() {
            return Err(InferenceError::MissingApiKey);
        }
        self.details
            .clone()
            .ok_or_else(|| InferenceError::EmptyResponse("no canned details".to_string()))
    }
}
