// src/services/forma.rs

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::error::Error;
use std::sync::Mutex;

use crate::core::errors::ApiError;
use crate::core::file_system::FileSystem;
use crate::core::models::{ClaimsListResponse, ProfileResponse, ResolvedClaim, SubmittedClaim};

#[async_trait]
pub trait FormaApiTrait: Send + Sync {
    async fn get_profile(&self, access_token: &str) -> Result<ProfileResponse, ApiError>;
    async fn create_claim(&self, access_token: &str, claim: &ResolvedClaim)
        -> Result<(), ApiError>;
    async fn request_magic_link(&self, email: &str) -> Result<(), ApiError>;
    async fn exchange_magic_link(&self, id: &str, tk: &str) -> Result<String, ApiError>;
    async fn get_claims_list(
        &self,
        access_token: &str,
        status: Option<&str>,
    ) -> Result<Vec<SubmittedClaim>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ExchangeMagicLinkResponse {
    success: bool,
    data: ExchangeMagicLinkData,
}

#[derive(Debug, Deserialize)]
struct ExchangeMagicLinkData {
    auth_token: String,
}

pub struct FormaClient {
    client: Client,
    base_url: String,
}

impl FormaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn check_status(
        status: StatusCode,
        expected: StatusCode,
        context: &'static str,
    ) -> Result<(), ApiError> {
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::InvalidAuthToken);
        }
        if status != expected {
            return Err(ApiError::UnexpectedStatus {
                context,
                expected: expected.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FormaApiTrait for FormaClient {
    async fn get_profile(&self, access_token: &str) -> Result<ProfileResponse, ApiError> {
        let url = format!(
            "{}/client/api/v3/settings/profile?is_mobile=true",
            self.base_url
        );
        debug!("Fetching profile from {}", url);

        let response = self
            .client
            .get(&url)
            .header("x-auth-token", access_token)
            .send()
            .await?;

        Self::check_status(response.status(), StatusCode::OK, "fetching profile")?;
        Ok(response.json::<ProfileResponse>().await?)
    }

    async fn create_claim(
        &self,
        access_token: &str,
        claim: &ResolvedClaim,
    ) -> Result<(), ApiError> {
        let url = format!("{}/client/api/v2/claims?is_mobile=true", self.base_url);

        let mut form = Form::new();
        for (name, value) in claim.wire_fields() {
            form = form.text(name, value);
        }
        for path in claim.receipt_paths() {
            let bytes = FileSystem::read(path).map_err(|source| ApiError::ReceiptRead {
                path: path.clone(),
                source,
            })?;
            let part = Part::bytes(bytes)
                .file_name(FileSystem::file_name(path))
                .mime_str(FileSystem::mime_type(path))?;
            form = form.part("file[]", part);
        }

        debug!("Submitting claim to {}", url);
        let response = self
            .client
            .post(&url)
            .header("x-auth-token", access_token)
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response.status(), StatusCode::CREATED, "submitting claim")?;

        let parsed = response.json::<StatusEnvelope>().await?;
        if !parsed.success {
            return Err(ApiError::Unsuccessful {
                context: "submitting claim",
                body: format!("{{\"success\":{}}}", parsed.success),
            });
        }
        Ok(())
    }

    async fn request_magic_link(&self, email: &str) -> Result<(), ApiError> {
        let url = format!("{}/client/auth/v2/login/magic?is_mobile=true", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        Self::check_status(response.status(), StatusCode::OK, "requesting magic link")?;

        let parsed = response.json::<StatusEnvelope>().await?;
        if !parsed.success {
            return Err(ApiError::Unsuccessful {
                context: "requesting magic link",
                body: format!("{{\"success\":{}}}", parsed.success),
            });
        }
        Ok(())
    }

    async fn exchange_magic_link(&self, id: &str, tk: &str) -> Result<String, ApiError> {
        let url = format!("{}/client/auth/v2/login/magic", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", id),
                ("tk", tk),
                ("return_token", "true"),
                ("is_mobile", "true"),
            ])
            .send()
            .await?;

        Self::check_status(
            response.status(),
            StatusCode::OK,
            "exchanging magic link for token",
        )?;

        let parsed = response.json::<ExchangeMagicLinkResponse>().await?;
        if !parsed.success {
            return Err(ApiError::Unsuccessful {
                context: "exchanging magic link for token",
                body: format!("{{\"success\":{}}}", parsed.success),
            });
        }
        Ok(parsed.data.auth_token)
    }

    async fn get_claims_list(
        &self,
        access_token: &str,
        status: Option<&str>,
    ) -> Result<Vec<SubmittedClaim>, ApiError> {
        let mut url = format!("{}/client/api/v2/claims?is_mobile=true", self.base_url);
        if let Some(status) = status {
            url.push_str(&format!("&status={}", status));
        }

        let response = self
            .client
            .get(&url)
            .header("x-auth-token", access_token)
            .send()
            .await?;

        Self::check_status(response.status(), StatusCode::OK, "fetching claims")?;
        let parsed = response.json::<ClaimsListResponse>().await?;
        Ok(parsed.data.claims)
    }
}

/// Pulls the `id` and `tk` parameters out of an emailed Forma magic link. The
/// emailed link wraps the real magic link url-encoded in its `link` query
/// parameter.
pub fn parse_emailed_magic_link(emailed_link: &str) -> Result<(String, String), Box<dyn Error>> {
    const NOT_A_MAGIC_LINK: &str = "The provided link doesn't look like a real Forma magic link.";

    let parsed = Url::parse(emailed_link).map_err(|_| NOT_A_MAGIC_LINK)?;

    let is_forma_link = parsed.host_str() == Some("joinforma.page.link")
        && parsed.scheme() == "https"
        && parsed.path() == "/";
    if !is_forma_link {
        return Err(NOT_A_MAGIC_LINK.into());
    }

    let inner_link = parsed
        .query_pairs()
        .find(|(name, _)| name == "link")
        .map(|(_, value)| value.into_owned())
        .ok_or(NOT_A_MAGIC_LINK)?;

    let inner = Url::parse(&inner_link).map_err(|_| NOT_A_MAGIC_LINK)?;
    let id = inner
        .query_pairs()
        .find(|(name, _)| name == "id")
        .map(|(_, value)| value.into_owned());
    let tk = inner
        .query_pairs()
        .find(|(name, _)| name == "tk")
        .map(|(_, value)| value.into_owned());

    match (id, tk) {
        (Some(id), Some(tk)) if !id.is_empty() && !tk.is_empty() => Ok((id, tk)),
        _ => Err(NOT_A_MAGIC_LINK.into()),
    }
}

/// In-memory stand-in for the Forma API, used by command and system tests.
pub struct MockFormaService {
    profile: ProfileResponse,
    claims: Vec<SubmittedClaim>,
    submitted: Mutex<Vec<Vec<(&'static str, String)>>>,
    requested_links: Mutex<Vec<String>>,
}

impl MockFormaService {
    pub fn new(profile: ProfileResponse) -> Self {
        Self {
            profile,
            claims: Vec::new(),
            submitted: Mutex::new(Vec::new()),
            requested_links: Mutex::new(Vec::new()),
        }
    }

    pub fn with_claims(mut self, claims: Vec<SubmittedClaim>) -> Self {
        self.claims = claims;
        self
    }

    /// Wire fields of every claim submitted through this mock, in order.
    pub fn submitted_claims(&self) -> Vec<Vec<(&'static str, String)>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn requested_links(&self) -> Vec<String> {
        self.requested_links.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormaApiTrait for MockFormaService {
    async fn get_profile(&self, _access_token: &str) -> Result<ProfileResponse, ApiError> {
        Ok(self.profile.clone())
    }

    async fn create_claim(
        &self,
        _access_token: &str,
        claim: &ResolvedClaim,
    ) -> Result<(), ApiError> {
        self.submitted.lock().unwrap().push(claim.wire_fields());
        Ok(())
    }

    async fn request_magic_link(&self, email: &str) -> Result<(), ApiError> {
        self.requested_links.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn exchange_magic_link(&self, _id: &str, _tk: &str) -> Result<String, ApiError> {
        Ok("mock_auth_token".to_string())
    }

    async fn get_claims_list(
        &self,
        _access_token: &str,
        status: Option<&str>,
    ) -> Result<Vec<SubmittedClaim>, ApiError> {
        Ok(self
            .claims
            .iter()
            .filter(|claim| status.map_or(true, |status| claim.status == status))
            .cloned()
            .collect())
    }
}
