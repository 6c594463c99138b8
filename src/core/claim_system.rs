// src/core/claim_system.rs

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use log::{debug, info};

use crate::app_config::AppConfig;
use crate::core::catalog;
use crate::core::csv::read_claims_from_csv;
use crate::core::file_system::FileSystem;
use crate::core::models::{
    Benefit, BenefitCategory, BenefitWithCategories, Claim, ResolvedClaim, SubmittedClaim,
};
use crate::core::validation;
use crate::credentials::CredentialStore;
use crate::services::forma::{parse_emailed_magic_link, FormaApiTrait};
use crate::services::inference::{
    InferenceApiTrait, InferenceKeys, InferredClaimDetails, InferredSelection,
};

/// Everything the CLI commands operate on: the Forma API, the inference
/// backend, the credentials store, and the app configuration. Holds no other
/// state; each operation is a fresh sequence of network calls.
pub struct ClaimSystem {
    forma: Arc<dyn FormaApiTrait>,
    inference: Arc<dyn InferenceApiTrait>,
    credentials: CredentialStore,
    config: AppConfig,
}

impl ClaimSystem {
    pub fn new(
        forma: Arc<dyn FormaApiTrait>,
        inference: Arc<dyn InferenceApiTrait>,
        credentials: CredentialStore,
        config: AppConfig,
    ) -> Self {
        Self {
            forma,
            inference,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Resolves the token to authenticate with, preferring a CLI-provided
    /// override over the stored credentials.
    pub fn access_token(&self, override_token: Option<&str>) -> Result<String, Box<dyn Error>> {
        self.credentials
            .access_token(override_token)
            .ok_or_else(|| "You aren't logged in to Forma. Please run `clawback login` first.".into())
    }

    // Authentication

    pub async fn request_magic_link(&self, email: &str) -> Result<(), Box<dyn Error>> {
        self.forma.request_magic_link(email).await?;
        info!("Requested magic link for {}", email);
        Ok(())
    }

    /// Exchanges an emailed magic link for an access token and stores it.
    pub async fn login_with_magic_link(
        &self,
        emailed_link: &str,
        email: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        let (id, tk) = parse_emailed_magic_link(emailed_link)?;
        let access_token = self.forma.exchange_magic_link(&id, &tk).await?;
        self.credentials.store_access_token(&access_token, email)?;
        info!("Stored access token");
        Ok(())
    }

    // Benefit and category lookups

    pub async fn benefits(&self, access_token: &str) -> Result<Vec<Benefit>, Box<dyn Error>> {
        let profile = self.forma.get_profile(access_token).await?;
        Ok(catalog::benefits(&profile))
    }

    pub async fn categories(
        &self,
        access_token: &str,
        benefit_name: &str,
    ) -> Result<Vec<BenefitCategory>, Box<dyn Error>> {
        let profile = self.forma.get_profile(access_token).await?;
        Ok(catalog::categories_for_benefit_name(&profile, benefit_name)?)
    }

    pub async fn benefits_with_categories(
        &self,
        access_token: &str,
    ) -> Result<Vec<BenefitWithCategories>, Box<dyn Error>> {
        let profile = self.forma.get_profile(access_token).await?;

        let mut benefits = Vec::new();
        for benefit in catalog::benefits(&profile) {
            let categories = catalog::categories_for_benefit_name(&profile, benefit.name())?;
            benefits.push(BenefitWithCategories {
                benefit,
                categories,
            });
        }
        Ok(benefits)
    }

    // Claim validation and submission

    /// Fetches the benefit's catalog and runs the claim through the full
    /// validation pipeline. The catalog is fetched fresh per claim.
    pub async fn resolve_claim(
        &self,
        access_token: &str,
        claim: Claim,
    ) -> Result<ResolvedClaim, Box<dyn Error>> {
        let profile = self.forma.get_profile(access_token).await?;
        let categories = catalog::categories_for_benefit_name(&profile, &claim.benefit)?;
        debug!(
            "Resolved {} catalog entries for benefit '{}'",
            categories.len(),
            claim.benefit
        );
        Ok(validation::resolve_claim(claim, &categories)?)
    }

    pub async fn submit_claim(
        &self,
        access_token: &str,
        claim: Claim,
    ) -> Result<(), Box<dyn Error>> {
        let resolved = self.resolve_claim(access_token, claim).await?;
        self.forma.create_claim(access_token, &resolved).await?;
        info!(
            "Submitted claim for benefit wallet {}",
            resolved.benefit_id()
        );
        Ok(())
    }

    // Inference

    pub async fn infer_category_and_benefit(
        &self,
        keys: &InferenceKeys,
        merchant: &str,
        description: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredSelection, Box<dyn Error>> {
        Ok(self
            .inference
            .infer_category_and_benefit(keys, merchant, description, benefits)
            .await?)
    }

    pub async fn infer_claim_from_receipt(
        &self,
        keys: &InferenceKeys,
        receipt_path: &str,
        benefits: &[BenefitWithCategories],
    ) -> Result<InferredClaimDetails, Box<dyn Error>> {
        Ok(self
            .inference
            .infer_claim_from_receipt(keys, receipt_path, benefits)
            .await?)
    }

    // Batch flows

    /// Submits every claim in a template CSV. Rows without a benefit and
    /// category fall back to inference when a key is available. A failing row
    /// is reported and the loop moves on to the next one.
    pub async fn submit_claims_from_csv<W: Write>(
        &self,
        output: &mut W,
        access_token: &str,
        input_path: &str,
        keys: &InferenceKeys,
    ) -> Result<(), Box<dyn Error>> {
        let claims = self.read_template_csv(input_path)?;
        let total = claims.len();

        for (index, claim) in claims.into_iter().enumerate() {
            writeln!(output, "Submitting claim {}/{}", index + 1, total)?;

            match self.submit_csv_row(access_token, claim, keys).await {
                Ok(()) => {
                    writeln!(output, "Successfully submitted claim {}/{}", index + 1, total)?
                }
                Err(e) => writeln!(
                    output,
                    "Error submitting claim {}/{}: {}",
                    index + 1,
                    total,
                    e
                )?,
            }
        }
        Ok(())
    }

    async fn submit_csv_row(
        &self,
        access_token: &str,
        claim: Claim,
        keys: &InferenceKeys,
    ) -> Result<(), Box<dyn Error>> {
        if !claim.benefit.is_empty() && !claim.category.is_empty() {
            return self.submit_claim(access_token, claim).await;
        }

        if !keys.is_configured() {
            return Err(
                "You must either fill out the `benefit` and `category` columns, or specify an \
                 OpenAI API key or GitHub token."
                    .into(),
            );
        }

        let benefits = self.benefits_with_categories(access_token).await?;
        let selection = self
            .infer_category_and_benefit(keys, &claim.merchant, &claim.description, &benefits)
            .await?;
        info!(
            "Inferred benefit '{}' and category '{}'",
            selection.benefit, selection.category
        );

        let claim = Claim {
            benefit: selection.benefit,
            category: selection.category,
            ..claim
        };
        self.submit_claim(access_token, claim).await
    }

    /// Runs every CSV row through validation without submitting anything.
    /// Rows without a benefit and category are checked with placeholder
    /// values so the remaining checks still run.
    pub async fn validate_csv<W: Write>(
        &self,
        output: &mut W,
        access_token: &str,
        input_path: &str,
    ) -> Result<(), Box<dyn Error>> {
        let claims = self.read_template_csv(input_path)?;
        let total = claims.len();

        let benefits = self.benefits_with_categories(access_token).await?;

        for (index, claim) in claims.into_iter().enumerate() {
            // Row 1 is the header, so the first data row is row 2.
            let row_number = index + 2;
            writeln!(
                output,
                "Validating claim {}/{} (row {})",
                index + 1,
                total,
                row_number
            )?;

            let needs_inference = claim.benefit.is_empty() || claim.category.is_empty();
            let claim = if needs_inference {
                match placeholder_selection(&benefits) {
                    Some((benefit, category)) => {
                        writeln!(
                            output,
                            "Claim {}/{} (row {}) doesn't have a benefit and/or category. This \
                             will have to be inferred when the claims are submitted",
                            index + 1,
                            total,
                            row_number
                        )?;
                        Claim {
                            benefit,
                            category,
                            ..claim
                        }
                    }
                    None => {
                        writeln!(
                            output,
                            "Error validating claim {}/{}: no benefits available (row {})",
                            index + 1,
                            total,
                            row_number
                        )?;
                        continue;
                    }
                }
            } else {
                claim
            };

            match self.resolve_claim(access_token, claim).await {
                Ok(_) => writeln!(
                    output,
                    "Validated claim {}/{} (row {})",
                    index + 1,
                    total,
                    row_number
                )?,
                Err(e) => writeln!(
                    output,
                    "Error validating claim {}/{}: {} (row {})",
                    index + 1,
                    total,
                    e,
                    row_number
                )?,
            }
        }
        Ok(())
    }

    fn read_template_csv(&self, input_path: &str) -> Result<Vec<Claim>, Box<dyn Error>> {
        if !FileSystem::exists(input_path) {
            return Err(format!("File '{}' doesn't exist.", input_path).into());
        }

        let claims = read_claims_from_csv(input_path)?;
        if claims.is_empty() {
            return Err(
                "Your CSV doesn't seem to contain any claims. Have you filled out the template?"
                    .into(),
            );
        }
        Ok(claims)
    }

    // Claim listing

    pub async fn claims_list(
        &self,
        access_token: &str,
        status: Option<&str>,
    ) -> Result<Vec<SubmittedClaim>, Box<dyn Error>> {
        Ok(self.forma.get_claims_list(access_token, status).await?)
    }
}

/// Any valid (benefit, category label) pair, used to fill rows that will be
/// inferred at submission time so the rest of the validation still runs.
fn placeholder_selection(benefits: &[BenefitWithCategories]) -> Option<(String, String)> {
    benefits.iter().find_map(|benefit| {
        benefit.categories.first().map(|category| {
            (
                benefit.benefit.name().to_string(),
                category.label().to_string(),
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{
        CompanyProfile, CompanyWalletConfiguration, EmployeeProfile, EmployeeSettings,
        EmployeeWallet, ProfileCategory, ProfileData, ProfileResponse, ProfileSubcategory,
        WalletConfigurationName,
    };
    use crate::services::forma::MockFormaService;
    use crate::services::inference::MockInferenceService;
    use std::fs::File;
    use tempfile::TempDir;

    // Helpers

    fn test_profile() -> ProfileResponse {
        ProfileResponse {
            data: ProfileData {
                company: CompanyProfile {
                    company_wallet_configurations: vec![CompanyWalletConfiguration {
                        id: "config-1".to_string(),
                        wallet_name: "Wellness".to_string(),
                        categories: vec![ProfileCategory {
                            id: "cat-1".to_string(),
                            name: "Fitness".to_string(),
                            subcategories: vec![ProfileSubcategory {
                                name: "Gym Membership".to_string(),
                                value: "gym".to_string(),
                                aliases: vec!["fitness".to_string(), "workout".to_string()],
                            }],
                        }],
                    }],
                },
                employee: EmployeeProfile {
                    employee_wallets: vec![EmployeeWallet {
                        id: "wallet-1".to_string(),
                        amount: 150.0,
                        company_wallet_configuration: WalletConfigurationName {
                            wallet_name: "Wellness".to_string(),
                        },
                        is_employee_eligible: true,
                    }],
                    settings: EmployeeSettings {
                        currency: "USD".to_string(),
                    },
                },
            },
        }
    }

    fn test_system(temp_dir: &TempDir) -> (ClaimSystem, Arc<MockFormaService>) {
        test_system_with_inference(temp_dir, MockInferenceService::new())
    }

    fn test_system_with_inference(
        temp_dir: &TempDir,
        inference: MockInferenceService,
    ) -> (ClaimSystem, Arc<MockFormaService>) {
        let forma = Arc::new(MockFormaService::new(test_profile()));
        let credentials = CredentialStore::new(temp_dir.path().join(".clawbackrc.json"));
        let system = ClaimSystem::new(
            forma.clone(),
            Arc::new(inference),
            credentials,
            AppConfig::default(),
        );
        (system, forma)
    }

    fn receipt_on_disk(temp_dir: &TempDir, name: &str) -> String {
        let path = temp_dir.path().join(name);
        File::create(&path).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn test_claim(receipt: String) -> Claim {
        Claim {
            benefit: "Wellness".to_string(),
            category: "workout".to_string(),
            amount: "25.99".to_string(),
            merchant: "Gym Co".to_string(),
            purchase_date: "2024-01-15".to_string(),
            description: "January membership".to_string(),
            receipt_paths: vec![receipt],
        }
    }

    // Tests

    #[tokio::test]
    async fn test_access_token_requires_login() {
        let temp_dir = TempDir::new().unwrap();
        let (system, _) = test_system(&temp_dir);

        let err = system.access_token(None).unwrap_err();
        assert!(err.to_string().contains("clawback login"));

        assert_eq!(system.access_token(Some("cli-token")).unwrap(), "cli-token");
    }

    #[tokio::test]
    async fn test_login_with_magic_link_stores_token() {
        let temp_dir = TempDir::new().unwrap();
        let (system, _) = test_system(&temp_dir);

        let link = "https://joinforma.page.link/?link=https%3A%2F%2Fclient.joinforma.com%2Flogin%2Fmagic%3Fid%3Dtest-id%26tk%3Dtest-tk";
        system
            .login_with_magic_link(link, Some("me@example.com"))
            .await
            .unwrap();

        assert_eq!(
            system.access_token(None).unwrap(),
            "mock_auth_token".to_string()
        );
        assert_eq!(
            system.credentials().stored_email(),
            Some("me@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_claim_sends_resolved_wire_fields() {
        let temp_dir = TempDir::new().unwrap();
        let (system, forma) = test_system(&temp_dir);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        system
            .submit_claim("token", test_claim(receipt))
            .await
            .unwrap();

        let submitted = forma.submitted_claims();
        assert_eq!(submitted.len(), 1);
        let fields = &submitted[0];
        assert!(fields.contains(&("default_employee_wallet_id", "wallet-1".to_string())));
        assert!(fields.contains(&("category", "cat-1".to_string())));
        assert!(fields.contains(&("subcategory", "gym".to_string())));
        assert!(fields.contains(&("subcategory_alias", "workout".to_string())));
    }

    #[tokio::test]
    async fn test_submit_claim_rejects_unknown_category() {
        let temp_dir = TempDir::new().unwrap();
        let (system, forma) = test_system(&temp_dir);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        let mut claim = test_claim(receipt);
        claim.category = "nonexistent".to_string();

        let err = system.submit_claim("token", claim).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No category 'nonexistent' found for benefit 'Wellness'."
        );
        assert!(forma.submitted_claims().is_empty());
    }

    #[tokio::test]
    async fn test_benefits_with_categories_flattens_per_benefit() {
        let temp_dir = TempDir::new().unwrap();
        let (system, _) = test_system(&temp_dir);

        let benefits = system.benefits_with_categories("token").await.unwrap();
        assert_eq!(benefits.len(), 1);
        assert_eq!(benefits[0].benefit.name(), "Wellness");
        assert_eq!(benefits[0].categories.len(), 3);
    }

    #[tokio::test]
    async fn test_csv_batch_continues_past_failing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let (system, forma) = test_system(&temp_dir);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        let csv_path = temp_dir.path().join("claims.csv");
        std::fs::write(
            &csv_path,
            format!(
                "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
                 Wellness,workout,25.99,Gym Co,2024-01-15,Membership,{receipt}\n\
                 Wellness,nonexistent,10.00,Shop,2024-01-16,Stuff,{receipt}\n\
                 Wellness,fitness,12.00,Gym Co,2024-01-17,Day pass,{receipt}\n"
            ),
        )
        .unwrap();

        let mut output = Vec::new();
        system
            .submit_claims_from_csv(
                &mut output,
                "token",
                csv_path.to_str().unwrap(),
                &InferenceKeys::default(),
            )
            .await
            .unwrap();

        // Row 2 fails category resolution; rows 1 and 3 still go through.
        assert_eq!(forma.submitted_claims().len(), 2);
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Successfully submitted claim 1/3"));
        assert!(printed.contains("Error submitting claim 2/3: No category 'nonexistent'"));
        assert!(printed.contains("Successfully submitted claim 3/3"));
    }

    #[tokio::test]
    async fn test_csv_rows_without_selection_use_inference() {
        let temp_dir = TempDir::new().unwrap();
        let inference = MockInferenceService::new().with_selection(InferredSelection {
            benefit: "Wellness".to_string(),
            category: "workout".to_string(),
        });
        let (system, forma) = test_system_with_inference(&temp_dir, inference);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        let csv_path = temp_dir.path().join("claims.csv");
        std::fs::write(
            &csv_path,
            format!(
                "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
                 ,,25.99,Gym Co,2024-01-15,Membership,{receipt}\n"
            ),
        )
        .unwrap();

        let keys = InferenceKeys {
            openai_api_key: Some("sk-test".to_string()),
            github_token: None,
        };
        let mut output = Vec::new();
        system
            .submit_claims_from_csv(&mut output, "token", csv_path.to_str().unwrap(), &keys)
            .await
            .unwrap();

        assert_eq!(forma.submitted_claims().len(), 1);
    }

    #[tokio::test]
    async fn test_csv_rows_without_selection_and_no_key_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (system, forma) = test_system(&temp_dir);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        let csv_path = temp_dir.path().join("claims.csv");
        std::fs::write(
            &csv_path,
            format!(
                "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
                 ,,25.99,Gym Co,2024-01-15,Membership,{receipt}\n"
            ),
        )
        .unwrap();

        let mut output = Vec::new();
        system
            .submit_claims_from_csv(
                &mut output,
                "token",
                csv_path.to_str().unwrap(),
                &InferenceKeys::default(),
            )
            .await
            .unwrap();

        assert!(forma.submitted_claims().is_empty());
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("fill out the `benefit` and `category` columns"));
    }

    #[tokio::test]
    async fn test_empty_csv_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let (system, _) = test_system(&temp_dir);

        let csv_path = temp_dir.path().join("claims.csv");
        std::fs::write(
            &csv_path,
            "benefit,category,amount,merchant,purchase_date,description,receipt_path\n",
        )
        .unwrap();

        let mut output = Vec::new();
        let err = system
            .submit_claims_from_csv(
                &mut output,
                "token",
                csv_path.to_str().unwrap(),
                &InferenceKeys::default(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("doesn't seem to contain any claims"));
    }

    #[tokio::test]
    async fn test_validate_csv_reports_rows_without_submitting() {
        let temp_dir = TempDir::new().unwrap();
        let (system, forma) = test_system(&temp_dir);
        let receipt = receipt_on_disk(&temp_dir, "receipt.pdf");

        let csv_path = temp_dir.path().join("claims.csv");
        std::fs::write(
            &csv_path,
            format!(
                "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
                 Wellness,workout,25.99,Gym Co,2024-01-15,Membership,{receipt}\n\
                 Wellness,workout,25.9,Gym Co,2024-01-15,Membership,{receipt}\n\
                 ,,25.99,Gym Co,2024-01-15,Membership,{receipt}\n"
            ),
        )
        .unwrap();

        let mut output = Vec::new();
        system
            .validate_csv(&mut output, "token", csv_path.to_str().unwrap())
            .await
            .unwrap();

        assert!(forma.submitted_claims().is_empty());
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Validated claim 1/3 (row 2)"));
        assert!(printed.contains("Error validating claim 2/3: Amount '25.9'"));
        assert!(printed.contains("(row 3)"));
        // The selection-less row is validated with placeholders and flagged.
        assert!(printed.contains("doesn't have a benefit and/or category"));
        assert!(printed.contains("Validated claim 3/3 (row 4)"));
    }
}
