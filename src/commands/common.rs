// src/commands/common.rs

/// Every operation the CLI can run. The clap layer in `commands::cli` maps
/// parsed arguments onto these.
#[derive(Debug, Clone)]
pub enum Command {
    Login {
        email: Option<String>,
        magic_link_url: Option<String>,
    },
    ListBenefits {
        access_token: Option<String>,
    },
    ListCategories {
        benefit: String,
        access_token: Option<String>,
    },
    SubmitClaim {
        benefit: Option<String>,
        category: Option<String>,
        amount: Option<String>,
        merchant: Option<String>,
        purchase_date: Option<String>,
        description: Option<String>,
        receipt_paths: Vec<String>,
        access_token: Option<String>,
        openai_api_key: Option<String>,
        github_token: Option<String>,
    },
    SubmitClaimsFromCsv {
        input_path: String,
        access_token: Option<String>,
        openai_api_key: Option<String>,
        github_token: Option<String>,
    },
    ValidateCsv {
        input_path: String,
        access_token: Option<String>,
    },
    GenerateTemplateCsv {
        output_path: String,
    },
    SubmitClaimsFromDirectory {
        directory: String,
        processed_directory: Option<String>,
        access_token: Option<String>,
        openai_api_key: Option<String>,
        github_token: Option<String>,
    },
    ListClaims {
        filter: Option<String>,
        access_token: Option<String>,
    },
}
