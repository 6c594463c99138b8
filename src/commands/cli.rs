// src/commands/cli.rs

use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};
use log::warn;
use std::env;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::common::Command;
use crate::core::claim_system::ClaimSystem;
use crate::core::csv::write_template_csv;
use crate::core::file_system::{FileSystem, SUPPORTED_RECEIPT_EXTENSIONS};
use crate::core::models::{BenefitWithCategories, Claim};
use crate::services::inference::InferenceKeys;

#[derive(Parser, Debug)]
#[command(
    name = "clawback",
    version,
    about = "Submit and manage Forma benefit claims from the command line"
)]
pub struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Connect clawback to your Forma account with a magic link
    Login {
        /// Email address used to log in to Forma
        #[arg(long)]
        email: Option<String>,

        /// Magic link received by email for logging in to Forma
        #[arg(long)]
        magic_link_url: Option<String>,
    },

    /// List your benefits and their remaining balances
    ListBenefits {
        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,
    },

    /// List categories available for a Forma benefit
    ListCategories {
        /// The benefit to list categories for
        #[arg(long)]
        benefit: String,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Submit a claim for a Forma benefit
    SubmitClaim {
        /// The benefit you are claiming for. Optional when an inference key
        /// is provided.
        #[arg(long)]
        benefit: Option<String>,

        /// The category of the claim. Optional when an inference key is
        /// provided.
        #[arg(long)]
        category: Option<String>,

        /// The amount of the claim
        #[arg(long)]
        amount: Option<String>,

        /// The name of the merchant
        #[arg(long)]
        merchant: Option<String>,

        /// The date of purchase in YYYY-MM-DD format
        #[arg(long)]
        purchase_date: Option<String>,

        /// The description of the claim
        #[arg(long)]
        description: Option<String>,

        /// The path of the receipt. JPEG, PNG, PDF and HEIC files are
        /// accepted. May be given multiple times to attach multiple receipts.
        #[arg(long = "receipt-path", required = true)]
        receipt_path: Vec<String>,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,

        /// OpenAI API key used to infer claim details. Falls back to the
        /// OPENAI_API_KEY environment variable.
        #[arg(long)]
        openai_api_key: Option<String>,

        /// GitHub token used to infer claim details via GitHub Models. Falls
        /// back to the GITHUB_TOKEN environment variable.
        #[arg(long)]
        github_token: Option<String>,
    },

    /// Submit multiple claims from a template CSV
    SubmitClaimsFromCsv {
        /// The path to the CSV to read claims from
        #[arg(long)]
        input_path: String,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,

        /// OpenAI API key used to infer missing benefit/category columns
        #[arg(long)]
        openai_api_key: Option<String>,

        /// GitHub token used to infer missing benefit/category columns
        #[arg(long)]
        github_token: Option<String>,
    },

    /// Validate a completed CSV before submitting it
    ValidateCsv {
        /// The path to the CSV to read claims from
        #[arg(long)]
        input_path: String,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Generate a template CSV for submitting multiple claims
    GenerateTemplateCsv {
        /// The path to write the CSV to
        #[arg(long, default_value = "claims.csv")]
        output_path: String,
    },

    /// Submit claims for every receipt file in a directory
    SubmitClaimsFromDirectory {
        /// The directory containing receipt files to process
        #[arg(long)]
        directory: String,

        /// Where to move processed receipts (defaults to `processed/` under
        /// the receipt directory)
        #[arg(long)]
        processed_directory: Option<String>,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,

        /// OpenAI API key used to infer claim details from receipts
        #[arg(long)]
        openai_api_key: Option<String>,

        /// GitHub token used to infer claim details from receipts
        #[arg(long)]
        github_token: Option<String>,
    },

    /// List claims in your Forma account and their current status
    ListClaims {
        /// Filter claims by status (currently supports: in_progress)
        #[arg(long)]
        filter: Option<String>,

        /// Access token used to authenticate with Forma
        #[arg(long)]
        access_token: Option<String>,
    },
}

impl Cli {
    pub fn into_command(self) -> Command {
        match self.command {
            CliCommand::Login {
                email,
                magic_link_url,
            } => Command::Login {
                email,
                magic_link_url,
            },
            CliCommand::ListBenefits { access_token } => Command::ListBenefits { access_token },
            CliCommand::ListCategories {
                benefit,
                access_token,
            } => Command::ListCategories {
                benefit,
                access_token,
            },
            CliCommand::SubmitClaim {
                benefit,
                category,
                amount,
                merchant,
                purchase_date,
                description,
                receipt_path,
                access_token,
                openai_api_key,
                github_token,
            } => Command::SubmitClaim {
                benefit,
                category,
                amount,
                merchant,
                purchase_date,
                description,
                receipt_paths: receipt_path,
                access_token,
                openai_api_key,
                github_token,
            },
            CliCommand::SubmitClaimsFromCsv {
                input_path,
                access_token,
                openai_api_key,
                github_token,
            } => Command::SubmitClaimsFromCsv {
                input_path,
                access_token,
                openai_api_key,
                github_token,
            },
            CliCommand::ValidateCsv {
                input_path,
                access_token,
            } => Command::ValidateCsv {
                input_path,
                access_token,
            },
            CliCommand::GenerateTemplateCsv { output_path } => {
                Command::GenerateTemplateCsv { output_path }
            }
            CliCommand::SubmitClaimsFromDirectory {
                directory,
                processed_directory,
                access_token,
                openai_api_key,
                github_token,
            } => Command::SubmitClaimsFromDirectory {
                directory,
                processed_directory,
                access_token,
                openai_api_key,
                github_token,
            },
            CliCommand::ListClaims {
                filter,
                access_token,
            } => Command::ListClaims {
                filter,
                access_token,
            },
        }
    }
}

/// Inference keys from CLI options, falling back to the conventional
/// environment variables.
fn inference_keys(openai_api_key: Option<String>, github_token: Option<String>) -> InferenceKeys {
    InferenceKeys {
        openai_api_key: openai_api_key.or_else(|| env::var("OPENAI_API_KEY").ok()),
        github_token: github_token.or_else(|| env::var("GITHUB_TOKEN").ok()),
    }
}

pub async fn execute_command<W: Write>(
    system: &ClaimSystem,
    command: Command,
    output: &mut W,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Login {
            email,
            magic_link_url,
        } => execute_login(system, email, magic_link_url, output).await,

        Command::ListBenefits { access_token } => {
            let token = system.access_token(access_token.as_deref())?;
            let benefits = system.benefits(&token).await?;

            let rows: Vec<Vec<String>> = benefits
                .iter()
                .map(|benefit| {
                    vec![
                        benefit.name().to_string(),
                        format!("{:.2}", benefit.remaining_amount()),
                        benefit.remaining_amount_currency().to_string(),
                    ]
                })
                .collect();
            write_table(output, &["Benefit", "Remaining Amount", "Currency"], &rows)?;
            Ok(())
        }

        Command::ListCategories {
            benefit,
            access_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;
            let categories = system.categories(&token, &benefit).await?;

            let rows: Vec<Vec<String>> = categories
                .iter()
                .map(|category| {
                    vec![
                        category.category_name().to_string(),
                        category.label().to_string(),
                    ]
                })
                .collect();
            write_table(output, &["Parent Category", "Category"], &rows)?;
            Ok(())
        }

        Command::SubmitClaim {
            benefit,
            category,
            amount,
            merchant,
            purchase_date,
            description,
            receipt_paths,
            access_token,
            openai_api_key,
            github_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;
            let keys = inference_keys(openai_api_key, github_token);

            execute_submit_claim(
                system,
                &token,
                &keys,
                SubmitClaimArgs {
                    benefit,
                    category,
                    amount,
                    merchant,
                    purchase_date,
                    description,
                    receipt_paths,
                },
                output,
            )
            .await
        }

        Command::SubmitClaimsFromCsv {
            input_path,
            access_token,
            openai_api_key,
            github_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;
            let keys = inference_keys(openai_api_key, github_token);
            system
                .submit_claims_from_csv(output, &token, &input_path, &keys)
                .await
        }

        Command::ValidateCsv {
            input_path,
            access_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;
            system.validate_csv(output, &token, &input_path).await
        }

        Command::GenerateTemplateCsv { output_path } => {
            write_template_csv(&output_path)?;
            writeln!(output, "Wrote template CSV to {}", output_path)?;
            Ok(())
        }

        Command::SubmitClaimsFromDirectory {
            directory,
            processed_directory,
            access_token,
            openai_api_key,
            github_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;
            let keys = inference_keys(openai_api_key, github_token);
            execute_submit_claims_from_directory(
                system,
                &token,
                &keys,
                &directory,
                processed_directory,
                output,
            )
            .await
        }

        Command::ListClaims {
            filter,
            access_token,
        } => {
            let token = system.access_token(access_token.as_deref())?;

            if let Some(filter) = &filter {
                if filter != "in_progress" {
                    return Err(format!(
                        "Invalid filter value '{}'. Currently supported filters: in_progress",
                        filter
                    )
                    .into());
                }
            }

            let claims = system.claims_list(&token, filter.as_deref()).await?;
            let has_payout_status = claims
                .iter()
                .any(|claim| claim.reimbursement.payout_status.is_some());

            let mut headers = vec![
                "Reimbursement Vendor",
                "Employee Note",
                "Amount",
                "Category",
                "Subcategory",
                "Status",
                "Reimbursement Status",
            ];
            if has_payout_status {
                headers.push("Payout Status");
            }
            headers.push("Date Processed");
            headers.push("Note");

            let rows: Vec<Vec<String>> = claims
                .iter()
                .map(|claim| {
                    let r = &claim.reimbursement;
                    let mut row = vec![
                        r.reimbursement_vendor.clone(),
                        r.employee_note.clone(),
                        format!("{:.2}", r.amount),
                        r.category.clone(),
                        r.subcategory.clone(),
                        claim.status.clone(),
                        r.status.clone(),
                    ];
                    if has_payout_status {
                        row.push(r.payout_status.clone().unwrap_or_default());
                    }
                    row.push(r.date_processed.clone());
                    row.push(r.note.clone());
                    row
                })
                .collect();
            write_table(output, &headers, &rows)?;
            Ok(())
        }
    }
}

async fn execute_login<W: Write>(
    system: &ClaimSystem,
    email: Option<String>,
    magic_link_url: Option<String>,
    output: &mut W,
) -> Result<(), Box<dyn Error>> {
    match (email, magic_link_url) {
        (Some(_), Some(_)) => {
            Err("You must provide either --email or --magic-link-url, not both".into())
        }
        (None, Some(magic_link_url)) => {
            system.login_with_magic_link(&magic_link_url, None).await?;
            writeln!(output, "You are now logged in!")?;
            Ok(())
        }
        (Some(email), None) => {
            system.request_magic_link(&email).await?;
            let magic_link = prompt_for_magic_link(&email, output)?;
            system
                .login_with_magic_link(&magic_link, Some(&email))
                .await?;
            writeln!(output, "You are now logged in!")?;
            Ok(())
        }
        (None, None) => {
            writeln!(
                output,
                "Enter the email address you use to log on to Forma, then press Enter."
            )?;
            let email: String = Input::<String>::new().with_prompt(">").interact_text()?;
            system.request_magic_link(&email).await?;
            let magic_link = prompt_for_magic_link(&email, output)?;
            system
                .login_with_magic_link(&magic_link, Some(&email))
                .await?;
            writeln!(output, "You are now logged in!")?;
            Ok(())
        }
    }
}

fn prompt_for_magic_link<W: Write>(email: &str, output: &mut W) -> Result<String, Box<dyn Error>> {
    writeln!(
        output,
        "Copy and paste the magic link sent to you at {}, then press Enter.",
        email
    )?;
    Ok(Input::<String>::new().with_prompt(">").interact_text()?)
}

struct SubmitClaimArgs {
    benefit: Option<String>,
    category: Option<String>,
    amount: Option<String>,
    merchant: Option<String>,
    purchase_date: Option<String>,
    description: Option<String>,
    receipt_paths: Vec<String>,
}

async fn execute_submit_claim<W: Write>(
    system: &ClaimSystem,
    token: &str,
    keys: &InferenceKeys,
    args: SubmitClaimArgs,
    output: &mut W,
) -> Result<(), Box<dyn Error>> {
    let has_some_manual_inputs = args.benefit.is_some()
        || args.category.is_some()
        || args.amount.is_some()
        || args.merchant.is_some()
        || args.purchase_date.is_some()
        || args.description.is_some();

    let claim = match args {
        // Traditional mode: all details provided manually.
        SubmitClaimArgs {
            benefit: Some(benefit),
            category: Some(category),
            amount: Some(amount),
            merchant: Some(merchant),
            purchase_date: Some(purchase_date),
            description: Some(description),
            receipt_paths,
        } => Claim {
            benefit,
            category,
            amount,
            merchant,
            purchase_date,
            description,
            receipt_paths,
        },

        // Receipt inference mode: nothing manual, everything read off the
        // first receipt.
        SubmitClaimArgs { receipt_paths, .. }
            if !has_some_manual_inputs && keys.is_configured() =>
        {
            let first_receipt = receipt_paths
                .first()
                .ok_or("You must provide at least one --receipt-path.")?;
            let benefits = system.benefits_with_categories(token).await?;
            let details = system
                .infer_claim_from_receipt(keys, first_receipt, &benefits)
                .await?;
            writeln!(
                output,
                "Inferred claim details: {} at {} for {} on {} ({} / {})",
                details.description,
                details.merchant,
                details.amount,
                details.purchase_date,
                details.benefit,
                details.category
            )?;
            Claim {
                benefit: details.benefit,
                category: details.category,
                amount: details.amount,
                merchant: details.merchant,
                purchase_date: details.purchase_date,
                description: details.description,
                receipt_paths,
            }
        }

        // Inference of benefit and category only, from merchant and
        // description.
        SubmitClaimArgs {
            benefit: None,
            category: None,
            amount,
            merchant: Some(merchant),
            purchase_date,
            description: Some(description),
            receipt_paths,
        } if keys.is_configured() => {
            let amount = amount.ok_or(
                "When inferring only benefit and category, you must still provide --amount and \
                 --purchase-date.",
            )?;
            let purchase_date = purchase_date.ok_or(
                "When inferring only benefit and category, you must still provide --amount and \
                 --purchase-date.",
            )?;

            let benefits = system.benefits_with_categories(token).await?;
            let selection = system
                .infer_category_and_benefit(keys, &merchant, &description, &benefits)
                .await?;
            writeln!(
                output,
                "Inferred that you should claim using the {} benefit and {} category.",
                selection.benefit, selection.category
            )?;
            Claim {
                benefit: selection.benefit,
                category: selection.category,
                amount,
                merchant,
                purchase_date,
                description,
                receipt_paths,
            }
        }

        _ => {
            return Err(
                "You must either provide all claim details (--benefit, --category, --amount, \
                 --merchant, --purchase-date, --description), or provide an OpenAI API key or \
                 GitHub token with either: (1) just a receipt for full inference, or (2) all \
                 details except --benefit and --category to infer them."
                    .into(),
            )
        }
    };

    system.submit_claim(token, claim).await?;
    writeln!(output, "Claim submitted successfully.")?;
    Ok(())
}

async fn execute_submit_claims_from_directory<W: Write>(
    system: &ClaimSystem,
    token: &str,
    keys: &InferenceKeys,
    directory: &str,
    processed_directory: Option<String>,
    output: &mut W,
) -> Result<(), Box<dyn Error>> {
    if !keys.is_configured() {
        return Err(
            "You must provide either an OpenAI API key (--openai-api-key) or GitHub token \
             (--github-token) to infer claim details from receipts."
                .into(),
        );
    }

    let processed_directory = processed_directory
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(directory).join("processed"));

    let receipt_files = FileSystem::receipt_files_in(directory)?;
    if receipt_files.is_empty() {
        writeln!(
            output,
            "No supported receipt files found in directory: {}",
            directory
        )?;
        writeln!(
            output,
            "Supported file types: {}",
            SUPPORTED_RECEIPT_EXTENSIONS.join(", ")
        )?;
        return Ok(());
    }

    writeln!(
        output,
        "Found {} receipt file(s) to process:",
        receipt_files.len()
    )?;
    for (index, file) in receipt_files.iter().enumerate() {
        writeln!(output, "  {}. {}", index + 1, file.display())?;
    }

    let benefits = system.benefits_with_categories(token).await?;

    let mut processed_count = 0;
    let mut skipped_count = 0;

    for (index, receipt_file) in receipt_files.iter().enumerate() {
        let file_name = FileSystem::file_name(receipt_file.to_str().unwrap_or_default());
        writeln!(
            output,
            "--- Processing receipt {}/{}: {} ---",
            index + 1,
            receipt_files.len(),
            file_name
        )?;

        let result = process_directory_receipt(
            system,
            token,
            keys,
            receipt_file.to_str().unwrap_or_default(),
            &benefits,
            output,
        )
        .await;

        match result {
            Ok(true) => {
                if let Err(e) = FileSystem::move_to_processed(receipt_file, &processed_directory) {
                    warn!(
                        "Could not move {} to the processed directory: {}. The claim was \
                         submitted successfully, but the file was not moved.",
                        file_name, e
                    );
                }
                processed_count += 1;
            }
            Ok(false) => {
                writeln!(output, "Skipped {}", file_name)?;
                skipped_count += 1;
            }
            Err(e) => {
                writeln!(output, "Error processing {}: {}", file_name, e)?;
                skipped_count += 1;
            }
        }
    }

    writeln!(output, "--- Summary ---")?;
    writeln!(output, "Processed successfully: {}", processed_count)?;
    writeln!(output, "Skipped: {}", skipped_count)?;
    writeln!(output, "Total files: {}", receipt_files.len())?;
    if processed_count > 0 {
        writeln!(
            output,
            "Processed receipts moved to: {}",
            processed_directory.display()
        )?;
    }
    Ok(())
}

/// Infers, confirms and submits one receipt. Returns whether the claim was
/// submitted.
async fn process_directory_receipt<W: Write>(
    system: &ClaimSystem,
    token: &str,
    keys: &InferenceKeys,
    receipt_path: &str,
    benefits: &[BenefitWithCategories],
    output: &mut W,
) -> Result<bool, Box<dyn Error>> {
    writeln!(output, "Analyzing receipt...")?;
    let details = system
        .infer_claim_from_receipt(keys, receipt_path, benefits)
        .await?;

    writeln!(output, "Inferred claim details:")?;
    writeln!(output, "  Amount: {}", details.amount)?;
    writeln!(output, "  Merchant: {}", details.merchant)?;
    writeln!(output, "  Purchase Date: {}", details.purchase_date)?;
    writeln!(output, "  Description: {}", details.description)?;
    writeln!(output, "  Benefit: {}", details.benefit)?;
    writeln!(output, "  Category: {}", details.category)?;

    let confirmed = Confirm::new()
        .with_prompt("Do you want to submit this claim?")
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(false);
    }

    writeln!(output, "Submitting claim...")?;
    let claim = Claim {
        benefit: details.benefit,
        category: details.category,
        amount: details.amount,
        merchant: details.merchant,
        purchase_date: details.purchase_date,
        description: details.description,
        receipt_paths: vec![receipt_path.to_string()],
    };
    system.submit_claim(token, claim).await?;
    writeln!(output, "Claim submitted successfully for {}", receipt_path)?;
    Ok(true)
}

/// Plain fixed-width table output.
fn write_table<W: Write>(
    output: &mut W,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<(), std::io::Error> {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() && cell.len() > widths[index] {
                widths[index] = cell.len();
            }
        }
    }

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(index, header)| format!("{:<width$}", header, width = widths[index]))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(output, "{}", header_line.trim_end())?;
    writeln!(output, "{}", "-".repeat(header_line.trim_end().len()))?;

    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{:<width$}", cell, width = widths[index]))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(output, "{}", line.trim_end())?;
    }
    Ok(())
}
