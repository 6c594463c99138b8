// src/core/csv.rs

use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::core::models::Claim;

pub const TEMPLATE_HEADER: &str =
    "benefit,category,amount,merchant,purchase_date,description,receipt_path\n";

const EXPECTED_HEADERS: [&str; 7] = [
    "benefit",
    "category",
    "amount",
    "merchant",
    "purchase_date",
    "description",
    "receipt_path",
];

/// One CSV row as written into the template. The `receipt_path` cell may hold
/// several comma-separated paths.
#[derive(Debug, Deserialize)]
struct ClaimRow {
    benefit: String,
    category: String,
    amount: String,
    merchant: String,
    purchase_date: String,
    description: String,
    receipt_path: String,
}

impl From<ClaimRow> for Claim {
    fn from(row: ClaimRow) -> Self {
        let receipt_paths = row
            .receipt_path
            .split(',')
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .collect();

        Claim {
            benefit: row.benefit,
            category: row.category,
            amount: row.amount,
            merchant: row.merchant,
            purchase_date: row.purchase_date,
            description: row.description,
            receipt_paths,
        }
    }
}

/// Reads claims from a template CSV. The header row must carry exactly the
/// template's columns (order does not matter).
pub fn read_claims_from_csv(input_path: &str) -> Result<Vec<Claim>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(input_path)?;

    let headers = reader.headers()?.clone();
    let mut header_names: Vec<&str> = headers.iter().collect();
    header_names.sort_unstable();
    let mut expected = EXPECTED_HEADERS;
    expected.sort_unstable();
    if header_names != expected {
        return Err(
            "Invalid CSV headers. Please use a template CSV generated by the `generate-template-csv` command."
                .into(),
        );
    }

    let mut claims = Vec::new();
    for row in reader.deserialize::<ClaimRow>() {
        claims.push(row?.into());
    }
    Ok(claims)
}

/// Writes a header-only template CSV. Refuses to clobber an existing file.
pub fn write_template_csv(output_path: &str) -> Result<(), Box<dyn Error>> {
    if Path::new(output_path).exists() {
        return Err(format!(
            "File '{}' already exists. Please delete it first, or set a different `--output-path` option.",
            output_path
        )
        .into());
    }

    fs::write(output_path, TEMPLATE_HEADER)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(temp_dir: &TempDir, contents: &str) -> String {
        let path = temp_dir.path().join("claims.csv");
        fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_claims_from_template_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(
            &temp_dir,
            "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
             Wellness,workout,25.99,Gym Co,2024-01-15,January membership,/tmp/receipt.pdf\n",
        );

        let claims = read_claims_from_csv(&path).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].benefit, "Wellness");
        assert_eq!(claims[0].category, "workout");
        assert_eq!(claims[0].receipt_paths, vec!["/tmp/receipt.pdf"]);
    }

    #[test]
    fn test_receipt_path_cell_splits_on_commas() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(
            &temp_dir,
            "benefit,category,amount,merchant,purchase_date,description,receipt_path\n\
             Wellness,workout,25.99,Gym Co,2024-01-15,Membership,\"/tmp/a.pdf, /tmp/b.jpg\"\n",
        );

        let claims = read_claims_from_csv(&path).unwrap();
        assert_eq!(claims[0].receipt_paths, vec!["/tmp/a.pdf", "/tmp/b.jpg"]);
    }

    #[test]
    fn test_header_order_does_not_matter() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(
            &temp_dir,
            "category,benefit,amount,merchant,purchase_date,description,receipt_path\n\
             workout,Wellness,25.99,Gym Co,2024-01-15,Membership,/tmp/receipt.pdf\n",
        );

        let claims = read_claims_from_csv(&path).unwrap();
        assert_eq!(claims[0].benefit, "Wellness");
        assert_eq!(claims[0].category, "workout");
    }

    #[test]
    fn test_unexpected_headers_fail() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(
            &temp_dir,
            "benefit,category,amount\nWellness,workout,25.99\n",
        );

        let err = read_claims_from_csv(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid CSV headers"));
    }

    #[test]
    fn test_empty_template_yields_no_claims() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(&temp_dir, TEMPLATE_HEADER);

        let claims = read_claims_from_csv(&path).unwrap();
        assert!(claims.is_empty());
    }

    #[test]
    fn test_write_template_csv_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("claims.csv");
        let path = path.to_str().unwrap();

        write_template_csv(path).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), TEMPLATE_HEADER);

        let err = write_template_csv(path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
