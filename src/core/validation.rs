// src/core/validation.rs

use crate::core::errors::ClaimError;
use crate::core::file_system::FileSystem;
use crate::core::models::{BenefitCategory, Claim, ResolvedClaim};

/// The purchase date must be shaped like `2024-01-15`: four digits, a dash,
/// two digits, a dash, two digits. This is a format check only - the platform
/// accepts the value as-is, so no calendar validation happens here (month 13
/// passes).
pub fn is_valid_purchase_date(purchase_date: &str) -> bool {
    let bytes = purchase_date.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// The amount must be one or more digits, optionally followed by a dot and
/// exactly two digits: `25` and `25.99` pass, `25.9`, `-25.99` and `$25.99`
/// do not.
pub fn is_valid_amount(amount: &str) -> bool {
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (amount, None),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    match fraction {
        None => true,
        Some(fraction) => fraction.len() == 2 && fraction.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Validates a raw claim against a benefit's flattened catalog and resolves
/// its free-text category.
///
/// Four checks, in order: category resolution (first catalog entry whose
/// alias or canonical name equals the claim's category text), date format,
/// amount format, and receipt existence (first missing path in input order).
/// The first failure is returned; on success the matched entry's identifiers
/// are merged into a `ResolvedClaim`.
pub fn resolve_claim(
    claim: Claim,
    categories: &[BenefitCategory],
) -> Result<ResolvedClaim, ClaimError> {
    let matched = categories
        .iter()
        .find(|category| category.matches(&claim.category))
        .ok_or_else(|| ClaimError::CategoryNotFound {
            benefit: claim.benefit.clone(),
            category: claim.category.clone(),
        })?;

    if !is_valid_purchase_date(&claim.purchase_date) {
        return Err(ClaimError::InvalidDateFormat(claim.purchase_date));
    }

    if !is_valid_amount(&claim.amount) {
        return Err(ClaimError::InvalidAmountFormat(claim.amount));
    }

    for path in &claim.receipt_paths {
        if !FileSystem::exists(path) {
            return Err(ClaimError::ReceiptNotFound(path.clone()));
        }
    }

    Ok(ResolvedClaim::from_match(claim, matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    // Helpers

    fn test_catalog() -> Vec<BenefitCategory> {
        vec![
            BenefitCategory::new(
                "cat-1".to_string(),
                "Fitness".to_string(),
                "Gym Membership".to_string(),
                "gym".to_string(),
                None,
                "benefit-1".to_string(),
            ),
            BenefitCategory::new(
                "cat-1".to_string(),
                "Fitness".to_string(),
                "Gym Membership".to_string(),
                "gym".to_string(),
                Some("fitness".to_string()),
                "benefit-1".to_string(),
            ),
            BenefitCategory::new(
                "cat-1".to_string(),
                "Fitness".to_string(),
                "Gym Membership".to_string(),
                "gym".to_string(),
                Some("workout".to_string()),
                "benefit-1".to_string(),
            ),
        ]
    }

    fn claim_with_receipts(receipt_paths: Vec<String>) -> Claim {
        Claim {
            benefit: "Wellness".to_string(),
            category: "workout".to_string(),
            amount: "25.99".to_string(),
            merchant: "Gym Co".to_string(),
            purchase_date: "2024-01-15".to_string(),
            description: "January membership".to_string(),
            receipt_paths,
        }
    }

    fn claim_on_disk(temp_dir: &TempDir) -> Claim {
        let receipt = temp_dir.path().join("receipt.pdf");
        File::create(&receipt).unwrap();
        claim_with_receipts(vec![receipt.to_str().unwrap().to_string()])
    }

    // Date format

    #[test]
    fn test_purchase_date_shape() {
        assert!(is_valid_purchase_date("2024-01-15"));
        assert!(is_valid_purchase_date("0001-01-01"));
        // Format check only: calendar nonsense still passes.
        assert!(is_valid_purchase_date("2023-13-01"));
        assert!(is_valid_purchase_date("2023-02-32"));

        assert!(!is_valid_purchase_date("2024-1-15"));
        assert!(!is_valid_purchase_date("15-01-2024"));
        assert!(!is_valid_purchase_date("2024/01/15"));
        assert!(!is_valid_purchase_date("2024-01-15 "));
        assert!(!is_valid_purchase_date(""));
    }

    // Amount format

    #[test]
    fn test_amount_grammar() {
        assert!(is_valid_amount("25"));
        assert!(is_valid_amount("25.99"));
        assert!(is_valid_amount("0.00"));
        assert!(is_valid_amount("1234567"));

        assert!(!is_valid_amount("10.9"));
        assert!(!is_valid_amount("10.999"));
        assert!(!is_valid_amount("-10.99"));
        assert!(!is_valid_amount("$10.99"));
        assert!(!is_valid_amount("10,000.00"));
        assert!(!is_valid_amount(".99"));
        assert!(!is_valid_amount("10."));
        assert!(!is_valid_amount(""));
    }

    // Category resolution

    #[test]
    fn test_alias_resolves_to_its_subcategory() {
        let temp_dir = TempDir::new().unwrap();
        let claim = claim_on_disk(&temp_dir);

        let resolved = resolve_claim(claim, &test_catalog()).unwrap();
        assert_eq!(resolved.category_id(), "cat-1");
        assert_eq!(resolved.subcategory_value(), "gym");
        assert_eq!(resolved.subcategory_alias(), Some("workout"));
        assert_eq!(resolved.benefit_id(), "benefit-1");
    }

    #[test]
    fn test_canonical_name_resolves_without_alias() {
        let temp_dir = TempDir::new().unwrap();
        let mut claim = claim_on_disk(&temp_dir);
        claim.category = "Gym Membership".to_string();

        let resolved = resolve_claim(claim, &test_catalog()).unwrap();
        assert_eq!(resolved.subcategory_alias(), None);
    }

    #[test]
    fn test_unknown_category_names_benefit_and_text() {
        let temp_dir = TempDir::new().unwrap();
        let mut claim = claim_on_disk(&temp_dir);
        claim.category = "nonexistent".to_string();

        let err = resolve_claim(claim, &test_catalog()).unwrap_err();
        assert_eq!(
            err,
            ClaimError::CategoryNotFound {
                benefit: "Wellness".to_string(),
                category: "nonexistent".to_string(),
            }
        );
    }

    #[test]
    fn test_first_match_wins_for_ambiguous_labels() {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = test_catalog();
        // A second subcategory reusing the "workout" alias. Resolution is by
        // catalog order, so the earlier entry still wins.
        catalog.push(BenefitCategory::new(
            "cat-2".to_string(),
            "Classes".to_string(),
            "Fitness Classes".to_string(),
            "classes".to_string(),
            Some("workout".to_string()),
            "benefit-1".to_string(),
        ));

        let resolved = resolve_claim(claim_on_disk(&temp_dir), &catalog).unwrap();
        assert_eq!(resolved.subcategory_value(), "gym");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = test_catalog();
        let claim = claim_on_disk(&temp_dir);

        let first = resolve_claim(claim.clone(), &catalog).unwrap();
        let second = resolve_claim(claim, &catalog).unwrap();
        assert_eq!(first.category_id(), second.category_id());
        assert_eq!(first.subcategory_value(), second.subcategory_value());
        assert_eq!(first.subcategory_alias(), second.subcategory_alias());
    }

    // Check ordering

    #[test]
    fn test_category_check_runs_before_date_check() {
        let temp_dir = TempDir::new().unwrap();
        let mut claim = claim_on_disk(&temp_dir);
        claim.category = "nonexistent".to_string();
        claim.purchase_date = "bad".to_string();

        // Both are wrong; the category failure surfaces first.
        let err = resolve_claim(claim, &test_catalog()).unwrap_err();
        assert!(matches!(err, ClaimError::CategoryNotFound { .. }));
    }

    #[test]
    fn test_date_check_runs_before_amount_check() {
        let temp_dir = TempDir::new().unwrap();
        let mut claim = claim_on_disk(&temp_dir);
        claim.purchase_date = "15/01/2024".to_string();
        claim.amount = "bogus".to_string();

        let err = resolve_claim(claim, &test_catalog()).unwrap_err();
        assert_eq!(err, ClaimError::InvalidDateFormat("15/01/2024".to_string()));
    }

    // Receipt existence

    #[test]
    fn test_first_missing_receipt_is_cited_in_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("receipt-1.pdf");
        File::create(&existing).unwrap();
        let missing = temp_dir.path().join("receipt-2.pdf");

        let claim = claim_with_receipts(vec![
            existing.to_str().unwrap().to_string(),
            missing.to_str().unwrap().to_string(),
        ]);

        let err = resolve_claim(claim, &test_catalog()).unwrap_err();
        assert_eq!(
            err,
            ClaimError::ReceiptNotFound(missing.to_str().unwrap().to_string())
        );
    }

    #[test]
    fn test_all_receipts_present_passes() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.pdf");
        let second = temp_dir.path().join("b.jpg");
        File::create(&first).unwrap();
        File::create(&second).unwrap();

        let claim = claim_with_receipts(vec![
            first.to_str().unwrap().to_string(),
            second.to_str().unwrap().to_string(),
        ]);

        assert!(resolve_claim(claim, &test_catalog()).is_ok());
    }
}
