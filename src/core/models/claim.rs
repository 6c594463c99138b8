use serde::{Deserialize, Serialize};

use super::benefit::BenefitCategory;

/// A raw claim as typed on the command line, read from a CSV row, or produced
/// by receipt inference. Entirely untrusted string data until it has passed
/// through `validation::resolve_claim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub benefit: String,
    pub category: String,
    pub amount: String,
    pub merchant: String,
    pub purchase_date: String,
    pub description: String,
    pub receipt_paths: Vec<String>,
}

/// A claim that has passed validation, carrying the identifiers of the single
/// catalog entry it matched. Only `from_match` can build one, so the
/// identifiers always originate from an actual `BenefitCategory`.
#[derive(Debug, Clone)]
pub struct ResolvedClaim {
    claim: Claim,
    benefit_id: String,
    category_id: String,
    subcategory_value: String,
    subcategory_alias: Option<String>,
}

impl ResolvedClaim {
    pub fn from_match(claim: Claim, matched: &BenefitCategory) -> Self {
        Self {
            claim,
            benefit_id: matched.benefit_id().to_string(),
            category_id: matched.category_id().to_string(),
            subcategory_value: matched.subcategory_value().to_string(),
            subcategory_alias: matched.subcategory_alias().map(str::to_string),
        }
    }

    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    pub fn benefit_id(&self) -> &str {
        &self.benefit_id
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn subcategory_value(&self) -> &str {
        &self.subcategory_value
    }

    pub fn subcategory_alias(&self) -> Option<&str> {
        self.subcategory_alias.as_deref()
    }

    pub fn receipt_paths(&self) -> &[String] {
        &self.claim.receipt_paths
    }

    /// The text fields of the claim-creation multipart form, in wire order.
    /// This is the one place where a missing alias is normalized to the empty
    /// string: the wire format has no absent representation.
    pub fn wire_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "transaction".to_string()),
            ("is_recurring", "false".to_string()),
            ("amount", self.claim.amount.clone()),
            ("transaction_date", self.claim.purchase_date.clone()),
            ("default_employee_wallet_id", self.benefit_id.clone()),
            ("note", self.claim.description.clone()),
            ("category", self.category_id.clone()),
            ("category_alias", String::new()),
            ("subcategory", self.subcategory_value.clone()),
            (
                "subcategory_alias",
                self.subcategory_alias.clone().unwrap_or_default(),
            ),
            ("reimbursement_vendor", self.claim.merchant.clone()),
        ]
    }
}

// Wire shapes for the claims-list endpoint.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsListResponse {
    pub data: ClaimsListData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsListData {
    pub claims: Vec<SubmittedClaim>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedClaim {
    pub id: String,
    pub status: String,
    pub reimbursement: Reimbursement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reimbursement {
    pub status: String,
    pub payout_status: Option<String>,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub reimbursement_vendor: String,
    pub date_processed: String,
    pub note: String,
    pub employee_note: String,
}
