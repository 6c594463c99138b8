use serde::{Deserialize, Serialize};

// Wire shapes for the profile endpoint. Field names mirror the Forma API
// payload exactly.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub data: ProfileData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub company: CompanyProfile,
    pub employee: EmployeeProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_wallet_configurations: Vec<CompanyWalletConfiguration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyWalletConfiguration {
    pub id: String,
    pub wallet_name: String,
    pub categories: Vec<ProfileCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCategory {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<ProfileSubcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSubcategory {
    pub name: String,
    pub value: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_wallets: Vec<EmployeeWallet>,
    pub settings: EmployeeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeWallet {
    pub id: String,
    pub amount: f64,
    pub company_wallet_configuration: WalletConfigurationName,
    pub is_employee_eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfigurationName {
    pub wallet_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeSettings {
    pub currency: String,
}

/// A benefit the employee is eligible to claim against, with its remaining
/// balance in the employee's settings currency.
#[derive(Debug, Clone)]
pub struct Benefit {
    id: String,
    name: String,
    remaining_amount: f64,
    remaining_amount_currency: String,
}

impl Benefit {
    pub fn new(
        id: String,
        name: String,
        remaining_amount: f64,
        remaining_amount_currency: String,
    ) -> Self {
        Self {
            id,
            name,
            remaining_amount,
            remaining_amount_currency,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remaining_amount(&self) -> f64 {
        self.remaining_amount
    }

    pub fn remaining_amount_currency(&self) -> &str {
        &self.remaining_amount_currency
    }
}

#[derive(Debug, Clone)]
pub struct BenefitWithCategories {
    pub benefit: Benefit,
    pub categories: Vec<BenefitCategory>,
}

/// One flattened entry of a benefit's category taxonomy. A subcategory with N
/// aliases produces N + 1 entries: one canonical (`subcategory_alias = None`)
/// and one per alias, all sharing the same category and benefit identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitCategory {
    category_id: String,
    category_name: String,
    subcategory_name: String,
    subcategory_value: String,
    subcategory_alias: Option<String>,
    benefit_id: String,
}

impl BenefitCategory {
    pub fn new(
        category_id: String,
        category_name: String,
        subcategory_name: String,
        subcategory_value: String,
        subcategory_alias: Option<String>,
        benefit_id: String,
    ) -> Self {
        Self {
            category_id,
            category_name,
            subcategory_name,
            subcategory_value,
            subcategory_alias,
            benefit_id,
        }
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn category_name(&self) -> &str {
        &self.category_name
    }

    pub fn subcategory_name(&self) -> &str {
        &self.subcategory_name
    }

    pub fn subcategory_value(&self) -> &str {
        &self.subcategory_value
    }

    pub fn subcategory_alias(&self) -> Option<&str> {
        self.subcategory_alias.as_deref()
    }

    pub fn benefit_id(&self) -> &str {
        &self.benefit_id
    }

    /// The label a user types for this entry: the alias when present,
    /// otherwise the canonical subcategory name.
    pub fn label(&self) -> &str {
        self.subcategory_alias
            .as_deref()
            .unwrap_or(&self.subcategory_name)
    }

    /// Whether this entry matches a free-text category string. Matching is by
    /// exact string equality against the alias or the canonical name.
    pub fn matches(&self, category_text: &str) -> bool {
        self.subcategory_alias.as_deref() == Some(category_text)
            || self.subcategory_name == category_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gym_alias_entry() -> BenefitCategory {
        BenefitCategory::new(
            "cat-1".to_string(),
            "Fitness".to_string(),
            "Gym Membership".to_string(),
            "gym".to_string(),
            Some("workout".to_string()),
            "benefit-1".to_string(),
        )
    }

    #[test]
    fn test_matches_alias_and_canonical_name() {
        let entry = gym_alias_entry();
        assert!(entry.matches("workout"));
        assert!(entry.matches("Gym Membership"));
        assert!(!entry.matches("gym"));
        assert!(!entry.matches("Workout"));
    }

    #[test]
    fn test_label_prefers_alias() {
        let entry = gym_alias_entry();
        assert_eq!(entry.label(), "workout");

        let canonical = BenefitCategory::new(
            "cat-1".to_string(),
            "Fitness".to_string(),
            "Gym Membership".to_string(),
            "gym".to_string(),
            None,
            "benefit-1".to_string(),
        );
        assert_eq!(canonical.label(), "Gym Membership");
    }

    #[test]
    fn test_profile_response_deserialization() {
        let json = r#"{
            "data": {
                "company": {
                    "company_wallet_configurations": [
                        {
                            "id": "config-1",
                            "wallet_name": "Wellness",
                            "categories": [
                                {
                                    "id": "cat-1",
                                    "name": "Fitness",
                                    "subcategories": [
                                        {
                                            "name": "Gym Membership",
                                            "value": "gym",
                                            "aliases": ["fitness", "workout"]
                                        }
                                    ]
                                }
                            ]
                        }
                    ]
                },
                "employee": {
                    "employee_wallets": [
                        {
                            "id": "wallet-1",
                            "amount": 150.0,
                            "company_wallet_configuration": { "wallet_name": "Wellness" },
                            "is_employee_eligible": true
                        }
                    ],
                    "settings": { "currency": "USD" }
                }
            }
        }"#;

        let profile: ProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(profile.data.company.company_wallet_configurations.len(), 1);
        let config = &profile.data.company.company_wallet_configurations[0];
        assert_eq!(config.wallet_name, "Wellness");
        assert_eq!(config.categories[0].subcategories[0].aliases.len(), 2);
        assert_eq!(profile.data.employee.settings.currency, "USD");
    }
}
