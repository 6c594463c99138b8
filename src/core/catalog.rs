// src/core/catalog.rs

use crate::core::errors::ClaimError;
use crate::core::models::{
    Benefit, BenefitCategory, CompanyWalletConfiguration, EmployeeWallet, ProfileResponse,
};

/// Flattens a benefit's category/subcategory/alias tree into a lookup table.
///
/// The benefit name must match in both the employee's eligible-wallet list
/// (which carries the wallet id used as `benefit_id`) and the company's
/// wallet-configuration list (which carries the category tree). The two lists
/// hold different identifiers, so a name present in only one of them is not a
/// usable benefit.
pub fn categories_for_benefit_name(
    profile: &ProfileResponse,
    benefit_name: &str,
) -> Result<Vec<BenefitCategory>, ClaimError> {
    let employee_wallet = eligible_wallets(profile)
        .find(|wallet| wallet.company_wallet_configuration.wallet_name == benefit_name);

    let company_configuration = profile
        .data
        .company
        .company_wallet_configurations
        .iter()
        .find(|configuration| configuration.wallet_name == benefit_name);

    match (employee_wallet, company_configuration) {
        (Some(wallet), Some(configuration)) => Ok(flatten_categories(configuration, &wallet.id)),
        _ => Err(ClaimError::BenefitNotFound(benefit_name.to_string())),
    }
}

/// One entry per (subcategory, alias) pair, in source order: categories, then
/// subcategories, then the canonical entry before its aliases.
fn flatten_categories(
    configuration: &CompanyWalletConfiguration,
    benefit_id: &str,
) -> Vec<BenefitCategory> {
    configuration
        .categories
        .iter()
        .flat_map(|category| {
            category.subcategories.iter().flat_map(|subcategory| {
                std::iter::once(None)
                    .chain(subcategory.aliases.iter().map(|alias| Some(alias.clone())))
                    .map(|alias| {
                        BenefitCategory::new(
                            category.id.clone(),
                            category.name.clone(),
                            subcategory.name.clone(),
                            subcategory.value.clone(),
                            alias,
                            benefit_id.to_string(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect()
}

/// The employee's eligible benefits with their remaining balances, in wallet
/// order. The balance currency comes from the employee settings.
pub fn benefits(profile: &ProfileResponse) -> Vec<Benefit> {
    let currency = &profile.data.employee.settings.currency;

    eligible_wallets(profile)
        .map(|wallet| {
            Benefit::new(
                wallet.id.clone(),
                wallet.company_wallet_configuration.wallet_name.clone(),
                wallet.amount,
                currency.clone(),
            )
        })
        .collect()
}

fn eligible_wallets(profile: &ProfileResponse) -> impl Iterator<Item = &EmployeeWallet> {
    profile
        .data
        .employee
        .employee_wallets
        .iter()
        .filter(|wallet| wallet.is_employee_eligible)
}
