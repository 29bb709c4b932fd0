//! Core data models for the property analyzer

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Financing =================
//

/// Purchase, loan and rental-income assumptions edited from the dashboard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancingAssumptions {
    pub purchase_price: f64,
    pub down_payment_percent: f64,
    /// Annual percent
    pub interest_rate: f64,
    pub loan_term_years: u32,
    /// Assumed short-term-rental price per night
    pub nightly_rate: f64,
    /// Percent of nights occupied per month
    pub occupancy_rate: f64,
}

impl Default for FinancingAssumptions {
    fn default() -> Self {
        Self {
            purchase_price: 450_000.0,
            down_payment_percent: 20.0,
            interest_rate: 6.5,
            loan_term_years: 30,
            nightly_rate: 250.0,
            occupancy_rate: 65.0,
        }
    }
}

/// Field-level edit of [`FinancingAssumptions`]. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancingUpdate {
    pub purchase_price: Option<f64>,
    pub down_payment_percent: Option<f64>,
    pub interest_rate: Option<f64>,
    pub loan_term_years: Option<u32>,
    pub nightly_rate: Option<f64>,
    pub occupancy_rate: Option<f64>,
}

impl FinancingUpdate {
    /// Build a new bundle from `base` with the provided fields replaced
    pub fn apply(&self, base: &FinancingAssumptions) -> FinancingAssumptions {
        FinancingAssumptions {
            purchase_price: self.purchase_price.unwrap_or(base.purchase_price),
            down_payment_percent: self
                .down_payment_percent
                .unwrap_or(base.down_payment_percent),
            interest_rate: self.interest_rate.unwrap_or(base.interest_rate),
            loan_term_years: self.loan_term_years.unwrap_or(base.loan_term_years),
            nightly_rate: self.nightly_rate.unwrap_or(base.nightly_rate),
            occupancy_rate: self.occupancy_rate.unwrap_or(base.occupancy_rate),
        }
    }
}

//
// ================= Expenses =================
//

/// Recurring operating costs. Yearly fields are spread evenly over 12 months.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatingExpenses {
    pub property_tax_yearly: f64,
    pub insurance_yearly: f64,
    pub hoa_monthly: f64,
    pub utilities_monthly: f64,
    pub maintenance_monthly: f64,
    /// Percent of monthly income
    pub management_fee_percent: f64,
    pub other_monthly: f64,
}

impl Default for OperatingExpenses {
    fn default() -> Self {
        Self {
            property_tax_yearly: 8_000.0,
            insurance_yearly: 2_000.0,
            hoa_monthly: 50.0,
            utilities_monthly: 300.0,
            maintenance_monthly: 150.0,
            management_fee_percent: 0.0,
            other_monthly: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpensesUpdate {
    pub property_tax_yearly: Option<f64>,
    pub insurance_yearly: Option<f64>,
    pub hoa_monthly: Option<f64>,
    pub utilities_monthly: Option<f64>,
    pub maintenance_monthly: Option<f64>,
    pub management_fee_percent: Option<f64>,
    pub other_monthly: Option<f64>,
}

impl ExpensesUpdate {
    pub fn apply(&self, base: &OperatingExpenses) -> OperatingExpenses {
        OperatingExpenses {
            property_tax_yearly: self.property_tax_yearly.unwrap_or(base.property_tax_yearly),
            insurance_yearly: self.insurance_yearly.unwrap_or(base.insurance_yearly),
            hoa_monthly: self.hoa_monthly.unwrap_or(base.hoa_monthly),
            utilities_monthly: self.utilities_monthly.unwrap_or(base.utilities_monthly),
            maintenance_monthly: self.maintenance_monthly.unwrap_or(base.maintenance_monthly),
            management_fee_percent: self
                .management_fee_percent
                .unwrap_or(base.management_fee_percent),
            other_monthly: self.other_monthly.unwrap_or(base.other_monthly),
        }
    }
}

//
// ================= Analysis =================
//

/// Derived metrics shown on the KPI cards. Never edited, only recomputed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub monthly_income: f64,
    pub monthly_mortgage: f64,
    pub total_monthly_expenses: f64,
    pub cash_flow: f64,
    /// Percent
    pub cap_rate: f64,
    /// Percent
    pub cash_on_cash_roi: f64,
    pub initial_investment: f64,
}

/// Result plus the intermediate figures of the breakdown panel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBreakdown {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub loan_amount: f64,
    pub monthly_rate: f64,
    pub num_payments: u32,
    pub monthly_tax: f64,
    pub monthly_insurance: f64,
    pub monthly_management: f64,
    /// Monthly expenses excluding debt service
    pub operating_expenses: f64,
    pub annual_noi: f64,
    pub annual_cash_flow: f64,
}

//
// ================= Listing =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListing {
    pub id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub price: f64,
    pub beds: u32,
    pub baths: f32,
    pub sqft: u32,
    pub image_url: String,
    pub description: String,
}

impl PropertyListing {
    /// Sample listing every new dashboard opens on
    pub fn sample() -> Self {
        Self {
            id: "1".to_string(),
            address: "1204 Willow Creek Dr".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip: "78741".to_string(),
            price: 450_000.0,
            beds: 4,
            baths: 3.0,
            sqft: 2400,
            image_url: "https://images.unsplash.com/photo-1600596542815-37a9a22110dl?auto=format&fit=crop&w=2000&q=80".to_string(),
            description: "Beautiful modern home in the heart of Austin, perfect for short term rentals with pool access and spacious living areas.".to_string(),
        }
    }

    /// Financing defaults with the purchase price taken from the listing
    pub fn default_assumptions(&self) -> FinancingAssumptions {
        FinancingAssumptions {
            purchase_price: self.price,
            ..FinancingAssumptions::default()
        }
    }
}

//
// ================= Tools =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ToolTab {
    Details,
    ImageEditor,
    VeoAnimator,
    MarketResearch,
}

impl ToolTab {
    pub const ALL: [ToolTab; 4] = [
        ToolTab::Details,
        ToolTab::ImageEditor,
        ToolTab::VeoAnimator,
        ToolTab::MarketResearch,
    ];
}

impl fmt::Display for ToolTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolTab::Details => "Photos",
            ToolTab::ImageEditor => "AI Editor",
            ToolTab::VeoAnimator => "Veo Animator",
            ToolTab::MarketResearch => "Research",
        };
        write!(f, "{}", s)
    }
}
