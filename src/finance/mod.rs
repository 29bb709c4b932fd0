//! Deterministic rental-property analysis
//!
//! Pure arithmetic over a financing bundle and an expense bundle. No I/O, no
//! state between calls: identical inputs give bit-identical outputs.

mod validation;

pub use validation::{validate_assumptions, validate_expenses};

use crate::error::PropvestError;
use crate::models::{AnalysisBreakdown, AnalysisResult, FinancingAssumptions, OperatingExpenses};
use crate::Result;

/// Nights per month used for income. Fixed, not calendar-accurate.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Closing costs added on top of the down payment
pub const CLOSING_COST_ESTIMATE: f64 = 3_500.0;

pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Level monthly payment of an amortizing loan.
///
/// A zero rate falls back to straight-line repayment instead of the 0/0 form.
pub fn monthly_payment(principal: f64, monthly_rate: f64, num_payments: u32) -> Result<f64> {
    if num_payments == 0 {
        return Err(PropvestError::invalid("loanTermYears", "must be > 0"));
    }
    let n = f64::from(num_payments);

    let payment = if monthly_rate == 0.0 {
        principal / n
    } else {
        let growth = (1.0 + monthly_rate).powf(n);
        principal * monthly_rate * growth / (growth - 1.0)
    };

    if payment.is_finite() {
        Ok(payment)
    } else {
        Err(PropvestError::invalid(
            "interestRate",
            format!("produces a non-finite mortgage payment (monthly rate {})", monthly_rate),
        ))
    }
}

/// Full analysis including the intermediates shown in the breakdown panel
pub fn compute_breakdown(
    assumptions: &FinancingAssumptions,
    expenses: &OperatingExpenses,
) -> Result<AnalysisBreakdown> {
    validate_assumptions(assumptions)?;
    validate_expenses(expenses)?;

    let a = assumptions;
    let e = expenses;

    let loan_amount = a.purchase_price * (1.0 - a.down_payment_percent / 100.0);
    let monthly_rate = a.interest_rate / 100.0 / MONTHS_PER_YEAR;
    let num_payments = a.loan_term_years.checked_mul(12).ok_or_else(|| {
        PropvestError::invalid("loanTermYears", format!("{} years is out of range", a.loan_term_years))
    })?;

    let monthly_mortgage = monthly_payment(loan_amount, monthly_rate, num_payments)?;

    let monthly_income = (a.nightly_rate * DAYS_PER_MONTH) * (a.occupancy_rate / 100.0);

    let monthly_tax = e.property_tax_yearly / MONTHS_PER_YEAR;
    let monthly_insurance = e.insurance_yearly / MONTHS_PER_YEAR;
    let monthly_management = monthly_income * (e.management_fee_percent / 100.0);

    let total_monthly_expenses = monthly_mortgage
        + monthly_tax
        + monthly_insurance
        + e.hoa_monthly
        + e.utilities_monthly
        + e.maintenance_monthly
        + monthly_management
        + e.other_monthly;

    let cash_flow = monthly_income - total_monthly_expenses;
    let annual_cash_flow = cash_flow * MONTHS_PER_YEAR;
    let initial_investment =
        (a.purchase_price * (a.down_payment_percent / 100.0)) + CLOSING_COST_ESTIMATE;

    if initial_investment == 0.0 {
        return Err(PropvestError::DegenerateResult(
            "initial investment is zero; cash-on-cash return is undefined".to_string(),
        ));
    }
    let cash_on_cash_roi = (annual_cash_flow / initial_investment) * 100.0;

    let operating_expenses = total_monthly_expenses - monthly_mortgage;
    let annual_noi = (monthly_income - operating_expenses) * MONTHS_PER_YEAR;
    let cap_rate = (annual_noi / a.purchase_price) * 100.0;

    let breakdown = AnalysisBreakdown {
        result: AnalysisResult {
            monthly_income: settle("monthlyIncome", monthly_income)?,
            monthly_mortgage: settle("monthlyMortgage", monthly_mortgage)?,
            total_monthly_expenses: settle("totalMonthlyExpenses", total_monthly_expenses)?,
            cash_flow: settle("cashFlow", cash_flow)?,
            cap_rate: settle("capRate", cap_rate)?,
            cash_on_cash_roi: settle("cashOnCashRoi", cash_on_cash_roi)?,
            initial_investment: settle("initialInvestment", initial_investment)?,
        },
        loan_amount: settle("loanAmount", loan_amount)?,
        monthly_rate: settle("monthlyRate", monthly_rate)?,
        num_payments,
        monthly_tax: settle("monthlyTax", monthly_tax)?,
        monthly_insurance: settle("monthlyInsurance", monthly_insurance)?,
        monthly_management: settle("monthlyManagement", monthly_management)?,
        operating_expenses: settle("operatingExpenses", operating_expenses)?,
        annual_noi: settle("annualNoi", annual_noi)?,
        annual_cash_flow: settle("annualCashFlow", annual_cash_flow)?,
    };

    Ok(breakdown)
}

/// Map assumptions and expenses to the KPI figures
pub fn compute_analysis(
    assumptions: &FinancingAssumptions,
    expenses: &OperatingExpenses,
) -> Result<AnalysisResult> {
    compute_breakdown(assumptions, expenses).map(|b| b.result)
}

/// Reject non-finite output and fold -0.0 into 0.0
fn settle(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(PropvestError::invalid(
            field,
            format!("computed a non-finite value ({})", value),
        ));
    }
    Ok(if value == 0.0 { 0.0 } else { value })
}
