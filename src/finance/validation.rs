//! Input checks run before any arithmetic
//!
//! A bundle either passes every check or the first failing field is reported.
//! Nothing is clamped here; clamping is the caller's choice.

use crate::error::PropvestError;
use crate::models::{FinancingAssumptions, OperatingExpenses};
use crate::Result;

fn finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PropvestError::invalid(field, format!("must be finite, got {}", value)))
    }
}

fn positive(field: &'static str, value: f64) -> Result<()> {
    if finite(field, value)? > 0.0 {
        Ok(())
    } else {
        Err(PropvestError::invalid(field, format!("must be > 0, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if finite(field, value)? >= 0.0 {
        Ok(())
    } else {
        Err(PropvestError::invalid(field, format!("must be >= 0, got {}", value)))
    }
}

fn percent(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&finite(field, value)?) {
        Ok(())
    } else {
        Err(PropvestError::invalid(
            field,
            format!("must be within [0, 100], got {}", value),
        ))
    }
}

pub fn validate_assumptions(a: &FinancingAssumptions) -> Result<()> {
    positive("purchasePrice", a.purchase_price)?;
    percent("downPaymentPercent", a.down_payment_percent)?;
    non_negative("interestRate", a.interest_rate)?;
    if a.loan_term_years == 0 {
        return Err(PropvestError::invalid("loanTermYears", "must be > 0"));
    }
    non_negative("nightlyRate", a.nightly_rate)?;
    percent("occupancyRate", a.occupancy_rate)?;
    Ok(())
}

pub fn validate_expenses(e: &OperatingExpenses) -> Result<()> {
    non_negative("propertyTaxYearly", e.property_tax_yearly)?;
    non_negative("insuranceYearly", e.insurance_yearly)?;
    non_negative("hoaMonthly", e.hoa_monthly)?;
    non_negative("utilitiesMonthly", e.utilities_monthly)?;
    non_negative("maintenanceMonthly", e.maintenance_monthly)?;
    percent("managementFeePercent", e.management_fee_percent)?;
    non_negative("otherMonthly", e.other_monthly)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: PropvestError) -> &'static str {
        match err {
            PropvestError::InvalidInput { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate_assumptions(&FinancingAssumptions::default()).is_ok());
        assert!(validate_expenses(&OperatingExpenses::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_price() {
        let a = FinancingAssumptions {
            purchase_price: 0.0,
            ..Default::default()
        };
        assert_eq!(field_of(validate_assumptions(&a).unwrap_err()), "purchasePrice");
    }

    #[test]
    fn test_rejects_zero_term() {
        let a = FinancingAssumptions {
            loan_term_years: 0,
            ..Default::default()
        };
        assert_eq!(field_of(validate_assumptions(&a).unwrap_err()), "loanTermYears");
    }

    #[test]
    fn test_rejects_out_of_range_percentages() {
        let a = FinancingAssumptions {
            occupancy_rate: 100.5,
            ..Default::default()
        };
        assert_eq!(field_of(validate_assumptions(&a).unwrap_err()), "occupancyRate");

        let e = OperatingExpenses {
            management_fee_percent: -1.0,
            ..Default::default()
        };
        assert_eq!(field_of(validate_expenses(&e).unwrap_err()), "managementFeePercent");
    }

    #[test]
    fn test_rejects_nan_and_infinity() {
        let a = FinancingAssumptions {
            interest_rate: f64::NAN,
            ..Default::default()
        };
        assert_eq!(field_of(validate_assumptions(&a).unwrap_err()), "interestRate");

        let e = OperatingExpenses {
            hoa_monthly: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(field_of(validate_expenses(&e).unwrap_err()), "hoaMonthly");
    }

    #[test]
    fn test_zero_interest_and_zero_down_are_valid() {
        let a = FinancingAssumptions {
            interest_rate: 0.0,
            down_payment_percent: 0.0,
            ..Default::default()
        };
        assert!(validate_assumptions(&a).is_ok());
    }
}
