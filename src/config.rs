//! Environment configuration
//!
//! Values come from the process environment after `.env` is loaded.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::PropvestError;
use crate::gemini::{PollSettings, DEFAULT_BASE_URL};
use crate::models::{FinancingAssumptions, OperatingExpenses};
use crate::session::SessionLimits;
use crate::Result;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub port: u16,
    pub video_poll: PollSettings,
    pub sessions: SessionLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY").unwrap_or_else(|| {
            warn!("GEMINI_API_KEY not set; AI tools will report a configuration error");
            String::new()
        });

        let gemini_base_url =
            lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => 8080,
        };

        let defaults = PollSettings::default();
        let interval_secs = match lookup("VIDEO_POLL_INTERVAL_SECS") {
            Some(raw) => parse_value("VIDEO_POLL_INTERVAL_SECS", &raw)?,
            None => defaults.interval.as_secs(),
        };
        let max_attempts = match lookup("VIDEO_POLL_MAX_ATTEMPTS") {
            Some(raw) => parse_value("VIDEO_POLL_MAX_ATTEMPTS", &raw)?,
            None => defaults.max_attempts,
        };

        let session_defaults = SessionLimits::default();
        let ttl_secs = match lookup("SESSION_TTL_SECS") {
            Some(raw) => parse_value("SESSION_TTL_SECS", &raw)?,
            None => session_defaults.ttl.as_secs(),
        };
        let max_sessions = match lookup("MAX_SESSIONS") {
            Some(raw) => parse_value("MAX_SESSIONS", &raw)?,
            None => session_defaults.max_sessions,
        };
        if max_sessions == 0 {
            return Err(PropvestError::Config("MAX_SESSIONS must be at least 1".to_string()));
        }

        Ok(Self {
            gemini_api_key,
            gemini_base_url,
            port,
            video_poll: PollSettings {
                interval: Duration::from_secs(interval_secs),
                max_attempts,
            },
            sessions: SessionLimits {
                ttl: Duration::from_secs(ttl_secs),
                max_sessions,
            },
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PropvestError::Config(format!("{} has invalid value '{}'", key, raw)))
}

/// Analysis inputs for the CLI: defaults overridden by `PROPVEST_*` variables
pub fn scenario_from_lookup<F>(lookup: F) -> Result<(FinancingAssumptions, OperatingExpenses)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut a = FinancingAssumptions::default();
    let mut e = OperatingExpenses::default();

    let num = |key: &str, target: &mut f64| -> Result<()> {
        if let Some(raw) = lookup(key) {
            *target = parse_value(key, &raw)?;
        }
        Ok(())
    };

    num("PROPVEST_PURCHASE_PRICE", &mut a.purchase_price)?;
    num("PROPVEST_DOWN_PAYMENT_PERCENT", &mut a.down_payment_percent)?;
    num("PROPVEST_INTEREST_RATE", &mut a.interest_rate)?;
    num("PROPVEST_NIGHTLY_RATE", &mut a.nightly_rate)?;
    num("PROPVEST_OCCUPANCY_RATE", &mut a.occupancy_rate)?;
    num("PROPVEST_PROPERTY_TAX_YEARLY", &mut e.property_tax_yearly)?;
    num("PROPVEST_INSURANCE_YEARLY", &mut e.insurance_yearly)?;
    num("PROPVEST_HOA_MONTHLY", &mut e.hoa_monthly)?;
    num("PROPVEST_UTILITIES_MONTHLY", &mut e.utilities_monthly)?;
    num("PROPVEST_MAINTENANCE_MONTHLY", &mut e.maintenance_monthly)?;
    num("PROPVEST_MANAGEMENT_FEE_PERCENT", &mut e.management_fee_percent)?;
    num("PROPVEST_OTHER_MONTHLY", &mut e.other_monthly)?;

    if let Some(raw) = lookup("PROPVEST_LOAN_TERM_YEARS") {
        a.loan_term_years = parse_value("PROPVEST_LOAN_TERM_YEARS", &raw)?;
    }

    Ok((a, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.video_poll.interval, Duration::from_secs(5));
        assert_eq!(config.video_poll.max_attempts, 120);
        assert!(config.gemini_api_key.is_empty());
        assert_eq!(config.sessions, SessionLimits::default());
        assert_eq!(config.sessions.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_session_limits() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SESSION_TTL_SECS", "120"),
            ("MAX_SESSIONS", "25"),
        ]))
        .unwrap();
        assert_eq!(config.sessions.ttl, Duration::from_secs(120));
        assert_eq!(config.sessions.max_sessions, 25);

        let err = AppConfig::from_lookup(lookup_from(&[("MAX_SESSIONS", "0")])).unwrap_err();
        assert!(matches!(err, PropvestError::Config(_)));
        assert!(AppConfig::from_lookup(lookup_from(&[("SESSION_TTL_SECS", "-1")])).is_err());
    }

    #[test]
    fn test_api_port_fallback() {
        let config = AppConfig::from_lookup(lookup_from(&[("API_PORT", "9000")])).unwrap();
        assert_eq!(config.port, 9000);

        let config =
            AppConfig::from_lookup(lookup_from(&[("PORT", "7000"), ("API_PORT", "9000")])).unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, PropvestError::Config(_)));
    }

    #[test]
    fn test_scenario_overrides() {
        let (a, e) = scenario_from_lookup(lookup_from(&[
            ("PROPVEST_INTEREST_RATE", "0"),
            ("PROPVEST_LOAN_TERM_YEARS", "15"),
            ("PROPVEST_MANAGEMENT_FEE_PERCENT", "12.5"),
        ]))
        .unwrap();

        assert_eq!(a.interest_rate, 0.0);
        assert_eq!(a.loan_term_years, 15);
        assert_eq!(a.purchase_price, 450_000.0);
        assert_eq!(e.management_fee_percent, 12.5);
    }
}
