//! Dashboard session: the owner of the current inputs and their analysis
//!
//! Every edit builds a new input bundle, recomputes once and swaps the
//! bundles and result together. A rejected edit leaves the session as it was.

mod store;

pub use store::{InMemorySessionStore, SessionLimits, SessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::debug;
use uuid::Uuid;

use crate::finance;
use crate::models::{
    AnalysisBreakdown, AnalysisResult, ExpensesUpdate, FinancingAssumptions, FinancingUpdate,
    OperatingExpenses, PropertyListing,
};
use crate::Result;

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    id: Uuid,
    listing: PropertyListing,
    assumptions: FinancingAssumptions,
    expenses: OperatingExpenses,
    breakdown: AnalysisBreakdown,
    fingerprint: String,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Serializable view of a session handed to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub revision: u64,
    pub fingerprint: String,
    pub listing: PropertyListing,
    pub assumptions: FinancingAssumptions,
    pub expenses: OperatingExpenses,
    pub analysis: AnalysisBreakdown,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisSession {
    /// Session on the sample listing with default assumptions
    pub fn new() -> Result<Self> {
        let listing = PropertyListing::sample();
        let assumptions = listing.default_assumptions();
        Self::with_listing(listing, assumptions, OperatingExpenses::default())
    }

    pub fn with_inputs(assumptions: FinancingAssumptions, expenses: OperatingExpenses) -> Result<Self> {
        Self::with_listing(PropertyListing::sample(), assumptions, expenses)
    }

    pub fn with_listing(
        listing: PropertyListing,
        assumptions: FinancingAssumptions,
        expenses: OperatingExpenses,
    ) -> Result<Self> {
        let breakdown = finance::compute_breakdown(&assumptions, &expenses)?;
        let fingerprint = input_fingerprint(&assumptions, &expenses)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            listing,
            fingerprint,
            assumptions,
            expenses,
            breakdown,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn listing(&self) -> &PropertyListing {
        &self.listing
    }

    pub fn assumptions(&self) -> &FinancingAssumptions {
        &self.assumptions
    }

    pub fn expenses(&self) -> &OperatingExpenses {
        &self.expenses
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.breakdown.result
    }

    pub fn breakdown(&self) -> &AnalysisBreakdown {
        &self.breakdown
    }

    /// Number of accepted edits that changed the inputs
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn replace_assumptions(&mut self, assumptions: FinancingAssumptions) -> Result<&AnalysisBreakdown> {
        self.commit(assumptions, self.expenses)
    }

    pub fn replace_expenses(&mut self, expenses: OperatingExpenses) -> Result<&AnalysisBreakdown> {
        self.commit(self.assumptions, expenses)
    }

    pub fn update_assumptions(&mut self, update: &FinancingUpdate) -> Result<&AnalysisBreakdown> {
        let next = update.apply(&self.assumptions);
        self.commit(next, self.expenses)
    }

    pub fn update_expenses(&mut self, update: &ExpensesUpdate) -> Result<&AnalysisBreakdown> {
        let next = update.apply(&self.expenses);
        self.commit(self.assumptions, next)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            revision: self.revision,
            fingerprint: self.fingerprint.clone(),
            listing: self.listing.clone(),
            assumptions: self.assumptions,
            expenses: self.expenses,
            analysis: self.breakdown,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Recompute from the complete candidate bundles and swap everything at once
    fn commit(
        &mut self,
        assumptions: FinancingAssumptions,
        expenses: OperatingExpenses,
    ) -> Result<&AnalysisBreakdown> {
        let fingerprint = input_fingerprint(&assumptions, &expenses)?;
        if fingerprint == self.fingerprint {
            debug!(session_id = %self.id, revision = self.revision, "Inputs unchanged, skipping recompute");
            return Ok(&self.breakdown);
        }

        let breakdown = finance::compute_breakdown(&assumptions, &expenses)?;

        self.assumptions = assumptions;
        self.expenses = expenses;
        self.breakdown = breakdown;
        self.fingerprint = fingerprint;
        self.revision += 1;
        self.updated_at = Utc::now();

        debug!(
            session_id = %self.id,
            revision = self.revision,
            cash_flow = self.breakdown.result.cash_flow,
            "Analysis recomputed"
        );

        Ok(&self.breakdown)
    }
}

/// SHA-256 over the serialized bundles, hex encoded
pub fn input_fingerprint(
    assumptions: &FinancingAssumptions,
    expenses: &OperatingExpenses,
) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), &(assumptions, expenses))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
