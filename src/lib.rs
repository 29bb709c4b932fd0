//! PropVest Analyzer
//!
//! Backend for a short-term-rental investment dashboard:
//! - Deterministic cash-flow, cap-rate and cash-on-cash analysis
//! - Sessions that recompute the analysis on every input edit
//! - Gemini-backed image editing, video tours and market research
//! - Voice assistant audio framing and playback scheduling
//!
//! DATA FLOW:
//! EDIT → NEW BUNDLE → VALIDATE → RECOMPUTE → SWAP

pub mod api;
pub mod config;
pub mod error;
pub mod finance;
pub mod gemini;
pub mod models;
pub mod session;
pub mod tools;
pub mod voice;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use finance::{compute_analysis, compute_breakdown};
pub use session::AnalysisSession;
