//! AI tool trait and catalog
//!
//! The three dashboard tabs that call out to a generative model. Each one
//! accepts input and returns output or an error; nothing here is
//! deterministic, so the HTTP layer talks to the trait, not the client.

use crate::error::PropvestError;
use crate::gemini::{GeminiClient, ResearchReport, IMAGE_MODEL, RESEARCH_MODEL, VIDEO_MODEL};
use crate::models::ToolTab;
use crate::Result;
use serde::Serialize;

/// Generative tools offered next to the listing photos
#[async_trait::async_trait]
pub trait PropertyTools: Send + Sync {
    /// Returns an image data URL
    async fn edit_image(&self, image_base64: &str, prompt: &str) -> Result<String>;

    /// Returns the URI of the generated video
    async fn animate(&self, image_base64: &str, prompt: Option<&str>) -> Result<String>;

    /// Bytes of a video previously returned by [`PropertyTools::animate`]
    async fn fetch_video(&self, video_uri: &str) -> Result<Vec<u8>>;

    /// Never fails; errors degrade to a fallback report
    async fn research(&self, query: &str) -> ResearchReport;
}

#[async_trait::async_trait]
impl PropertyTools for GeminiClient {
    async fn edit_image(&self, image_base64: &str, prompt: &str) -> Result<String> {
        GeminiClient::edit_image(self, image_base64, prompt).await
    }

    async fn animate(&self, image_base64: &str, prompt: Option<&str>) -> Result<String> {
        self.generate_video(image_base64, prompt).await
    }

    async fn fetch_video(&self, video_uri: &str) -> Result<Vec<u8>> {
        GeminiClient::fetch_video(self, video_uri).await
    }

    async fn research(&self, query: &str) -> ResearchReport {
        self.market_research(query).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub tab: ToolTab,
    pub label: String,
    pub description: &'static str,
    pub model: Option<&'static str>,
}

/// Every dashboard tab with what it does
pub fn tool_catalog() -> Vec<ToolDescriptor> {
    ToolTab::ALL
        .iter()
        .map(|&tab| {
            let (description, model) = match tab {
                ToolTab::Details => ("Listing photos and property facts", None),
                ToolTab::ImageEditor => (
                    "Visualize renovations by editing the listing photo with a text instruction",
                    Some(IMAGE_MODEL),
                ),
                ToolTab::VeoAnimator => (
                    "Turn the listing photo into a short video tour",
                    Some(VIDEO_MODEL),
                ),
                ToolTab::MarketResearch => (
                    "Search-grounded answers about rents, regulation and the neighborhood",
                    Some(RESEARCH_MODEL),
                ),
            };
            ToolDescriptor {
                tab,
                label: tab.to_string(),
                description,
                model,
            }
        })
        .collect()
}

/// Accept either raw base64 or a `data:<mime>;base64,` URL
pub fn strip_data_url(image: &str) -> Result<&str> {
    let payload = match image.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image,
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(PropvestError::invalid("image", "image payload is empty"));
    }
    Ok(payload)
}

pub fn require_text<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PropvestError::invalid(field, "must not be empty"));
    }
    Ok(trimmed)
}
