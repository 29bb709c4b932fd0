//! Gemini API client for the dashboard's AI tools
//!
//! Image editing, video generation (long-running, polled) and search-grounded
//! market research. Uses a long-lived reqwest::Client for connection pooling.

use base64::Engine;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::PropvestError;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const RESEARCH_MODEL: &str = "gemini-2.5-flash";

/// Sent as a header so the key never lands in a URL or a logged error
const API_KEY_HEADER: &str = "x-goog-api-key";

pub const DEFAULT_VIDEO_PROMPT: &str = "Cinematic pan of the property";
pub const NO_RESULTS_TEXT: &str = "No results found.";

/// Polling schedule for long-running video operations
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// A web page the research answer was grounded on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchSource {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchReport {
    pub text: String,
    pub sources: Vec<ResearchSource>,
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    poll: PollSettings,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_settings(api_key, DEFAULT_BASE_URL.to_string(), PollSettings::default())
    }

    pub fn with_settings(api_key: String, base_url: String, poll: PollSettings) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll,
        })
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(PropvestError::MissingApiKey);
        }
        Ok(())
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// Only file downloads under our own base URL may carry the key
    fn video_download_url(&self, video_uri: &str) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| PropvestError::Config(format!("invalid Gemini base URL: {}", e)))?;
        let url = Url::parse(video_uri)
            .map_err(|e| PropvestError::invalid("uri", format!("not a valid URL: {}", e)))?;

        let files_prefix = format!("{}/files/", base.path().trim_end_matches('/'));
        let same_origin = url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default();
        let no_credentials = url.username().is_empty() && url.password().is_none();

        if same_origin && no_credentials && url.path().starts_with(&files_prefix) {
            Ok(url)
        } else {
            warn!(host = ?url.host_str(), "Refusing video download outside the Gemini files endpoint");
            Err(PropvestError::invalid("uri", "not a Gemini file download URI"))
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, url: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                PropvestError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(PropvestError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        response.json::<R>().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            PropvestError::LlmError(format!("Gemini parse error: {}", e))
        })
    }

    /// Apply a text instruction to a JPEG. Returns a PNG data URL.
    pub async fn edit_image(&self, image_base64: &str, prompt: &str) -> Result<String> {
        self.ensure_key()?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::inline(image_base64, "image/jpeg"), Part::text(prompt)],
            }],
            tools: None,
        };

        info!(model = IMAGE_MODEL, "Requesting image edit");
        let response: GenerateContentResponse =
            self.post(&self.model_url(IMAGE_MODEL, "generateContent"), &request).await?;

        extract_inline_image(&response)
    }

    /// Animate a still image. Blocks (asynchronously) until the operation completes.
    pub async fn generate_video(&self, image_base64: &str, prompt: Option<&str>) -> Result<String> {
        self.ensure_key()?;

        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_VIDEO_PROMPT);

        let request = PredictRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: VideoImage {
                    bytes_base64_encoded: image_base64.to_string(),
                    mime_type: "image/jpeg".to_string(),
                },
            }],
            parameters: VideoParameters {
                sample_count: 1,
                resolution: "720p".to_string(),
                aspect_ratio: "16:9".to_string(),
            },
        };

        info!(model = VIDEO_MODEL, "Starting video generation");
        let mut operation: Operation = self
            .post(&self.model_url(VIDEO_MODEL, "predictLongRunning"), &request)
            .await?;

        let mut attempts = 0;
        while !operation.done {
            if attempts >= self.poll.max_attempts {
                warn!(operation = %operation.name, attempts, "Video generation still pending");
                return Err(PropvestError::Timeout(format!(
                    "video operation {} not done after {} polls",
                    operation.name, attempts
                )));
            }
            tokio::time::sleep(self.poll.interval).await;
            attempts += 1;
            operation = self.poll_operation(&operation.name).await?;
        }

        info!(operation = %operation.name, attempts, "Video generation finished");
        video_uri_from_operation(&operation)
    }

    async fn poll_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Operation poll failed: {}", error_text);
            return Err(PropvestError::LlmError(format!(
                "Operation poll returned {}: {}",
                status, error_text
            )));
        }

        Ok(response.json::<Operation>().await?)
    }

    /// Download the bytes behind a generated video URI
    pub async fn fetch_video(&self, video_uri: &str) -> Result<Vec<u8>> {
        self.ensure_key()?;

        let url = self.video_download_url(video_uri)?;

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Search-grounded answer. Failures degrade to a fallback report.
    pub async fn market_research(&self, query: &str) -> ResearchReport {
        match self.try_market_research(query).await {
            Ok(report) => report,
            Err(e) => {
                error!("Market research error: {}", e);
                ResearchReport {
                    text: "Failed to perform market research. Please try again.".to_string(),
                    sources: Vec::new(),
                }
            }
        }
    }

    async fn try_market_research(&self, query: &str) -> Result<ResearchReport> {
        self.ensure_key()?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(query)],
            }],
            tools: Some(vec![SearchTool {
                google_search: serde_json::json!({}),
            }]),
        };

        info!(model = RESEARCH_MODEL, "Running grounded search");
        let response: GenerateContentResponse =
            self.post(&self.model_url(RESEARCH_MODEL, "generateContent"), &request).await?;

        Ok(research_report(&response))
    }
}

//
// ================= Wire types =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<SearchTool>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTool {
    google_search: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(data: &str, mime_type: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInstance {
    prompt: String,
    image: VideoImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    sample_count: u32,
    resolution: String,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResponse>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

//
// ================= Response extraction =================
//

fn extract_inline_image(response: &GenerateContentResponse) -> Result<String> {
    let data = response
        .candidates
        .first()
        .and_then(|c| c.content.parts.iter().find_map(|p| p.inline_data.as_ref()))
        .map(|inline| inline.data.as_str())
        .ok_or_else(|| PropvestError::LlmError("No image generated".to_string()))?;

    // Reject payloads that are not base64 before handing them to a browser
    base64::engine::general_purpose::STANDARD.decode(data)?;

    Ok(format!("data:image/png;base64,{}", data))
}

fn research_report(response: &GenerateContentResponse) -> ResearchReport {
    let candidate = response.candidates.first();

    let text: String = candidate
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| NO_RESULTS_TEXT.to_string());

    let sources = candidate
        .and_then(|c| c.grounding_metadata.as_ref())
        .map(|g| {
            g.grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .map(|web| ResearchSource {
                    uri: web.uri.clone(),
                    title: web.title.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    ResearchReport { text, sources }
}

fn video_uri_from_operation(operation: &Operation) -> Result<String> {
    if let Some(err) = &operation.error {
        return Err(PropvestError::LlmError(format!(
            "Video generation failed: {}",
            err.message
        )));
    }

    operation
        .response
        .as_ref()
        .and_then(|r| r.generate_video_response.as_ref())
        .and_then(|r| r.generated_samples.first())
        .and_then(|s| s.video.as_ref())
        .and_then(|v| v.uri.clone())
        .ok_or_else(|| PropvestError::LlmError("No video URI returned".to_string()))
}
