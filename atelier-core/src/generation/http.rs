//! [`ImageBackend`] talking to an OpenAI-compatible inference server.
//!
//! The request is posted to `{base_url}/v1/images/generations` and the first
//! `data[].b64_json` entry of the response is decoded. The two-stage sampling
//! parameters travel as extra body fields which servers are free to ignore.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationRequest, ImageBackend};
use crate::error::GenerationError;

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    response_format: &'static str,
    negative_prompt: &'a str,
    sample_steps: u32,
    refiner_steps: u32,
    guidance_scale: f32,
    strength: f32,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

/// Backend delegating to a remote `/v1/images/generations` endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpImageBackend {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint_url(base_url),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}/v1/images/generations", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let p = &request.params;
        let body = ImagesRequest {
            model: &self.model,
            prompt: &request.prompt,
            n: 1,
            size: format!("{}x{}", p.width, p.height),
            response_format: "b64_json",
            negative_prompt: &p.negative_prompt,
            sample_steps: p.base_steps,
            refiner_steps: p.refiner_steps,
            guidance_scale: p.guidance_scale,
            strength: p.refiner_strength,
        };
        debug!(endpoint = %self.endpoint, model = %self.model, "posting image generation request");

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::BackendStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImagesResponse = resp.json().await?;
        decode_first_image(parsed)
    }
}

fn decode_first_image(resp: ImagesResponse) -> Result<Vec<u8>, GenerationError> {
    let b64 = resp
        .data
        .into_iter()
        .find_map(|d| d.b64_json)
        .ok_or(GenerationError::EmptyResponse)?;
    base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| GenerationError::Backend(format!("invalid base64 image payload: {e}")))
}
