//! Image generation capability.
//!
//! [`ImageBackend`] is the opaque `prompt -> image bytes` seam. Concrete
//! backends know nothing about sessions; [`ImageGenerator`] adds the
//! accelerator gate (one in-flight call at a time), a bounded timeout and
//! persistence of the produced image under the generated-images directory.

mod http;

pub use http::HttpImageBackend;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::ImageFormat;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::ids::short_id;

/// Default wait timeout for a single generation call.
///
/// On timeout the backend future is dropped and the gate reopens. A remote
/// backend that does not notice the dropped connection may still be busy
/// with the abandoned image when the next queued call reaches it.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// URL prefix under which generated images are served.
pub const GENERATED_URL_PREFIX: &str = "/static/generated";

/// Sampling parameters of the two-stage (base + refiner) pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    /// Denoising steps of the base stage.
    pub base_steps: u32,
    /// Denoising steps of the refiner stage.
    pub refiner_steps: u32,
    pub guidance_scale: f32,
    /// How strongly the refiner re-noises the base latent.
    pub refiner_strength: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            negative_prompt: "blurry, low quality, distorted, ugly".to_owned(),
            width: 880,
            height: 880,
            base_steps: 40,
            refiner_steps: 20,
            guidance_scale: 7.5,
            refiner_strength: 0.3,
        }
    }
}

impl GenerationParams {
    /// Square output of `size` × `size` pixels, other parameters default.
    pub fn with_size(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            ..Self::default()
        }
    }
}

/// One call into the capability.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
}

/// Opaque text-to-image capability.
///
/// Implementations may be slow (seconds) and non-deterministic. They are not
/// required to be reentrant: [`ImageGenerator`] never issues overlapping
/// calls to the same backend.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produce encoded image bytes for `request.prompt`.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError>;
}

/// A stored generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// File name inside the generated-images directory.
    pub file_name: String,
    /// Public URL, e.g. `/static/generated/1a2b3c4d.png`.
    pub url: String,
}

/// Serialised, time-bounded access to one [`ImageBackend`].
pub struct ImageGenerator {
    backend: Arc<dyn ImageBackend>,
    params: GenerationParams,
    output_dir: PathBuf,
    timeout: Duration,
    /// Single permit: at most one in-flight backend call.
    gate: Semaphore,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("backend", &self.backend.name())
            .field("output_dir", &self.output_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ImageGenerator {
    /// Create a generator writing into `output_dir`, creating it if needed.
    pub async fn new(
        backend: Arc<dyn ImageBackend>,
        params: GenerationParams,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let output_dir = output_dir.into();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| GenerationError::Io {
                path: output_dir.clone(),
                source,
            })?;
        Ok(Self {
            backend,
            params,
            output_dir,
            timeout,
            gate: Semaphore::new(1),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate an image for `prompt` and store it as PNG.
    ///
    /// Callers queue on the accelerator gate; the gate is released as soon as
    /// the backend returns or the timeout fires, before the image is written.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let request = GenerationRequest {
            prompt: prompt.to_owned(),
            params: self.params.clone(),
        };

        let bytes = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| GenerationError::Backend("generation gate closed".into()))?;
            let started = Instant::now();
            debug!(backend = self.backend.name(), prompt_chars = prompt.chars().count(), "generation started");
            let result = tokio::time::timeout(self.timeout, self.backend.generate(&request)).await;
            match result {
                Ok(Ok(bytes)) => {
                    info!(
                        backend = self.backend.name(),
                        image_bytes = bytes.len(),
                        elapsed_ms = started.elapsed().as_millis(),
                        "generation done"
                    );
                    bytes
                }
                Ok(Err(e)) => {
                    warn!(backend = self.backend.name(), error = %e, "generation failed");
                    return Err(e);
                }
                Err(_) => {
                    warn!(backend = self.backend.name(), timeout = ?self.timeout, "generation timed out");
                    return Err(GenerationError::Timeout(self.timeout));
                }
            }
        };

        let png = to_png(bytes)?;
        let file_name = format!("{}.png", short_id());
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, &png)
            .await
            .map_err(|source| GenerationError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(GeneratedImage {
            url: format!("{GENERATED_URL_PREFIX}/{file_name}"),
            file_name,
        })
    }
}

/// Pass PNG through untouched; decode and re-encode anything else.
fn to_png(bytes: Vec<u8>) -> Result<Vec<u8>, GenerationError> {
    if bytes.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    if matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
        return Ok(bytes);
    }
    let img = image::load_from_memory(&bytes).map_err(GenerationError::InvalidImage)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(GenerationError::InvalidImage)?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backends shared by generator and controller tests.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A tiny valid PNG.
    pub fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    /// Records every prompt and the enter/exit instants of each call.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub delay: Duration,
        pub fail: bool,
        pub prompts: Mutex<Vec<String>>,
        pub windows: Mutex<Vec<(Instant, Instant)>>,
        pub calls: AtomicUsize,
    }

    impl RecordingBackend {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
            let enter = Instant::now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.windows.lock().unwrap().push((enter, Instant::now()));
            if self.fail {
                return Err(GenerationError::Backend("accelerator fault".into()));
            }
            Ok(png_bytes())
        }
    }
}
