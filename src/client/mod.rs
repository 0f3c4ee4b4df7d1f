pub mod normalize;
pub mod payload;
pub mod queue;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::try_join_all;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::FalConfig,
    error::{GenerationError, Result},
    logger,
    models::{
        catalog, GenerationRequest, GenerationResult, ImageInput, JobHandle, ModelInfo,
        OperationKind, ProviderMetadata, QueueStatus,
    },
    preprocess::{passthrough, preprocess},
};

pub use normalize::{normalize_response, NormalizedResponse};
pub use payload::{build_payload, clamp_dimension, validate, BuiltPayload, WireInputs};
pub use queue::{JobOutcome, QueueClient};

/// Client for the fal.ai generation endpoints.
///
/// Cheap to clone; every clone shares one connection pool. Each call owns its own job
/// handle and poll counter, so any number of generations can run concurrently.
#[derive(Clone)]
pub struct GenerationClient {
    config: Arc<FalConfig>,
    queue: QueueClient,
}

struct PreparedInput {
    wire: String,
    size: Option<(u32, u32)>,
}

impl GenerationClient {
    /// Fails with [`GenerationError::ConfigError`] when no API key is configured, so a
    /// misconfigured client never reaches the network.
    pub fn new(config: FalConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GenerationError::ConfigError("FAL_API_KEY is not set".to_string()))?
            .to_string();

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                GenerationError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        let config = Arc::new(config);
        Ok(Self {
            queue: QueueClient::new(http, Arc::clone(&config), &api_key),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FalConfig::from_env())
    }

    pub fn config(&self) -> &FalConfig {
        &self.config
    }

    pub async fn text_to_image(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_kind(OperationKind::TextToImage, request).await
    }

    pub async fn image_to_image(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_kind(OperationKind::ImageToImage, request).await
    }

    pub async fn edit_image(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_kind(OperationKind::ImageEdit, request).await
    }

    pub async fn product_shoot(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_kind(OperationKind::ProductShoot, request).await
    }

    pub async fn image_to_video(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_kind(OperationKind::ImageToVideo, request).await
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.generate_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`generate`](Self::generate), but stops waiting as soon as `cancel` fires and
    /// returns [`GenerationError::Cancelled`].
    pub async fn generate_with_cancel(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationResult> {
        let started = Instant::now();

        validate(&request)?;
        let spec = catalog::resolve(request.model.as_deref(), request.kind())?;
        let _timer = logger::timer(&format!("{} via {}", request.kind(), spec.alias));

        let inputs = self.prepare_inputs(&request).await?;
        let built = build_payload(&spec, &request, &inputs)?;
        log::info!(
            "Generating {} with {} at {}x{}",
            request.kind(),
            spec.endpoint,
            built.width,
            built.height
        );

        let outcome = self.queue.run(&spec, &built.body, &cancel).await?;
        let normalized = normalize_response(&outcome.body);
        if let Some(diagnostic) = &normalized.diagnostic {
            log::warn!("{} returned no images: {}", spec.endpoint, diagnostic);
        }

        let seed = normalized
            .seed
            .or_else(|| request.seed.filter(|seed| *seed != payload::UNSET_SEED));

        Ok(GenerationResult {
            generation_id: Uuid::new_v4().to_string(),
            images: normalized.images,
            seed,
            has_nsfw_concepts: normalized.has_nsfw_concepts,
            diagnostic: normalized.diagnostic,
            metadata: ProviderMetadata {
                model: spec.alias.clone(),
                endpoint: spec.endpoint.clone(),
                request_id: outcome.handle.map(|handle| handle.request_id),
                width: built.width,
                height: built.height,
                cost_estimate: spec.estimate_cost(built.width, built.height),
                poll_attempts: outcome.poll_attempts,
                elapsed: started.elapsed(),
                upstream_timings: normalized.timings,
                completed_at: Utc::now(),
            },
        })
    }

    /// Current queue status of a job submitted earlier.
    pub async fn job_status(&self, handle: &JobHandle) -> Result<QueueStatus> {
        self.queue.status(handle).await
    }

    /// `true` when the queue surface answers its health endpoint. Never errors.
    pub async fn check_connection(&self) -> bool {
        self.queue.health().await
    }

    pub fn supported_models(&self) -> Vec<ModelInfo> {
        catalog::supported_models()
    }

    async fn generate_kind(
        &self,
        expected: OperationKind,
        request: GenerationRequest,
    ) -> Result<GenerationResult> {
        if request.kind() != expected {
            return Err(GenerationError::ValidationError(format!(
                "Expected a {} request but got {}",
                expected,
                request.kind()
            )));
        }
        self.generate(request).await
    }

    async fn prepare_inputs(&self, request: &GenerationRequest) -> Result<WireInputs> {
        let recompress = self.config.preprocess_inputs;
        let images = try_join_all(
            request
                .images
                .iter()
                .map(|image| self.prepare_image(image, recompress)),
        )
        .await?;

        // Masks are pixel-exact and never recompressed.
        let mask = match &request.mask {
            Some(mask) => Some(self.prepare_image(mask, false).await?.wire),
            None => None,
        };

        Ok(WireInputs {
            primary_size: images.first().and_then(|image| image.size),
            images: images.into_iter().map(|image| image.wire).collect(),
            mask,
        })
    }

    async fn prepare_image(&self, input: &ImageInput, recompress: bool) -> Result<PreparedInput> {
        let bytes = match input.load().await? {
            Some(bytes) => bytes,
            None => {
                return Ok(PreparedInput {
                    wire: input.url().unwrap_or_default().to_string(),
                    size: None,
                })
            }
        };
        if bytes.is_empty() {
            return Err(GenerationError::ValidationError(
                "Image input is empty".to_string(),
            ));
        }

        let config = self.config.preprocess.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            if recompress {
                preprocess(&bytes, &config)
            } else {
                Ok(passthrough(bytes))
            }
        })
        .await
        .map_err(worker_failed)??;

        Ok(PreparedInput {
            size: (prepared.width > 0 && prepared.height > 0)
                .then_some((prepared.width, prepared.height)),
            wire: prepared.to_data_uri(),
        })
    }
}

fn worker_failed(err: tokio::task::JoinError) -> GenerationError {
    log::error!("Image preparation worker failed: {}", err);
    GenerationError::Internal(format!("image preparation worker failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_panic_is_internal() {
        let handle: tokio::task::JoinHandle<()> =
            tokio::task::spawn_blocking(|| panic!("decoder blew up"));
        let err = worker_failed(handle.await.unwrap_err());
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let err = GenerationClient::new(FalConfig::new()).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        let blank = GenerationClient::new(FalConfig::new().with_api_key("   "));
        assert!(blank.is_err());
    }

    #[tokio::test]
    async fn test_wrong_operation_is_rejected_before_io() {
        let client = GenerationClient::new(
            FalConfig::new()
                .with_api_key("k")
                .with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let err = client
            .edit_image(GenerationRequest::text_to_image("a cat"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_url_inputs_pass_through_and_bytes_become_data_uris() {
        let client = GenerationClient::new(FalConfig::new().with_api_key("k")).unwrap();
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(40, 30))
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();

        let request = GenerationRequest::edit("brighter", ImageInput::from_url("https://a/b.png"))
            .with_image(ImageInput::from_bytes(png.into_inner()));
        let inputs = client.prepare_inputs(&request).await.unwrap();

        assert_eq!(inputs.images[0], "https://a/b.png");
        assert!(inputs.images[1].starts_with("data:image/jpeg;base64,"));
        assert_eq!(inputs.primary_size, None);
    }

    #[tokio::test]
    async fn test_missing_path_is_a_validation_error() {
        let client = GenerationClient::new(FalConfig::new().with_api_key("k")).unwrap();
        let request = GenerationRequest::edit(
            "brighter",
            ImageInput::from_path("/definitely/not/here.png"),
        );
        let err = client.prepare_inputs(&request).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
