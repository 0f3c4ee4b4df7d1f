use pixforge::logger::{self, LogLevel, LoggerConfig};
use pixforge::{FalConfig, GenerationClient, GenerationRequest, ImageRef};
use std::fs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::development().with_level(LogLevel::Debug))?;
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if env_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = FalConfig::from_env();
    logger::log_config_info(&config);

    log::info!("📚 Available models:");
    for model in pixforge::models::catalog::supported_models() {
        log::info!(
            "  {} - {} [{}] max {}px ({})",
            model.id,
            model.name,
            model.kind,
            model.max_dimension,
            model.endpoint
        );
    }

    let client = match GenerationClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            log::warn!("⚠️  {}; skipping the live generation", e.user_message());
            return Ok(());
        }
    };

    if client.check_connection().await {
        log::info!("🌐 Queue endpoint is reachable");
    } else {
        log::warn!("⚠️  Queue health check failed, trying anyway");
    }

    log::info!("🎨 Testing text-to-image...");
    let request = GenerationRequest::text_to_image(
        "A serene landscape with mountains and a lake at sunset, digital art style",
    )
    .with_model("flux-schnell")
    .with_size(1024, 768);

    match client.text_to_image(request).await {
        Ok(result) => {
            log::info!("✅ Generation {} finished", result.generation_id);
            log::info!(
                "🤖 {} at {}x{}, ~${:.4}, {} status checks, {}ms",
                result.metadata.model,
                result.metadata.width,
                result.metadata.height,
                result.metadata.cost_estimate,
                result.metadata.poll_attempts,
                result.metadata.elapsed.as_millis()
            );
            if let Some(note) = &result.diagnostic {
                log::warn!("⚠️  {}", note);
            }

            for (index, image) in result.images.iter().enumerate() {
                match image {
                    ImageRef::Url { url, .. } => log::info!("🖼️  Image {}: {}", index, url),
                    ImageRef::Data { bytes, .. } => {
                        let filename = format!(
                            "generated_image_{}_{}.jpg",
                            index,
                            chrono::Utc::now().timestamp()
                        );
                        match fs::write(&filename, bytes) {
                            Ok(_) => log::info!("💾 Image saved to: {}", filename),
                            Err(e) => log::error!("❌ Failed to save image: {}", e),
                        }
                    }
                }
            }
        }
        Err(e) => {
            log::error!("❌ Generation failed ({:?}): {}", e.kind(), e);
            if e.is_retryable() {
                log::warn!("💡 This error is transient, try again later");
            }
        }
    }

    Ok(())
}
