use crate::error::{GenerationError, Result};

use super::{ModelInfo, OperationKind};

pub const DEFAULT_BASE_COST: f64 = 0.003;
pub const MAX_DIMENSION: u32 = 2048;

/// Named payload shape a model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStrategy {
    TextToImage,
    Reference,
    InstructionEdit,
    ProductShoot,
    ImageToVideo,
}

impl PayloadStrategy {
    pub fn for_kind(kind: OperationKind) -> Self {
        match kind {
            OperationKind::TextToImage => PayloadStrategy::TextToImage,
            OperationKind::ImageToImage => PayloadStrategy::Reference,
            OperationKind::ImageEdit => PayloadStrategy::InstructionEdit,
            OperationKind::ProductShoot => PayloadStrategy::ProductShoot,
            OperationKind::ImageToVideo => PayloadStrategy::ImageToVideo,
        }
    }
}

/// Which REST surface a model is called through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `POST {base}/{model}`, answers with the final result.
    Direct,
    /// `POST {queue}/{model}`, answers with a request id to poll.
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Flux,
    StableDiffusion,
    Other,
}

impl ModelFamily {
    fn detect(endpoint: &str) -> Self {
        if endpoint.contains("flux") {
            ModelFamily::Flux
        } else if ["sdxl", "sd15", "stable-diffusion", "lcm-"]
            .iter()
            .any(|marker| endpoint.contains(marker))
        {
            ModelFamily::StableDiffusion
        } else {
            ModelFamily::Other
        }
    }
}

/// Everything the client needs to know about the model a request targets.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub alias: String,
    pub endpoint: String,
    pub kind: OperationKind,
    pub strategy: PayloadStrategy,
    pub surface: Surface,
    pub family: ModelFamily,
    pub max_dimension: u32,
    pub base_cost: f64,
}

impl ModelSpec {
    /// Base cost scaled by the output pixel count relative to a 1024x1024 image.
    pub fn estimate_cost(&self, width: u32, height: u32) -> f64 {
        let pixels = f64::from(width) * f64::from(height);
        self.base_cost * pixels / (1024.0 * 1024.0)
    }
}

struct CatalogEntry {
    alias: &'static str,
    endpoint: &'static str,
    name: &'static str,
    description: &'static str,
    kind: OperationKind,
    max_dimension: u32,
    base_cost: f64,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        alias: "flux-pro",
        endpoint: "fal-ai/flux-pro",
        name: "Flux Pro",
        description: "Latest Flux model with best quality",
        kind: OperationKind::TextToImage,
        max_dimension: 1920,
        base_cost: 0.05,
    },
    CatalogEntry {
        alias: "flux-dev",
        endpoint: "fal-ai/flux/dev",
        name: "Flux Dev",
        description: "Development version of Flux",
        kind: OperationKind::TextToImage,
        max_dimension: 1920,
        base_cost: 0.03,
    },
    CatalogEntry {
        alias: "flux-schnell",
        endpoint: "fal-ai/flux/schnell",
        name: "Flux Schnell",
        description: "Fast Flux generation",
        kind: OperationKind::TextToImage,
        max_dimension: 1920,
        base_cost: 0.01,
    },
    CatalogEntry {
        alias: "sdxl",
        endpoint: "fal-ai/fast-sdxl",
        name: "Stable Diffusion XL",
        description: "SDXL with fast generation",
        kind: OperationKind::TextToImage,
        max_dimension: 1536,
        base_cost: 0.003,
    },
    CatalogEntry {
        alias: "sd15",
        endpoint: "fal-ai/stable-diffusion-v1-5",
        name: "Stable Diffusion 1.5",
        description: "Classic SD 1.5 model",
        kind: OperationKind::TextToImage,
        max_dimension: 768,
        base_cost: 0.001,
    },
    CatalogEntry {
        alias: "lightning-sdxl",
        endpoint: "fal-ai/fast-lightning-sdxl",
        name: "Lightning SDXL",
        description: "Ultra-fast SDXL variant",
        kind: OperationKind::TextToImage,
        max_dimension: 1024,
        base_cost: 0.002,
    },
    CatalogEntry {
        alias: "wan-25-preview",
        endpoint: "fal-ai/wan-25-preview/image-to-image",
        name: "WAN-25 Preview",
        description: "Reference-guided image-to-image generation",
        kind: OperationKind::ImageToImage,
        max_dimension: MAX_DIMENSION,
        base_cost: DEFAULT_BASE_COST,
    },
    CatalogEntry {
        alias: "qwen-edit",
        endpoint: "fal-ai/qwen-image-edit-plus",
        name: "Qwen Image Edit Plus",
        description: "Instruction-based image editing",
        kind: OperationKind::ImageEdit,
        max_dimension: MAX_DIMENSION,
        base_cost: DEFAULT_BASE_COST,
    },
    CatalogEntry {
        alias: "product-photoshoot",
        endpoint: "easel-ai/product-photoshoot",
        name: "Product Photoshoot",
        description: "Studio product photography from a product shot",
        kind: OperationKind::ProductShoot,
        max_dimension: MAX_DIMENSION,
        base_cost: DEFAULT_BASE_COST,
    },
    CatalogEntry {
        alias: "wan-25-video",
        endpoint: "fal-ai/wan-25-preview/image-to-video",
        name: "WAN-25 Image to Video",
        description: "Short video clip animated from a still image",
        kind: OperationKind::ImageToVideo,
        max_dimension: MAX_DIMENSION,
        base_cost: DEFAULT_BASE_COST,
    },
];

pub fn default_alias(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::TextToImage => "flux-dev",
        OperationKind::ImageToImage => "wan-25-preview",
        OperationKind::ImageEdit => "qwen-edit",
        OperationKind::ProductShoot => "product-photoshoot",
        OperationKind::ImageToVideo => "wan-25-video",
    }
}

fn default_surface(kind: OperationKind) -> Surface {
    match kind {
        OperationKind::TextToImage => Surface::Direct,
        _ => Surface::Queue,
    }
}

/// Resolve a model alias (or raw endpoint path) for an operation. Unknown names are
/// used verbatim as the endpoint with the operation's default payload shape.
pub fn resolve(model: Option<&str>, kind: OperationKind) -> Result<ModelSpec> {
    let requested = model
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_alias(kind));

    let entry = CATALOG
        .iter()
        .find(|entry| entry.alias == requested || entry.endpoint == requested);

    match entry {
        Some(entry) if entry.kind != kind => Err(GenerationError::ValidationError(format!(
            "Model '{}' is a {} model and cannot run a {} request",
            entry.alias, entry.kind, kind
        ))),
        Some(entry) => Ok(ModelSpec {
            alias: entry.alias.to_string(),
            endpoint: entry.endpoint.to_string(),
            kind,
            strategy: PayloadStrategy::for_kind(kind),
            surface: default_surface(kind),
            family: ModelFamily::detect(entry.endpoint),
            max_dimension: entry.max_dimension,
            base_cost: entry.base_cost,
        }),
        None => Ok(ModelSpec {
            alias: requested.to_string(),
            endpoint: requested.trim_matches('/').to_string(),
            kind,
            strategy: PayloadStrategy::for_kind(kind),
            surface: default_surface(kind),
            family: ModelFamily::detect(requested),
            max_dimension: MAX_DIMENSION,
            base_cost: DEFAULT_BASE_COST,
        }),
    }
}

pub fn supported_models() -> Vec<ModelInfo> {
    CATALOG
        .iter()
        .map(|entry| ModelInfo {
            id: entry.alias.to_string(),
            name: entry.name.to_string(),
            endpoint: entry.endpoint.to_string(),
            kind: entry.kind,
            max_dimension: entry.max_dimension,
            description: entry.description.to_string(),
        })
        .collect()
}
