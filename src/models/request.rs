use serde::{Deserialize, Serialize};

use super::{ImageInput, OperationKind};

/// A single generation request. Common numeric fields live here; everything that only
/// makes sense for one kind of operation lives in [`Operation`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Catalog alias (`flux-dev`, `qwen-edit`, ...) or a raw endpoint path.
    pub model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub guidance_scale: Option<f32>,
    /// `-1` means "let the service pick".
    pub seed: Option<i64>,
    /// Primary input first, reference images after it.
    pub images: Vec<ImageInput>,
    pub mask: Option<ImageInput>,
    pub operation: Operation,
}

impl GenerationRequest {
    fn with_defaults(prompt: impl Into<String>, operation: Operation) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            model: None,
            width: None,
            height: None,
            steps: None,
            guidance_scale: None,
            seed: None,
            images: Vec::new(),
            mask: None,
            operation,
        }
    }

    pub fn text_to_image(prompt: impl Into<String>) -> Self {
        Self::with_defaults(prompt, Operation::TextToImage(TextToImageOptions::default()))
    }

    pub fn image_to_image(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self::with_defaults(prompt, Operation::ImageToImage(ReferenceOptions::default()))
            .with_image(image)
    }

    pub fn edit(instruction: impl Into<String>, image: ImageInput) -> Self {
        Self::with_defaults(instruction, Operation::Edit(EditOptions::default())).with_image(image)
    }

    pub fn product_shoot(
        category: impl Into<String>,
        description: impl Into<String>,
        product_image: ImageInput,
    ) -> Self {
        let options = ProductShootOptions {
            category: category.into(),
            ..Default::default()
        };
        Self::with_defaults(description, Operation::ProductShoot(options)).with_image(product_image)
    }

    pub fn image_to_video(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self::with_defaults(prompt, Operation::ImageToVideo(VideoOptions::default()))
            .with_image(image)
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
        self.guidance_scale = Some(guidance_scale);
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_mask(mut self, mask: ImageInput) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    TextToImage(TextToImageOptions),
    ImageToImage(ReferenceOptions),
    Edit(EditOptions),
    ProductShoot(ProductShootOptions),
    ImageToVideo(VideoOptions),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::TextToImage(_) => OperationKind::TextToImage,
            Operation::ImageToImage(_) => OperationKind::ImageToImage,
            Operation::Edit(_) => OperationKind::ImageEdit,
            Operation::ProductShoot(_) => OperationKind::ProductShoot,
            Operation::ImageToVideo(_) => OperationKind::ImageToVideo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextToImageOptions {
    /// Overrides width/height when set to a known ratio such as `16:9`.
    pub aspect_ratio: Option<String>,
    /// Appended to the prompt as `"{prompt}, {style}"`.
    pub style: Option<String>,
    pub num_images: u32,
    pub sampler: Option<String>,
    pub enable_safety_checker: bool,
}

impl Default for TextToImageOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: None,
            style: None,
            num_images: 1,
            sampler: None,
            enable_safety_checker: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceOptions {
    pub image_influence: f32,
    pub style_strength: f32,
    /// `original` keeps the requested width/height.
    pub aspect_ratio: String,
    pub hd_output: bool,
    pub auto_enhance: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            image_influence: 0.75,
            style_strength: 0.5,
            aspect_ratio: "original".to_string(),
            hd_output: false,
            auto_enhance: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EditType {
    Auto,
    ObjectRemoval,
    ObjectReplacement,
    BackgroundChange,
    StyleTransfer,
    ColorAdjustment,
    Other(String),
}

impl EditType {
    pub fn as_str(&self) -> &str {
        match self {
            EditType::Auto => "auto",
            EditType::ObjectRemoval => "object_removal",
            EditType::ObjectReplacement => "object_replacement",
            EditType::BackgroundChange => "background_change",
            EditType::StyleTransfer => "style_transfer",
            EditType::ColorAdjustment => "color_adjustment",
            EditType::Other(other) => other,
        }
    }
}

impl From<&str> for EditType {
    fn from(value: &str) -> Self {
        match value {
            "auto" => EditType::Auto,
            "object_removal" => EditType::ObjectRemoval,
            "object_replacement" => EditType::ObjectReplacement,
            "background_change" => EditType::BackgroundChange,
            "style_transfer" => EditType::StyleTransfer,
            "color_adjustment" => EditType::ColorAdjustment,
            other => EditType::Other(other.to_string()),
        }
    }
}

impl From<String> for EditType {
    fn from(value: String) -> Self {
        EditType::from(value.as_str())
    }
}

impl From<EditType> for String {
    fn from(value: EditType) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOptions {
    pub edit_type: EditType,
    pub strength: f32,
    pub coherence: f32,
    pub auto_mask: bool,
    pub preserve_style: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            edit_type: EditType::Auto,
            strength: 0.8,
            coherence: 0.9,
            auto_mask: true,
            preserve_style: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductFormat {
    Square,
    Portrait,
    Landscape,
    Banner,
    Story,
}

impl ProductFormat {
    pub fn base_dimensions(&self) -> (u32, u32) {
        match self {
            ProductFormat::Square => (1024, 1024),
            ProductFormat::Portrait => (768, 1024),
            ProductFormat::Landscape => (1024, 768),
            ProductFormat::Banner => (1920, 1080),
            ProductFormat::Story => (1080, 1920),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductResolution {
    #[serde(rename = "1024")]
    Standard,
    #[serde(rename = "1920")]
    High,
    #[serde(rename = "3840")]
    Ultra,
}

impl ProductResolution {
    pub fn scale(&self) -> f64 {
        match self {
            ProductResolution::Standard => 1.0,
            ProductResolution::High => 1.875,
            ProductResolution::Ultra => 3.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductShootOptions {
    pub category: String,
    pub scene_type: String,
    pub background_style: String,
    pub lighting_setup: String,
    /// Comma separated list, e.g. `"marble slab, eucalyptus"`.
    pub props: Option<String>,
    pub remove_background: bool,
    pub preserve_shadows: bool,
    pub color_palette: Option<Vec<String>>,
    pub reflection_intensity: f32,
    pub output_format: ProductFormat,
    pub resolution: ProductResolution,
    pub batch_size: u32,
    pub add_watermark: bool,
    pub generate_variations: bool,
}

impl Default for ProductShootOptions {
    fn default() -> Self {
        Self {
            category: String::new(),
            scene_type: "studio".to_string(),
            background_style: "clean_white".to_string(),
            lighting_setup: "soft_box".to_string(),
            props: None,
            remove_background: true,
            preserve_shadows: false,
            color_palette: None,
            reflection_intensity: 0.3,
            output_format: ProductFormat::Square,
            resolution: ProductResolution::Standard,
            batch_size: 4,
            add_watermark: false,
            generate_variations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoOptions {
    pub duration_seconds: u32,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            duration_seconds: 5,
            aspect_ratio: "16:9".to_string(),
            resolution: "1080p".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_operation_kind() {
        let image = ImageInput::from_url("http://x/in.png");
        assert_eq!(
            GenerationRequest::text_to_image("a cat").kind(),
            OperationKind::TextToImage
        );
        assert_eq!(
            GenerationRequest::edit("remove the hat", image.clone()).kind(),
            OperationKind::ImageEdit
        );
        let product = GenerationRequest::product_shoot("shoes", "red sneakers", image);
        assert_eq!(product.images.len(), 1);
        match product.operation {
            Operation::ProductShoot(options) => assert_eq!(options.category, "shoes"),
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ProductShootOptions =
            serde_json::from_str(r#"{"category":"watch","output_format":"banner","resolution":"1920"}"#)
                .unwrap();
        assert_eq!(options.output_format, ProductFormat::Banner);
        assert_eq!(options.resolution, ProductResolution::High);
        assert_eq!(options.batch_size, 4);
        assert_eq!(options.scene_type, "studio");

        let edit: EditOptions = serde_json::from_str(r#"{"edit_type":"sharpen"}"#).unwrap();
        assert_eq!(edit.edit_type, EditType::Other("sharpen".into()));
        assert_eq!(edit.strength, 0.8);
    }

    #[test]
    fn test_edit_type_round_trips_known_names() {
        for name in ["auto", "object_removal", "style_transfer"] {
            assert_eq!(EditType::from(name).as_str(), name);
        }
    }
}
