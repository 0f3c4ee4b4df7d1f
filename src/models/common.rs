use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub kind: OperationKind,
    pub max_dimension: u32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    TextToImage,
    ImageToImage,
    ImageEdit,
    ProductShoot,
    ImageToVideo,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::TextToImage => "text-to-image",
            OperationKind::ImageToImage => "image-to-image",
            OperationKind::ImageEdit => "image-edit",
            OperationKind::ProductShoot => "product-shoot",
            OperationKind::ImageToVideo => "image-to-video",
        }
    }

    /// Every kind except plain text-to-image works from at least one uploaded image.
    pub fn requires_input_image(&self) -> bool {
        !matches!(self, OperationKind::TextToImage)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
