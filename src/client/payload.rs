//! JSON bodies for each payload strategy.
//!
//! Everything in here is pure: inputs are already resolved to wire strings (URL or
//! data URI) so building a payload never touches the network or the filesystem.

use serde_json::{json, Map, Value};

use crate::error::{GenerationError, Result};
use crate::models::catalog::{ModelFamily, ModelSpec, PayloadStrategy, MAX_DIMENSION};
use crate::models::{
    EditOptions, EditType, GenerationRequest, Operation, ProductShootOptions, ReferenceOptions,
    TextToImageOptions, VideoOptions,
};

pub const MIN_DIMENSION: u32 = 64;
pub const DIMENSION_ALIGNMENT: u32 = 8;
pub const DEFAULT_DIMENSION: u32 = 1024;
/// Seed value meaning "no seed".
pub const UNSET_SEED: i64 = -1;

const MAX_BATCH_SIZE: u32 = 10;

/// Input images already converted to their wire form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireInputs {
    pub images: Vec<String>,
    pub mask: Option<String>,
    /// Pixel size of the primary image when it was decoded locally.
    pub primary_size: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPayload {
    pub body: Value,
    pub width: u32,
    pub height: u32,
}

/// Checks that cannot be fixed by clamping. Runs before any I/O.
pub fn validate(request: &GenerationRequest) -> Result<()> {
    let kind = request.kind();

    if request.prompt.trim().is_empty() {
        return Err(invalid(match kind {
            crate::models::OperationKind::ImageEdit => "Edit instruction must not be empty",
            crate::models::OperationKind::ProductShoot => "Product description must not be empty",
            _ => "Prompt must not be empty",
        }));
    }

    if kind.requires_input_image() && request.images.is_empty() {
        return Err(invalid(format!(
            "At least one input image is required for {} requests",
            kind
        )));
    }

    if request.mask.is_some() && !matches!(request.operation, Operation::Edit(_)) {
        return Err(invalid("A mask is only supported for image edits"));
    }

    if request.guidance_scale.is_some_and(|v| !v.is_finite()) {
        return Err(invalid("guidance_scale must be a finite number"));
    }

    let finite = |values: &[f32]| values.iter().all(|v| v.is_finite());
    match &request.operation {
        Operation::TextToImage(_) | Operation::ImageToVideo(_) => {}
        Operation::ImageToImage(options) => {
            if !finite(&[options.image_influence, options.style_strength]) {
                return Err(invalid("image_influence and style_strength must be finite"));
            }
        }
        Operation::Edit(options) => {
            if !finite(&[options.strength, options.coherence]) {
                return Err(invalid("edit strength and coherence must be finite"));
            }
        }
        Operation::ProductShoot(options) => {
            if options.category.trim().is_empty() {
                return Err(invalid("Product category must not be empty"));
            }
            if !(1..=MAX_BATCH_SIZE).contains(&options.batch_size) {
                return Err(invalid(format!(
                    "batch_size must be between 1 and {}",
                    MAX_BATCH_SIZE
                )));
            }
            if !finite(&[options.reflection_intensity]) {
                return Err(invalid("reflection_intensity must be finite"));
            }
        }
    }

    Ok(())
}

pub fn build_payload(
    spec: &ModelSpec,
    request: &GenerationRequest,
    inputs: &WireInputs,
) -> Result<BuiltPayload> {
    let built = match (spec.strategy, &request.operation) {
        (PayloadStrategy::TextToImage, Operation::TextToImage(options)) => {
            text_to_image(spec, request, options)
        }
        (PayloadStrategy::Reference, Operation::ImageToImage(options)) => {
            reference(spec, request, options, inputs)?
        }
        (PayloadStrategy::InstructionEdit, Operation::Edit(options)) => {
            instruction_edit(spec, request, options, inputs)?
        }
        (PayloadStrategy::ProductShoot, Operation::ProductShoot(options)) => {
            product_shoot(spec, request, options, inputs)?
        }
        (PayloadStrategy::ImageToVideo, Operation::ImageToVideo(options)) => {
            image_to_video(request, options, inputs)?
        }
        (strategy, operation) => {
            return Err(invalid(format!(
                "{:?} payloads cannot be built from a {} request",
                strategy,
                operation.kind()
            )))
        }
    };
    Ok(built)
}

fn text_to_image(
    spec: &ModelSpec,
    request: &GenerationRequest,
    options: &TextToImageOptions,
) -> BuiltPayload {
    let (width, height) = match options.aspect_ratio.as_deref().and_then(text_aspect_ratio) {
        Some((w, h)) => fit_dimensions(w, h, spec.max_dimension),
        None => requested_dimensions(request, spec.max_dimension),
    };

    let prompt = match options.style.as_deref().map(str::trim) {
        Some(style) if !style.is_empty() => format!("{}, {}", request.prompt, style),
        _ => request.prompt.clone(),
    };

    let fast = spec.alias == "flux-schnell";
    let steps = request.steps.unwrap_or(if fast { 4 } else { 20 }).clamp(1, 150);
    let guidance = request
        .guidance_scale
        .unwrap_or(if fast { 3.5 } else { 7.5 })
        .clamp(1.0, 30.0);

    let mut body = json!({
        "prompt": prompt,
        "image_size": { "width": width, "height": height },
        "num_inference_steps": steps,
        "guidance_scale": number(guidance),
        "num_images": options.num_images.clamp(1, 4),
    });
    let map = object(&mut body);
    insert_common_optionals(map, request);

    if spec.family == ModelFamily::StableDiffusion {
        map.insert(
            "enable_safety_checker".into(),
            json!(options.enable_safety_checker),
        );
        if let Some(sampler) = options.sampler.as_deref() {
            map.insert("scheduler".into(), json!(map_sampler(sampler)));
        }
    }

    BuiltPayload {
        body,
        width,
        height,
    }
}

fn reference(
    spec: &ModelSpec,
    request: &GenerationRequest,
    options: &ReferenceOptions,
    inputs: &WireInputs,
) -> Result<BuiltPayload> {
    let (primary, references) = split_primary(inputs)?;

    let (width, height) = match reference_aspect_ratio(&options.aspect_ratio) {
        Some((w, h)) => fit_dimensions(w, h, spec.max_dimension),
        None => requested_dimensions(request, spec.max_dimension),
    };

    let mut fields = json!({
        "prompt": request.prompt,
        "image_url": primary,
        "image_influence": number(options.image_influence.clamp(0.0, 1.0)),
        "style_strength": number(options.style_strength.clamp(0.0, 1.0)),
        "width": width,
        "height": height,
        "guidance_scale": number(request.guidance_scale.unwrap_or(7.5).clamp(1.0, 20.0)),
        "num_inference_steps": request.steps.unwrap_or(20).clamp(1, 150),
        "enable_hd": options.hd_output,
        "enable_enhancement": options.auto_enhance,
    });
    let map = object(&mut fields);
    insert_common_optionals(map, request);
    if !references.is_empty() {
        map.insert("reference_images".into(), json!(references));
    }

    // Sent both flat and under `input`; the endpoint has accepted either form.
    let mut body = fields.clone();
    object(&mut body).insert("input".into(), fields);

    Ok(BuiltPayload {
        body,
        width,
        height,
    })
}

fn instruction_edit(
    spec: &ModelSpec,
    request: &GenerationRequest,
    options: &EditOptions,
    inputs: &WireInputs,
) -> Result<BuiltPayload> {
    if inputs.images.is_empty() {
        return Err(invalid("An image to edit is required"));
    }

    let max = spec.max_dimension;
    let (width, height) = match (request.width, request.height, inputs.primary_size) {
        (None, None, Some((w, h))) => fit_dimensions(w, h, max),
        // One requested side wins, the other follows the source image's aspect ratio.
        (Some(w), None, Some((iw, ih))) => (
            clamp_dimension(w, max),
            clamp_dimension(derive_side(w, iw, ih), max),
        ),
        (None, Some(h), Some((iw, ih))) => (
            clamp_dimension(derive_side(h, ih, iw), max),
            clamp_dimension(h, max),
        ),
        _ => requested_dimensions(request, max),
    };

    let coherence = options.coherence.clamp(0.0, 1.0);
    let mut body = json!({
        "image_urls": inputs.images,
        "prompt": request.prompt,
        "instruction": request.prompt,
        "edit_mode": options.edit_type.as_str(),
        "strength": number(options.strength.clamp(0.0, 1.0)),
        "coherence_factor": number(coherence),
        "guidance_scale": number(
            request.guidance_scale.unwrap_or(coherence * 10.0).clamp(1.0, 30.0)
        ),
        "auto_detect_region": options.auto_mask,
        "preserve_original_style": options.preserve_style,
        "image_size": { "width": width, "height": height },
    });
    let map = object(&mut body);
    insert_common_optionals(map, request);
    if let Some(mask) = &inputs.mask {
        map.insert("mask".into(), json!(mask));
    }
    map.extend(edit_type_params(&options.edit_type));

    Ok(BuiltPayload {
        body,
        width,
        height,
    })
}

fn product_shoot(
    spec: &ModelSpec,
    request: &GenerationRequest,
    options: &ProductShootOptions,
    inputs: &WireInputs,
) -> Result<BuiltPayload> {
    if inputs.images.is_empty() {
        return Err(invalid("At least one product image is required"));
    }

    let (base_width, base_height) = options.output_format.base_dimensions();
    let scale = options.resolution.scale();
    let (width, height) = fit_dimensions(
        (f64::from(base_width) * scale) as u32,
        (f64::from(base_height) * scale) as u32,
        spec.max_dimension,
    );

    let mut body = json!({
        "product_images": inputs.images,
        "category": options.category,
        "description": request.prompt,
        "scene_type": options.scene_type,
        "background": {
            "style": options.background_style,
            "remove_original": options.remove_background,
            "preserve_shadows": options.preserve_shadows,
        },
        "lighting": {
            "setup": options.lighting_setup,
            "intensity": 1.0,
            "color_temperature": "neutral",
        },
        "output": {
            "width": width,
            "height": height,
            "format": "png",
            "quality": 95,
        },
        "batch_size": options.batch_size.clamp(1, MAX_BATCH_SIZE),
        "variations": options.generate_variations,
        "effects": {
            "reflection_intensity": number(options.reflection_intensity.clamp(0.0, 1.0)),
            "add_watermark": options.add_watermark,
        },
    });
    let map = object(&mut body);
    insert_common_optionals(map, request);

    if let Some(props) = options.props.as_deref() {
        let props: Vec<&str> = props
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if !props.is_empty() {
            map.insert("props".into(), json!(props));
        }
    }
    if let Some(palette) = options.color_palette.as_ref().filter(|p| !p.is_empty()) {
        map.insert("color_palette".into(), json!(palette));
    }
    if let Some(settings) = scene_settings(&options.scene_type) {
        map.insert("scene_settings".into(), settings);
    }

    Ok(BuiltPayload {
        body,
        width,
        height,
    })
}

fn image_to_video(
    request: &GenerationRequest,
    options: &VideoOptions,
    inputs: &WireInputs,
) -> Result<BuiltPayload> {
    let (primary, _) = split_primary(inputs)?;
    let (width, height) =
        reference_aspect_ratio(&options.aspect_ratio).unwrap_or((DEFAULT_DIMENSION, DEFAULT_DIMENSION));

    let mut body = json!({
        "prompt": request.prompt,
        "image_url": primary,
        "duration": options.duration_seconds.clamp(1, 10).to_string(),
        "aspect_ratio": options.aspect_ratio,
        "resolution": options.resolution,
    });
    insert_common_optionals(object(&mut body), request);

    Ok(BuiltPayload {
        body,
        width,
        height,
    })
}

/// Clamp a single side to `[64, max]` and round it down to a multiple of 8.
pub fn clamp_dimension(value: u32, max: u32) -> u32 {
    let max = max.clamp(MIN_DIMENSION, MAX_DIMENSION);
    let clamped = value.clamp(MIN_DIMENSION, max);
    clamped / DIMENSION_ALIGNMENT * DIMENSION_ALIGNMENT
}

/// Scale a table-derived size down so its long side fits `max`, keeping the aspect
/// ratio, then clamp and align each side.
pub fn fit_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let max = max.clamp(MIN_DIMENSION, MAX_DIMENSION);
    let long_side = width.max(height);
    if long_side <= max {
        return (clamp_dimension(width, max), clamp_dimension(height, max));
    }
    let ratio = f64::from(max) / f64::from(long_side);
    let scaled_width = (f64::from(width) * ratio).round() as u32;
    let scaled_height = (f64::from(height) * ratio).round() as u32;
    (
        clamp_dimension(scaled_width, max),
        clamp_dimension(scaled_height, max),
    )
}

fn derive_side(known: u32, known_source: u32, other_source: u32) -> u32 {
    let ratio = f64::from(other_source) / f64::from(known_source.max(1));
    (f64::from(known) * ratio).round() as u32
}

fn requested_dimensions(request: &GenerationRequest, max: u32) -> (u32, u32) {
    (
        clamp_dimension(request.width.unwrap_or(DEFAULT_DIMENSION), max),
        clamp_dimension(request.height.unwrap_or(DEFAULT_DIMENSION), max),
    )
}

fn text_aspect_ratio(ratio: &str) -> Option<(u32, u32)> {
    match ratio {
        "1:1" => Some((1024, 1024)),
        "16:9" => Some((1344, 768)),
        "9:16" => Some((768, 1344)),
        "4:3" => Some((1152, 896)),
        "3:4" => Some((896, 1152)),
        _ => None,
    }
}

fn reference_aspect_ratio(ratio: &str) -> Option<(u32, u32)> {
    match ratio {
        "1:1" => Some((1024, 1024)),
        "16:9" => Some((1920, 1080)),
        "9:16" => Some((1080, 1920)),
        "4:3" => Some((1024, 768)),
        "3:2" => Some((1152, 768)),
        _ => None,
    }
}

/// Extra fields merged into an edit payload for each known edit type.
pub fn edit_type_params(edit_type: &EditType) -> Map<String, Value> {
    let params = match edit_type {
        EditType::ObjectRemoval => json!({ "inpaint_mode": "remove", "edge_blend": 0.2 }),
        EditType::ObjectReplacement => json!({ "inpaint_mode": "replace", "context_aware": true }),
        EditType::BackgroundChange => json!({ "segment_mode": "background", "blend_edges": true }),
        EditType::StyleTransfer => {
            json!({ "style_preservation": 0.3, "content_preservation": 0.7 })
        }
        EditType::ColorAdjustment => {
            json!({ "color_mode": "adaptive", "preserve_luminance": true })
        }
        EditType::Auto | EditType::Other(_) => return Map::new(),
    };
    match params {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn scene_settings(scene_type: &str) -> Option<Value> {
    let settings = match scene_type {
        "studio" => json!({ "background_blur": 0, "shadow_intensity": 0.5 }),
        "lifestyle" => json!({ "context_blend": 0.7, "natural_lighting": true }),
        "outdoor" => json!({ "environment": "natural", "time_of_day": "golden_hour" }),
        "minimalist" => json!({ "simplicity": 1.0, "negative_space": 0.6 }),
        "luxury" => json!({ "premium_finish": true, "glamour_lighting": true }),
        _ => return None,
    };
    Some(settings)
}

/// Common sampler names to the scheduler names Stable Diffusion endpoints expect.
pub fn map_sampler(sampler: &str) -> &'static str {
    match sampler {
        "DPM++ 2M Karras" => "DPMSolverMultistep",
        "Euler a" => "EulerAncestralDiscrete",
        "Euler" => "EulerDiscrete",
        "DDIM" => "DDIM",
        "LMS" => "LMSDiscrete",
        "PNDM" => "PNDM",
        "DDPM" => "DDPM",
        _ => "DPMSolverMultistep",
    }
}

fn insert_common_optionals(map: &mut Map<String, Value>, request: &GenerationRequest) {
    if let Some(negative) = request
        .negative_prompt
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        map.insert("negative_prompt".into(), json!(negative));
    }
    if let Some(seed) = request.seed.filter(|seed| *seed != UNSET_SEED) {
        map.insert("seed".into(), json!(seed));
    }
}

fn split_primary(inputs: &WireInputs) -> Result<(&String, &[String])> {
    inputs
        .images
        .split_first()
        .ok_or_else(|| invalid("A source image is required"))
}

/// `f32` parameters go on the wire rounded to 6 decimals so `0.3` stays `0.3`.
fn number(value: f32) -> Value {
    json!((f64::from(value) * 1e6).round() / 1e6)
}

fn object(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("payloads are always built from json objects"),
    }
}

fn invalid(message: impl Into<String>) -> GenerationError {
    GenerationError::ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::resolve;
    use crate::models::{ImageInput, OperationKind, ProductFormat, ProductResolution};

    fn spec_for(request: &GenerationRequest) -> ModelSpec {
        resolve(request.model.as_deref(), request.kind()).unwrap()
    }

    fn wire(count: usize) -> WireInputs {
        WireInputs {
            images: (0..count)
                .map(|i| format!("https://img.example/{}.png", i))
                .collect(),
            mask: None,
            primary_size: None,
        }
    }

    fn build(request: &GenerationRequest, inputs: &WireInputs) -> BuiltPayload {
        build_payload(&spec_for(request), request, inputs).unwrap()
    }

    fn emitted_dimensions(body: &Value) -> (u64, u64) {
        let holder = body
            .get("image_size")
            .or_else(|| body.get("output"))
            .unwrap_or(body);
        (
            holder["width"].as_u64().unwrap(),
            holder["height"].as_u64().unwrap(),
        )
    }

    #[test]
    fn test_clamps_and_aligns_requested_size() {
        let request = GenerationRequest::text_to_image("a cat").with_size(1025, 1030);
        let payload = build(&request, &WireInputs::default());
        assert_eq!(payload.body["image_size"], json!({"width": 1024, "height": 1024}));
        assert_eq!((payload.width, payload.height), (1024, 1024));
    }

    #[test]
    fn test_dimensions_always_aligned_and_in_range() {
        let sizes = [0, 1, 63, 64, 65, 100, 513, 1023, 1999, 2047, 2048, 2049, 5000, u32::MAX];
        let requests = [
            GenerationRequest::text_to_image("p"),
            GenerationRequest::text_to_image("p").with_model("sd15"),
            GenerationRequest::image_to_image("p", ImageInput::from_url("u")),
            GenerationRequest::edit("p", ImageInput::from_url("u")),
        ];
        for base in &requests {
            for &w in &sizes {
                for &h in &sizes {
                    let request = base.clone().with_size(w, h);
                    let payload = build(&request, &wire(1));
                    let (ew, eh) = emitted_dimensions(&payload.body);
                    for side in [ew, eh] {
                        assert_eq!(side % 8, 0, "{}x{} -> {}x{}", w, h, ew, eh);
                        assert!((64..=2048).contains(&side), "{}x{} -> {}x{}", w, h, ew, eh);
                    }
                }
            }
        }

        for format in [
            ProductFormat::Square,
            ProductFormat::Portrait,
            ProductFormat::Landscape,
            ProductFormat::Banner,
            ProductFormat::Story,
        ] {
            for resolution in [
                ProductResolution::Standard,
                ProductResolution::High,
                ProductResolution::Ultra,
            ] {
                let request = GenerationRequest::product_shoot("bag", "leather bag", ImageInput::from_url("u"))
                    .with_operation(Operation::ProductShoot(ProductShootOptions {
                        category: "bag".into(),
                        output_format: format,
                        resolution,
                        ..Default::default()
                    }));
                let (ew, eh) = emitted_dimensions(&build(&request, &wire(1)).body);
                assert!(ew % 8 == 0 && eh % 8 == 0);
                assert!((64..=2048).contains(&ew) && (64..=2048).contains(&eh));
            }
        }
    }

    #[test]
    fn test_model_specific_max_applies() {
        let request = GenerationRequest::text_to_image("p")
            .with_model("sd15")
            .with_size(1024, 512);
        let payload = build(&request, &WireInputs::default());
        assert_eq!(emitted_dimensions(&payload.body), (768, 512));
    }

    #[test]
    fn test_identical_requests_produce_identical_bytes() {
        let request = GenerationRequest::edit("make it blue", ImageInput::from_url("u"))
            .with_seed(42)
            .with_negative_prompt("blurry");
        let first = serde_json::to_vec(&build(&request, &wire(2)).body).unwrap();
        let second = serde_json::to_vec(&build(&request, &wire(2)).body).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seed_sentinel_and_negative_prompt() {
        let unset = GenerationRequest::text_to_image("p").with_seed(-1);
        assert!(build(&unset, &WireInputs::default()).body.get("seed").is_none());

        let zero = GenerationRequest::text_to_image("p").with_seed(0);
        assert_eq!(build(&zero, &WireInputs::default()).body["seed"], json!(0));

        let blank = GenerationRequest::text_to_image("p").with_negative_prompt("  ");
        assert!(build(&blank, &WireInputs::default())
            .body
            .get("negative_prompt")
            .is_none());
    }

    #[test]
    fn test_text_to_image_style_and_aspect_ratio() {
        let request = GenerationRequest::text_to_image("a lighthouse").with_operation(
            Operation::TextToImage(TextToImageOptions {
                aspect_ratio: Some("16:9".into()),
                style: Some("oil painting".into()),
                ..Default::default()
            }),
        );
        let body = build(&request, &WireInputs::default()).body;
        assert_eq!(body["prompt"], "a lighthouse, oil painting");
        assert_eq!(body["image_size"], json!({"width": 1344, "height": 768}));
        assert!(body.get("scheduler").is_none());
    }

    #[test]
    fn test_stable_diffusion_gets_scheduler_and_safety_flag() {
        let request = GenerationRequest::text_to_image("p")
            .with_model("sdxl")
            .with_operation(Operation::TextToImage(TextToImageOptions {
                sampler: Some("Euler a".into()),
                ..Default::default()
            }));
        let body = build(&request, &WireInputs::default()).body;
        assert_eq!(body["scheduler"], "EulerAncestralDiscrete");
        assert_eq!(body["enable_safety_checker"], false);
        assert_eq!(map_sampler("something else"), "DPMSolverMultistep");
    }

    #[test]
    fn test_reference_payload_carries_references_and_envelope() {
        let request = GenerationRequest::image_to_image("anime style", ImageInput::from_url("u"))
            .with_guidance_scale(50.0);
        let body = build(&request, &wire(3)).body;

        assert_eq!(body["image_url"], "https://img.example/0.png");
        assert_eq!(
            body["reference_images"],
            json!(["https://img.example/1.png", "https://img.example/2.png"])
        );
        assert_eq!(body["guidance_scale"], json!(20.0));
        assert_eq!(body["input"]["prompt"], "anime style");
        assert!(body["input"].get("input").is_none());

        let single = build(&request, &wire(1)).body;
        assert!(single.get("reference_images").is_none());
    }

    #[test]
    fn test_reference_aspect_ratio_overrides_size() {
        let request = GenerationRequest::image_to_image("p", ImageInput::from_url("u"))
            .with_size(512, 512)
            .with_operation(Operation::ImageToImage(ReferenceOptions {
                aspect_ratio: "9:16".into(),
                ..Default::default()
            }));
        let body = build(&request, &wire(1)).body;
        assert_eq!((body["width"].clone(), body["height"].clone()), (json!(1080), json!(1920)));
    }

    #[test]
    fn test_edit_type_table_is_merged() {
        let removal = GenerationRequest::edit("remove the car", ImageInput::from_url("u"))
            .with_mask(ImageInput::from_url("m"))
            .with_operation(Operation::Edit(EditOptions {
                edit_type: EditType::ObjectRemoval,
                strength: 1.7,
                ..Default::default()
            }));
        let mut inputs = wire(1);
        inputs.mask = Some("https://img.example/mask.png".into());
        let body = build(&removal, &inputs).body;
        assert_eq!(body["edge_blend"], json!(0.2));
        assert_eq!(body["inpaint_mode"], "remove");
        assert_eq!(body["strength"], json!(1.0));
        assert_eq!(body["mask"], "https://img.example/mask.png");
        assert_eq!(body["edit_mode"], "object_removal");

        let style = edit_type_params(&EditType::StyleTransfer);
        assert_eq!(style["style_preservation"], json!(0.3));
        assert_eq!(style["content_preservation"], json!(0.7));

        assert!(edit_type_params(&EditType::Other("sharpen".into())).is_empty());
        assert!(edit_type_params(&EditType::Auto).is_empty());
    }

    #[test]
    fn test_edit_uses_primary_image_size_when_unset() {
        let request = GenerationRequest::edit("brighter", ImageInput::from_bytes(vec![1]));
        let mut inputs = wire(1);
        inputs.primary_size = Some((801, 601));
        let body = build(&request, &inputs).body;
        assert_eq!(body["image_size"], json!({"width": 800, "height": 600}));
    }

    #[test]
    fn test_edit_single_requested_side_keeps_source_aspect() {
        let mut inputs = wire(1);
        inputs.primary_size = Some((1200, 800));
        let mut request = GenerationRequest::edit("brighter", ImageInput::from_bytes(vec![1]));
        request.width = Some(600);
        let body = build(&request, &inputs).body;
        assert_eq!(body["image_size"], json!({"width": 600, "height": 400}));

        inputs.primary_size = Some((1024, 768));
        let mut request = GenerationRequest::edit("brighter", ImageInput::from_bytes(vec![1]));
        request.height = Some(512);
        let body = build(&request, &inputs).body;
        assert_eq!(body["image_size"], json!({"width": 680, "height": 512}));

        inputs.primary_size = None;
        let body = build(&request, &inputs).body;
        assert_eq!(body["image_size"], json!({"width": 1024, "height": 512}));
    }

    #[test]
    fn test_product_dimensions_follow_format_and_resolution() {
        let make = |format, resolution| {
            GenerationRequest::product_shoot("mug", "ceramic mug", ImageInput::from_url("u"))
                .with_operation(Operation::ProductShoot(ProductShootOptions {
                    category: "mug".into(),
                    output_format: format,
                    resolution,
                    props: Some("coffee beans, , saucer".into()),
                    ..Default::default()
                }))
        };

        let body = build(&make(ProductFormat::Portrait, ProductResolution::Standard), &wire(1)).body;
        assert_eq!((body["output"]["width"].clone(), body["output"]["height"].clone()), (json!(768), json!(1024)));
        assert_eq!(body["props"], json!(["coffee beans", "saucer"]));
        assert_eq!(body["scene_settings"]["shadow_intensity"], json!(0.5));
        assert_eq!(body["description"], "ceramic mug");

        // 1024 * 1.875 = 1920
        let body = build(&make(ProductFormat::Square, ProductResolution::High), &wire(1)).body;
        assert_eq!(body["output"]["width"], json!(1920));

        // 1920x1080 * 3.75 exceeds the cap and is scaled down keeping 16:9
        let body = build(&make(ProductFormat::Banner, ProductResolution::Ultra), &wire(1)).body;
        assert_eq!(body["output"]["width"], json!(2048));
        assert_eq!(body["output"]["height"], json!(1152));
    }

    #[test]
    fn test_video_payload() {
        let request = GenerationRequest::image_to_video("waves crashing", ImageInput::from_url("u"))
            .with_seed(7);
        let body = build(&request, &wire(1)).body;
        assert_eq!(body["image_url"], "https://img.example/0.png");
        assert_eq!(body["duration"], "5");
        assert_eq!(body["aspect_ratio"], "16:9");
        assert_eq!(body["seed"], json!(7));
    }

    #[test]
    fn test_validation_rejects_unfixable_requests() {
        let empty = GenerationRequest::text_to_image("   ");
        assert!(validate(&empty).is_err());

        let mut no_image = GenerationRequest::edit("x", ImageInput::from_url("u"));
        no_image.images.clear();
        let err = validate(&no_image).unwrap_err();
        assert!(err.to_string().contains("image-edit"));

        let batch = GenerationRequest::product_shoot("c", "d", ImageInput::from_url("u"))
            .with_operation(Operation::ProductShoot(ProductShootOptions {
                category: "c".into(),
                batch_size: 11,
                ..Default::default()
            }));
        assert!(validate(&batch).is_err());

        let masked = GenerationRequest::text_to_image("p").with_mask(ImageInput::from_url("m"));
        assert!(validate(&masked).is_err());

        let nan = GenerationRequest::text_to_image("p").with_guidance_scale(f32::NAN);
        assert!(validate(&nan).is_err());

        assert!(validate(&GenerationRequest::text_to_image("ok")).is_ok());
        assert_eq!(OperationKind::ImageEdit.as_str(), "image-edit");
    }

    #[test]
    fn test_strategy_mismatch_is_rejected() {
        let request = GenerationRequest::text_to_image("p");
        let spec = resolve(None, OperationKind::ImageEdit).unwrap();
        assert!(build_payload(&spec, &request, &WireInputs::default()).is_err());
    }
}
