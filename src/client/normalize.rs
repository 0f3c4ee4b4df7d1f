//! Turns the many response shapes the service uses into one list of [`ImageRef`]s.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::models::ImageRef;

/// Fields that hold produced media, in lookup order.
const MEDIA_KEYS: &[&str] = &["images", "image", "video", "data"];
/// Wrappers some endpoints nest their output under.
const NESTED_KEYS: &[&str] = &["output", "result", "data"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    pub images: Vec<ImageRef>,
    pub seed: Option<i64>,
    pub has_nsfw_concepts: bool,
    pub timings: Option<Value>,
    pub diagnostic: Option<String>,
}

pub fn normalize_response(body: &Value) -> NormalizedResponse {
    let mut images = Vec::new();
    collect_media(body, &mut images);
    if images.is_empty() {
        for key in NESTED_KEYS {
            if let Some(nested) = body.get(*key).filter(|v| v.is_object()) {
                collect_media(nested, &mut images);
            }
        }
    }

    let diagnostic = if images.is_empty() {
        let keys = body
            .as_object()
            .map(|map| map.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        log::warn!("No image found in response (keys: [{}])", keys);
        Some(format!("No image found in response (keys: [{}])", keys))
    } else {
        None
    };

    NormalizedResponse {
        images,
        seed: lookup(body, "seed").and_then(Value::as_i64),
        has_nsfw_concepts: lookup(body, "has_nsfw_concepts")
            .map(nsfw_flag)
            .unwrap_or(false),
        timings: lookup(body, "timings").cloned(),
        diagnostic,
    }
}

fn collect_media(container: &Value, out: &mut Vec<ImageRef>) {
    for key in MEDIA_KEYS {
        match container.get(*key) {
            Some(Value::Array(items)) => items.iter().for_each(|item| push_ref(item, out)),
            Some(item) => push_ref(item, out),
            None => {}
        }
    }
}

fn push_ref(value: &Value, out: &mut Vec<ImageRef>) {
    let Some(image) = image_ref(value) else {
        return;
    };
    if let Some(url) = image.url() {
        if out.iter().any(|existing| existing.url() == Some(url)) {
            return;
        }
    }
    out.push(image);
}

fn image_ref(value: &Value) -> Option<ImageRef> {
    match value {
        Value::String(raw) => from_string(raw, None),
        Value::Object(map) => {
            let content_type = map
                .get("content_type")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(url) = map.get("url").and_then(Value::as_str) {
                return from_string(url, content_type);
            }
            let encoded = ["b64_json", "base64", "data"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))?;
            if encoded.starts_with("data:") {
                return from_string(encoded, content_type);
            }
            match STANDARD.decode(encoded.trim()) {
                Ok(bytes) => Some(ImageRef::Data {
                    bytes,
                    content_type,
                }),
                Err(e) => {
                    log::warn!("Skipping undecodable base64 image ({} chars): {}", encoded.len(), e);
                    None
                }
            }
        }
        _ => None,
    }
}

fn from_string(raw: &str, content_type: Option<String>) -> Option<ImageRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("data:") {
        return decode_data_uri(raw);
    }
    Some(ImageRef::Url {
        url: raw.to_string(),
        content_type,
    })
}

fn decode_data_uri(uri: &str) -> Option<ImageRef> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    if !header.ends_with(";base64") {
        log::warn!("Skipping non-base64 data URI ({} chars)", uri.len());
        return None;
    }
    let mime = header.trim_end_matches(";base64");
    match STANDARD.decode(payload) {
        Ok(bytes) => Some(ImageRef::Data {
            bytes,
            content_type: (!mime.is_empty()).then(|| mime.to_string()),
        }),
        Err(e) => {
            log::warn!("Skipping undecodable data URI ({} chars): {}", uri.len(), e);
            None
        }
    }
}

fn lookup<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key).or_else(|| {
        NESTED_KEYS
            .iter()
            .find_map(|nested| body.get(*nested).and_then(|inner| inner.get(key)))
    })
}

fn nsfw_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Array(flags) => flags.first().and_then(Value::as_bool).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_images_array_of_objects() {
        let normalized = normalize_response(&json!({"images": [{"url": "http://x/1.png"}]}));
        assert_eq!(normalized.images.len(), 1);
        assert_eq!(normalized.images[0].url(), Some("http://x/1.png"));
        assert!(normalized.diagnostic.is_none());
    }

    #[test]
    fn test_singular_image_string() {
        let normalized = normalize_response(&json!({"image": "http://x/2.png"}));
        assert_eq!(normalized.images.len(), 1);
        assert_eq!(normalized.images[0].url(), Some("http://x/2.png"));
    }

    #[test]
    fn test_empty_body_yields_diagnostic() {
        let normalized = normalize_response(&json!({}));
        assert!(normalized.images.is_empty());
        assert!(normalized.diagnostic.is_some());

        let normalized = normalize_response(&json!({"status": "done", "images": []}));
        assert!(normalized.diagnostic.unwrap().contains("status"));
    }

    #[test]
    fn test_nested_output_and_video() {
        let normalized = normalize_response(&json!({
            "output": {"images": ["https://cdn/a.png", "https://cdn/a.png", "https://cdn/b.png"]}
        }));
        assert_eq!(normalized.images.len(), 2);

        let normalized = normalize_response(&json!({
            "video": {"url": "https://cdn/clip.mp4", "content_type": "video/mp4"}
        }));
        assert_eq!(normalized.images[0].content_type(), Some("video/mp4"));
    }

    #[test]
    fn test_inline_data_is_decoded() {
        let normalized = normalize_response(&json!({
            "images": ["data:image/png;base64,AQID"],
            "data": [{"b64_json": "BAUG"}]
        }));
        assert_eq!(normalized.images.len(), 2);
        assert_eq!(normalized.images[0].bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(normalized.images[0].content_type(), Some("image/png"));
        assert_eq!(normalized.images[1].bytes(), Some(&[4u8, 5, 6][..]));
    }

    #[test]
    fn test_seed_nsfw_and_timings() {
        let normalized = normalize_response(&json!({
            "images": [{"url": "https://cdn/a.png", "content_type": "image/jpeg"}],
            "seed": 1234,
            "has_nsfw_concepts": [true],
            "timings": {"inference": 1.2}
        }));
        assert_eq!(normalized.seed, Some(1234));
        assert!(normalized.has_nsfw_concepts);
        assert_eq!(normalized.timings, Some(json!({"inference": 1.2})));
        assert_eq!(normalized.images[0].content_type(), Some("image/jpeg"));
    }

    #[test]
    fn test_unusable_entries_are_skipped() {
        let normalized = normalize_response(&json!({
            "images": [null, 5, "", {"b64_json": "%%%"}, "data:text/plain,hello"]
        }));
        assert!(normalized.images.is_empty());
        assert!(normalized.diagnostic.is_some());
    }
}
