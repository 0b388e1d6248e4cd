//! Request validation and lookup keys
//!
//! Every identify and correction request goes through [`prepare`] first.
//! Validation failures come back as `Error::InvalidInput` (HTTP 400).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use teed_common::{Error, Result};

use crate::links::{parse_product_url, ParsedUrl};
use crate::text::{normalize_text, parse_text, ParsedText};
use crate::types::{Category, IdentifyInput, IdentifyRequest};

/// Largest accepted decoded image
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Longest accepted text description, in characters
pub const MAX_TEXT_CHARS: usize = 2000;

/// Decoded image ready for a vision model
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub mime: String,
    /// Standard base64 of the raw bytes, without a `data:` prefix
    pub base64: String,
    pub size: usize,
    /// Hex SHA-256 of the decoded bytes
    pub sha256: String,
}

impl ImagePayload {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

#[derive(Debug, Clone)]
pub enum PreparedInput {
    Text(ParsedText),
    Url(ParsedUrl),
    Image(ImagePayload),
}

/// A validated request plus its correction/telemetry key
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub input: PreparedInput,
    pub key: String,
    pub context: Option<String>,
    pub category_hint: Option<Category>,
}

impl PreparedRequest {
    pub fn kind(&self) -> &'static str {
        match self.input {
            PreparedInput::Text(_) => "text",
            PreparedInput::Url(_) => "url",
            PreparedInput::Image(_) => "image",
        }
    }

    /// Free-text query for the library and web stages
    ///
    /// Images have none unless the caller supplied context.
    pub fn search_query(&self) -> Option<String> {
        let base = match &self.input {
            PreparedInput::Text(parsed) => Some(parsed.search_query()),
            PreparedInput::Url(parsed) => Some(parsed.search_query()),
            PreparedInput::Image(_) => None,
        };
        match (base, self.context.as_deref()) {
            (Some(query), _) => Some(query),
            (None, Some(context)) => Some(context.to_string()),
            (None, None) => None,
        }
    }

    /// Category from the caller's hint, else what the parser inferred
    pub fn category(&self) -> Option<Category> {
        self.category_hint.or(match &self.input {
            PreparedInput::Text(parsed) => parsed.category,
            PreparedInput::Url(parsed) => Some(parsed.category).filter(|c| *c != Category::Other),
            PreparedInput::Image(_) => None,
        })
    }

    /// Whether a correction recorded for a similar key may be reused
    pub fn allows_near_match(&self) -> bool {
        !matches!(self.input, PreparedInput::Image(_))
    }
}

/// Validate a request and derive its lookup key
pub fn prepare(request: &IdentifyRequest) -> Result<PreparedRequest> {
    let (input, key) = prepare_input(&request.input)?;

    let context = request
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let category_hint = request
        .category_hint
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .map(Category::from_label);

    Ok(PreparedRequest {
        input,
        key,
        context,
        category_hint,
    })
}

/// Validate one input and compute its key
pub fn prepare_input(input: &IdentifyInput) -> Result<(PreparedInput, String)> {
    match input {
        IdentifyInput::Text(text) => {
            let key = normalize_text(text);
            if key.is_empty() {
                return Err(Error::InvalidInput("Text input is empty".to_string()));
            }
            if text.chars().count() > MAX_TEXT_CHARS {
                return Err(Error::InvalidInput(format!(
                    "Text input longer than {} characters",
                    MAX_TEXT_CHARS
                )));
            }
            Ok((PreparedInput::Text(parse_text(text)), key))
        }
        IdentifyInput::Url(raw) => {
            let parsed = parse_product_url(raw).map_err(|e| Error::InvalidInput(e.to_string()))?;
            let key = parsed.input_key();
            Ok((PreparedInput::Url(parsed), key))
        }
        IdentifyInput::Image(payload) => {
            let image = decode_image(payload)?;
            let key = format!("sha256:{}", image.sha256);
            Ok((PreparedInput::Image(image), key))
        }
    }
}

/// Decode a base64 image or `data:` URL and check it really is an image
pub fn decode_image(payload: &str) -> Result<ImagePayload> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (_, data) = rest
                .split_once(";base64,")
                .ok_or_else(|| Error::InvalidInput("Image data URL must be base64 encoded".to_string()))?;
            data
        }
        None => payload,
    };
    if encoded.is_empty() {
        return Err(Error::InvalidInput("Image input is empty".to_string()));
    }
    // Reject before decoding anything far beyond the limit
    if encoded.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(Error::InvalidInput(format!(
            "Image larger than {} MiB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("Image is not valid base64: {}", e)))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::InvalidInput(format!(
            "Image larger than {} MiB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .ok_or_else(|| Error::InvalidInput("Payload is not a recognized image format".to_string()))?;

    Ok(ImagePayload {
        mime: mime.to_string(),
        base64: compact,
        size: bytes.len(),
        sha256: format!("{:x}", Sha256::digest(&bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 transparent PNG
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn request(input: IdentifyInput) -> IdentifyRequest {
        IdentifyRequest {
            input,
            context: None,
            category_hint: None,
        }
    }

    #[test]
    fn test_text_key_is_normalized() {
        let prepared = prepare(&request(IdentifyInput::Text("  Callaway   PARADYM driver!! ".into()))).unwrap();
        assert_eq!(prepared.key, "callaway paradym driver");
        assert_eq!(prepared.kind(), "text");
        assert!(prepared.allows_near_match());
    }

    #[test]
    fn test_empty_text_rejected() {
        let err = prepare(&request(IdentifyInput::Text("   ".into()))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_url_key_drops_www_and_query() {
        let prepared = prepare(&request(IdentifyInput::Url(
            "https://WWW.Nike.com/t/pegasus-41-mens-road-running-shoes/FD2722-002?color=black#reviews".into(),
        )))
        .unwrap();
        assert_eq!(prepared.key, "nike.com/t/pegasus-41-mens-road-running-shoes/fd2722-002");
    }

    #[test]
    fn test_url_category_from_domain() {
        let nike = prepare(&request(IdentifyInput::Url(
            "https://www.nike.com/t/pegasus-41-mens-road-running-shoes-abc123/FD2722-002".into(),
        )))
        .unwrap();
        assert_eq!(nike.category(), Some(Category::Footwear));

        let mut unknown = request(IdentifyInput::Url("https://example.org/p/widget".into()));
        assert_eq!(prepare(&unknown).unwrap().category(), None);
        unknown.category_hint = Some("kitchen".into());
        assert_eq!(prepare(&unknown).unwrap().category(), Some(Category::Kitchen));
    }

    #[test]
    fn test_bad_url_rejected() {
        let err = prepare(&request(IdentifyInput::Url("ftp://example.com/file".into()))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_image_data_url() {
        let data_url = format!("data:image/png;base64,{}", TINY_PNG);
        let prepared = prepare(&request(IdentifyInput::Image(data_url))).unwrap();
        assert!(prepared.key.starts_with("sha256:"));
        assert_eq!(prepared.key.len(), "sha256:".len() + 64);
        assert!(!prepared.allows_near_match());
        assert_eq!(prepared.search_query(), None);

        match prepared.input {
            PreparedInput::Image(image) => {
                assert_eq!(image.mime, "image/png");
                assert!(image.data_url().starts_with("data:image/png;base64,iVBOR"));
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_base64_same_key_as_data_url() {
        let raw = prepare(&request(IdentifyInput::Image(TINY_PNG.into()))).unwrap();
        let wrapped = prepare(&request(IdentifyInput::Image(format!("data:image/png;base64,{}", TINY_PNG)))).unwrap();
        assert_eq!(raw.key, wrapped.key);
    }

    #[test]
    fn test_non_image_rejected() {
        let text = STANDARD.encode(b"just some text, not an image");
        let err = prepare(&request(IdentifyInput::Image(text))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = prepare(&request(IdentifyInput::Image("%%%not-base64%%%".into()))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_oversized_image_rejected() {
        let big = "A".repeat(MAX_IMAGE_BYTES / 3 * 4 + 400);
        let err = prepare(&request(IdentifyInput::Image(big))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("MiB")));
    }

    #[test]
    fn test_image_search_query_uses_context() {
        let mut req = request(IdentifyInput::Image(TINY_PNG.into()));
        req.context = Some("  blue running shoe ".into());
        req.category_hint = Some("running".into());
        let prepared = prepare(&req).unwrap();
        assert_eq!(prepared.search_query().as_deref(), Some("blue running shoe"));
        assert_eq!(prepared.category(), Some(Category::Running));
    }
}
