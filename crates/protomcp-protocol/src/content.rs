//! Polymorphic content elements ("duck-typed content").
//!
//! Tool results, prompt messages, and sampling payloads all carry arrays of
//! `content`, where each element's shape is selected by a `type`
//! discriminator. Decoding peeks that discriminator (or, for resource
//! contents, the presence of `text`/`blob`/`audio`) rather than relying on
//! serde's `#[serde(tag = "type")]`, because a bare string is also accepted
//! as an implicit text element (a pattern the legacy protocol version leans
//! on for sampling results).
//!
//! Resource contents discriminate on whichever of `text`/`blob`/`audio` is
//! present; at most one is expected to be set on any given element.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One element of a `content[]` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
    },
    /// A base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type, e.g. `image/png`.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// A base64-encoded audio clip.
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        /// MIME type, e.g. `audio/wav`.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource, discriminated by which of `text`/`blob` is
    /// present.
    Resource {
        /// The embedded resource body.
        resource: ResourceContents,
    },
}

/// The body of an embedded resource content element.
///
/// Discriminates on which non-empty field is present: a resource with a
/// `text` field is textual, one with `blob` is binary, one with `audio`
/// is an audio clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// The resource's URI.
    pub uri: String,
    /// MIME type, if known.
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    /// Present for textual resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Present for binary resources, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
    /// Present for audio resources, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl Content {
    /// Build a text content element.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    /// Decode one array element of a `content[]` field, tolerating a bare
    /// string as an implicit text element, and skipping (with a warning)
    /// any element whose `type` tag is unrecognized rather than failing
    /// the whole array.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Value::String(s) = value {
            return Some(Self::text(s.clone()));
        }
        let Some(obj) = value.as_object() else {
            warn!(?value, "content element is neither a string nor an object");
            return None;
        };
        if let Some(ty) = obj.get("type").and_then(Value::as_str) {
            match serde_json::from_value::<Self>(value.clone()) {
                Ok(content) => return Some(content),
                Err(err) => {
                    warn!(%ty, %err, "failed to decode content element of known type");
                    return None;
                }
            }
        }
        // No discriminator: fall back to resource-contents field sniffing.
        if obj.contains_key("uri")
            && (obj.contains_key("text") || obj.contains_key("blob") || obj.contains_key("audio"))
        {
            return serde_json::from_value(value.clone())
                .ok()
                .map(|resource| Self::Resource { resource });
        }
        warn!(?value, "content element has no recognizable discriminator, skipping");
        None
    }

    /// Decode a whole `content[]` array, dropping unrecognized elements.
    pub fn array_from_value(value: &Value) -> Vec<Self> {
        match value.as_array() {
            Some(items) => items.iter().filter_map(Self::from_value).collect(),
            None => {
                warn!(?value, "expected a content array");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_becomes_text_content() {
        let v = json!("hello");
        assert_eq!(Content::from_value(&v), Some(Content::text("hello")));
    }

    #[test]
    fn unknown_type_is_skipped() {
        let v = json!({"type": "video", "data": "xyz"});
        assert_eq!(Content::from_value(&v), None);
    }

    #[test]
    fn resource_content_discriminates_on_text_field() {
        let v = json!({
            "type": "resource",
            "resource": {"uri": "file:///a.txt", "text": "hi"}
        });
        let content = Content::from_value(&v).unwrap();
        match content {
            Content::Resource { resource } => assert_eq!(resource.text.as_deref(), Some("hi")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn array_skips_unknown_and_keeps_known() {
        let v = json!([
            {"type": "text", "text": "a"},
            {"type": "mystery"},
            "b",
        ]);
        let items = Content::array_from_value(&v);
        assert_eq!(items, vec![Content::text("a"), Content::text("b")]);
    }
}
