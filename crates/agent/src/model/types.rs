use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// An image attached to a message, either remote or an embedded `data:` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    /// Label shown next to the image, e.g. the camera it came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
        }
    }

    pub fn named(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: Some(name.into()),
        }
    }

    /// Splits a base64 `data:` URL into media type and payload.
    pub fn as_base64(&self) -> Option<(&str, &str)> {
        let rest = self.url.strip_prefix("data:")?;
        let (media_type, data) = rest.split_once(";base64,")?;
        Some((media_type, data))
    }
}

/// A part of a message: plain text or an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    Image(ImageRef),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::user_parts(vec![Part::Text(text.into())])
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all images from this message.
    pub fn images(&self) -> Vec<&ImageRef> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Image(image) => Some(image),
                _ => None,
            })
            .collect()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub messages: &'a [Message],
    /// Constrains the reply to this JSON schema when the provider supports it.
    pub json_schema: Option<&'a Value>,
    pub max_tokens: u32,
}

/// The reply from a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// The whole reply parsed as a JSON object, if it is one.
    pub json: Option<Value>,
    pub usage: Usage,
}

impl Generation {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let json = serde_json::from_str::<Value>(text.trim())
            .ok()
            .filter(Value::is_object);
        Self {
            text,
            json,
            usage: Usage::default(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Trait for vision-model provider backends.
pub trait Backend: Send + Sync {
    fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> impl Future<Output = Result<Generation, ModelError>> + Send;
}
