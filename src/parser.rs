// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing for ChatGPT conversation exports.
//!
//! This module handles deserialization of the `conversations.json` file
//! produced by ChatGPT's data export. The file is a list of conversations,
//! each holding a tree-shaped message graph keyed by opaque node ids.
//!
//! # Format Overview
//!
//! A conversation record contains:
//! - A free-form title
//! - Creation and last-update times (epoch seconds, possibly fractional)
//! - A `mapping` from node id to node, where each node may carry a message
//! - Each message has an author and a content object tagged by `content_type`
//!
//! Parsing is lenient: absent or wrongly-typed fields fall back to defaults
//! so that a single odd node never prevents the rest of an export from
//! being converted. The order of `mapping` entries is kept exactly as it
//! appears in the file.
//!
//! # Example
//!
//! ```
//! use chatgpt2md::parser::{Content, parse_export};
//!
//! let json = r#"[{
//!     "title": "Hello",
//!     "create_time": 1630454400,
//!     "update_time": 1630458000,
//!     "mapping": {
//!         "a": { "message": {
//!             "author": { "role": "user" },
//!             "content": { "content_type": "text", "parts": ["Hi!"] }
//!         } }
//!     }
//! }]"#;
//!
//! let conversations = parse_export(json).unwrap();
//! assert_eq!(conversations.len(), 1);
//! let message = conversations[0].mapping[0].1.message.as_ref().unwrap();
//! assert!(matches!(message.content, Some(Content::Text { .. })));
//! ```

use serde::Deserialize;
use serde_json::{Number, Value};
use snafu::prelude::*;

/// Error type for JSON parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },

    /// The top-level JSON value is not a list of conversations.
    #[snafu(display("invalid argument: expected a list of conversations"))]
    NotAList,
}

/// One exported chat session.
///
/// Each conversation is rendered into exactly one Markdown document.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// The conversation title as shown in the ChatGPT sidebar.
    pub title: String,

    /// Unix timestamp in seconds when the conversation was created.
    pub create_time: f64,

    /// Unix timestamp in seconds when the conversation was last updated.
    pub update_time: f64,

    /// The message graph as `(node id, node)` pairs, in file order.
    ///
    /// This order is the document's message order; no sorting is applied.
    pub mapping: Vec<(String, Node)>,
}

/// One entry in a conversation's message graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    /// The message held by this node.
    ///
    /// Root and structural nodes usually have no message.
    pub message: Option<Message>,
}

/// A single message within the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Who produced the message.
    pub author: Author,

    /// The structured message content, if any.
    pub content: Option<Content>,
}

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// The speaker role, e.g. `"user"`, `"assistant"`, `"tool"` or `"system"`.
    pub role: String,

    /// An optional author name, e.g. the tool name `"browser"`.
    pub name: Option<String>,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            role: "unknown".into(),
            name: None,
        }
    }
}

/// Message content, tagged by its `content_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text split into parts.
    Text {
        /// The text parts, in order.
        parts: Vec<String>,
    },

    /// Source code, typically written by the assistant for a tool.
    Code {
        /// The declared language, e.g. `"python"`.
        language: String,
        /// The raw code.
        text: String,
    },

    /// The output of running code.
    ExecutionOutput {
        /// The raw output text.
        text: String,
    },

    /// A mix of text and attachments such as generated images.
    MultimodalText {
        /// The parts, in order.
        parts: Vec<MultimodalPart>,
    },

    /// A page rendered by the browsing tool.
    TetherBrowsingDisplay {
        /// The rendered page text.
        result: String,
    },

    /// A quote extracted from a web page by the browsing tool.
    TetherQuote {
        /// The page title.
        title: String,
        /// The page URL.
        url: String,
        /// The quoted text.
        text: String,
    },

    /// An error reported by the system or a tool.
    SystemError {
        /// The error name.
        name: String,
        /// The error description.
        text: String,
    },

    /// An unrecognized content type.
    ///
    /// This variant handles forward compatibility with content types that
    /// may be added to the export format in the future.
    Other {
        /// The declared `content_type`, or empty if none was given.
        content_type: String,
    },
}

/// One part of a [`Content::MultimodalText`] message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultimodalPart {
    /// A plain text part.
    Text(String),

    /// A pointer to an image asset.
    ImageAssetPointer {
        /// Image width in pixels, as the export wrote it.
        width: Number,
        /// Image height in pixels, as the export wrote it.
        height: Number,
        /// The image generation prompt, when the image was generated.
        prompt: Option<String>,
    },

    /// Any other part, identified only by its `content_type`.
    Other {
        /// The declared `content_type`, or empty if none was given.
        content_type: String,
    },
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if !value.is_object() {
            return Err(serde::de::Error::custom("conversation must be an object"));
        }

        let mapping = value
            .get("mapping")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
            .map(|(id, node)| (id.clone(), Node::deserialize(node).unwrap_or_default()))
            .collect();

        Ok(Self {
            title: get_string(&value, &["title"]).unwrap_or_default(),
            create_time: get_f64(&value, &["create_time"]).unwrap_or(0.0),
            update_time: get_f64(&value, &["update_time"]).unwrap_or(0.0),
            mapping,
        })
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let message = value
            .get("message")
            .filter(|m| m.is_object())
            .and_then(|m| Message::deserialize(m).ok());

        Ok(Self { message })
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let author = match get_string(&value, &["author", "role"]) {
            Some(role) => Author {
                role,
                name: get_string(&value, &["author", "name"]),
            },
            None => Author::default(),
        };

        let content = value
            .get("content")
            .filter(|c| c.is_object())
            .and_then(|c| Content::deserialize(c).ok());

        Ok(Self { author, content })
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let field = |name: &str| get_string(&value, &[name]).unwrap_or_default();

        let content_type = get_str(&value, &["content_type"]).unwrap_or_default();
        Ok(match content_type {
            "text" => Self::Text {
                parts: parts(&value)
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            },
            "code" => Self::Code {
                language: field("language"),
                text: field("text"),
            },
            "execution_output" => Self::ExecutionOutput {
                text: field("text"),
            },
            "multimodal_text" => Self::MultimodalText {
                parts: parts(&value).map(MultimodalPart::from_value).collect(),
            },
            "tether_browsing_display" => Self::TetherBrowsingDisplay {
                result: field("result"),
            },
            "tether_quote" => Self::TetherQuote {
                title: field("title"),
                url: field("url"),
                text: field("text"),
            },
            "system_error" => Self::SystemError {
                name: field("name"),
                text: field("text"),
            },
            other => Self::Other {
                content_type: other.to_owned(),
            },
        })
    }
}

impl MultimodalPart {
    fn from_value(value: &Value) -> Self {
        if let Some(text) = value.as_str() {
            return Self::Text(text.to_owned());
        }

        match get_str(value, &["content_type"]).unwrap_or_default() {
            "image_asset_pointer" => Self::ImageAssetPointer {
                width: get_number(value, &["width"]).unwrap_or_else(|| Number::from(0_u64)),
                height: get_number(value, &["height"]).unwrap_or_else(|| Number::from(0_u64)),
                prompt: get_string(value, &["metadata", "dalle", "prompt"]),
            },
            other => Self::Other {
                content_type: other.to_owned(),
            },
        }
    }
}

/// Iterates the `parts` array of a content object, if present.
fn parts(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .get("parts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Navigates a JSON path and returns the value at the end.
fn get<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}

/// Navigates a JSON path and returns the string value at the end.
///
/// # Arguments
///
/// * `value` - The root JSON value to navigate from
/// * `path` - A sequence of keys to follow through the JSON structure
fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    get(value, path)?.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

fn get_f64(value: &Value, path: &[&str]) -> Option<f64> {
    get(value, path)?.as_f64()
}

/// Returns the JSON number at the end of a path, keeping its original form.
fn get_number(value: &Value, path: &[&str]) -> Option<Number> {
    match get(value, path)? {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

/// Parses a JSON string into the list of [`Conversation`]s it contains.
///
/// This is the main entry point for parsing ChatGPT exports.
///
/// # Arguments
///
/// * `json_str` - The raw JSON content of a `conversations.json` export
///
/// # Errors
///
/// Returns [`ParseError::Json`] if the JSON is malformed or a conversation
/// entry is not an object, and [`ParseError::NotAList`] if the top-level
/// value is not an array.
///
/// # Example
///
/// ```
/// use chatgpt2md::parser::parse_export;
///
/// let conversations = parse_export(r#"[{"title": "Empty", "mapping": {}}]"#).unwrap();
/// assert_eq!(conversations[0].title, "Empty");
///
/// assert!(parse_export(r#"{"title": "Not a list"}"#).is_err());
/// ```
pub fn parse_export(json_str: &str) -> Result<Vec<Conversation>, ParseError> {
    let value: Value = serde_json::from_str(json_str).context(JsonSnafu)?;
    let Value::Array(items) = value else {
        return NotAListSnafu.fail();
    };

    items
        .iter()
        .map(|item| Conversation::deserialize(item).context(JsonSnafu))
        .collect()
}
