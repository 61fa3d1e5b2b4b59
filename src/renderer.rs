// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for parsed ChatGPT conversations.
//!
//! This module transforms a [`Conversation`] into a readable Markdown
//! [`Document`] together with the file name it should be stored under.
//!
//! # Output Format
//!
//! The rendered Markdown includes:
//! - A top-level `# <title>` heading, with HTML-like tags wrapped in backticks
//! - `- Created:` and `- Updated:` metadata lines
//! - One `## <role>` or `## <role> (<name>)` section per visible message
//!
//! User messages, and tool messages that are not already a fenced block,
//! are indented by four spaces so they render as preformatted text.
//!
//! # Example
//!
//! ```
//! use chatgpt2md::parser::{Author, Content, Conversation, Message, Node};
//! use chatgpt2md::renderer::{build_document, format_date};
//!
//! let conversation = Conversation {
//!     title: "Greetings".into(),
//!     create_time: 1630454400.0,
//!     update_time: 1630458000.0,
//!     mapping: vec![(
//!         "0".into(),
//!         Node {
//!             message: Some(Message {
//!                 author: Author { role: "user".into(), name: None },
//!                 content: Some(Content::Text { parts: vec!["Hello!".into()] }),
//!             }),
//!         },
//!     )],
//! };
//!
//! let document = build_document(&conversation, &format_date);
//!
//! assert_eq!(document.file_name, "Greetings.md");
//! assert!(document.content.starts_with("# Greetings\n"));
//! assert!(document.content.contains("## user\n\n    Hello!\n\n"));
//! ```

use crate::parser::{Content, Conversation, Message, MultimodalPart};
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

/// Characters that may not appear in a generated file name.
const UNSAFE_FILE_NAME_CHARS: [char; 11] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', ',', '\n'];

/// The code fence marker used for preformatted blocks.
const FENCE: &str = "```";

/// The `strftime` pattern used by [`format_date`], e.g. `01 Sep 2021 12:00 AM`.
pub const DEFAULT_DATE_FORMAT: &str = "%d %b %Y %I:%M %p";

/// A function that renders epoch seconds as display text.
pub type DateFormatter = dyn Fn(f64) -> String;

/// A rendered conversation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The sanitized file name, including the `.md` extension.
    pub file_name: String,

    /// The complete Markdown text.
    pub content: String,

    /// The conversation's creation time in epoch seconds, unconverted.
    pub create_time: f64,

    /// The conversation's last update time in epoch seconds, unconverted.
    pub update_time: f64,
}

/// Maps a free-form title to a name that is safe to use as a file name.
///
/// Each run of characters from `< > : " / \ | ? * ,` and newline becomes a
/// single space, and surrounding whitespace is trimmed.
///
/// # Example
///
/// ```
/// use chatgpt2md::renderer::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name(":/In\\<>*valid|?"), "In valid");
/// ```
#[must_use]
pub fn sanitize_file_name(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut in_unsafe_run = false;

    for c in title.chars() {
        if UNSAFE_FILE_NAME_CHARS.contains(&c) {
            if !in_unsafe_run {
                result.push(' ');
                in_unsafe_run = true;
            }
        } else {
            result.push(c);
            in_unsafe_run = false;
        }
    }

    result.trim().to_owned()
}

/// Wraps HTML-like tags in backticks so they render literally in Markdown.
///
/// A tag is a `<`, at least one character other than `>`, and the next `>`.
/// A `<` with no closing `>` after it is left untouched.
#[must_use]
pub fn wrap_html_tags(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    let mut rest = s;

    while let Some(start) = rest.find('<') {
        let (before, candidate) = rest.split_at(start);
        result.push_str(before);

        match candidate[1..].find('>') {
            Some(end) if end > 0 => {
                let tag_len = end + 2;
                result.push('`');
                result.push_str(&candidate[..tag_len]);
                result.push('`');
                rest = &candidate[tag_len..];
            }
            _ => {
                result.push('<');
                rest = &candidate[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Renders one message's content as a Markdown block.
///
/// Returns an empty string for unrecognized content types.
#[must_use]
pub fn render_content(content: &Content) -> String {
    match content {
        Content::Text { parts } => parts.join("\n"),
        Content::Code { language, text } => format!("{FENCE}{language}\n{text}\n{FENCE}"),
        Content::ExecutionOutput { text } => fenced(text),
        Content::MultimodalText { parts } => {
            let mut out = String::new();
            for part in parts {
                render_part(&mut out, part);
            }
            out
        }
        Content::TetherBrowsingDisplay { result } => fenced(result),
        Content::TetherQuote { title, url, text } => fenced(&format!("{title} ({url})\n\n{text}")),
        Content::SystemError { name, text } => format!("{name}\n\n{text}\n\n"),
        Content::Other { .. } => String::new(),
    }
}

fn render_part(out: &mut String, part: &MultimodalPart) {
    match part {
        MultimodalPart::Text(text) => writeln!(out, "{text}\n").unwrap(),
        MultimodalPart::ImageAssetPointer {
            width,
            height,
            prompt,
        } => writeln!(
            out,
            "Image ({width}x{height}): {}\n",
            prompt.as_deref().unwrap_or_default()
        )
        .unwrap(),
        MultimodalPart::Other { content_type } => writeln!(out, "{content_type}\n").unwrap(),
    }
}

/// Wraps text in an untagged code fence.
fn fenced(text: &str) -> String {
    format!("{FENCE}\n{text}\n{FENCE}")
}

/// Returns `true` if the body is already a single fenced block.
fn is_fenced(body: &str) -> bool {
    body.starts_with(FENCE) && body.ends_with(FENCE)
}

/// Prefixes every line with four spaces.
///
/// A trailing newline yields a trailing indented empty line.
#[must_use]
pub fn indent(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a message as a `## <role>` section.
///
/// Returns `None` when the message has no content or its rendered body is
/// blank, meaning the message contributes nothing to the document.
#[must_use]
pub fn render_message(message: &Message) -> Option<String> {
    let content = message.content.as_ref()?;
    let body = render_content(content);
    if body.trim().is_empty() {
        return None;
    }

    let role = message.author.role.as_str();
    let body = if role == "user" || (role == "tool" && !is_fenced(&body)) {
        indent(&body)
    } else {
        body
    };

    let mut out = format!("## {role}");
    if let Some(name) = message.author.name.as_deref().filter(|n| !n.is_empty()) {
        write!(out, " ({name})").unwrap();
    }
    write!(out, "\n\n{body}\n\n").unwrap();
    Some(out)
}

/// Renders a conversation as a complete Markdown document.
///
/// This is the main entry point for rendering. Messages appear in the
/// conversation's mapping order; nodes without a visible message are
/// skipped. The date formatter is called once for each timestamp and its
/// output is used verbatim.
///
/// # Arguments
///
/// * `conversation` - The parsed conversation to render
/// * `format_date` - Renders epoch seconds for the metadata lines
#[must_use]
pub fn build_document(conversation: &Conversation, format_date: &DateFormatter) -> Document {
    let mut content = String::new();
    writeln!(content, "# {}\n", wrap_html_tags(&conversation.title)).unwrap();
    writeln!(content, "- Created: {}", format_date(conversation.create_time)).unwrap();
    writeln!(content, "- Updated: {}\n", format_date(conversation.update_time)).unwrap();

    for (_, node) in &conversation.mapping {
        if let Some(section) = node.message.as_ref().and_then(render_message) {
            content.push_str(&section);
        }
    }

    Document {
        file_name: format!("{}.md", sanitize_file_name(&conversation.title)),
        content,
        create_time: conversation.create_time,
        update_time: conversation.update_time,
    }
}

/// Converts epoch seconds to a UTC date-time.
///
/// Fractional seconds are truncated toward the past, never rounded up, so
/// a time just before a minute boundary stays in that minute. Returns
/// `None` for non-finite or out-of-range values.
#[must_use]
pub fn timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = (((secs - whole) * 1e9) as u32).min(999_999_999);
    #[allow(clippy::cast_possible_truncation)]
    let whole = whole as i64;
    DateTime::from_timestamp(whole, nanos)
}

/// Formats epoch seconds with a `strftime` pattern.
///
/// Returns `None` if the timestamp is out of range or the pattern is invalid.
#[must_use]
pub fn format_timestamp(secs: f64, pattern: &str, local: bool) -> Option<String> {
    let dt = timestamp(secs)?;
    let mut out = String::new();
    let written = if local {
        write!(out, "{}", dt.with_timezone(&Local).format(pattern))
    } else {
        write!(out, "{}", dt.format(pattern))
    };
    written.ok().map(|()| out)
}

/// The default date formatter: `01 Sep 2021 12:00 AM`, in UTC.
///
/// Timestamps that cannot be represented are rendered as plain numbers.
#[must_use]
pub fn format_date(secs: f64) -> String {
    format_timestamp(secs, DEFAULT_DATE_FORMAT, false).unwrap_or_else(|| secs.to_string())
}

/// Like [`format_date`], but in the local time zone.
#[must_use]
pub fn format_date_local(secs: f64) -> String {
    format_timestamp(secs, DEFAULT_DATE_FORMAT, true).unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Author, Node};

    const CREATED: f64 = 1_630_454_400.0; // 2021-09-01 00:00:00 UTC
    const UPDATED: f64 = 1_630_458_000.0; // 2021-09-01 01:00:00 UTC

    fn message(role: &str, name: Option<&str>, content: Content) -> Message {
        Message {
            author: Author {
                role: role.into(),
                name: name.map(Into::into),
            },
            content: Some(content),
        }
    }

    fn text(parts: &[&str]) -> Content {
        Content::Text {
            parts: parts.iter().map(|&p| p.to_owned()).collect(),
        }
    }

    fn make_conversation(title: &str, messages: Vec<Option<Message>>) -> Conversation {
        Conversation {
            title: title.into(),
            create_time: CREATED,
            update_time: UPDATED,
            mapping: messages
                .into_iter()
                .enumerate()
                .map(|(i, message)| (i.to_string(), Node { message }))
                .collect(),
        }
    }

    fn render(conversation: &Conversation) -> String {
        build_document(conversation, &format_date).content
    }

    // Tests for sanitize_file_name
    #[test]
    fn sanitizes_invalid_characters() {
        assert_eq!(sanitize_file_name(":/In\\<>*valid|?"), "In valid");
        assert_eq!(sanitize_file_name("a\"b,c\nd"), "a b c d");
    }

    #[test]
    fn sanitizes_html_title() {
        assert_eq!(
            sanitize_file_name("<h1>Test Conversation</h1>"),
            "h1 Test Conversation h1"
        );
    }

    #[test]
    fn sanitized_names_have_no_unsafe_chars_or_padding() {
        for title in ["  a<b  ", "***", "x\ny", " ?lead", "trail: ", "plain"] {
            let name = sanitize_file_name(title);
            assert!(!name.contains(UNSAFE_FILE_NAME_CHARS), "{name:?}");
            assert_eq!(name, name.trim(), "{name:?}");
        }
    }

    #[test]
    fn sanitize_keeps_safe_titles() {
        assert_eq!(sanitize_file_name("Rust ownership"), "Rust ownership");
        assert_eq!(sanitize_file_name(""), "");
    }

    // Tests for wrap_html_tags
    #[test]
    fn wraps_html_tags() {
        assert_eq!(
            wrap_html_tags("<h1>Test Conversation</h1>"),
            "`<h1>`Test Conversation`</h1>`"
        );
        assert_eq!(wrap_html_tags("<br/>"), "`<br/>`");
    }

    #[test]
    fn leaves_unclosed_and_empty_brackets() {
        assert_eq!(wrap_html_tags("a < b"), "a < b");
        assert_eq!(wrap_html_tags("value<"), "value<");
        assert_eq!(wrap_html_tags("<>"), "<>");
        assert_eq!(wrap_html_tags(""), "");
    }

    #[test]
    fn wraps_from_first_open_bracket() {
        assert_eq!(wrap_html_tags("x << y > z"), "x `<< y >` z");
    }

    // Tests for render_content
    #[test]
    fn renders_text_parts_joined_by_newlines() {
        assert_eq!(render_content(&text(&["one", "two"])), "one\ntwo");
    }

    #[test]
    fn renders_code_block_with_language() {
        let content = Content::Code {
            language: "javascript".into(),
            text: "console.log(\"x\");".into(),
        };
        assert_eq!(
            render_content(&content),
            "```javascript\nconsole.log(\"x\");\n```"
        );
    }

    #[test]
    fn renders_execution_output_untagged() {
        let content = Content::ExecutionOutput { text: "42".into() };
        assert_eq!(render_content(&content), "```\n42\n```");
    }

    #[test]
    fn renders_tether_browsing_display() {
        let content = Content::TetherBrowsingDisplay {
            result: "L0: x".into(),
        };
        assert_eq!(render_content(&content), "```\nL0: x\n```");
    }

    #[test]
    fn renders_tether_quote() {
        let content = Content::TetherQuote {
            title: "T".into(),
            url: "x.com".into(),
            text: "X".into(),
        };
        assert_eq!(render_content(&content), "```\nT (x.com)\n\nX\n```");
    }

    #[test]
    fn renders_system_error_unfenced() {
        let content = Content::SystemError {
            name: "ChatGPTPluginError".into(),
            text: "timed out".into(),
        };
        assert_eq!(
            render_content(&content),
            "ChatGPTPluginError\n\ntimed out\n\n"
        );
    }

    #[test]
    fn renders_multimodal_parts_in_order() {
        let content = Content::MultimodalText {
            parts: vec![
                MultimodalPart::ImageAssetPointer {
                    width: serde_json::Number::from(1024_u64),
                    height: serde_json::Number::from(1024_u64),
                    prompt: Some("Photo".into()),
                },
                MultimodalPart::ImageAssetPointer {
                    width: serde_json::Number::from(512_u64),
                    height: serde_json::Number::from(256_u64),
                    prompt: None,
                },
                MultimodalPart::Other {
                    content_type: "some_other_type".into(),
                },
                MultimodalPart::Text("caption".into()),
            ],
        };
        assert_eq!(
            render_content(&content),
            "Image (1024x1024): Photo\n\nImage (512x256): \n\nsome_other_type\n\ncaption\n\n"
        );
    }

    #[test]
    fn renders_float_image_dimensions() {
        let content = Content::MultimodalText {
            parts: vec![MultimodalPart::ImageAssetPointer {
                width: serde_json::Number::from_f64(1024.0).unwrap(),
                height: serde_json::Number::from(768_u64),
                prompt: None,
            }],
        };
        assert_eq!(render_content(&content), "Image (1024.0x768): \n\n");
    }

    #[test]
    fn renders_unknown_content_as_empty() {
        let content = Content::Other {
            content_type: "user_editable_context".into(),
        };
        assert_eq!(render_content(&content), "");
    }

    // Tests for indent
    #[test]
    fn indents_every_line() {
        assert_eq!(indent("a\nb"), "    a\n    b");
        assert_eq!(indent("a\n"), "    a\n    ");
        assert_eq!(indent(""), "    ");
    }

    // Tests for render_message
    #[test]
    fn indents_user_messages() {
        let section = render_message(&message("user", None, text(&["Hello"]))).unwrap();
        assert_eq!(section, "## user\n\n    Hello\n\n");
    }

    #[test]
    fn does_not_indent_assistant_messages() {
        let section = render_message(&message("assistant", None, text(&["Hi"]))).unwrap();
        assert_eq!(section, "## assistant\n\nHi\n\n");
    }

    #[test]
    fn includes_author_name_in_heading() {
        let section = render_message(&message("user", Some("John"), text(&["Hello"]))).unwrap();
        assert_eq!(section, "## user (John)\n\n    Hello\n\n");
    }

    #[test]
    fn omits_empty_author_name() {
        let section = render_message(&message("assistant", Some(""), text(&["Hi"]))).unwrap();
        assert!(section.starts_with("## assistant\n\n"));
    }

    #[test]
    fn does_not_indent_fenced_tool_messages() {
        let content = Content::Code {
            language: "javascript".into(),
            text: "console.log(\"Hello, world!\");".into(),
        };
        let section = render_message(&message("tool", None, content)).unwrap();
        assert_eq!(
            section,
            "## tool\n\n```javascript\nconsole.log(\"Hello, world!\");\n```\n\n"
        );
    }

    #[test]
    fn indents_unfenced_tool_messages() {
        let content = Content::SystemError {
            name: "Error".into(),
            text: "boom".into(),
        };
        let section = render_message(&message("tool", Some("python"), content)).unwrap();
        assert_eq!(
            section,
            "## tool (python)\n\n    Error\n    \n    boom\n    \n    \n\n"
        );
    }

    #[test]
    fn indents_fenced_user_messages() {
        let content = Content::ExecutionOutput { text: "ok".into() };
        let section = render_message(&message("user", None, content)).unwrap();
        assert!(section.contains("    ```\n    ok\n    ```"));
    }

    #[test]
    fn skips_message_without_content() {
        let msg = Message {
            author: Author::default(),
            content: None,
        };
        assert!(render_message(&msg).is_none());
    }

    #[test]
    fn skips_blank_messages() {
        assert!(render_message(&message("user", None, text(&[]))).is_none());
        assert!(render_message(&message("user", None, text(&["  ", "\t"]))).is_none());
        let unknown = Content::Other {
            content_type: "x".into(),
        };
        assert!(render_message(&message("assistant", None, unknown)).is_none());
    }

    // Tests for build_document
    #[test]
    fn builds_complete_document() {
        let conversation = make_conversation(
            "Test Conversation",
            vec![Some(message("user", Some("John"), text(&["Hello"])))],
        );
        let document = build_document(&conversation, &format_date);

        assert_eq!(document.file_name, "Test Conversation.md");
        assert_eq!(
            document.content,
            "# Test Conversation\n\n- Created: 01 Sep 2021 12:00 AM\n- Updated: 01 Sep 2021 01:00 AM\n\n## user (John)\n\n    Hello\n\n"
        );
    }

    #[test]
    fn passes_timestamps_through_unconverted() {
        let mut conversation = make_conversation("T", vec![]);
        conversation.create_time = 1.5;
        conversation.update_time = 2.25;
        let document = build_document(&conversation, &format_date);

        assert!((document.create_time - 1.5).abs() < f64::EPSILON);
        assert!((document.update_time - 2.25).abs() < f64::EPSILON);
    }

    #[test]
    fn builds_header_only_document_without_visible_messages() {
        let conversation = make_conversation(
            "Empty",
            vec![None, Some(message("user", None, text(&[""])))],
        );

        assert_eq!(
            render(&conversation),
            "# Empty\n\n- Created: 01 Sep 2021 12:00 AM\n- Updated: 01 Sep 2021 01:00 AM\n\n"
        );
    }

    #[test]
    fn escapes_html_in_heading_only() {
        let conversation = make_conversation(
            "<h1>Test Conversation</h1>",
            vec![Some(message("assistant", None, text(&["<b>bold</b>"])))],
        );
        let document = build_document(&conversation, &format_date);

        assert!(document.content.contains("# `<h1>`Test Conversation`</h1>`\n"));
        assert!(document.content.contains("\n<b>bold</b>\n"));
        assert_eq!(document.file_name, "h1 Test Conversation h1.md");
    }

    #[test]
    fn keeps_mapping_order() {
        let conversation = make_conversation(
            "Order",
            vec![
                Some(message("user", None, text(&["First question"]))),
                Some(message("assistant", None, text(&["First answer"]))),
                Some(message("user", None, text(&["Second question"]))),
            ],
        );
        let output = render(&conversation);

        let first = output.find("First question").unwrap();
        let answer = output.find("First answer").unwrap();
        let second = output.find("Second question").unwrap();
        assert!(first < answer && answer < second);
        assert_eq!(output.matches("## user").count(), 2);
    }

    #[test]
    fn uses_custom_date_formatter_verbatim() {
        let conversation = make_conversation("T", vec![]);
        let formatter = |secs: f64| format!("<{secs}>");
        let output = build_document(&conversation, &formatter).content;

        assert!(output.contains("- Created: <1630454400>\n"));
        assert!(output.contains("- Updated: <1630458000>\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let conversation = make_conversation(
            "Same",
            vec![Some(message("assistant", None, text(&["stable"])))],
        );
        assert_eq!(
            build_document(&conversation, &format_date),
            build_document(&conversation, &format_date)
        );
    }

    // Tests for date formatting
    #[test]
    fn formats_default_dates() {
        assert_eq!(format_date(CREATED), "01 Sep 2021 12:00 AM");
        assert_eq!(format_date(1_630_501_500.0), "01 Sep 2021 01:05 PM");
    }

    #[test]
    fn formats_with_custom_pattern() {
        assert_eq!(
            format_timestamp(CREATED, "%Y-%m-%dT%H:%M:%S", false).as_deref(),
            Some("2021-09-01T00:00:00")
        );
    }

    #[test]
    fn truncates_fractional_seconds() {
        // 2021-12-31 23:59:59.9996 UTC
        assert_eq!(format_date(1_640_995_199.9996), "31 Dec 2021 11:59 PM");
        assert_eq!(format_date(1_630_454_459.999_999), "01 Sep 2021 12:00 AM");
        assert_eq!(
            timestamp(-1.5).map(|dt| dt.timestamp_millis()),
            Some(-1500)
        );
    }

    #[test]
    fn formats_local_dates_like_local_pattern() {
        for secs in [0.0, CREATED, UPDATED, 1_640_995_199.9996] {
            assert_eq!(
                Some(format_date_local(secs)),
                format_timestamp(secs, DEFAULT_DATE_FORMAT, true)
            );
        }
        assert_eq!(format_date_local(f64::NAN), "NaN");
    }

    #[test]
    fn falls_back_for_unrepresentable_timestamps() {
        assert_eq!(format_date(f64::NAN), "NaN");
        assert!(timestamp(f64::INFINITY).is_none());
        assert!(timestamp(1e300).is_none());
    }
}
