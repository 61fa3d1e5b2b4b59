// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert ChatGPT conversation exports to Markdown.
//!
//! This crate provides parsing, rendering and writing functionality for
//! turning the `conversations.json` file of a ChatGPT data export into one
//! timestamped Markdown document per conversation.
//!
//! # Overview
//!
//! ChatGPT exports conversations as a JSON list of message graphs. This crate:
//!
//! 1. Parses the JSON structure into typed Rust representations
//! 2. Renders each conversation as a Markdown document named after its title
//! 3. Writes the documents, stamping each file with the conversation's times
//!
//! # Example
//!
//! ```no_run
//! use chatgpt2md::{output, parser, renderer};
//!
//! let json = std::fs::read_to_string("conversations.json").unwrap();
//! let conversations = parser::parse_export(&json).unwrap();
//!
//! let opts = output::ConvertOptions::with_date_formatter(renderer::format_date_local);
//! output::convert_to_dir(&conversations, "./output", &opts).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and type definitions for ChatGPT exports
//! - [`renderer`]: Markdown generation, title sanitizing and date formatting
//! - [`output`]: The conversion entry point and document writers

#![deny(missing_docs)]

pub mod output;
pub mod parser;
pub mod renderer;
