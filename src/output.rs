// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Writing rendered conversations to disk.
//!
//! [`convert`] renders each conversation in order and hands the result to a
//! [`DocumentWriter`]. [`FsWriter`] is the standard writer: it stores each
//! document as `<output dir>/<sanitized title>.md` and stamps the file with
//! the conversation's creation and update times.
//!
//! Conversations are processed one at a time. The first write failure stops
//! the batch and is returned to the caller; files already written are kept.
//!
//! # Example
//!
//! ```no_run
//! use chatgpt2md::output::{ConvertOptions, convert_to_dir};
//! use chatgpt2md::parser::parse_export;
//!
//! let json = std::fs::read_to_string("conversations.json").unwrap();
//! let conversations = parse_export(&json).unwrap();
//!
//! convert_to_dir(&conversations, "./output", &ConvertOptions::default()).unwrap();
//! ```

use crate::parser::Conversation;
use crate::renderer::{self, DateFormatter};
use snafu::{ensure, prelude::*};
use std::fmt;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Error type for conversion failures.
#[derive(Debug, Snafu)]
pub enum ConvertError {
    /// The arguments were rejected before any conversation was processed.
    #[snafu(display("invalid argument: {reason}"))]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: String,
    },

    /// Writing a document failed.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write {
        /// The document path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Configuration for [`convert`].
pub struct ConvertOptions {
    /// Renders the `Created` and `Updated` metadata lines.
    ///
    /// Defaults to [`renderer::format_date`].
    pub date_formatter: Box<DateFormatter>,
}

impl ConvertOptions {
    /// Creates options that render dates with the given function.
    #[must_use]
    pub fn with_date_formatter(formatter: impl Fn(f64) -> String + 'static) -> Self {
        Self {
            date_formatter: Box::new(formatter),
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::with_date_formatter(renderer::format_date)
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions").finish_non_exhaustive()
    }
}

/// Destination for rendered documents.
///
/// Called once per conversation with the full document.
pub trait DocumentWriter {
    /// Stores `content` at `path`.
    ///
    /// `create_time` and `update_time` are the conversation's epoch seconds,
    /// passed through unconverted.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while storing the document.
    fn write(
        &mut self,
        path: &Path,
        content: &str,
        create_time: f64,
        update_time: f64,
    ) -> io::Result<()>;
}

/// Writes documents to the file system.
///
/// Each document is written to a temporary sibling file and renamed into
/// place, so a failed write never leaves a partial document behind. The
/// file's access time is set to `create_time` and its modification time to
/// `update_time`; timestamps that cannot be represented are left unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl DocumentWriter for FsWriter {
    fn write(
        &mut self,
        path: &Path,
        content: &str,
        create_time: f64,
        update_time: f64,
    ) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let result = write_stamped(&tmp_path, content, create_time, update_time)
            .and_then(|()| fs::rename(&tmp_path, path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

fn write_stamped(path: &Path, content: &str, create_time: f64, update_time: f64) -> io::Result<()> {
    fs::write(path, content)?;

    let mut times = FileTimes::new();
    if let Some(accessed) = system_time(create_time) {
        times = times.set_accessed(accessed);
    }
    if let Some(modified) = system_time(update_time) {
        times = times.set_modified(modified);
    }
    File::options().write(true).open(path)?.set_times(times)
}

/// Converts epoch seconds to a [`SystemTime`].
///
/// Returns `None` for non-finite or out-of-range values.
#[must_use]
pub fn system_time(secs: f64) -> Option<SystemTime> {
    if secs >= 0.0 {
        UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(secs).ok()?)
    } else {
        UNIX_EPOCH.checked_sub(Duration::try_from_secs_f64(-secs).ok()?)
    }
}

/// Renders every conversation and passes each document to `writer`.
///
/// Documents are written as `<output_dir>/<sanitized title>.md`, in input
/// order. Conversations whose titles sanitize to the same name overwrite
/// each other, the last one winning.
///
/// # Errors
///
/// Returns [`ConvertError::InvalidArgument`] before writing anything if
/// `output_dir` is empty or names an existing non-directory, and
/// [`ConvertError::Write`] for the first document that fails to write.
pub fn convert<W>(
    conversations: &[Conversation],
    output_dir: impl AsRef<Path>,
    opts: &ConvertOptions,
    writer: &mut W,
) -> Result<(), ConvertError>
where
    W: DocumentWriter + ?Sized,
{
    let output_dir = output_dir.as_ref();

    ensure!(
        !output_dir.as_os_str().is_empty(),
        InvalidArgumentSnafu {
            reason: "output directory must not be empty",
        }
    );
    ensure!(
        !output_dir.exists() || output_dir.is_dir(),
        InvalidArgumentSnafu {
            reason: format!("{} is not a directory", output_dir.display()),
        }
    );

    for conversation in conversations {
        let document = renderer::build_document(conversation, &*opts.date_formatter);
        let path = output_dir.join(&document.file_name);
        writer
            .write(
                &path,
                &document.content,
                document.create_time,
                document.update_time,
            )
            .context(WriteSnafu { path: &path })?;
    }

    Ok(())
}

/// Like [`convert`], writing to the file system with [`FsWriter`].
///
/// # Errors
///
/// See [`convert`].
pub fn convert_to_dir(
    conversations: &[Conversation],
    output_dir: impl AsRef<Path>,
    opts: &ConvertOptions,
) -> Result<(), ConvertError> {
    convert(conversations, output_dir, opts, &mut FsWriter)
}
