// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chatgpt2md.
//!
//! This binary provides the `chatgpt2md` command for converting ChatGPT
//! conversation exports from JSON to one Markdown file per conversation.

use chatgpt2md::output::DocumentWriter;
use chatgpt2md::{output, parser, renderer};
use lexopt::prelude::*;
use snafu::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_INPUT: &str = "input.json";
const DEFAULT_OUTPUT: &str = "./output";

struct Cli {
    input: Vec<PathBuf>,
    output: PathBuf,
    date_format: Option<String>,
    local_time: bool,
    quiet: bool,
    dry_run: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("invalid date format: {format:?}"))]
    InvalidDateFormat { format: String },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: parser::ParseError,
    },

    #[snafu(display("failed to convert {}: {source}", path.display()))]
    Convert {
        path: PathBuf,
        source: output::ConvertError,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatGPT conversation exports to Markdown

Usage: {name} [OPTIONS] [INPUT]...

Arguments:
  [INPUT]...  Input JSON files or directories containing exports (default: {input})

Options:
  -o, --output <DIR>        Output directory (default: {output})
      --date-format <FMT>   strftime pattern for Created/Updated (default: \"{date}\")
      --local-time          Render dates in the local time zone instead of UTC

Other options:
  -q, --quiet               Suppress progress messages
  -n, --dry-run             Show what would be written without writing
  -h, --help                Print help
  -V, --version             Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        input = DEFAULT_INPUT,
        output = DEFAULT_OUTPUT,
        date = renderer::DEFAULT_DATE_FORMAT,
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    let mut input = Vec::new();
    let mut output = PathBuf::from(DEFAULT_OUTPUT);
    let mut date_format = None;
    let mut local_time = false;
    let mut quiet = false;
    let mut dry_run = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => output = parser.value()?.parse()?,
            Long("date-format") => date_format = Some(parser.value()?.string()?),
            Long("local-time") => local_time = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    if input.is_empty() {
        input.push(PathBuf::from(DEFAULT_INPUT));
    }

    Ok(Cli {
        input,
        output,
        date_format,
        local_time,
        quiet,
        dry_run,
    })
}

/// Reports each document on stderr, writing it unless in dry-run mode.
struct ProgressWriter {
    quiet: bool,
    dry_run: bool,
}

impl DocumentWriter for ProgressWriter {
    fn write(
        &mut self,
        path: &Path,
        content: &str,
        create_time: f64,
        update_time: f64,
    ) -> io::Result<()> {
        if self.dry_run {
            eprintln!("Would write {} ({} bytes)", path.display(), content.len());
            return Ok(());
        }

        output::FsWriter.write(path, content, create_time, update_time)?;
        if !self.quiet {
            eprintln!("Wrote {}", path.display());
        }
        Ok(())
    }
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    let opts = make_convert_options(&cli)?;
    let mut writer = ProgressWriter {
        quiet: cli.quiet,
        dry_run: cli.dry_run,
    };

    for file in collect_input_files(&cli.input) {
        process_file(&file, &cli.output, &opts, &mut writer)?;
    }

    Ok(())
}

/// Collects all JSON files from the given inputs (files and directories).
fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Creates convert options from CLI arguments.
fn make_convert_options(cli: &Cli) -> Result<output::ConvertOptions, Error> {
    let local = cli.local_time;
    let Some(pattern) = cli.date_format.clone() else {
        return Ok(if local {
            output::ConvertOptions::with_date_formatter(renderer::format_date_local)
        } else {
            output::ConvertOptions::default()
        });
    };

    ensure!(
        renderer::format_timestamp(0.0, &pattern, local).is_some(),
        InvalidDateFormatSnafu { format: pattern }
    );

    Ok(output::ConvertOptions::with_date_formatter(move |secs| {
        renderer::format_timestamp(secs, &pattern, local).unwrap_or_else(|| secs.to_string())
    }))
}

/// Converts every conversation in one export file.
fn process_file(
    input: &Path,
    out_dir: &Path,
    opts: &output::ConvertOptions,
    writer: &mut ProgressWriter,
) -> Result<(), Error> {
    let json = std::fs::read_to_string(input).context(ReadFileSnafu { path: input })?;
    let conversations = parser::parse_export(&json).context(ParseFileSnafu { path: input })?;

    output::convert(&conversations, out_dir, opts, writer).context(ConvertSnafu { path: input })?;

    if !writer.quiet {
        eprintln!(
            "Converted {} conversations from {}",
            conversations.len(),
            input.display()
        );
    }
    Ok(())
}
