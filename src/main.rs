use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use htmpl::{load_model, render};

/// Renders an HTML template, optionally against a CSV, JSON, YAML or TOML
/// data model.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Template file to render, or `-` to read standard input.
    template: PathBuf,

    /// Data model whose contents become the template's global variables.
    /// A CSV file is exposed as the list `csv`.
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Write the result to this file instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Remove lines that are empty or whitespace-only from the result.
    #[arg(long)]
    strip_blank_lines: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let model = args
        .model
        .as_deref()
        .map(load_model)
        .transpose()
        .context("failed to load data model")?;

    let rendered = if args.template == Path::new("-") {
        render(io::stdin().lock(), model)
    } else {
        let file = File::open(&args.template)
            .with_context(|| format!("failed to open template '{}'", args.template.display()))?;
        render(BufReader::new(file), model)
    }
    .with_context(|| format!("failed to render '{}'", args.template.display()))?;
    debug!("rendered {} bytes", rendered.len());

    let rendered = if args.strip_blank_lines {
        strip_blank_lines(&rendered)
    } else {
        rendered
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => io::stdout().write_all(rendered.as_bytes())?,
    }
    Ok(())
}

fn strip_blank_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !line.trim().is_empty())
        .collect()
}
