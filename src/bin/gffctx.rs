use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use gffctx::cli;
use gffctx::config::{ClipMode, ParserConfig};
use gffctx::gff::{self, GffVersion, ParseStatus, Writer};
use gffctx::model;
use gffctx::source::ReaderSource;

#[derive(Parser)]
#[command(name = "gffctx", about = "Load one sequence region from a GFF2/GFF3 file")]
struct Cli {
    /// GFF file to read (.gz is decompressed)
    file: PathBuf,

    /// Path to a JSON parser configuration
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Sequence to load (defaults to the first one in the file)
    #[arg(short = 's', long = "seq")]
    sequence: Option<String>,

    /// First coordinate of the window
    #[arg(long)]
    start: Option<i32>,

    /// Last coordinate of the window
    #[arg(long)]
    end: Option<i32>,

    /// Clip policy for features crossing the window: none, overlap or all
    #[arg(long)]
    clip: Option<ClipMode>,

    /// Stop at the first bad line
    #[arg(long)]
    strict: bool,

    /// Read the header only and report it
    #[arg(long)]
    header_only: bool,

    /// Write the loaded context as GFF2
    #[arg(long = "dump-v2", value_name = "OUT")]
    dump_v2: Option<PathBuf>,

    /// Write the loaded context as GFF3
    #[arg(long = "dump-v3", value_name = "OUT")]
    dump_v3: Option<PathBuf>,
}

fn build_config(args: &Cli) -> Result<ParserConfig> {
    let mut config = match &args.config {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };
    if let Some(sequence) = &args.sequence {
        config.sequence_name = Some(sequence.clone());
    }
    if args.start.is_some() {
        config.features_start = args.start;
    }
    if args.end.is_some() {
        config.features_end = args.end;
    }
    if let Some(clip) = args.clip {
        config.clip_mode = clip;
    }
    if args.strict {
        config.stop_on_error = true;
    }
    config.validate()?;
    Ok(config)
}

fn dump(context: &model::Context, path: &Path, version: GffVersion) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output: {}", path.display()))?;
    let mut writer = Writer::new(BufWriter::new(file), version);
    let written = writer.write_context(context)?;
    writer.into_inner().flush()?;
    Ok(written)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let start = Instant::now();
    let args = Cli::parse();

    cli::banner("GFF feature context");

    // ── Configuration ────────────────────────────────────
    cli::section("Configuration");

    let config = build_config(&args)?;
    cli::kv("Input", &args.file.display().to_string());
    if let Some(path) = &args.config {
        cli::kv("Config", &path.display().to_string());
    }
    cli::kv(
        "Sequence",
        config.sequence_name.as_deref().unwrap_or("(first in file)"),
    );
    if let Some(window) = config.window() {
        cli::kv("Window", &window.to_string());
        cli::kv("Clip", &config.clip_mode.to_string());
    }
    eprintln!();

    let mut source = ReaderSource::open(&args.file)
        .with_context(|| format!("failed to open GFF file: {}", args.file.display()))?;

    // ── Header ───────────────────────────────────────────
    cli::section("Header");

    let parser = gff::run_header(&mut source, config)?;
    let state = parser.state();
    match state.version {
        Some(version) => cli::kv("GFF version", &version.to_string()),
        None => cli::warning("no ##gff-version directive"),
    }
    if let Some(region) = &state.header.sequence_region {
        cli::kv("Sequence region", &format!("{} {}", region.name, region.span));
    }
    if let Some(build) = &state.header.genome_build {
        cli::kv("Genome build", build);
    }
    cli::kv("Header lines", &state.counters.header.to_string());
    eprintln!();

    if args.header_only {
        cli::print_summary(start);
        return Ok(());
    }

    // ── Features ─────────────────────────────────────────
    cli::section("Features");

    let (context, outcome) = gff::resume(&mut source, parser.into_state())?;

    cli::kv("Sequence", &context.sequence_name);
    let sets = context.master_block().map_or(0, |b| b.feature_sets.len());
    cli::kv("Feature sets", &sets.to_string());
    cli::kv("Features", &context.feature_count().to_string());
    if let Some(dna) = context.dna() {
        cli::kv("DNA", &format!("{} bases", dna.len()));
    }
    cli::counters(&outcome.counters);
    cli::outcome(&outcome, 10);
    eprintln!();

    // ── Output ───────────────────────────────────────────
    if args.dump_v2.is_some() || args.dump_v3.is_some() {
        cli::section("Output");
        for (path, version) in [(&args.dump_v2, GffVersion::V2), (&args.dump_v3, GffVersion::V3)] {
            if let Some(path) = path {
                let written = dump(&context, path, version)?;
                info!("wrote {written} features to {}", path.display());
                cli::success(&format!("{written} features → {}", path.display()));
            }
        }
        eprintln!();
    }

    cli::print_summary(start);

    if outcome.status == ParseStatus::Failed {
        bail!("parse of {} failed", args.file.display());
    }
    Ok(())
}
