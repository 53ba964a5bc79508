//! Read command - run the recognition cascade on images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use glyphscan_core::ocr::CascadeStage;
use glyphscan_core::{Cascade, CascadeReport, FileStore, GlyphConfig, GlyphError, PageImage};

use super::config::load_config;

/// Arguments for the read command.
#[derive(Args)]
pub struct ReadArgs {
    /// Input images or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Text/no-text detector model (default: from configuration)
    #[arg(long)]
    text_model: Option<PathBuf>,

    /// Character classifier model (default: from configuration)
    #[arg(long)]
    char_model: Option<PathBuf>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Show candidate counts per stage
    #[arg(long)]
    stats: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per glyph
    Csv,
    /// Plain text reconstructed from the layout
    Text,
}

/// Recognition result for one image.
#[derive(Debug, Serialize)]
struct PageOutput {
    file: String,
    text: String,
    candidates: usize,
    text_candidates: usize,
    processing_time_ms: u64,
    x_max: i64,
    y_max: i64,
    glyphs: Vec<GlyphRecord>,
}

#[derive(Debug, Serialize)]
struct GlyphRecord {
    label: char,
    x: i64,
    y: i64,
    row_min: usize,
    col_min: usize,
    row_max: usize,
    col_max: usize,
}

impl PageOutput {
    fn new(path: &Path, report: &CascadeReport, line_tolerance: f32) -> Self {
        let glyphs = report
            .classified
            .set()
            .items()
            .iter()
            .zip(&report.layout.glyphs)
            .map(|(item, placed)| {
                let bbox = item.candidate.bbox;
                GlyphRecord {
                    label: placed.label,
                    x: placed.x,
                    y: placed.y,
                    row_min: bbox.row_min,
                    col_min: bbox.col_min,
                    row_max: bbox.row_max,
                    col_max: bbox.col_max,
                }
            })
            .collect();

        Self {
            file: path.display().to_string(),
            text: report.layout.to_text(line_tolerance),
            candidates: report.segmented.candidates().len(),
            text_candidates: report.filtered.candidates().len(),
            processing_time_ms: report.processing_time_ms,
            x_max: report.layout.x_max,
            y_max: report.layout.y_max,
            glyphs,
        }
    }
}

pub async fn run(args: ReadArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.model_dir {
        config.models.model_dir = dir.clone();
    }

    let files = expand_inputs(&args.inputs)?;
    info!("Reading {} images", files.len());

    let cascade = build_cascade(&args, &mut config)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut pages = Vec::with_capacity(files.len());
    for path in &files {
        pb.set_message(path.display().to_string());

        let image = PageImage::open(path).map_err(GlyphError::from)?;
        let report = cascade
            .run(&image)
            .with_context(|| format!("Recognition failed for {}", path.display()))?;

        if report.layout.is_empty() {
            warn!("No text found in {}", path.display());
        }
        pages.push(PageOutput::new(path, &report, config.layout.line_tolerance));
        pb.inc(1);
    }

    pb.finish_and_clear();

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&pages)?,
        OutputFormat::Csv => format_csv(&pages)?,
        OutputFormat::Text => format_text(&pages),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.stats {
        for page in &pages {
            eprintln!(
                "{} {}: {} candidates, {} text, {} glyphs in {}ms",
                style("ℹ").blue(),
                page.file,
                page.candidates,
                page.text_candidates,
                page.glyphs.len(),
                page.processing_time_ms
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Literal paths are taken as is; anything else is expanded as a glob.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_file() {
            files.push(path);
            continue;
        }

        let matches: Vec<PathBuf> = glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            anyhow::bail!("Input file not found: {}", input);
        }
        files.extend(matches);
    }
    Ok(files)
}

/// Point the configuration at explicit model files, then load through the configured store layout.
fn build_cascade(args: &ReadArgs, config: &mut GlyphConfig) -> anyhow::Result<Cascade> {
    if let Some(path) = &args.text_model {
        config.models.text_model = std::path::absolute(path)?.to_string_lossy().into_owned();
    }
    if let Some(path) = &args.char_model {
        config.models.char_model = std::path::absolute(path)?.to_string_lossy().into_owned();
    }

    Cascade::from_config(config, &FileStore::current_dir()).map_err(|e| {
        let name = match &e {
            GlyphError::Artifact {
                stage: CascadeStage::Classification,
                ..
            } => &config.models.char_model,
            _ => &config.models.text_model,
        };
        let path = config.model_path(name);
        anyhow::Error::new(e).context(format!(
            "Cannot load model {}.\n\nRun 'glyphscan train' to create it.",
            path.display()
        ))
    })
}

fn format_csv(pages: &[PageOutput]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "file", "index", "label", "x", "y", "row_min", "col_min", "row_max", "col_max",
    ])?;

    for page in pages {
        for (i, glyph) in page.glyphs.iter().enumerate() {
            wtr.write_record([
                page.file.clone(),
                i.to_string(),
                glyph.label.to_string(),
                glyph.x.to_string(),
                glyph.y.to_string(),
                glyph.row_min.to_string(),
                glyph.col_min.to_string(),
                glyph.row_max.to_string(),
                glyph.col_max.to_string(),
            ])?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(pages: &[PageOutput]) -> String {
    if let [page] = pages {
        return page.text.clone();
    }

    let mut output = String::new();
    for page in pages {
        output.push_str(&format!("== {} ==\n", page.file));
        output.push_str(&page.text);
        output.push_str("\n\n");
    }
    output.trim_end().to_string()
}
