//! Evaluate command - score a trained model on a labeled dataset.

use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use console::style;
use serde::Serialize;

use glyphscan_core::dataset::{DatasetLoader, DirectoryLoader};
use glyphscan_core::{FileStore, ModelStore, Predictor};
use glyphscan_model::{ConfusionMatrix, ModelMetadata};

use super::config::load_config;

/// Arguments for the evaluate command.
#[derive(Args)]
pub struct EvaluateArgs {
    /// Model file
    #[arg(required = true)]
    model: PathBuf,

    /// Dataset root with one directory of PNG images per class
    #[arg(required = true)]
    dataset: PathBuf,

    /// Label every image with this class instead of its directory
    #[arg(long)]
    label: Option<char>,

    /// Maximum number of images to load (0 = unlimited)
    #[arg(long)]
    limit: Option<usize>,

    /// Print the confusion matrix
    #[arg(long)]
    confusion: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Evaluation<'a> {
    model: &'a ModelMetadata,
    samples: usize,
    accuracy: f64,
    recall: Vec<(char, f64)>,
    confusion: &'a ConfusionMatrix,
}

pub async fn run(args: EvaluateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let model = FileStore::current_dir().load(&args.model.to_string_lossy())?;

    let mut loader = DirectoryLoader::new(&args.dataset)
        .with_sample_shape(model.sample_shape())
        .with_seed(config.training.seed)
        .with_limit(args.limit.unwrap_or(config.training.limit));
    if let Some(label) = args.label {
        loader = loader.with_label(label);
    }
    let data = loader.load()?;

    let predicted = model.predict(data.samples())?;
    let matrix = ConfusionMatrix::new(data.labels(), &predicted);

    if args.json {
        let evaluation = Evaluation {
            model: model.metadata(),
            samples: data.len(),
            accuracy: matrix.accuracy(),
            recall: matrix.recall(),
            confusion: &matrix,
        };
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
        return Ok(());
    }

    let metadata = model.metadata();
    println!(
        "{} Model '{}' trained {} on {} samples",
        style("ℹ").blue(),
        metadata.name,
        metadata.trained_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        metadata.training_samples
    );
    if let Some(score) = metadata.cv_score {
        println!("  Cross-validation score: {:.4}", score);
    }
    println!("  Parameters: {}", model.params());

    println!(
        "{} Accuracy: {:.2}% on {} samples",
        style("✓").green(),
        matrix.accuracy() * 100.0,
        data.len()
    );

    println!();
    println!("Per-class recall:");
    for (label, recall) in matrix.recall() {
        println!("  {}  {:.3}", label, recall);
    }

    if args.confusion {
        println!();
        print_confusion(&matrix);
    }

    Ok(())
}

fn print_confusion(matrix: &ConfusionMatrix) {
    let width = matrix.counts.iter().max().map_or(1, |m| m.to_string().len()).max(1);

    let header: String = matrix
        .labels
        .iter()
        .map(|l| format!(" {:>width$}", l, width = width))
        .collect();
    println!("{} {}", style("t\\p").dim(), header);

    for (label, row) in matrix.labels.iter().zip(matrix.counts.rows()) {
        let cells: String = row
            .iter()
            .map(|c| format!(" {:>width$}", c, width = width))
            .collect();
        println!("  {} {}", label, cells);
    }
}
