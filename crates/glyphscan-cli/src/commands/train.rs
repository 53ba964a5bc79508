//! Train command - grid search a text detector or character classifier.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use glyphscan_core::dataset::{DatasetLoader, DirectoryLoader, LabeledDataset};
use glyphscan_core::ocr::TEXT_LABEL;
use glyphscan_core::{FileStore, GlyphConfig, ModelStore, Predictor};
use glyphscan_model::{
    GridSearch, HogConfig, ModelFamily, ParamGrid, PipelineParams, SearchOutcome, SvmParams, accuracy,
};

use super::config::load_config;

/// Label given to background samples when training the text detector.
const BACKGROUND_LABEL: char = '0';

/// Arguments for the train command.
#[derive(Args)]
pub struct TrainArgs {
    /// Dataset root with one directory of PNG images per class
    #[arg(required = true)]
    dataset: PathBuf,

    /// What to train
    #[arg(short, long, value_enum, default_value = "chars")]
    task: Task,

    /// Model family: linearsvc (raw pixels) or linearsvc-hog (default: from configuration)
    #[arg(short, long)]
    model: Option<ModelFamily>,

    /// Directory of images without text (required for the text task)
    #[arg(long)]
    negatives: Option<PathBuf>,

    /// Output model file (.json for JSON, anything else for bincode)
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of images to load per dataset (0 = unlimited)
    #[arg(long)]
    limit: Option<usize>,

    /// Number of cross-validation folds
    #[arg(long)]
    folds: Option<usize>,

    /// Seed for shuffling and splitting
    #[arg(long)]
    seed: Option<u64>,

    /// Only try these C values (comma separated)
    #[arg(long, value_delimiter = ',')]
    c: Vec<f32>,

    /// Write the full ranking as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Task {
    /// Text/no-text detector
    Text,
    /// Character classifier
    Chars,
}

impl Task {
    fn model_name(&self) -> &'static str {
        match self {
            Task::Text => "text-detector",
            Task::Chars => "char-classifier",
        }
    }
}

pub async fn run(args: TrainArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let training = &config.training;
    let seed = args.seed.unwrap_or(training.seed);
    let folds = args.folds.unwrap_or(training.folds);

    let data = load_dataset(&args, &config, seed)?;
    let (train, test) = data.split(training.test_fraction, seed)?;

    println!(
        "{} Loaded {} samples in {} classes ({} train, {} test)",
        style("ℹ").blue(),
        data.len(),
        data.class_counts().len(),
        train.len(),
        test.len()
    );

    let template = PipelineParams::new(
        HogConfig::default().with_block_norm(training.block_norm),
        SvmParams {
            tol: training.svm_tolerance,
            max_iter: training.svm_max_iter,
            ..SvmParams::default()
        },
    );
    let mut grid = match args.model {
        Some(family) if family != training.grid.family => match family {
            ModelFamily::LinearSvc => ParamGrid::raw(),
            ModelFamily::LinearSvcHog => ParamGrid::default(),
        },
        _ => training.grid.clone(),
    };
    if !args.c.is_empty() {
        grid.c = args.c.clone();
    }

    let mut search = GridSearch::new().with_folds(folds);
    if training.shuffle_folds {
        search = search.with_seed(seed);
    }

    info!(
        "Searching {} {} combinations with {}-fold stratified CV",
        grid.len(),
        grid.family,
        folds
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} fits")?
            .progress_chars("##-"),
    );

    let outcome = {
        let pb = pb.clone();
        let train = train.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<SearchOutcome> {
            let set = train.as_training_set()?;
            let report = |done: usize, total: usize| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            };
            Ok(search.search_with_progress(&set, &template, &grid, &report)?)
        })
        .await??
    };

    pb.finish_and_clear();

    for (params, reason) in &outcome.skipped {
        warn!("Skipped {}: {}", params, reason);
    }

    print_ranking(&outcome);

    let model = outcome.model.with_name(args.task.model_name());

    if !test.is_empty() {
        let predicted = model.predict(test.samples())?;
        println!(
            "{} Held-out accuracy: {:.2}% on {} samples",
            style("ℹ").blue(),
            accuracy(test.labels(), &predicted) * 100.0,
            test.len()
        );
    }

    FileStore::current_dir().save(&model, &args.output.to_string_lossy())?;
    println!(
        "{} Model written to {}",
        style("✓").green(),
        args.output.display()
    );

    if let Some(report_path) = &args.report {
        fs::write(report_path, serde_json::to_string_pretty(&outcome.ranking)?)?;
        println!(
            "{} Ranking written to {}",
            style("✓").green(),
            report_path.display()
        );
    }

    info!("Training finished in {:?}", start.elapsed());

    Ok(())
}

fn load_dataset(args: &TrainArgs, config: &GlyphConfig, seed: u64) -> anyhow::Result<LabeledDataset> {
    let limit = args.limit.unwrap_or(config.training.limit);
    let shape = config.segmentation.sample_shape;

    let characters = DirectoryLoader::new(&args.dataset)
        .with_sample_shape(shape)
        .with_seed(seed)
        .with_limit(limit)
        .load()?;

    match args.task {
        Task::Chars => Ok(characters),
        Task::Text => {
            let Some(negatives) = &args.negatives else {
                anyhow::bail!("The text task needs background images. Pass --negatives <dir>.");
            };
            let background = DirectoryLoader::new(negatives)
                .with_sample_shape(shape)
                .with_seed(seed)
                .with_limit(limit)
                .with_label(BACKGROUND_LABEL)
                .load()?;
            Ok(characters.relabel(TEXT_LABEL).merge(background, seed)?)
        }
    }
}

fn print_ranking(outcome: &SearchOutcome) {
    println!(
        "{} Best: {} (mean {:.4}, std {:.4})",
        style("✓").green(),
        outcome.best.params,
        outcome.best.mean,
        outcome.best.std
    );

    for (rank, scored) in outcome.ranking.iter().take(5).enumerate() {
        println!(
            "  {:>2}. {:.4} ± {:.4}  {}",
            rank + 1,
            scored.mean,
            scored.std,
            scored.params
        );
    }
    if outcome.ranking.len() > 5 {
        println!("  ... {} more", outcome.ranking.len() - 5);
    }
}
