//! Run command implementation: the whole corpus pipeline.

use anyhow::{Context, Result};
use bpeprep_tokenizer::pipeline::{self, PipelineConfig};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Run command arguments. Flags override values from `--config`.
#[derive(Parser)]
pub struct RunCommand {
    /// JSON pipeline configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Raw corpus, one document per line
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Directory receiving every artifact
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Target vocabulary size
    #[arg(long)]
    pub vocab_size: Option<usize>,

    /// Minimum frequency for merges
    #[arg(long)]
    pub min_frequency: Option<u64>,

    /// Truncate each line to this many ids
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Artifact name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Abort on the first line that cannot be encoded
    #[arg(long)]
    pub strict: bool,
}

impl RunCommand {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(corpus) = &self.corpus {
            config.corpus = corpus.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(vocab_size) = self.vocab_size {
            config.tokenizer.vocab_size = vocab_size;
        }
        if let Some(min_frequency) = self.min_frequency {
            config.tokenizer.min_frequency = min_frequency;
        }
        if self.max_length.is_some() {
            config.tokenizer.max_length = self.max_length;
        }
        if self.prefix.is_some() {
            config.prefix = self.prefix.clone();
        }
        if self.strict {
            config.skip_unencodable = false;
        }

        Ok(config)
    }
}

pub fn run(cmd: RunCommand) -> Result<()> {
    let config = cmd.pipeline_config()?;
    let report = pipeline::run(&config)
        .with_context(|| format!("pipeline failed for {}", config.corpus.display()))?;

    info!(
        "{} lines, vocabulary {} ({} merges, {}), {} skipped, {} truncated",
        report.lines,
        report.vocab_size,
        report.merges,
        report.stop_reason,
        report.skipped_lines,
        report.truncated_lines
    );
    println!("Total tokens: {}", report.tokens);

    Ok(())
}
