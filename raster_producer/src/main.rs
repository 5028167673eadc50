//! Thin CLI entry point over [`raster_producer::Producer`]: loads a TOML
//! config, offers every listed source, runs production, and reports the
//! result.

use anyhow::{Context, Result};
use clap::Parser;
use raster_io::SourceRef;
use raster_producer::{Producer, ProducerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "raster_producer", about = "Builds a tiled raster pyramid from a TOML config and a list of source files.")]
struct Cli {
	/// Path to a `ProducerConfig` TOML document.
	config: PathBuf,

	/// Source raster files to offer to the pipeline (e.g. `.png`/`.wld` or `.bil`/`.hdr` pairs).
	sources: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
	env_logger::init();
	let cli = Cli::parse();

	let config = ProducerConfig::load(&cli.config).with_context(|| format!("loading config {}", cli.config.display()))?;
	let mut producer = Producer::new();
	producer.set_store_parameters(config)?;

	let rejections = producer.offer_all_data_sources(cli.sources.into_iter().map(SourceRef::LocalPath));
	for rejection in &rejections {
		log::warn!("rejected source {:?}: {}", rejection.source, rejection.reason);
	}

	let report = producer.start_production().await?;
	log::info!(
		"wrote {} tiles to {}",
		report.stats.tiles_written,
		report.dataset_descriptor_path.parent().map_or_else(|| "?".to_string(), |p| p.display().to_string())
	);
	Ok(())
}
