//! Evaluation driver: train, populate, query, report recall@R.
//!
//! Takes one JSON configuration file (see [`locality::config`]). Exit
//! codes: 0 on success, 2 on a configuration error, 1 on a runtime
//! failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use locality::config::DriverConfig;
use locality::error::IndexError;
use locality::eval::recall_at_r;
use locality::ivfadc::IvfAdc;
use locality::readers::ReaderRegistry;
use locality::Result;

#[derive(Parser, Debug)]
#[command(name = "locality-eval", about = "IVFADC recall evaluation")]
struct Args {
    /// Path to the JSON configuration file.
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match DriverConfig::from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    env_logger::Builder::new()
        .filter_level(config.misc.log_level.to_filter())
        .init();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run(config: &DriverConfig) -> Result<()> {
    let readers = ReaderRegistry::with_defaults();

    let train = readers.reader(&config.datasets.train_set)?.read_all()?;
    info!(
        "beginning ivfadc training with {} x {} training vectors",
        train.rows(),
        train.dim()
    );
    let mut index = IvfAdc::new(config.to_params())?;
    index.train(&train)?;
    drop(train);

    let base = readers.reader(&config.datasets.base_set)?.read_all()?;
    info!("populating ivfadc with {} vectors", base.rows());
    index.add(&base)?;
    drop(base);

    let queries = readers.reader(&config.datasets.query_set)?.read_all()?;
    let k = config.ivfadc.nearest_neighbors;
    let w = config.ivfadc.coarse_neighbors_lookup;
    info!("querying {k} nearest neighbors for {} queries", queries.rows());
    let results = index.search_many(&queries, k, w)?;
    let result_ids: Vec<Vec<u64>> = results
        .iter()
        .map(|hits| hits.iter().map(|hit| hit.id).collect())
        .collect();

    let ground_truth = readers.reader(&config.datasets.ground_truth)?.read_all()?;
    if ground_truth.rows() != queries.rows() {
        return Err(IndexError::InvalidArgument(format!(
            "ground truth has {} rows for {} queries",
            ground_truth.rows(),
            queries.rows()
        )));
    }
    let true_first: Vec<u64> = ground_truth.iter_rows().map(|row| row[0] as u64).collect();

    report_config(config);
    for &r in &config.misc.recall_rs {
        println!("recall@{r}: {}", recall_at_r(&true_first, &result_ids, r));
    }
    Ok(())
}

fn report_config(config: &DriverConfig) {
    println!("[Datasets]");
    println!(
        "trainSet={}, baseSet={}, querySet={}, groundTruth={}",
        config.datasets.train_set.display(),
        config.datasets.base_set.display(),
        config.datasets.query_set.display(),
        config.datasets.ground_truth.display()
    );
    println!("[Coarse Quantizer]");
    println!(
        "numberCentroids={}, maxIterations={}, seed={}",
        config.coarse_quantizer.number_centroids,
        config.coarse_quantizer.max_iterations,
        config.coarse_quantizer.seed
    );
    println!("[Product Quantizer]");
    println!(
        "numberSubquantizers={}, numberCentroids={}, maxIterations={}, seed={}",
        config.product_quantizer.number_subquantizers,
        config.product_quantizer.number_centroids,
        config.product_quantizer.max_iterations,
        config.product_quantizer.seed
    );
    println!("[IVFADC]");
    println!(
        "coarseNeighborsLookup={}, nearestNeighbors={}",
        config.ivfadc.coarse_neighbors_lookup, config.ivfadc.nearest_neighbors
    );
}
