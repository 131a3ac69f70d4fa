//! Pipeline orchestration.
//!
//! Runs every pending category on its own tokio task, bounded by a
//! semaphore, with one [`GeoContext`] shared by all of them. Categories
//! whose output file already exists are skipped, so an interrupted run can
//! be resumed by running again.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::{CategoryConfig, Config};
use crate::geocode::{GeoContext, GeocodeSettings, Geocoder, Resolver};
use crate::progress::{format_number, MergeProgressReporter};
use crate::worker::{process_category, CategoryReport};

/// How one category ended.
#[derive(Debug)]
pub enum CategoryOutcome {
    Done(CategoryReport),
    /// Output file was already present.
    Skipped,
    Failed(String),
}

/// Result of a whole run, in configured category order.
#[derive(Debug)]
pub struct PipelineSummary {
    pub categories: Vec<(String, CategoryOutcome)>,
    pub geocode_requests: u64,
}

impl PipelineSummary {
    pub fn failed(&self) -> usize {
        self.categories
            .iter()
            .filter(|(_, o)| matches!(o, CategoryOutcome::Failed(_)))
            .count()
    }

    pub fn report(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find_map(|(n, o)| match o {
            CategoryOutcome::Done(r) if n == name => Some(r),
            _ => None,
        })
    }
}

/// Number of concurrent workers for `pending` categories.
pub fn worker_count(pending: usize, max_workers: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    pending.min(cores).min(max_workers).max(1)
}

/// Run the pipeline over the configured categories, or only those named in
/// `only`.
pub async fn run_pipeline(
    config: &Config,
    resolver: Arc<dyn Resolver>,
    progress: Arc<dyn MergeProgressReporter>,
    only: &[String],
) -> Result<PipelineSummary> {
    for name in only {
        if !config.categories.iter().any(|c| &c.name == name) {
            bail!("Unknown category: '{}'", name);
        }
    }

    let selected: Vec<&CategoryConfig> = config
        .categories
        .iter()
        .filter(|c| only.is_empty() || only.contains(&c.name))
        .collect();

    let context = Arc::new(GeoContext::new(config.geocoding.warn_every));
    let geocoder = Geocoder::new(
        context.clone(),
        resolver,
        GeocodeSettings::from_config(&config.geocoding),
    );

    let mut outcomes: Vec<(String, Option<CategoryOutcome>)> = Vec::new();
    let mut pending = Vec::new();
    for category in selected {
        let output = config.output_path(category);
        if output.exists() {
            info!(
                category = %category.name,
                path = %output.display(),
                "output already exists, skipping category"
            );
            outcomes.push((category.name.clone(), Some(CategoryOutcome::Skipped)));
        } else {
            pending.push(outcomes.len());
            outcomes.push((category.name.clone(), None));
        }
    }

    let workers = worker_count(pending.len(), config.workers.max_workers);
    if !pending.is_empty() {
        info!(
            categories = pending.len(),
            workers, "starting category workers"
        );
    }

    let semaphore = Arc::new(Semaphore::new(workers));
    let shared_config = Arc::new(config.clone());
    let mut handles = Vec::with_capacity(pending.len());

    for &slot in &pending {
        let Some(category) = config
            .categories
            .iter()
            .find(|c| c.name == outcomes[slot].0)
            .cloned()
        else {
            continue;
        };
        let semaphore = semaphore.clone();
        let config = shared_config.clone();
        let geocoder = geocoder.clone();
        let progress = progress.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            process_category(&config, &category, &geocoder, progress.as_ref()).await
        });
        handles.push((slot, handle));
    }

    for (slot, handle) in handles {
        let name = outcomes[slot].0.clone();
        let outcome = match handle.await {
            Ok(Ok(report)) => CategoryOutcome::Done(report),
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                warn!(category = %name, error = %message, "category failed");
                CategoryOutcome::Failed(message)
            }
            Err(e) => {
                warn!(category = %name, error = %e, "category worker panicked");
                CategoryOutcome::Failed(e.to_string())
            }
        };
        outcomes[slot].1 = Some(outcome);
    }

    let categories = outcomes
        .into_iter()
        .filter_map(|(name, outcome)| outcome.map(|o| (name, o)))
        .collect();

    Ok(PipelineSummary {
        categories,
        geocode_requests: context.requests(),
    })
}

/// Print the run summary on stdout.
pub fn print_summary(summary: &PipelineSummary, config: &Config) {
    println!("run");
    for (name, outcome) in &summary.categories {
        match outcome {
            CategoryOutcome::Done(r) => {
                println!("  {}", name);
                println!("    records loaded: {}", format_number(r.loaded));
                println!("    listings written: {}", format_number(r.written));
                println!(
                    "    duplicates merged: {} ({} replaced)",
                    format_number(r.duplicates),
                    format_number(r.replaced)
                );
                println!("    filtered: {}", format_number(r.filtered));
                println!("    unclassified: {}", format_number(r.unclassified));
                println!("    geocoded: {}", format_number(r.geocoded));
            }
            CategoryOutcome::Skipped => println!("  {}  skipped (output exists)", name),
            CategoryOutcome::Failed(e) => println!("  {}  FAILED: {}", name, e),
        }
    }
    println!(
        "  geocoding requests: {}",
        format_number(summary.geocode_requests)
    );

    let threshold = config.geocoding.total_requests_warning;
    if summary.geocode_requests > threshold {
        warn!(
            requests = summary.geocode_requests,
            threshold, "geocoding request total above advisory threshold"
        );
    }
    if summary.failed() == 0 {
        println!("ok");
    }
}
