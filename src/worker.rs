//! Per-category worker.
//!
//! A worker reads the category's input file from every source in declared
//! order, standardizes and geocodes each record, folds it into the
//! [`Accumulator`], and writes the result once at the end.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::config::{CategoryConfig, Config};
use crate::geocode::Geocoder;
use crate::input::load_records;
use crate::matcher::is_duplicate;
use crate::merge::{merge_duplicate, MergeOutcome};
use crate::models::Listing;
use crate::progress::{MergeProgressEvent, MergeProgressReporter};
use crate::standardize::{standardize, Standardized};

/// Records between two progress events.
const PROGRESS_EVERY: usize = 20;

/// Deduplicated listings of one category, in first-insertion order.
#[derive(Debug, Default)]
pub struct Accumulator {
    listings: Vec<Listing>,
    duplicates: u64,
    replaced: u64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `listing` into the first accumulated duplicate, or append it.
    /// Returns the merge outcome when a duplicate was found.
    pub fn offer(&mut self, listing: Listing) -> Option<MergeOutcome> {
        match self.listings.iter_mut().find(|l| is_duplicate(l, &listing)) {
            Some(existing) => {
                let outcome = merge_duplicate(existing, listing);
                self.duplicates += 1;
                if outcome == MergeOutcome::Replaced {
                    self.replaced += 1;
                }
                Some(outcome)
            }
            None => {
                self.listings.push(listing);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }
}

/// Counters for one finished category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: String,
    pub loaded: u64,
    pub written: u64,
    pub duplicates: u64,
    pub replaced: u64,
    pub filtered: u64,
    pub unclassified: u64,
    pub geocoded: u64,
}

/// Build and write the output file of `category`.
pub async fn process_category(
    config: &Config,
    category: &CategoryConfig,
    geocoder: &Geocoder,
    progress: &dyn MergeProgressReporter,
) -> Result<CategoryReport> {
    info!(category = %category.name, "category worker started");

    let mut report = CategoryReport {
        category: category.name.clone(),
        ..Default::default()
    };
    let mut acc = Accumulator::new();

    // Slot i of `files` belongs to source i; surplus names are ignored.
    for (source, file) in config.sources.iter().zip(&category.files) {
        let path = config.input_path(source, file);
        let records = load_records(&path);
        let total = records.len();
        report.loaded += total as u64;
        debug!(category = %category.name, source = %source.name, records = total, "source loaded");

        if total == 0 {
            continue;
        }
        progress.report(MergeProgressEvent::Loading {
            category: category.name.clone(),
            source: source.name.clone(),
            total: total as u64,
        });

        let kind = source.kind();
        for (i, record) in records.iter().enumerate() {
            match standardize(record, &source.name, kind, category, &config.filters) {
                Standardized::Listing(mut listing) => {
                    // Geocoding runs after the business filters, so filtered
                    // records never reach the resolver or the request count.
                    if let Some(address) = listing.address.as_deref() {
                        listing.geocoordinate = geocoder.resolve(address).await;
                    }
                    if listing.geocoordinate.is_some() {
                        report.geocoded += 1;
                    }
                    acc.offer(listing);
                }
                Standardized::Unclassified => report.unclassified += 1,
                Standardized::Filtered(reason) => {
                    debug!(category = %category.name, source = %source.name, %reason, "record filtered");
                    report.filtered += 1;
                }
            }

            let n = i + 1;
            if n % PROGRESS_EVERY == 0 || n == total {
                progress.report(MergeProgressEvent::Processing {
                    category: category.name.clone(),
                    source: source.name.clone(),
                    n: n as u64,
                    total: total as u64,
                });
            }
        }
    }

    report.duplicates = acc.duplicates;
    report.replaced = acc.replaced;
    report.written = acc.len() as u64;

    let output = config.output_path(category);
    write_listings(&output, acc.listings())?;

    progress.report(MergeProgressEvent::Finished {
        category: category.name.clone(),
        written: report.written,
    });
    info!(
        category = %category.name,
        written = report.written,
        duplicates = report.duplicates,
        "category worker finished"
    );
    Ok(report)
}

/// Write `listings` as pretty JSON. The file appears only once complete.
pub fn write_listings(path: &Path, listings: &[Listing]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(listings).context("Failed to serialize listings")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write output file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move output into place: {}", path.display()))?;
    Ok(())
}
