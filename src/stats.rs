//! Output file statistics.
//!
//! Summarizes the category output files already on disk: how many listings
//! each holds, how many carry a coordinate, how many were seen on more than
//! one source, and which sources own the primary records. Used by
//! `lmerge stats` to check a run without opening the JSON by hand.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::models::Listing;

/// Counts for one output file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub listings: usize,
    pub geocoded: usize,
    pub multi_source: usize,
    pub by_source: BTreeMap<String, usize>,
}

pub fn summarize_listings(listings: &[Listing]) -> OutputStats {
    let mut stats = OutputStats {
        listings: listings.len(),
        ..Default::default()
    };
    for listing in listings {
        if listing.geocoordinate.is_some() {
            stats.geocoded += 1;
        }
        if !listing.secondary_sources.is_empty() {
            stats.multi_source += 1;
        }
        *stats.by_source.entry(listing.source.clone()).or_default() += 1;
    }
    stats
}

fn read_listings(path: &Path) -> Result<Vec<Listing>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read output file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid output file: {}", path.display()))
}

/// Run the stats command: read every category output and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    println!("Listing Merge — Output Stats");
    println!("============================");
    println!();
    println!("  Output dir:  {}", config.paths.output_dir.display());
    println!();
    println!(
        "  {:<24} {:>8} {:>9} {:>7} {:>9}   {}",
        "CATEGORY", "LISTINGS", "GEOCODED", "MULTI", "SIZE", "WRITTEN"
    );
    println!("  {}", "-".repeat(76));

    let mut totals = OutputStats::default();
    for category in &config.categories {
        let path = config.output_path(category);
        let Ok(metadata) = std::fs::metadata(&path) else {
            println!("  {:<24} {:>8}", category.name, "pending");
            continue;
        };

        let stats = summarize_listings(&read_listings(&path)?);
        let written = metadata
            .modified()
            .map(|t| format_ts_relative(chrono::DateTime::<chrono::Utc>::from(t).timestamp()))
            .unwrap_or_else(|_| "unknown".to_string());

        println!(
            "  {:<24} {:>8} {:>9} {:>7} {:>9}   {}",
            category.name,
            stats.listings,
            format!("{}%", percent(stats.geocoded, stats.listings)),
            stats.multi_source,
            format_bytes(metadata.len()),
            written
        );

        totals.listings += stats.listings;
        totals.geocoded += stats.geocoded;
        totals.multi_source += stats.multi_source;
        for (source, n) in stats.by_source {
            *totals.by_source.entry(source).or_default() += n;
        }
    }

    println!();
    println!("  Listings:    {}", totals.listings);
    println!(
        "  Geocoded:    {} / {} ({}%)",
        totals.geocoded,
        totals.listings,
        percent(totals.geocoded, totals.listings)
    );
    println!("  Multi-source: {}", totals.multi_source);

    if !totals.by_source.is_empty() {
        println!();
        println!("  Primary records by source:");
        for (source, n) in &totals.by_source {
            println!("    {:<24} {:>8}", source, n);
        }
    }

    println!();
    Ok(())
}

fn percent(part: usize, whole: usize) -> usize {
    if whole > 0 {
        part * 100 / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PropertyType, Purpose};

    #[test]
    fn summarize_counts() {
        let mut a = Listing::new(PropertyType::House, Purpose::Sale, "olx");
        a.geocoordinate = Some(GeoPoint::new(-16.7, -49.2));
        a.add_secondary_source("vivareal");
        let b = Listing::new(PropertyType::House, Purpose::Sale, "olx");
        let c = Listing::new(PropertyType::House, Purpose::Sale, "invest");

        let stats = summarize_listings(&[a, b, c]);
        assert_eq!(stats.listings, 3);
        assert_eq!(stats.geocoded, 1);
        assert_eq!(stats.multi_source, 1);
        assert_eq!(stats.by_source.get("olx"), Some(&2));
        assert_eq!(stats.by_source.get("invest"), Some(&1));
    }

    #[test]
    fn byte_and_percent_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn relative_time() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
    }
}
