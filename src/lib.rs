//! # Listing Merge
//!
//! Reconciles real-estate listings scraped from several independent sources
//! into one canonical, deduplicated dataset per category (property type ×
//! sale/rent).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────────┐
//! │ Source JSON  │──▶│ Standardize  │──▶│ Geocode  │──▶│ Match+Merge  │──▶ resultados_<cat>.json
//! │ per category │   │  + filters   │   │ (cached) │   │ (accumulate) │
//! └──────────────┘   └──────────────┘   └──────────┘   └──────────────┘
//!        one tokio task per category, bounded by a semaphore;
//!        the geocode cache and request counter are shared
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Canonical listing types |
//! | [`parse`] | Price, area and count parsers |
//! | [`standardize`] | Per-source field mapping and business filters |
//! | [`geocode`] | Cached address resolution |
//! | [`matcher`] | Duplicate detection |
//! | [`merge`] | Richness-based duplicate resolution |
//! | [`input`] | Source file loading |
//! | [`worker`] | Per-category processing |
//! | [`pipeline`] | Parallel orchestration |
//! | [`progress`] | Progress reporting |
//! | [`categories`] | `lmerge categories` listing |
//! | [`stats`] | `lmerge stats` summary |

pub mod categories;
pub mod config;
pub mod geocode;
pub mod input;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod standardize;
pub mod stats;
pub mod worker;
