//! Duplicate detection between canonical listings.
//!
//! [`is_duplicate`] is a short-circuit chain: classification, location,
//! bedroom count, then price/area consistency. Each step can only reject.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{GeoPoint, Listing, PropertyType};
use crate::parse::{count_digits, fold_text};

/// Maximum per-axis coordinate difference, in degrees, for two listings to
/// share a location.
pub const LOCATION_TOLERANCE_DEG: f64 = 0.001;

/// Maximum relative difference for two prices or two areas to be similar.
pub const SIMILARITY_TOLERANCE: f64 = 0.05;

const MIN_ADDRESS_LEN: usize = 5;

static RE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(apto|apartamento|casa|numero|num|lote|terreno|edificio|condominio|residencia|bloco|torre)\b\s*[\w.-]*",
    )
    .expect("valid noise regex")
});
static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid separator regex"));

/// Relative similarity within [`SIMILARITY_TOLERANCE`].
///
/// Two zeros are similar even though zero never survives parsing; a single
/// zero never is.
pub fn similar(x: f64, y: f64) -> bool {
    if x == 0.0 && y == 0.0 {
        return true;
    }
    if x == 0.0 || y == 0.0 {
        return false;
    }
    (x - y).abs() / x.max(y) <= SIMILARITY_TOLERANCE
}

fn similar_opt(x: Option<f64>, y: Option<f64>) -> bool {
    match (x, y) {
        (Some(x), Some(y)) => similar(x, y),
        _ => false,
    }
}

/// Address reduced to comparable words, or `None` when too short to be
/// meaningful.
pub fn normalize_address(address: &str) -> Option<String> {
    let folded = fold_text(address);
    let folded = folded.trim();
    if folded.len() <= MIN_ADDRESS_LEN {
        return None;
    }
    let stripped = RE_NOISE.replace_all(folded, " ");
    let cleaned = RE_NON_ALNUM.replace_all(&stripped, " ").trim().to_string();
    (cleaned.len() > MIN_ADDRESS_LEN).then_some(cleaned)
}

fn near(a: GeoPoint, b: GeoPoint) -> bool {
    (a.latitude - b.latitude).abs() <= LOCATION_TOLERANCE_DEG
        && (a.longitude - b.longitude).abs() <= LOCATION_TOLERANCE_DEG
}

/// Coordinates within tolerance, or one normalized address contained in
/// the other.
pub fn same_location(a: &Listing, b: &Listing) -> bool {
    if let (Some(ga), Some(gb)) = (a.geocoordinate, b.geocoordinate) {
        if near(ga, gb) {
            return true;
        }
    }

    let normalized = |l: &Listing| l.address.as_deref().and_then(normalize_address);
    match (normalized(a), normalized(b)) {
        (Some(na), Some(nb)) => na.contains(&nb) || nb.contains(&na),
        _ => false,
    }
}

/// False only when both sides state a bedroom count and the counts differ.
fn bedrooms_agree(a: &Listing, b: &Listing) -> bool {
    let count = |l: &Listing| l.bedrooms.as_deref().and_then(count_digits);
    match (count(a), count(b)) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

fn numbers_agree(a: &Listing, b: &Listing) -> bool {
    let price_comparable = a.price.is_some() && b.price.is_some();
    let area_comparable = a.area_m2.is_some() && b.area_m2.is_some();
    let price_similar = similar_opt(a.price, b.price);
    let area_similar = similar_opt(a.area_m2, b.area_m2);

    match (price_comparable, area_comparable) {
        (true, true) => price_similar && area_similar,
        (true, false) => price_similar,
        (false, true) => area_similar,
        (false, false) => true,
    }
}

/// Whether `a` and `b` describe the same physical property.
pub fn is_duplicate(a: &Listing, b: &Listing) -> bool {
    if a.property_type != b.property_type || a.purpose != b.purpose {
        return false;
    }
    if !same_location(a, b) {
        return false;
    }
    if a.property_type != PropertyType::Land && !bedrooms_agree(a, b) {
        return false;
    }
    numbers_agree(a, b)
}
