//! Core data models used throughout the merge pipeline.
//!
//! These types represent the canonical listings that flow from the
//! standardizer, through geocoding and deduplication, into the per-category
//! output files.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

// Portuguese stems match anywhere (links use `venda-apartamento`); English
// words must stand alone so "slot" or "island" do not classify.
static RE_HOUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)casa|\bhouse\b").expect("valid house regex"));
static RE_APARTMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)apartamento|\bapartment\b").expect("valid apartment regex")
});
static RE_LAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)terreno|lote|\bland\b|\blot\b").expect("valid land regex")
});

/// Kind of property a listing describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    House,
    Apartment,
    Land,
}

impl PropertyType {
    fn pattern(&self) -> &'static Regex {
        match self {
            PropertyType::House => &RE_HOUSE,
            PropertyType::Apartment => &RE_APARTMENT,
            PropertyType::Land => &RE_LAND,
        }
    }

    /// Search `text` for a type keyword. House wins over Apartment, which
    /// wins over Land.
    pub fn detect(text: &str) -> Option<Self> {
        [
            PropertyType::House,
            PropertyType::Apartment,
            PropertyType::Land,
        ]
        .into_iter()
        .find(|t| t.pattern().is_match(text))
    }

    /// Whether residential counts (bedrooms, bathrooms, parking) apply.
    pub fn is_residential(&self) -> bool {
        !matches!(self, PropertyType::Land)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::House => write!(f, "House"),
            PropertyType::Apartment => write!(f, "Apartment"),
            PropertyType::Land => write!(f, "Land"),
        }
    }
}

/// Whether a listing is offered for sale or for rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Sale,
    Rent,
}

impl Purpose {
    /// Interpret a purpose label such as `"venda"` or `"Aluguel"`.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if ["venda", "compra", "comprar", "sale"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Some(Purpose::Sale)
        } else if ["aluguel", "alugar", "locacao", "locação", "rent"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Some(Purpose::Rent)
        } else {
            None
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Sale => write!(f, "Sale"),
            Purpose::Rent => write!(f, "Rent"),
        }
    }
}

/// A resolved latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Canonical listing, independent of the source schema it came from.
///
/// `price` and `area_m2` are strictly positive when present, and
/// `secondary_sources` never contains `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub property_type: PropertyType,
    pub purpose: Purpose,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub area_m2: Option<f64>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub parking: Option<String>,
    pub link: Option<String>,
    pub geocoordinate: Option<GeoPoint>,
    pub source: String,
    #[serde(default)]
    pub secondary_sources: Vec<String>,
}

impl Listing {
    /// An empty listing of the given classification, owned by `source`.
    pub fn new(property_type: PropertyType, purpose: Purpose, source: &str) -> Self {
        Self {
            property_type,
            purpose,
            address: None,
            price: None,
            area_m2: None,
            bedrooms: None,
            bathrooms: None,
            parking: None,
            link: None,
            geocoordinate: None,
            source: source.to_string(),
            secondary_sources: Vec::new(),
        }
    }

    pub fn has_link(&self) -> bool {
        self.link.as_deref().is_some_and(|l| !l.trim().is_empty())
    }

    /// Record `source` as a secondary source unless it is the owner or
    /// already listed.
    pub fn add_secondary_source(&mut self, source: &str) {
        if source != self.source && !self.secondary_sources.iter().any(|s| s == source) {
            self.secondary_sources.push(source.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_type_precedence() {
        assert_eq!(
            PropertyType::detect("Casa em condomínio"),
            Some(PropertyType::House)
        );
        assert_eq!(
            PropertyType::detect("APARTAMENTO 3 quartos"),
            Some(PropertyType::Apartment)
        );
        assert_eq!(
            PropertyType::detect("Lote 360m² Setor Sul"),
            Some(PropertyType::Land)
        );
        assert_eq!(PropertyType::detect("Sala comercial"), None);
    }

    #[test]
    fn detect_english_keywords_as_whole_words() {
        assert_eq!(PropertyType::detect("Parking slot downtown"), None);
        assert_eq!(PropertyType::detect("Island view studio"), None);
        assert_eq!(PropertyType::detect("Townhouse for rent"), None);
        assert_eq!(PropertyType::detect("Corner lot"), Some(PropertyType::Land));
        assert_eq!(PropertyType::detect("Family HOUSE"), Some(PropertyType::House));
        // Portuguese stems still match inside links and plurals.
        assert_eq!(
            PropertyType::detect("https://zap.example/venda-apartamentos-goiania"),
            Some(PropertyType::Apartment)
        );
        assert_eq!(PropertyType::detect("Lotes em Trindade"), Some(PropertyType::Land));
    }

    #[test]
    fn detect_purpose_labels() {
        assert_eq!(Purpose::detect("Venda"), Some(Purpose::Sale));
        assert_eq!(Purpose::detect("Locação"), Some(Purpose::Rent));
        assert_eq!(Purpose::detect("aluguel"), Some(Purpose::Rent));
        assert_eq!(Purpose::detect("permuta"), None);
    }

    #[test]
    fn secondary_sources_exclude_owner_and_repeats() {
        let mut listing = Listing::new(PropertyType::House, Purpose::Sale, "olx");
        listing.add_secondary_source("olx");
        listing.add_secondary_source("zapimoveis");
        listing.add_secondary_source("zapimoveis");
        assert_eq!(listing.secondary_sources, vec!["zapimoveis".to_string()]);
    }

    #[test]
    fn listing_serializes_with_null_geocoordinate() {
        let listing = Listing::new(PropertyType::Land, Purpose::Sale, "invest");
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["property_type"], "Land");
        assert_eq!(json["purpose"], "Sale");
        assert!(json["geocoordinate"].is_null());
        assert_eq!(json["secondary_sources"], serde_json::json!([]));
    }
}
