//! Source record standardization.
//!
//! Every source publishes its own JSON shape. A [`SourceKind`] carries the
//! field names for one shape; [`extract`] reads a raw record through them,
//! and [`standardize`] applies the category classification and the
//! business filters to produce a canonical [`Listing`].

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::config::{CategoryConfig, FilterConfig};
use crate::models::{Listing, PropertyType, Purpose};
use crate::parse::{parse_area, parse_count, parse_price, value_text};

/// Record layout of a known source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Olx,
    ZapImoveis,
    VivaReal,
    Invest,
    FacilitaImoveis,
    Generic,
}

/// Field names consulted for each canonical attribute, in priority order.
struct FieldMap {
    type_fields: &'static [&'static str],
    purpose_fields: &'static [&'static str],
    price_fields: &'static [&'static str],
    area_fields: &'static [&'static str],
    bedroom_fields: &'static [&'static str],
    bathroom_fields: &'static [&'static str],
    parking_fields: &'static [&'static str],
    address_fields: &'static [&'static str],
    link_fields: &'static [&'static str],
}

impl SourceKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "olx" => SourceKind::Olx,
            "zapimoveis" | "zap" => SourceKind::ZapImoveis,
            "vivareal" => SourceKind::VivaReal,
            "invest" | "investt" => SourceKind::Invest,
            "facilitaimoveis" | "facilita" => SourceKind::FacilitaImoveis,
            _ => SourceKind::Generic,
        }
    }

    fn field_map(&self) -> FieldMap {
        match self {
            SourceKind::Olx => FieldMap {
                type_fields: &["titulo"],
                purpose_fields: &[],
                price_fields: &["preco"],
                area_fields: &["area_m2"],
                bedroom_fields: &["quartos"],
                bathroom_fields: &[],
                parking_fields: &[],
                address_fields: &["localizacao"],
                link_fields: &["link"],
            },
            SourceKind::ZapImoveis => FieldMap {
                type_fields: &["titulo", "link"],
                purpose_fields: &[],
                price_fields: &["preco"],
                area_fields: &["area_m2"],
                bedroom_fields: &["quartos"],
                bathroom_fields: &["banheiros"],
                parking_fields: &["vagas"],
                address_fields: &["endereco", "titulo"],
                link_fields: &["link"],
            },
            SourceKind::VivaReal => FieldMap {
                type_fields: &["tipo", "link"],
                purpose_fields: &["finalidade"],
                price_fields: &["preco"],
                area_fields: &["area_m2"],
                bedroom_fields: &["quartos"],
                bathroom_fields: &["banheiros"],
                parking_fields: &["vagas"],
                address_fields: &["endereco"],
                link_fields: &["link"],
            },
            SourceKind::Invest => FieldMap {
                type_fields: &["tipo", "titulo"],
                purpose_fields: &[],
                price_fields: &["venda", "locacao"],
                area_fields: &["area"],
                bedroom_fields: &["quartos"],
                bathroom_fields: &["banheiros"],
                parking_fields: &["vagas"],
                address_fields: &["localizacao"],
                link_fields: &["link", "urlDetalhes", "url"],
            },
            SourceKind::FacilitaImoveis => FieldMap {
                type_fields: &["tipo"],
                purpose_fields: &["negocio"],
                price_fields: &["preco"],
                area_fields: &["area_m2"],
                bedroom_fields: &["dormitorios"],
                bathroom_fields: &["banheiros"],
                parking_fields: &["vagas"],
                address_fields: &["endereco"],
                link_fields: &["link"],
            },
            SourceKind::Generic => FieldMap {
                type_fields: &["tipo", "titulo", "link"],
                purpose_fields: &["finalidade", "negocio"],
                price_fields: &["preco", "price", "venda", "locacao"],
                area_fields: &["area_m2", "area"],
                bedroom_fields: &["quartos", "dormitorios", "bedrooms"],
                bathroom_fields: &["banheiros", "bathrooms"],
                parking_fields: &["vagas", "parking"],
                address_fields: &["endereco", "localizacao", "address", "titulo"],
                link_fields: &["link", "url"],
            },
        }
    }
}

/// Attributes read from a raw record before classification is enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub property_type: Option<PropertyType>,
    pub purpose: Option<Purpose>,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub area_m2: Option<f64>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub parking: Option<String>,
    pub link: Option<String>,
}

/// Why a classified record was dropped by the business filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    LandPriceCeiling,
    HouseAreaBand,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LandPriceCeiling => write!(f, "land sale price above ceiling"),
            Self::HouseAreaBand => write!(f, "house area outside band"),
        }
    }
}

/// Result of standardizing one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Standardized {
    Listing(Listing),
    /// No property type or purpose could be determined.
    Unclassified,
    Filtered(FilterReason),
}

/// First non-null, non-blank value among `keys`.
fn first_present<'v>(record: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().filter_map(|k| record.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    first_present(record, keys)
        .and_then(value_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a raw record through the field map of `kind`. Missing keys and
/// wrongly typed values leave the attribute empty.
pub fn extract(record: &Value, kind: SourceKind) -> Extracted {
    let map = kind.field_map();

    let property_type = map.type_fields.iter().find_map(|key| {
        record
            .get(*key)
            .and_then(Value::as_str)
            .and_then(PropertyType::detect)
    });

    let purpose = first_text(record, map.purpose_fields).and_then(|p| Purpose::detect(&p));

    Extracted {
        property_type,
        purpose,
        address: first_text(record, map.address_fields),
        price: first_present(record, map.price_fields).and_then(parse_price),
        area_m2: first_present(record, map.area_fields).and_then(parse_area),
        bedrooms: first_present(record, map.bedroom_fields).and_then(parse_count),
        bathrooms: first_present(record, map.bathroom_fields).and_then(parse_count),
        parking: first_present(record, map.parking_fields).and_then(parse_count),
        link: first_text(record, map.link_fields),
    }
}

impl Extracted {
    /// Apply the category's declared classification and build the listing.
    ///
    /// A declared type or purpose always replaces the inferred one; `None`
    /// means neither source could classify the record.
    pub fn into_listing(self, source: &str, category: &CategoryConfig) -> Option<Listing> {
        let property_type = category.declared_type().or(self.property_type)?;
        let purpose = category.declared_purpose().or(self.purpose)?;

        let mut listing = Listing::new(property_type, purpose, source);
        listing.address = self.address;
        listing.price = self.price;
        listing.area_m2 = self.area_m2;
        listing.bedrooms = self.bedrooms;
        listing.bathrooms = self.bathrooms;
        listing.parking = self.parking;
        listing.link = self.link;
        Some(listing)
    }
}

/// Business rule filters. `None` keeps the listing.
pub fn check_filters(listing: &Listing, filters: &FilterConfig) -> Option<FilterReason> {
    if listing.property_type == PropertyType::Land && listing.purpose == Purpose::Sale {
        if let Some(price) = listing.price {
            if price > filters.land_sale_max_price {
                return Some(FilterReason::LandPriceCeiling);
            }
        }
    }
    if listing.property_type == PropertyType::House {
        if let Some(area) = listing.area_m2 {
            if !(filters.house_area_min..=filters.house_area_max).contains(&area) {
                return Some(FilterReason::HouseAreaBand);
            }
        }
    }
    None
}

/// Standardize one raw record from `source` into `category`.
pub fn standardize(
    record: &Value,
    source: &str,
    kind: SourceKind,
    category: &CategoryConfig,
    filters: &FilterConfig,
) -> Standardized {
    let Some(listing) = extract(record, kind).into_listing(source, category) else {
        return Standardized::Unclassified;
    };
    match check_filters(&listing, filters) {
        Some(reason) => Standardized::Filtered(reason),
        None => Standardized::Listing(listing),
    }
}
