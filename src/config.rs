use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{PropertyType, Purpose};
use crate::standardize::SourceKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    pub sources: Vec<SourceConfig>,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_input_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("resultado")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub kind: Option<SourceKind>,
}

impl SourceConfig {
    /// Explicit kind, else the kind named like the source, else generic.
    pub fn kind(&self) -> SourceKind {
        self.kind
            .unwrap_or_else(|| SourceKind::from_name(&self.name))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub purpose: Option<Purpose>,
    pub files: Vec<String>,
}

impl CategoryConfig {
    /// Declared type, falling back to keywords in the category name
    /// (`casa_venda` → House).
    pub fn declared_type(&self) -> Option<PropertyType> {
        self.property_type
            .or_else(|| PropertyType::detect(&self.name))
    }

    /// Declared purpose, falling back to keywords in the category name.
    pub fn declared_purpose(&self) -> Option<Purpose> {
        self.purpose.or_else(|| Purpose::detect(&self.name))
    }

    pub fn output_file_name(&self) -> String {
        format!("resultados_{}.json", self.name)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_land_sale_max_price")]
    pub land_sale_max_price: f64,
    #[serde(default = "default_house_area_min")]
    pub house_area_min: f64,
    #[serde(default = "default_house_area_max")]
    pub house_area_max: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            land_sale_max_price: default_land_sale_max_price(),
            house_area_min: default_house_area_min(),
            house_area_max: default_house_area_max(),
        }
    }
}

fn default_land_sale_max_price() -> f64 {
    150_000.0
}
fn default_house_area_min() -> f64 {
    90.0
}
fn default_house_area_max() -> f64 {
    110.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_post_call_delay_ms")]
    pub post_call_delay_ms: u64,
    #[serde(default = "default_warn_every")]
    pub warn_every: u64,
    #[serde(default = "default_total_requests_warning")]
    pub total_requests_warning: u64,
    #[serde(default = "default_region_qualifier")]
    pub region_qualifier: String,
    #[serde(default = "default_region_markers")]
    pub region_markers: Vec<String>,
    #[serde(default)]
    pub bounds: Option<BoundsConfig>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            post_call_delay_ms: default_post_call_delay_ms(),
            warn_every: default_warn_every(),
            total_requests_warning: default_total_requests_warning(),
            region_qualifier: default_region_qualifier(),
            region_markers: default_region_markers(),
            bounds: None,
        }
    }
}

impl GeocodingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "nominatim".to_string()
}
fn default_endpoint() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_user_agent() -> String {
    concat!("listing-merge/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_post_call_delay_ms() -> u64 {
    1500
}
fn default_warn_every() -> u64 {
    50
}
fn default_total_requests_warning() -> u64 {
    200
}
fn default_region_qualifier() -> String {
    "Goiânia, GO, Brasil".to_string()
}
fn default_region_markers() -> Vec<String> {
    [
        "goiania",
        "goias",
        "aparecida de goiania",
        "senador canedo",
        "trindade",
        "goianira",
        "hidrolandia",
        "neropolis",
        "inhumas",
        "anapolis",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Coordinates outside this box are treated as failed resolutions.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundsConfig {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundsConfig {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkersConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

fn default_max_workers() -> usize {
    4
}

impl Config {
    /// The built-in source and category layout used when no configuration
    /// file is given.
    pub fn default_pipeline() -> Self {
        let source = |name: &str, dir: &str| SourceConfig {
            name: name.to_string(),
            dir: PathBuf::from(dir),
            kind: None,
        };
        let category = |name: &str, files: [&str; 5]| CategoryConfig {
            name: name.to_string(),
            property_type: None,
            purpose: None,
            files: files.iter().map(|f| f.to_string()).collect(),
        };

        Self {
            paths: PathsConfig::default(),
            sources: vec![
                source("olx", "olx_data"),
                source("zapimoveis", "zapimoveis_data"),
                source("vivareal", "vivareal_data"),
                source("invest", "investt_data"),
                source("facilitaimoveis", "facilitaimoveis_data"),
            ],
            categories: vec![
                category(
                    "casa_venda",
                    [
                        "casas_compra.json",
                        "casas_compra.json",
                        "casas_compra.json",
                        "casas_venda.json",
                        "casas_venda.json",
                    ],
                ),
                category(
                    "apartamento_venda",
                    [
                        "apartamentos_compra.json",
                        "apartamentos_compra.json",
                        "apartamentos_compra.json",
                        "apartamentos_venda.json",
                        "apartamentos_venda.json",
                    ],
                ),
                category("casa_aluguel", ["casas_aluguel.json"; 5]),
                category("apartamento_aluguel", ["apartamentos_aluguel.json"; 5]),
                category(
                    "terreno_venda",
                    [
                        "terrenos_terrenos.json",
                        "lote_compra.json",
                        "terreno_compra.json",
                        "terrenos_compra.json",
                        "terrenos_venda.json",
                    ],
                ),
            ],
            filters: FilterConfig::default(),
            geocoding: GeocodingConfig::default(),
            workers: WorkersConfig::default(),
        }
    }

    /// Input file for `category`'s slot belonging to `source`.
    pub fn input_path(&self, source: &SourceConfig, file: &str) -> PathBuf {
        self.paths.input_root.join(&source.dir).join(file)
    }

    pub fn output_path(&self, category: &CategoryConfig) -> PathBuf {
        self.paths.output_dir.join(category.output_file_name())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        bail!("at least one [[sources]] entry is required");
    }
    if config.categories.is_empty() {
        bail!("at least one [[categories]] entry is required");
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.name.trim().is_empty() {
            bail!("sources.name must not be empty");
        }
        if !seen.insert(source.name.as_str()) {
            bail!("duplicate source name: '{}'", source.name);
        }
    }

    let mut seen = HashSet::new();
    for category in &config.categories {
        if category.name.trim().is_empty() {
            bail!("categories.name must not be empty");
        }
        if !seen.insert(category.name.as_str()) {
            bail!("duplicate category name: '{}'", category.name);
        }
    }

    // Validate filters
    let filters = &config.filters;
    if filters.land_sale_max_price <= 0.0 {
        bail!("filters.land_sale_max_price must be > 0");
    }
    if filters.house_area_min <= 0.0 || filters.house_area_min > filters.house_area_max {
        bail!("filters.house_area_min must be > 0 and <= filters.house_area_max");
    }

    // Validate geocoding
    let geo = &config.geocoding;
    if geo.warn_every == 0 {
        bail!("geocoding.warn_every must be >= 1");
    }
    if geo.timeout_secs == 0 {
        bail!("geocoding.timeout_secs must be >= 1");
    }
    if let Some(b) = geo.bounds {
        if b.lat_min > b.lat_max || b.lon_min > b.lon_max {
            bail!("geocoding.bounds must satisfy lat_min <= lat_max and lon_min <= lon_max");
        }
    }
    match geo.provider.as_str() {
        "disabled" | "nominatim" => {}
        other => bail!(
            "Unknown geocoding provider: '{}'. Must be disabled or nominatim.",
            other
        ),
    }

    if config.workers.max_workers == 0 {
        bail!("workers.max_workers must be >= 1");
    }

    Ok(())
}
