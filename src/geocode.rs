//! Address geocoding with a run-wide cache.
//!
//! [`Geocoder::resolve`] cleans a free-text address, consults the shared
//! [`GeoContext`] cache, and only on a miss calls the configured
//! [`Resolver`]. Every outcome, success or failure, is cached for the rest
//! of the run, so an address costs at most one external call.
//!
//! # Failure handling
//!
//! Timeouts, transport errors, empty responses and coordinates outside the
//! configured bounding box all collapse into [`CachedGeocode::Failed`].
//! Callers only ever see `Option<GeoPoint>`.
//!
//! # Rate behaviour
//!
//! After each external call the calling worker sleeps a fixed delay. The
//! shared request counter is observability only: it logs an advisory every
//! `warn_every` requests and never throttles.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{BoundsConfig, GeocodingConfig};
use crate::models::GeoPoint;
use crate::parse::fold_text;

static RE_LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|,)\s*(casa|apartamento|terreno|lote)\s+para\s+(comprar|alugar|vender)\s+em\s*,?\s*",
    )
    .expect("valid lead-in regex")
});
static RE_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid comma regex"));
static RE_REPEATED_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(,\s*){2,}").expect("valid repeated comma regex"));
static RE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip listing boilerplate ("Casa para comprar em ...") and tidy
/// separators so equivalent addresses share one cache key.
pub fn clean_address(address: &str) -> String {
    let without_lead_in = RE_LEAD_IN.replace_all(address, |caps: &regex::Captures| {
        if &caps[1] == "," {
            ", ".to_string()
        } else {
            String::new()
        }
    });
    let commas = RE_COMMA.replace_all(&without_lead_in, ", ");
    let commas = RE_REPEATED_COMMA.replace_all(&commas, ", ");
    let trimmed = commas.trim_matches(|c: char| c == ',' || c.is_whitespace());
    RE_SPACES.replace_all(trimmed, " ").trim().to_string()
}

// ═══════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════

/// External address resolution service.
///
/// Implementations return `Ok(None)` when the service answers but has no
/// coordinate for the query. The [`Geocoder`] enforces the time bound, so
/// implementations may block for as long as their transport allows.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name used in logs (e.g. `"nominatim"`).
    fn name(&self) -> &str;

    /// Whether this resolver performs lookups at all.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeoPoint>>;
}

/// Resolver used when geocoding is turned off.
pub struct DisabledResolver;

#[async_trait]
impl Resolver for DisabledResolver {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn resolve(&self, _query: &str) -> Result<Option<GeoPoint>> {
        Ok(None)
    }
}

/// Resolver backed by a Nominatim-compatible search endpoint.
pub struct NominatimResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimResolver {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build geocoding HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Resolver for NominatimResolver {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeoPoint>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("limit", "1"), ("q", query)])
            .send()
            .await?
            .error_for_status()?;
        let json: Value = response.json().await?;
        parse_nominatim_response(&json)
    }
}

/// Extract the first hit's coordinate from a Nominatim search response.
fn parse_nominatim_response(json: &Value) -> Result<Option<GeoPoint>> {
    let Some(results) = json.as_array() else {
        bail!("Unexpected geocoding response: expected a JSON array");
    };
    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coord = |key: &str| -> Result<f64> {
        match first.get(key) {
            Some(Value::String(s)) => s
                .parse::<f64>()
                .with_context(|| format!("Invalid '{}' in geocoding response: {}", key, s)),
            Some(Value::Number(n)) => n
                .as_f64()
                .with_context(|| format!("Invalid '{}' in geocoding response", key)),
            _ => bail!("Missing '{}' in geocoding response", key),
        }
    };

    Ok(Some(GeoPoint::new(coord("lat")?, coord("lon")?)))
}

/// Build the resolver named by `config.provider`.
pub fn create_resolver(config: &GeocodingConfig) -> Result<Arc<dyn Resolver>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledResolver)),
        "nominatim" => Ok(Arc::new(NominatimResolver::new(config)?)),
        other => bail!("Unknown geocoding provider: '{}'", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Shared state
// ═══════════════════════════════════════════════════════════════════════

/// Cached outcome for one cleaned address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedGeocode {
    Resolved(GeoPoint),
    Failed,
}

impl CachedGeocode {
    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            CachedGeocode::Resolved(p) => Some(*p),
            CachedGeocode::Failed => None,
        }
    }
}

/// Count of external resolution attempts across all workers.
pub struct RateCounter {
    count: Mutex<u64>,
    warn_every: u64,
}

impl RateCounter {
    pub fn new(warn_every: u64) -> Self {
        Self {
            count: Mutex::new(0),
            warn_every: warn_every.max(1),
        }
    }

    /// Count one attempt and return the new total.
    pub fn record_attempt(&self) -> u64 {
        let total = {
            let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
            *count += 1;
            *count
        };
        if total % self.warn_every == 0 {
            warn!(
                requests = total,
                "geocoding request count reached {}, monitor external usage", total
            );
        }
        total
    }

    pub fn total(&self) -> u64 {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// State shared by every category worker in one run.
pub struct GeoContext {
    cache: DashMap<String, CachedGeocode>,
    requests: RateCounter,
}

impl GeoContext {
    pub fn new(warn_every: u64) -> Self {
        Self {
            cache: DashMap::new(),
            requests: RateCounter::new(warn_every),
        }
    }

    pub fn cached(&self, cleaned: &str) -> Option<CachedGeocode> {
        self.cache.get(cleaned).map(|entry| *entry.value())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn requests(&self) -> u64 {
        self.requests.total()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Geocoder
// ═══════════════════════════════════════════════════════════════════════

/// Tunables for one [`Geocoder`].
#[derive(Debug, Clone)]
pub struct GeocodeSettings {
    pub timeout: Duration,
    pub post_call_delay: Duration,
    pub region_qualifier: String,
    /// Lowercase ASCII-folded place names; an address containing one is
    /// not qualified again.
    pub region_markers: Vec<String>,
    pub bounds: Option<BoundsConfig>,
}

impl GeocodeSettings {
    pub fn from_config(config: &GeocodingConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            post_call_delay: Duration::from_millis(config.post_call_delay_ms),
            region_qualifier: config.region_qualifier.clone(),
            region_markers: config.region_markers.iter().map(|m| fold_text(m)).collect(),
            bounds: config.bounds,
        }
    }
}

/// Cache-fronted address resolution. Cheap to clone; clones share the
/// same [`GeoContext`].
#[derive(Clone)]
pub struct Geocoder {
    context: Arc<GeoContext>,
    resolver: Arc<dyn Resolver>,
    settings: Arc<GeocodeSettings>,
}

impl Geocoder {
    pub fn new(
        context: Arc<GeoContext>,
        resolver: Arc<dyn Resolver>,
        settings: GeocodeSettings,
    ) -> Self {
        Self {
            context,
            resolver,
            settings: Arc::new(settings),
        }
    }

    pub fn context(&self) -> &GeoContext {
        &self.context
    }

    /// Append the region qualifier unless the address already names a
    /// place in the region.
    pub fn qualify(&self, cleaned: &str) -> String {
        let folded = fold_text(cleaned);
        if self
            .settings
            .region_markers
            .iter()
            .any(|m| folded.contains(m.as_str()))
            || self.settings.region_qualifier.is_empty()
        {
            cleaned.to_string()
        } else {
            format!("{}, {}", cleaned, self.settings.region_qualifier)
        }
    }

    /// Resolve `address` to a coordinate. Never fails; unresolvable
    /// addresses yield `None`.
    pub async fn resolve(&self, address: &str) -> Option<GeoPoint> {
        if !self.resolver.is_enabled() {
            return None;
        }

        let cleaned = clean_address(address);
        if cleaned.is_empty() {
            return None;
        }

        if let Some(hit) = self.context.cached(&cleaned) {
            debug!(address = %cleaned, ?hit, "geocode cache hit");
            return hit.point();
        }

        let query = self.qualify(&cleaned);
        self.context.requests.record_attempt();

        let outcome = match tokio::time::timeout(
            self.settings.timeout,
            self.resolver.resolve(&query),
        )
        .await
        {
            Ok(Ok(Some(point))) if self.in_bounds(point) => CachedGeocode::Resolved(point),
            Ok(Ok(Some(point))) => {
                debug!(query = %query, ?point, "geocode outside configured bounds");
                CachedGeocode::Failed
            }
            Ok(Ok(None)) => {
                debug!(query = %query, "geocode returned no coordinate");
                CachedGeocode::Failed
            }
            Ok(Err(e)) => {
                debug!(query = %query, resolver = self.resolver.name(), error = %e, "geocode failed");
                CachedGeocode::Failed
            }
            Err(_) => {
                debug!(query = %query, timeout = ?self.settings.timeout, "geocode timed out");
                CachedGeocode::Failed
            }
        };

        self.context.cache.insert(cleaned, outcome);

        if !self.settings.post_call_delay.is_zero() {
            tokio::time::sleep(self.settings.post_call_delay).await;
        }

        outcome.point()
    }

    fn in_bounds(&self, point: GeoPoint) -> bool {
        self.settings
            .bounds
            .map_or(true, |b| b.contains(point.latitude, point.longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Resolver that answers from a fixed closure and counts calls.
    struct FakeResolver {
        calls: AtomicUsize,
        answer: Option<GeoPoint>,
        fail: bool,
        stall: Option<Duration>,
    }

    impl FakeResolver {
        fn answering(answer: Option<GeoPoint>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer,
                fail: false,
                stall: None,
            }
        }
    }

    #[async_trait]
    impl Resolver for FakeResolver {
        fn name(&self) -> &str {
            "fake"
        }

        async fn resolve(&self, _query: &str) -> Result<Option<GeoPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            if self.fail {
                bail!("connection refused");
            }
            Ok(self.answer)
        }
    }

    fn settings(delay_ms: u64) -> GeocodeSettings {
        let mut s = GeocodeSettings::from_config(&GeocodingConfig::default());
        s.post_call_delay = Duration::from_millis(delay_ms);
        s
    }

    fn geocoder(resolver: Arc<FakeResolver>, delay_ms: u64) -> Geocoder {
        Geocoder::new(Arc::new(GeoContext::new(50)), resolver, settings(delay_ms))
    }

    #[test]
    fn clean_strips_lead_in_at_start() {
        assert_eq!(
            clean_address("Casa para comprar em Setor Sul, Goiânia"),
            "Setor Sul, Goiânia"
        );
        assert_eq!(
            clean_address("apartamento para alugar em , Setor Bueno"),
            "Setor Bueno"
        );
        assert_eq!(
            clean_address("Casa para comprar emSetor Sul, Goiânia"),
            "Setor Sul, Goiânia"
        );
    }

    #[test]
    fn clean_strips_lead_in_after_comma() {
        assert_eq!(
            clean_address("Rua 10, Lote para comprar em Jardim Goiás"),
            "Rua 10, Jardim Goiás"
        );
        assert_eq!(
            clean_address("Rua 10, Terreno para vender emJardim Goiás"),
            "Rua 10, Jardim Goiás"
        );
    }

    #[test]
    fn clean_collapses_separators() {
        assert_eq!(
            clean_address("  Rua A ,, 100 ,  Setor   Sul , "),
            "Rua A, 100, Setor Sul"
        );
        assert_eq!(clean_address(" , , "), "");
    }

    #[test]
    fn qualify_respects_region_markers() {
        let g = geocoder(Arc::new(FakeResolver::answering(None)), 0);
        assert_eq!(g.qualify("Setor Sul"), "Setor Sul, Goiânia, GO, Brasil");
        assert_eq!(g.qualify("Setor Sul, Goiânia"), "Setor Sul, Goiânia");
        assert_eq!(
            g.qualify("Centro, Aparecida de Goiânia"),
            "Centro, Aparecida de Goiânia"
        );
    }

    #[test]
    fn parse_nominatim_hits_and_misses() {
        let hit = json!([{ "lat": "-16.6869", "lon": "-49.2648", "display_name": "Goiânia" }]);
        assert_eq!(
            parse_nominatim_response(&hit).unwrap(),
            Some(GeoPoint::new(-16.6869, -49.2648))
        );
        assert_eq!(parse_nominatim_response(&json!([])).unwrap(), None);
        assert!(parse_nominatim_response(&json!({"error": "x"})).is_err());
        assert!(parse_nominatim_response(&json!([{ "lat": "abc", "lon": "1" }])).is_err());
    }

    #[tokio::test]
    async fn repeated_address_resolves_once() {
        let point = GeoPoint::new(-16.70, -49.26);
        let resolver = Arc::new(FakeResolver::answering(Some(point)));
        let g = geocoder(resolver.clone(), 0);

        assert_eq!(g.resolve("Rua A, 100, Setor Sul").await, Some(point));
        assert_eq!(g.resolve("Rua A, 100, Setor Sul").await, Some(point));
        // Same cleaned key after boilerplate removal.
        assert_eq!(
            g.resolve("Casa para comprar em Rua A , 100, Setor Sul").await,
            Some(point)
        );

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(g.context().requests(), 1);
        assert_eq!(g.context().cache_len(), 1);
    }

    #[tokio::test]
    async fn cached_failure_skips_call_and_delay() {
        let resolver = Arc::new(FakeResolver::answering(None));
        let g = geocoder(resolver.clone(), 300);

        let started = Instant::now();
        assert_eq!(g.resolve("Rua Sem Nome").await, None);
        assert!(started.elapsed() >= Duration::from_millis(300));

        let again = Instant::now();
        assert_eq!(g.resolve("Rua Sem Nome").await, None);
        assert!(again.elapsed() < Duration::from_millis(150));

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            g.context().cached("Rua Sem Nome"),
            Some(CachedGeocode::Failed)
        );
    }

    #[tokio::test]
    async fn transport_error_is_cached_as_failure() {
        let resolver = Arc::new(FakeResolver {
            fail: true,
            ..FakeResolver::answering(Some(GeoPoint::new(0.0, 0.0)))
        });
        let g = geocoder(resolver.clone(), 0);
        assert_eq!(g.resolve("Rua B").await, None);
        assert_eq!(g.resolve("Rua B").await, None);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_cached_as_failure() {
        let resolver = Arc::new(FakeResolver {
            stall: Some(Duration::from_secs(5)),
            ..FakeResolver::answering(Some(GeoPoint::new(-16.7, -49.2)))
        });
        let mut s = settings(0);
        s.timeout = Duration::from_millis(50);
        let g = Geocoder::new(Arc::new(GeoContext::new(50)), resolver.clone(), s);

        assert_eq!(g.resolve("Rua C").await, None);
        assert_eq!(g.context().cached("Rua C"), Some(CachedGeocode::Failed));
    }

    #[tokio::test]
    async fn out_of_bounds_coordinate_fails() {
        let resolver = Arc::new(FakeResolver::answering(Some(GeoPoint::new(-23.55, -46.63))));
        let mut s = settings(0);
        s.bounds = Some(BoundsConfig {
            lat_min: -17.2,
            lat_max: -15.8,
            lon_min: -49.8,
            lon_max: -48.5,
        });
        let g = Geocoder::new(Arc::new(GeoContext::new(50)), resolver, s);
        assert_eq!(g.resolve("Avenida Paulista").await, None);
    }

    #[tokio::test]
    async fn disabled_resolver_never_counts() {
        let g = Geocoder::new(
            Arc::new(GeoContext::new(50)),
            Arc::new(DisabledResolver),
            settings(1000),
        );
        assert_eq!(g.resolve("Rua A").await, None);
        assert_eq!(g.context().requests(), 0);
        assert_eq!(g.context().cache_len(), 0);
    }

    #[tokio::test]
    async fn blank_address_is_not_resolved() {
        let resolver = Arc::new(FakeResolver::answering(Some(GeoPoint::new(1.0, 1.0))));
        let g = geocoder(resolver.clone(), 0);
        assert_eq!(g.resolve("  ,  ").await, None);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn counter_is_shared_across_clones() {
        let resolver = Arc::new(FakeResolver::answering(None));
        let g = geocoder(resolver, 0);
        let mut handles = Vec::new();
        for i in 0..8 {
            let g = g.clone();
            handles.push(tokio::spawn(async move {
                g.resolve(&format!("Rua {}", i)).await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(g.context().requests(), 8);
        assert_eq!(g.context().cache_len(), 8);
    }

    #[test]
    fn rate_counter_counts() {
        let counter = RateCounter::new(2);
        assert_eq!(counter.record_attempt(), 1);
        assert_eq!(counter.record_attempt(), 2);
        assert_eq!(counter.total(), 2);
    }
}
