use async_trait::async_trait;
use listing_merge::config::{load_config, Config};
use listing_merge::geocode::Resolver;
use listing_merge::models::{GeoPoint, Listing};
use listing_merge::pipeline::{run_pipeline, CategoryOutcome};
use listing_merge::progress::NoProgress;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Resolves every query to the same point and records what it was asked.
struct RecordingResolver {
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl RecordingResolver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Resolver for RecordingResolver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn resolve(&self, query: &str) -> anyhow::Result<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        Ok(Some(GeoPoint::new(-16.70, -49.26)))
    }
}

fn write_json(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_json(
        &root.join("olx_data/casas_compra.json"),
        r#"[
  {"titulo": "Casa 3 quartos", "preco": "R$ 300.000", "area_m2": "100 m²", "quartos": "3",
   "localizacao": "Rua A, 100, Setor Sul, Goiânia", "link": "https://olx.example/1"},
  {"titulo": "Casa grande", "preco": "R$ 900.000", "area_m2": "250 m²",
   "localizacao": "Rua B, Setor Bueno"}
]"#,
    );
    write_json(
        &root.join("vivareal_data/casas_venda.json"),
        r#"[
  {"tipo": "Casa", "finalidade": "Venda", "preco": "R$ 305.000", "area_m2": "98", "quartos": "3",
   "banheiros": "2", "vagas": "2", "endereco": "Rua A 100 Setor Sul",
   "link": "https://vivareal.example/9"}
]"#,
    );
    // A single object instead of an array contributes nothing.
    write_json(
        &root.join("olx_data/lotes.json"),
        r#"{"titulo": "Lote", "preco": "R$ 90.000"}"#,
    );
    write_json(
        &root.join("vivareal_data/terrenos.json"),
        r#"[
  {"tipo": "Lote", "finalidade": "Venda", "preco": "R$ 200.000", "endereco": "Setor Sul"},
  {"tipo": "Lote", "finalidade": "Venda", "preco": "R$ 120.000", "endereco": "Rua C, Jardim Goiás"}
]"#,
    );

    let config_content = format!(
        r#"[paths]
input_root = "{root}"
output_dir = "{root}/resultado"

[[sources]]
name = "olx"
dir = "olx_data"

[[sources]]
name = "vivareal"
dir = "vivareal_data"

[[categories]]
name = "casa_venda"
files = ["casas_compra.json", "casas_venda.json"]

[[categories]]
name = "terreno_venda"
files = ["lotes.json", "terrenos.json", "ignored.json"]

[geocoding]
post_call_delay_ms = 0
"#,
        root = root.display()
    );
    let config_path = root.join("listing-merge.toml");
    fs::write(&config_path, config_content).unwrap();

    let config = load_config(&config_path).unwrap();
    (tmp, config)
}

fn output(config: &Config, name: &str) -> PathBuf {
    config.paths.output_dir.join(format!("resultados_{}.json", name))
}

fn read_output(config: &Config, name: &str) -> Vec<Listing> {
    serde_json::from_str(&fs::read_to_string(output(config, name)).unwrap()).unwrap()
}

#[tokio::test]
async fn merges_duplicates_across_sources() {
    let (_tmp, config) = setup();
    let resolver = RecordingResolver::new();

    let summary = run_pipeline(&config, resolver.clone(), Arc::new(NoProgress), &[])
        .await
        .unwrap();
    assert_eq!(summary.failed(), 0);

    let casa = summary.report("casa_venda").unwrap();
    assert_eq!(casa.loaded, 3);
    assert_eq!(casa.written, 1);
    assert_eq!(casa.duplicates, 1);
    assert_eq!(casa.filtered, 1);

    let listings = read_output(&config, "casa_venda");
    assert_eq!(listings.len(), 1);
    let merged = &listings[0];
    assert_eq!(merged.source, "vivareal");
    assert_eq!(merged.secondary_sources, vec!["olx"]);
    assert_eq!(merged.bathrooms.as_deref(), Some("2"));
    assert!(merged.geocoordinate.is_some());
}

#[tokio::test]
async fn filtered_land_is_absent_and_single_object_file_is_empty() {
    let (_tmp, config) = setup();
    let summary = run_pipeline(&config, RecordingResolver::new(), Arc::new(NoProgress), &[])
        .await
        .unwrap();

    let terreno = summary.report("terreno_venda").unwrap();
    assert_eq!(terreno.loaded, 2);
    assert_eq!(terreno.filtered, 1);
    assert_eq!(terreno.written, 1);

    let listings = read_output(&config, "terreno_venda");
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].price, Some(120_000.0));
    assert!(listings.iter().all(|l| l.price != Some(200_000.0)));
}

#[tokio::test]
async fn filtered_records_are_never_geocoded() {
    let (_tmp, config) = setup();
    let resolver = RecordingResolver::new();
    let summary = run_pipeline(&config, resolver.clone(), Arc::new(NoProgress), &[])
        .await
        .unwrap();

    // Rua A (two spellings) and Rua C; Rua B and Setor Sul are filtered first.
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.geocode_requests, 3);

    let queries = resolver.queries.lock().unwrap();
    assert!(queries.iter().all(|q| !q.contains("Rua B")));
    assert!(queries
        .iter()
        .any(|q| q == "Rua A 100 Setor Sul, Goiânia, GO, Brasil"));
}

#[tokio::test]
async fn rerun_skips_existing_outputs() {
    let (_tmp, config) = setup();
    run_pipeline(&config, RecordingResolver::new(), Arc::new(NoProgress), &[])
        .await
        .unwrap();
    let before = fs::read(output(&config, "casa_venda")).unwrap();

    let resolver = RecordingResolver::new();
    let summary = run_pipeline(&config, resolver.clone(), Arc::new(NoProgress), &[])
        .await
        .unwrap();

    assert!(summary
        .categories
        .iter()
        .all(|(_, o)| matches!(o, CategoryOutcome::Skipped)));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read(output(&config, "casa_venda")).unwrap(), before);
}

#[tokio::test]
async fn only_runs_selected_categories() {
    let (_tmp, config) = setup();
    let summary = run_pipeline(
        &config,
        RecordingResolver::new(),
        Arc::new(NoProgress),
        &["terreno_venda".to_string()],
    )
    .await
    .unwrap();

    assert_eq!(summary.categories.len(), 1);
    assert!(output(&config, "terreno_venda").exists());
    assert!(!output(&config, "casa_venda").exists());
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let (_tmp, config) = setup();
    let result = run_pipeline(
        &config,
        RecordingResolver::new(),
        Arc::new(NoProgress),
        &["escritorio".to_string()],
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn failed_category_does_not_affect_siblings() {
    let (_tmp, config) = setup();
    // A directory where the temporary output file should go makes the write fail.
    fs::create_dir_all(
        config
            .paths
            .output_dir
            .join("resultados_casa_venda.json.tmp"),
    )
    .unwrap();

    let summary = run_pipeline(&config, RecordingResolver::new(), Arc::new(NoProgress), &[])
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(summary
        .categories
        .iter()
        .any(|(n, o)| n == "casa_venda" && matches!(o, CategoryOutcome::Failed(_))));
    assert!(summary.report("terreno_venda").is_some());
    assert!(!output(&config, "casa_venda").exists());
    assert!(output(&config, "terreno_venda").exists());
}
