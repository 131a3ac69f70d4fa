use anyhow::Result;

use crate::config::Config;

pub fn list_categories(config: &Config) -> Result<()> {
    println!(
        "{:<24} {:<10} {:<10} OUTPUT",
        "CATEGORY", "TYPE", "PURPOSE"
    );
    for category in &config.categories {
        let output = config.output_path(category);
        let status = if output.exists() { "done" } else { "pending" };
        let show = |v: Option<String>| v.unwrap_or_else(|| "inferred".to_string());
        println!(
            "{:<24} {:<10} {:<10} {} ({})",
            category.name,
            show(category.declared_type().map(|t| t.to_string())),
            show(category.declared_purpose().map(|p| p.to_string())),
            output.display(),
            status
        );

        for (source, file) in config.sources.iter().zip(&category.files) {
            let path = config.input_path(source, file);
            let found = if path.exists() { "found" } else { "missing" };
            println!("    {:<20} {:<8} {}", source.name, found, path.display());
        }
    }

    Ok(())
}
