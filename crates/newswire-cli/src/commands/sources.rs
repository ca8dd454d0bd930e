use std::path::Path;

use anyhow::Result;

use newswire_core::{AppConfig, SourceCatalog};

pub fn run(config: &AppConfig, sources_file: Option<&Path>) -> Result<()> {
    let catalog = SourceCatalog::resolve(config, sources_file)?;

    if catalog.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("Sources ({}):", catalog.len());

    for region in catalog.regions() {
        println!("\n{}:", region.to_uppercase());

        for source in catalog.by_region(region) {
            let disabled = if source.enabled { "" } else { " [disabled]" };
            println!("  {}{}", source.name, disabled);
            if let Some(feed) = source.feed_target() {
                println!("    Feed: {}", feed);
            }
            if let Some(page) = source.page_target() {
                println!("    Page: {}", page);
            }
        }
    }

    Ok(())
}
