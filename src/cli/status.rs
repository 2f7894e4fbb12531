use crate::error::Result;
use crate::fetch::cached_source_path;
use crate::fmt::format_bytes;
use crate::importer::{compute_checksum, cutoff_date};
use crate::normalizer::STATE_CORRECTIONS_VERSION;
use crate::settings::{get_cache_dir, load_settings, settings_path, CACHE_DIR_ENV};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let cache_dir = get_cache_dir();
    let source = cached_source_path(&cache_dir);

    println!("Settings:     {}", settings_path().display());
    let overridden = std::env::var(CACHE_DIR_ENV).is_ok_and(|v| !v.trim().is_empty());
    if overridden {
        println!("Cache dir:    {} (from {CACHE_DIR_ENV})", cache_dir.display());
    } else {
        println!("Cache dir:    {}", cache_dir.display());
    }
    println!("Source URL:   {}", settings.source_url);
    println!("Top N:        {}", settings.top);
    println!("Cutoff:       {}", cutoff_date().format("%Y-%m-%d"));
    println!("Corrections:  version {STATE_CORRECTIONS_VERSION}");

    if source.exists() {
        let size = std::fs::metadata(&source)?.len();
        println!();
        println!("Data file:    {}", source.display());
        println!("Size:         {}", format_bytes(size));
        println!("SHA-256:      {}", compute_checksum(&source)?);
    } else {
        println!();
        println!("Data file not found. Run `storm-report fetch` to download it.");
    }

    Ok(())
}
