use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(cache_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = cache_dir {
        settings.cache_dir = shellexpand_path(&dir);
    }

    let cache = PathBuf::from(&settings.cache_dir);
    std::fs::create_dir_all(&cache)?;
    save_settings(&settings)?;

    println!("Settings:   {}", settings_path().display());
    println!("Cache dir:  {}", cache.display());
    println!();
    println!("Next: run `storm-report fetch` to download the data.");
    Ok(())
}
