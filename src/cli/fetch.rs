use crate::error::Result;
use crate::fetch::ensure_source;
use crate::fmt::format_bytes;
use crate::settings::{get_cache_dir, load_settings};

pub fn run(url: Option<String>, force: bool) -> Result<()> {
    let settings = load_settings();
    let url = url.unwrap_or(settings.source_url);
    let result = ensure_source(&url, &get_cache_dir(), force)?;

    if result.downloaded {
        println!(
            "Downloaded {} to {}",
            format_bytes(result.bytes),
            result.path.display()
        );
    } else {
        println!(
            "Using cached {} ({}). Pass --force to download again.",
            result.path.display(),
            format_bytes(result.bytes)
        );
    }
    Ok(())
}
