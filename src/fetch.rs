use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StormError};

pub const DEFAULT_SOURCE_URL: &str =
    "https://d396qusza40orc.cloudfront.net/repdata%2Fdata%2FStormData.csv.bz2";

pub const SOURCE_FILE_NAME: &str = "StormData.csv.bz2";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub struct FetchResult {
    pub path: PathBuf,
    pub bytes: u64,
    pub downloaded: bool,
}

pub fn cached_source_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(SOURCE_FILE_NAME)
}

fn fetch_error(url: &str, reason: impl ToString) -> StormError {
    StormError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Return the cached archive, downloading it first if it is missing, empty,
/// or `force` is set. The download lands in a `.part` file that is renamed
/// only once complete.
pub fn ensure_source(url: &str, cache_dir: &Path, force: bool) -> Result<FetchResult> {
    let path = cached_source_path(cache_dir);
    if !force {
        if let Ok(meta) = std::fs::metadata(&path) {
            if meta.len() > 0 {
                tracing::debug!(path = %path.display(), "using cached source");
                return Ok(FetchResult {
                    path,
                    bytes: meta.len(),
                    downloaded: false,
                });
            }
        }
    }

    std::fs::create_dir_all(cache_dir)?;
    let part = path.with_extension("bz2.part");
    tracing::info!(url, dest = %path.display(), "downloading source");

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| fetch_error(url, e))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_error(url, e))?;

    let bytes = {
        let mut out = BufWriter::new(File::create(&part)?);
        let n = response.copy_to(&mut out).map_err(|e| {
            let _ = std::fs::remove_file(&part);
            fetch_error(url, e)
        })?;
        out.into_inner().map_err(|e| StormError::Io(e.into_error()))?;
        n
    };
    if bytes == 0 {
        let _ = std::fs::remove_file(&part);
        return Err(fetch_error(url, "empty response body"));
    }
    std::fs::rename(&part, &path)?;
    tracing::info!(bytes, "download complete");

    Ok(FetchResult {
        path,
        bytes,
        downloaded: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(cached_source_path(dir.path()), b"BZh9").unwrap();
        let result = ensure_source("not a url", dir.path(), false).unwrap();
        assert!(!result.downloaded);
        assert_eq!(result.bytes, 4);
        assert_eq!(result.path, dir.path().join(SOURCE_FILE_NAME));
    }

    #[test]
    fn test_fetch_failure_names_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_source("not a url", dir.path(), false).unwrap_err();
        match err {
            StormError::Fetch { url, .. } => assert_eq!(url, "not a url"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cached_source_path(dir.path()).exists());
    }

    #[test]
    fn test_empty_cache_file_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(cached_source_path(dir.path()), b"").unwrap();
        assert!(ensure_source("not a url", dir.path(), false).is_err());
    }
}
