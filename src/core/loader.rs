//! Acquisition of the o200k_base vocabulary file.
//!
//! The tokenizer core itself never touches the network; this module is the
//! collaborator that resolves, caches, and verifies the vocabulary file and
//! hands merge pairs to [`crate::core::Tokenizer`]. Resolution order:
//!
//! 1. `TIKTOKEN_ENCODINGS_BASE` — a local directory that already holds
//!    `o200k_base.tiktoken`; nothing is downloaded.
//! 2. The cache directory (`HARMONIUM_CACHE_DIR`, or a well-known
//!    subdirectory of the system temp dir).
//! 3. A download from the encodings base URL, SHA-256 verified. Forbidden
//!    when `TIKTOKEN_OFFLINE=1`.
//!
//! None of these knobs change tokenizer output, only where bytes come from.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

use super::vocab::{load_tiktoken_file, VocabError, VocabPairs};

const O200K_FILE: &str = "o200k_base.tiktoken";
const DEFAULT_BASE_URL: &str = "https://openaipublic.blob.core.windows.net/encodings/";
const O200K_SHA256: &str = "446a9538cb6c348e3516120d7c08b09f57c36495e2acfffe59a5bf8b0cfb1a2d";

const ENV_ENCODINGS_BASE: &str = "TIKTOKEN_ENCODINGS_BASE";
const ENV_OFFLINE: &str = "TIKTOKEN_OFFLINE";
const ENV_HTTP_TIMEOUT: &str = "TIKTOKEN_HTTP_TIMEOUT";
const ENV_CACHE_DIR: &str = "HARMONIUM_CACHE_DIR";
const ENV_BASE_URL: &str = "HARMONIUM_ENCODINGS_URL";

fn cache_dir() -> Result<PathBuf, VocabError> {
    let dir = match std::env::var_os(ENV_CACHE_DIR) {
        Some(d) => PathBuf::from(d),
        None => std::env::temp_dir().join("harmonium-encodings"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn base_url() -> String {
    let mut url =
        std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

fn http_timeout() -> Duration {
    std::env::var(ENV_HTTP_TIMEOUT)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30))
}

fn offline() -> bool {
    std::env::var(ENV_OFFLINE).map(|v| v == "1").unwrap_or(false)
}

fn download(url: &str, dest: &std::path::Path) -> Result<String, VocabError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(http_timeout())
        .build()
        .map_err(|e| VocabError::Download(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| VocabError::Download(e.to_string()))?;
    if !response.status().is_success() {
        return Err(VocabError::Download(format!(
            "unexpected status {} for {url}",
            response.status()
        )));
    }
    let body = response
        .bytes()
        .map_err(|e| VocabError::Download(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&body);
    let sum = format!("{:x}", hasher.finalize());

    std::fs::write(dest, &body)?;
    Ok(sum)
}

/// Loads the o200k_base merge pairs, downloading and caching the vocabulary
/// file when necessary.
pub fn load_o200k() -> Result<VocabPairs, VocabError> {
    if let Some(base) = std::env::var_os(ENV_ENCODINGS_BASE) {
        let path = PathBuf::from(base).join(O200K_FILE);
        tracing::debug!(path = %path.display(), "loading o200k vocabulary from encodings base");
        return load_tiktoken_file(&path);
    }

    let path = cache_dir()?.join(O200K_FILE);
    if !path.exists() {
        if offline() {
            return Err(VocabError::Offline(format!(
                "{} not cached; set {ENV_ENCODINGS_BASE} to a directory containing it or unset {ENV_OFFLINE}",
                path.display()
            )));
        }
        let url = format!("{}{O200K_FILE}", base_url());
        tracing::debug!(%url, "downloading o200k vocabulary");
        let sum = download(&url, &path)?;
        if !sum.eq_ignore_ascii_case(O200K_SHA256) {
            let _ = std::fs::remove_file(&path);
            return Err(VocabError::ChecksumMismatch {
                got: sum,
                want: O200K_SHA256.to_string(),
            });
        }
    }

    load_tiktoken_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        // The default already carries one; the normalization is for overrides.
        assert!(base_url().ends_with('/'));
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(http_timeout(), Duration::from_secs(30));
    }
}
