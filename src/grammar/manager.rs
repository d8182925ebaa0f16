use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use sha2::{Digest, Sha256};

use crate::config::GrammarPolicy;
use crate::error::{EngineError, EngineResult};
use crate::types::GrammarRecord;

/// Downloads, verifies, and caches grammar artifacts under
/// `<cache_dir>/<language>/tree-sitter-<language>.wasm`, one `metadata.json`
/// sidecar per language recording the hash that was trusted on first use.
pub struct GrammarManager {
    cache_dir: PathBuf,
    policy: GrammarPolicy,
    http: reqwest::blocking::Client,
}

impl GrammarManager {
    pub fn new(policy: GrammarPolicy) -> Self {
        Self {
            cache_dir: PathBuf::from(&policy.cache_dir),
            policy,
            http: reqwest::blocking::Client::new(),
        }
    }

    fn language_dir(&self, language: &str) -> PathBuf {
        self.cache_dir.join(language)
    }

    fn artifact_path(&self, language: &str) -> PathBuf {
        self.language_dir(language)
            .join(format!("tree-sitter-{language}.wasm"))
    }

    /// Where `language`'s cached `.wasm` artifact would live, whether or
    /// not it has been acquired yet. Used by the runtime to locate the
    /// portable-parser artifact for a language with no native module.
    pub fn artifact_path_for(&self, language: &str) -> PathBuf {
        self.artifact_path(language)
    }

    fn metadata_path(&self, language: &str) -> PathBuf {
        self.language_dir(language).join("metadata.json")
    }

    fn lock_path(&self, language: &str) -> PathBuf {
        self.language_dir(language).join(".lock")
    }

    /// Ensure a verified grammar artifact is present for `language`,
    /// downloading from `source_url` if needed. `expected_hash` pins the
    /// artifact's SHA-256; `None` trusts whatever is downloaded first and
    /// records it for future verification (trust-on-first-use).
    pub fn acquire(
        &self,
        language: &str,
        source_url: &str,
        expected_hash: Option<&str>,
    ) -> EngineResult<GrammarRecord> {
        let dir = self.language_dir(language);
        fs::create_dir_all(&dir)
            .map_err(|e| crate::error::io_error(&dir, e))?;

        let lock_file = File::create(self.lock_path(language))
            .map_err(|e| crate::error::io_error(self.lock_path(language), e))?;
        FileExt::lock_exclusive(&lock_file)
            .map_err(|e| crate::error::io_error(self.lock_path(language), e))?;
        let result = self.acquire_locked(language, source_url, expected_hash);
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn acquire_locked(
        &self,
        language: &str,
        source_url: &str,
        expected_hash: Option<&str>,
    ) -> EngineResult<GrammarRecord> {
        let artifact = self.artifact_path(language);
        let metadata_path = self.metadata_path(language);

        if artifact.exists() && metadata_path.exists() {
            if let Ok(mut record) = self.load_metadata(&metadata_path) {
                let actual = hash_file(&artifact)?;
                let pinned = expected_hash.unwrap_or(&record.expected_hash.clone().unwrap_or_default());
                if !pinned.is_empty() && pinned != actual {
                    let _ = fs::remove_file(&artifact);
                    let _ = fs::remove_file(&metadata_path);
                    return Err(EngineError::Integrity {
                        language: language.to_string(),
                        expected: pinned.to_string(),
                        actual,
                    });
                }
                record.actual_hash = actual;
                record.last_verified_at = now_iso8601();
                self.write_metadata(&metadata_path, &record)?;
                return Ok(record);
            }
        }

        let bytes = self.download_with_retry(language, source_url)?;
        let actual = hash_bytes(&bytes);

        if let Some(expected) = expected_hash {
            if expected != actual {
                return Err(EngineError::Integrity {
                    language: language.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        write_atomic(&artifact, &bytes)?;

        let record = GrammarRecord {
            language: language.to_string(),
            version: "0.0.0".to_string(),
            expected_hash: Some(expected_hash.map(str::to_string).unwrap_or_else(|| actual.clone())),
            actual_hash: actual,
            source_url: source_url.to_string(),
            downloaded_at: now_iso8601(),
            last_verified_at: now_iso8601(),
            artifact_path: artifact.to_string_lossy().to_string(),
        };
        self.write_metadata(&metadata_path, &record)?;
        Ok(record)
    }

    fn download_with_retry(&self, language: &str, url: &str) -> EngineResult<Vec<u8>> {
        let mut last_cause = String::new();
        for attempt in 0..self.policy.max_download_attempts {
            match self.http.get(url).send().and_then(|r| r.error_for_status()) {
                Ok(response) => match response.bytes() {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) => last_cause = e.to_string(),
                },
                Err(e) => last_cause = e.to_string(),
            }
            if attempt + 1 < self.policy.max_download_attempts {
                std::thread::sleep(self.policy.retry_delay(attempt));
            }
        }
        Err(EngineError::Download {
            language: language.to_string(),
            url: url.to_string(),
            attempts: self.policy.max_download_attempts,
            last_cause,
            at: now_iso8601(),
        })
    }

    fn load_metadata(&self, path: &Path) -> EngineResult<GrammarRecord> {
        let data = fs::read(path).map_err(|e| crate::error::io_error(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_metadata(&self, path: &Path, record: &GrammarRecord) -> EngineResult<()> {
        let data = serde_json::to_vec_pretty(record)?;
        write_atomic(path, &data)
    }

    /// Recompute the cached artifact's hash and compare it against the
    /// recorded expected hash. `false` (not an error) for a missing
    /// artifact/metadata pair or a hash mismatch.
    pub fn verify(&self, language: &str) -> bool {
        let artifact = self.artifact_path(language);
        let metadata_path = self.metadata_path(language);
        if !artifact.exists() || !metadata_path.exists() {
            return false;
        }
        let Ok(record) = self.load_metadata(&metadata_path) else {
            return false;
        };
        let Ok(actual) = hash_file(&artifact) else {
            return false;
        };
        match &record.expected_hash {
            Some(expected) => *expected == actual,
            None => true,
        }
    }

    /// Remove a language's cached artifact and metadata entirely.
    pub fn clean(&self, language: &str) -> EngineResult<()> {
        let dir = self.language_dir(language);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| crate::error::io_error(&dir, e))?;
        }
        Ok(())
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_file(path: &Path) -> EngineResult<String> {
    let bytes = fs::read(path).map_err(|e| crate::error::io_error(path, e))?;
    Ok(hash_bytes(&bytes))
}

fn write_atomic(path: &Path, data: &[u8]) -> EngineResult<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path).map_err(|e| crate::error::io_error(&tmp_path, e))?;
        file.write_all(data)
            .map_err(|e| crate::error::io_error(&tmp_path, e))?;
        file.sync_all().map_err(|e| crate::error::io_error(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| crate::error::io_error(path, e))?;
    Ok(())
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrammarPolicy;

    fn manager(dir: &Path) -> GrammarManager {
        GrammarManager::new(GrammarPolicy {
            cache_dir: dir.to_string_lossy().to_string(),
            max_download_attempts: 1,
            retry_base_delay_ms: 1,
        })
    }

    #[test]
    fn acquire_trusts_on_first_use_then_reverifies() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = manager(tmp.path()).language_dir("zig");
        fs::create_dir_all(&dir).unwrap();
        let artifact = dir.join("tree-sitter-zig.wasm");
        fs::write(&artifact, b"grammar-bytes").unwrap();

        let mgr = manager(tmp.path());
        let record = GrammarRecord {
            language: "zig".to_string(),
            version: "0.0.0".to_string(),
            expected_hash: Some(hash_bytes(b"grammar-bytes")),
            actual_hash: hash_bytes(b"grammar-bytes"),
            source_url: "https://example.invalid/zig.wasm".to_string(),
            downloaded_at: "2024-01-01T00:00:00Z".to_string(),
            last_verified_at: "2024-01-01T00:00:00Z".to_string(),
            artifact_path: artifact.to_string_lossy().to_string(),
        };
        mgr.write_metadata(&mgr.metadata_path("zig"), &record).unwrap();

        let result = mgr
            .acquire("zig", "https://example.invalid/zig.wasm", None)
            .unwrap();
        assert_eq!(result.actual_hash, hash_bytes(b"grammar-bytes"));
    }

    #[test]
    fn acquire_rejects_tampered_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path());
        let dir = mgr.language_dir("zig");
        fs::create_dir_all(&dir).unwrap();
        fs::write(mgr.artifact_path("zig"), b"good").unwrap();
        let record = GrammarRecord {
            language: "zig".to_string(),
            version: "0.0.0".to_string(),
            expected_hash: Some(hash_bytes(b"good")),
            actual_hash: hash_bytes(b"good"),
            source_url: "https://example.invalid/zig.wasm".to_string(),
            downloaded_at: "2024-01-01T00:00:00Z".to_string(),
            last_verified_at: "2024-01-01T00:00:00Z".to_string(),
            artifact_path: mgr.artifact_path("zig").to_string_lossy().to_string(),
        };
        mgr.write_metadata(&mgr.metadata_path("zig"), &record).unwrap();

        fs::write(mgr.artifact_path("zig"), b"tampered").unwrap();
        let err = mgr
            .acquire("zig", "https://example.invalid/zig.wasm", None)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IntegrityError);
    }

    #[test]
    fn clean_removes_the_language_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path());
        let dir = mgr.language_dir("zig");
        fs::create_dir_all(&dir).unwrap();
        mgr.clean("zig").unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn acquire_downloads_and_caches_a_fresh_artifact() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zig.wasm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"grammar-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path());
        let url = format!("{}/zig.wasm", server.uri());

        let record = tokio::task::spawn_blocking(move || mgr.acquire("zig", &url, None))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.actual_hash, hash_bytes(b"grammar-bytes"));
        assert_eq!(record.source_url, format!("{}/zig.wasm", server.uri()));
    }
}
