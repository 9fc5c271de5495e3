//! KV facade over the cache service: JSON-encodes values, conditionally
//! gzip-compresses above a threshold, and stores under a prefixed or bare
//! key. Reads probe the prefixed (compressed) form first.
//!
//! Grounded in `cache_compression.go` / `cache_client.go` /
//! `cache_operations.go` from the original service, translated from
//! `slog`+`go-redis` into `tracing`+`redis-rs`.

use std::io::{Read, Write};
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use kbo_core::error::KboError;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Payloads at or below this size are stored uncompressed.
pub const COMPRESS_THRESHOLD: usize = 1024;
/// Payloads above this size are rejected even if compression would help.
pub const MAX_UNCOMPRESSED: usize = 200 * 1024 * 1024;
/// A compressed payload above this size is still rejected.
pub const MAX_COMPRESSED: usize = 50 * 1024 * 1024;
/// Prefix marking a gzip-compressed cache entry.
pub const COMPRESSION_PREFIX: &str = "gz:";

/// Compressing cache facade over a Redis-compatible store.
pub struct CompressingCache {
    conn: redis::aio::ConnectionManager,
}

impl CompressingCache {
    pub async fn connect(redis_url: &str) -> Result<Self, KboError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    /// JSON-encode `value`, compress it if it exceeds the threshold, and
    /// store it. All-or-nothing: a failed compression or size-limit breach
    /// fails the write without ever storing a partial blob.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), KboError> {
        let json = serde_json::to_vec(value)
            .map_err(|e| KboError::Other(anyhow::anyhow!("json encode failed: {e}")))?;

        let (store_key, payload) = Self::encode(key, &json)?;

        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(&store_key, payload, ttl_secs)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Decide where and how `json` should be stored, per §4.6's encoding
    /// pipeline. Returns `(key_to_store_at, bytes_to_store)`.
    fn encode(key: &str, json: &[u8]) -> Result<(String, Vec<u8>), KboError> {
        let size = json.len();

        if size <= COMPRESS_THRESHOLD {
            return Ok((key.to_string(), json.to_vec()));
        }

        match Self::compress(json) {
            Ok(compressed) if compressed.len() <= MAX_COMPRESSED => {
                Ok((format!("{COMPRESSION_PREFIX}{key}"), compressed))
            }
            Ok(_) => Err(KboError::DatasetTooLarge(format!(
                "compressed payload for {key} still exceeds {MAX_COMPRESSED} bytes"
            ))),
            Err(e) => {
                tracing::warn!(key, error = %e, "compression failed, falling back to uncompressed");
                if size <= MAX_UNCOMPRESSED {
                    Ok((key.to_string(), json.to_vec()))
                } else {
                    Err(KboError::DatasetTooLarge(format!(
                        "dataset for {key} too large and compression failed: {size} bytes"
                    )))
                }
            }
        }
    }

    fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Probe the prefixed (compressed) key first, then the bare key.
    /// Returns [`KboError::NotFound`] if neither exists -- an internal
    /// signal meant to trigger fallthrough, never surfaced to a user.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, KboError> {
        let mut conn = self.conn.clone();
        let compressed_key = format!("{COMPRESSION_PREFIX}{key}");

        if let Some(raw) = conn
            .get::<_, Option<Vec<u8>>>(&compressed_key)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?
        {
            let json = Self::decompress(&raw)
                .map_err(|e| KboError::Other(anyhow::anyhow!("decompression failed: {e}")))?;
            return serde_json::from_slice(&json)
                .map_err(|e| KboError::Other(anyhow::anyhow!("json decode failed: {e}")));
        }

        if let Some(raw) = conn
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?
        {
            return serde_json::from_slice(&raw)
                .map_err(|e| KboError::Other(anyhow::anyhow!("json decode failed: {e}")));
        }

        Err(KboError::NotFound)
    }

    /// Delete both the bare and prefixed forms via a pipelined batch.
    pub async fn del(&self, key: &str) -> Result<(), KboError> {
        let mut conn = self.conn.clone();
        let compressed_key = format!("{COMPRESSION_PREFIX}{key}");
        redis::pipe()
            .del(key)
            .del(&compressed_key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))
    }

    /// True if either form of `key` exists.
    pub async fn exists(&self, key: &str) -> Result<bool, KboError> {
        let mut conn = self.conn.clone();
        let compressed_key = format!("{COMPRESSION_PREFIX}{key}");
        let (bare, prefixed): (bool, bool) = redis::pipe()
            .exists(key)
            .exists(&compressed_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;
        Ok(bare || prefixed)
    }

    /// Union of keys matching `pattern` and `"gz:" + pattern`, with the
    /// prefix stripped so callers see a single namespace.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, KboError> {
        let mut conn = self.conn.clone();
        let prefixed_pattern = format!("{COMPRESSION_PREFIX}{pattern}");

        let bare_keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;
        let prefixed_keys: Vec<String> = conn
            .keys(&prefixed_pattern)
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;

        let mut set: std::collections::BTreeSet<String> = bare_keys.into_iter().collect();
        for k in prefixed_keys {
            set.insert(
                k.strip_prefix(COMPRESSION_PREFIX)
                    .unwrap_or(&k)
                    .to_string(),
            );
        }
        Ok(set.into_iter().collect())
    }

    pub async fn ping(&self) -> Result<(), KboError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))
    }

    /// No persistent resources to release beyond the connection manager's
    /// own drop; kept for symmetry with the facade described in the spec.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_stores_bare() {
        let (key, payload) = CompressingCache::encode("k1", b"{\"a\":1}").unwrap();
        assert_eq!(key, "k1");
        assert_eq!(payload, b"{\"a\":1}");
    }

    #[test]
    fn payload_above_threshold_compresses_under_prefix() {
        let big = "x".repeat(2048);
        let json = serde_json::to_vec(&big).unwrap();
        let (key, payload) = CompressingCache::encode("k2", &json).unwrap();
        assert_eq!(key, "gz:k2");
        assert!(payload.len() < json.len());
        let round_tripped = CompressingCache::decompress(&payload).unwrap();
        assert_eq!(round_tripped, json);
    }

    #[test]
    fn decompress_rejects_garbage() {
        assert!(CompressingCache::decompress(b"not gzip").is_err());
    }
}
