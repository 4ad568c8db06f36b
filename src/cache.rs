//! Judgment cache collaborator.
//!
//! Injected into the judge wrapper instead of living in global state, so a
//! caller can bypass it per call (repeated-sampling audits must).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::judge::{EvaluationSample, Judgment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentCacheKey {
    pub model: String,
    pub prompt_template_slug: String,
    pub template_hash: String,
    pub input_hash: String,
    pub output_hash: String,
    pub criteria_hash: String,
    pub key_hash: String,
}

impl JudgmentCacheKey {
    pub fn new(
        model: &str,
        prompt_template_slug: &str,
        template_hash: &str,
        sample: &EvaluationSample,
    ) -> Self {
        let input_hash = hash_text(&sample.input);
        let output_hash = hash_text(&sample.output);
        let criteria_hash = hash_text(&sample.criteria);
        let key_hash = hash_fields(&[
            model,
            prompt_template_slug,
            template_hash,
            &input_hash,
            &output_hash,
            &criteria_hash,
        ]);

        Self {
            model: model.to_string(),
            prompt_template_slug: prompt_template_slug.to_string(),
            template_hash: template_hash.to_string(),
            input_hash,
            output_hash,
            criteria_hash,
            key_hash,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
}

#[async_trait]
pub trait JudgmentCache: Send + Sync {
    async fn get(&self, key: &JudgmentCacheKey) -> Result<Option<Judgment>, CacheError>;
    async fn put(&self, key: &JudgmentCacheKey, value: &Judgment) -> Result<(), CacheError>;
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryJudgmentCache {
    entries: Mutex<HashMap<String, Judgment>>,
}

impl InMemoryJudgmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JudgmentCache for InMemoryJudgmentCache {
    async fn get(&self, key: &JudgmentCacheKey) -> Result<Option<Judgment>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(&key.key_hash).cloned())
    }

    async fn put(&self, key: &JudgmentCacheKey, value: &Judgment) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.key_hash.clone(), value.clone());
        Ok(())
    }
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePruneStats {
    pub deleted: usize,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct SqliteJudgmentCache {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJudgmentCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; \
             PRAGMA synchronous=NORMAL; \
             CREATE TABLE IF NOT EXISTS judgment_cache ( \
               key_hash TEXT PRIMARY KEY, \
               model TEXT NOT NULL, \
               prompt_template_slug TEXT NOT NULL, \
               template_hash TEXT NOT NULL, \
               input_hash TEXT NOT NULL, \
               output_hash TEXT NOT NULL, \
               criteria_hash TEXT NOT NULL, \
               passed INTEGER NOT NULL, \
               confidence REAL NOT NULL, \
               reasoning TEXT NOT NULL, \
               created_at INTEGER NOT NULL, \
               updated_at INTEGER NOT NULL, \
               hit_count INTEGER NOT NULL DEFAULT 0 \
             );",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// `VERDICT_CACHE_PATH`, else `.verdict_judgment_cache.sqlite`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("VERDICT_CACHE_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from(".verdict_judgment_cache.sqlite")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&Connection) -> Result<R, CacheError>,
    {
        let guard = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        f(&guard)
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&Connection) -> Result<R, CacheError> + Send + 'static,
        R: Send + 'static,
    {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.with_conn(f))
            .await
            .map_err(|e| CacheError::Join(e.to_string()))?
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM judgment_cache", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    /// Total cache hits recorded for `key`, if present.
    pub async fn hit_count(&self, key: &JudgmentCacheKey) -> Result<Option<i64>, CacheError> {
        let key_hash = key.key_hash.clone();
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT hit_count FROM judgment_cache WHERE key_hash = ?1")?;
            let mut rows = stmt.query(params![key_hash])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete rows older than `max_age_days`, then keep at most `max_rows`
    /// most recently updated rows.
    pub async fn prune(
        &self,
        max_age_days: Option<u64>,
        max_rows: Option<usize>,
    ) -> Result<CachePruneStats, CacheError> {
        self.blocking(move |conn| {
            let mut deleted: usize = 0;
            if let Some(days) = max_age_days {
                let cutoff = now_epoch().saturating_sub((days as i64).saturating_mul(86_400));
                deleted += conn.execute(
                    "DELETE FROM judgment_cache WHERE updated_at < ?1",
                    params![cutoff],
                )?;
            }

            if let Some(max_rows) = max_rows {
                deleted += conn.execute(
                    "DELETE FROM judgment_cache WHERE key_hash IN ( \
                        SELECT key_hash FROM judgment_cache \
                        ORDER BY updated_at DESC LIMIT -1 OFFSET ?1 \
                     )",
                    params![max_rows as i64],
                )?;
            }

            let remaining: i64 =
                conn.query_row("SELECT COUNT(*) FROM judgment_cache", [], |row| row.get(0))?;
            Ok(CachePruneStats {
                deleted,
                remaining: remaining.max(0) as usize,
            })
        })
        .await
    }
}

#[async_trait]
impl JudgmentCache for SqliteJudgmentCache {
    async fn get(&self, key: &JudgmentCacheKey) -> Result<Option<Judgment>, CacheError> {
        let key_hash = key.key_hash.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT passed, confidence, reasoning FROM judgment_cache WHERE key_hash = ?1",
            )?;
            let mut rows = stmt.query(params![key_hash])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            let judgment = Judgment::new(
                row.get::<_, i64>(0)? != 0,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
            );
            conn.execute(
                "UPDATE judgment_cache \
                 SET hit_count = hit_count + 1, updated_at = ?1 \
                 WHERE key_hash = ?2",
                params![now_epoch(), key_hash],
            )?;
            Ok(Some(judgment))
        })
        .await
    }

    async fn put(&self, key: &JudgmentCacheKey, value: &Judgment) -> Result<(), CacheError> {
        let key = key.clone();
        let value = value.clone();
        self.blocking(move |conn| {
            let now = now_epoch();
            conn.execute(
                "INSERT INTO judgment_cache ( \
                    key_hash, model, prompt_template_slug, template_hash, \
                    input_hash, output_hash, criteria_hash, \
                    passed, confidence, reasoning, created_at, updated_at \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(key_hash) DO UPDATE SET \
                    passed = excluded.passed, \
                    confidence = excluded.confidence, \
                    reasoning = excluded.reasoning, \
                    updated_at = excluded.updated_at",
                params![
                    key.key_hash,
                    key.model,
                    key.prompt_template_slug,
                    key.template_hash,
                    key.input_hash,
                    key.output_hash,
                    key.criteria_hash,
                    if value.passed { 1 } else { 0 },
                    value.confidence,
                    value.reasoning,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
