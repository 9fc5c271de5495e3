//! For each CSV file in a directory: derive a target table, drop/recreate
//! it as an unlogged all-text table, apply best-effort session tuning, and
//! drive the Chunker + Worker Pool pair to completion.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kbo_core::error::KboError;
use kbo_core::identifier::{normalize, SqlFragment};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chunker::Chunker;
use crate::pool::{default_worker_count, WorkerPool};
use crate::INGEST_CHUNK;

/// Outcome of loading a single CSV file.
#[derive(Debug)]
pub struct FileLoadResult {
    pub file: PathBuf,
    pub table: String,
    pub row_count: u64,
    pub duration: Duration,
    pub error: Option<KboError>,
}

/// Drives the loader across every `*.csv` file in a directory.
pub struct LoaderOrchestrator {
    pg_pool: deadpool_postgres::Pool,
    num_workers: usize,
    chunk_size: usize,
    /// Gates `fsync=OFF` and other unsafe tuning pragmas, per the design
    /// note that they should not be on by default outside initial loads.
    allow_unsafe_tuning: bool,
}

impl LoaderOrchestrator {
    pub fn new(pg_pool: deadpool_postgres::Pool) -> Self {
        Self {
            pg_pool,
            num_workers: default_worker_count(),
            chunk_size: INGEST_CHUNK,
            allow_unsafe_tuning: false,
        }
    }

    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = n.max(1);
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_unsafe_tuning(mut self, allow: bool) -> Self {
        self.allow_unsafe_tuning = allow;
        self
    }

    /// Load every `*.csv` file directly under `dir`. A failure loading one
    /// file does not stop the others.
    pub async fn load_directory(
        &self,
        dir: &Path,
        cancel: CancellationToken,
    ) -> Result<Vec<FileLoadResult>, KboError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("read_dir {}: {e}", dir.display())))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("read_dir entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                files.push(path);
            }
        }
        files.sort();

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            if cancel.is_cancelled() {
                break;
            }
            results.push(self.load_file(&file, cancel.child_token()).await);
        }
        Ok(results)
    }

    /// Load a single CSV file. Errors are captured on the returned result
    /// rather than propagated, so a file-level failure is fatal only to
    /// that file.
    pub async fn load_file(&self, file: &Path, cancel: CancellationToken) -> FileLoadResult {
        let started = Instant::now();
        match self.load_file_inner(file, cancel).await {
            Ok((table, row_count)) => FileLoadResult {
                file: file.to_path_buf(),
                table,
                row_count,
                duration: started.elapsed(),
                error: None,
            },
            Err(e) => FileLoadResult {
                file: file.to_path_buf(),
                table: derive_table_name(file),
                row_count: 0,
                duration: started.elapsed(),
                error: Some(e),
            },
        }
    }

    async fn load_file_inner(
        &self,
        file: &Path,
        cancel: CancellationToken,
    ) -> Result<(String, u64), KboError> {
        let table_name = derive_table_name(file);
        let table = SqlFragment::table(&table_name)?;

        let header = Chunker::read_header(file)?;
        let columns: Vec<SqlFragment> = header
            .iter()
            .map(|h| SqlFragment::column(&normalize(h)))
            .collect::<Result<_, _>>()?;

        let client = self
            .pg_pool
            .get()
            .await
            .map_err(|e| KboError::BackendUnavailable(e.to_string()))?;

        self.apply_tuning_pragmas(&client).await;
        self.recreate_table(&client, &table, &columns).await?;

        let (chunk_tx, chunk_rx) = mpsc::channel(self.num_workers * 2);
        let chunker = Chunker::new(file, self.chunk_size);
        let chunker_cancel = cancel.child_token();
        let chunker_handle = tokio::spawn(chunker.run(chunk_tx, chunker_cancel));

        let pool = WorkerPool::new(self.num_workers);
        let total_rows = pool
            .run(self.pg_pool.clone(), table, columns, chunk_rx)
            .await?;

        chunker_handle
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("chunker task panicked: {e}")))??;

        Ok((table_name, total_rows))
    }

    /// Best-effort session tuning; failures are logged and swallowed since
    /// some backends reject these pragmas outright.
    async fn apply_tuning_pragmas(&self, client: &deadpool_postgres::Client) {
        let mut pragmas = vec![
            "SET synchronous_commit = OFF",
            "SET work_mem = '256MB'",
            "SET maintenance_work_mem = '512MB'",
        ];
        if self.allow_unsafe_tuning {
            pragmas.push("SET fsync = OFF");
        }
        for pragma in pragmas {
            if let Err(e) = client.batch_execute(pragma).await {
                tracing::warn!(pragma, error = %e, "tuning pragma rejected, continuing");
            }
        }
    }

    async fn recreate_table(
        &self,
        client: &deadpool_postgres::Client,
        table: &SqlFragment,
        columns: &[SqlFragment],
    ) -> Result<(), KboError> {
        let column_defs = columns
            .iter()
            .map(|c| format!("{c} text"))
            .collect::<Vec<_>>()
            .join(", ");
        let ddl = format!(
            "DROP TABLE IF EXISTS {table}; CREATE UNLOGGED TABLE {table} ({column_defs});"
        );
        client
            .batch_execute(&ddl)
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("recreate table {table}: {e}")))
    }
}

/// Lowercase, replace `-`/space with `_`, strip `.csv`.
fn derive_table_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    normalize(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_table_name_from_filename() {
        assert_eq!(
            derive_table_name(Path::new("/data/Enterprise Addresses.csv")),
            "enterprise_addresses"
        );
        assert_eq!(
            derive_table_name(Path::new("/data/nace-code.csv")),
            "nace_code"
        );
    }
}
