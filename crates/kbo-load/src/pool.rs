//! N workers, each holding a dedicated driver connection, consuming chunks
//! off a shared receiver and reporting per-chunk results on a fan-in stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kbo_core::error::KboError;
use kbo_core::identifier::SqlFragment;
use tokio::sync::{mpsc, Mutex};

use crate::chunker::RowChunk;
use crate::driver::BulkLoadDriver;

/// Default worker count when the caller doesn't override it.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

/// Result of loading a single chunk.
#[derive(Debug)]
pub struct ChunkResult {
    pub chunk_id: u64,
    pub row_count: u64,
    pub err: Option<KboError>,
    pub duration: Duration,
}

/// A pool of writer workers, each with its own Postgres connection.
pub struct WorkerPool {
    num_workers: usize,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    /// Consume `chunk_rx` across the pool's workers, COPY-ing each chunk
    /// into `table`. Returns the total row count, or the first worker
    /// error encountered.
    pub async fn run(
        self,
        pg_pool: deadpool_postgres::Pool,
        table: SqlFragment,
        columns: Vec<SqlFragment>,
        chunk_rx: mpsc::Receiver<RowChunk>,
    ) -> Result<u64, KboError> {
        let shared_rx = Arc::new(Mutex::new(chunk_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<ChunkResult>(self.num_workers * 2);

        let mut handles = Vec::with_capacity(self.num_workers);
        for worker_id in 0..self.num_workers {
            let shared_rx = shared_rx.clone();
            let result_tx = result_tx.clone();
            let table = table.clone();
            let columns = columns.clone();
            let pg_pool = pg_pool.clone();

            handles.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, pg_pool, table, columns, shared_rx, result_tx).await
            }));
        }
        drop(result_tx);

        let mut total_rows = 0u64;
        let mut first_error: Option<KboError> = None;
        while let Some(res) = result_rx.recv().await {
            match res.err {
                Some(e) => {
                    tracing::warn!(chunk_id = res.chunk_id, error = %e, "chunk load failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => total_rows += res.row_count,
            }
        }

        for handle in handles {
            let _ = handle.await;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(total_rows),
        }
    }

    async fn worker_loop(
        worker_id: usize,
        pg_pool: deadpool_postgres::Pool,
        table: SqlFragment,
        columns: Vec<SqlFragment>,
        shared_rx: Arc<Mutex<mpsc::Receiver<RowChunk>>>,
        result_tx: mpsc::Sender<ChunkResult>,
    ) {
        let client = match pg_pool.get().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "worker failed to acquire connection");
                let _ = result_tx
                    .send(ChunkResult {
                        chunk_id: 0,
                        row_count: 0,
                        err: Some(KboError::BackendUnavailable(e.to_string())),
                        duration: Duration::ZERO,
                    })
                    .await;
                return;
            }
        };

        loop {
            let chunk = {
                let mut rx = shared_rx.lock().await;
                rx.recv().await
            };
            let Some(chunk) = chunk else {
                break;
            };

            let started = Instant::now();
            let row_count = chunk.rows.len() as u64;
            let result = BulkLoadDriver::copy(&client, &table, &columns, chunk.rows).await;
            let duration = started.elapsed();

            let result = match result {
                Ok(affected) => ChunkResult {
                    chunk_id: chunk.chunk_id,
                    row_count: affected,
                    err: None,
                    duration,
                },
                Err(e) => ChunkResult {
                    chunk_id: chunk.chunk_id,
                    row_count,
                    err: Some(e),
                    duration,
                },
            };

            if result_tx.send(result).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_count_is_capped_at_eight() {
        assert!(default_worker_count() <= 8);
        assert!(default_worker_count() >= 1);
    }
}
