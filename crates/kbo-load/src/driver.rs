//! Thin wrapper over the store's native `COPY FROM STDIN` protocol.
//!
//! The connection is dedicated to a single `copy` call -- no multiplexing.
//! On error the whole copy is rolled back by the server; on success the
//! reported row count must equal the producer's emitted count or the call
//! fails with [`KboError::CopyCountMismatch`].

use futures::SinkExt;
use kbo_core::error::KboError;
use kbo_core::identifier::SqlFragment;

/// Bulk-load driver over a single dedicated Postgres connection.
pub struct BulkLoadDriver;

impl BulkLoadDriver {
    /// Stream `rows` into `table` via `COPY table (columns) FROM STDIN`.
    /// Every value is escaped per the Postgres `COPY TEXT` format (backslash,
    /// tab, and newline are backslash-escaped).
    pub async fn copy(
        client: &tokio_postgres::Client,
        table: &SqlFragment,
        columns: &[SqlFragment],
        rows: Vec<Vec<String>>,
    ) -> Result<u64, KboError> {
        let column_list = columns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!("COPY {} ({}) FROM STDIN", table, column_list);

        let sink = client
            .copy_in(&statement)
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("copy_in setup failed: {e}")))?;
        futures::pin_mut!(sink);

        let emitted = rows.len() as u64;
        let mut buf = String::new();
        for row in &rows {
            buf.clear();
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    buf.push('\t');
                }
                escape_copy_value(value, &mut buf);
            }
            buf.push('\n');
            sink.send(bytes::Bytes::copy_from_slice(buf.as_bytes()))
                .await
                .map_err(|e| KboError::Other(anyhow::anyhow!("copy stream write failed: {e}")))?;
        }

        let affected = sink
            .finish()
            .await
            .map_err(|e| KboError::Other(anyhow::anyhow!("copy finish failed: {e}")))?;

        if affected != emitted {
            return Err(KboError::CopyCountMismatch {
                expected: emitted,
                actual: affected,
            });
        }

        Ok(affected)
    }
}

/// Escape a single cell for the Postgres `COPY` text format.
fn escape_copy_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_tab_newline_and_backslash() {
        let mut out = String::new();
        escape_copy_value("a\tb\\c\nd", &mut out);
        assert_eq!(out, "a\\tb\\\\c\\nd");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let mut out = String::new();
        escape_copy_value("BE0123456789", &mut out);
        assert_eq!(out, "BE0123456789");
    }
}
