//! Generic single- and multi-column substring search, plus a match-counting
//! companion query. Grounded in `search_service.go`'s `SearchInColumn`,
//! `SearchMultipleColumns` and `CountMatches` -- table and column names
//! still go through the identifier guard rather than
//! `information_schema`-backed existence checks, since the guard's
//! allow-list already fixes the universe of reachable tables.

use kbo_core::error::KboError;
use kbo_core::identifier::SqlFragment;
use serde::Serialize;

/// Upper bound on `limit`, matching the original service's hardcoded cap.
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSearchMeta {
    pub count: usize,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSearchResult {
    pub table: String,
    pub column: String,
    pub query: String,
    pub results: Vec<String>,
    pub meta: ColumnSearchMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountResult {
    pub table: String,
    pub column: String,
    pub query: String,
    pub count: i64,
}

/// Ad-hoc substring search over a single table, grounded in the identifier
/// guard rather than a live schema lookup.
pub struct ColumnSearchCoordinator<'a> {
    client: &'a tokio_postgres::Client,
}

impl<'a> ColumnSearchCoordinator<'a> {
    pub fn new(client: &'a tokio_postgres::Client) -> Self {
        Self { client }
    }

    /// `SELECT DISTINCT col FROM table WHERE col ILIKE $1 ORDER BY col LIMIT $2`.
    pub async fn search_in_column(
        &self,
        table: &str,
        column: &str,
        search_value: &str,
        limit: i64,
    ) -> Result<ColumnSearchResult, KboError> {
        validate_search_args(search_value, limit)?;
        let table = SqlFragment::table(table)?;
        let column = SqlFragment::column(column)?;

        let sql = format!(
            "SELECT DISTINCT {column} FROM {table} WHERE {column} ILIKE $1 ORDER BY {column} LIMIT $2"
        );
        let pattern = format!("%{search_value}%");

        let rows = self
            .client
            .query(&sql, &[&pattern, &limit])
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;

        let results: Vec<String> = rows
            .iter()
            .filter_map(|r| r.try_get::<_, Option<String>>(0).ok().flatten())
            .collect();

        Ok(ColumnSearchResult {
            table: table.to_string(),
            column: column.to_string(),
            query: search_value.to_string(),
            meta: ColumnSearchMeta {
                count: results.len(),
                limit,
            },
            results,
        })
    }

    /// `SELECT COUNT(*) FROM table WHERE col ILIKE $1`. No limit -- this
    /// exists to answer "how many", not to page through results.
    pub async fn count_matches(
        &self,
        table: &str,
        column: &str,
        search_value: &str,
    ) -> Result<CountResult, KboError> {
        if search_value.is_empty() {
            return Err(KboError::InvalidParameter(
                "search query must not be empty".to_string(),
            ));
        }
        let table = SqlFragment::table(table)?;
        let column = SqlFragment::column(column)?;

        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} ILIKE $1");
        let pattern = format!("%{search_value}%");

        let row = self
            .client
            .query_one(&sql, &[&pattern])
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;
        let count: i64 = row.get(0);

        Ok(CountResult {
            table: table.to_string(),
            column: column.to_string(),
            query: search_value.to_string(),
            count,
        })
    }

    /// `SELECT DISTINCT c1, c2, ... FROM table WHERE c1 ILIKE $1 OR c2 ILIKE
    /// $1 ... LIMIT $2`. Matching row values are joined with ` | ` into a
    /// single result string per row, mirroring the original's flattening.
    pub async fn search_multiple_columns(
        &self,
        table: &str,
        columns: &[String],
        search_value: &str,
        limit: i64,
    ) -> Result<ColumnSearchResult, KboError> {
        validate_search_args(search_value, limit)?;
        if columns.is_empty() {
            return Err(KboError::InvalidParameter(
                "at least one column is required".to_string(),
            ));
        }
        let table = SqlFragment::table(table)?;
        let columns: Vec<SqlFragment> = columns
            .iter()
            .map(|c| SqlFragment::column(c))
            .collect::<Result<_, _>>()?;

        let select_list = columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = columns
            .iter()
            .map(|c| format!("{c} ILIKE $1"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT DISTINCT {select_list} FROM {table} WHERE {where_clause} LIMIT $2"
        );
        let pattern = format!("%{search_value}%");

        let rows = self
            .client
            .query(&sql, &[&pattern, &limit])
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;

        let results: Vec<String> = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .filter_map(|i| row.try_get::<_, Option<String>>(i).ok().flatten())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|joined| !joined.is_empty())
            .collect();

        Ok(ColumnSearchResult {
            table: table.to_string(),
            column: columns
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(","),
            query: search_value.to_string(),
            meta: ColumnSearchMeta {
                count: results.len(),
                limit,
            },
            results,
        })
    }
}

fn validate_search_args(search_value: &str, limit: i64) -> Result<(), KboError> {
    if search_value.is_empty() {
        return Err(KboError::InvalidParameter(
            "search query must not be empty".to_string(),
        ));
    }
    if limit <= 0 || limit > MAX_LIMIT {
        return Err(KboError::InvalidParameter(format!(
            "invalid limit: must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_search_value() {
        assert!(validate_search_args("", 10).is_err());
    }

    #[test]
    fn rejects_limit_out_of_range() {
        assert!(validate_search_args("acme", 0).is_err());
        assert!(validate_search_args("acme", 1001).is_err());
    }

    #[test]
    fn accepts_boundary_limit() {
        assert!(validate_search_args("acme", 1).is_ok());
        assert!(validate_search_args("acme", MAX_LIMIT).is_ok());
    }
}
