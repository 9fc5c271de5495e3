//! Three predicate-specific queries, each returning a deduplicated,
//! ordered sequence of [`EnterpriseId`]s. All inputs are bound parameters --
//! never interpolated.

use kbo_core::error::KboError;
use kbo_core::model::EnterpriseId;

/// Resolves entity ids matching one of the three fixed search predicates.
pub struct EntitySetResolver<'a> {
    client: &'a tokio_postgres::Client,
}

impl<'a> EntitySetResolver<'a> {
    pub fn new(client: &'a tokio_postgres::Client) -> Self {
        Self { client }
    }

    /// `SELECT DISTINCT entitynumber FROM activity WHERE nacecode = $1 AND
    /// classification = 'MAIN' ORDER BY entitynumber`.
    pub async fn by_nace(&self, nace_code: &str) -> Result<Vec<EnterpriseId>, KboError> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT entitynumber FROM activity \
                 WHERE nacecode = $1 AND classification = 'MAIN' \
                 ORDER BY entitynumber",
                &[&nace_code],
            )
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;
        Ok(rows_to_ids(&rows))
    }

    /// `SELECT DISTINCT entitynumber FROM denomination WHERE denomination
    /// ILIKE '%' || $1 || '%' ORDER BY entitynumber`.
    pub async fn by_denomination(&self, needle: &str) -> Result<Vec<EnterpriseId>, KboError> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT entitynumber FROM denomination \
                 WHERE denomination ILIKE '%' || $1 || '%' \
                 ORDER BY entitynumber",
                &[&needle],
            )
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;
        Ok(rows_to_ids(&rows))
    }

    /// `SELECT DISTINCT entitynumber FROM address WHERE zipcode = $1 AND
    /// typeofaddress = 'REGO' ORDER BY entitynumber`.
    pub async fn by_zipcode(&self, zipcode: &str) -> Result<Vec<EnterpriseId>, KboError> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT entitynumber FROM address \
                 WHERE zipcode = $1 AND typeofaddress = 'REGO' \
                 ORDER BY entitynumber",
                &[&zipcode],
            )
            .await
            .map_err(|e| KboError::TransientQuery(e.to_string()))?;
        Ok(rows_to_ids(&rows))
    }
}

fn rows_to_ids(rows: &[tokio_postgres::Row]) -> Vec<EnterpriseId> {
    rows.iter()
        .map(|r| EnterpriseId(r.get::<_, String>(0)))
        .collect()
}
