//! Given a set of identifiers, batches them into fixed-size `IN (...)`
//! windows and fans out six table-specific enrichment queries, merging
//! results into a per-entity aggregate.
//!
//! Grounded directly in `company_enrichment.go`'s `enrichCompleteCompanyData`
//! and its six `enrichAll*` helpers: same batch size, same legacy-scalar
//! derivation, same establishment dual-key handling.

use std::collections::HashMap;

use kbo_core::error::KboError;
use kbo_core::model::{EnterpriseId, HydratedCompany};
use tokio_postgres::Row;

use crate::HYDRATION_BATCH;

/// Fans enrichment queries out across every window of identifiers and
/// merges results into a per-entity aggregate.
pub struct HydrationEngine<'a> {
    client: &'a tokio_postgres::Client,
}

impl<'a> HydrationEngine<'a> {
    pub fn new(client: &'a tokio_postgres::Client) -> Self {
        Self { client }
    }

    /// Hydrate `ids` into fully-populated companies, in the input order.
    /// A failed enrichment window is logged and skipped -- hydration is
    /// best-effort and never fails the whole request.
    pub async fn hydrate(
        &self,
        ids: Vec<EnterpriseId>,
        nace_context: Option<String>,
    ) -> Vec<HydratedCompany> {
        if ids.is_empty() {
            return Vec::new();
        }

        let order: Vec<String> = ids.iter().map(|i| i.0.clone()).collect();
        let mut map: HashMap<String, HydratedCompany> = ids
            .into_iter()
            .map(|id| {
                let key = id.0.clone();
                (key, HydratedCompany::seed(id, nace_context.clone()))
            })
            .collect();

        self.enrich_enterprise(&mut map).await;
        self.enrich_table(
            &mut map,
            "denomination",
            "SELECT entitynumber, language, denomination FROM denomination WHERE entitynumber IN",
            |company, row| {
                let language: Option<String> = row.try_get("language").ok();
                let denomination: Option<String> = row.try_get("denomination").ok();
                if company.denomination.is_none() && language.as_deref() == Some("2") {
                    company.denomination = denomination.clone();
                }
                company.denominations.push(row_to_attributes(row));
            },
        )
        .await;
        self.enrich_table(
            &mut map,
            "address",
            "SELECT entitynumber, typeofaddress, zipcode, municipalitynl, municipalityfr, \
             streetnl, streetfr, housenumber, box, extraaddressinfo FROM address WHERE entitynumber IN",
            |company, row| {
                let type_of_address: Option<String> = row.try_get("typeofaddress").ok();
                if company.zipcode.is_none() && type_of_address.as_deref() == Some("REGO") {
                    company.zipcode = row.try_get("zipcode").ok();
                    company.city = row.try_get("municipalityfr").ok();
                    company.street = row.try_get("streetfr").ok();
                    company.house_number = row.try_get("housenumber").ok();
                }
                company.addresses.push(row_to_attributes(row));
            },
        )
        .await;
        self.enrich_table(
            &mut map,
            "contact",
            "SELECT entitynumber, contacttype, value FROM contact WHERE entitynumber IN",
            |company, row| {
                let contact_type: Option<String> = row.try_get("contacttype").ok();
                let value: Option<String> = row.try_get("value").ok();
                match contact_type.as_deref() {
                    Some("EMAIL") if company.email.is_none() => company.email = value.clone(),
                    Some("WEB") if company.website.is_none() => company.website = value.clone(),
                    Some("TEL") if company.phone.is_none() => company.phone = value.clone(),
                    Some("FAX") if company.fax.is_none() => company.fax = value.clone(),
                    _ => {}
                }
                company.contacts.push(row_to_attributes(row));
            },
        )
        .await;
        self.enrich_table(
            &mut map,
            "activity",
            "SELECT entitynumber, activitygroup, naceversion, nacecode, classification \
             FROM activity WHERE entitynumber IN",
            |company, row| company.activities.push(row_to_attributes(row)),
        )
        .await;
        // establishment is keyed on enterprisenumber, not entitynumber.
        self.enrich_table(
            &mut map,
            "establishment",
            "SELECT establishmentnumber, enterprisenumber, startdate FROM establishment \
             WHERE enterprisenumber IN",
            |company, row| company.establishments.push(row_to_attributes(row)),
        )
        .await;

        let mut results = Vec::with_capacity(order.len());
        for id in order {
            // Guards against concurrent-modification bugs; should not
            // happen in practice since the map is single-writer per request.
            if let Some(company) = map.remove(&id) {
                results.push(company);
            }
        }
        results
    }

    async fn enrich_enterprise(&self, map: &mut HashMap<String, HydratedCompany>) {
        let keys: Vec<String> = map.keys().cloned().collect();
        for window in keys.chunks(HYDRATION_BATCH) {
            let sql = build_in_query(
                "SELECT enterprisenumber, status, juridicalform, startdate FROM enterprise \
                 WHERE enterprisenumber IN",
                window.len(),
            );
            let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = window
                .iter()
                .map(|s| s as &(dyn tokio_postgres::types::ToSql + Sync))
                .collect();

            let rows = match self.client.query(&sql, &params).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(table = "enterprise", error = %e, "hydration batch failed, skipping");
                    continue;
                }
            };

            for row in &rows {
                let key: String = row.get("enterprisenumber");
                if let Some(company) = map.get_mut(&key) {
                    let status: Option<String> = row.try_get("status").ok();
                    let juridical_form: Option<String> = row.try_get("juridicalform").ok();
                    let start_date: Option<String> = row.try_get("startdate").ok();
                    company.status = status.clone();
                    company.start_date = start_date.clone();
                    company.juridical_form = juridical_form.clone();
                    company.enterprise = Some(row_to_attributes(row));
                }
            }
        }
    }

    /// Shared windowed-query-and-merge path for the five enrichments that
    /// append into a collection rather than overwriting a single map.
    async fn enrich_table(
        &self,
        map: &mut HashMap<String, HydratedCompany>,
        table: &str,
        select_prefix: &str,
        mut apply: impl FnMut(&mut HydratedCompany, &Row),
    ) {
        let keys: Vec<String> = map.keys().cloned().collect();
        for window in keys.chunks(HYDRATION_BATCH) {
            let sql = build_in_query(select_prefix, window.len());
            let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = window
                .iter()
                .map(|s| s as &(dyn tokio_postgres::types::ToSql + Sync))
                .collect();

            let rows = match self.client.query(&sql, &params).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(table, error = %e, "hydration batch failed, skipping");
                    continue;
                }
            };

            for row in &rows {
                // establishment keys on enterprisenumber; everything else
                // keys on entitynumber. Accept either column name.
                let key: Option<String> = row
                    .try_get("entitynumber")
                    .ok()
                    .or_else(|| row.try_get("enterprisenumber").ok());
                let Some(key) = key else { continue };
                if let Some(company) = map.get_mut(&key) {
                    apply(company, row);
                }
            }
        }
    }
}

fn build_in_query(select_prefix: &str, count: usize) -> String {
    let placeholders = (1..=count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{select_prefix} ({placeholders})")
}

/// Convert a row into a JSON-map attribute bag, keyed by column name, in
/// column order -- mirrors `ScanRowsToMaps` in the original service.
fn row_to_attributes(row: &Row) -> kbo_core::model::AttributeRow {
    let mut out = serde_json::Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value: Option<String> = row.try_get(i).ok();
        out.insert(
            column.name().to_string(),
            value.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_in_query_generates_sequential_placeholders() {
        let sql = build_in_query("SELECT x FROM y WHERE z IN", 3);
        assert_eq!(sql, "SELECT x FROM y WHERE z IN ($1, $2, $3)");
    }
}
