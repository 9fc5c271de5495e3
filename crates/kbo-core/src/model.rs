//! Domain model shared between the load and query crates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The opaque registry-issued identifier for a Belgian legal entity
/// (enterprise/entity number). Newtype over `String` so it can't be
/// accidentally swapped for some other stringly-typed id at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnterpriseId(pub String);

impl EnterpriseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnterpriseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EnterpriseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EnterpriseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single row pulled from one of the six enrichment tables, represented
/// generically since each table has a different column set. Kept as an
/// ordered map (`serde_json::Map` preserves insertion order) so JSON output
/// mirrors the column order of the `SELECT` that produced the row.
pub type AttributeRow = serde_json::Map<String, serde_json::Value>;

/// A fully hydrated company record: one required field (`entity_number`)
/// plus the six per-table collections and the legacy scalar fields mirrored
/// from the first matching row in each collection.
///
/// Collections are append-only during a hydration run and preserve
/// ingestion order; they are not deduplicated. The legacy scalars exist for
/// backward-compatible callers -- new callers should read the collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HydratedCompany {
    pub entity_number: EnterpriseId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nace_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<AttributeRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denominations: Vec<AttributeRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<AttributeRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<AttributeRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<AttributeRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub establishments: Vec<AttributeRow>,

    // Legacy mirrored scalars, see company_enrichment.go's setLegacyFields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub juridical_form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denomination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
}

impl HydratedCompany {
    /// Seed a bare record with only the required field (and optional NACE
    /// context), as step 1 of the hydration algorithm.
    pub fn seed(id: EnterpriseId, nace_context: Option<String>) -> Self {
        Self {
            entity_number: id,
            nace_code: nace_context,
            ..Default::default()
        }
    }
}

/// A materialized population: the complete set of hydrated companies
/// matching one predicate, keyed by the deterministic cache key that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPopulation {
    pub key: String,
    pub companies: Vec<HydratedCompany>,
}

impl CachedPopulation {
    pub fn by_id(&self) -> HashMap<&EnterpriseId, &HydratedCompany> {
        self.companies
            .iter()
            .map(|c| (&c.entity_number, c))
            .collect()
    }
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub count: usize,
    pub total: usize,
    pub limit: usize,
}

/// A page of hydrated companies plus its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<HydratedCompany>,
    pub meta: Meta,
}
