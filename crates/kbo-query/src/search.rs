//! Per-predicate entry points (`by_nace`, `by_denomination`, `by_zipcode`)
//! and the multi-criteria entry point (`by_intersection`).
//!
//! State machine per search: `Start -> ProbeCache -> {Hit | Miss} ->
//! [Resolve -> Cap -> Hydrate -> CacheWrite] -> Paginate -> Respond`.

use std::time::Duration;

use kbo_core::error::KboError;
use kbo_core::model::{CachedPopulation, EnterpriseId, Meta, SearchPage};

use crate::cache::CompressingCache;
use crate::hydration::HydrationEngine;
use crate::intersection::IntersectionEngine;
use crate::resolver::EntitySetResolver;
use crate::{DEFAULT_TTL_SECS, MAX_POPULATION};

/// One of the three fixed search predicates.
#[derive(Debug, Clone)]
pub enum Criterion {
    Nace(String),
    Denomination(String),
    Zipcode(String),
}

impl Criterion {
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Nace(_) => "nace",
            Criterion::Denomination(_) => "denomination",
            Criterion::Zipcode(_) => "zipcode",
        }
    }

    pub fn arg(&self) -> &str {
        match self {
            Criterion::Nace(v) | Criterion::Denomination(v) | Criterion::Zipcode(v) => v,
        }
    }

    /// Deterministic cache key: `companies:full:{predicate}:{arg}`.
    pub fn cache_key(&self) -> String {
        format!("companies:full:{}:{}", self.name(), self.arg())
    }

    fn nace_context(&self) -> Option<String> {
        match self {
            Criterion::Nace(v) => Some(v.clone()),
            _ => None,
        }
    }

    async fn resolve(
        &self,
        resolver: &EntitySetResolver<'_>,
    ) -> Result<Vec<EnterpriseId>, KboError> {
        match self {
            Criterion::Nace(v) => resolver.by_nace(v).await,
            Criterion::Denomination(v) => resolver.by_denomination(v).await,
            Criterion::Zipcode(v) => resolver.by_zipcode(v).await,
        }
    }
}

/// Ties the cache, resolver, and hydration engine together behind the four
/// public entry points.
pub struct SearchCoordinator<'a> {
    cache: &'a CompressingCache,
    client: &'a tokio_postgres::Client,
}

impl<'a> SearchCoordinator<'a> {
    pub fn new(cache: &'a CompressingCache, client: &'a tokio_postgres::Client) -> Self {
        Self { cache, client }
    }

    pub async fn by_nace(&self, nace_code: &str, limit: usize) -> Result<SearchPage, KboError> {
        self.search(Criterion::Nace(nace_code.to_string()), limit)
            .await
    }

    pub async fn by_denomination(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<SearchPage, KboError> {
        if needle.is_empty() {
            return Err(KboError::InvalidParameter(
                "denomination search string must not be empty".to_string(),
            ));
        }
        self.search(Criterion::Denomination(needle.to_string()), limit)
            .await
    }

    pub async fn by_zipcode(&self, zipcode: &str, limit: usize) -> Result<SearchPage, KboError> {
        self.search(Criterion::Zipcode(zipcode.to_string()), limit)
            .await
    }

    /// Multi-criteria intersection. Relies entirely on pre-materialized
    /// single-criterion populations -- it never re-resolves. With exactly
    /// one non-empty criterion this behaves like the single-predicate path;
    /// with two or more, the intersection engine merges them.
    pub async fn by_intersection(
        &self,
        criteria: Vec<Criterion>,
        limit: usize,
    ) -> Result<SearchPage, KboError> {
        if criteria.is_empty() {
            return Err(KboError::InvalidParameter(
                "at least one criterion is required".to_string(),
            ));
        }
        if limit == 0 {
            return Err(KboError::InvalidParameter(
                "limit must be at least 1".to_string(),
            ));
        }

        let mut populations = Vec::with_capacity(criteria.len());
        for criterion in &criteria {
            let key = criterion.cache_key();
            match self.cache.get::<CachedPopulation>(&key).await {
                Ok(pop) => populations.push(pop.companies),
                Err(_) => return Err(KboError::CacheMiss(criterion.name().to_string())),
            }
        }

        let merged = IntersectionEngine::intersect(populations);
        Ok(paginate(merged, limit))
    }

    async fn search(&self, criterion: Criterion, limit: usize) -> Result<SearchPage, KboError> {
        if limit == 0 {
            return Err(KboError::InvalidParameter(
                "limit must be at least 1".to_string(),
            ));
        }

        let key = criterion.cache_key();
        match self.cache.get::<CachedPopulation>(&key).await {
            Ok(population) => Ok(paginate(population.companies, limit)),
            Err(KboError::NotFound) => self.materialize(criterion, key, limit).await,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache probe failed, resolving fresh");
                self.materialize(criterion, key, limit).await
            }
        }
    }

    async fn materialize(
        &self,
        criterion: Criterion,
        key: String,
        limit: usize,
    ) -> Result<SearchPage, KboError> {
        let resolver = EntitySetResolver::new(self.client);
        let mut ids = criterion.resolve(&resolver).await?;

        if ids.is_empty() {
            return Ok(SearchPage {
                results: Vec::new(),
                meta: Meta {
                    count: 0,
                    total: 0,
                    limit,
                },
            });
        }

        if ids.len() > MAX_POPULATION {
            tracing::warn!(
                predicate = criterion.name(),
                arg = criterion.arg(),
                resolved = ids.len(),
                cap = MAX_POPULATION,
                "resolved population exceeds MAX_POPULATION, truncating"
            );
            ids.truncate(MAX_POPULATION);
        }

        let hydration = HydrationEngine::new(self.client);
        let companies = hydration.hydrate(ids, criterion.nace_context()).await;
        let population = CachedPopulation {
            key: key.clone(),
            companies,
        };

        if let Err(e) = self
            .cache
            .set(
                &key,
                &population,
                Duration::from_secs(DEFAULT_TTL_SECS),
            )
            .await
        {
            tracing::warn!(key, error = %e, "cache write failed after successful materialization");
        }

        Ok(paginate(population.companies, limit))
    }
}

fn paginate(
    companies: Vec<kbo_core::model::HydratedCompany>,
    limit: usize,
) -> SearchPage {
    let total = companies.len();
    let take = limit.min(total);
    let results = companies.into_iter().take(take).collect();
    SearchPage {
        results,
        meta: Meta {
            count: take,
            total,
            limit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbo_core::model::HydratedCompany;

    fn company(id: &str) -> HydratedCompany {
        HydratedCompany::seed(EnterpriseId::from(id), None)
    }

    #[test]
    fn paginate_caps_at_limit_and_reports_total() {
        let companies: Vec<_> = (0..10).map(|i| company(&i.to_string())).collect();
        let page = paginate(companies, 3);
        assert_eq!(page.results.len(), 3);
        assert_eq!(page.meta.count, 3);
        assert_eq!(page.meta.total, 10);
        assert_eq!(page.meta.limit, 3);
    }

    #[test]
    fn paginate_limit_larger_than_population_returns_all() {
        let companies = vec![company("A"), company("B")];
        let page = paginate(companies, 50);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.meta.total, 2);
    }

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(
            Criterion::Nace("62020".to_string()).cache_key(),
            "companies:full:nace:62020"
        );
        assert_eq!(
            Criterion::Zipcode("1000".to_string()).cache_key(),
            "companies:full:zipcode:1000"
        );
    }
}
