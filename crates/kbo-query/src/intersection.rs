//! In-memory set intersection across already-hydrated populations, keyed
//! by entity identifier. The winning record for a surviving id always
//! comes from the smallest input population, so the result is deterministic.

use std::collections::HashMap;

use kbo_core::model::HydratedCompany;

pub struct IntersectionEngine;

impl IntersectionEngine {
    /// Intersect `populations` by `entity_number`. Returns the entries
    /// present in every population, keeping the record from whichever
    /// input population is smallest.
    pub fn intersect(populations: Vec<Vec<HydratedCompany>>) -> Vec<HydratedCompany> {
        if populations.is_empty() {
            return Vec::new();
        }
        if populations.len() == 1 {
            return populations.into_iter().next().unwrap();
        }

        let smallest_idx = populations
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.len())
            .map(|(i, _)| i)
            .unwrap();

        let mut result: HashMap<String, HydratedCompany> = populations[smallest_idx]
            .iter()
            .map(|c| (c.entity_number.0.clone(), c.clone()))
            .collect();

        for (idx, population) in populations.iter().enumerate() {
            if idx == smallest_idx {
                continue;
            }
            let present: std::collections::HashSet<&str> =
                population.iter().map(|c| c.entity_number.0.as_str()).collect();
            result.retain(|id, _| present.contains(id.as_str()));
        }

        // Preserve the smallest population's ordering among survivors.
        populations[smallest_idx]
            .iter()
            .filter_map(|c| result.get(&c.entity_number.0).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbo_core::model::EnterpriseId;

    fn company(id: &str) -> HydratedCompany {
        HydratedCompany::seed(EnterpriseId::from(id), None)
    }

    fn ids(companies: &[HydratedCompany]) -> Vec<String> {
        let mut v: Vec<String> = companies.iter().map(|c| c.entity_number.0.clone()).collect();
        v.sort();
        v
    }

    #[test]
    fn intersects_two_populations() {
        let a = vec![company("A"), company("B"), company("C")];
        let b = vec![company("B"), company("C"), company("D")];
        let result = IntersectionEngine::intersect(vec![a, b]);
        assert_eq!(ids(&result), vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn commutative() {
        let a = vec![company("A"), company("B")];
        let b = vec![company("B"), company("C")];
        let ab = IntersectionEngine::intersect(vec![a.clone(), b.clone()]);
        let ba = IntersectionEngine::intersect(vec![b, a]);
        assert_eq!(ids(&ab), ids(&ba));
    }

    #[test]
    fn associative() {
        let a = vec![company("A"), company("B"), company("C")];
        let b = vec![company("B"), company("C"), company("D")];
        let c = vec![company("C"), company("D"), company("E")];

        let ab_c = IntersectionEngine::intersect(vec![
            IntersectionEngine::intersect(vec![a.clone(), b.clone()]),
            c.clone(),
        ]);
        let a_bc = IntersectionEngine::intersect(vec![
            a,
            IntersectionEngine::intersect(vec![b, c]),
        ]);
        assert_eq!(ids(&ab_c), ids(&a_bc));
    }

    #[test]
    fn self_intersection_is_identity() {
        let a = vec![company("A"), company("B")];
        let result = IntersectionEngine::intersect(vec![a.clone(), a.clone()]);
        assert_eq!(ids(&result), ids(&a));
    }
}
