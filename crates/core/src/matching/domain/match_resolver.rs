//! Ranks stored representations against query embeddings.
//!
//! Output is deterministic: ascending distance, ties broken by store
//! insertion order. Each identity is reported at most once, at the distance
//! of its nearest representation, so an identity that was re-enrolled does
//! not crowd out other candidates.

use std::collections::HashSet;

use ndarray::Array2;
use serde::Serialize;

use crate::matching::domain::distance_engine::{batch_distance_masked, distance};
use crate::matching::domain::distance_metric::DistanceMetric;
use crate::shared::error::{FaceIdError, Result};
use crate::shared::facial_area::FacialArea;
use crate::storage::domain::representation::Representation;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub identity: String,
    pub facial_area: FacialArea,
    pub distance: f64,
    pub threshold: f64,
    /// Position of the matched representation in the store.
    #[serde(skip)]
    pub store_index: usize,
}

/// Candidates within `threshold` of `query`, nearest first.
pub fn resolve(
    query: &[f32],
    entries: &[Representation],
    metric: DistanceMetric,
    threshold: f64,
) -> Result<Vec<MatchCandidate>> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    check_query_dimension(query, entries)?;

    let distances = entries
        .iter()
        .map(|entry| match &entry.embedding {
            Some(embedding) => distance(query, embedding, metric),
            None => Ok(f64::INFINITY),
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(rank(distances, entries, threshold))
}

/// Batched [`resolve`]: one result list per query, each with its own
/// threshold. Produces exactly what per-query calls would.
pub fn resolve_batch(
    queries: &[Vec<f32>],
    entries: &[Representation],
    metric: DistanceMetric,
    thresholds: &[f64],
) -> Result<Vec<Vec<MatchCandidate>>> {
    if queries.len() != thresholds.len() {
        return Err(FaceIdError::configuration(format!(
            "{} queries but {} thresholds",
            queries.len(),
            thresholds.len()
        )));
    }
    if entries.is_empty() || queries.is_empty() {
        return Ok(vec![Vec::new(); queries.len()]);
    }
    for query in queries {
        check_query_dimension(query, entries)?;
    }

    let dim = store_dimension(entries).unwrap_or(queries[0].len());
    let (store_matrix, valid) = embedding_matrix(entries, dim)?;
    let query_matrix = query_matrix(queries, dim)?;

    // entries × queries
    let distances = batch_distance_masked(store_matrix.view(), &valid, query_matrix.view(), metric)?;

    Ok(distances
        .columns()
        .into_iter()
        .zip(thresholds)
        .map(|(column, threshold)| rank(column.iter().copied(), entries, *threshold))
        .collect())
}

/// Embedding length shared by the store, taken from the first entry that has one.
pub fn store_dimension(entries: &[Representation]) -> Option<usize> {
    entries.iter().find_map(Representation::dimension)
}

fn check_query_dimension(query: &[f32], entries: &[Representation]) -> Result<()> {
    match store_dimension(entries) {
        Some(dim) if dim != query.len() => Err(FaceIdError::configuration(format!(
            "query embedding has {} dimensions but the store holds {dim}",
            query.len()
        ))),
        _ => Ok(()),
    }
}

/// Stacks stored embeddings into an `N×D` matrix. Entries without an
/// embedding become zero rows flagged invalid.
fn embedding_matrix(entries: &[Representation], dim: usize) -> Result<(Array2<f32>, Vec<bool>)> {
    let mut matrix = Array2::<f32>::zeros((entries.len(), dim));
    let mut valid = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        match &entry.embedding {
            Some(embedding) if embedding.len() == dim => {
                matrix
                    .row_mut(i)
                    .iter_mut()
                    .zip(embedding)
                    .for_each(|(dst, src)| *dst = *src);
                valid.push(true);
            }
            Some(embedding) => {
                return Err(FaceIdError::configuration(format!(
                    "store entry {i} has {} dimensions, expected {dim}",
                    embedding.len()
                )))
            }
            None => valid.push(false),
        }
    }
    Ok((matrix, valid))
}

fn query_matrix(queries: &[Vec<f32>], dim: usize) -> Result<Array2<f32>> {
    let flat: Vec<f32> = queries.iter().flatten().copied().collect();
    Array2::from_shape_vec((queries.len(), dim), flat)
        .map_err(|e| FaceIdError::configuration(format!("malformed query batch: {e}")))
}

fn rank(
    distances: impl IntoIterator<Item = f64>,
    entries: &[Representation],
    threshold: f64,
) -> Vec<MatchCandidate> {
    let mut hits: Vec<(usize, f64)> = distances
        .into_iter()
        .enumerate()
        .filter(|(_, d)| d.is_finite() && *d <= threshold)
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut seen: HashSet<&str> = HashSet::new();
    hits.into_iter()
        .filter(|(index, _)| seen.insert(entries[*index].identity.as_str()))
        .map(|(index, distance)| {
            let entry = &entries[index];
            MatchCandidate {
                identity: entry.identity.clone(),
                facial_area: entry.facial_area,
                distance,
                threshold,
                store_index: index,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn rep(identity: &str, embedding: Vec<f32>) -> Representation {
        Representation::new(identity, embedding, FacialArea::new(0, 0, 10, 10))
    }

    fn missing(identity: &str) -> Representation {
        Representation {
            embedding: None,
            ..rep(identity, vec![])
        }
    }

    fn store() -> Vec<Representation> {
        vec![
            rep("alice", vec![1.0, 0.0, 0.0]),
            rep("bob", vec![0.0, 1.0, 0.0]),
            rep("carol", vec![0.9, 0.1, 0.0]),
            rep("dave", vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn test_empty_store_is_no_match() {
        let result = resolve(&[1.0, 0.0], &[], DistanceMetric::Cosine, 0.4).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_orders_by_ascending_distance() {
        let result = resolve(&[1.0, 0.05, 0.0], &store(), DistanceMetric::Cosine, 0.5).unwrap();
        let ids: Vec<&str> = result.iter().map(|c| c.identity.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol"]);
        assert!(result[0].distance <= result[1].distance);
    }

    #[rstest]
    #[case(DistanceMetric::Cosine, 0.01)]
    #[case(DistanceMetric::Euclidean, 0.5)]
    #[case(DistanceMetric::EuclideanL2, 1.0)]
    fn test_never_returns_candidate_above_threshold(
        #[case] metric: DistanceMetric,
        #[case] threshold: f64,
    ) {
        let result = resolve(&[0.7, 0.3, 0.1], &store(), metric, threshold).unwrap();
        assert!(result.iter().all(|c| c.distance <= threshold));
        assert!(result.iter().all(|c| c.threshold == threshold));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let entries = vec![
            rep("first", vec![0.0, 1.0]),
            rep("second", vec![1.0, 0.0]),
            rep("third", vec![0.0, 1.0]),
        ];
        let result = resolve(&[1.0, 1.0], &entries, DistanceMetric::Cosine, 1.0).unwrap();
        let ids: Vec<&str> = result.iter().map(|c| c.identity.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_identity_reported_once_at_nearest_representation() {
        let entries = vec![
            rep("alice", vec![0.8, 0.2]),
            rep("bob", vec![0.9, 0.1]),
            rep("alice", vec![1.0, 0.0]),
        ];
        let result = resolve(&[1.0, 0.0], &entries, DistanceMetric::Cosine, 0.5).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].identity, "alice");
        assert_eq!(result[0].store_index, 2);
        assert_relative_eq!(result[0].distance, 0.0, epsilon = 1e-9);
        assert_eq!(result[1].identity, "bob");
    }

    #[test]
    fn test_missing_embedding_never_matches() {
        let entries = vec![missing("ghost"), rep("alice", vec![1.0, 0.0])];
        let result = resolve(&[1.0, 0.0], &entries, DistanceMetric::Euclidean, f64::INFINITY).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].identity, "alice");
    }

    #[test]
    fn test_query_dimension_mismatch_is_configuration_error() {
        let err = resolve(&[1.0, 0.0], &store(), DistanceMetric::Cosine, 0.4).unwrap_err();
        assert!(matches!(err, FaceIdError::Configuration(_)));
    }

    #[test]
    fn test_batch_dimension_mismatch_is_configuration_error() {
        let queries = vec![vec![1.0, 0.0, 0.0], vec![1.0]];
        let err = resolve_batch(&queries, &store(), DistanceMetric::Cosine, &[0.4, 0.4]).unwrap_err();
        assert!(matches!(err, FaceIdError::Configuration(_)));
    }

    #[test]
    fn test_batch_threshold_count_mismatch() {
        let err = resolve_batch(&[vec![1.0, 0.0, 0.0]], &store(), DistanceMetric::Cosine, &[])
            .unwrap_err();
        assert!(matches!(err, FaceIdError::Configuration(_)));
    }

    #[test]
    fn test_batch_on_empty_store_returns_one_empty_list_per_query() {
        let queries = vec![vec![1.0], vec![2.0]];
        let result = resolve_batch(&queries, &[], DistanceMetric::Cosine, &[0.4, 0.4]).unwrap();
        assert_eq!(result, vec![Vec::new(), Vec::new()]);
    }

    #[rstest]
    #[case(DistanceMetric::Cosine, vec![0.05, 0.3, 1.0])]
    #[case(DistanceMetric::Euclidean, vec![0.2, 1.0, 2.0])]
    #[case(DistanceMetric::EuclideanL2, vec![0.1, 0.5, 1.5])]
    fn test_batch_equals_per_query_resolve(
        #[case] metric: DistanceMetric,
        #[case] thresholds: Vec<f64>,
    ) {
        let mut entries = store();
        entries.push(missing("ghost"));
        entries.push(rep("alice", vec![0.95, 0.05, 0.1]));

        let queries = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.1, 0.9, 0.2],
            vec![0.5, 0.5, 0.5],
        ];

        let batched = resolve_batch(&queries, &entries, metric, &thresholds).unwrap();

        for (i, query) in queries.iter().enumerate() {
            let single = resolve(query, &entries, metric, thresholds[i]).unwrap();
            assert_eq!(batched[i].len(), single.len(), "query {i}");
            for (b, s) in batched[i].iter().zip(&single) {
                assert_eq!(b.identity, s.identity);
                assert_eq!(b.store_index, s.store_index);
                assert_relative_eq!(b.distance, s.distance, epsilon = 1e-6);
            }
        }
    }

    fn embedding(seed: u32) -> Vec<f32> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(7);
        (0..128)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 8) % 2000) as f32 / 1000.0 - 1.0
            })
            .collect()
    }

    #[rstest]
    #[case(DistanceMetric::Cosine)]
    #[case(DistanceMetric::Euclidean)]
    #[case(DistanceMetric::EuclideanL2)]
    fn test_exact_match_threshold_agrees_between_batch_and_single(#[case] metric: DistanceMetric) {
        let query = embedding(1);
        let entries = vec![rep("alice", query.clone()), rep("bob", embedding(2))];

        let single = resolve(&query, &entries, metric, 0.0).unwrap();
        let batched = resolve_batch(&[query], &entries, metric, &[0.0]).unwrap();

        assert_eq!(single.len(), 1);
        assert_eq!(single[0].identity, "alice");
        assert_eq!(single[0].distance, 0.0);
        assert_eq!(batched, vec![single]);
    }

    #[rstest]
    #[case(DistanceMetric::Cosine)]
    #[case(DistanceMetric::Euclidean)]
    #[case(DistanceMetric::EuclideanL2)]
    fn test_threshold_on_a_stored_distance_agrees_between_batch_and_single(
        #[case] metric: DistanceMetric,
    ) {
        let entries: Vec<Representation> = (0..6)
            .map(|i| rep(&format!("id{i}"), embedding(10 + i)))
            .collect();
        let query = embedding(99);

        for entry in &entries {
            let stored = entry.embedding.as_deref().unwrap();
            let threshold = distance(&query, stored, metric).unwrap();

            let single = resolve(&query, &entries, metric, threshold).unwrap();
            let batched = resolve_batch(&[query.clone()], &entries, metric, &[threshold]).unwrap();

            assert!(single.iter().any(|c| c.identity == entry.identity));
            assert_eq!(batched, vec![single]);
        }
    }
}
