//! Embedding distances, pairwise and batched.
//!
//! Both forms go through the same per-pair kernel with the same summation
//! order, so a batched distance is bit-for-bit the pairwise one and a
//! threshold sitting exactly on a distance filters identically either way.
//! A zero vector is orthogonal to everything.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::matching::domain::distance_metric::DistanceMetric;
use crate::shared::error::{FaceIdError, Result};

/// Distance between two embeddings of equal length.
pub fn distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> Result<f64> {
    if a.len() != b.len() {
        return Err(FaceIdError::configuration(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let a = ArrayView1::from(a).mapv(f64::from);
    let b = ArrayView1::from(b).mapv(f64::from);
    Ok(pair_distance(
        a.view(),
        squared_norm(a.view()),
        b.view(),
        squared_norm(b.view()),
        metric,
    ))
}

/// Distances between every source row and every target row: `M×D, N×D → M×N`.
pub fn batch_distance(
    sources: ArrayView2<'_, f32>,
    targets: ArrayView2<'_, f32>,
    metric: DistanceMetric,
) -> Result<Array2<f64>> {
    if sources.ncols() != targets.ncols() {
        return Err(FaceIdError::configuration(format!(
            "embedding dimensions differ: {} vs {}",
            sources.ncols(),
            targets.ncols()
        )));
    }

    let sources = sources.mapv(f64::from);
    let targets = targets.mapv(f64::from);
    let source_norms: Vec<f64> = sources.rows().into_iter().map(squared_norm).collect();
    let target_norms: Vec<f64> = targets.rows().into_iter().map(squared_norm).collect();

    Ok(Array2::from_shape_fn(
        (sources.nrows(), targets.nrows()),
        |(i, j)| {
            pair_distance(
                sources.row(i),
                source_norms[i],
                targets.row(j),
                target_norms[j],
                metric,
            )
        },
    ))
}

/// Like [`batch_distance`], but rows whose `valid` flag is false are
/// `+inf` against every target so they can never match.
pub fn batch_distance_masked(
    sources: ArrayView2<'_, f32>,
    valid: &[bool],
    targets: ArrayView2<'_, f32>,
    metric: DistanceMetric,
) -> Result<Array2<f64>> {
    if valid.len() != sources.nrows() {
        return Err(FaceIdError::configuration(format!(
            "validity mask has {} entries for {} sources",
            valid.len(),
            sources.nrows()
        )));
    }

    let mut distances = batch_distance(sources, targets, metric)?;
    for (mut row, _) in distances
        .axis_iter_mut(Axis(0))
        .zip(valid)
        .filter(|(_, ok)| !**ok)
    {
        row.fill(f64::INFINITY);
    }
    Ok(distances)
}

/// `sa`/`sb` are the squared norms of `a`/`b`.
fn pair_distance(
    a: ArrayView1<'_, f64>,
    sa: f64,
    b: ArrayView1<'_, f64>,
    sb: f64,
    metric: DistanceMetric,
) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            if sa == 0.0 || sb == 0.0 {
                return 1.0;
            }
            let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
            // sqrt(sa * sa) == sa, so identical vectors land on exactly 0.
            (1.0 - dot / (sa * sb).sqrt()).max(0.0)
        }
        DistanceMetric::Euclidean => euclidean(a.iter().copied(), b.iter().copied()),
        DistanceMetric::EuclideanL2 => {
            let na = sa.sqrt();
            let nb = sb.sqrt();
            euclidean(
                a.iter().map(|x| scale(*x, na)),
                b.iter().map(|y| scale(*y, nb)),
            )
        }
    }
}

fn squared_norm(v: ArrayView1<'_, f64>) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn scale(x: f64, n: f64) -> f64 {
    if n > 0.0 {
        x / n
    } else {
        x
    }
}

fn euclidean(a: impl Iterator<Item = f64>, b: impl Iterator<Item = f64>) -> f64 {
    a.zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}
