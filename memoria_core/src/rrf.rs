//! Reciprocal Rank Fusion (§4.F step 4, §4.H.2, §8 properties 2/9).
//!
//! Pure math shared by the hybrid retriever (fusing BM25 + vector lists) and
//! the agentic retriever (fusing round-1 + per-refined-query lists). Kept
//! dependency-free so both `memoria_memory` and `memoria_agentic` can call it
//! without a cyclic crate dependency.

use std::collections::HashMap;
use std::hash::Hash;

/// Default `rrf_k` (§9: "a tuning parameter, not canonical").
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Fuse any number of ranked lists via `sum(1 / (rrf_k + rank))`, rank
/// 1-based within each input list. A document absent from a list
/// contributes no term for that list (§4.F.1) — it is not assigned a
/// synthetic worst rank. Output is sorted by fused score descending; ties
/// are left in list-encounter order, the caller applies any further
/// tie-break (BM25 score, then `created_at`, per §4.F step 4).
///
/// Invariant (§8 property 3): the result is invariant to the order in which
/// `lists` are supplied, since RRF sums commute.
#[must_use]
pub fn rrf_fuse<K>(lists: &[Vec<K>], rrf_k: f64) -> Vec<(K, f64)>
where
    K: Clone + Eq + Hash,
{
    let mut scores: HashMap<K, f64> = HashMap::new();
    let mut order: Vec<K> = Vec::new();

    for list in lists {
        for (idx, key) in list.iter().enumerate() {
            let rank = idx + 1;
            let term = 1.0 / (rrf_k + rank as f64);
            let entry = scores.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                0.0
            });
            *entry += term;
        }
    }

    let mut fused: Vec<(K, f64)> = order
        .into_iter()
        .map(|k| {
            let score = scores[&k];
            (k, score)
        })
        .collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 S2: BM25 `[A,B,C]`, vector `[B,D,A]`, `rrf_k=60` → `[B,A,D,C]`.
    #[test]
    fn s2_worked_example() {
        let bm25 = vec!["A", "B", "C"];
        let vector = vec!["B", "D", "A"];
        let fused = rrf_fuse(&[bm25, vector], 60.0);
        let order: Vec<&str> = fused.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec!["B", "A", "D", "C"]);

        let by_key: HashMap<&str, f64> = fused.into_iter().collect();
        assert!((by_key["A"] - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert!((by_key["B"] - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((by_key["C"] - (1.0 / 63.0)).abs() < 1e-12);
        assert!((by_key["D"] - (1.0 / 62.0)).abs() < 1e-12);
    }

    /// §8 property 3: fusion is invariant to input list order.
    #[test]
    fn order_invariant() {
        let bm25 = vec!["A", "B", "C"];
        let vector = vec!["B", "D", "A"];
        let a = rrf_fuse(&[bm25.clone(), vector.clone()], 60.0);
        let b = rrf_fuse(&[vector, bm25], 60.0);
        assert_eq!(a, b);
    }

    #[test]
    fn single_list_is_plain_rank_score() {
        let only = vec!["x", "y"];
        let fused = rrf_fuse(&[only], 60.0);
        assert_eq!(fused[0].0, "x");
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-12);
    }
}
