//! Property tests for in-memory vector index search ordering.

use std::collections::HashSet;

use proptest::prelude::*;
use rsm_rag::{DistanceMetric, FragmentMetadata, InMemoryVectorIndex, IndexedEntry, VectorIndex};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an entry with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = IndexedEntry> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", prop_oneof!["A", "B"], arb_normalized_embedding(dim))
        .prop_map(|(id, text, source, embedding)| IndexedEntry {
            id,
            text,
            embedding,
            metadata: FragmentMetadata { source, chunk_index: 0, total_chunks: 1 },
        })
}

fn dedup(entries: Vec<IndexedEntry>) -> Vec<IndexedEntry> {
    let mut seen = HashSet::new();
    entries.into_iter().filter(|e| seen.insert(e.id.clone())).collect()
}

/// For any set of stored entries, search returns at most `k` hits in
/// non-decreasing distance order, under both metrics.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_ascending_and_bounded_by_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
            squared_l2 in any::<bool>(),
        ) {
            let metric = if squared_l2 { DistanceMetric::SquaredL2 } else { DistanceMetric::Cosine };
            let unique = dedup(entries);
            let unique_count = unique.len();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::with_metric(metric);
                index.add(&unique).await.unwrap();
                index.search(&query, k).await.unwrap()
            });

            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "results not in ascending order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
        }

        #[test]
        fn stats_count_every_unique_entry(
            entries in proptest::collection::vec(arb_entry(DIM), 0..20),
        ) {
            let unique = dedup(entries);
            let expected_a = unique.iter().filter(|e| e.metadata.source == "A").count();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let stats = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.add(&unique).await.unwrap();
                index.stats().await.unwrap()
            });

            prop_assert_eq!(stats.total_count, unique.len());
            prop_assert_eq!(stats.sources.get("A").copied().unwrap_or(0), expected_a);
            prop_assert_eq!(stats.sources.values().sum::<usize>(), unique.len());
        }
    }
}

#[tokio::test]
async fn stored_embedding_is_its_own_nearest_neighbour() {
    let index = InMemoryVectorIndex::new();
    let entries: Vec<IndexedEntry> = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.6, 0.8, 0.0]]
        .iter()
        .enumerate()
        .map(|(i, v)| IndexedEntry {
            id: format!("e{i}"),
            text: format!("text {i}"),
            embedding: v.to_vec(),
            metadata: FragmentMetadata { source: "S".into(), chunk_index: i, total_chunks: 3 },
        })
        .collect();
    index.add(&entries).await.unwrap();

    let hits = index.search(&[0.6, 0.8, 0.0], 3).await.unwrap();
    assert_eq!(hits[0].text, "text 2");
    assert!(hits[0].distance.abs() < 1e-6);
}
