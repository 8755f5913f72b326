//! # Partitioned datasets
//!
//! A [`Dataset`] is a materialized list of partitions. Every operator runs one rayon task per
//! partition and produces a new dataset; nothing is updated in place, so a dataset handed to a
//! round is an immutable snapshot for the whole round.
//!
//! Key-based operators route records with a [`HashPartitioner`] built from fixed seeds and
//! keep records in arrival order (source partition first, then position inside it). The output
//! of any operator therefore depends only on the input order and the partition count.
//!
//! Datasets stay alive until dropped. Iterative code releases superseded datasets explicitly
//! with [`Dataset::unpersist`] to bound memory between rounds.

use ahash::{AHashMap, AHashSet, RandomState};
use log::trace;
use rayon::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

const PARTITION_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Routes keys to partitions by hash.
#[derive(Debug, Clone)]
pub struct HashPartitioner {
    partitions: usize,
    state: RandomState,
}

impl HashPartitioner {
    pub fn new(partitions: usize) -> Self {
        let [k0, k1, k2, k3] = PARTITION_SEEDS;
        HashPartitioner {
            partitions: partitions.max(1),
            state: RandomState::with_seeds(k0, k1, k2, k3),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    #[inline]
    pub fn partition<K: Hash>(&self, key: &K) -> usize {
        (self.state.hash_one(key) % self.partitions as u64) as usize
    }
}

#[derive(Debug, Clone)]
pub struct Dataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T> Dataset<T> {
    /// Wraps already partitioned data. An empty partition list becomes one empty partition.
    pub fn from_partitions(mut partitions: Vec<Vec<T>>) -> Self {
        if partitions.is_empty() {
            partitions.push(Vec::new());
        }
        Dataset { partitions }
    }

    pub fn empty(num_partitions: usize) -> Self {
        Dataset::from_partitions((0..num_partitions.max(1)).map(|_| Vec::new()).collect())
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Vec::is_empty)
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.partitions.iter().flatten()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }

    /// Releases the dataset. Called on every collection a later round has superseded.
    pub fn unpersist(self) {
        trace!(
            "evicting dataset with {} records in {} partitions",
            self.count(),
            self.num_partitions()
        );
    }
}

impl<T: Send> Dataset<T> {
    /// Splits `items` into `num_partitions` contiguous chunks of near-equal size.
    pub fn from_vec(items: Vec<T>, num_partitions: usize) -> Self {
        let num_partitions = num_partitions.max(1);
        let chunk = items.len().div_ceil(num_partitions).max(1);
        let mut iter = items.into_iter();
        let partitions = (0..num_partitions)
            .map(|_| iter.by_ref().take(chunk).collect())
            .collect();
        Dataset { partitions }
    }
}

impl<T: Send + Sync> Dataset<T> {
    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        Dataset {
            partitions: self
                .partitions
                .par_iter()
                .map(|partition| partition.iter().map(&f).collect())
                .collect(),
        }
    }

    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        U: Send,
        I: IntoIterator<Item = U>,
        F: Fn(&T) -> I + Sync + Send,
    {
        Dataset {
            partitions: self
                .partitions
                .par_iter()
                .map(|partition| partition.iter().flat_map(&f).collect())
                .collect(),
        }
    }

    pub fn filter<F>(&self, predicate: F) -> Dataset<T>
    where
        T: Clone,
        F: Fn(&T) -> bool + Sync + Send,
    {
        Dataset {
            partitions: self
                .partitions
                .par_iter()
                .map(|partition| {
                    partition
                        .iter()
                        .filter(|item| predicate(item))
                        .cloned()
                        .collect()
                })
                .collect(),
        }
    }

    pub fn map_partitions_with_index<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Send,
        F: Fn(usize, &[T]) -> Vec<U> + Sync + Send,
    {
        Dataset {
            partitions: self
                .partitions
                .par_iter()
                .enumerate()
                .map(|(index, partition)| f(index, partition))
                .collect(),
        }
    }

    /// Folds every partition from `zero` with `seq`, then merges partition results with `comb`.
    pub fn aggregate<A, S, C>(&self, zero: A, seq: S, comb: C) -> A
    where
        A: Clone + Send + Sync,
        S: Fn(A, &T) -> A + Sync + Send,
        C: Fn(A, A) -> A + Sync + Send,
    {
        self.partitions
            .par_iter()
            .map(|partition| partition.iter().fold(zero.clone(), &seq))
            .reduce(|| zero.clone(), &comb)
    }

    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        self.partitions
            .par_iter()
            .any(|partition| partition.iter().any(&predicate))
    }

    pub fn collect(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Removes duplicate records, keeping the first occurrence in arrival order.
    pub fn distinct(&self) -> Dataset<T>
    where
        T: Hash + Eq + Clone,
    {
        let partitioner = HashPartitioner::new(self.num_partitions());
        let shuffled = shuffle(self.partitions.clone(), partitioner.partitions(), |item| {
            partitioner.partition(item)
        });
        Dataset {
            partitions: shuffled
                .into_par_iter()
                .map(|partition| {
                    let mut seen = AHashSet::with_capacity(partition.len());
                    partition
                        .into_iter()
                        .filter(|item| seen.insert(item.clone()))
                        .collect()
                })
                .collect(),
        }
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn keys(&self) -> Dataset<K> {
        self.map(|(key, _)| key.clone())
    }

    pub fn values(&self) -> Dataset<V> {
        self.map(|(_, value)| value.clone())
    }

    pub fn map_values<U, F>(&self, f: F) -> Dataset<(K, U)>
    where
        U: Send,
        F: Fn(&V) -> U + Sync + Send,
    {
        self.map(|(key, value)| (key.clone(), f(value)))
    }

    pub fn partition_by(&self, partitioner: &HashPartitioner) -> Self {
        Dataset::from_partitions(shuffle(
            self.partitions.clone(),
            partitioner.partitions(),
            |(key, _)| partitioner.partition(key),
        ))
    }

    /// Merges values per key with `f`, combining inside each partition before the shuffle.
    pub fn reduce_by_key<F>(&self, f: F) -> Self
    where
        F: Fn(V, V) -> V + Sync + Send,
    {
        let partitioner = HashPartitioner::new(self.num_partitions());
        let combined: Vec<Vec<(K, V)>> = self
            .partitions
            .par_iter()
            .map(|partition| combine_in_order(partition.iter().cloned(), &f))
            .collect();
        let shuffled = shuffle(combined, partitioner.partitions(), |(key, _)| {
            partitioner.partition(key)
        });
        Dataset {
            partitions: shuffled
                .into_par_iter()
                .map(|partition| combine_in_order(partition, &f))
                .collect(),
        }
    }

    /// Collects every value of a key into one vector, in arrival order.
    pub fn group_by_key(&self) -> Dataset<(K, Vec<V>)> {
        let shuffled = self.partition_by(&HashPartitioner::new(self.num_partitions()));
        Dataset {
            partitions: shuffled
                .partitions
                .into_par_iter()
                .map(|partition| {
                    let mut index: AHashMap<K, usize> = AHashMap::new();
                    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
                    for (key, value) in partition {
                        match index.get(&key) {
                            Some(&slot) => groups[slot].1.push(value),
                            None => {
                                index.insert(key.clone(), groups.len());
                                groups.push((key, vec![value]));
                            }
                        }
                    }
                    groups
                })
                .collect(),
        }
    }

    /// Inner join on the key. Both sides are co-partitioned first.
    pub fn join<W>(&self, other: &Dataset<(K, W)>) -> Dataset<(K, (V, W))>
    where
        W: Clone + Send + Sync,
    {
        self.cogroup_with(other, |key, value, matches, out| {
            if let Some(matches) = matches {
                out.extend(
                    matches
                        .iter()
                        .map(|other| (key.clone(), (value.clone(), other.clone()))),
                );
            }
        })
    }

    /// Keeps every left record; the right value is `None` when the key has no match.
    pub fn left_outer_join<W>(&self, other: &Dataset<(K, W)>) -> Dataset<(K, (V, Option<W>))>
    where
        W: Clone + Send + Sync,
    {
        self.cogroup_with(other, |key, value, matches, out| match matches {
            Some(matches) => out.extend(
                matches
                    .iter()
                    .map(|other| (key.clone(), (value.clone(), Some(other.clone())))),
            ),
            None => out.push((key.clone(), (value.clone(), None))),
        })
    }

    pub fn collect_as_map(&self) -> HashMap<K, V> {
        self.iter().cloned().collect()
    }

    fn cogroup_with<W, U, F>(&self, other: &Dataset<(K, W)>, emit: F) -> Dataset<U>
    where
        W: Clone + Send + Sync,
        U: Send,
        F: Fn(&K, &V, Option<&Vec<W>>, &mut Vec<U>) + Sync + Send,
    {
        let partitioner =
            HashPartitioner::new(self.num_partitions().max(other.num_partitions()));
        let n = partitioner.partitions();
        let left = shuffle(self.partitions.clone(), n, |(key, _)| {
            partitioner.partition(key)
        });
        let right = shuffle(other.partitions.clone(), n, |(key, _)| {
            partitioner.partition(key)
        });

        Dataset {
            partitions: left
                .into_par_iter()
                .zip(right.into_par_iter())
                .map(|(left, right)| {
                    let mut lookup: AHashMap<K, Vec<W>> = AHashMap::with_capacity(right.len());
                    for (key, value) in right {
                        lookup.entry(key).or_default().push(value);
                    }
                    let mut out = Vec::with_capacity(left.len());
                    for (key, value) in &left {
                        emit(key, value, lookup.get(key), &mut out);
                    }
                    out
                })
                .collect(),
        }
    }
}

/// Moves every record to the partition chosen by `route`, preserving arrival order.
fn shuffle<T, F>(partitions: Vec<Vec<T>>, n: usize, route: F) -> Vec<Vec<T>>
where
    T: Send,
    F: Fn(&T) -> usize + Sync + Send,
{
    let bucketed: Vec<Vec<Vec<T>>> = partitions
        .into_par_iter()
        .map(|partition| {
            let mut buckets: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
            for item in partition {
                let target = route(&item);
                buckets[target].push(item);
            }
            buckets
        })
        .collect();

    let mut targets: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    for buckets in bucketed {
        for (target, bucket) in targets.iter_mut().zip(buckets) {
            target.extend(bucket);
        }
    }
    targets
}

fn combine_in_order<K, V, I, F>(items: I, f: &F) -> Vec<(K, V)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = (K, V)>,
    F: Fn(V, V) -> V,
{
    let mut index: AHashMap<K, usize> = AHashMap::new();
    let mut slots: Vec<(K, Option<V>)> = Vec::new();
    for (key, value) in items {
        match index.get(&key) {
            Some(&slot) => {
                let acc = &mut slots[slot].1;
                *acc = Some(match acc.take() {
                    Some(previous) => f(previous, value),
                    None => value,
                });
            }
            None => {
                index.insert(key.clone(), slots.len());
                slots.push((key, Some(value)));
            }
        }
    }
    slots
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
}
