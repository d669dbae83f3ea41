//! Session ordering for question records.
//!
//! `sequence` optionally interleaves records so that items sharing a group key
//! are spread apart: records are bucketed by key, buckets are ordered by
//! descending size (stable on first appearance), and the output is built by
//! taking one record from the head of each non-empty bucket per pass.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::model::QuestionRecord;

/// Group used for records whose key path does not resolve.
pub const NO_GROUP: &str = "__none__";

#[derive(Debug, Error)]
enum SequenceError {
    #[error("group key could not be encoded: {0}")]
    KeyEncoding(#[from] serde_json::Error),

    #[error("interleaved order is not a permutation (expected {expected}, got {got})")]
    NotAPermutation { expected: usize, got: usize },
}

/// Produce the session order for `records`.
///
/// Without a key path (or with a blank one) the input is returned untouched.
/// Interleaving never fails the caller: if grouping goes wrong the original
/// order is kept and a warning is logged.
#[must_use]
pub fn sequence(records: Vec<QuestionRecord>, group_key_path: Option<&str>) -> Vec<QuestionRecord> {
    let Some(path) = group_key_path.map(str::trim).filter(|p| !p.is_empty()) else {
        return records;
    };

    match interleaved_order(&records, path) {
        Ok(order) => {
            let mut slots: Vec<Option<QuestionRecord>> = records.into_iter().map(Some).collect();
            order
                .into_iter()
                .filter_map(|index| slots.get_mut(index).and_then(Option::take))
                .collect()
        }
        Err(err) => {
            tracing::warn!(%err, path, "interleave failed, keeping original order");
            records
        }
    }
}

/// Shuffle `records` into an order that is stable for a given `seed`.
///
/// Hosts use this to give each respondent their own order while keeping it
/// identical across page reloads of the same session.
#[must_use]
pub fn stable_shuffle(mut records: Vec<QuestionRecord>, seed: u64) -> Vec<QuestionRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    records.as_mut_slice().shuffle(&mut rng);
    records
}

fn interleaved_order(records: &[QuestionRecord], path: &str) -> Result<Vec<usize>, SequenceError> {
    let mut slot_by_key: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<VecDeque<usize>> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let key = group_key(record, path)?;
        let slot = *slot_by_key.entry(key).or_insert_with(|| {
            buckets.push(VecDeque::new());
            buckets.len() - 1
        });
        buckets[slot].push_back(index);
    }

    // `sort_by_key` is stable, so equal-sized buckets keep first-seen order.
    buckets.sort_by_key(|bucket| Reverse(bucket.len()));

    let mut order = Vec::with_capacity(records.len());
    while buckets.iter().any(|bucket| !bucket.is_empty()) {
        for bucket in &mut buckets {
            if let Some(index) = bucket.pop_front() {
                order.push(index);
            }
        }
    }

    let mut seen = vec![false; records.len()];
    let distinct = order
        .iter()
        .filter(|&&index| index < seen.len() && !std::mem::replace(&mut seen[index], true))
        .count();
    if distinct != records.len() || order.len() != records.len() {
        return Err(SequenceError::NotAPermutation {
            expected: records.len(),
            got: distinct,
        });
    }

    Ok(order)
}

fn group_key(record: &QuestionRecord, path: &str) -> Result<String, SequenceError> {
    Ok(match record.lookup(path) {
        None => NO_GROUP.to_string(),
        Some(Value::String(s)) => s,
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar.to_string(),
        Some(nested) => serde_json::to_string(&nested)?,
    })
}
