//! Reassembly of a block's attestation list after attacker attestations have been mixed in.

use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tree_hash::TreeHash;
use types::{Attestation, Hash256};

/// Combine `attestations` into the most profitable list of at most `max_attestations`.
///
/// The steps are: drop duplicate and subsumed attestations, aggregate each group sharing an
/// `AttestationData` root, drop duplicates again, sort by slot then by signer count (both
/// descending) and truncate. No two attestations in the output share both their signer set and
/// their data root.
///
/// Aggregation only merges attestations with disjoint signers. Two overlapping attestations for
/// the same data root are both kept, so a validator may appear in more than one aggregate of the
/// same data; uniqueness holds per signer set, not per validator.
pub fn pack_attestations(
    attestations: Vec<Attestation>,
    max_attestations: usize,
) -> Vec<Attestation> {
    let aggregated = group_by_data_root(dedup(attestations))
        .into_values()
        .flat_map(aggregate_group)
        .collect();

    let mut packed = dedup(aggregated);
    packed.sort_by(|a, b| {
        b.slot()
            .cmp(&a.slot())
            .then_with(|| b.num_set_bits().cmp(&a.num_set_bits()))
    });
    packed.truncate(max_attestations);
    packed
}

fn group_by_data_root(attestations: Vec<Attestation>) -> BTreeMap<Hash256, Vec<Attestation>> {
    let mut groups: BTreeMap<Hash256, Vec<Attestation>> = BTreeMap::new();
    for attestation in attestations {
        groups
            .entry(attestation.data.tree_hash_root())
            .or_default()
            .push(attestation);
    }
    groups
}

/// Removes every attestation whose signers are covered by another attestation of the same data.
fn dedup(attestations: Vec<Attestation>) -> Vec<Attestation> {
    group_by_data_root(attestations)
        .into_values()
        .flat_map(|group| {
            let mut kept: Vec<Attestation> = Vec::with_capacity(group.len());
            for attestation in group
                .into_iter()
                .sorted_by_key(|a| Reverse(a.num_set_bits()))
            {
                if !kept.iter().any(|k| attestation.signers_subset_of(k)) {
                    kept.push(attestation);
                }
            }
            kept
        })
        .collect()
}

/// Greedily aggregates attestations which all share the same data.
///
/// Largest first, each attestation is merged into the first aggregate it is disjoint from.
/// Attestations that overlap every aggregate are kept as they are.
fn aggregate_group(group: Vec<Attestation>) -> Vec<Attestation> {
    let mut aggregates: Vec<Attestation> = vec![];

    for attestation in group
        .into_iter()
        .sorted_by_key(|a| Reverse(a.num_set_bits()))
    {
        if aggregates
            .iter()
            .any(|aggregate| attestation.signers_subset_of(aggregate))
        {
            continue;
        }

        let merged = aggregates.iter_mut().any(|aggregate| {
            aggregate.signers_disjoint_from(&attestation)
                && aggregate.aggregate(&attestation).is_ok()
        });

        if !merged {
            aggregates.push(attestation);
        }
    }

    aggregates
}
