//! Author identity reconciliation.
//!
//! Folds author name variants into one canonical identity and drops excluded
//! identities, re-aggregating every interval of a [`TimeSeriesDocument`].
//!
//! Resolution rules, applied in this order:
//!
//! * Groups are processed in input order. A group whose canonical (first)
//!   name is excluded is ignored entirely.
//! * A member maps to its group's canonical name when it is present in the
//!   document, not excluded, and not already claimed. A name listed in two
//!   groups therefore belongs to the first group that lists it.
//! * A group that claims no member produces no identity.
//! * Remaining authors that are not excluded keep their own name.

use crate::error::{PulseError, Result};
use crate::model::{AuthorGroup, DataPoint, ExcludeSet, MergeConfig, ReconciledDocument, TimeSeriesDocument};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

struct IdentityMap<'a> {
    /// Output identities, group canonicals first, then untouched authors.
    identities: Vec<&'a str>,
    /// Original author names folded into each identity.
    sources: HashMap<&'a str, Vec<&'a str>>,
}

fn resolve_identities<'a>(
    authors: &'a [String],
    groups: &'a [AuthorGroup],
    excludes: &ExcludeSet,
) -> IdentityMap<'a> {
    let mut seen_input = HashSet::new();
    let authors: Vec<&str> = authors
        .iter()
        .map(String::as_str)
        .filter(|a| seen_input.insert(*a))
        .collect();
    let present: HashSet<&str> = authors.iter().copied().collect();

    let mut canonical_of: HashMap<&str, &str> = HashMap::new();
    let mut identities: Vec<&str> = Vec::new();
    let mut kept: HashSet<&str> = HashSet::new();

    for group in groups {
        let Some(canonical) = group.canonical() else {
            continue;
        };
        if excludes.contains(canonical) {
            debug!(canonical, "group suppressed by exclusion");
            continue;
        }

        let mut claimed = false;
        for name in group.members().iter().map(String::as_str) {
            if excludes.contains(name) || !present.contains(name) {
                continue;
            }
            if let Some(owner) = canonical_of.get(name) {
                debug!(name, owner, ignored = canonical, "name already claimed by an earlier group");
                continue;
            }
            canonical_of.insert(name, canonical);
            claimed = true;
        }

        if claimed && kept.insert(canonical) {
            identities.push(canonical);
        }
    }

    for &author in &authors {
        if excludes.contains(author) || canonical_of.contains_key(author) {
            continue;
        }
        canonical_of.insert(author, author);
        if kept.insert(author) {
            identities.push(author);
        }
    }

    let mut sources: HashMap<&str, Vec<&str>> = HashMap::new();
    for &author in &authors {
        if let Some(&identity) = canonical_of.get(author) {
            sources.entry(identity).or_default().push(author);
        }
    }

    debug!(?identities, ?canonical_of, "resolved author identities");
    IdentityMap { identities, sources }
}

/// Re-aggregates `document` under the identities described by `groups` and
/// `excludes`. Pure and deterministic; the input is never modified.
///
/// Fails with [`PulseError::InvalidDocument`] when a merged count does not
/// fit in a `u64`.
pub fn reconcile<'a>(
    document: &'a TimeSeriesDocument,
    groups: &[AuthorGroup],
    excludes: &ExcludeSet,
) -> Result<ReconciledDocument<'a>> {
    let map = resolve_identities(&document.authors, groups, excludes);

    let data = document
        .data
        .iter()
        .map(|point| -> Result<DataPoint> {
            let mut merged = DataPoint::new(point.interval.clone());
            for &identity in &map.identities {
                let sources = map.sources.get(identity).map(Vec::as_slice).unwrap_or_default();
                let (commits, edits) = merged_counts(point, sources).ok_or_else(|| {
                    PulseError::InvalidDocument(format!(
                        "merged counts for '{identity}' in {} overflow",
                        point.interval
                    ))
                })?;
                merged.set(identity, commits, edits);
            }
            Ok(merged)
        })
        .collect::<Result<Vec<_>>>()?;

    let reconciled = TimeSeriesDocument {
        data,
        authors: map.identities.iter().map(|s| s.to_string()).collect(),
        config: document.config.clone(),
    };
    Ok(ReconciledDocument::new(reconciled, document))
}

fn merged_counts(point: &DataPoint, names: &[&str]) -> Option<(u64, u64)> {
    names.iter().try_fold((0u64, 0u64), |(commits, edits), &name| {
        Some((
            commits.checked_add(point.commits(name))?,
            edits.checked_add(point.edits(name))?,
        ))
    })
}

pub fn reconcile_with<'a>(
    document: &'a TimeSeriesDocument,
    merge: &MergeConfig,
) -> Result<ReconciledDocument<'a>> {
    reconcile(document, &merge.groups, &merge.exclude)
}

/// Validates raw artifact JSON and reconciles it. Fails with
/// [`PulseError::InvalidDocument`] before any transformation when the input
/// lacks `authors` or `data`/`dataPoints`, or carries non-integer counts.
pub fn reconcile_value(
    raw: &serde_json::Value,
    groups: &[AuthorGroup],
    excludes: &ExcludeSet,
) -> Result<TimeSeriesDocument> {
    let document =
        TimeSeriesDocument::deserialize(raw).map_err(|e| PulseError::InvalidDocument(e.to_string()))?;
    Ok(reconcile(&document, groups, excludes)?.into_document())
}
