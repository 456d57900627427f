use super::interval::{commit_day, interval_label, interval_labels};
use crate::model::{CommitRecord, DataPoint, DateRange, DocumentConfig, Granularity, TimeSeriesDocument};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Buckets commits per author into every interval of `range`.
///
/// The output is dense: each author seen anywhere in the range gets explicit
/// zero counts in the intervals where they were inactive.
pub fn bucketize(
    commits: &[CommitRecord],
    range: &DateRange,
    granularity: Granularity,
) -> TimeSeriesDocument {
    let intervals = interval_labels(range, granularity);
    let slots: HashMap<&str, usize> = intervals
        .iter()
        .enumerate()
        .map(|(slot, label)| (label.as_str(), slot))
        .collect();

    let mut authors: Vec<String> = Vec::new();
    let mut series: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
    let mut skipped = 0usize;

    for commit in commits {
        let label = interval_label(commit_day(&commit.committed_date), granularity);
        let Some(&slot) = slots.get(label.as_str()) else {
            debug!(author = %commit.author_name, %label, "commit outside collection range");
            skipped += 1;
            continue;
        };

        let counts = series.entry(commit.author_name.clone()).or_insert_with(|| {
            authors.push(commit.author_name.clone());
            vec![(0, 0); intervals.len()]
        });
        let (slot_commits, slot_edits) = &mut counts[slot];
        *slot_commits = slot_commits.saturating_add(1);
        *slot_edits = slot_edits.saturating_add(commit.edits());
    }

    if skipped > 0 {
        warn!(skipped, "ignored commits dated outside the requested range");
    }

    let data = intervals
        .iter()
        .enumerate()
        .map(|(slot, label)| {
            let mut point = DataPoint::new(label.clone());
            for author in &authors {
                let (commits, edits) = series[author][slot];
                point.set(author, commits, edits);
            }
            point
        })
        .collect();

    debug!(
        intervals = intervals.len(),
        authors = authors.len(),
        commits = commits.len() - skipped,
        "bucketed commits"
    );

    TimeSeriesDocument {
        data,
        authors,
        config: Some(DocumentConfig::new(granularity, range)),
    }
}
