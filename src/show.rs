use crate::cli::CommonArgs;
use crate::model::{AuthorGroup, MergeConfig, ReconciledDocument, TimeSeriesDocument};
use crate::reconcile::reconcile_with;
use crate::store::ArtifactStore;
use anyhow::Context;
use console::style;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorTotals {
    pub author: String,
    pub commits: u64,
    pub edits: u64,
    pub active_intervals: usize,
}

/// Builds the merge configuration from an optional JSON file plus command-line
/// groups and excludes. File groups come first and so take precedence.
pub fn merge_config(
    config: Option<&Path>,
    groups: Vec<AuthorGroup>,
    excludes: Vec<String>,
) -> crate::error::Result<MergeConfig> {
    let mut merge = match config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    merge.groups.extend(groups);
    for name in excludes {
        merge.exclude.insert(name);
    }
    Ok(merge)
}

/// Per-author totals, most commits first.
pub fn author_totals(document: &TimeSeriesDocument) -> Vec<AuthorTotals> {
    let mut totals: Vec<AuthorTotals> = document
        .authors
        .iter()
        .map(|author| AuthorTotals {
            author: author.clone(),
            commits: document.data.iter().fold(0u64, |n, p| n.saturating_add(p.commits(author))),
            edits: document.data.iter().fold(0u64, |n, p| n.saturating_add(p.edits(author))),
            active_intervals: document.data.iter().filter(|p| p.commits(author) > 0).count(),
        })
        .collect();
    totals.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| b.edits.cmp(&a.edits))
            .then_with(|| a.author.cmp(&b.author))
    });
    totals
}

pub fn exec(common: &CommonArgs, file: &str, merge: MergeConfig, json: bool) -> anyhow::Result<()> {
    let store = ArtifactStore::new(&common.data_dir);
    let document = store
        .load(file)
        .with_context(|| format!("Failed to load artifact {file}"))?;
    let reconciled = reconcile_with(&document, &merge)
        .with_context(|| format!("Failed to reconcile {file}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reconciled)?);
    } else {
        output_table(file, &reconciled)?;
    }
    Ok(())
}

fn output_table(file: &str, reconciled: &ReconciledDocument<'_>) -> anyhow::Result<()> {
    let original = reconciled.original();
    let intervals = reconciled.document.intervals();

    println!("{}", style(file).bold());
    if let Some(config) = &reconciled.document.config {
        println!(
            "{} {}s from {} to {}",
            intervals.len(),
            config.interval,
            config.start_date.format("%Y-%m-%d"),
            config.end_date.format("%Y-%m-%d")
        );
    }
    if original.authors.len() != reconciled.authors().len() {
        println!(
            "{} author names reconciled into {} identities",
            original.authors.len(),
            reconciled.authors().len()
        );
    }
    println!();

    let totals = author_totals(&reconciled.document);
    if totals.is_empty() {
        println!("No activity recorded");
        return Ok(());
    }

    println!(
        "{:<40} {:>8} {:>10} {:>8}",
        style("Author").bold(),
        style("Commits").bold(),
        style("Edits").bold(),
        style("Active").bold()
    );
    println!("{}", "─".repeat(69));
    for t in &totals {
        println!(
            "{:<40} {:>8} {:>10} {:>8}",
            t.author,
            style(t.commits).cyan(),
            style(t.edits).green(),
            format!("{}/{}", t.active_intervals, intervals.len())
        );
    }
    Ok(())
}

pub fn list(common: &CommonArgs, json: bool) -> anyhow::Result<()> {
    let store = ArtifactStore::new(&common.data_dir);
    let files = store
        .list()
        .with_context(|| format!("Failed to list {}", store.dir().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        println!("No artifacts in {}", store.dir().display());
    } else {
        for name in files {
            println!("{name}");
        }
    }
    Ok(())
}
