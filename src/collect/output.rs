use crate::model::TimeSeriesDocument;
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn output_summary(document: &TimeSeriesDocument, path: &Path) -> Result<()> {
    let commits: u64 = document
        .data
        .iter()
        .flat_map(|point| document.authors.iter().map(move |a| point.commits(a)))
        .fold(0u64, u64::saturating_add);
    let edits: u64 = document
        .data
        .iter()
        .flat_map(|point| document.authors.iter().map(move |a| point.edits(a)))
        .fold(0u64, u64::saturating_add);
    let intervals = document.intervals();

    println!("{}", style("Collection Summary").bold());
    println!("{}", "─".repeat(50));
    println!("Commits: {}", style(commits).cyan());
    println!("Lines edited: {}", style(edits).green());
    println!("Authors: {}", style(document.authors.len()).yellow());

    if let (Some(first), Some(last)) = (intervals.first(), intervals.last()) {
        let unit = document
            .config
            .as_ref()
            .map(|c| c.interval.as_str())
            .unwrap_or("interval");
        println!(
            "Time period: {} {unit}s from {} to {}",
            intervals.len(),
            style(first).dim(),
            style(last).dim()
        );
    }

    println!("\nSaved to {}", style(path.display()).bold());
    Ok(())
}
