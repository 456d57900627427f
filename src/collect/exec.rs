use super::bucket::bucketize;
use super::gitlab::{CollectorConfig, GitLabClient, RepoLocator};
use super::output::output_summary;
use crate::cli::{CollectArgs, CommonArgs};
use crate::error::{PulseError, Result};
use crate::model::{DateRange, Granularity, TimeSeriesDocument};
use crate::store::{artifact_filename, ArtifactStore};
use anyhow::Context;
use chrono::{Months, NaiveDate, Utc};
use tracing::info;

/// Turns the `--from/--to/--months` options into an inclusive range.
/// `--from` wins over `--months`; `--months` counts back from the end date.
pub fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    months: u32,
    today: NaiveDate,
) -> Result<DateRange> {
    if months == 0 {
        return Err(PulseError::InvalidInput("months must be a positive integer".to_string()));
    }
    let end = to.unwrap_or(today);
    let start = match from {
        Some(start) => start,
        None => end.checked_sub_months(Months::new(months)).ok_or_else(|| {
            PulseError::InvalidInput(format!("Cannot go back {months} months from {end}"))
        })?,
    };
    DateRange::new(start, end)
}

/// Resolves the project, pages through its history and buckets the result.
/// Nothing is returned unless every step succeeds.
pub async fn collect(
    client: &GitLabClient,
    locator: &RepoLocator,
    range: &DateRange,
    granularity: Granularity,
) -> Result<TimeSeriesDocument> {
    let project_id = client.resolve_project_id(&locator.project_path).await?;
    let commits = client.fetch_commits(project_id, range).await?;
    Ok(bucketize(&commits, range, granularity))
}

pub async fn exec(common: &CommonArgs, args: CollectArgs) -> anyhow::Result<()> {
    let locator = RepoLocator::parse(&args.repo).context("Failed to parse repository URL")?;
    let range = resolve_range(args.from, args.to, args.months, Utc::now().date_naive())
        .context("Failed to resolve date range")?;

    let api_base = args.api_base.unwrap_or_else(|| locator.api_base.clone());
    let config = CollectorConfig::new(api_base, args.token.unwrap_or_default())
        .with_page_size(args.page_size)
        .with_page_delay(args.page_delay)
        .with_progress(console::Term::stderr().is_term());
    let client = GitLabClient::new(config).context("Failed to set up GitLab client")?;

    println!(
        "Collecting {} from {} to {} by {}",
        locator.project_path,
        range.start(),
        range.end(),
        args.interval
    );

    let document = collect(&client, &locator, &range, args.interval)
        .await
        .with_context(|| format!("Failed to collect commit statistics for {}", locator.project_path))?;

    let store = ArtifactStore::new(&common.data_dir);
    let name = artifact_filename(&locator.repo_name, &range, args.interval);
    let path = store
        .save(&name, &document)
        .with_context(|| format!("Failed to write artifact {name}"))?;
    info!(artifact = %name, authors = document.authors.len(), "collection finished");

    output_summary(&document, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn months_count_back_from_end() {
        let range = resolve_range(None, None, 1, date(2024, 3, 31)).unwrap();
        assert_eq!((range.start(), range.end()), (date(2024, 2, 29), date(2024, 3, 31)));

        let range = resolve_range(None, Some(date(2024, 1, 15)), 3, date(2030, 1, 1)).unwrap();
        assert_eq!(range.start(), date(2023, 10, 15));
    }

    #[test]
    fn explicit_from_overrides_months() {
        let range = resolve_range(Some(date(2023, 5, 1)), Some(date(2023, 5, 31)), 12, date(2024, 1, 1))
            .unwrap();
        assert_eq!((range.start(), range.end()), (date(2023, 5, 1), date(2023, 5, 31)));
    }

    #[test]
    fn bad_ranges_are_invalid_input() {
        assert!(matches!(
            resolve_range(Some(date(2024, 2, 1)), Some(date(2024, 1, 1)), 1, date(2024, 3, 1)),
            Err(PulseError::InvalidInput(_))
        ));
        assert!(matches!(
            resolve_range(None, None, 0, date(2024, 3, 1)),
            Err(PulseError::InvalidInput(_))
        ));
    }
}
