use crate::error::{PulseError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const COMMITS_SUFFIX: &str = "_commits";
pub const EDITS_SUFFIX: &str = "_edits";

const LABEL_KEY: &str = "interval";
const LEGACY_LABEL_KEY: &str = "month";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PulseError::InvalidInput(format!(
                "Invalid range: start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First instant of the range, midnight UTC.
    pub fn since(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Last second of the range's final day, UTC.
    pub fn until(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.end.and_time(NaiveTime::MIN)) + TimeDelta::seconds(86_399)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One commit as returned by the GitLab commits endpoint with `with_stats=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub author_name: String,
    pub committed_date: DateTime<FixedOffset>,
    #[serde(default)]
    pub stats: Option<CommitStats>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl CommitRecord {
    pub fn edits(&self) -> u64 {
        self.stats
            .map(|s| s.additions.saturating_add(s.deletions))
            .unwrap_or(0)
    }
}

pub fn commits_key(author: &str) -> String {
    format!("{author}{COMMITS_SUFFIX}")
}

pub fn edits_key(author: &str) -> String {
    format!("{author}{EDITS_SUFFIX}")
}

/// A single interval of the time series.
///
/// On the wire this is a flat object: the label under both `interval` and the
/// legacy `month` key, plus one `<author>_commits` / `<author>_edits` pair per
/// author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPoint {
    pub interval: String,
    counts: BTreeMap<String, u64>,
}

impl DataPoint {
    pub fn new(interval: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            counts: BTreeMap::new(),
        }
    }

    pub fn commits(&self, author: &str) -> u64 {
        self.counts.get(&commits_key(author)).copied().unwrap_or(0)
    }

    pub fn edits(&self, author: &str) -> u64 {
        self.counts.get(&edits_key(author)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, author: &str, commits: u64, edits: u64) {
        self.counts.insert(commits_key(author), commits);
        self.counts.insert(edits_key(author), edits);
    }

    pub fn count_keys(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }
}

impl Serialize for DataPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len() + 2))?;
        map.serialize_entry(LABEL_KEY, &self.interval)?;
        map.serialize_entry(LEGACY_LABEL_KEY, &self.interval)?;
        for (key, value) in &self.counts {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct DataPointVisitor;

impl<'de> Visitor<'de> for DataPointVisitor {
    type Value = DataPoint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object with an interval label and per-author counts")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<DataPoint, A::Error> {
        let mut interval: Option<String> = None;
        let mut legacy: Option<String> = None;
        let mut counts = BTreeMap::new();

        while let Some(key) = access.next_key::<String>()? {
            match key.as_str() {
                LABEL_KEY => interval = Some(access.next_value()?),
                LEGACY_LABEL_KEY => legacy = Some(access.next_value()?),
                _ => {
                    let value: u64 = access.next_value()?;
                    counts.insert(key, value);
                }
            }
        }

        let interval = interval
            .or(legacy)
            .ok_or_else(|| de::Error::missing_field(LABEL_KEY))?;
        Ok(DataPoint { interval, counts })
    }
}

impl<'de> Deserialize<'de> for DataPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(DataPointVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentConfig {
    pub interval: Granularity,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl DocumentConfig {
    pub fn new(granularity: Granularity, range: &DateRange) -> Self {
        Self {
            interval: granularity,
            start_date: range.since(),
            end_date: range.until(),
        }
    }
}

/// The persisted artifact: per-author commit and edit counts for every interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesDocument {
    #[serde(alias = "dataPoints")]
    pub data: Vec<DataPoint>,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DocumentConfig>,
}

impl TimeSeriesDocument {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| PulseError::InvalidDocument(e.to_string()))
    }

    pub fn intervals(&self) -> Vec<&str> {
        self.data.iter().map(|p| p.interval.as_str()).collect()
    }

    /// True when every point carries exactly the commit and edit keys of `authors`.
    pub fn is_dense(&self) -> bool {
        let expected: BTreeSet<String> = self
            .authors
            .iter()
            .flat_map(|a| [commits_key(a), edits_key(a)])
            .collect();
        self.data.iter().all(|point| {
            point.counts.len() == expected.len()
                && point.count_keys().all(|k| expected.contains(k))
        })
    }
}

/// Author names that belong to one person. The first name is the canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorGroup(Vec<String>);

impl AuthorGroup {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn canonical(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn members(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for AuthorGroup {
    type Err = PulseError;

    /// Parses `"Main Name,variant,other variant"`.
    fn from_str(s: &str) -> Result<Self> {
        let names: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(PulseError::InvalidInput(format!("Empty author group: '{s}'")));
        }
        Ok(Self::new(names))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludeSet(BTreeSet<String>);

impl ExcludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, author: &str) -> bool {
        self.0.contains(author)
    }

    pub fn insert(&mut self, author: impl Into<String>) -> bool {
        self.0.insert(author.into())
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// User-edited identity settings: which names to merge and which to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default, alias = "authorGroups")]
    pub groups: Vec<AuthorGroup>,
    #[serde(default, alias = "excludeAuthors")]
    pub exclude: ExcludeSet,
}

impl MergeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            PulseError::InvalidInput(format!("Malformed merge config {}: {e}", path.display()))
        })
    }
}

/// A reconciled view of a document. Keeps a borrow of its source for
/// traceability; the borrow takes no part in equality or serialization.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledDocument<'a> {
    #[serde(flatten)]
    pub document: TimeSeriesDocument,
    #[serde(skip)]
    original: &'a TimeSeriesDocument,
}

impl<'a> ReconciledDocument<'a> {
    pub fn new(document: TimeSeriesDocument, original: &'a TimeSeriesDocument) -> Self {
        Self { document, original }
    }

    pub fn original(&self) -> &'a TimeSeriesDocument {
        self.original
    }

    pub fn authors(&self) -> &[String] {
        &self.document.authors
    }

    pub fn data(&self) -> &[DataPoint] {
        &self.document.data
    }

    pub fn into_document(self) -> TimeSeriesDocument {
        self.document
    }
}

impl PartialEq for ReconciledDocument<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
    }
}
