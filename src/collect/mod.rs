pub mod bucket;
pub mod exec;
pub mod gitlab;
pub mod interval;
pub mod output;

pub use bucket::bucketize;
pub use exec::{collect, exec, resolve_range};
pub use gitlab::{CollectorConfig, GitLabClient, RepoLocator};
pub use interval::{interval_label, interval_labels};
pub use output::output_summary;
