use crate::collect::gitlab::DEFAULT_PAGE_SIZE;
use crate::model::{AuthorGroup, Granularity};
use crate::store::{ArtifactStore, DEFAULT_DATA_DIR};
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "commitpulse")]
#[command(about = "Collect GitLab commit activity per author and reconcile author identities")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    #[arg(
        long,
        global = true,
        env = "OUTPUT_DIR",
        default_value = DEFAULT_DATA_DIR,
        help = "Directory holding collected artifacts"
    )]
    pub data_dir: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity (-v, -vv)")]
    pub verbose: u8,
}

#[derive(Args, Clone, Debug)]
pub struct CollectArgs {
    #[arg(help = "GitLab project URL, e.g. https://gitlab.com/group/repo")]
    pub repo: String,

    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true, help = "GitLab access token")]
    pub token: Option<String>,

    #[arg(long, value_enum, default_value_t = Granularity::Day, help = "Bucket size")]
    pub interval: Granularity,

    #[arg(long, help = "First day to collect (YYYY-MM-DD)")]
    pub from: Option<NaiveDate>,

    #[arg(long, help = "Last day to collect (YYYY-MM-DD), defaults to today")]
    pub to: Option<NaiveDate>,

    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Months to look back when --from is not given"
    )]
    pub months: u32,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "500ms", help = "Pause between API pages")]
    pub page_delay: Duration,

    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = clap::value_parser!(u32).range(1..=100),
        help = "Commits requested per API page"
    )]
    pub page_size: u32,

    #[arg(long, help = "API base URL, derived from the repository URL by default")]
    pub api_base: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch commit statistics and write an artifact
    Collect(CollectArgs),
    /// List artifacts, newest first
    List {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Reconcile an artifact's authors and print per-author totals
    Show {
        #[arg(help = "Artifact file name")]
        file: String,

        #[arg(long, help = "JSON file with \"groups\" and \"exclude\"")]
        config: Option<PathBuf>,

        #[arg(long = "group", value_name = "NAMES", help = "Comma-separated names to merge, canonical first")]
        groups: Vec<AuthorGroup>,

        #[arg(long = "exclude", value_name = "NAME", help = "Author to drop")]
        excludes: Vec<String>,

        #[arg(long, help = "Output the reconciled document as JSON")]
        json: bool,
    },
    /// Serve artifacts over HTTP
    Serve {
        #[arg(long, env = "COMMITPULSE_ADDR", default_value = "127.0.0.1:3000", help = "Listen address")]
        addr: SocketAddr,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Collect(args) => crate::collect::exec(&self.common, args).await,
            Commands::List { json } => crate::show::list(&self.common, json),
            Commands::Show { file, config, groups, excludes, json } => {
                let merge = crate::show::merge_config(config.as_deref(), groups, excludes)?;
                crate::show::exec(&self.common, &file, merge, json)
            }
            Commands::Serve { addr } => {
                crate::serve::exec(ArtifactStore::new(&self.common.data_dir), addr).await
            }
        }
    }
}
