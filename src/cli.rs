use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "infrapatch")]
#[command(version)]
#[command(about = "Keep Terraform module and provider versions up to date", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON file mapping registry domains to tokens
    #[arg(long, global = true, value_name = "PATH")]
    pub credentials_file: Option<String>,

    /// Registry used for sources without a domain
    #[arg(
        long,
        global = true,
        env = "DEFAULT_REGISTRY_DOMAIN",
        default_value = registrykit::DEFAULT_REGISTRY_DOMAIN
    )]
    pub default_registry_domain: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show resources and whether they can be upgraded
    Report(ReportArgs),

    /// Upgrade resources in place
    Upgrade(UpgradeArgs),

    /// Maintain the upgrade branch and its pull request (CI entry point)
    Sync(SyncArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Directory searched for .tf files
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Write InfraPatch_Statistics.json into the current directory
    #[arg(long)]
    pub dump_json_statistics: bool,
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only list resources with a newer version
    #[arg(long)]
    pub only_upgradable: bool,
}

#[derive(Args)]
pub struct UpgradeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub confirm: bool,

    /// Commit each upgrade to the current git branch
    #[arg(long)]
    pub commit: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Token for the GitHub API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Branch upgrades are proposed against
    #[arg(long, env = "HEAD_BRANCH")]
    pub head_branch: String,

    /// Long-lived upgrade branch
    #[arg(long, env = "TARGET_BRANCH")]
    pub target_branch: String,

    /// Repository as owner/name
    #[arg(long, env = "REPOSITORY_NAME")]
    pub repository_name: String,

    /// Terraform project directory, relative to the repository root
    #[arg(long, env = "WORKING_DIRECTORY_RELATIVE", default_value = "")]
    pub working_directory_relative: String,

    /// Newline-separated domain=token pairs
    #[arg(long, env = "REGISTRY_SECRET_STRING", default_value = "", hide_env_values = true)]
    pub registry_secret_string: String,

    /// Print the report and stop
    #[arg(long, env = "REPORT_ONLY", default_value_t = false, action = clap::ArgAction::Set)]
    pub report_only: bool,

    /// GitHub API endpoint
    #[arg(long, env = "GITHUB_API_URL", default_value = crate::github::GITHUB_API_URL)]
    pub github_api_url: String,

    /// Repository checkout
    #[arg(long, default_value = ".")]
    pub repository_root: PathBuf,
}
