use anyhow::Result;
use std::rc::Rc;

use crate::Context;
use crate::cli::SyncArgs;
use crate::github::GitHubClient;
use crate::reconcile::{SyncOutcome, SyncSettings, Synchronizer};
use crate::ui;
use crate::vcs::Git;

pub fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let repository_root = super::resolve_root(&args.repository_root)?;
    let project_root =
        super::resolve_root(&repository_root.join(&args.working_directory_relative))?;
    ui::header("InfraPatch Sync");
    ui::kv("Repository", &args.repository_name);
    ui::kv("Head branch", &args.head_branch);
    ui::kv("Upgrade branch", &args.target_branch);
    ui::kv("Project", &project_root.display().to_string());

    let registry = super::registry(ctx, Some(&args.registry_secret_string))?;
    let git = Rc::new(Git::new(&repository_root));
    let mut handler = super::handler(&project_root, &registry)?.with_vcs(git.clone());
    let github = GitHubClient::new(
        &args.github_api_url,
        &args.repository_name,
        Some(args.github_token.clone()),
    );

    let settings = SyncSettings {
        head_branch: args.head_branch,
        target_branch: args.target_branch,
        project_root,
        report_only: args.report_only,
    };
    let synchronizer = Synchronizer {
        vcs: &*git,
        service: &github,
        releases: &github,
    };

    match synchronizer.run(&settings, &mut handler)? {
        SyncOutcome::Reported => ui::info("Report only, nothing was changed"),
        SyncOutcome::UpToDate => ui::success("All resources are up to date"),
        SyncOutcome::NothingPatched => ui::info("Upgrade branch has nothing to review"),
        SyncOutcome::Created(request) => {
            ui::success(&format!("Opened pull request #{}", request.number));
            ui::dim(&request.url);
        }
        SyncOutcome::Updated(number) => ui::success(&format!("Updated pull request #{number}")),
    }

    handler.dump_statistics(false)?;
    Ok(())
}
