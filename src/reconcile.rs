//! Upgrade branch and review request synchronization.
//!
//! One run looks at whether the upgrade branch and an open review request
//! for it exist, and picks the matching action sequence:
//!
//! | branch | request | actions |
//! |--------|---------|---------|
//! | no     | -       | create branch at head, upgrade, push, open request |
//! | yes    | no      | rebase onto head, push, upgrade from scratch, push, open request |
//! | yes    | yes     | rebase onto head, push, upgrade with the request's snapshot, push, update |
//!
//! Rebase conflicts resolve to head's content; the branch only holds
//! regenerable upgrades. A request is opened once something was patched or
//! the branch already carries commits head lacks.

use crate::engine::ProviderHandler;
use crate::github::{ReleaseNotesSource, ReviewRequest, ReviewRequestService};
use crate::review;
use crate::vcs::VersionControl;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;

/// Inputs of one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Branch upgrades are proposed against
    pub head_branch: String,
    /// Long-lived upgrade branch
    pub target_branch: String,
    /// Directory the snapshot paths are relative to
    pub project_root: PathBuf,
    pub report_only: bool,
}

/// What a run ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Report printed, nothing touched
    Reported,
    /// No branch and nothing to upgrade
    UpToDate,
    /// Branch level with head and nothing patched, so no request was opened
    NothingPatched,
    Created(ReviewRequest),
    Updated(u64),
}

/// Collaborators of a run.
pub struct Synchronizer<'a> {
    pub vcs: &'a dyn VersionControl,
    pub service: &'a dyn ReviewRequestService,
    pub releases: &'a dyn ReleaseNotesSource,
}

impl Synchronizer<'_> {
    pub fn run(
        &self,
        settings: &SyncSettings,
        handler: &mut ProviderHandler,
    ) -> Result<SyncOutcome> {
        self.vcs.fetch()?;
        if self.vcs.is_dirty()? {
            bail!("Working tree has uncommitted changes, refusing to sync");
        }

        handler.get_resources(false)?;
        if settings.report_only {
            handler.print_resource_table(false)?;
            return Ok(SyncOutcome::Reported);
        }

        let head = settings.head_branch.as_str();
        let target = settings.target_branch.as_str();
        let branch = self.service.get_branch(target)?;
        let request = match branch {
            Some(_) => self.service.list_open_requests(head, target)?.into_iter().next(),
            None => None,
        };
        log::info!(
            "Branch '{target}' exists: {}, open request: {}",
            branch.is_some(),
            request.as_ref().map_or("none".to_string(), |r| format!("#{}", r.number))
        );

        match (branch, request) {
            (None, _) => self.create_branch(settings, handler),
            (Some(_), None) => {
                self.rebase_target(settings)?;
                handler.get_resources(true)?;
                self.upgrade_and_push(target, handler)?;
                let ahead = self.vcs.commits_ahead(&self.vcs.remote_ref(head))?;
                log::debug!("'{target}' is {ahead} commit(s) ahead of '{head}'");
                self.open_request(settings, handler, ahead > 0)
            }
            (Some(_), Some(request)) => {
                self.rebase_target(settings)?;
                let prior = review::parse_snapshot(
                    request.body.as_deref().unwrap_or_default(),
                    &settings.project_root,
                )?;
                handler.get_resources(true)?;
                handler.set_resources_patched_based_on_existing_resources(&prior)?;
                self.upgrade_and_push(target, handler)?;

                let body = self.body(settings, handler)?;
                self.service.edit_request_body(request.number, &body)?;
                log::info!("Updated review request #{}", request.number);
                Ok(SyncOutcome::Updated(request.number))
            }
        }
    }

    fn create_branch(
        &self,
        settings: &SyncSettings,
        handler: &mut ProviderHandler,
    ) -> Result<SyncOutcome> {
        if !handler.check_if_upgrades_available(false)? {
            log::info!("No upgrades available");
            return Ok(SyncOutcome::UpToDate);
        }

        let head = self
            .service
            .get_branch(&settings.head_branch)?
            .with_context(|| format!("Head branch '{}' does not exist", settings.head_branch))?;
        log::debug!("Creating '{}' at {} ({})", settings.target_branch, head.sha, head.name);
        self.service.create_ref(&settings.target_branch, &head.sha)?;
        self.vcs.fetch()?;
        self.vcs.checkout_new_branch(
            &settings.target_branch,
            &self.vcs.remote_ref(&settings.target_branch),
        )?;

        self.upgrade_and_push(&settings.target_branch, handler)?;
        self.open_request(settings, handler, false)
    }

    fn rebase_target(&self, settings: &SyncSettings) -> Result<()> {
        let target = &settings.target_branch;
        self.vcs.checkout_new_branch(target, &self.vcs.remote_ref(target))?;
        self.vcs.rebase_onto(&self.vcs.remote_ref(&settings.head_branch))?;
        self.vcs.push(target, true)
    }

    fn upgrade_and_push(&self, target: &str, handler: &mut ProviderHandler) -> Result<()> {
        if handler.upgrade_resources()? {
            self.vcs.push(target, false)?;
        }
        Ok(())
    }

    /// Open the request unless there is nothing to review.
    ///
    /// `branch_ahead` covers upgrades committed by an earlier run whose
    /// request was never opened or was closed unmerged.
    fn open_request(
        &self,
        settings: &SyncSettings,
        handler: &mut ProviderHandler,
        branch_ahead: bool,
    ) -> Result<SyncOutcome> {
        if handler.get_patched_resources().is_empty() && !branch_ahead {
            log::info!("No resource was patched, not opening a review request");
            return Ok(SyncOutcome::NothingPatched);
        }
        let body = self.body(settings, handler)?;
        let request = self.service.create_request(
            review::REQUEST_TITLE,
            &body,
            &settings.target_branch,
            &settings.head_branch,
        )?;
        log::info!("Opened review request #{} {}", request.number, request.url);
        Ok(SyncOutcome::Created(request))
    }

    fn body(&self, settings: &SyncSettings, handler: &mut ProviderHandler) -> Result<String> {
        let tables = handler.changed_resources_markdown();
        let notes = handler.get_release_notes(self.releases);
        let snapshot = review::snapshot(handler.get_resources(false)?, &settings.project_root);
        review::render(&tables, &notes, &snapshot)
    }
}
