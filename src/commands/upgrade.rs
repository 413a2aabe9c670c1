use anyhow::{Result, bail};
use std::rc::Rc;

use crate::Context;
use crate::cli::UpgradeArgs;
use crate::ui;
use crate::vcs::{Git, VersionControl};

pub fn run(ctx: &Context, args: UpgradeArgs) -> Result<()> {
    let root = super::resolve_root(&args.project.project_root)?;
    let registry = super::registry(ctx, None)?;
    let mut handler = super::handler(&root, &registry)?;

    if args.commit {
        let git = Rc::new(Git::new(&root));
        if git.is_dirty()? {
            bail!("Working tree has uncommitted changes, commit or stash them first");
        }
        handler = handler.with_vcs(git);
    }

    if !handler.check_if_upgrades_available(false)? {
        ui::success("All resources are up to date");
        return Ok(());
    }

    ui::header("Upgradable Resources");
    for table in handler.resource_tables(true)? {
        if !table.is_empty() {
            println!("{}", table.render());
        }
    }

    if !args.confirm && !confirm_proceed()? {
        ui::warn("Aborted");
        return Ok(());
    }

    handler.upgrade_resources()?;
    let stats = handler.statistics(false)?;
    println!("{}", stats.table().render());

    if args.project.dump_json_statistics {
        let path = stats.write(handler.working_dir())?;
        ui::dim(&format!("Statistics written to {}", path.display()));
    }

    if stats.errors > 0 {
        ui::warn(&format!("{} resource(s) could not be upgraded", stats.errors));
    } else {
        ui::success(&format!("Upgraded {} resource(s)", stats.resources_patched));
    }
    Ok(())
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Upgrade these resources?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}
