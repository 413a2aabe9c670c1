use anyhow::Result;

use crate::Context;
use crate::cli::ReportArgs;
use crate::ui;

pub fn run(ctx: &Context, args: ReportArgs) -> Result<()> {
    let root = super::resolve_root(&args.project.project_root)?;
    let registry = super::registry(ctx, None)?;
    let mut handler = super::handler(&root, &registry)?;

    handler.print_resource_table(args.only_upgradable)?;

    if args.project.dump_json_statistics {
        let path = handler.dump_statistics(false)?;
        ui::dim(&format!("Statistics written to {}", path.display()));
    }
    Ok(())
}
