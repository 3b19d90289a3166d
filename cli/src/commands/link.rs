use anyhow::Result;
use dublin_boundaries::LinkSmallAreas;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::LinkArgs) -> Result<()> {
    let mut pipeline = super::pipeline(cli, args.force)?;

    let options = LinkSmallAreas {
        vintage: args.vintage,
        overrides: args.overrides.clone(),
        strict: args.strict,
    };
    let result = pipeline.link_small_areas(&options)?;

    if !result.is_complete() {
        println!("{} small areas unresolved; rerun with --strict to fail on this", result.unresolved().len());
    }
    Ok(())
}
