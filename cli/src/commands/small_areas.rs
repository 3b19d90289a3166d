use anyhow::Result;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::SmallAreasArgs) -> Result<()> {
    let mut pipeline = super::pipeline(cli, args.force)?;
    let outputs = pipeline.write_dublin_small_areas(args.vintage)?;

    if cli.verbose > 0 {
        eprintln!("[small-areas] {} records -> {}", outputs.count, outputs.tableau.display());
    }
    Ok(())
}
