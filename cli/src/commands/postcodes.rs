use anyhow::Result;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::PostcodesArgs) -> Result<()> {
    let mut pipeline = super::pipeline(cli, args.force)?;
    pipeline.write_dublin_postcodes()?;
    Ok(())
}
