pub mod fetch;
pub mod link;
pub mod postcodes;
pub mod small_areas;

use anyhow::Result;
use dublin_boundaries::Pipeline;

/// Open the pipeline with the global flags applied.
pub(crate) fn pipeline(cli: &crate::cli::Cli, force: bool) -> Result<Pipeline> {
    Ok(Pipeline::new(&cli.data_dir, cli.verbose)?.locked(cli.locked).force(force))
}
