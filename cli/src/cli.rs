use std::path::PathBuf;

use dublin_boundaries::Vintage;

/// Dublin boundary linker CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "dublin-boundaries", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding cached inputs and outputs, defaults to "data"
    #[arg(long, global = true, default_value = "data", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Fail unless every cached input matches inputs.lock.json
    #[arg(long, global = true)]
    pub locked: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Fetch and cache every upstream input
    Fetch,

    /// Build Dublin postcode boundaries from the national routing-key areas
    Postcodes(PostcodesArgs),

    /// Extract the Dublin small areas of a census vintage (+ tableau file)
    SmallAreas(SmallAreasArgs),

    /// Link Dublin small areas to Dublin postcodes
    Link(LinkArgs),
}

#[derive(clap::Args, Debug)]
pub struct PostcodesArgs {
    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct SmallAreasArgs {
    /// Census vintage: 2011 or 2016
    #[arg(long, default_value = "2016")]
    pub vintage: Vintage,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// Census vintage: 2011 or 2016
    #[arg(long, default_value = "2016")]
    pub vintage: Vintage,

    /// Override table, defaults to "<data-dir>/overrides/small_areas_<vintage>.json"
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub overrides: Option<PathBuf>,

    /// Fail if any small area is left unlinked after overrides
    #[arg(long)]
    pub strict: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}
