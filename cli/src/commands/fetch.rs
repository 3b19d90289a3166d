use anyhow::Result;

pub fn run(cli: &crate::cli::Cli) -> Result<()> {
    let mut pipeline = super::pipeline(cli, false)?;

    if cli.verbose > 0 { eprintln!("[fetch] caching inputs under {}", cli.data_dir.display()); }
    pipeline.fetch_all()?;

    println!("All inputs cached in {}", cli.data_dir.display());
    Ok(())
}
