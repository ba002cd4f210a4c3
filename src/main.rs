use anyhow::{anyhow, bail, Error};
use clap::Parser;
use ftail::Ftail;
use log::info;

use ancsub::annotation::Annotator;
use ancsub::io::write_outputs;

mod cli;
use crate::cli::{Cli, Config};

type Result<T> = std::result::Result<T, Error>;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            bail!("Unable to parse command line arguments: \n {}", error)
        }
    };
    let cfg = Config::from_cli(cli)?;
    Ftail::new()
        .console(cfg.log_level)
        .init()
        .map_err(|e| anyhow!("Unable to set up logging: {:?}", e))?;

    info!("Substitution mapping started.");
    info!("{}", cfg);

    let annotated = Annotator::with_attrs(cfg.report_file, cfg.names_file)
        .dialect(cfg.dialect)
        .show_tip_substitutions(cfg.show_tip_substitutions)
        .build()?;

    let written = write_outputs(
        &annotated,
        &cfg.out_tree,
        &cfg.out_table,
        cfg.delimiter,
        cfg.overwrite,
    )?;

    info!(
        "Wrote {} substitutions to {} and {}.",
        written,
        cfg.out_tree.display(),
        cfg.out_table.display()
    );
    Ok(())
}
