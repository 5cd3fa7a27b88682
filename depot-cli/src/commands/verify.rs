//! `depot verify`: run the validation pipeline on a local artifact.

use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use super::{find_release, load_catalog};

#[derive(Args)]
pub struct VerifyArgs {
    /// JSON catalog of downloadable releases.
    pub catalog: PathBuf,

    /// Package whose catalog entry the artifact is checked against.
    pub package: String,

    /// Path to the artifact to validate.
    pub artifact: PathBuf,
}

pub fn run(args: VerifyArgs) -> Result<(), Box<dyn Error>> {
    let catalog = load_catalog(&args.catalog)?;
    let release = find_release(&catalog, &args.package)?;

    match depot::validate(&args.artifact, release) {
        Ok(()) => {
            println!("{}: artifact verified", release.package);
            Ok(())
        }
        Err(err) => Err(format!("{}: {}", release.package, err).into()),
    }
}
