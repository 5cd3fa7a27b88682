//! CLI subcommands.

pub mod fetch;
pub mod verify;

use std::error::Error;
use std::fs::File;
use std::path::Path;

use depot::ReleaseDescriptor;

/// Reads a JSON catalog: a list of release descriptors.
pub fn load_catalog(path: &Path) -> Result<Vec<ReleaseDescriptor>, Box<dyn Error>> {
    let file = File::open(path)
        .map_err(|err| format!("cannot open catalog {}: {}", path.display(), err))?;
    let catalog: Vec<ReleaseDescriptor> = serde_json::from_reader(file)
        .map_err(|err| format!("cannot parse catalog {}: {}", path.display(), err))?;
    Ok(catalog)
}

/// Finds the catalog entry for a package.
pub fn find_release<'a>(
    catalog: &'a [ReleaseDescriptor],
    package: &str,
) -> Result<&'a ReleaseDescriptor, Box<dyn Error>> {
    catalog
        .iter()
        .find(|release| release.package == package)
        .ok_or_else(|| format!("package {} is not in the catalog", package).into())
}
