//! Package archive parsing.
//!
//! A package artifact is a ZIP archive carrying a `manifest.json` with the
//! package identity, version and requested permissions, plus the signing
//! certificate at `META-INF/signer.der`. The signer identity is the SHA-256
//! fingerprint of the raw certificate bytes.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zip::ZipArchive;

/// Manifest entry name inside the archive.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Signing certificate entry name inside the archive.
pub const CERTIFICATE_NAME: &str = "META-INF/signer.der";

/// The archive's embedded manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    package: String,
    version_code: u64,
    #[serde(default)]
    version_name: String,
    #[serde(default)]
    permissions: BTreeSet<String>,
}

/// Metadata extracted from a package archive.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Package identity declared by the archive.
    pub package: String,

    /// Version code declared by the archive.
    pub version_code: u64,

    /// Human-readable version string.
    pub version_name: String,

    /// Permissions the archive requests.
    pub permissions: BTreeSet<String>,

    /// SHA-256 fingerprint of the embedded certificate, lowercase hex.
    /// `None` when the archive carries no certificate.
    pub signer_fingerprint: Option<String>,
}

/// Reads the manifest and signer fingerprint from a package archive.
///
/// Fails with `InvalidData` when the file is not a readable ZIP archive or
/// the manifest is missing or malformed. An absent certificate is not a
/// parse error; it surfaces as `signer_fingerprint: None` and is rejected
/// by the signature stage.
pub fn read_summary(path: &Path) -> io::Result<ArchiveSummary> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(invalid_data)?;

    let manifest: Manifest = {
        let entry = archive.by_name(MANIFEST_NAME).map_err(invalid_data)?;
        serde_json::from_reader(entry).map_err(invalid_data)?
    };

    let signer_fingerprint = match archive.by_name(CERTIFICATE_NAME) {
        Ok(mut entry) => {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            Some(format!("{:x}", Sha256::digest(&bytes)))
        }
        Err(_) => None,
    };

    Ok(ArchiveSummary {
        package: manifest.package,
        version_code: manifest.version_code,
        version_name: manifest.version_name,
        permissions: manifest.permissions,
        signer_fingerprint,
    })
}

fn invalid_data<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}
