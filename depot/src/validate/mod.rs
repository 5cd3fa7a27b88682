//! Artifact validation pipeline.
//!
//! Runs after a successful transfer, in a fixed order where the first
//! failure wins and no further checks run:
//!
//! 1. **Integrity** - the staged file's digest matches the catalog digest.
//! 2. **Format** - the file parses as a package archive.
//! 3. **Metadata** - archive package identity and version match the catalog.
//! 4. **Signature** - the embedded certificate fingerprint matches the
//!    expected signer.
//! 5. **Permissions** - the archive's requested permissions are a subset of
//!    the declared set.
//!
//! Cryptographic checks run before structural parsing, and authenticity is
//! checked before trusting the archive's self-reported permission list.

mod archive;

pub use archive::{read_summary, ArchiveSummary, CERTIFICATE_NAME, MANIFEST_NAME};

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use std::ops::Add;

use sha2::digest::generic_array::ArrayLength;
use sha2::digest::OutputSizeUser;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use tracing::debug;

use crate::release::{HashAlgorithm, ReleaseDescriptor};

/// Buffer size for digest computation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Which validation stage rejected the artifact.
///
/// The `Display` text is the user-facing failure description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the downloaded file does not match its published digest")]
    Integrity,

    #[error("the downloaded file is not a valid package archive")]
    Format,

    #[error("the package identity does not match the catalog entry")]
    Metadata,

    #[error("the package signature does not match the expected signer")]
    Signature,

    #[error("the package requests permissions beyond the declared set")]
    Permissions,
}

/// Validates a staged artifact against its release descriptor.
///
/// Blocking (reads the file twice in the worst case); the service runs it
/// on the blocking thread pool.
pub fn validate(path: &Path, release: &ReleaseDescriptor) -> Result<(), ValidationError> {
    check_integrity(path, release)?;

    let summary = archive::read_summary(path).map_err(|err| {
        debug!(file = %path.display(), error = %err, "archive rejected");
        ValidationError::Format
    })?;

    if summary.package != release.package || summary.version_code != release.version_code {
        return Err(ValidationError::Metadata);
    }

    let expected_signer = release.signer.trim().to_ascii_lowercase();
    match summary.signer_fingerprint.as_deref() {
        Some(actual) if !expected_signer.is_empty() && actual == expected_signer => {}
        _ => return Err(ValidationError::Signature),
    }

    if !summary.permissions.is_subset(&release.permissions) {
        return Err(ValidationError::Permissions);
    }

    Ok(())
}

fn check_integrity(path: &Path, release: &ReleaseDescriptor) -> Result<(), ValidationError> {
    // An unrecognized algorithm is a digest-computation failure.
    let algorithm = release
        .hash_algorithm()
        .ok_or(ValidationError::Integrity)?;
    let actual = file_digest(path, algorithm).map_err(|_| ValidationError::Integrity)?;
    let expected = release.hash.trim().to_ascii_lowercase();

    if expected.is_empty() || actual != expected {
        debug!(file = %path.display(), %expected, %actual, "digest mismatch");
        return Err(ValidationError::Integrity);
    }
    Ok(())
}

/// Computes the lowercase hex digest of a file.
pub fn file_digest(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    match algorithm {
        HashAlgorithm::Sha256 => digest_file::<Sha256>(path),
        HashAlgorithm::Sha512 => digest_file::<Sha512>(path),
    }
}

fn digest_file<D: Digest>(path: &Path) -> io::Result<String>
where
    <D as OutputSizeUser>::OutputSize: Add,
    <<D as OutputSizeUser>::OutputSize as Add>::Output: ArrayLength<u8>,
{
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
