//! Catalog types describing a downloadable release.
//!
//! A [`ReleaseDescriptor`] is the immutable catalog entry for exactly one
//! downloadable artifact version, including everything needed to fetch and
//! verify it. A [`Task`] is one download request derived from a descriptor,
//! identified by package name for de-duplication and cancellation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Digest algorithm declared by the catalog for a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Resolves a catalog algorithm string.
    ///
    /// An empty string defaults to SHA-256. Unrecognized algorithms return
    /// `None`, which the validator reports as an integrity failure.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "sha256" | "sha-256" => Some(Self::Sha256),
            "sha512" | "sha-512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// Catalog metadata for one downloadable artifact version.
///
/// Supplied by the external catalog and immutable once created. The
/// descriptor carries both the transfer parameters (URL, authentication)
/// and the verification expectations (digest, signer fingerprint,
/// permission set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Package identity, e.g. `com.example.app`.
    pub package: String,

    /// Human-readable application name.
    pub display_name: String,

    /// Monotonic version code of this release.
    pub version_code: u64,

    /// Human-readable version string.
    #[serde(default)]
    pub version_name: String,

    /// Download URL for the artifact.
    pub url: String,

    /// Optional `Authorization` header value for the download request.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Expected artifact digest, lowercase hex.
    pub hash: String,

    /// Digest algorithm name; empty means SHA-256.
    #[serde(default)]
    pub hash_type: String,

    /// Expected SHA-256 fingerprint of the signing certificate, lowercase hex.
    pub signer: String,

    /// Permissions the release is allowed to request.
    #[serde(default)]
    pub permissions: BTreeSet<String>,

    /// File name used for both the staging and the final cache location.
    pub cache_file_name: String,
}

impl ReleaseDescriptor {
    /// Resolves the declared digest algorithm.
    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::parse(&self.hash_type)
    }
}

impl fmt::Display for ReleaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.package, self.version_code)
    }
}

/// One download request.
///
/// Created on enqueue and immutable afterwards. Tasks are keyed by
/// `package`: re-enqueueing the same package cancels and replaces any
/// queued or in-flight instance.
#[derive(Debug, Clone)]
pub struct Task {
    /// Package identity used for de-duplication and cancellation lookup.
    pub package: String,

    /// Human-readable name shown by observers.
    pub display_name: String,

    /// The release to fetch and verify.
    pub release: ReleaseDescriptor,
}

impl Task {
    /// Creates a new task for the given release.
    pub fn new(
        package: impl Into<String>,
        display_name: impl Into<String>,
        release: ReleaseDescriptor,
    ) -> Self {
        Self {
            package: package.into(),
            display_name: display_name.into(),
            release,
        }
    }

    /// Stable key for consumers that maintain one notification per download.
    pub fn notification_tag(&self) -> String {
        format!("download-{}", self.package)
    }
}
