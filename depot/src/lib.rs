//! Depot - package download and verification pipeline
//!
//! This library provides the download core of a package store client: given
//! a catalog entry describing a downloadable release (URL, expected digest,
//! signer fingerprint and permission set), it fetches the artifact over
//! HTTP, runs it through a multi-stage validation pipeline, and hands the
//! verified file to an installer, broadcasting every lifecycle transition to
//! any number of subscribers.
//!
//! # Architecture
//!
//! ```text
//! enqueue ──► ┌───────────┐     ┌─────────┐     ┌───────────┐
//!             │ TaskQueue │ ──► │ Fetcher │ ──► │ Validator │
//!             └───────────┘     └─────────┘     └─────┬─────┘
//!                   ▲                 │               │
//!                   │            progress        promote / discard
//!             cancel/replace          ▼               ▼
//!             ┌──────────────────────────────────────────────┐
//!             │          StateBroadcaster (fanout)           │
//!             └──────────────────────────────────────────────┘
//! ```
//!
//! At most one transfer is in flight at any instant; queued requests wait in
//! FIFO order and are unique per package (a newer enqueue replaces an older
//! one). See [`service::DownloadService`] for the public entry point.

pub mod cache;
pub mod config;
pub mod events;
pub mod fetch;
pub mod release;
pub mod service;
pub mod state;
pub mod validate;

pub use cache::ArtifactCache;
pub use config::ServiceConfig;
pub use events::StateBroadcaster;
pub use fetch::{FetchRequest, Fetcher, HttpFetcher, TransportResult};
pub use release::{HashAlgorithm, ReleaseDescriptor, Task};
pub use service::{DownloadService, InstallHandoff, NoopInstaller, ServiceError, ServiceStatus};
pub use state::{ErrorKind, TaskEvent, TaskState};
pub use validate::{validate, ValidationError};
