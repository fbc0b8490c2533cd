//! Thin REST clients for the platform's control-plane services.
//!
//! Each client binds the convergence engine to one service: it supplies the
//! status accessor and state-classification policies for its resource kinds
//! and carries the per-service poll budget from [`config::ProbeConfig`].
//! Request and response shapes carry only what the waits require; deeper
//! resource business logic is out of scope.
//!
//! Clients are constructed from an explicit [`ProbeConfig`] — there are no
//! module-level singletons.

pub mod compute;
pub mod config;
pub mod error;
pub mod http;
pub mod image;
pub mod naming;
pub mod network;
pub mod telemetry;
pub mod volume;

pub use compute::{ComputeClient, WaitOptions};
pub use config::ProbeConfig;
pub use error::ClientError;
pub use image::ImageClient;
pub use network::{NetworkClient, NetworkFixture};
pub use telemetry::TelemetryClient;
pub use volume::VolumeClient;
