//! Kubernetes integration module.
//!
//! Wraps the apps/v1 Deployment API behind a small namespace-scoped seam:
//! - [`DeploymentDescriptor`]: local declarative description of the workload
//! - [`DeploymentApi`]: create / read / annotate contract against the control plane
//! - [`KubernetesError`]: error taxonomy shared by all operations

pub mod annotations;
pub mod api;
pub mod client;
pub mod descriptor;
pub mod error;

pub use api::DeploymentApi;
pub use api::DeploymentState;
pub use api::KubeDeploymentApi;
pub use descriptor::DeploymentDescriptor;
pub use error::KubernetesError;
