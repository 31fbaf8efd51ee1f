use std::collections::BTreeMap;

use error_stack::Report;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;

use crate::k8s::annotations;
use crate::k8s::descriptor::DeploymentDescriptor;
use crate::k8s::error::KubernetesError;

/// Snapshot of a deployment as currently held by the API server.
#[derive(Debug, Clone, Default)]
pub struct DeploymentState {
    pub name: String,
    pub image: Option<String>,
    pub replicas: Option<i32>,
    pub selector_labels: BTreeMap<String, String>,
    /// Empty when the resource carries no annotations.
    pub annotations: BTreeMap<String, String>,
}

impl DeploymentState {
    pub(crate) fn from_deployment(deployment: Deployment) -> Self {
        let name = deployment.metadata.name.unwrap_or_default();
        let annotations = deployment.metadata.annotations.unwrap_or_default();

        let spec = deployment.spec;
        let replicas = spec.as_ref().and_then(|s| s.replicas);
        let selector_labels = spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default();
        let image = spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|pod| pod.containers.first())
            .and_then(|container| container.image.clone());

        Self {
            name,
            image,
            replicas,
            selector_labels,
            annotations,
        }
    }
}

/// Contract this component expects from the control plane, scoped to one
/// namespace per instance. The seam exists so the pipeline can run against a
/// mock collaborator in tests.
#[async_trait::async_trait]
pub trait DeploymentApi: Send + Sync {
    fn namespace(&self) -> &str;

    /// Submit a new deployment. Not idempotent: re-creation with the same
    /// name fails with [`KubernetesError::Conflict`].
    async fn create(
        &self,
        descriptor: &DeploymentDescriptor,
    ) -> Result<(), Report<KubernetesError>>;

    async fn get(&self, name: &str) -> Result<DeploymentState, Report<KubernetesError>>;

    /// Apply `merged` as a merge-patch touching only `metadata.annotations`.
    async fn patch_annotations(
        &self,
        name: &str,
        merged: &BTreeMap<String, String>,
    ) -> Result<(), Report<KubernetesError>>;

    /// Whether the deployment has been observed at its current generation
    /// with all requested replicas ready.
    async fn is_ready(&self, name: &str) -> Result<bool, Report<KubernetesError>>;
}

/// Production implementation backed by the apps/v1 Deployment API.
pub struct KubeDeploymentApi {
    api: Api<Deployment>,
    namespace: String,
}

impl KubeDeploymentApi {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl DeploymentApi for KubeDeploymentApi {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create(
        &self,
        descriptor: &DeploymentDescriptor,
    ) -> Result<(), Report<KubernetesError>> {
        descriptor.validate()?;

        self.api
            .create(&PostParams::default(), &descriptor.to_deployment())
            .await
            .map_err(|e| {
                Report::new(KubernetesError::from_api_error(
                    e,
                    &descriptor.name,
                    &self.namespace,
                ))
            })?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<DeploymentState, Report<KubernetesError>> {
        let deployment = self.api.get(name).await.map_err(|e| {
            Report::new(KubernetesError::from_api_error(e, name, &self.namespace))
        })?;
        Ok(DeploymentState::from_deployment(deployment))
    }

    async fn patch_annotations(
        &self,
        name: &str,
        merged: &BTreeMap<String, String>,
    ) -> Result<(), Report<KubernetesError>> {
        let patch = annotations::annotation_patch(merged);
        self.api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| {
                Report::new(KubernetesError::from_api_error(e, name, &self.namespace))
            })?;
        Ok(())
    }

    async fn is_ready(&self, name: &str) -> Result<bool, Report<KubernetesError>> {
        let deployment = self.api.get(name).await.map_err(|e| {
            Report::new(KubernetesError::from_api_error(e, name, &self.namespace))
        })?;
        Ok(deployment_ready(&deployment))
    }
}

/// Generation observed by the controller and all requested replicas ready.
/// A deployment the server never assigned a generation is not ready; without
/// the guard an unset generation would trivially match an unset observed
/// generation.
fn deployment_ready(deployment: &Deployment) -> bool {
    let generation = deployment.metadata.generation;
    let requested = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };

    generation.is_some()
        && status.observed_generation == generation
        && status.ready_replicas.unwrap_or(0) >= requested
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn deployment_with_status(
        generation: Option<i64>,
        observed_generation: Option<i64>,
        ready_replicas: Option<i32>,
    ) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("deploy-nginx".to_string()),
                generation,
                ..Default::default()
            },
            status: Some(DeploymentStatus {
                observed_generation,
                ready_replicas,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ready_when_generation_observed_and_replicas_up() {
        let deployment = deployment_with_status(Some(1), Some(1), Some(1));
        assert!(deployment_ready(&deployment));
    }

    #[test]
    fn not_ready_while_observed_generation_lags() {
        let deployment = deployment_with_status(Some(2), Some(1), Some(1));
        assert!(!deployment_ready(&deployment));
    }

    #[test]
    fn not_ready_when_generation_was_never_assigned() {
        // Both sides unset must not count as a match.
        let deployment = deployment_with_status(None, None, Some(1));
        assert!(!deployment_ready(&deployment));
    }

    #[test]
    fn not_ready_without_status() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                generation: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!deployment_ready(&deployment));
    }

    #[test]
    fn not_ready_until_replicas_catch_up() {
        let mut deployment = deployment_with_status(Some(1), Some(1), Some(1));
        deployment.spec = Some(k8s_openapi::api::apps::v1::DeploymentSpec {
            replicas: Some(3),
            ..Default::default()
        });
        assert!(!deployment_ready(&deployment));
    }

    #[test]
    fn state_from_deployment_defaults_missing_annotations_to_empty() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("deploy-nginx".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let state = DeploymentState::from_deployment(deployment);

        assert_eq!(state.name, "deploy-nginx");
        assert!(state.annotations.is_empty());
        assert_eq!(state.replicas, None);
    }

    #[test]
    fn state_from_deployment_extracts_spec_fields() {
        let labels: BTreeMap<String, String> =
            [("app".to_string(), "nginx".to_string())].into_iter().collect();
        let descriptor = DeploymentDescriptor {
            name: "deploy-nginx".to_string(),
            container_name: "nginx-sample".to_string(),
            image: "nginx".to_string(),
            replicas: 3,
            container_port: 80,
            selector_labels: labels.clone(),
            pod_labels: labels.clone(),
        };

        let state = DeploymentState::from_deployment(descriptor.to_deployment());

        assert_eq!(state.image.as_deref(), Some("nginx"));
        assert_eq!(state.replicas, Some(3));
        assert_eq!(state.selector_labels, labels);
    }
}
