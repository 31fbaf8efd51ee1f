use std::collections::BTreeMap;

use error_stack::Report;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::ContainerPort;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::k8s::error::KubernetesError;

/// Declarative description of one deployment workload. Built once, locally;
/// after submission the API server owns the durable representation.
#[derive(Debug, Clone)]
pub struct DeploymentDescriptor {
    /// Deployment name, unique within the namespace.
    pub name: String,
    pub container_name: String,
    pub image: String,
    pub replicas: i32,
    pub container_port: i32,
    /// Pods the deployment selects. Must be a subset of `pod_labels`.
    pub selector_labels: BTreeMap<String, String>,
    pub pod_labels: BTreeMap<String, String>,
}

impl DeploymentDescriptor {
    /// Check the invariants the API server would reject (or worse, silently
    /// produce a non-matching rollout for) before anything is submitted.
    pub fn validate(&self) -> Result<(), Report<KubernetesError>> {
        if self.replicas < 1 {
            return Err(Report::new(KubernetesError::InvalidDescriptor {
                message: format!("replicas must be positive, got {}", self.replicas),
            }));
        }

        if !(1..=65535).contains(&self.container_port) {
            return Err(Report::new(KubernetesError::InvalidDescriptor {
                message: format!(
                    "container port must be in 1..=65535, got {}",
                    self.container_port
                ),
            }));
        }

        if self.selector_labels.is_empty() {
            return Err(Report::new(KubernetesError::InvalidDescriptor {
                message: "selector labels must not be empty".to_string(),
            }));
        }

        // A selector that does not match the pod template never adopts the
        // pods it creates.
        for (key, value) in &self.selector_labels {
            if self.pod_labels.get(key) != Some(value) {
                return Err(Report::new(KubernetesError::InvalidDescriptor {
                    message: format!(
                        "selector label {key}={value} is not present in the pod template labels"
                    ),
                }));
            }
        }

        Ok(())
    }

    /// Render the descriptor into an apps/v1 Deployment body.
    pub fn to_deployment(&self) -> Deployment {
        let container = Container {
            name: self.container_name.clone(),
            image: Some(self.image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            ports: Some(vec![ContainerPort {
                container_port: self.container_port,
                ..Default::default()
            }]),
            ..Default::default()
        };

        let template = PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(self.pod_labels.clone()),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![container],
                ..Default::default()
            }),
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.replicas),
                selector: LabelSelector {
                    match_labels: Some(self.selector_labels.clone()),
                    ..Default::default()
                },
                template,
                ..Default::default()
            }),
            status: None,
        }
    }
}
