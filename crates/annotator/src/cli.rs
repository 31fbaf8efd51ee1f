use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::annotator::PollSettings;
use crate::k8s::DeploymentDescriptor;

/// Annotations applied when none are given on the command line.
const DEFAULT_ANNOTATIONS: [(&str, &str); 2] = [
    ("deployment.kubernetes.io/str", "nginx"),
    ("deployment.kubernetes.io/int", "5"),
];

const DEFAULT_LABELS: [(&str, &str); 1] = [("app", "nginx")];

#[derive(Parser, Debug)]
#[command(about = "Create a deployment and merge-patch its annotations", version)]
pub struct Cli {
    /// Namespace the deployment lives in
    #[arg(long, env = "ANNOTATOR_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Deployment name
    #[arg(long, default_value = "deploy-nginx")]
    pub name: String,

    /// Container image
    #[arg(long, default_value = "nginx")]
    pub image: String,

    /// Container name inside the pod template
    #[arg(long, default_value = "nginx-sample")]
    pub container_name: String,

    #[arg(long, default_value_t = 1)]
    pub replicas: i32,

    /// Container port exposed by the workload
    #[arg(long, default_value_t = 80)]
    pub port: i32,

    /// Pod template label, also used as the selector (key=value, repeatable)
    #[arg(long = "label", value_parser = parse_key_value)]
    pub labels: Vec<(String, String)>,

    /// Annotation to merge onto the deployment (key=value, repeatable)
    #[arg(long = "annotation", value_parser = parse_key_value)]
    pub annotations: Vec<(String, String)>,

    /// Path to an explicit kubeconfig file; defaults to in-cluster config or
    /// ~/.kube/config
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Treat an already-existing deployment as success instead of a conflict
    #[arg(long)]
    pub exists_ok: bool,

    /// Readiness poll attempts after each mutating call
    #[arg(long, default_value_t = 10)]
    pub ready_attempts: u32,

    #[arg(long, default_value_t = 200)]
    pub ready_initial_backoff_ms: u64,

    #[arg(long, default_value_t = 2000)]
    pub ready_max_backoff_ms: u64,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn to_map(pairs: &[(String, String)], defaults: &[(&str, &str)]) -> BTreeMap<String, String> {
    if pairs.is_empty() {
        defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        pairs.iter().cloned().collect()
    }
}

impl Cli {
    pub fn descriptor(&self) -> DeploymentDescriptor {
        let labels = to_map(&self.labels, &DEFAULT_LABELS);
        DeploymentDescriptor {
            name: self.name.clone(),
            container_name: self.container_name.clone(),
            image: self.image.clone(),
            replicas: self.replicas,
            container_port: self.port,
            selector_labels: labels.clone(),
            pod_labels: labels,
        }
    }

    pub fn new_annotations(&self) -> BTreeMap<String, String> {
        to_map(&self.annotations, &DEFAULT_ANNOTATIONS)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            attempts: self.ready_attempts,
            initial_backoff: Duration::from_millis(self.ready_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.ready_max_backoff_ms),
        }
    }
}
