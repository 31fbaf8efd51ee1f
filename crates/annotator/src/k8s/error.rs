use core::error::Error;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    /// A deployment with this name already exists, or a concurrent
    /// modification invalidated a patch.
    #[display("Deployment conflict: {name} in namespace {namespace}")]
    Conflict { name: String, namespace: String },
    /// The descriptor failed local validation or was rejected by the API
    /// server as malformed.
    #[display("Invalid deployment descriptor: {message}")]
    InvalidDescriptor { message: String },
    #[display("Deployment not found: {name} in namespace {namespace}")]
    NotFound { name: String, namespace: String },
    /// Connectivity, auth, or serialization failure talking to the API server.
    #[display("Kubernetes API transport failure: {message}")]
    Transport { message: String },
    #[display("Deployment did not become ready: {name} in namespace {namespace}")]
    ReadyTimeout { name: String, namespace: String },
}

impl Error for KubernetesError {}

impl KubernetesError {
    /// Map a `kube::Error` for an operation on one named deployment into the
    /// error taxonomy. Status codes follow the API server conventions: 404
    /// missing, 409 already-exists/conflict, 400 and 422 malformed body.
    pub(crate) fn from_api_error(err: kube::Error, name: &str, namespace: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => Self::NotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            kube::Error::Api(api_err) if api_err.code == 400 || api_err.code == 422 => {
                Self::InvalidDescriptor {
                    message: api_err.message,
                }
            }
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
