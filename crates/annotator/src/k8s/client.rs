use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::k8s::error::KubernetesError;

/// Build the client the annotation pipeline talks through. An explicit
/// kubeconfig path wins; otherwise kube's own discovery applies (in-cluster
/// service account, then `~/.kube/config`). Every failure here is a
/// [`KubernetesError::Transport`]: nothing was submitted yet.
pub async fn init_kube_client(
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<KubernetesError>> {
    match kubeconfig {
        Some(path) => client_from_kubeconfig(&path).await,
        None => Client::try_default()
            .await
            .change_context(transport("kubernetes client bootstrap failed"))
            .attach_printable("no --kubeconfig given, used default discovery"),
    }
}

async fn client_from_kubeconfig(path: &Path) -> Result<Client, Report<KubernetesError>> {
    let kubeconfig = Kubeconfig::read_from(path)
        .change_context(transport("kubeconfig file is unreadable"))
        .attach_printable_lazy(|| format!("path: {}", path.display()))?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(transport("kubeconfig did not yield a usable client config"))
        .attach_printable_lazy(|| format!("path: {}", path.display()))?;

    Client::try_from(config).change_context(transport("client construction from kubeconfig failed"))
}

fn transport(message: &str) -> KubernetesError {
    KubernetesError::Transport {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn missing_kubeconfig_file_is_a_transport_error() {
        let err = init_kube_client(Some(PathBuf::from("/nonexistent/kubeconfig")))
            .await
            .map(|_client| ())
            .expect_err("bootstrap must fail for a missing kubeconfig");

        assert!(matches!(
            err.current_context(),
            KubernetesError::Transport { .. }
        ));
    }
}
