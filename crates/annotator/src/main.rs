mod annotator;
mod cli;
mod k8s;
mod logging;

use anyhow::Result;
use clap::Parser;

use crate::annotator::Annotator;
use crate::cli::Cli;
use crate::k8s::client::init_kube_client;
use crate::k8s::KubeDeploymentApi;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let client = init_kube_client(cli.kubeconfig.clone())
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let api = KubeDeploymentApi::new(client, &cli.namespace);
    let annotator = Annotator::new(api, cli.poll_settings(), cli.exists_ok);

    let report = annotator.run(&cli.descriptor(), &cli.new_annotations()).await;

    let failed = report.failed();
    if failed > 0 {
        anyhow::bail!("annotation pipeline finished with {failed} failed step(s)");
    }

    tracing::info!("annotation pipeline completed");
    Ok(())
}
