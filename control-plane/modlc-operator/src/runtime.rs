use kube::Client;
use tokio::task::JoinHandle;

use crate::{client::KubeClient, config::OperatorConfig, controller::run_controller};

/// Spawn the fleet controller loop.
pub fn spawn_controller(
    client: KubeClient,
    cfg: OperatorConfig,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controller(client, cfg).await })
}

/// Start the controller and wait until it finishes.
pub async fn run_all(client: Client, cfg: OperatorConfig) -> anyhow::Result<()> {
    let client = KubeClient::new(client, &cfg.operator_name);
    let controller = spawn_controller(client, cfg);
    controller.await??;
    Ok(())
}
