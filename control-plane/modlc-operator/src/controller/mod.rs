mod cache;
mod reconcile;
mod watchers;

pub use cache::LastSeenCache;
pub use reconcile::{PassOutcome, error_policy, reconcile, run_pass};
pub use watchers::{handle_component_event, handle_template_event};

use std::sync::Arc;

use futures_util::StreamExt;
use kube::api::{Api, ApiResource};
use kube::core::DynamicObject;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{Controller, watcher::Config};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::client::{ClientError, KubeClient};
use crate::config::OperatorConfig;
use crate::crd::{Fleet, Manifest, ModuleTemplate};
use crate::module::SyncError;
use crate::release::LookupError;
use crate::watch::{ComponentChangeHandler, TemplateChangeHandler};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("template lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("status update failed: {0}")]
    Status(#[from] ClientError),
}

#[derive(Clone)]
pub struct ControllerContext {
    pub client: KubeClient,
    pub cfg: OperatorConfig,
}

fn scoped<K>(client: &kube::Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Runs the fleet controller until its stream ends.
///
/// Besides fleet changes, reconciles are triggered by state transitions of
/// owned manifests and by template changes, both delivered through one
/// request channel.
pub async fn run_controller(
    client: KubeClient,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let kube = client.inner().clone();
    let namespace = cfg.watch_namespace();
    let fleets: Api<Fleet> = scoped(&kube, namespace);
    let templates: Api<ModuleTemplate> = scoped(&kube, namespace);
    let manifest_resource = ApiResource::erase::<Manifest>(&());
    let manifests: Api<DynamicObject> = match namespace {
        Some(ns) => Api::namespaced_with(kube.clone(), ns, &manifest_resource),
        None => Api::all_with(kube.clone(), &manifest_resource),
    };

    let (tx, rx) = mpsc::channel(cfg.request_buffer());
    tokio::spawn(watchers::forward_component_changes(
        manifests,
        ComponentChangeHandler::new(client.clone()),
        LastSeenCache::new(),
        tx.clone(),
    ));
    tokio::spawn(watchers::forward_template_changes(
        templates,
        TemplateChangeHandler::new(client.clone(), cfg.operator_name.clone()),
        tx,
    ));

    info!(namespace = namespace.unwrap_or("*"), operator = %cfg.operator_name, "starting fleet controller");
    let ctx = Arc::new(ControllerContext { client, cfg });
    Controller::new(fleets, Config::default())
        .reconcile_on(ReceiverStream::new(rx).map(ObjectRef::<Fleet>::from))
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(fleet = %obj_ref, ?action, "reconciled")
                }
                Err(e) => error!(error = %e, "reconcile error"),
            }
        })
        .await;

    Ok(())
}
