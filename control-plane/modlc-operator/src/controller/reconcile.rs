use std::sync::Arc;

use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{ControllerContext, ReconcileErr};
use crate::client::{EventRecorder, Patcher, Reader};
use crate::config::OperatorConfig;
use crate::crd::{Fleet, Manifest, ModuleTemplate};
use crate::module::{SyncError, SyncRunner, build_modules, update_template_conditions};
use crate::release::get_templates;

/// Result of one pass over a fleet.
#[derive(Debug)]
pub struct PassOutcome {
    /// The fleet with its status as computed by this pass.
    pub fleet: Fleet,
    /// Whether the computed status differs from the persisted one.
    pub write_status: bool,
    /// Apply failures of the pass; status is still computed when set.
    pub sync_error: Option<SyncError>,
}

/// Resolves templates, applies manifests and computes the new fleet status.
/// A lookup failure aborts before anything is applied.
#[instrument(skip_all, fields(fleet = %fleet.name_any()))]
pub async fn run_pass<C>(
    client: &C,
    cfg: &OperatorConfig,
    fleet: &Fleet,
) -> Result<PassOutcome, ReconcileErr>
where
    C: Reader<ModuleTemplate>
        + Reader<Manifest>
        + Patcher<Manifest>
        + EventRecorder,
{
    let templates = get_templates(client, fleet).await?;
    let any_outdated = templates.values().any(|t| t.outdated);
    let mut modules = build_modules(fleet, templates);

    let runner =
        SyncRunner::new(client, &cfg.operator_name).with_limit(cfg.sync_limit());
    let sync_error = runner.sync(fleet, &mut modules).await.err();

    let mut next = fleet.clone();
    let modules_changed = runner.sync_module_status(&mut next, &modules).await;
    let conditions_changed = update_template_conditions(&mut next, &modules);

    let write_status = modules_changed || conditions_changed || any_outdated;
    debug!(modules_changed, conditions_changed, any_outdated, "pass finished");
    Ok(PassOutcome {
        fleet: next,
        write_status,
        sync_error,
    })
}

#[instrument(skip_all, fields(ns = %obj.namespace().unwrap_or_default(), name = %obj.name_any()))]
pub async fn reconcile(
    obj: Arc<Fleet>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    if obj.meta().deletion_timestamp.is_some() {
        debug!("fleet is being deleted; manifests are garbage collected");
        return Ok(Action::await_change());
    }

    let outcome = run_pass(&ctx.client, &ctx.cfg, &obj).await?;

    if outcome.write_status {
        let ns = obj.namespace().unwrap_or_default();
        let api: Api<Fleet> = Api::namespaced(ctx.client.inner().clone(), &ns);
        let patch = json!({ "status": outcome.fleet.status });
        api.patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(crate::client::ClientError::from)?;
        info!(state = ?outcome.fleet.status.as_ref().and_then(|s| s.state.clone()), "updated fleet status");
    }

    if let Some(e) = outcome.sync_error {
        return Err(e.into());
    }
    Ok(Action::requeue(ctx.cfg.requeue_after()))
}

pub fn error_policy(
    obj: Arc<Fleet>,
    error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(fleet = %obj.name_any(), error = %error, "reconcile failed, requeueing");
    Action::requeue(ctx.cfg.error_requeue_after())
}
