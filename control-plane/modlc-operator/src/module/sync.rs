use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use super::{Module, Modules, to_preferred_version};
use crate::client::{ApplyOptions, ClientError, EventRecorder, Patcher, Reader};
use crate::crd::{Fleet, Manifest};
use crate::events::{EventKind, REASON_MODULE_APPLY_FAILED, REASON_MODULES_APPLIED};

#[derive(Debug, thiserror::Error)]
#[error("could not update module {module}: {source}")]
pub struct ModuleApplyError {
    pub module: String,
    #[source]
    pub source: ClientError,
}

/// Every module failure of one batch.
#[derive(Debug)]
pub struct MultiError(pub Vec<ModuleApplyError>);

impl MultiError {
    pub fn modules(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.module.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} module(s) failed", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("server-side apply of modules failed after {elapsed:?}: {errors}")]
    ServerSideApply {
        elapsed: Duration,
        #[source]
        errors: MultiError,
    },
}

impl SyncError {
    pub fn failed_modules(&self) -> Vec<&str> {
        match self {
            SyncError::ServerSideApply { errors, .. } => errors.modules(),
        }
    }
}

/// Runs every task to completion and returns one output per task, in
/// completion order. `limit` caps in-flight tasks; `None` or 0 runs all of
/// them at once.
pub async fn run_concurrently<I, F, T>(tasks: I, limit: Option<usize>) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    let tasks: Vec<F> = tasks.into_iter().collect();
    let width = limit
        .filter(|l| *l > 0)
        .unwrap_or(tasks.len())
        .max(1);
    stream::iter(tasks).buffer_unordered(width).collect().await
}

/// Applies the manifests of a pass and folds the outcome into fleet status.
pub struct SyncRunner<'a, C> {
    client: &'a C,
    operator_name: &'a str,
    limit: Option<usize>,
}

impl<'a, C> SyncRunner<'a, C>
where
    C: Reader<Manifest> + Patcher<Manifest> + EventRecorder,
{
    pub fn new(client: &'a C, operator_name: &'a str) -> Self {
        Self {
            client,
            operator_name,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Applies every module concurrently. Each module's manifest is replaced
    /// by the persisted object on success; failures are collected and
    /// returned together once all applies finished.
    #[instrument(skip_all, fields(fleet = %fleet.name_any(), modules = modules.len()))]
    pub async fn sync(
        &self,
        fleet: &Fleet,
        modules: &mut Modules,
    ) -> Result<(), SyncError> {
        let started = Instant::now();
        let total = modules.len();
        let field_owner = fleet.managed_by().unwrap_or(self.operator_name);
        let opts = ApplyOptions::force(field_owner);

        let results = run_concurrently(
            modules
                .iter_mut()
                .map(|module| self.update_module(fleet, module, &opts)),
            self.limit,
        )
        .await;
        let errors: Vec<ModuleApplyError> =
            results.into_iter().filter_map(Result::err).collect();
        let elapsed = started.elapsed();
        let regarding = fleet.object_ref(&());

        if errors.is_empty() {
            debug!(?elapsed, total, "server-side apply of modules finished");
            if total > 0 {
                self.client
                    .record(
                        &regarding,
                        EventKind::Normal,
                        REASON_MODULES_APPLIED,
                        format!("applied {total} module(s)"),
                    )
                    .await;
            }
            return Ok(());
        }

        warn!(?elapsed, total, failed = errors.len(), "server-side apply of modules failed");
        for e in &errors {
            self.client
                .record(
                    &regarding,
                    EventKind::Warning,
                    REASON_MODULE_APPLY_FAILED,
                    e.to_string(),
                )
                .await;
        }
        Err(SyncError::ServerSideApply {
            elapsed,
            errors: MultiError(errors),
        })
    }

    async fn update_module(
        &self,
        fleet: &Fleet,
        module: &mut Module,
        opts: &ApplyOptions,
    ) -> Result<(), ModuleApplyError> {
        match self.apply_manifest(fleet, module, opts).await {
            Ok(manifest) => {
                debug!(module = %module.name, manifest = %manifest.name_any(), "applied manifest");
                module.manifest = manifest;
                Ok(())
            }
            Err(source) => Err(ModuleApplyError {
                module: module.name.clone(),
                source,
            }),
        }
    }

    async fn apply_manifest(
        &self,
        fleet: &Fleet,
        module: &mut Module,
        opts: &ApplyOptions,
    ) -> Result<Manifest, ClientError> {
        module.apply_labels_and_annotations(fleet, self.operator_name)?;
        let obj = to_preferred_version(&module.manifest)?;
        Patcher::<Manifest>::apply(self.client, &obj, opts).await
    }

    /// Upserts one status entry per module and prunes entries of modules no
    /// longer declared once their manifest is gone. Returns whether the
    /// status changed in a way that needs persisting.
    #[instrument(skip_all, fields(fleet = %fleet.name_any()))]
    pub async fn sync_module_status(
        &self,
        fleet: &mut Fleet,
        modules: &Modules,
    ) -> bool {
        let status = fleet.status.get_or_insert_with(Default::default);
        let mut update_required = false;

        for module in modules {
            let latest = module.status();
            match status.modules.iter_mut().find(|s| s.name == latest.name) {
                Some(existing) => {
                    if existing.state != latest.state {
                        debug!(module = %latest.name, from = %existing.state, to = %latest.state, "module state changed");
                        update_required = true;
                    }
                    *existing = latest;
                }
                None => {
                    debug!(module = %latest.name, "tracking new module");
                    status.modules.push(latest);
                    update_required = true;
                }
            }
        }

        let declared: HashSet<&str> =
            modules.iter().map(|m| m.name.as_str()).collect();
        let mut survivors = Vec::with_capacity(status.modules.len());
        for entry in std::mem::take(&mut status.modules) {
            if declared.contains(entry.name.as_str()) {
                survivors.push(entry);
                continue;
            }
            let key = entry.manifest_key();
            match Reader::<Manifest>::get(self.client, &key).await {
                Err(e) if e.is_not_found() => {
                    info!(module = %entry.name, manifest = %key, "manifest gone, removing module from status");
                    update_required = true;
                }
                Err(e) => {
                    warn!(module = %entry.name, manifest = %key, error = %e, "could not check manifest of removed module");
                    survivors.push(entry);
                }
                Ok(_) => {
                    debug!(module = %entry.name, manifest = %key, "waiting for manifest deletion");
                    survivors.push(entry);
                }
            }
        }
        status.modules = survivors;

        update_required
    }
}
