use futures_util::StreamExt;
use kube::api::Api;
use kube::core::DynamicObject;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::LastSeenCache;
use crate::client::{ObjectKey, Reader};
use crate::crd::{Fleet, ModuleTemplate};
use crate::watch::{ComponentChangeHandler, ReconcileRequest, TemplateChangeHandler};

/// Updates the last-seen cache and, for updates of known components, asks
/// the change filter whether the owner needs a reconcile. A re-list replaces
/// the cache contents with what it reports.
pub async fn handle_component_event<R>(
    event: Event<DynamicObject>,
    cache: &LastSeenCache,
    handler: &ComponentChangeHandler<R>,
) -> Option<ReconcileRequest>
where
    R: Reader<Fleet>,
{
    match event {
        Event::Apply(obj) => {
            let key = ObjectKey::from_resource(&obj).ok()?;
            let old = cache.upsert(key, obj.clone()).await?;
            handler.decide(&old, &obj).await
        }
        Event::InitApply(obj) => {
            if let Ok(key) = ObjectKey::from_resource(&obj) {
                cache.upsert(key, obj).await;
            }
            None
        }
        Event::Delete(obj) => {
            if let Ok(key) = ObjectKey::from_resource(&obj) {
                cache.remove(&key).await;
            }
            None
        }
        Event::Init => {
            cache.begin_relist().await;
            None
        }
        Event::InitDone => {
            let dropped = cache.finish_relist().await;
            if dropped > 0 {
                debug!(dropped, "forgot components deleted while not watching");
            }
            None
        }
    }
}

/// Fleets affected by a created, updated or deleted template. The initial
/// listing is skipped since every fleet is reconciled on start anyway.
pub async fn handle_template_event<R>(
    event: Event<ModuleTemplate>,
    handler: &TemplateChangeHandler<R>,
) -> Vec<ReconcileRequest>
where
    R: Reader<Fleet>,
{
    match event {
        Event::Apply(template) | Event::Delete(template) => {
            handler.map_to_requests(&template).await
        }
        Event::Init | Event::InitApply(_) | Event::InitDone => Vec::new(),
    }
}

pub(super) async fn forward_component_changes<R>(
    api: Api<DynamicObject>,
    handler: ComponentChangeHandler<R>,
    cache: LastSeenCache,
    tx: mpsc::Sender<ReconcileRequest>,
) where
    R: Reader<Fleet>,
{
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                let Some(req) = handle_component_event(event, &cache, &handler).await
                else {
                    continue;
                };
                debug!(fleet = %req, "component state change");
                if tx.send(req).await.is_err() {
                    debug!("request channel closed, stopping component watch");
                    return;
                }
            }
            Err(e) => warn!(error = %e, "component watch error"),
        }
    }
}

pub(super) async fn forward_template_changes<R>(
    api: Api<ModuleTemplate>,
    handler: TemplateChangeHandler<R>,
    tx: mpsc::Sender<ReconcileRequest>,
) where
    R: Reader<Fleet>,
{
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                for req in handle_template_event(event, &handler).await {
                    debug!(fleet = %req, "template change");
                    if tx.send(req).await.is_err() {
                        debug!("request channel closed, stopping template watch");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "template watch error"),
        }
    }
}
