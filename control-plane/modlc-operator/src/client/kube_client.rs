use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::core::DynamicObject;
use kube::runtime::events::{Event, Recorder, Reporter};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::{
    ApplyOptions, ClientError, ClientResult, EventRecorder, FieldIndexed,
    ListFilter, ObjectKey, Patcher, Reader,
};
use crate::events::EventKind;

/// Capability implementation backed by the API server.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    recorder: Recorder,
}

impl KubeClient {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl<K> Reader<K> for KubeClient
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + FieldIndexed
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn list(&self, filter: &ListFilter) -> ClientResult<Vec<K>> {
        let api: Api<K> = match &filter.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut lp = ListParams::default();
        if let Some(selector) = filter.label_selector() {
            lp = lp.labels(&selector);
        }
        let list = api.list(&lp).await?;
        let total = list.items.len();
        let items: Vec<K> = list
            .items
            .into_iter()
            .filter(|obj| filter.matches_field(obj))
            .collect();
        trace!(kind = %K::kind(&()), total, matched = items.len(), "list");
        Ok(items)
    }

    async fn get(&self, key: &ObjectKey) -> ClientResult<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get(&key.name).await?)
    }
}

#[async_trait]
impl<K> Patcher<K> for KubeClient
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn apply(
        &self,
        obj: &DynamicObject,
        opts: &ApplyOptions,
    ) -> ClientResult<K> {
        let ns = obj
            .metadata
            .namespace
            .as_deref()
            .ok_or(ClientError::MissingMetadata("metadata.namespace"))?;
        let name = obj
            .metadata
            .name
            .as_deref()
            .ok_or(ClientError::MissingMetadata("metadata.name"))?;
        let api: Api<K> = Api::namespaced(self.client.clone(), ns);
        let mut pp = PatchParams::apply(&opts.field_owner);
        if opts.force {
            pp = pp.force();
        }
        Ok(api.patch(name, &pp, &Patch::Apply(obj)).await?)
    }
}

#[async_trait]
impl EventRecorder for KubeClient {
    async fn record(
        &self,
        regarding: &ObjectReference,
        kind: EventKind,
        reason: &str,
        note: String,
    ) {
        let event = Event {
            type_: kind.into(),
            reason: reason.into(),
            note: Some(note),
            action: reason.into(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, regarding).await {
            debug!(error = %e, %reason, "failed to publish event");
        }
    }
}
