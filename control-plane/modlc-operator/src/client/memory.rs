use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Resource;
use kube::core::DynamicObject;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::{
    ApplyOptions, ClientError, ClientResult, EventRecorder, FieldIndexed,
    ListFilter, ObjectKey, Patcher, Reader,
};
use crate::events::EventKind;

type StoreKey = (String, ObjectKey);
type ObjectStore = Arc<RwLock<BTreeMap<StoreKey, Value>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub regarding: String,
    pub kind: EventKind,
    pub reason: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedBy {
    pub key: ObjectKey,
    pub field_owner: String,
    pub force: bool,
}

/// In-process cluster keeping objects as JSON documents per kind.
///
/// Apply keeps the stored `status`, bumps `metadata.generation` when the spec
/// changes and assigns a uid on create, which is all the server behaviour the
/// core observes.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    objects: ObjectStore,
    failing_applies: Arc<RwLock<HashSet<String>>>,
    failing_gets: Arc<RwLock<HashSet<String>>>,
    failing_lists: Arc<RwLock<HashSet<String>>>,
    events: Arc<RwLock<Vec<RecordedEvent>>>,
    applies: Arc<RwLock<Vec<AppliedBy>>>,
    uid_seq: Arc<AtomicU64>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn store_key<K: Resource<DynamicType = ()>>(key: ObjectKey) -> StoreKey {
        (K::kind(&()).into_owned(), key)
    }

    fn next_uid(&self) -> String {
        format!("uid-{}", self.uid_seq.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Stores `obj` as-is, assigning a uid when it has none.
    pub async fn insert<K>(&self, obj: &K) -> ClientResult<()>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let key = ObjectKey::from_resource(obj)?;
        let mut doc = serde_json::to_value(obj)?;
        if doc.pointer("/metadata/uid").is_none_or(Value::is_null) {
            doc["metadata"]["uid"] = json!(self.next_uid());
        }
        self.objects
            .write()
            .await
            .insert(Self::store_key::<K>(key), doc);
        Ok(())
    }

    pub async fn remove<K: Resource<DynamicType = ()>>(&self, key: &ObjectKey) {
        self.objects
            .write()
            .await
            .remove(&Self::store_key::<K>(key.clone()));
    }

    pub async fn object<K>(&self, key: &ObjectKey) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let store = self.objects.read().await;
        store
            .get(&Self::store_key::<K>(key.clone()))
            .and_then(|doc| serde_json::from_value(doc.clone()).ok())
    }

    /// Replaces the `status` of a stored object, as its controller would.
    pub async fn set_status<K: Resource<DynamicType = ()>>(
        &self,
        key: &ObjectKey,
        status: Value,
    ) -> ClientResult<()> {
        let mut store = self.objects.write().await;
        let doc = store
            .get_mut(&Self::store_key::<K>(key.clone()))
            .ok_or_else(|| ClientError::NotFound(key.to_string()))?;
        doc["status"] = status;
        Ok(())
    }

    /// Applies of objects with this name fail with an API error.
    pub async fn fail_apply(&self, name: &str) {
        self.failing_applies.write().await.insert(name.to_string());
    }

    /// Gets of objects with this name fail with an API error.
    pub async fn fail_get(&self, name: &str) {
        self.failing_gets.write().await.insert(name.to_string());
    }

    /// Lists of this kind fail with an API error.
    pub async fn fail_list<K: Resource<DynamicType = ()>>(&self) {
        self.failing_lists
            .write()
            .await
            .insert(K::kind(&()).into_owned());
    }

    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().await.clone()
    }

    pub async fn applies(&self) -> Vec<AppliedBy> {
        self.applies.read().await.clone()
    }
}

#[async_trait]
impl<K> Reader<K> for MemoryCluster
where
    K: Resource<DynamicType = ()>
        + FieldIndexed
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn list(&self, filter: &ListFilter) -> ClientResult<Vec<K>> {
        let kind = K::kind(&());
        if self.failing_lists.read().await.contains(kind.as_ref()) {
            return Err(ClientError::Api(format!("list {kind} refused")));
        }
        let store = self.objects.read().await;
        let mut items = Vec::new();
        for ((k, _), doc) in store.iter() {
            if k.as_str() != kind.as_ref() {
                continue;
            }
            let obj: K = serde_json::from_value(doc.clone())?;
            if filter.matches(&obj) {
                items.push(obj);
            }
        }
        Ok(items)
    }

    async fn get(&self, key: &ObjectKey) -> ClientResult<K> {
        if self.failing_gets.read().await.contains(&key.name) {
            return Err(ClientError::Api(format!("get {key} timed out")));
        }
        let store = self.objects.read().await;
        let doc = store
            .get(&Self::store_key::<K>(key.clone()))
            .ok_or_else(|| ClientError::NotFound(key.to_string()))?;
        Ok(serde_json::from_value(doc.clone())?)
    }
}

#[async_trait]
impl<K> Patcher<K> for MemoryCluster
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + Sync + 'static,
{
    async fn apply(
        &self,
        obj: &DynamicObject,
        opts: &ApplyOptions,
    ) -> ClientResult<K> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or(ClientError::MissingMetadata("metadata.name"))?;
        let namespace = obj
            .metadata
            .namespace
            .clone()
            .ok_or(ClientError::MissingMetadata("metadata.namespace"))?;
        if self.failing_applies.read().await.contains(&name) {
            return Err(ClientError::Api(format!(
                "admission webhook denied {namespace}/{name}"
            )));
        }
        let key = ObjectKey::new(namespace, name);
        self.applies.write().await.push(AppliedBy {
            key: key.clone(),
            field_owner: opts.field_owner.clone(),
            force: opts.force,
        });

        let mut doc = serde_json::to_value(obj)?;
        let mut store = self.objects.write().await;
        let store_key = Self::store_key::<K>(key);
        match store.get(&store_key) {
            Some(existing) => {
                let generation = existing
                    .pointer("/metadata/generation")
                    .and_then(Value::as_i64)
                    .unwrap_or(1);
                let spec_changed = existing.get("spec") != doc.get("spec");
                doc["metadata"]["generation"] = json!(if spec_changed {
                    generation + 1
                } else {
                    generation
                });
                doc["metadata"]["uid"] = existing
                    .pointer("/metadata/uid")
                    .cloned()
                    .unwrap_or(Value::Null);
                match existing.get("status") {
                    Some(status) => doc["status"] = status.clone(),
                    None => {
                        if let Some(map) = doc.as_object_mut() {
                            map.remove("status");
                        }
                    }
                }
            }
            None => {
                doc["metadata"]["generation"] = json!(1);
                doc["metadata"]["uid"] = json!(self.next_uid());
                if let Some(map) = doc.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        let applied: K = serde_json::from_value(doc.clone())?;
        store.insert(store_key, doc);
        Ok(applied)
    }
}

#[async_trait]
impl EventRecorder for MemoryCluster {
    async fn record(
        &self,
        regarding: &ObjectReference,
        kind: EventKind,
        reason: &str,
        note: String,
    ) {
        self.events.write().await.push(RecordedEvent {
            regarding: regarding.name.clone().unwrap_or_default(),
            kind,
            reason: reason.to_string(),
            note,
        });
    }
}
