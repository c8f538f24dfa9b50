//! Cluster capabilities consumed by the reconciliation core.
//!
//! The core never talks to the API server directly. It reads through
//! [`Reader`], writes manifests through [`Patcher`] and reports through
//! [`EventRecorder`]. [`KubeClient`] backs all three with a kube `Client`;
//! [`MemoryCluster`] is an in-process stand-in used by tests.

mod kube_client;
#[cfg(feature = "memory")]
mod memory;

pub use kube_client::KubeClient;
#[cfg(feature = "memory")]
pub use memory::{AppliedBy, MemoryCluster, RecordedEvent};

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::ResourceExt;
use kube::core::DynamicObject;

use crate::events::EventKind;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("object is missing {0}")]
    MissingMetadata(&'static str),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<kube::Error> for ClientError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 404 => {
                ClientError::NotFound(resp.message)
            }
            other => ClientError::Api(other.to_string()),
        }
    }
}

/// Namespace/name pair identifying a namespaced object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource<K: ResourceExt>(obj: &K) -> ClientResult<Self> {
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or(ClientError::MissingMetadata("metadata.name"))?;
        Ok(Self {
            namespace: obj.namespace().unwrap_or_default(),
            name,
        })
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Secondary index lookups supported by a resource kind.
///
/// The API server cannot select custom resources by arbitrary spec fields,
/// so readers evaluate indexed fields after the label-selected list.
pub trait FieldIndexed {
    fn indexed_field(&self, _field: &str) -> Option<&str> {
        None
    }
}

/// Label selector plus an optional indexed-field match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub field: Option<(String, String)>,
}

impl ListFilter {
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn field(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.field = Some((field.into(), value.into()));
        self
    }

    /// `k1=v1,k2=v2`, or `None` when no labels are required.
    pub fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    pub fn matches_labels<K: ResourceExt>(&self, obj: &K) -> bool {
        let labels = obj.labels();
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }

    pub fn matches_field<K: FieldIndexed>(&self, obj: &K) -> bool {
        match &self.field {
            None => true,
            Some((field, value)) => {
                obj.indexed_field(field) == Some(value.as_str())
            }
        }
    }

    pub fn matches<K: ResourceExt + FieldIndexed>(&self, obj: &K) -> bool {
        let ns_ok = self
            .namespace
            .as_ref()
            .is_none_or(|ns| obj.namespace().as_ref() == Some(ns));
        ns_ok && self.matches_labels(obj) && self.matches_field(obj)
    }
}

/// Field manager settings for a server-side apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub field_owner: String,
    pub force: bool,
}

impl ApplyOptions {
    pub fn force(field_owner: impl Into<String>) -> Self {
        Self {
            field_owner: field_owner.into(),
            force: true,
        }
    }
}

#[async_trait]
pub trait Reader<K: Send>: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> ClientResult<Vec<K>>;
    async fn get(&self, key: &ObjectKey) -> ClientResult<K>;
}

#[async_trait]
pub trait Patcher<K: Send>: Send + Sync {
    /// Server-side apply of `obj`, returning the object as persisted.
    async fn apply(
        &self,
        obj: &DynamicObject,
        opts: &ApplyOptions,
    ) -> ClientResult<K>;
}

/// Fire-and-forget event sink; failures are never surfaced to callers.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(
        &self,
        regarding: &ObjectReference,
        kind: EventKind,
        reason: &str,
        note: String,
    );
}
