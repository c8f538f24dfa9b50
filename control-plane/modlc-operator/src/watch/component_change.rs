use kube::Resource;
use kube::core::DynamicObject;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::ReconcileRequest;
use crate::client::{ClientError, ObjectKey, Reader};
use crate::crd::Fleet;
use crate::labels::CONTROLLER_NAME;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateExtractionError {
    #[error("status is not an object")]
    StatusNotObject,
    #[error("status.state is missing")]
    MissingState,
    #[error("status.state is not a string")]
    NotAString,
}

#[derive(Debug, thiserror::Error)]
pub enum OwnerResolutionError {
    #[error("no owner reference of kind {0}")]
    NoOwner(String),
    #[error("could not fetch owner {key}: {source}")]
    Fetch {
        key: ObjectKey,
        #[source]
        source: ClientError,
    },
}

/// Reads `status.state` of a generic document. A document without `status`
/// has no state yet and yields an empty string.
pub fn extract_state(doc: &Value) -> Result<String, StateExtractionError> {
    let Some(status) = doc.get("status") else {
        return Ok(String::new());
    };
    let status = status
        .as_object()
        .ok_or(StateExtractionError::StatusNotObject)?;
    let state = status
        .get("state")
        .ok_or(StateExtractionError::MissingState)?;
    state
        .as_str()
        .map(str::to_string)
        .ok_or(StateExtractionError::NotAString)
}

/// Requeues the owning fleet when a component reports a new state.
///
/// Only `status.state` is compared; any other change on the component,
/// including other status fields, is ignored.
pub struct ComponentChangeHandler<R> {
    reader: R,
}

impl<R> ComponentChangeHandler<R>
where
    R: Reader<Fleet>,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    #[instrument(level = "debug", skip_all, fields(component = new.metadata.name.as_deref().unwrap_or_default()))]
    pub async fn decide(
        &self,
        old: &DynamicObject,
        new: &DynamicObject,
    ) -> Option<ReconcileRequest> {
        let old_doc = to_document(old)?;
        let new_doc = to_document(new)?;

        if new_doc.get("status").is_none() {
            return None;
        }
        let controller = new
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(CONTROLLER_NAME))
            .filter(|v| !v.is_empty())?;

        let old_state = state_or_empty(&old_doc, "old");
        let new_state = state_or_empty(&new_doc, "new");
        if old_state == new_state {
            return None;
        }
        debug!(%controller, from = %old_state, to = %new_state, "component state changed");

        match self.owner_of(new).await {
            Ok(req) => Some(req),
            Err(e) => {
                error!(error = %e, "dropping component change");
                None
            }
        }
    }

    async fn owner_of(
        &self,
        component: &DynamicObject,
    ) -> Result<ReconcileRequest, OwnerResolutionError> {
        let kind = Fleet::kind(&());
        let owner = component
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|o| o.kind == kind)
            .ok_or_else(|| OwnerResolutionError::NoOwner(kind.to_string()))?;
        let key = ObjectKey::new(
            component.metadata.namespace.clone().unwrap_or_default(),
            owner.name.clone(),
        );
        let fleet = self
            .reader
            .get(&key)
            .await
            .map_err(|source| OwnerResolutionError::Fetch {
                key: key.clone(),
                source,
            })?;
        Ok(ReconcileRequest::for_fleet(&fleet))
    }
}

fn to_document(obj: &DynamicObject) -> Option<Value> {
    match serde_json::to_value(obj) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!(error = %e, "could not serialize component");
            None
        }
    }
}

fn state_or_empty(doc: &Value, which: &str) -> String {
    extract_state(doc).unwrap_or_else(|e| {
        warn!(error = %e, object = which, "could not read component state");
        String::new()
    })
}
