//! Event handlers that turn changes on watched kinds into reconcile
//! requests for the owning or affected fleets.

mod component_change;
mod template_change;


pub use component_change::{
    ComponentChangeHandler, OwnerResolutionError, StateExtractionError,
    extract_state,
};
pub use template_change::TemplateChangeHandler;

use kube::ResourceExt;
use kube::runtime::reflector::ObjectRef;

use crate::crd::Fleet;

/// Namespace/name of a fleet to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReconcileRequest {
    pub namespace: String,
    pub name: String,
}

impl ReconcileRequest {
    pub fn for_fleet(fleet: &Fleet) -> Self {
        Self {
            namespace: fleet.namespace().unwrap_or_default(),
            name: fleet.name_any(),
        }
    }
}

impl std::fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl From<ReconcileRequest> for ObjectRef<Fleet> {
    fn from(req: ReconcileRequest) -> Self {
        ObjectRef::new(&req.name).within(&req.namespace)
    }
}
