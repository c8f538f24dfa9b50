use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::FieldIndexed;

use super::{State, preserve_unknown_fields};

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "operator.modlc.io",
    version = "v1alpha1",
    kind = "Manifest",
    plural = "manifests",
    namespaced,
    status = "ManifestStatus"
)]
pub struct ManifestSpec {
    /// Version of the module this manifest installs.
    #[serde(default)]
    pub version: String,
    /// Install payload copied from the resolved template.
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub install: Value,
}

/// Written by the manifest controller, never by this operator. `state` is
/// kept as reported so blank or unrecognised values still decode.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct ManifestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Manifest {
    /// Reported state, `Processing` until the manifest controller sets a
    /// known one.
    pub fn state(&self) -> State {
        self.status
            .as_ref()
            .and_then(|s| s.state.as_deref())
            .map(State::from_reported)
            .unwrap_or_default()
    }
}

impl FieldIndexed for Manifest {}
