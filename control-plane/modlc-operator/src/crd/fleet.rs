use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::client::ObjectKey;
use crate::labels;

use super::State;

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "operator.modlc.io",
    version = "v1alpha1",
    kind = "Fleet",
    plural = "fleets",
    namespaced,
    status = "FleetStatus"
)]
pub struct FleetSpec {
    /// Release channel for modules that do not name their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Modules this fleet should run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct ModuleSpec {
    /// Component name; matches the controller-name label of its templates.
    pub name: String,
    /// Optional per-module channel override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    /// One entry per declared module, plus entries whose manifest has not
    /// been confirmed deleted yet.
    #[serde(default)]
    pub modules: Vec<ModuleStatus>,
    /// Template snapshot per module; `reason` holds the component name.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    /// Component name.
    pub name: String,
    pub fqdn: String,
    pub manifest: ManifestRef,
    pub template: TemplateInfo,
    pub state: State,
}

impl ModuleStatus {
    pub fn manifest_key(&self) -> ObjectKey {
        ObjectKey::new(&self.manifest.namespace, &self.manifest.name)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ManifestRef {
    pub name: String,
    pub namespace: String,
    pub generation: i64,
}

#[derive(
    Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema,
)]
pub struct TemplateInfo {
    pub name: String,
    pub namespace: String,
    pub channel: String,
    pub generation: i64,
    pub version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub template_info: TemplateInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Ready,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Fleet {
    /// Channel used by modules without an override; blank counts as unset.
    pub fn default_channel(&self) -> Option<&str> {
        self.spec.channel.as_deref().filter(|c| !c.is_empty())
    }

    pub fn managed_by(&self) -> Option<&str> {
        labels::non_empty(self.labels(), labels::MANAGED_BY)
    }

    pub fn module_statuses(&self) -> &[ModuleStatus] {
        self.status
            .as_ref()
            .map(|s| s.modules.as_slice())
            .unwrap_or_default()
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}
