use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::FieldIndexed;
use crate::labels::TEMPLATE_CHANNEL_FIELD;

use super::preserve_unknown_fields;

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema,
)]
#[kube(
    group = "operator.modlc.io",
    version = "v1alpha1",
    kind = "ModuleTemplate",
    plural = "moduletemplates",
    namespaced
)]
pub struct ModuleTemplateSpec {
    /// Release track this template is published on. Required; a template
    /// without a channel is never selected.
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub descriptor: ModuleDescriptor,
    /// Spec of the manifest applied for modules resolved to this template.
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub data: Value,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct ModuleDescriptor {
    /// Fully qualified module identifier, e.g. `example.io/modules/foo`.
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub version: String,
}

impl FieldIndexed for ModuleTemplate {
    fn indexed_field(&self, field: &str) -> Option<&str> {
        match field {
            TEMPLATE_CHANNEL_FIELD => Some(self.spec.channel.as_str()),
            _ => None,
        }
    }
}
