pub mod fleet;
pub mod manifest;
pub mod module_template;

pub use fleet::{
    Condition, ConditionStatus, ConditionType, Fleet, FleetSpec, FleetStatus,
    ManifestRef, ModuleSpec, ModuleStatus, TemplateInfo,
};
pub use manifest::{Manifest, ManifestSpec, ManifestStatus};
pub use module_template::{ModuleDescriptor, ModuleTemplate, ModuleTemplateSpec};

use schemars::JsonSchema;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};

use crate::client::FieldIndexed;

#[derive(
    Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema,
)]
pub enum State {
    Ready,
    #[default]
    Processing,
    Error,
    Deleting,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Ready => "Ready",
            State::Processing => "Processing",
            State::Error => "Error",
            State::Deleting => "Deleting",
        }
    }
}

impl State {
    /// Maps a state string written by another controller. Blank and unknown
    /// values count as `Processing`.
    pub fn from_reported(raw: &str) -> State {
        match raw {
            "Ready" => State::Ready,
            "Error" => State::Error,
            "Deleting" => State::Deleting,
            _ => State::Processing,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldIndexed for Fleet {}

/// Free-form object accepted as-is by the API server.
pub(crate) fn preserve_unknown_fields(
    _: &mut schemars::r#gen::SchemaGenerator,
) -> Schema {
    let mut obj = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    obj.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".into(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(obj)
}
