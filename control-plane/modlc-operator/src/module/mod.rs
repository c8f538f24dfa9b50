//! Modules of one reconciliation pass: the join of a declared component, its
//! resolved template and the manifest applied for it.

mod conditions;
mod sync;

#[cfg(test)]
mod sync_tests;

pub use conditions::{aggregate_state, update_template_conditions};
pub use sync::{
    ModuleApplyError, MultiError, SyncError, SyncRunner, run_concurrently,
};

use kube::core::{DynamicObject, TypeMeta};
use kube::{Resource, ResourceExt};

use crate::client::{ClientError, ClientResult, ObjectKey};
use crate::crd::{
    Fleet, Manifest, ManifestRef, ManifestSpec, ModuleStatus, TemplateInfo,
};
use crate::labels;
use crate::release::{TemplateInChannel, TemplatesInChannels};

#[derive(Debug, Clone)]
pub struct Module {
    /// Component name as declared on the fleet.
    pub name: String,
    pub fqdn: String,
    pub version: String,
    pub template: TemplateInChannel,
    /// Desired manifest before apply, the persisted one after.
    pub manifest: Manifest,
}

pub type Modules = Vec<Module>;

impl Module {
    pub fn manifest_name(fleet: &str, component: &str) -> String {
        format!("{fleet}-{component}")
    }

    /// Desired state for `component` derived from its resolved template.
    pub fn from_template(
        fleet: &Fleet,
        component: &str,
        template: TemplateInChannel,
    ) -> Self {
        let descriptor = &template.template.spec.descriptor;
        let mut manifest = Manifest::new(
            &Self::manifest_name(&fleet.name_any(), component),
            ManifestSpec {
                version: descriptor.version.clone(),
                install: template.template.spec.data.clone(),
            },
        );
        manifest.metadata.namespace = fleet.namespace();
        Self {
            name: component.to_string(),
            fqdn: descriptor.fqdn.clone(),
            version: descriptor.version.clone(),
            template,
            manifest,
        }
    }

    /// Stamps ownership labels and annotations on the manifest and makes the
    /// fleet its controller unless some owner is already recorded.
    pub fn apply_labels_and_annotations(
        &mut self,
        fleet: &Fleet,
        managed_by: &str,
    ) -> ClientResult<()> {
        let stamped = self.manifest.labels_mut();
        stamped.insert(labels::FLEET_NAME.into(), fleet.name_any());
        stamped.insert(labels::CONTROLLER_NAME.into(), self.name.clone());
        stamped.insert(labels::CHANNEL.into(), self.template.channel.clone());
        stamped.insert(labels::MANAGED_BY.into(), managed_by.to_string());
        self.manifest
            .annotations_mut()
            .insert(labels::FQDN.into(), self.fqdn.clone());

        let has_owner = self
            .manifest
            .metadata
            .owner_references
            .as_ref()
            .is_some_and(|refs| !refs.is_empty());
        if !has_owner {
            let owner = fleet
                .controller_owner_ref(&())
                .ok_or(ClientError::MissingMetadata("metadata.uid"))?;
            self.manifest.metadata.owner_references = Some(vec![owner]);
        }
        Ok(())
    }

    pub fn manifest_key(&self) -> ObjectKey {
        ObjectKey::new(
            self.manifest.namespace().unwrap_or_default(),
            self.manifest.name_any(),
        )
    }

    pub fn template_info(&self) -> TemplateInfo {
        self.template.template_info()
    }

    /// Status entry reflecting the manifest as last seen.
    pub fn status(&self) -> ModuleStatus {
        ModuleStatus {
            name: self.name.clone(),
            fqdn: self.fqdn.clone(),
            manifest: ManifestRef {
                name: self.manifest.name_any(),
                namespace: self.manifest.namespace().unwrap_or_default(),
                generation: self.manifest.metadata.generation.unwrap_or_default(),
            },
            template: self.template_info(),
            state: self.manifest.state(),
        }
    }
}

/// Modules in declaration order for every resolved component.
pub fn build_modules(fleet: &Fleet, mut templates: TemplatesInChannels) -> Modules {
    fleet
        .spec
        .modules
        .iter()
        .filter_map(|component| {
            templates
                .remove(&component.name)
                .map(|t| Module::from_template(fleet, &component.name, t))
        })
        .collect()
}

/// Generic document of `manifest` stamped with the served storage version.
pub fn to_preferred_version(manifest: &Manifest) -> ClientResult<DynamicObject> {
    let mut obj: DynamicObject =
        serde_json::from_value(serde_json::to_value(manifest)?)?;
    obj.types = Some(TypeMeta {
        api_version: Manifest::api_version(&()).into_owned(),
        kind: Manifest::kind(&()).into_owned(),
    });
    Ok(obj)
}
