//! Template selection per module: channel lookup with fallback, plus
//! detection of templates that changed since status last recorded them.

mod lookup;
mod outdated;


pub use lookup::{ChannelTemplateLookup, LookupError};
pub use outdated::mark_outdated;

use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::instrument;

use crate::client::Reader;
use crate::crd::{Fleet, ModuleTemplate, TemplateInfo};

/// Template chosen for one module, with the channel it was found on.
#[derive(Debug, Clone)]
pub struct TemplateInChannel {
    pub template: ModuleTemplate,
    /// Channel of the selected template; may differ from the desired one
    /// when the lookup fell back.
    pub channel: String,
    /// Set when the template differs from the snapshot stored in status.
    pub outdated: bool,
}

impl TemplateInChannel {
    pub fn generation(&self) -> i64 {
        self.template.metadata.generation.unwrap_or_default()
    }

    pub fn template_info(&self) -> TemplateInfo {
        TemplateInfo {
            name: self.template.name_any(),
            namespace: self.template.namespace().unwrap_or_default(),
            channel: self.channel.clone(),
            generation: self.generation(),
            version: self.template.spec.descriptor.version.clone(),
        }
    }
}

/// Resolutions of one pass keyed by component name.
pub type TemplatesInChannels = BTreeMap<String, TemplateInChannel>;

/// Resolves a template for every module declared on `fleet`, then flags the
/// ones that changed since the last recorded pass. The first lookup error
/// aborts the whole resolution.
#[instrument(skip_all, fields(fleet = %fleet.name_any(), modules = fleet.spec.modules.len()))]
pub async fn get_templates<R>(
    reader: &R,
    fleet: &Fleet,
) -> Result<TemplatesInChannels, LookupError>
where
    R: Reader<ModuleTemplate>,
{
    let mut templates = TemplatesInChannels::new();
    for component in &fleet.spec.modules {
        let resolved =
            ChannelTemplateLookup::new(reader, component, fleet.default_channel())
                .resolve()
                .await?;
        templates.insert(component.name.clone(), resolved);
    }
    mark_outdated(fleet, &mut templates);
    Ok(templates)
}
