use kube::ResourceExt;
use tracing::info;

use super::TemplatesInChannels;
use crate::crd::Fleet;

/// Flags resolutions whose template generation or channel no longer match
/// the snapshot kept in the fleet's condition for that component.
pub fn mark_outdated(fleet: &Fleet, templates: &mut TemplatesInChannels) {
    for condition in fleet.conditions() {
        let Some(resolved) = templates.get_mut(&condition.reason) else {
            continue;
        };
        let previous = &condition.template_info;
        let generation = resolved.generation();
        if generation == previous.generation
            && resolved.channel == previous.channel
        {
            continue;
        }
        info!(
            component = %condition.reason,
            template = %resolved.template.name_any(),
            new_generation = generation,
            previous_generation = previous.generation,
            new_channel = %resolved.channel,
            previous_channel = %previous.channel,
            "detected outdated template"
        );
        resolved.outdated = true;
    }
}
