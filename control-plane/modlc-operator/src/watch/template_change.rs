use kube::ResourceExt;
use tracing::{debug, error, instrument};

use super::ReconcileRequest;
use crate::client::{ListFilter, Reader};
use crate::crd::{Fleet, ModuleTemplate};
use crate::labels::{self, CONTROLLER_NAME, DEFAULT_CHANNEL, MANAGED_BY};

/// Maps a changed template to every fleet whose module resolution it can
/// affect.
pub struct TemplateChangeHandler<R> {
    reader: R,
    operator_name: String,
}

impl<R> TemplateChangeHandler<R>
where
    R: Reader<Fleet>,
{
    pub fn new(reader: R, operator_name: impl Into<String>) -> Self {
        Self {
            reader,
            operator_name: operator_name.into(),
        }
    }

    #[instrument(level = "debug", skip_all, fields(template = %template.name_any()))]
    pub async fn map_to_requests(
        &self,
        template: &ModuleTemplate,
    ) -> Vec<ReconcileRequest> {
        let Some(controller) = labels::non_empty(template.labels(), CONTROLLER_NAME)
        else {
            return Vec::new();
        };
        if labels::non_empty(template.labels(), MANAGED_BY)
            != Some(self.operator_name.as_str())
        {
            return Vec::new();
        }
        let channel = template.spec.channel.as_str();
        if channel.is_empty() {
            return Vec::new();
        }

        let fleets = match self.reader.list(&ListFilter::default()).await {
            Ok(fleets) => fleets,
            Err(e) => {
                error!(error = %e, "could not list fleets for template change");
                return Vec::new();
            }
        };

        let requests: Vec<ReconcileRequest> = fleets
            .iter()
            .filter(|fleet| requeue_fleet(fleet, controller, channel))
            .map(ReconcileRequest::for_fleet)
            .collect();
        debug!(%controller, %channel, count = requests.len(), "template change affects fleets");
        requests
    }
}

/// Whether `fleet` declares `controller` on a channel served by `channel`.
/// A fleet without a default channel resolves on [`DEFAULT_CHANNEL`].
fn requeue_fleet(fleet: &Fleet, controller: &str, channel: &str) -> bool {
    let global_match = fleet.default_channel().unwrap_or(DEFAULT_CHANNEL) == channel;
    fleet
        .spec
        .modules
        .iter()
        .filter(|m| m.name == controller)
        .any(|m| match m.channel.as_deref() {
            None | Some("") => global_match,
            Some(own) => own == channel,
        })
}
