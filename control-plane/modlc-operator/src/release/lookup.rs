use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::TemplateInChannel;
use crate::client::{ClientError, ListFilter, Reader};
use crate::crd::{ModuleSpec, ModuleTemplate};
use crate::labels::{CONTROLLER_NAME, DEFAULT_CHANNEL, TEMPLATE_CHANNEL_FIELD};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(
        "more than one template found for component {component}, candidates: {candidates:?}"
    )]
    AmbiguousTemplate {
        component: String,
        candidates: Vec<String>,
    },

    #[error("no template found for component {component}")]
    TemplateNotFound { component: String },

    #[error(
        "template {template} for component {component} has no channel; templates without a channel are not allowed"
    )]
    MissingChannel { component: String, template: String },

    #[error("template lookup failed: {0}")]
    Client(#[from] ClientError),
}

impl LookupError {
    fn ambiguous(component: &str, candidates: &[ModuleTemplate]) -> Self {
        LookupError::AmbiguousTemplate {
            component: component.to_string(),
            candidates: candidates.iter().map(|t| t.name_any()).collect(),
        }
    }
}

/// Picks the single template governing one module.
pub struct ChannelTemplateLookup<'a, R> {
    reader: &'a R,
    component: &'a ModuleSpec,
    default_channel: Option<&'a str>,
}

impl<'a, R> ChannelTemplateLookup<'a, R>
where
    R: Reader<ModuleTemplate>,
{
    pub fn new(
        reader: &'a R,
        component: &'a ModuleSpec,
        default_channel: Option<&'a str>,
    ) -> Self {
        Self {
            reader,
            component,
            default_channel,
        }
    }

    /// Module override, then the fleet default, then [`DEFAULT_CHANNEL`].
    pub fn desired_channel(&self) -> &'a str {
        let own = self.component.channel.as_deref().filter(|c| !c.is_empty());
        let fleet = self.default_channel.filter(|c| !c.is_empty());
        own.or(fleet).unwrap_or(DEFAULT_CHANNEL)
    }

    #[instrument(level = "debug", skip(self), fields(component = %self.component.name))]
    pub async fn resolve(&self) -> Result<TemplateInChannel, LookupError> {
        let component = self.component.name.as_str();
        let desired = self.desired_channel();
        let by_controller =
            ListFilter::default().label(CONTROLLER_NAME, component);

        let mut candidates = self
            .reader
            .list(&by_controller.clone().field(TEMPLATE_CHANNEL_FIELD, desired))
            .await?;
        if candidates.len() > 1 {
            return Err(LookupError::ambiguous(component, &candidates));
        }

        if candidates.is_empty() {
            debug!(%desired, "no template on desired channel, trying any channel");
            candidates = self.reader.list(&by_controller).await?;
            if candidates.len() > 1 {
                return Err(LookupError::ambiguous(component, &candidates));
            }
        }

        let Some(template) = candidates.pop() else {
            return Err(LookupError::TemplateNotFound {
                component: component.to_string(),
            });
        };

        let actual = template.spec.channel.clone();
        if actual.is_empty() {
            return Err(LookupError::MissingChannel {
                component: component.to_string(),
                template: template.name_any(),
            });
        }

        if actual != desired {
            info!(%actual, %desired, template = %template.name_any(), "using template from fallback channel");
        } else {
            debug!(channel = %actual, template = %template.name_any(), "using template");
        }

        Ok(TemplateInChannel {
            template,
            channel: actual,
            outdated: false,
        })
    }
}
