//! Label, annotation and index keys shared with the rest of the cluster.
//!
//! These keys are the boundary contract between the operator, the templates
//! it selects and the manifests it applies. Anything not listed here is not
//! interpreted by the operator.

use std::collections::BTreeMap;

pub const OPERATOR_PREFIX: &str = "operator.modlc.io";

/// Ties a template or manifest to the component (module) it implements.
pub const CONTROLLER_NAME: &str = "operator.modlc.io/controller-name";

/// Release track a manifest was applied from.
pub const CHANNEL: &str = "operator.modlc.io/channel";

/// Identity of the operator owning an object. On a `Fleet` it doubles as the
/// server-side-apply field owner.
pub const MANAGED_BY: &str = "operator.modlc.io/managed-by";

/// Name of the `Fleet` a manifest was applied for.
pub const FLEET_NAME: &str = "operator.modlc.io/fleet-name";

/// Annotation carrying the fully qualified module identifier.
pub const FQDN: &str = "operator.modlc.io/fqdn";

/// Field on `ModuleTemplate` indexed for channel lookups.
pub const TEMPLATE_CHANNEL_FIELD: &str = "spec.channel";

/// Channel used when neither the module nor its fleet names one.
pub const DEFAULT_CHANNEL: &str = "regular";

/// Returns the label value when present and non-empty.
pub fn non_empty<'a>(
    labels: &'a BTreeMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    labels
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}
