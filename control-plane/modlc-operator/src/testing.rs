//! Object builders shared by unit tests.

use kube::ResourceExt;
use serde_json::json;

use crate::crd::{
    Fleet, FleetSpec, ModuleDescriptor, ModuleSpec, ModuleTemplate,
    ModuleTemplateSpec,
};
use crate::labels::{CONTROLLER_NAME, MANAGED_BY};

pub const NS: &str = "kcp-system";
pub const OPERATOR: &str = "lifecycle-manager";

pub fn template(name: &str, component: &str, channel: &str) -> ModuleTemplate {
    let mut t = ModuleTemplate::new(
        name,
        ModuleTemplateSpec {
            channel: channel.into(),
            descriptor: ModuleDescriptor {
                fqdn: format!("example.io/modules/{component}"),
                version: "1.0.0".into(),
            },
            data: json!({ "chart": component }),
        },
    );
    t.metadata.namespace = Some(NS.into());
    t.metadata.generation = Some(1);
    t.labels_mut().insert(CONTROLLER_NAME.into(), component.into());
    t.labels_mut().insert(MANAGED_BY.into(), OPERATOR.into());
    t
}

pub fn module(name: &str, channel: Option<&str>) -> ModuleSpec {
    ModuleSpec {
        name: name.into(),
        channel: channel.map(Into::into),
    }
}

pub fn fleet(name: &str, channel: Option<&str>, modules: Vec<ModuleSpec>) -> Fleet {
    let mut f = Fleet::new(
        name,
        FleetSpec {
            channel: channel.map(Into::into),
            modules,
        },
    );
    f.metadata.namespace = Some(NS.into());
    f.metadata.uid = Some(format!("{name}-uid"));
    f.metadata.generation = Some(1);
    f.labels_mut().insert(MANAGED_BY.into(), OPERATOR.into());
    f
}
