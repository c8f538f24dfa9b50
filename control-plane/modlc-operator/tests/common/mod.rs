#![allow(dead_code)]

use kube::ResourceExt;
use modlc_operator::client::MemoryCluster;
use modlc_operator::config::OperatorConfig;
use modlc_operator::crd::{
    Fleet, FleetSpec, ModuleDescriptor, ModuleSpec, ModuleTemplate,
    ModuleTemplateSpec,
};
use modlc_operator::labels::{CONTROLLER_NAME, MANAGED_BY};
use serde_json::json;

pub const NS: &str = "kcp-system";
pub const OPERATOR: &str = "lifecycle-manager";

// Unique, DNS-1123 safe names for tests that share a cluster
pub fn uniq(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_subsec_nanos();
    format!("{prefix}-{}", nanos % 1_000_000)
}

pub fn config() -> OperatorConfig {
    OperatorConfig {
        operator_name: OPERATOR.into(),
        ..Default::default()
    }
}

pub fn template(
    name: &str,
    component: &str,
    channel: &str,
    version: &str,
) -> ModuleTemplate {
    let mut t = ModuleTemplate::new(
        name,
        ModuleTemplateSpec {
            channel: channel.into(),
            descriptor: ModuleDescriptor {
                fqdn: format!("example.io/modules/{component}"),
                version: version.into(),
            },
            data: json!({ "chart": component, "version": version }),
        },
    );
    t.metadata.namespace = Some(NS.into());
    t.metadata.generation = Some(1);
    t.labels_mut().insert(CONTROLLER_NAME.into(), component.into());
    t.labels_mut().insert(MANAGED_BY.into(), OPERATOR.into());
    t
}

pub fn fleet(name: &str, channel: Option<&str>, modules: &[(&str, Option<&str>)]) -> Fleet {
    let mut f = Fleet::new(
        name,
        FleetSpec {
            channel: channel.map(Into::into),
            modules: modules
                .iter()
                .map(|(n, c)| ModuleSpec {
                    name: (*n).into(),
                    channel: c.map(Into::into),
                })
                .collect(),
        },
    );
    f.metadata.namespace = Some(NS.into());
    f.metadata.uid = Some(format!("{name}-uid"));
    f.metadata.generation = Some(1);
    f.labels_mut().insert(MANAGED_BY.into(), OPERATOR.into());
    f
}

/// Cluster preloaded with the given templates.
pub async fn cluster_with(templates: &[ModuleTemplate]) -> MemoryCluster {
    let cluster = MemoryCluster::new();
    for t in templates {
        cluster.insert(t).await.expect("insert template");
    }
    cluster
}
