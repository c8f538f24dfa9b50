#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use kube::ResourceExt;
    use serde_json::json;

    use crate::client::{MemoryCluster, ObjectKey, Reader};
    use crate::crd::{
        Fleet, FleetStatus, Manifest, ManifestRef, ModuleStatus, State,
        TemplateInfo,
    };
    use crate::events::{EventKind, REASON_MODULE_APPLY_FAILED, REASON_MODULES_APPLIED};
    use crate::module::{Module, Modules, SyncError, SyncRunner, run_concurrently};
    use crate::release::TemplateInChannel;
    use crate::testing::{NS, OPERATOR, fleet, module, template};

    fn modules_for(f: &Fleet, names: &[&str]) -> Modules {
        names
            .iter()
            .map(|name| {
                Module::from_template(
                    f,
                    name,
                    TemplateInChannel {
                        template: template(&format!("{name}-regular"), name, "regular"),
                        channel: "regular".into(),
                        outdated: false,
                    },
                )
            })
            .collect()
    }

    fn stale_entry(name: &str) -> ModuleStatus {
        ModuleStatus {
            name: name.into(),
            fqdn: format!("example.io/modules/{name}"),
            manifest: ManifestRef {
                name: format!("kyma-1-{name}"),
                namespace: NS.into(),
                generation: 1,
            },
            template: TemplateInfo::default(),
            state: State::Ready,
        }
    }

    #[tokio::test]
    async fn run_concurrently_returns_one_result_per_task() {
        let out = run_concurrently((0..5).map(|i| async move { i * 2 }), None).await;
        let mut sorted = out.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 2, 4, 6, 8]);

        let empty: Vec<i32> =
            run_concurrently(Vec::<std::future::Ready<i32>>::new(), None).await;
        assert!(empty.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_concurrently_honours_the_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks = (0..6).map(|_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });
        let out = run_concurrently(tasks, Some(2)).await;
        assert_eq!(out.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test_log::test(tokio::test)]
    async fn sync_applies_every_module_and_refreshes_manifests() {
        let cluster = MemoryCluster::new();
        let f = fleet("kyma-1", None, vec![module("foo", None), module("bar", None)]);
        let mut modules = modules_for(&f, &["foo", "bar"]);

        SyncRunner::new(&cluster, OPERATOR)
            .sync(&f, &mut modules)
            .await
            .unwrap();

        for m in &modules {
            assert_eq!(m.manifest.metadata.generation, Some(1));
            assert!(m.manifest.uid().is_some());
            let stored: Manifest = cluster.object(&m.manifest_key()).await.unwrap();
            assert_eq!(stored.labels()[crate::labels::FLEET_NAME], "kyma-1");
        }
        let applies = cluster.applies().await;
        assert_eq!(applies.len(), 2);
        assert!(applies.iter().all(|a| a.force && a.field_owner == OPERATOR));

        let events = cluster.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Normal);
        assert_eq!(events[0].reason, REASON_MODULES_APPLIED);
    }

    #[test_log::test(tokio::test)]
    async fn field_owner_falls_back_to_operator_name() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        f.labels_mut().remove(crate::labels::MANAGED_BY);
        let mut modules = modules_for(&f, &["foo"]);

        SyncRunner::new(&cluster, "custom-operator")
            .sync(&f, &mut modules)
            .await
            .unwrap();
        assert_eq!(cluster.applies().await[0].field_owner, "custom-operator");
    }

    #[test_log::test(tokio::test)]
    async fn partial_failure_names_failed_modules_and_refreshes_the_rest() {
        let cluster = MemoryCluster::new();
        cluster.fail_apply("kyma-1-bar").await;
        let f = fleet(
            "kyma-1",
            None,
            vec![module("foo", None), module("bar", None), module("baz", None)],
        );
        let mut modules = modules_for(&f, &["foo", "bar", "baz"]);

        let err = SyncRunner::new(&cluster, OPERATOR)
            .with_limit(Some(1))
            .sync(&f, &mut modules)
            .await
            .unwrap_err();
        assert_eq!(err.failed_modules(), vec!["bar"]);
        let SyncError::ServerSideApply { errors, .. } = &err;
        assert_eq!(errors.len(), 1);
        assert!(err.to_string().contains("could not update module bar"));

        for m in &modules {
            let refreshed = m.manifest.metadata.generation.is_some();
            assert_eq!(refreshed, m.name != "bar", "{}", m.name);
        }

        let warnings: Vec<_> = cluster
            .events()
            .await
            .into_iter()
            .filter(|e| e.reason == REASON_MODULE_APPLY_FAILED)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, EventKind::Warning);
        assert_eq!(warnings[0].regarding, "kyma-1");
    }

    #[test_log::test(tokio::test)]
    async fn new_module_requires_status_update_once() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        let mut modules = modules_for(&f, &["foo"]);
        let runner = SyncRunner::new(&cluster, OPERATOR);
        runner.sync(&f, &mut modules).await.unwrap();

        assert!(runner.sync_module_status(&mut f, &modules).await);
        let entries = f.module_statuses();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state, State::Processing);
        assert_eq!(entries[0].manifest.generation, 1);

        assert!(!runner.sync_module_status(&mut f, &modules).await);
        assert_eq!(f.module_statuses().len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn reported_state_change_requires_status_update() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        let mut modules = modules_for(&f, &["foo"]);
        let runner = SyncRunner::new(&cluster, OPERATOR);
        runner.sync(&f, &mut modules).await.unwrap();
        runner.sync_module_status(&mut f, &modules).await;

        cluster
            .set_status::<Manifest>(&modules[0].manifest_key(), json!({"state": "Ready"}))
            .await
            .unwrap();
        runner.sync(&f, &mut modules).await.unwrap();

        assert!(runner.sync_module_status(&mut f, &modules).await);
        assert_eq!(f.module_statuses()[0].state, State::Ready);
    }

    #[test_log::test(tokio::test)]
    async fn blank_or_unknown_reported_state_counts_as_processing() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        let mut modules = modules_for(&f, &["foo"]);
        let runner = SyncRunner::new(&cluster, OPERATOR);
        runner.sync(&f, &mut modules).await.unwrap();

        cluster
            .set_status::<Manifest>(&modules[0].manifest_key(), json!({"state": "Ready"}))
            .await
            .unwrap();
        runner.sync(&f, &mut modules).await.unwrap();
        runner.sync_module_status(&mut f, &modules).await;
        assert_eq!(f.module_statuses()[0].state, State::Ready);

        for reported in ["", "Warning"] {
            cluster
                .set_status::<Manifest>(
                    &modules[0].manifest_key(),
                    json!({ "state": reported }),
                )
                .await
                .unwrap();
            runner.sync(&f, &mut modules).await.unwrap();
            runner.sync_module_status(&mut f, &modules).await;
            assert_eq!(f.module_statuses()[0].state, State::Processing, "{reported:?}");
        }
    }

    #[test_log::test(tokio::test)]
    async fn undeclared_entry_with_blank_state_manifest_is_kept() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![]);
        let mut old = Manifest::new("kyma-1-old", Default::default());
        old.metadata.namespace = Some(NS.into());
        cluster.insert(&old).await.unwrap();
        cluster
            .set_status::<Manifest>(&ObjectKey::new(NS, "kyma-1-old"), json!({"state": ""}))
            .await
            .unwrap();
        f.status = Some(FleetStatus {
            modules: vec![stale_entry("old")],
            ..Default::default()
        });

        let runner = SyncRunner::new(&cluster, OPERATOR);
        assert!(!runner.sync_module_status(&mut f, &Vec::new()).await);
        assert_eq!(f.module_statuses().len(), 1);

        cluster
            .remove::<Manifest>(&ObjectKey::new(NS, "kyma-1-old"))
            .await;
        assert!(runner.sync_module_status(&mut f, &Vec::new()).await);
        assert!(f.module_statuses().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn undeclared_entry_is_pruned_only_when_manifest_is_gone() {
        let cluster = MemoryCluster::new();
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        let mut modules = modules_for(&f, &["foo"]);
        let runner = SyncRunner::new(&cluster, OPERATOR);
        runner.sync(&f, &mut modules).await.unwrap();

        let mut old = Manifest::new("kyma-1-old", Default::default());
        old.metadata.namespace = Some(NS.into());
        cluster.insert(&old).await.unwrap();
        f.status = Some(FleetStatus {
            modules: vec![stale_entry("old")],
            ..Default::default()
        });

        assert!(runner.sync_module_status(&mut f, &modules).await);
        let names: Vec<_> = f.module_statuses().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["old", "foo"]);

        cluster
            .remove::<Manifest>(&ObjectKey::new(NS, "kyma-1-old"))
            .await;
        assert!(runner.sync_module_status(&mut f, &modules).await);
        let names: Vec<_> = f.module_statuses().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["foo"]);
    }

    #[test_log::test(tokio::test)]
    async fn lookup_error_during_prune_keeps_entry() {
        let cluster = MemoryCluster::new();
        cluster.fail_get("kyma-1-old").await;
        let mut f = fleet("kyma-1", None, vec![]);
        f.status = Some(FleetStatus {
            modules: vec![stale_entry("old")],
            ..Default::default()
        });

        let runner = SyncRunner::new(&cluster, OPERATOR);
        assert!(!runner.sync_module_status(&mut f, &Vec::new()).await);
        assert_eq!(f.module_statuses().len(), 1);
        let missing =
            Reader::<Manifest>::get(&cluster, &ObjectKey::new(NS, "kyma-1-old")).await;
        assert!(missing.is_err());
    }
}
