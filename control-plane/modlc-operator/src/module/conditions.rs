use chrono::Utc;

use super::Modules;
use crate::crd::{
    Condition, ConditionStatus, ConditionType, Fleet, ModuleStatus, State,
};

/// Fleet state derived from its module entries.
pub fn aggregate_state(modules: &[ModuleStatus]) -> State {
    if modules.iter().any(|m| m.state == State::Error) {
        State::Error
    } else if modules.iter().all(|m| m.state == State::Ready) {
        State::Ready
    } else {
        State::Processing
    }
}

/// Records one `Ready` condition per module carrying the template snapshot
/// it was applied from, and refreshes the aggregate fleet state. Returns
/// whether anything besides transition timestamps changed.
pub fn update_template_conditions(fleet: &mut Fleet, modules: &Modules) -> bool {
    let generation = fleet.metadata.generation;
    let status = fleet.status.get_or_insert_with(Default::default);
    let now = Utc::now().to_rfc3339();

    let conditions: Vec<Condition> = modules
        .iter()
        .map(|module| {
            let state = module.manifest.state();
            let cond_status = if state == State::Ready {
                ConditionStatus::True
            } else {
                ConditionStatus::False
            };
            let previous = status
                .conditions
                .iter()
                .find(|c| c.reason == module.name);
            let last_transition_time = match previous {
                Some(p) if p.status == cond_status => {
                    p.last_transition_time.clone()
                }
                _ => Some(now.clone()),
            };
            Condition {
                type_: ConditionType::Ready,
                status: cond_status,
                reason: module.name.clone(),
                message: Some(format!("module {} is {state}", module.name)),
                template_info: module.template_info(),
                last_transition_time,
            }
        })
        .collect();

    let state = aggregate_state(&status.modules);
    let changed = !same_ignoring_time(&status.conditions, &conditions)
        || status.state.as_ref() != Some(&state)
        || status.observed_generation != generation;

    status.conditions = conditions;
    status.state = Some(state);
    status.observed_generation = generation;
    changed
}

fn same_ignoring_time(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.type_ == y.type_
                && x.status == y.status
                && x.reason == y.reason
                && x.message == y.message
                && x.template_info == y.template_info
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ManifestRef, ManifestStatus, TemplateInfo};
    use crate::module::Module;
    use crate::release::TemplateInChannel;
    use crate::testing::{fleet, module, template};

    fn entry(name: &str, state: State) -> ModuleStatus {
        ModuleStatus {
            name: name.into(),
            fqdn: String::new(),
            manifest: ManifestRef {
                name: name.into(),
                namespace: "kcp-system".into(),
                generation: 1,
            },
            template: TemplateInfo::default(),
            state,
        }
    }

    #[test]
    fn aggregate_prefers_error_then_requires_all_ready() {
        assert_eq!(
            aggregate_state(&[entry("a", State::Ready), entry("b", State::Error)]),
            State::Error
        );
        assert_eq!(
            aggregate_state(&[entry("a", State::Ready), entry("b", State::Ready)]),
            State::Ready
        );
        assert_eq!(
            aggregate_state(&[entry("a", State::Ready), entry("b", State::Processing)]),
            State::Processing
        );
        assert_eq!(aggregate_state(&[]), State::Ready);
    }

    fn ready_module(f: &Fleet) -> Module {
        let mut m = Module::from_template(
            f,
            "foo",
            TemplateInChannel {
                template: template("foo-regular", "foo", "regular"),
                channel: "regular".into(),
                outdated: false,
            },
        );
        m.manifest.status = Some(ManifestStatus {
            state: Some(State::Ready.to_string()),
            message: None,
        });
        m
    }

    #[test]
    fn conditions_snapshot_template_and_settle() {
        let mut f = fleet("kyma-1", None, vec![module("foo", None)]);
        let modules = vec![ready_module(&f)];
        f.status = Some(Default::default());
        f.status.as_mut().unwrap().modules = modules.iter().map(Module::status).collect();

        assert!(update_template_conditions(&mut f, &modules));
        let status = f.status.as_ref().unwrap();
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].reason, "foo");
        assert_eq!(status.conditions[0].status, ConditionStatus::True);
        assert_eq!(status.conditions[0].template_info.name, "foo-regular");
        assert_eq!(status.conditions[0].template_info.generation, 1);
        assert_eq!(status.state, Some(State::Ready));
        let stamped = status.conditions[0].last_transition_time.clone();

        assert!(!update_template_conditions(&mut f, &modules));
        assert_eq!(
            f.status.as_ref().unwrap().conditions[0].last_transition_time,
            stamped
        );
    }
}
