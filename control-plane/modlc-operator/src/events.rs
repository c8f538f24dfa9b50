use kube::runtime::events::EventType;

pub const REASON_MODULES_APPLIED: &str = "ModulesApplied";
pub const REASON_MODULE_APPLY_FAILED: &str = "ModuleApplyFailed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

impl From<EventKind> for EventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Normal => EventType::Normal,
            EventKind::Warning => EventType::Warning,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Normal => write!(f, "Normal"),
            EventKind::Warning => write!(f, "Warning"),
        }
    }
}
