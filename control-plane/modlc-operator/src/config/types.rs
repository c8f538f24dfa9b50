use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Identity expected in the managed-by label of templates. Also used as
    /// the apply field owner when a fleet carries no managed-by label.
    /// Env: MODLC_OPERATOR_NAME
    #[envconfig(from = "MODLC_OPERATOR_NAME", default = "lifecycle-manager")]
    pub operator_name: String,

    #[envconfig(nested)]
    pub sync: SyncConfig,

    #[envconfig(nested)]
    pub watch: WatchConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct SyncConfig {
    /// Maximum number of manifests applied at once. Unset or 0 keeps the
    /// default of one in-flight apply per module.
    /// Env: MODLC_SYNC_CONCURRENCY
    #[envconfig(from = "MODLC_SYNC_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Periodic re-check interval after a successful pass.
    /// Env: MODLC_REQUEUE_SECS
    #[envconfig(from = "MODLC_REQUEUE_SECS", default = "30")]
    pub requeue_secs: u64,

    /// Requeue delay after a failed pass.
    /// Env: MODLC_ERROR_REQUEUE_SECS
    #[envconfig(from = "MODLC_ERROR_REQUEUE_SECS", default = "10")]
    pub error_requeue_secs: u64,
}

#[derive(Envconfig, Clone, Debug)]
pub struct WatchConfig {
    /// Restrict all watches to a single namespace.
    /// Env: MODLC_WATCH_NAMESPACE
    #[envconfig(from = "MODLC_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Capacity of the channel carrying reconcile requests from the
    /// component and template watchers to the controller.
    /// Env: MODLC_REQUEST_BUFFER
    #[envconfig(from = "MODLC_REQUEST_BUFFER", default = "256")]
    pub request_buffer: usize,
}

impl OperatorConfig {
    /// Concurrency cap for the sync engine; `None` means unbounded.
    pub fn sync_limit(&self) -> Option<usize> {
        self.sync.concurrency.filter(|c| *c > 0)
    }

    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.sync.requeue_secs)
    }

    pub fn error_requeue_after(&self) -> Duration {
        Duration::from_secs(self.sync.error_requeue_secs)
    }

    /// Watch namespace with blank values treated as cluster-wide.
    pub fn watch_namespace(&self) -> Option<&str> {
        self.watch
            .namespace
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
    }

    pub fn request_buffer(&self) -> usize {
        self.watch.request_buffer.max(1)
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_name: "lifecycle-manager".to_string(),
            sync: SyncConfig {
                concurrency: None,
                requeue_secs: 30,
                error_requeue_secs: 10,
            },
            watch: WatchConfig {
                namespace: None,
                request_buffer: 256,
            },
        }
    }
}
