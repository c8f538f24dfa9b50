use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kube::core::DynamicObject;
use tokio::sync::RwLock;

use crate::client::ObjectKey;

#[derive(Default)]
struct Entries {
    objects: HashMap<ObjectKey, DynamicObject>,
    // keys seen since the current re-list started
    relisted: Option<HashSet<ObjectKey>>,
}

/// Last observed version of every watched component, so that an update can
/// be compared against its predecessor.
#[derive(Clone, Default)]
pub struct LastSeenCache(Arc<RwLock<Entries>>);

impl LastSeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `obj` and returns the version it replaced.
    pub async fn upsert(
        &self,
        key: ObjectKey,
        obj: DynamicObject,
    ) -> Option<DynamicObject> {
        let mut w = self.0.write().await;
        if let Some(seen) = w.relisted.as_mut() {
            seen.insert(key.clone());
        }
        w.objects.insert(key, obj)
    }

    pub async fn remove(&self, key: &ObjectKey) {
        let mut w = self.0.write().await;
        w.objects.remove(key);
    }

    /// Starts tracking which entries a watch re-list still reports.
    pub async fn begin_relist(&self) {
        self.0.write().await.relisted = Some(HashSet::new());
    }

    /// Drops entries the re-list did not report, i.e. objects deleted while
    /// the watch was down. Returns how many were dropped.
    pub async fn finish_relist(&self) -> usize {
        let mut w = self.0.write().await;
        let Some(seen) = w.relisted.take() else {
            return 0;
        };
        let before = w.objects.len();
        w.objects.retain(|key, _| seen.contains(key));
        before - w.objects.len()
    }

    pub async fn len(&self) -> usize {
        self.0.read().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.read().await.objects.is_empty()
    }
}
