use std::sync::Arc;

use crate::cache::QueryCache;
use crate::engine::EntityController;
use crate::notify::Notify;
use crate::prefs::PrefsHandle;
use crate::store::{DataService, EntityKind};

/// Process-wide handles, constructed once at startup and passed down
/// explicitly. The cache is the single shared mutable resource; every
/// controller borrows the same instance.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn DataService>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notify>,
    prefs: PrefsHandle,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn DataService>,
        notifier: Arc<dyn Notify>,
        prefs: PrefsHandle,
    ) -> Self {
        AppState {
            backend,
            cache: Arc::new(QueryCache::new()),
            notifier,
            prefs,
        }
    }

    pub fn backend(&self) -> &Arc<dyn DataService> {
        &self.backend
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn notifier(&self) -> &Arc<dyn Notify> {
        &self.notifier
    }

    pub fn prefs(&self) -> &PrefsHandle {
        &self.prefs
    }

    fn controller(&self, kind: EntityKind) -> EntityController {
        EntityController::new(
            kind,
            self.cache.clone(),
            self.backend.clone(),
            self.notifier.clone(),
        )
    }
}

macro_rules! gen_entity_controllers {
    ( $( $entity:ident ),+ $(,)? ) => {
        paste::paste! {
            impl AppState {
                $(
                    pub fn [<$entity _controller>](&self) -> EntityController {
                        self.controller(EntityKind::[<$entity:camel>])
                    }
                )+
            }
        }
    };
}

gen_entity_controllers!(budget, category, event, source, transaction);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::store::MemoryBackend;

    #[test]
    fn controllers_share_one_cache() {
        let state = AppState::new(
            Arc::new(MemoryBackend::new("user-1")),
            Arc::new(LogNotifier),
            PrefsHandle::in_memory(),
        );
        assert_eq!(state.budget_controller().kind(), EntityKind::Budget);
        assert_eq!(
            state.transaction_controller().kind(),
            EntityKind::Transaction
        );

        let cloned = state.clone();
        assert!(Arc::ptr_eq(state.cache(), cloned.cache()));
    }
}
