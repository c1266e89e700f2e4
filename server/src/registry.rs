use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relay_shared::protocol::{PlayerWire, SessionId, TransformUpdate};

use crate::session::ClientSession;

/// Shared map of all live sessions, cloned into every connection task.
///
/// Writers are partitioned by connection id (each task only ever touches its
/// own entry), so the lock guards the map structure, not field-level access.
/// Guards are released before any await point.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<SessionId, ClientSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: SessionId, session: ClientSession) {
        self.inner.write().insert(id, session);
    }

    /// Merge a partial transform report into the given session. A no-op for
    /// ids no longer registered (the close path may have run concurrently).
    pub fn apply_update(&self, id: SessionId, update: TransformUpdate) {
        if let Some(session) = self.inner.write().get_mut(&id) {
            session.apply(update);
        }
    }

    pub fn set_name(&self, id: SessionId, name: String) {
        if let Some(session) = self.inner.write().get_mut(&id) {
            session.name = name;
        }
    }

    /// Remove a session. Idempotent; returns whether the id was present.
    pub fn remove(&self, id: SessionId) -> bool {
        self.inner.write().remove(&id).is_some()
    }

    /// Wire-ready copy of every current session, own entry included.
    pub fn snapshot(&self) -> HashMap<SessionId, PlayerWire> {
        self.inner
            .read()
            .iter()
            .map(|(id, session)| (*id, session.to_wire()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::vec3::Vec3;
    use uuid::Uuid;

    #[test]
    fn snapshot_keys_track_inserts_and_removes() {
        let registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.insert(a, ClientSession::default());
        registry.insert(b, ClientSession::default());
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key(&a));
        assert!(snapshot.contains_key(&b));

        registry.remove(a);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains_key(&a));
    }

    #[test]
    fn remove_absent_id_is_a_noop() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        assert!(!registry.remove(id));

        registry.insert(id, ClientSession::default());
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn update_for_removed_id_does_not_resurrect_it() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, ClientSession::default());
        registry.remove(id);

        registry.apply_update(
            id,
            TransformUpdate {
                position: Some(Vec3::new(1.0, 1.0, 1.0)),
                ..Default::default()
            },
        );
        registry.set_name(id, "ghost".to_string());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn partial_update_retains_other_fields() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, ClientSession::default());

        registry.apply_update(
            id,
            TransformUpdate {
                position: Some(Vec3::new(1.0, 2.0, 3.0)),
                ..Default::default()
            },
        );
        registry.apply_update(
            id,
            TransformUpdate {
                linear_velocity: Some(Vec3::new(0.5, 0.0, 0.0)),
                ..Default::default()
            },
        );

        let snapshot = registry.snapshot();
        let entry = snapshot.get(&id).unwrap();
        assert_eq!(entry.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(entry.linear_velocity, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn set_name_shows_up_in_snapshot() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(id, ClientSession::default());
        assert_eq!(registry.snapshot().get(&id).unwrap().name, None);

        registry.set_name(id, "Bob".to_string());
        assert_eq!(
            registry.snapshot().get(&id).unwrap().name.as_deref(),
            Some("Bob")
        );
    }
}
