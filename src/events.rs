//src/events.rs
use uuid::Uuid;

use crate::error::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

/// Describes one persisted change so callers can refresh whatever shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub id: Uuid,
    pub action: Action,
}

impl ChangeEvent {
    #[must_use]
    pub const fn created(kind: EntityKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            action: Action::Created,
        }
    }

    #[must_use]
    pub const fn updated(kind: EntityKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            action: Action::Updated,
        }
    }

    #[must_use]
    pub const fn deleted(kind: EntityKind, id: Uuid) -> Self {
        Self {
            kind,
            id,
            action: Action::Deleted,
        }
    }
}

/// The result of a write: the entity as stored plus the event describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub entity: T,
    pub event: ChangeEvent,
}

impl<T> Change<T> {
    pub const fn new(entity: T, event: ChangeEvent) -> Self {
        Self { entity, event }
    }

    pub fn into_entity(self) -> T {
        self.entity
    }
}
