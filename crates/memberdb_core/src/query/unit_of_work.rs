//! Per-transaction identity map.
//!
//! # Invariants
//! - Holds at most one copy per `(entity, id)`.
//! - Once an entity is loaded, later reads in the same unit of work return
//!   that copy, even if the row changed underneath (bulk updates). Callers
//!   call [`UnitOfWork::invalidate`], [`UnitOfWork::refresh`] or
//!   [`UnitOfWork::clear`] to observe fresh state.
//! - Single-threaded; create one per transaction.

use crate::model::entity::{uuid_value, Entity, EntityId, ID_COLUMN};
use crate::query::QueryResult;
use log::debug;
use rusqlite::{Connection, OptionalExtension};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

type IdentityKey = (&'static str, EntityId);

#[derive(Default)]
pub struct UnitOfWork {
    entries: RefCell<HashMap<IdentityKey, Box<dyn Any>>>,
}

impl Debug for UnitOfWork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("entries", &self.len())
            .finish()
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entity` as the managed copy, replacing any previous one.
    pub fn attach<E: Entity>(&self, entity: &E) {
        self.entries
            .borrow_mut()
            .insert((E::NAME, entity.id()), Box::new(entity.clone()));
    }

    pub fn get<E: Entity>(&self, id: EntityId) -> Option<E> {
        self.entries
            .borrow()
            .get(&(E::NAME, id))
            .and_then(|entry| entry.downcast_ref::<E>())
            .cloned()
    }

    pub fn contains<E: Entity>(&self, id: EntityId) -> bool {
        self.entries.borrow().contains_key(&(E::NAME, id))
    }

    /// Returns the managed copy of `loaded` if one exists, otherwise starts
    /// managing `loaded` and returns it.
    pub fn merge_loaded<E: Entity>(&self, loaded: E) -> E {
        if let Some(managed) = self.get::<E>(loaded.id()) {
            return managed;
        }
        self.attach(&loaded);
        loaded
    }

    /// Forgets one entity. Returns whether it was managed.
    pub fn invalidate<E: Entity>(&self, id: EntityId) -> bool {
        let removed = self.entries.borrow_mut().remove(&(E::NAME, id)).is_some();
        if removed {
            debug!(
                "event=uow_invalidate module=query entity={} count=1",
                E::NAME
            );
        }
        removed
    }

    /// Forgets every managed `E` matching `predicate`. Returns the count.
    pub fn invalidate_where<E: Entity>(&self, predicate: impl Fn(&E) -> bool) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entity, _), value| {
            *entity != E::NAME || !value.downcast_ref::<E>().is_some_and(&predicate)
        });
        let removed = before - entries.len();
        if removed > 0 {
            debug!(
                "event=uow_invalidate module=query entity={} count={removed}",
                E::NAME
            );
        }
        removed
    }

    /// Reloads one entity from the store and replaces the managed copy.
    ///
    /// Returns `None` (and forgets the entity) when the row no longer exists.
    pub fn refresh<E: Entity>(&self, conn: &Connection, id: EntityId) -> QueryResult<Option<E>> {
        let fresh = load_by_id::<E>(conn, id)?;

        match &fresh {
            Some(entity) => self.attach(entity),
            None => {
                self.invalidate::<E>(id);
            }
        }
        Ok(fresh)
    }

    /// Detaches everything.
    pub fn clear(&self) {
        let cleared = {
            let mut entries = self.entries.borrow_mut();
            let count = entries.len();
            entries.clear();
            count
        };
        debug!("event=uow_clear module=query status=ok cleared={cleared}");
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Lookup of the stored row for `id`, bypassing the unit of work.
pub(crate) fn load_by_id<E: Entity>(conn: &Connection, id: EntityId) -> QueryResult<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {ID_COLUMN} = ?1",
        E::select_list(),
        E::TABLE
    );
    let mut stmt = conn.prepare(&sql)?;
    let loaded = stmt
        .query_row([uuid_value(id)], |row| Ok(E::map_row(row)))
        .optional()?;
    loaded.transpose()
}

#[cfg(test)]
mod tests {
    use super::UnitOfWork;
    use crate::model::member::Member;
    use crate::model::team::Team;

    #[test]
    fn merge_prefers_the_managed_copy() {
        let uow = UnitOfWork::new();
        let original = Member::with_age("member5", 40);
        uow.attach(&original);

        let mut reloaded = original.clone();
        reloaded.age = 41;
        assert_eq!(uow.merge_loaded(reloaded).age, 40);

        assert!(uow.invalidate::<Member>(original.id()));
        let mut reloaded = original.clone();
        reloaded.age = 41;
        assert_eq!(uow.merge_loaded(reloaded).age, 41);
    }

    #[test]
    fn identity_is_scoped_by_entity_type() {
        let uow = UnitOfWork::new();
        let member = Member::new("AAA");
        let team = Team::with_id(member.id(), "same id");
        uow.attach(&member);
        uow.attach(&team);

        assert_eq!(uow.len(), 2);
        assert!(uow.get::<Team>(member.id()).is_some());
        assert!(uow.get::<Member>(member.id()).is_some());
    }

    #[test]
    fn invalidate_where_only_touches_matching_entities() {
        let uow = UnitOfWork::new();
        let team = Team::new("teamA");
        let in_team = Member::with_team("AAA", 10, &team);
        let solo = Member::with_age("BBB", 20);
        uow.attach(&team);
        uow.attach(&in_team);
        uow.attach(&solo);

        let removed = uow.invalidate_where::<Member>(|m| m.team_id == Some(team.id()));
        assert_eq!(removed, 1);
        assert!(uow.contains::<Team>(team.id()));
        assert!(uow.contains::<Member>(solo.id()));
        assert!(!uow.contains::<Member>(in_team.id()));

        uow.clear();
        assert!(uow.is_empty());
    }
}
