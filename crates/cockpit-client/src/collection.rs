use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::types::{Entity, EventKind, MutationEvent};

/// Ordered, id-unique set of entities, newest at the head.
///
/// All mutation goes through this API so the two invariants hold in one
/// place: no duplicate ids, and order follows creation except where an
/// update changed a field in place.
///
/// Entities are held behind `Arc` so a snapshot shares them instead of
/// copying; an update copies only the entity it touches.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    items: VecDeque<Arc<E>>,
    ids: HashSet<String>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            ids: HashSet::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a newest-first page.
    pub fn seed(&mut self, page: Vec<E>) {
        self.items.clear();
        self.ids.clear();
        self.append_page(page);
    }

    /// Insert at the head unless the id is already present.
    pub fn insert_if_absent(&mut self, entity: E) -> bool {
        if !self.ids.insert(entity.id().to_owned()) {
            return false;
        }
        self.items.push_front(Arc::new(entity));
        true
    }

    /// Merge the mutable fields of `update` into the entity with the same
    /// id, keeping its position. Unknown ids are ignored.
    pub fn update_by_id(&mut self, update: &E) -> bool {
        match self.items.iter_mut().find(|e| e.id() == update.id()) {
            Some(existing) => {
                Arc::make_mut(existing).apply_update(update);
                true
            }
            None => false,
        }
    }

    pub fn remove_by_id(&mut self, id: &str) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.items.retain(|e| e.id() != id);
        true
    }

    /// Append an older page at the tail, skipping ids already loaded.
    /// Returns how many entities were added.
    pub fn append_page(&mut self, page: Vec<E>) -> usize {
        let mut added = 0;
        for entity in page {
            if self.ids.insert(entity.id().to_owned()) {
                self.items.push_back(Arc::new(entity));
                added += 1;
            }
        }
        added
    }

    /// Apply one live event under the merge policy. Returns `true` if the
    /// collection changed.
    pub fn apply(&mut self, event: MutationEvent<E>) -> bool {
        match event.kind {
            EventKind::Create => self.insert_if_absent(event.entity),
            EventKind::Update => self.update_by_id(&event.entity),
            EventKind::Delete => self.remove_by_id(event.entity.id()),
        }
    }

    /// Id of the oldest loaded entity: the `before` cursor for the next page.
    pub fn tail_cursor(&self) -> Option<&str> {
        self.items.back().map(|e| e.id())
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        if !self.ids.contains(id) {
            return None;
        }
        self.items.iter().find(|e| e.id() == id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &E> {
        self.items.iter().map(Arc::as_ref)
    }

    /// Newest-first handles to the current entities. Cost is one reference
    /// count bump per entity; nothing is deep-copied.
    pub fn shared(&self) -> Arc<[Arc<E>]> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Command, CommandStatus};
    use chrono::{TimeZone, Utc};

    fn cmd(id: &str) -> Command {
        Command {
            id: id.into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            command: format!("echo {id}"),
            status: CommandStatus::Idle,
        }
    }

    fn with_status(id: &str, status: CommandStatus) -> Command {
        Command { status, ..cmd(id) }
    }

    fn ids(c: &Collection<Command>) -> Vec<&str> {
        c.iter().map(|e| e.id.as_str()).collect()
    }

    fn abc() -> Collection<Command> {
        let mut c = Collection::new();
        c.seed(vec![cmd("C"), cmd("B"), cmd("A")]);
        c
    }

    #[test]
    fn create_inserts_at_head() {
        let mut c = abc();
        assert!(c.apply(MutationEvent::create(cmd("D"))));
        assert_eq!(ids(&c), ["D", "C", "B", "A"]);
    }

    #[test]
    fn duplicate_create_is_idempotent() {
        let mut once = abc();
        once.apply(MutationEvent::create(cmd("D")));

        let mut twice = abc();
        twice.apply(MutationEvent::create(cmd("D")));
        assert!(!twice.apply(MutationEvent::create(cmd("D"))));

        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(twice.len(), 4);
    }

    #[test]
    fn create_for_seeded_id_is_noop() {
        let mut c = abc();
        assert!(!c.apply(MutationEvent::create(with_status("B", CommandStatus::Running))));
        assert_eq!(ids(&c), ["C", "B", "A"]);
        assert_eq!(c.get("B").unwrap().status, CommandStatus::Idle);
    }

    #[test]
    fn update_changes_status_in_place() {
        let mut c = abc();
        let mut update = with_status("B", CommandStatus::Exited);
        update.command = "something else".into();
        assert!(c.apply(MutationEvent::update(update)));

        assert_eq!(ids(&c), ["C", "B", "A"]);
        let b = c.get("B").unwrap();
        assert_eq!(b.status, CommandStatus::Exited);
        assert_eq!(b.command, "echo B");
        assert_eq!(c.get("A").unwrap().status, CommandStatus::Idle);
        assert_eq!(c.get("C").unwrap().status, CommandStatus::Idle);
    }

    #[test]
    fn update_or_delete_for_unknown_id_is_noop() {
        let mut c = abc();
        assert!(!c.apply(MutationEvent::update(with_status("Z", CommandStatus::Running))));
        assert!(!c.apply(MutationEvent::delete(cmd("Z"))));
        assert_eq!(ids(&c), ["C", "B", "A"]);
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut c = abc();
        assert!(c.apply(MutationEvent::delete(cmd("B"))));
        assert_eq!(ids(&c), ["C", "A"]);
        assert!(!c.apply(MutationEvent::delete(cmd("B"))));
        assert_eq!(ids(&c), ["C", "A"]);
        assert!(!c.contains("B"));
    }

    #[test]
    fn deleted_id_can_be_created_again() {
        let mut c = abc();
        c.apply(MutationEvent::delete(cmd("B")));
        assert!(c.apply(MutationEvent::create(cmd("B"))));
        assert_eq!(ids(&c), ["B", "C", "A"]);
    }

    #[test]
    fn append_page_skips_loaded_ids() {
        let mut c = abc();
        let added = c.append_page(vec![cmd("A"), cmd("9"), cmd("8")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&c), ["C", "B", "A", "9", "8"]);
    }

    #[test]
    fn tail_cursor_ignores_head_inserts() {
        let mut c = abc();
        assert_eq!(c.tail_cursor(), Some("A"));
        c.apply(MutationEvent::create(cmd("D")));
        c.apply(MutationEvent::create(cmd("E")));
        assert_eq!(c.tail_cursor(), Some("A"));
    }

    #[test]
    fn seed_replaces_and_dedups() {
        let mut c = abc();
        c.seed(vec![cmd("X"), cmd("X"), cmd("Y")]);
        assert_eq!(ids(&c), ["X", "Y"]);
        assert_eq!(Collection::<Command>::new().tail_cursor(), None);
    }

    #[test]
    fn shared_view_is_not_touched_by_later_updates() {
        let mut c = abc();
        let before = c.shared();
        c.apply(MutationEvent::update(with_status("B", CommandStatus::Running)));
        let after = c.shared();

        assert_eq!(before[1].status, CommandStatus::Idle);
        assert_eq!(after[1].status, CommandStatus::Running);
        assert!(Arc::ptr_eq(&before[0], &after[0]));
        assert!(!Arc::ptr_eq(&before[1], &after[1]));
    }
}
