//! Undo/redo stacks, one pair per item family

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::domain::{Family, Item, ItemId};

/// Immutable copy of one item family at a point in time
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    items: Vec<Item>,
}

impl Snapshot {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

#[derive(Clone, Debug, Default)]
struct Stacks {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
}

fn push_capped(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, cap: usize) {
    stack.push_back(snapshot);
    while stack.len() > cap {
        stack.pop_front();
    }
}

/// Two independent undo histories: annotations and privacy strokes
#[derive(Clone, Debug)]
pub struct History {
    general: Stacks,
    privacy: Stacks,
    cap: usize,
    coalesce_window: Duration,
    last_coalesced: Option<(Family, ItemId, Instant)>,
}

impl History {
    pub fn new(cap: usize, coalesce_window: Duration) -> Self {
        Self {
            general: Stacks::default(),
            privacy: Stacks::default(),
            cap: cap.max(1),
            coalesce_window,
            last_coalesced: None,
        }
    }

    fn stacks(&mut self, family: Family) -> &mut Stacks {
        match family {
            Family::General => &mut self.general,
            Family::Privacy => &mut self.privacy,
        }
    }

    /// Store the state before an upcoming mutation and clear the redo stack
    pub fn push(&mut self, family: Family, snapshot: Snapshot) {
        let cap = self.cap;
        let stacks = self.stacks(family);
        push_capped(&mut stacks.undo, snapshot, cap);
        stacks.redo.clear();
        if self.last_coalesced.is_some_and(|(f, _, _)| f == family) {
            self.last_coalesced = None;
        }
    }

    /// Restore the previous state of `family`; `current` moves to the redo stack
    pub fn undo(&mut self, family: Family, current: Vec<Item>) -> Option<Vec<Item>> {
        let cap = self.cap;
        self.last_coalesced = None;
        let stacks = self.stacks(family);
        let previous = stacks.undo.pop_back()?;
        push_capped(&mut stacks.redo, Snapshot::new(current), cap);
        Some(previous.into_items())
    }

    /// Re-apply an undone state; `current` moves back to the undo stack
    pub fn redo(&mut self, family: Family, current: Vec<Item>) -> Option<Vec<Item>> {
        let cap = self.cap;
        self.last_coalesced = None;
        let stacks = self.stacks(family);
        let next = stacks.redo.pop_back()?;
        push_capped(&mut stacks.undo, Snapshot::new(current), cap);
        Some(next.into_items())
    }

    pub fn push_general(&mut self, items: Vec<Item>) {
        self.push(Family::General, Snapshot::new(items));
    }

    pub fn undo_general(&mut self, current: Vec<Item>) -> Option<Vec<Item>> {
        self.undo(Family::General, current)
    }

    pub fn redo_general(&mut self, current: Vec<Item>) -> Option<Vec<Item>> {
        self.redo(Family::General, current)
    }

    pub fn push_privacy(&mut self, items: Vec<Item>) {
        self.push(Family::Privacy, Snapshot::new(items));
    }

    pub fn undo_privacy(&mut self, current: Vec<Item>) -> Option<Vec<Item>> {
        self.undo(Family::Privacy, current)
    }

    pub fn redo_privacy(&mut self, current: Vec<Item>) -> Option<Vec<Item>> {
        self.redo(Family::Privacy, current)
    }

    /// Push for a continuous edit of `target` in `family`.
    ///
    /// A snapshot is pushed only when the target changed or the coalescing
    /// window has elapsed since the last push for it. Returns whether a
    /// snapshot was pushed.
    pub fn push_coalesced(
        &mut self,
        family: Family,
        items: Vec<Item>,
        target: ItemId,
        now: Instant,
    ) -> bool {
        if let Some((last_family, last_target, pushed_at)) = self.last_coalesced
            && last_family == family
            && last_target == target
            && now.saturating_duration_since(pushed_at) <= self.coalesce_window
        {
            return false;
        }
        self.push(family, Snapshot::new(items));
        self.last_coalesced = Some((family, target, now));
        true
    }

    /// Drop the most recent undo entry, used when the gesture it guarded was pruned
    pub fn discard_last(&mut self, family: Family) -> Option<Snapshot> {
        self.stacks(family).undo.pop_back()
    }

    pub fn can_undo(&self, family: Family) -> bool {
        match family {
            Family::General => !self.general.undo.is_empty(),
            Family::Privacy => !self.privacy.undo.is_empty(),
        }
    }

    pub fn can_redo(&self, family: Family) -> bool {
        match family {
            Family::General => !self.general.redo.is_empty(),
            Family::Privacy => !self.privacy.redo.is_empty(),
        }
    }

    pub fn undo_len(&self, family: Family) -> usize {
        match family {
            Family::General => self.general.undo.len(),
            Family::Privacy => self.privacy.undo.len(),
        }
    }

    /// Forget everything, used after crops and base-raster replacement
    pub fn clear(&mut self) {
        self.general = Stacks::default();
        self.privacy = Stacks::default();
        self.last_coalesced = None;
    }

    /// Clear only one family's stacks
    pub fn clear_family(&mut self, family: Family) {
        *self.stacks(family) = Stacks::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeColor;
    use crate::domain::{ItemKind, Point};

    fn item(id: u64) -> Item {
        Item::new(
            ItemId(id),
            Point::ZERO,
            ItemKind::FreeLine {
                points: vec![Point::ZERO, Point::new(3.0, 3.0)],
                color: ShapeColor::default(),
                width: 2.0,
            },
        )
    }

    fn history() -> History {
        History::new(20, Duration::from_millis(250))
    }

    #[test]
    fn undo_then_redo_restores_states() {
        let mut h = history();
        let before = vec![item(1)];
        let after = vec![item(1), item(2)];
        h.push_general(before.clone());
        assert_eq!(h.undo_general(after.clone()), Some(before.clone()));
        assert!(h.can_redo(Family::General));
        assert_eq!(h.redo_general(before), Some(after));
        assert!(!h.can_redo(Family::General));
    }

    #[test]
    fn push_clears_redo() {
        let mut h = history();
        h.push_general(Vec::new());
        h.undo_general(vec![item(1)]);
        h.push_general(Vec::new());
        assert!(!h.can_redo(Family::General));
    }

    #[test]
    fn families_are_independent() {
        let mut h = history();
        h.push_privacy(Vec::new());
        assert!(!h.can_undo(Family::General));
        assert!(h.undo_general(Vec::new()).is_none());
        assert!(h.undo_privacy(Vec::new()).is_some());
    }

    #[test]
    fn stacks_are_capped() {
        let mut h = History::new(3, Duration::from_millis(250));
        for i in 0..5 {
            h.push_general(vec![item(i)]);
        }
        assert_eq!(h.undo_len(Family::General), 3);
        let oldest_kept = (0..3)
            .filter_map(|_| h.undo_general(Vec::new()))
            .last()
            .unwrap();
        assert_eq!(oldest_kept[0].id, ItemId(2));
    }

    #[test]
    fn coalescing_window() {
        let mut h = history();
        let t0 = Instant::now();
        assert!(h.push_coalesced(Family::General, Vec::new(), ItemId(1), t0));
        assert!(!h.push_coalesced(Family::General, Vec::new(), ItemId(1), t0 + Duration::from_millis(200)));
        assert!(h.push_coalesced(Family::General, Vec::new(), ItemId(1), t0 + Duration::from_millis(300)));
        assert!(h.push_coalesced(Family::General, Vec::new(), ItemId(2), t0 + Duration::from_millis(310)));
        assert!(!h.push_coalesced(Family::General, Vec::new(), ItemId(2), t0 + Duration::from_millis(500)));
        assert_eq!(h.undo_len(Family::General), 3);
    }

    #[test]
    fn privacy_edits_coalesce_separately() {
        let mut h = history();
        let t0 = Instant::now();
        for ms in [0, 30, 60, 90, 120] {
            h.push_coalesced(Family::Privacy, Vec::new(), ItemId(4), t0 + Duration::from_millis(ms));
        }
        assert_eq!(h.undo_len(Family::Privacy), 1);
        assert!(h.push_coalesced(Family::General, Vec::new(), ItemId(4), t0 + Duration::from_millis(130)));
        assert_eq!(h.undo_len(Family::General), 1);
    }

    #[test]
    fn discard_and_clear() {
        let mut h = history();
        h.push_general(Vec::new());
        h.push_privacy(Vec::new());
        assert!(h.discard_last(Family::General).is_some());
        assert!(!h.can_undo(Family::General));
        h.clear();
        assert!(!h.can_undo(Family::Privacy));
    }
}
