use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::dto::queue_item::{ItemStatus, QueueItem};
use crate::dto::queue_snapshot::QueueSnapshot;

/// The ordered, mutable collection of admitted requests for one bar:
/// a pending list awaiting moderation, two playback lanes (priority drains
/// before standard), the currently playing item, and a bounded history of
/// finished items. Owned exclusively by the bar's worker.
#[derive(Debug)]
pub(crate) struct QueueStore {
    bar_id: String,
    pending: Vec<QueueItem>,
    priority: Vec<QueueItem>,
    standard: Vec<QueueItem>,
    current: Option<QueueItem>,
    history: VecDeque<(Instant, QueueItem)>,
    history_capacity: usize,
    history_max_age: Duration,
}

impl QueueStore {
    pub(crate) fn new(bar_id: String, history_capacity: usize, history_max_age: Duration) -> Self {
        Self {
            bar_id,
            pending: Vec::new(),
            priority: Vec::new(),
            standard: Vec::new(),
            current: None,
            history: VecDeque::new(),
            history_capacity,
            history_max_age,
        }
    }

    /// Rebuilds a store from a previously taken snapshot. Lane order and
    /// positions come straight from the snapshot; history ages restart.
    pub(crate) fn from_snapshot(
        snapshot: QueueSnapshot,
        history_capacity: usize,
        history_max_age: Duration,
    ) -> Self {
        let now = Instant::now();
        let mut store = Self::new(snapshot.bar_id, history_capacity, history_max_age);
        store.pending = snapshot.pending;
        store.priority = snapshot.priority;
        store.standard = snapshot.standard;
        store.current = snapshot.current;
        store.history = snapshot.history.into_iter().map(|item| (now, item)).collect();
        store.reindex();
        store
    }

    /// Replaces this store's contents with the snapshot's, keeping the
    /// configured history bounds.
    pub(crate) fn restore(&mut self, snapshot: QueueSnapshot) {
        *self = Self::from_snapshot(snapshot, self.history_capacity, self.history_max_age);
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            bar_id: self.bar_id.clone(),
            current: self.current.clone(),
            priority: self.priority.clone(),
            standard: self.standard.clone(),
            pending: self.pending.clone(),
            history: self.history.iter().map(|(_, item)| item.clone()).collect(),
        }
    }

    /// Everything admission has let in that has not yet played: pending
    /// items plus both lanes. Bounded by `maxQueueSize`.
    pub(crate) fn admitted_len(&self) -> usize {
        self.pending.len() + self.priority.len() + self.standard.len()
    }

    pub(crate) fn contains_track(&self, track_id: &str) -> bool {
        self.current
            .iter()
            .chain(&self.pending)
            .chain(&self.priority)
            .chain(&self.standard)
            .any(|item| item.track.track_id == track_id)
    }

    pub(crate) fn table_queued_count(&self, table_id: &str) -> usize {
        self.pending
            .iter()
            .chain(&self.priority)
            .chain(&self.standard)
            .filter(|item| item.table_id == table_id)
            .count()
    }

    /// Places a freshly admitted item into the pending list or its lane
    /// depending on its status, and returns it with its position assigned.
    /// Appending keeps positions dense without a full reindex.
    pub(crate) fn enqueue(&mut self, mut item: QueueItem) -> QueueItem {
        let list = match item.status {
            ItemStatus::Pending => &mut self.pending,
            _ => self.lane_mut(item.is_priority),
        };
        item.position = list.len();
        list.push(item.clone());
        debug!("enqueued item {} at bar {}", item.item_id, self.bar_id);
        item
    }

    /// Moves a pending item into its lane with `approved` status.
    pub(crate) fn approve(&mut self, item_id: &str) -> Option<QueueItem> {
        let index = self.pending.iter().position(|item| item.item_id == item_id)?;
        let mut item = self.pending.remove(index);
        item.status = ItemStatus::Approved;
        self.lane_mut(item.is_priority).push(item);
        self.reindex();
        self.find(item_id).cloned()
    }

    /// Moves a pending item straight to history with `rejected` status.
    pub(crate) fn reject(&mut self, item_id: &str) -> Option<QueueItem> {
        let index = self.pending.iter().position(|item| item.item_id == item_id)?;
        let mut item = self.pending.remove(index);
        item.status = ItemStatus::Rejected;
        self.reindex();
        self.push_history(item.clone());
        Some(item)
    }

    /// Drops an item from the pending list or either lane. Unknown ids are
    /// a no-op so duplicate admin actions stay idempotent.
    pub(crate) fn remove(&mut self, item_id: &str) -> Option<QueueItem> {
        let removed = Self::remove_from(&mut self.pending, item_id)
            .or_else(|| Self::remove_from(&mut self.priority, item_id))
            .or_else(|| Self::remove_from(&mut self.standard, item_id));
        if let Some(item) = &removed {
            self.reindex();
            debug!("removed item {} from bar {}", item.item_id, self.bar_id);
        }
        removed
    }

    fn remove_from(list: &mut Vec<QueueItem>, item_id: &str) -> Option<QueueItem> {
        let index = list.iter().position(|item| item.item_id == item_id)?;
        Some(list.remove(index))
    }

    /// Moves an item to the front of its lane; a pending item is approved
    /// on the way so there is a single path into `playing`. Returns false
    /// when the id is unknown.
    pub(crate) fn promote(&mut self, item_id: &str) -> bool {
        if let Some(index) = self.pending.iter().position(|item| item.item_id == item_id) {
            let mut item = self.pending.remove(index);
            item.status = ItemStatus::Approved;
            self.lane_mut(item.is_priority).insert(0, item);
            self.reindex();
            return true;
        }
        let promoted = Self::promote_in(&mut self.priority, item_id)
            || Self::promote_in(&mut self.standard, item_id);
        if promoted {
            self.reindex();
        }
        promoted
    }

    fn promote_in(lane: &mut Vec<QueueItem>, item_id: &str) -> bool {
        match lane.iter().position(|item| item.item_id == item_id) {
            Some(index) => {
                let item = lane.remove(index);
                lane.insert(0, item);
                true
            }
            None => false,
        }
    }

    /// The item the next `pop_next` would return, without removing it.
    pub(crate) fn peek_next(&self) -> Option<&QueueItem> {
        self.priority.first().or_else(|| self.standard.first())
    }

    /// Next item to play: strict priority first, FIFO within each lane.
    pub(crate) fn pop_next(&mut self) -> Option<QueueItem> {
        let item = if !self.priority.is_empty() {
            self.priority.remove(0)
        } else if !self.standard.is_empty() {
            self.standard.remove(0)
        } else {
            return None;
        };
        self.reindex();
        Some(item)
    }

    pub(crate) fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub(crate) fn set_current(&mut self, item: QueueItem) {
        self.current = Some(item);
    }

    pub(crate) fn take_current(&mut self) -> Option<QueueItem> {
        self.current.take()
    }

    pub(crate) fn push_history(&mut self, item: QueueItem) {
        self.history.push_back((Instant::now(), item));
        self.evict_history();
    }

    fn evict_history(&mut self) {
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
        while self
            .history
            .front()
            .is_some_and(|(added, _)| added.elapsed() > self.history_max_age)
        {
            self.history.pop_front();
        }
    }

    fn lane_mut(&mut self, is_priority: bool) -> &mut Vec<QueueItem> {
        if is_priority {
            &mut self.priority
        } else {
            &mut self.standard
        }
    }

    fn find(&self, item_id: &str) -> Option<&QueueItem> {
        self.pending
            .iter()
            .chain(&self.priority)
            .chain(&self.standard)
            .find(|item| item.item_id == item_id)
    }

    /// Positions are dense and zero-based within each list and recomputed
    /// after every mutation.
    fn reindex(&mut self) {
        for list in [&mut self.pending, &mut self.priority, &mut self.standard] {
            for (position, item) in list.iter_mut().enumerate() {
                item.position = position;
            }
        }
    }
}

#[cfg(test)]
#[path = "./store_test.rs"]
mod store_test;
