//! Idle queue with recycled slots.
//!
//! Idle resources live in a doubly linked list threaded through a slab of
//! slots. Slots that lose their payload are parked on a free-list and reused
//! by the next push, so steady-state traffic never allocates bookkeeping
//! nodes. Slots are only freed when the queue is dropped.
//!
//! Entries are pushed at the tail with a fresh timestamp, so the list is
//! always ordered by `created`, oldest at the head.

use std::time::Instant;

/// One slab slot: either linked into the queue (payload present) or on the
/// free-list (payload absent).
#[derive(Debug)]
struct Slot<T> {
    created: Instant,
    payload: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A payload removed from the queue together with the time it was queued.
#[derive(Debug)]
pub(crate) struct Idle<T> {
    pub(crate) payload: T,
    pub(crate) created: Instant,
}

#[derive(Debug)]
pub(crate) struct IdleQueue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> IdleQueue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Queued payloads.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Empty slots waiting on the free-list.
    pub(crate) fn spare(&self) -> usize {
        self.free.len()
    }

    /// Queue time of the oldest entry.
    pub(crate) fn front_created(&self) -> Option<Instant> {
        self.head.map(|i| self.slots[i].created)
    }

    /// Stamp `payload` with the current time and link it at the tail.
    pub(crate) fn push_back(&mut self, payload: T) {
        let index = self.container_pop();
        let slot = &mut self.slots[index];
        slot.created = Instant::now();
        slot.payload = Some(payload);
        slot.prev = self.tail;
        slot.next = None;

        match self.tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Unlink the oldest entry.
    pub(crate) fn pop_front(&mut self) -> Option<Idle<T>> {
        let index = self.head?;
        self.unlink(index);
        self.take(index)
    }

    /// Unlink the newest entry.
    pub(crate) fn pop_back(&mut self) -> Option<Idle<T>> {
        let index = self.tail?;
        self.unlink(index);
        self.take(index)
    }

    /// Remove every payload, oldest first. Slots stay on the free-list.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(idle) = self.pop_front() {
            out.push(idle.payload);
        }
        out
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let slot = &self.slots[index];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    fn take(&mut self, index: usize) -> Option<Idle<T>> {
        let slot = &mut self.slots[index];
        let payload = slot.payload.take();
        let created = slot.created;
        self.container_push(index);
        payload.map(|payload| Idle { payload, created })
    }

    /// Reuse a free slot, or grow the slab by one.
    fn container_pop(&mut self) -> usize {
        if let Some(index) = self.free.pop() {
            return index;
        }
        self.slots.push(Slot {
            created: Instant::now(),
            payload: None,
            prev: None,
            next: None,
        });
        self.slots.len() - 1
    }

    /// Return an emptied slot to the free-list.
    fn container_push(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        debug_assert!(slot.payload.is_none(), "free slot still holds a payload");
        slot.prev = None;
        slot.next = None;
        self.free.push(index);
    }
}
