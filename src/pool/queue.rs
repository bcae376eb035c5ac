//! Task queue disciplines for the worker pool
//!
//! Two disciplines, fixed when the pool is built:
//!
//! - [`RingBuf`] — FIFO ring with power-of-two capacity. Push and pop are
//!   O(1); growth doubles the buffer and re-lays the live window.
//! - [`HeapBuf`] — binary max-heap ordered by a caller-supplied
//!   comparator. `cmp(a, b) == Greater` means `a` is dequeued before `b`.
//!   Tie order between equal tasks is unspecified.
//!
//! Neither structure does its own locking; the pool serialises access
//! under its queue mutex.

use std::cmp::Ordering;

/// Comparator deciding which of two tasks leaves the queue first.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Smallest ring allocation; keeps early growth churn off tiny queues.
const MIN_RING_CAPACITY: usize = 8;

/// FIFO ring buffer with power-of-two capacity
pub struct RingBuf<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuf<T> {
    /// Create a ring able to hold at least `capacity` tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = capacity
            .max(MIN_RING_CAPACITY)
            .checked_next_power_of_two()
            .unwrap_or(MIN_RING_CAPACITY);
        let mut slots = Vec::with_capacity(cap);
        slots.resize_with(cap, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Append a task at the tail. The caller must have ensured (or grown
    /// past) a full ring.
    pub fn push(&mut self, task: T) {
        debug_assert!(!self.is_full());
        let tail = (self.head + self.len) & self.mask();
        self.slots[tail] = Some(task);
        self.len += 1;
    }

    /// Remove the task at the head, if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let task = self.slots[self.head].take();
        self.head = (self.head + 1) & self.mask();
        self.len -= 1;
        task
    }

    /// Double the capacity, re-laying the live window `(head + i) & mask`
    /// from index 0 of the fresh buffer. Fails when the doubled size would
    /// no longer be addressable.
    pub fn grow(&mut self) -> bool {
        let old_cap = self.slots.len();
        let Some(new_cap) = old_cap.checked_mul(2) else {
            return false;
        };
        if new_cap > isize::MAX as usize {
            return false;
        }
        let mut slots = Vec::with_capacity(new_cap);
        let mask = old_cap - 1;
        for i in 0..self.len {
            slots.push(self.slots[(self.head + i) & mask].take());
        }
        slots.resize_with(new_cap, || None);
        self.slots = slots;
        self.head = 0;
        true
    }
}

/// Binary max-heap ordered by a caller-supplied comparator
pub struct HeapBuf<T> {
    items: Vec<T>,
    cmp: Comparator<T>,
}

impl<T> HeapBuf<T> {
    pub fn new(cmp: Comparator<T>) -> Self {
        Self {
            items: Vec::new(),
            cmp,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a task, sifting it up from the end.
    pub fn push(&mut self, task: T) {
        self.items.push(task);
        let mut i = self.items.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if (self.cmp)(&self.items[i], &self.items[parent]) != Ordering::Greater {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    /// Extract the maximum: swap the root with the last element and sift
    /// the new root down toward the larger child.
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let task = self.items.pop();
        let n = self.items.len();
        let mut i = 0;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let mut largest = left;
            if right < n && (self.cmp)(&self.items[right], &self.items[left]) == Ordering::Greater
            {
                largest = right;
            }
            if (self.cmp)(&self.items[largest], &self.items[i]) != Ordering::Greater {
                break;
            }
            self.items.swap(i, largest);
            i = largest;
        }
        task
    }
}

/// A queue in one of the two disciplines
pub enum TaskQueue<T> {
    Fifo(RingBuf<T>),
    Heap(HeapBuf<T>),
}

impl<T> TaskQueue<T> {
    /// Build the discipline selected by `cmp`, pre-sized for bounded
    /// pools so a bounded FIFO never needs to grow.
    pub fn new(cmp: Option<Comparator<T>>, limit: Option<usize>) -> Self {
        match cmp {
            Some(cmp) => TaskQueue::Heap(HeapBuf::new(cmp)),
            None => TaskQueue::Fifo(RingBuf::with_capacity(limit.unwrap_or(0))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TaskQueue::Fifo(q) => q.len(),
            TaskQueue::Heap(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TaskQueue::Fifo(q) => q.is_empty(),
            TaskQueue::Heap(q) => q.is_empty(),
        }
    }

    /// Append a task, growing the backing store if needed. Returns the
    /// task when the store cannot grow any further.
    pub fn push(&mut self, task: T) -> Result<(), T> {
        match self {
            TaskQueue::Fifo(q) => {
                if q.is_full() && !q.grow() {
                    return Err(task);
                }
                q.push(task);
                Ok(())
            }
            TaskQueue::Heap(q) => {
                q.push(task);
                Ok(())
            }
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        match self {
            TaskQueue::Fifo(q) => q.pop(),
            TaskQueue::Heap(q) => q.pop(),
        }
    }
}
