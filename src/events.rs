//! Hardware notifications and the AC-OK notifier chain.

use heapless::Vec;

/// Delay between an AC-OK notification and the over-voltage check it triggers.
pub const ACOK_DEBOUNCE_MS: u32 = 100;

/// Work handed to the charger worker.
///
/// Over-voltage work carries the work generation it was raised in. Suspend starts a new
/// generation, which cancels everything raised before it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Event {
    /// External AC-OK change. Debounced, then checks over-voltage.
    AcOk {
        /// Work generation when raised.
        generation: u32,
    },
    /// Over-voltage interrupt.
    Ovp {
        /// Work generation when raised.
        generation: u32,
    },
    /// Battery detect interrupt.
    BatteryDetect,
}

/// The kinds of work the worker handles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum EventKind {
    /// See [`Event::AcOk`].
    AcOk,
    /// See [`Event::Ovp`].
    Ovp,
    /// See [`Event::BatteryDetect`].
    BatteryDetect,
}

impl EventKind {
    const ALL: [EventKind; 3] = [EventKind::AcOk, EventKind::Ovp, EventKind::BatteryDetect];

    const fn index(self) -> usize {
        self as usize
    }

    const fn event(self, generation: u32) -> Event {
        match self {
            EventKind::AcOk => Event::AcOk { generation },
            EventKind::Ovp => Event::Ovp { generation },
            EventKind::BatteryDetect => Event::BatteryDetect,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Slot {
    order: u32,
    generation: u32,
}

/// Work raised but not yet picked up, at most one entry per [`EventKind`].
///
/// Raising a kind that is already pending does nothing, so a burst of one kind cannot crowd out
/// another. Entries come out in the order they were first raised.
#[derive(Debug, Default)]
pub struct WorkQueue {
    slots: [Option<Slot>; 3],
    next_order: u32,
    generation: u32,
}

impl WorkQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        WorkQueue {
            slots: [None; 3],
            next_order: 0,
            generation: 0,
        }
    }

    /// Current work generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Mark `kind` pending. Returns `false` if it already was.
    pub fn raise(&mut self, kind: EventKind) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(Slot {
            order: self.next_order,
            generation: self.generation,
        });
        self.next_order = self.next_order.wrapping_add(1);
        true
    }

    /// Remove and return the oldest pending work.
    pub fn take(&mut self) -> Option<Event> {
        let next_order = self.next_order;
        let kind = EventKind::ALL
            .into_iter()
            .filter_map(|kind| self.slots[kind.index()].map(|slot| (kind, slot)))
            .max_by_key(|(_, slot)| next_order.wrapping_sub(slot.order))
            .map(|(kind, _)| kind)?;
        let slot = self.slots[kind.index()].take()?;
        Some(kind.event(slot.generation))
    }

    /// Start a new generation and drop pending over-voltage work. Battery detection stays queued.
    pub fn cancel_ovp_work(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.slots[EventKind::AcOk.index()] = None;
        self.slots[EventKind::Ovp.index()] = None;
    }
}

/// Something that wants to hear about AC-OK changes.
pub trait AcOkSubscriber {
    /// Called synchronously from [`NotifierChain::call_chain`]. Must not block.
    fn on_ac_ok(&self);
}

/// Handle returned by [`NotifierChain::register`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SubscriptionId(u8);

/// Fixed-capacity list of AC-OK subscribers.
pub struct NotifierChain<'a, const N: usize> {
    subscribers: Vec<(SubscriptionId, &'a dyn AcOkSubscriber), N>,
    next_id: u8,
}

impl<'a, const N: usize> NotifierChain<'a, N> {
    /// Create an empty chain.
    pub const fn new() -> Self {
        NotifierChain {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a subscriber. Returns `None` when the chain is full.
    pub fn register(&mut self, subscriber: &'a dyn AcOkSubscriber) -> Option<SubscriptionId> {
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, subscriber)).ok()?;
        self.next_id = self.next_id.wrapping_add(1);
        Some(id)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Notify every subscriber in registration order. Returns how many were called.
    pub fn call_chain(&self) -> usize {
        for (_, subscriber) in &self.subscribers {
            subscriber.on_ac_ok();
        }
        self.subscribers.len()
    }
}

impl<'a, const N: usize> Default for NotifierChain<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}
