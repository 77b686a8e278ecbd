//! Scheduled block and fluid ticks. A chunk holds its ticks in a local scheduler while
//! not ticked by the world, and forwards to the world scheduler once promoted.

use std::collections::{BTreeSet, HashSet};
use std::cmp::Ordering;
use std::hash::Hash;

use glam::IVec3;

use crate::geom::ChunkPos;


/// Priority of a scheduled tick, lower values are ticked first when scheduled for the
/// same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TickPriority(pub i8);

impl TickPriority {
    pub const EXTREMELY_HIGH: Self = Self(-3);
    pub const HIGH: Self = Self(-1);
    pub const NORMAL: Self = Self(0);
    pub const LOW: Self = Self(1);
}

/// A tick position and target, a target is scheduled at most once at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduledTickState<T> {
    /// Position of the block to tick.
    pub pos: IVec3,
    /// The expected block or fluid, if it's no longer there when triggered the tick
    /// should be ignored.
    pub target: T,
}

/// A tick scheduled at a world time.
#[derive(Debug, Clone, Eq)]
pub struct ScheduledTick<T> {
    /// This tick unique id within its scheduler.
    uid: u64,
    /// The world time to trigger the tick.
    pub time: u64,
    pub priority: TickPriority,
    pub state: ScheduledTickState<T>,
}

impl<T: Eq> PartialEq for ScheduledTick<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && self.time == other.time
    }
}

impl<T: Eq> PartialOrd for ScheduledTick<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

impl<T: Eq> Ord for ScheduledTick<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
            .then(self.priority.cmp(&other.priority))
            .then(self.uid.cmp(&other.uid))
    }
}


/// The world scheduler, ordered by trigger time.
#[derive(Debug)]
pub struct WorldTickScheduler<T> {
    ticks: BTreeSet<ScheduledTick<T>>,
    states: HashSet<ScheduledTickState<T>>,
    next_uid: u64,
}

impl<T> Default for WorldTickScheduler<T> {
    fn default() -> Self {
        Self { ticks: BTreeSet::new(), states: HashSet::new(), next_uid: 0 }
    }
}

impl<T: Copy + Eq + Hash> WorldTickScheduler<T> {

    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a tick at the given world time, return false if this target is already
    /// scheduled at that position.
    pub fn schedule(&mut self, pos: IVec3, target: T, time: u64, priority: TickPriority) -> bool {

        let state = ScheduledTickState { pos, target };
        if !self.states.insert(state) {
            return false;
        }

        let uid = self.next_uid;
        self.next_uid = self.next_uid.checked_add(1).expect("scheduled ticks count overflow");
        self.ticks.insert(ScheduledTick { uid, time, priority, state });
        true

    }

    #[inline]
    pub fn is_scheduled(&self, pos: IVec3, target: T) -> bool {
        self.states.contains(&ScheduledTickState { pos, target })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Pop the next tick if it should be triggered at the given time.
    pub fn pop_due(&mut self, time: u64) -> Option<ScheduledTick<T>> {
        debug_assert_eq!(self.ticks.len(), self.states.len());
        if self.ticks.first()?.time > time {
            return None;
        }
        let tick = self.ticks.pop_first()?;
        let removed = self.states.remove(&tick.state);
        debug_assert!(removed, "scheduled tick state missing");
        Some(tick)
    }

    /// Remove and return every tick located in the given chunk, in trigger order.
    pub fn drain_chunk(&mut self, chunk: ChunkPos) -> Vec<ScheduledTick<T>> {
        let drained = self.ticks.iter()
            .filter(|tick| chunk.contains(tick.state.pos))
            .cloned()
            .collect::<Vec<_>>();
        for tick in &drained {
            self.ticks.remove(tick);
            self.states.remove(&tick.state);
        }
        drained
    }

}


/// A tick held by a chunk scheduler, with a delay relative to the time of promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTick<T> {
    pub state: ScheduledTickState<T>,
    pub delay: u64,
    pub priority: TickPriority,
}

/// A chunk-local scheduler, used while the chunk is not ticked by the world.
#[derive(Debug, Clone)]
pub struct ChunkTickScheduler<T> {
    ticks: Vec<LocalTick<T>>,
    states: HashSet<ScheduledTickState<T>>,
}

impl<T> Default for ChunkTickScheduler<T> {
    fn default() -> Self {
        Self { ticks: Vec::new(), states: HashSet::new() }
    }
}

impl<T: Copy + Eq + Hash> ChunkTickScheduler<T> {

    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a tick after the given delay, return false if already scheduled.
    pub fn schedule(&mut self, pos: IVec3, target: T, delay: u64, priority: TickPriority) -> bool {
        let state = ScheduledTickState { pos, target };
        if !self.states.insert(state) {
            return false;
        }
        self.ticks.push(LocalTick { state, delay, priority });
        true
    }

    #[inline]
    pub fn is_scheduled(&self, pos: IVec3, target: T) -> bool {
        self.states.contains(&ScheduledTickState { pos, target })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalTick<T>> + '_ {
        self.ticks.iter()
    }

    /// Move every tick into the world scheduler, delays are added to the given time.
    pub fn drain_into(&mut self, world: &mut WorldTickScheduler<T>, time: u64) {
        self.states.clear();
        for tick in self.ticks.drain(..) {
            world.schedule(tick.state.pos, tick.state.target, time + tick.delay, tick.priority);
        }
    }

    /// Build a chunk scheduler from world ticks, keeping their remaining delay.
    pub fn from_world_ticks(ticks: Vec<ScheduledTick<T>>, time: u64) -> Self {
        let mut scheduler = Self::new();
        for tick in ticks {
            scheduler.schedule(tick.state.pos, tick.state.target, tick.time.saturating_sub(time), tick.priority);
        }
        scheduler
    }

}


/// The scheduler slot of a chunk.
#[derive(Debug, Clone)]
pub enum TickSchedulerSlot<T> {
    /// Ticks are held by the chunk.
    Local(ChunkTickScheduler<T>),
    /// Ticks are forwarded to the world scheduler.
    Global,
}

impl<T> Default for TickSchedulerSlot<T> {
    fn default() -> Self {
        Self::Local(ChunkTickScheduler::default())
    }
}

impl<T: Copy + Eq + Hash> TickSchedulerSlot<T> {

    #[inline]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    #[inline]
    pub fn local(&self) -> Option<&ChunkTickScheduler<T>> {
        match self {
            Self::Local(scheduler) => Some(scheduler),
            Self::Global => None,
        }
    }

    /// Drain the local scheduler into the world one and become global, nothing is done
    /// if already global. Return true if the slot changed.
    pub fn promote(&mut self, world: &mut WorldTickScheduler<T>, time: u64) -> bool {
        match std::mem::replace(self, Self::Global) {
            Self::Local(mut scheduler) => {
                scheduler.drain_into(world, time);
                true
            }
            Self::Global => false,
        }
    }

    /// Take back the ticks of the given chunk from the world scheduler into a new local
    /// scheduler, nothing is done if already local. Return true if the slot changed.
    pub fn demote(&mut self, world: &mut WorldTickScheduler<T>, chunk: ChunkPos, time: u64) -> bool {
        if let Self::Global = self {
            *self = Self::Local(ChunkTickScheduler::from_world_ticks(world.drain_chunk(chunk), time));
            true
        } else {
            false
        }
    }

    /// Schedule a tick, either locally or directly in the world scheduler.
    pub fn schedule(&mut self, world: &mut WorldTickScheduler<T>, pos: IVec3, target: T, delay: u64, time: u64, priority: TickPriority) -> bool {
        match self {
            Self::Local(scheduler) => scheduler.schedule(pos, target, delay, priority),
            Self::Global => world.schedule(pos, target, time + delay, priority),
        }
    }

    /// Return true if the target is scheduled at that position.
    pub fn is_scheduled(&self, world: &WorldTickScheduler<T>, pos: IVec3, target: T) -> bool {
        match self {
            Self::Local(scheduler) => scheduler.is_scheduled(pos, target),
            Self::Global => world.is_scheduled(pos, target),
        }
    }

}
