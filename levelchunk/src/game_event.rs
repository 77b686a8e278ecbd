//! Positional game events and their per-section dispatchers.

use std::collections::HashMap;

use arcstr::ArcStr;
use glam::IVec3;


/// A game event emitted at a position, such as a block being placed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameEvent {
    id: ArcStr,
    /// Distance, in blocks, around the emitter where dispatchers are searched.
    range: u32,
}

impl GameEvent {

    #[inline]
    pub const fn new(id: ArcStr, range: u32) -> Self {
        Self { id, range }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn range(&self) -> u32 {
        self.range
    }

}

/// A listener of game events, attached to a block entity position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEventListener {
    /// Position of the listener, also used as its identity.
    pub source: IVec3,
    /// Maximum distance, in blocks, at which events are received.
    pub range: u32,
}

impl GameEventListener {

    /// Return true if an event emitted at the given position reaches this listener.
    #[inline]
    pub fn accepts(&self, pos: IVec3) -> bool {
        let range = self.range as i64;
        let delta = (pos - self.source).as_i64vec3();
        delta.length_squared() <= range * range
    }

}


/// Dispatcher of events to the listeners of one section.
#[derive(Debug, Clone, Default)]
pub struct GameEventDispatcher {
    listeners: Vec<GameEventListener>,
}

impl GameEventDispatcher {

    /// Add a listener, replacing any listener with the same source.
    pub fn add_listener(&mut self, listener: GameEventListener) {
        match self.listeners.iter_mut().find(|l| l.source == listener.source) {
            Some(existing) => *existing = listener,
            None => self.listeners.push(listener),
        }
    }

    /// Remove the listener with the given source, return true if it was present.
    pub fn remove_listener(&mut self, source: IVec3) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|l| l.source != source);
        self.listeners.len() != len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners(&self) -> &[GameEventListener] {
        &self.listeners
    }

    /// Iterate over the listeners reached by an event emitted at the given position,
    /// it's up to the caller to deliver the event to their block entities.
    pub fn dispatch(&self, pos: IVec3) -> impl Iterator<Item = GameEventListener> + '_ {
        self.listeners.iter()
            .filter(move |l| l.accepts(pos))
            .copied()
    }

}


/// Index of dispatchers by section coordinate, dispatchers are created on first use
/// and evicted as soon as they become empty.
#[derive(Debug, Clone, Default)]
pub struct GameEventDispatchers {
    inner: HashMap<i32, GameEventDispatcher>,
}

impl GameEventDispatchers {

    pub fn new() -> Self {
        Self::default()
    }

    /// Get the dispatcher of a section, creating it if needed.
    pub fn get_or_create(&mut self, section_y: i32) -> &mut GameEventDispatcher {
        self.inner.entry(section_y).or_default()
    }

    #[inline]
    pub fn get(&self, section_y: i32) -> Option<&GameEventDispatcher> {
        self.inner.get(&section_y)
    }

    /// Remove a listener from the dispatcher of a section, evicting the dispatcher if
    /// it becomes empty. No dispatcher is created.
    pub fn remove_listener(&mut self, section_y: i32, source: IVec3) -> bool {
        let Some(dispatcher) = self.inner.get_mut(&section_y) else { return false };
        let removed = dispatcher.remove_listener(source);
        if dispatcher.is_empty() {
            self.inner.remove(&section_y);
        }
        removed
    }

    /// Number of live dispatchers.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

}
