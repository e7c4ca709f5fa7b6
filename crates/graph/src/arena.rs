//! Generational arena backing the node set of a [`Dtmc`](crate::Dtmc).

use std::fmt;

/// Handle to a node of a [`Dtmc`](crate::Dtmc).
///
/// Removing a node frees its slot for reuse and bumps the slot generation,
/// so a handle to a removed node never resolves to a node created later in
/// the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot of this node.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns how many times the slot had been reused when this node was created.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a LIFO free list.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        NodeId::new(index, 0)
    }

    /// Occupies exactly the slot and generation named by `id`.
    ///
    /// Returns `false` if the slot is live or has already moved past that
    /// generation.
    pub(crate) fn insert_at(&mut self, id: NodeId, value: T) -> bool {
        let index = id.index as usize;
        while self.slots.len() <= index {
            self.free.push(self.slots.len() as u32);
            self.slots.push(Slot {
                generation: 0,
                value: None,
            });
        }
        let slot = &mut self.slots[index];
        if slot.value.is_some() || slot.generation > id.generation {
            return false;
        }
        slot.generation = id.generation;
        slot.value = Some(value);
        self.free.retain(|&f| f != id.index);
        self.len += 1;
        true
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the live node occupying `index`, whatever its generation.
    pub(crate) fn id_at(&self, index: u32) -> Option<NodeId> {
        let slot = self.slots.get(index as usize)?;
        slot.value
            .as_ref()
            .map(|_| NodeId::new(index, slot.generation))
    }

    /// Iterates live nodes in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (NodeId::new(i as u32, slot.generation), v))
        })
    }
}
