//! Fixed track arena
//!
//! Primary slots come first, shadow slots after them:
//!
//! ```text
//! index:  0 .. primary_count .. primary_count + shadow_count
//!         [  primary tracks  ][       shadow tracks       ]
//! ```
//!
//! Every slot carries a generation counter, bumped on release, so a stale
//! [`TrackRef`] held by the caller can never reach a track that reused the
//! slot.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Result, TrackError};
use crate::sound::SoundId;
use crate::track::{Track, TrackKind, VolumeGroup};

/// Generation-checked handle to a track slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackRef {
    index: u32,
    generation: u32,
}

impl TrackRef {
    /// Arena slot index
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.generation)
    }
}

/// Slot indices of active tracks, collected before a pass mutates the pool
pub type ActiveSlots = SmallVec<[usize; 16]>;

#[derive(Debug)]
struct Slot {
    generation: u32,
    track: Option<Track>,
}

/// Fixed-capacity arena of primary and shadow tracks
#[derive(Debug)]
pub struct TrackPool {
    slots: Vec<Slot>,
    primary_count: usize,
    free_primary: Vec<usize>,
    free_shadow: Vec<usize>,
}

impl TrackPool {
    pub fn new(primary_count: usize, shadow_count: usize) -> Self {
        let total = primary_count + shadow_count;
        let slots = (0..total)
            .map(|_| Slot {
                generation: 0,
                track: None,
            })
            .collect();
        // Reversed so the lowest index is handed out first
        Self {
            slots,
            primary_count,
            free_primary: (0..primary_count).rev().collect(),
            free_shadow: (primary_count..total).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn primary_count(&self) -> usize {
        self.primary_count
    }

    /// Kind of track a slot holds
    pub fn kind_of(&self, index: usize) -> TrackKind {
        if index < self.primary_count {
            TrackKind::Primary
        } else {
            TrackKind::Shadow
        }
    }

    /// Number of free slots of a kind
    pub fn free_count(&self, kind: TrackKind) -> usize {
        match kind {
            TrackKind::Primary => self.free_primary.len(),
            TrackKind::Shadow => self.free_shadow.len(),
        }
    }

    /// Claim the next free slot of `kind` for a fresh track
    pub fn allocate(
        &mut self,
        kind: TrackKind,
        sound_id: SoundId,
        group: VolumeGroup,
    ) -> Result<TrackRef> {
        let free = match kind {
            TrackKind::Primary => &mut self.free_primary,
            TrackKind::Shadow => &mut self.free_shadow,
        };
        let index = free.pop().ok_or(TrackError::PoolFull(kind))?;
        let slot = &mut self.slots[index];
        slot.track = Some(Track::new(index, kind, sound_id, group));
        Ok(TrackRef {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Claim a specific free slot (used when restoring a save)
    pub fn allocate_at(
        &mut self,
        index: usize,
        sound_id: SoundId,
        group: VolumeGroup,
    ) -> Option<TrackRef> {
        let kind = self.kind_of(index);
        let free = match kind {
            TrackKind::Primary => &mut self.free_primary,
            TrackKind::Shadow => &mut self.free_shadow,
        };
        let position = free.iter().position(|&i| i == index)?;
        free.remove(position);
        let slot = &mut self.slots[index];
        slot.track = Some(Track::new(index, kind, sound_id, group));
        Some(TrackRef {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Free a slot, returning the track it held
    pub fn release(&mut self, track: TrackRef) -> Option<Track> {
        self.resolve(track)?;
        self.release_slot(track.index())
    }

    /// Free a slot by index, returning the track it held
    pub fn release_slot(&mut self, index: usize) -> Option<Track> {
        let kind = self.kind_of(index);
        let slot = self.slots.get_mut(index)?;
        let removed = slot.track.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        match kind {
            TrackKind::Primary => self.free_primary.push(index),
            TrackKind::Shadow => self.free_shadow.push(index),
        }
        Some(removed)
    }

    fn resolve(&self, track: TrackRef) -> Option<usize> {
        let slot = self.slots.get(track.index())?;
        (slot.generation == track.generation && slot.track.is_some()).then_some(track.index())
    }

    /// Whether the reference still names a live track
    pub fn contains(&self, track: TrackRef) -> bool {
        self.resolve(track).is_some()
    }

    pub fn get(&self, track: TrackRef) -> Option<&Track> {
        let index = self.resolve(track)?;
        self.slots[index].track.as_ref()
    }

    pub fn get_mut(&mut self, track: TrackRef) -> Option<&mut Track> {
        let index = self.resolve(track)?;
        self.slots[index].track.as_mut()
    }

    pub fn slot(&self, index: usize) -> Option<&Track> {
        self.slots.get(index)?.track.as_ref()
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.slots.get_mut(index)?.track.as_mut()
    }

    /// Current reference for an occupied slot
    pub fn ref_for(&self, index: usize) -> Option<TrackRef> {
        let slot = self.slots.get(index)?;
        slot.track.as_ref().map(|_| TrackRef {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Occupied slot indices in arena order
    pub fn active_slots(&self) -> ActiveSlots {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.track.is_some())
            .map(|(index, _)| index)
            .collect()
    }

    /// Occupied tracks in arena order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.slots.iter().filter_map(|slot| slot.track.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.slots.iter_mut().filter_map(|slot| slot.track.as_mut())
    }

    pub fn active_count(&self) -> usize {
        self.iter().count()
    }

    /// Primary track playing `sound_id`, if any
    pub fn find_primary(&self, sound_id: SoundId) -> Option<TrackRef> {
        (0..self.primary_count).find_map(|index| {
            self.slot(index)
                .filter(|t| t.sound_id == sound_id)
                .and_then(|_| self.ref_for(index))
        })
    }
}
