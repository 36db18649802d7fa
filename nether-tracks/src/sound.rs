//! Sound descriptors and the region store contract
//!
//! A sound is a block of stored sample bytes cut into **regions**, with
//! named **markers** inside regions and a **jump** table connecting regions.
//! Parsing bundles is the host's job; the engine only reads descriptors
//! through [`RegionStore`].

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::START_MARKER;
use crate::error::{Result, TrackError};

/// Opaque sound identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub u32);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Contiguous byte range of stored data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    /// Byte offset into the sound data
    pub offset: u32,
    /// Length in stored bytes (packed bytes for 12-bit sounds)
    pub length: u32,
}

impl Region {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }
}

/// Named position inside a region
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    /// Region the marker sits in
    pub region: usize,
    /// Byte position within the region
    pub position: u32,
    /// Marker name (matched case-insensitively)
    pub name: String,
}

/// Jump table entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Jump {
    /// Region whose entry triggers the jump
    pub source_region: usize,
    /// Hook a track must carry to take the jump
    pub hook_id: i32,
    /// Region played after the jump
    pub dest_region: usize,
    /// Crossfade length in milliseconds (0 = switch in place)
    pub fade_delay_ms: u32,
}

/// Everything the engine needs to play one sound
#[derive(Clone, Debug)]
pub struct SoundDescriptor {
    id: SoundId,
    name: String,
    bits: u8,
    channels: u8,
    sample_rate: u32,
    little_endian: bool,
    regions: Vec<Region>,
    markers: Vec<Marker>,
    jumps: Vec<Jump>,
    data: Vec<u8>,
}

impl SoundDescriptor {
    /// Start building a descriptor
    pub fn builder(id: SoundId, name: impl Into<String>) -> SoundBuilder {
        SoundBuilder {
            sound: SoundDescriptor {
                id,
                name: name.into(),
                bits: 16,
                channels: 1,
                sample_rate: 22_050,
                little_endian: false,
                regions: Vec::new(),
                markers: Vec::new(),
                jumps: Vec::new(),
                data: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored sample width (8, 12 or 16)
    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 16-bit data is little-endian
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region(&self, index: usize) -> Option<Region> {
        self.regions.get(index).copied()
    }

    /// Absolute byte range of a region in the sound data
    pub fn region_byte_range(&self, index: usize) -> Option<Range<usize>> {
        self.region(index).map(|r| {
            let start = r.offset as usize;
            start..start + r.length as usize
        })
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn jumps(&self) -> &[Jump] {
        &self.jumps
    }

    /// Up to `len` stored bytes of `region`, starting `offset` bytes in
    pub fn region_data(&self, region: usize, offset: usize, len: usize) -> &[u8] {
        let Some(range) = self.region_byte_range(region) else {
            return &[];
        };
        let start = (range.start + offset).min(range.end);
        let end = start.saturating_add(len).min(range.end);
        self.data.get(start..end).unwrap_or(&[])
    }

    /// Whether `region` contains a marker called `name`
    pub fn has_marker(&self, region: usize, name: &str) -> bool {
        self.markers
            .iter()
            .any(|m| m.region == region && m.name.eq_ignore_ascii_case(name))
    }

    /// Jump leaving `region`, preferring one that matches `hook_id`
    ///
    /// Returns the entry and whether its hook matched. Entries pointing past
    /// the region table are ignored.
    pub fn jump_for(&self, region: usize, hook_id: i32) -> Option<(&Jump, bool)> {
        let count = self.regions.len();
        let mut candidates = self
            .jumps
            .iter()
            .filter(|j| j.source_region == region && j.dest_region < count);
        let first = candidates.clone().next()?;
        match candidates.find(|j| j.hook_id == hook_id) {
            Some(jump) => Some((jump, true)),
            None => Some((first, false)),
        }
    }

    /// Whether `region` is flagged by a `start` marker
    pub fn is_start_region(&self, region: usize) -> bool {
        self.has_marker(region, START_MARKER)
    }

    /// Check region bounds and format fields
    pub fn validate(&self) -> Result<()> {
        let corrupt = |reason: String| TrackError::CorruptSound {
            id: self.id,
            reason,
        };
        if self.regions.is_empty() {
            return Err(corrupt("no regions".into()));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(corrupt(format!("{} channels", self.channels)));
        }
        if self.sample_rate == 0 {
            return Err(corrupt("zero sample rate".into()));
        }
        for (index, region) in self.regions.iter().enumerate() {
            let end = region.offset as usize + region.length as usize;
            if end > self.data.len() {
                return Err(corrupt(format!(
                    "region {index} ends at {end}, data is {} bytes",
                    self.data.len()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`SoundDescriptor`]
#[derive(Debug)]
pub struct SoundBuilder {
    sound: SoundDescriptor,
}

impl SoundBuilder {
    /// Sample width, channel count and sample rate
    pub fn format(mut self, bits: u8, channels: u8, sample_rate: u32) -> Self {
        self.sound.bits = bits;
        self.sound.channels = channels;
        self.sound.sample_rate = sample_rate;
        self
    }

    pub fn little_endian(mut self, little_endian: bool) -> Self {
        self.sound.little_endian = little_endian;
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.sound.regions.push(region);
        self
    }

    pub fn marker(mut self, region: usize, position: u32, name: impl Into<String>) -> Self {
        self.sound.markers.push(Marker {
            region,
            position,
            name: name.into(),
        });
        self
    }

    pub fn jump(mut self, jump: Jump) -> Self {
        self.sound.jumps.push(jump);
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.sound.data = data;
        self
    }

    pub fn build(self) -> SoundDescriptor {
        self.sound
    }
}

/// Source of sound descriptors
///
/// Opening must not block the tick: descriptors are expected to be resident
/// once opened.
pub trait RegionStore: Send + Sync {
    /// Open a sound by id
    fn open_sound(&self, id: SoundId) -> Result<Arc<SoundDescriptor>>;
}

/// In-memory region store
#[derive(Debug, Default, Clone)]
pub struct MemoryRegionStore {
    sounds: HashMap<SoundId, Arc<SoundDescriptor>>,
}

impl MemoryRegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sound
    pub fn insert(&mut self, sound: SoundDescriptor) {
        self.sounds.insert(sound.id(), Arc::new(sound));
    }

    pub fn remove(&mut self, id: SoundId) -> Option<Arc<SoundDescriptor>> {
        self.sounds.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

impl RegionStore for MemoryRegionStore {
    fn open_sound(&self, id: SoundId) -> Result<Arc<SoundDescriptor>> {
        self.sounds
            .get(&id)
            .cloned()
            .ok_or(TrackError::SoundNotFound(id))
    }
}
