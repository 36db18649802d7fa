//! Save and restore of engine state
//!
//! Little-endian binary layout, one fixed-size record per pool slot:
//!
//! ```text
//! header:  version u32 | music_timer u64 | radio_chatter u8 | slot_count u32
//! record:  pan i8 | volume i32 | fade_target i32 | fade_step i32 |
//!          fade_ticks i32 | fade_active u8 | sound_id i32 | name [u8; 15] |
//!          used u8 | pending_removal u8 | stream_owned u8 | priority i32 |
//!          region_offset i32 | current_region i32 | hook_id i32 |
//!          volume_group i32 | kind i32 | feed_size i32 | pcm12_carry i32 |
//!          mixer_flags i32 | little_endian u8
//! ```
//!
//! On restore a track is dropped when it was about to be removed, was fed
//! by the caller, had not started yet, or its sound can no longer be
//! opened. Everything else resumes in the same slot at the same position.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, info, warn};

use crate::SOUND_NAME_LEN;
use crate::engine::TrackEngine;
use crate::error::{Result, TrackError};
use crate::sink::MixerFlags;
use crate::sound::SoundId;
use crate::track::{FadeState, Track, TrackKind, VolumeGroup};

/// Current save format version
pub const SAVE_VERSION: u32 = 1;

/// Global state stored ahead of the track records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveHeader {
    pub version: u32,
    pub music_timer: u64,
    pub radio_chatter: bool,
    pub slot_count: u32,
}

/// One persisted track slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackRecord {
    pub pan: i8,
    pub volume: i32,
    pub fade: FadeState,
    pub sound_id: u32,
    pub sound_name: [u8; SOUND_NAME_LEN],
    pub used: bool,
    pub pending_removal: bool,
    pub stream_owned: bool,
    pub priority: i32,
    pub region_offset: i32,
    pub current_region: i32,
    pub hook_id: i32,
    pub volume_group: i32,
    pub kind: i32,
    pub feed_size: i32,
    pub pcm12_carry: i32,
    pub mixer_flags: u32,
    pub little_endian: bool,
}

impl TrackRecord {
    fn from_track(track: &Track) -> Self {
        let mut sound_name = [0u8; SOUND_NAME_LEN];
        for (dst, src) in sound_name.iter_mut().zip(track.sound_name.bytes()) {
            *dst = src;
        }
        Self {
            pan: track.pan,
            volume: track.volume,
            fade: track.fade,
            sound_id: track.sound_id.0,
            sound_name,
            used: true,
            pending_removal: track.pending_removal,
            stream_owned: track.stream_owned,
            priority: track.priority,
            region_offset: track.region_offset as i32,
            current_region: track.current_region,
            hook_id: track.hook_id,
            volume_group: track.group as i32,
            kind: track.kind.tag(),
            feed_size: track.feed_size as i32,
            pcm12_carry: track.pcm12_carry as i32,
            mixer_flags: track.mixer_flags.bits(),
            little_endian: track.little_endian,
        }
    }

    /// Name bytes up to the first NUL
    pub fn name(&self) -> String {
        let end = self
            .sound_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SOUND_NAME_LEN);
        String::from_utf8_lossy(&self.sound_name[..end]).into_owned()
    }
}

/// Writer for the save format
pub struct SaveWriter<W: Write> {
    writer: W,
}

impl<W: Write> SaveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self, header: &SaveHeader) -> io::Result<()> {
        self.writer.write_u32::<LittleEndian>(header.version)?;
        self.writer.write_u64::<LittleEndian>(header.music_timer)?;
        self.writer.write_u8(header.radio_chatter as u8)?;
        self.writer.write_u32::<LittleEndian>(header.slot_count)?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &TrackRecord) -> io::Result<()> {
        let w = &mut self.writer;
        w.write_i8(record.pan)?;
        w.write_i32::<LittleEndian>(record.volume)?;
        w.write_i32::<LittleEndian>(record.fade.target)?;
        w.write_i32::<LittleEndian>(record.fade.step)?;
        w.write_i32::<LittleEndian>(record.fade.ticks_remaining)?;
        w.write_u8(record.fade.active as u8)?;
        w.write_i32::<LittleEndian>(record.sound_id as i32)?;
        w.write_all(&record.sound_name)?;
        w.write_u8(record.used as u8)?;
        w.write_u8(record.pending_removal as u8)?;
        w.write_u8(record.stream_owned as u8)?;
        w.write_i32::<LittleEndian>(record.priority)?;
        w.write_i32::<LittleEndian>(record.region_offset)?;
        w.write_i32::<LittleEndian>(record.current_region)?;
        w.write_i32::<LittleEndian>(record.hook_id)?;
        w.write_i32::<LittleEndian>(record.volume_group)?;
        w.write_i32::<LittleEndian>(record.kind)?;
        w.write_i32::<LittleEndian>(record.feed_size)?;
        w.write_i32::<LittleEndian>(record.pcm12_carry)?;
        w.write_i32::<LittleEndian>(record.mixer_flags as i32)?;
        w.write_u8(record.little_endian as u8)?;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reader for the save format
pub struct SaveReader<R: Read> {
    reader: R,
}

impl<R: Read> SaveReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read and check the header
    pub fn read_header(&mut self) -> Result<SaveHeader> {
        let version = self.reader.read_u32::<LittleEndian>()?;
        if version == 0 || version > SAVE_VERSION {
            return Err(TrackError::UnsupportedSaveVersion(version));
        }
        let music_timer = self.reader.read_u64::<LittleEndian>()?;
        let radio_chatter = self.reader.read_u8()? != 0;
        let slot_count = self.reader.read_u32::<LittleEndian>()?;
        Ok(SaveHeader {
            version,
            music_timer,
            radio_chatter,
            slot_count,
        })
    }

    pub fn read_record(&mut self) -> io::Result<TrackRecord> {
        let r = &mut self.reader;
        let pan = r.read_i8()?;
        let volume = r.read_i32::<LittleEndian>()?;
        let target = r.read_i32::<LittleEndian>()?;
        let step = r.read_i32::<LittleEndian>()?;
        let ticks_remaining = r.read_i32::<LittleEndian>()?;
        let active = r.read_u8()? != 0;
        let sound_id = r.read_i32::<LittleEndian>()? as u32;
        let mut sound_name = [0u8; SOUND_NAME_LEN];
        r.read_exact(&mut sound_name)?;
        Ok(TrackRecord {
            pan,
            volume,
            fade: FadeState {
                active,
                target,
                step,
                ticks_remaining,
            },
            sound_id,
            sound_name,
            used: r.read_u8()? != 0,
            pending_removal: r.read_u8()? != 0,
            stream_owned: r.read_u8()? != 0,
            priority: r.read_i32::<LittleEndian>()?,
            region_offset: r.read_i32::<LittleEndian>()?,
            current_region: r.read_i32::<LittleEndian>()?,
            hook_id: r.read_i32::<LittleEndian>()?,
            volume_group: r.read_i32::<LittleEndian>()?,
            kind: r.read_i32::<LittleEndian>()?,
            feed_size: r.read_i32::<LittleEndian>()?,
            pcm12_carry: r.read_i32::<LittleEndian>()?,
            mixer_flags: r.read_i32::<LittleEndian>()? as u32,
            little_endian: r.read_u8()? != 0,
        })
    }
}

impl TrackEngine {
    /// Write the engine state
    pub fn save_state<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = SaveWriter::new(writer);
        let capacity = self.pool.capacity();
        out.write_header(&SaveHeader {
            version: SAVE_VERSION,
            music_timer: self.music_timer,
            radio_chatter: self.radio_chatter,
            slot_count: capacity as u32,
        })?;
        for index in 0..capacity {
            let record = self
                .pool
                .slot(index)
                .map(TrackRecord::from_track)
                .unwrap_or_default();
            out.write_record(&record)?;
        }
        out.finish()?;
        debug!(slots = capacity, "engine state saved");
        Ok(())
    }

    /// Replace the engine state with a saved one
    ///
    /// The whole save is read before anything changes, so a damaged file
    /// leaves the engine as it was. Otherwise every current track is stopped
    /// first. Returns the number of tracks resumed.
    pub fn restore_state<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut input = SaveReader::new(reader);
        let header = input.read_header()?;
        // Grown as read; the slot count is not trusted for preallocation
        let mut records = Vec::new();
        for _ in 0..header.slot_count {
            records.push(input.read_record()?);
        }

        self.stop_all_sounds();
        self.trigger = None;
        self.music_timer = header.music_timer;
        self.radio_chatter = header.radio_chatter;

        let mut restored = 0;
        for (index, record) in records.iter().enumerate() {
            if record.used && self.restore_track(index, record) {
                restored += 1;
            }
        }
        info!(restored, music_timer = header.music_timer, "engine state restored");
        Ok(restored)
    }

    fn restore_track(&mut self, index: usize, record: &TrackRecord) -> bool {
        let sound_id = SoundId(record.sound_id);
        if record.pending_removal || record.stream_owned || record.current_region == -1 {
            debug!(slot = index, sound = %sound_id, "saved track not resumable, discarded");
            return false;
        }
        if index >= self.pool.capacity() {
            warn!(slot = index, "saved slot beyond pool capacity, discarded");
            return false;
        }
        let Some(group) = VolumeGroup::from_i32(record.volume_group) else {
            warn!(slot = index, group = record.volume_group, "unknown volume group, discarded");
            return false;
        };
        if TrackKind::from_tag(record.kind) != Some(self.pool.kind_of(index)) {
            warn!(slot = index, kind = record.kind, "track kind does not match slot, discarded");
            return false;
        }

        let descriptor = match self
            .store
            .open_sound(sound_id)
            .and_then(|d| d.validate().map(|()| d))
        {
            Ok(d) => d,
            Err(e) => {
                warn!(slot = index, sound = %sound_id, name = %record.name(), "saved sound unavailable: {e}");
                return false;
            }
        };
        if record.current_region < 0 || record.current_region as usize >= descriptor.region_count() {
            warn!(slot = index, region = record.current_region, "saved region out of range, discarded");
            return false;
        }

        let Some(track_ref) = self.pool.allocate_at(index, sound_id, group) else {
            return false;
        };
        let sample_rate = descriptor.sample_rate();
        let Some(track) = self.pool.get_mut(track_ref) else {
            return false;
        };
        track.bind_sound(descriptor);
        if track.mixer_flags.bits() != record.mixer_flags {
            debug!(
                slot = index,
                saved = ?MixerFlags::from_bits_truncate(record.mixer_flags),
                current = ?track.mixer_flags,
                "mixer flags recomputed from sound"
            );
        }
        track.pan = record.pan;
        track.volume = record.volume;
        track.fade = record.fade;
        track.priority = record.priority;
        track.region_offset = record.region_offset.max(0) as usize;
        track.current_region = record.current_region;
        track.hook_id = record.hook_id;
        track.pcm12_carry = record.pcm12_carry.clamp(0, 3) as usize;
        let flags = track.mixer_flags;

        let output = self.sink.create_queue(sample_rate, flags);
        if let Some(track) = self.pool.get_mut(track_ref) {
            track.output = Some(output);
        }
        true
    }

    /// Save to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.save_state(BufWriter::new(file))
    }

    /// Restore from a file
    pub fn restore_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::open(path)?;
        self.restore_state(BufReader::new(file))
    }
}
