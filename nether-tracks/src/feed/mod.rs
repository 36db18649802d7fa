//! Data feed pipeline
//!
//! Each tick a track is owed `feed_size / callback_fps` decoded bytes
//! (twice that when its output queue ran dry). The engine pulls that quota
//! out of the current region in one or more [`read_chunk`] calls, crossing
//! region boundaries through the transition engine as it goes.
//!
//! ```text
//! region bytes ──► [8-bit]  ── radio chatter? ──┐
//!              ──► [12-bit] ── unpack ──────────┼──► OutputSink::enqueue
//!              ──► [16-bit] ── frame align ─────┘
//! ```

mod pcm12;
mod radio;

pub use pcm12::{decode_12bit, decoded_len, packed_offset};
pub use radio::apply_radio_chatter;

use crate::error::{Result, TrackError};
use crate::sound::SoundDescriptor;
use crate::track::Track;

/// Outcome of one read from the current region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedStatus {
    /// Bytes taken, the region has more
    BytesQueued(usize),
    /// The region is exhausted and the sound may continue
    EndOfRegion,
    /// The last region is exhausted
    EndOfSound,
}

/// Bytes read from a region in one step
#[derive(Debug)]
pub struct Chunk {
    /// Decoded bytes ready for the sink
    pub data: Vec<u8>,
    pub status: FeedStatus,
}

impl Chunk {
    pub fn reached_end(&self) -> bool {
        !matches!(self.status, FeedStatus::BytesQueued(_))
    }
}

/// Alignment mask for a stored format
fn alignment(bits: u8, channels: u8) -> usize {
    match (bits, channels) {
        (12 | 16, 2) => 4,
        (12 | 16, _) => 2,
        (_, 2) => 2,
        _ => 1,
    }
}

/// Decoded bytes a track may queue this tick
pub fn tick_quota(track: &Track, sound: &SoundDescriptor, fps: u32, drained: bool) -> usize {
    let mut quota = track.feed_size / fps.max(1) as usize;
    if drained {
        quota *= 2;
    }
    let align = alignment(sound.bits(), sound.channels());
    quota - quota % align
}

/// Decoded length of a region
pub fn region_len(sound: &SoundDescriptor, region: usize) -> usize {
    let stored = sound.region(region).map(|r| r.length as usize).unwrap_or(0);
    if sound.bits() == 12 {
        decoded_len(stored)
    } else {
        stored
    }
}

fn end_status(sound: &SoundDescriptor, region: usize) -> FeedStatus {
    if region + 1 >= sound.region_count() {
        FeedStatus::EndOfSound
    } else {
        FeedStatus::EndOfRegion
    }
}

/// Read up to `quota` decoded bytes from the track's current region
///
/// Advances `region_offset` by what was taken and, for 12-bit data, keeps
/// the unconsumed part of the quota in `pcm12_carry`. A trailing partial
/// frame at the end of a region is dropped and counts as the end.
pub fn read_chunk(
    track: &mut Track,
    sound: &SoundDescriptor,
    quota: usize,
    radio_chatter: bool,
) -> Result<Chunk> {
    let region = usize::try_from(track.current_region).unwrap_or(0);
    let total = region_len(sound, region);
    let remaining = total.saturating_sub(track.region_offset);

    let (data, taken) = match sound.bits() {
        12 => {
            let budget = quota + track.pcm12_carry;
            let wanted = budget / 4 * 4;
            let taken = wanted.min(remaining);
            track.pcm12_carry = if taken < remaining { budget - taken } else { 0 };
            let packed = sound.region_data(
                region,
                packed_offset(track.region_offset),
                taken / 4 * 3,
            );
            (decode_12bit(packed), taken)
        }
        8 | 16 => {
            let frame = track.mixer_flags.frame_bytes().max(1);
            let taken = quota.min(remaining);
            let taken = taken - taken % frame;
            let mut data = sound
                .region_data(region, track.region_offset, taken)
                .to_vec();
            if sound.bits() == 8 && radio_chatter {
                apply_radio_chatter(&mut data);
            }
            (data, taken)
        }
        bits => return Err(TrackError::UnsupportedBitDepth(bits)),
    };

    track.region_offset += taken;
    let frame = alignment(sound.bits(), sound.channels());
    let status = if total.saturating_sub(track.region_offset) < frame {
        end_status(sound, region)
    } else {
        FeedStatus::BytesQueued(data.len())
    };
    Ok(Chunk { data, status })
}
