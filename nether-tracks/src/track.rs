//! Track state
//!
//! One track is one playing stream: which sound, where in it, how loud and
//! which output queue it feeds. Tracks live in the fixed arena of
//! [`crate::TrackPool`]; primary tracks are started by the caller, shadow
//! tracks are clones that crossfade out an abandoned region.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sink::{MixerFlags, QueueHandle};
use crate::sound::{SoundDescriptor, SoundId};
use crate::{MAX_VOLUME, SOUND_NAME_LEN};

/// Which pool range a track lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Started by the caller
    Primary,
    /// Crossfade clone
    Shadow,
}

impl TrackKind {
    /// Save-file tag
    pub fn tag(self) -> i32 {
        match self {
            TrackKind::Primary => 0,
            TrackKind::Shadow => 1,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(TrackKind::Primary),
            1 => Some(TrackKind::Shadow),
            _ => None,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Primary => f.pad("primary"),
            TrackKind::Shadow => f.pad("shadow"),
        }
    }
}

/// Mix group a track belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum VolumeGroup {
    Sfx = 1,
    Voice = 2,
    Music = 3,
}

impl VolumeGroup {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(VolumeGroup::Sfx),
            2 => Some(VolumeGroup::Voice),
            3 => Some(VolumeGroup::Music),
            _ => None,
        }
    }
}

/// Volume fade in progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FadeState {
    pub active: bool,
    /// Destination volume (0..=MAX_VOLUME)
    pub target: i32,
    /// Per-tick change in the fade curve's linear domain
    pub step: i32,
    /// Ticks left before the volume snaps to `target`
    pub ticks_remaining: i32,
}

/// One playing stream
#[derive(Clone, Debug)]
pub struct Track {
    /// Arena slot this track occupies
    pub slot: usize,
    pub kind: TrackKind,
    pub sound_id: SoundId,
    /// Sound name, truncated for save files
    pub sound_name: String,
    pub group: VolumeGroup,
    pub priority: i32,

    /// Region being played; -1 until the first feed picks `start_region`
    pub current_region: i32,
    /// Region a fresh track enters on its first feed
    pub start_region: usize,
    /// Read cursor inside the current region (decoded bytes)
    pub region_offset: usize,
    /// Jump selector set by the caller
    pub hook_id: i32,

    /// Volume, 0..=MAX_VOLUME
    pub volume: i32,
    /// -127 (left) ..= 127 (right)
    pub pan: i8,
    /// Music attenuation while speech plays, 0..=MAX_VOLUME
    pub gain_reduction: i32,
    pub fade: FadeState,

    /// Scheduled for release; excluded from jumps
    pub pending_removal: bool,
    /// Data is pushed by the caller instead of read from regions
    pub stream_owned: bool,

    /// Bytes per second of decoded output
    pub feed_size: usize,
    /// Leftover decoded bytes owed by the last 12-bit chunk (0..4)
    pub pcm12_carry: usize,
    pub mixer_flags: MixerFlags,
    pub little_endian: bool,

    /// Output queue in the host mixer
    pub output: Option<QueueHandle>,
    /// Descriptor of the sound being played
    pub sound: Option<Arc<SoundDescriptor>>,
}

impl Track {
    /// Fresh track for `sound_id`, not yet bound to a descriptor
    pub fn new(slot: usize, kind: TrackKind, sound_id: SoundId, group: VolumeGroup) -> Self {
        Self {
            slot,
            kind,
            sound_id,
            sound_name: String::new(),
            group,
            priority: 0,
            current_region: -1,
            start_region: 0,
            region_offset: 0,
            hook_id: 0,
            volume: MAX_VOLUME,
            pan: 0,
            gain_reduction: 0,
            fade: FadeState::default(),
            pending_removal: false,
            stream_owned: false,
            feed_size: 0,
            pcm12_carry: 0,
            mixer_flags: MixerFlags::empty(),
            little_endian: false,
            output: None,
            sound: None,
        }
    }

    /// Attach a descriptor and derive output format and feed rate from it
    pub fn bind_sound(&mut self, sound: Arc<SoundDescriptor>) {
        self.sound_id = sound.id();
        self.sound_name = sound.name().chars().take(SOUND_NAME_LEN).collect();
        self.little_endian = sound.little_endian();
        self.mixer_flags = mixer_flags_for(sound.bits(), sound.channels(), sound.little_endian());
        self.feed_size = feed_size_for(sound.bits(), sound.channels(), sound.sample_rate());
        self.pcm12_carry = 0;
        self.sound = Some(sound);
    }

    /// Volume on the public 0..=127 scale
    pub fn public_volume(&self) -> i32 {
        self.volume / crate::VOLUME_UNIT
    }

    /// Fading toward a lower volume
    pub fn is_fading_out(&self) -> bool {
        self.fade.active && self.fade.target < self.volume
    }

    /// Fading out to silence
    pub fn is_fading_to_silence(&self) -> bool {
        self.fade.active && self.fade.target == 0
    }

    /// Already committed to going away; jumps must not touch it
    ///
    /// A fade to a lowered but audible level does not count.
    pub fn is_crossfading(&self) -> bool {
        self.pending_removal || self.kind == TrackKind::Shadow || self.is_fading_to_silence()
    }
}

/// Output flags for a stored format
pub fn mixer_flags_for(bits: u8, channels: u8, little_endian: bool) -> MixerFlags {
    let mut flags = match bits {
        8 => MixerFlags::UNSIGNED,
        12 => MixerFlags::BITS_16,
        16 if little_endian => MixerFlags::BITS_16 | MixerFlags::LITTLE_ENDIAN,
        16 => MixerFlags::BITS_16,
        _ => MixerFlags::empty(),
    };
    if channels == 2 {
        flags |= MixerFlags::STEREO;
    }
    flags
}

/// Decoded bytes per second of playback
pub fn feed_size_for(bits: u8, channels: u8, sample_rate: u32) -> usize {
    let width = if bits == 12 || bits == 16 { 2 } else { 1 };
    sample_rate as usize * channels as usize * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::Region;

    #[test]
    fn test_bind_sound_derives_format() {
        let sound = SoundDescriptor::builder(SoundId(4), "a-rather-long-sound-name")
            .format(12, 2, 22_050)
            .region(Region::new(0, 6))
            .data(vec![0; 6])
            .build();
        let mut track = Track::new(0, TrackKind::Primary, SoundId(4), VolumeGroup::Music);
        track.bind_sound(Arc::new(sound));

        assert_eq!(track.feed_size, 22_050 * 2 * 2);
        assert_eq!(track.mixer_flags, MixerFlags::BITS_16 | MixerFlags::STEREO);
        assert_eq!(track.sound_name.len(), SOUND_NAME_LEN);
        assert_eq!(track.current_region, -1);
    }

    #[test]
    fn test_eight_bit_mono_flags() {
        assert_eq!(mixer_flags_for(8, 1, false), MixerFlags::UNSIGNED);
        assert_eq!(feed_size_for(8, 1, 11_025), 11_025);
        assert_eq!(
            mixer_flags_for(16, 1, true),
            MixerFlags::BITS_16 | MixerFlags::LITTLE_ENDIAN
        );
    }

    #[test]
    fn test_crossfading_states() {
        let mut track = Track::new(0, TrackKind::Primary, SoundId(1), VolumeGroup::Sfx);
        assert!(!track.is_crossfading());
        track.fade = FadeState {
            active: true,
            target: 0,
            step: -1000,
            ticks_remaining: 10,
        };
        assert!(track.is_fading_out());
        assert!(track.is_crossfading());

        track.fade.target = 60_000;
        assert!(track.is_fading_out());
        assert!(!track.is_crossfading());

        track.fade = FadeState::default();
        track.kind = TrackKind::Shadow;
        assert!(track.is_crossfading());
    }

    #[test]
    fn test_group_and_kind_tags() {
        assert_eq!(VolumeGroup::from_i32(2), Some(VolumeGroup::Voice));
        assert_eq!(VolumeGroup::from_i32(0), None);
        assert_eq!(TrackKind::from_tag(TrackKind::Shadow.tag()), Some(TrackKind::Shadow));
        assert_eq!(TrackKind::Primary.to_string(), "primary");
    }
}
