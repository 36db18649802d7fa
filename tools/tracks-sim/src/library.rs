//! Built-in sound library
//!
//! Three synthetic sounds covering every stored format the engine reads.

use nether_tracks::{Jump, MemoryRegionStore, Region, SoundDescriptor, SoundId};

/// Looping theme: 16-bit stereo, four one-second regions
pub const THEME: SoundId = SoundId(100);
/// Combat cue used as trigger follow-up: 12-bit mono, two regions
pub const COMBAT: SoundId = SoundId(200);

/// Marker in the theme's third region
pub const EXIT_MARKER: &str = "exit";

const THEME_RATE: u32 = 22_050;
const COMBAT_RATE: u32 = 22_050;
const VOICE_RATE: u32 = 11_025;

/// Triangle wave as signed 16-bit samples
fn triangle(samples: usize, period: usize) -> impl Iterator<Item = i16> {
    let half = (period / 2).max(1) as i32;
    (0..samples).map(move |i| {
        let phase = (i % period.max(1)) as i32;
        let ramp = if phase < half { phase } else { 2 * half - phase };
        ((ramp * 2 - half) * (i16::MAX as i32 / half)) as i16
    })
}

fn theme() -> SoundDescriptor {
    let frames_per_region = THEME_RATE as usize;
    let region_bytes = (frames_per_region * 4) as u32;
    let mut data = Vec::with_capacity(region_bytes as usize * 4);
    for (r, period) in [100usize, 80, 120, 90].into_iter().enumerate() {
        for sample in triangle(frames_per_region, period + r) {
            let [hi, lo] = sample.to_be_bytes();
            data.extend_from_slice(&[hi, lo, hi, lo]);
        }
    }

    let mut builder = SoundDescriptor::builder(THEME, "theme")
        .format(16, 2, THEME_RATE)
        .data(data)
        .marker(2, 0, EXIT_MARKER)
        .marker(1, 0, "start")
        .jump(Jump {
            source_region: 3,
            hook_id: 1,
            dest_region: 1,
            fade_delay_ms: 250,
        });
    for r in 0..4 {
        builder = builder.region(Region::new(r * region_bytes, region_bytes));
    }
    builder.build()
}

fn combat() -> SoundDescriptor {
    // 12-bit packing: 3 bytes per sample pair
    let pairs = COMBAT_RATE as usize / 2;
    let mut data = Vec::with_capacity(pairs * 3 * 2);
    let samples: Vec<i16> = triangle(pairs * 4, 60).collect();
    for pair in samples.chunks_exact(2) {
        let a = ((pair[0] as i32 + 0x8000) >> 4) as u16;
        let b = ((pair[1] as i32 + 0x8000) >> 4) as u16;
        data.push((a & 0xFF) as u8);
        data.push(((a >> 8) | ((b >> 8) << 4)) as u8);
        data.push((b & 0xFF) as u8);
    }
    let region_bytes = (data.len() / 2) as u32;
    SoundDescriptor::builder(COMBAT, "combat")
        .format(12, 1, COMBAT_RATE)
        .region(Region::new(0, region_bytes))
        .region(Region::new(region_bytes, region_bytes))
        .data(data)
        .build()
}

fn voice(id: SoundId) -> SoundDescriptor {
    let samples = VOICE_RATE as usize * 2;
    let data: Vec<u8> = triangle(samples, 40)
        .map(|s| ((s >> 8) as i32 + 0x80) as u8)
        .collect();
    SoundDescriptor::builder(id, "radio")
        .format(8, 1, VOICE_RATE)
        .region(Region::new(0, samples as u32))
        .data(data)
        .build()
}

/// Store holding the theme, the combat cue and a voice line under `voice_id`
pub fn build(voice_id: SoundId) -> MemoryRegionStore {
    let mut store = MemoryRegionStore::new();
    store.insert(theme());
    store.insert(combat());
    store.insert(voice(voice_id));
    store
}
