use super::*;
use crate::config::ProfilePreset;
use crate::feed::apply_radio_chatter;
use crate::sink::{MixerFlags, QueueHandle, RecordingSink};
use crate::sound::{Jump, MemoryRegionStore, Region, SoundBuilder, SoundDescriptor};

// 8-bit mono at 1000 Hz with 10 ticks per second: 100 bytes per tick
const FPS: u32 = 10;
const REGION_LEN: u32 = 250;
const FIRST_SHADOW: usize = 8;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn sound(id: u32, regions: u32) -> SoundBuilder {
    let mut builder = SoundDescriptor::builder(SoundId(id), format!("sound-{id}"))
        .format(8, 1, 1000)
        .data(pattern((regions * REGION_LEN) as usize));
    for r in 0..regions {
        builder = builder.region(Region::new(r * REGION_LEN, REGION_LEN));
    }
    builder
}

fn config() -> EngineConfig {
    EngineConfig {
        callback_fps: FPS,
        ..EngineConfig::default()
    }
}

fn setup_with(config: EngineConfig, sounds: Vec<SoundBuilder>) -> (TrackEngine, RecordingSink) {
    let mut store = MemoryRegionStore::new();
    for s in sounds {
        store.insert(s.build());
    }
    let sink = RecordingSink::new();
    let engine = TrackEngine::new(config, Arc::new(store), Box::new(sink.clone()));
    (engine, sink)
}

fn setup(sounds: Vec<SoundBuilder>) -> (TrackEngine, RecordingSink) {
    setup_with(config(), sounds)
}

fn ticks(engine: &mut TrackEngine, n: usize) {
    for _ in 0..n {
        engine.tick();
    }
}

fn output(engine: &TrackEngine, track: TrackRef) -> QueueHandle {
    engine.track(track).unwrap().output.unwrap()
}

// =============================================================================
// Starting and stopping
// =============================================================================

#[test]
fn test_start_rejects_duplicate_unless_overlap() {
    let (mut engine, _sink) = setup(vec![sound(1, 2)]);
    let first = engine
        .start_sound(SoundId(1), VolumeGroup::Music, 127, 0)
        .unwrap();
    assert!(matches!(
        engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0),
        Err(TrackError::AlreadyPlaying(SoundId(1)))
    ));

    let second = engine
        .start_sound_with(StartOptions {
            allow_overlap: true,
            ..StartOptions::new(SoundId(1), VolumeGroup::Sfx)
        })
        .unwrap();
    assert_ne!(first.index(), second.index());
    assert_eq!(engine.active_count(), 2);
}

#[test]
fn test_failed_start_allocates_nothing() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    assert!(matches!(
        engine.start_sound(SoundId(99), VolumeGroup::Sfx, 127, 0),
        Err(TrackError::SoundNotFound(SoundId(99)))
    ));
    assert!(matches!(
        engine.start_sound_with(StartOptions {
            start_region: 2,
            ..StartOptions::new(SoundId(1), VolumeGroup::Sfx)
        }),
        Err(TrackError::CorruptSound { .. })
    ));
    assert_eq!(engine.active_count(), 0);
    assert!(sink.queues().is_empty());
}

#[test]
fn test_start_region_is_entered_on_first_feed() {
    let (mut engine, _sink) = setup(vec![sound(1, 3)]);
    let track = engine
        .start_sound_with(StartOptions {
            start_region: 2,
            ..StartOptions::new(SoundId(1), VolumeGroup::Music)
        })
        .unwrap();
    assert_eq!(engine.track(track).unwrap().current_region, -1);
    engine.tick();
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 2);
    assert_eq!(state.region_offset, 100);
}

#[test]
fn test_eviction_takes_lowest_priority() {
    let config = EngineConfig {
        primary_tracks: 2,
        ..config()
    };
    let sounds = vec![sound(1, 1), sound(2, 1), sound(3, 1), sound(4, 1)];
    let (mut engine, sink) = setup_with(config, sounds);
    let high = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 5).unwrap();
    let low = engine.start_sound(SoundId(2), VolumeGroup::Sfx, 127, 1).unwrap();
    let low_queue = output(&engine, low);

    let mid = engine.start_sound(SoundId(3), VolumeGroup::Sfx, 127, 3).unwrap();
    assert_eq!(mid.index(), low.index());
    assert!(engine.track(low).is_none());
    assert!(engine.track(high).is_some());
    assert!(sink.is_finished(low_queue));

    assert!(matches!(
        engine.start_sound(SoundId(4), VolumeGroup::Sfx, 127, 0),
        Err(TrackError::PoolFull(TrackKind::Primary))
    ));
}

#[test]
fn test_pool_full_without_eviction() {
    let config = EngineConfig {
        primary_tracks: 1,
        priority_eviction: false,
        ..config()
    };
    let (mut engine, _sink) = setup_with(config, vec![sound(1, 1), sound(2, 1)]);
    engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    assert!(matches!(
        engine.start_sound(SoundId(2), VolumeGroup::Sfx, 127, 10),
        Err(TrackError::PoolFull(TrackKind::Primary))
    ));
}

#[test]
fn test_stop_finishes_queue_and_invalidates_ref() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    engine.tick();
    let queue = output(&engine, track);

    engine.stop_sound(track).unwrap();
    assert!(sink.is_finished(queue));
    assert!(engine.track(track).is_none());
    assert!(matches!(
        engine.stop_sound(track),
        Err(TrackError::InvalidTrack(_))
    ));
}

#[test]
fn test_stop_all_clears_the_pool() {
    let (mut engine, sink) = setup(vec![sound(1, 2), sound(2, 2)]);
    engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    engine.start_sound(SoundId(2), VolumeGroup::Music, 127, 0).unwrap();
    engine.stop_all_sounds();
    assert_eq!(engine.active_count(), 0);
    assert!(sink.open_queues().is_empty());
}

// =============================================================================
// Feeding and region transitions
// =============================================================================

#[test]
fn test_regions_play_in_order_then_release() {
    let (mut engine, sink) = setup(vec![sound(1, 3)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let queue = output(&engine, track);

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 1);
    assert_eq!(state.region_offset, 50);

    ticks(&mut engine, 4);
    assert_eq!(engine.track(track).unwrap().current_region, 2);

    engine.tick();
    assert!(engine.track(track).is_none());
    assert_eq!(sink.bytes_queued(queue), 750);
    assert_eq!(sink.queue(queue).unwrap().data, pattern(750));
    assert!(sink.is_finished(queue));
}

#[test]
fn test_drained_queue_gets_double_quota() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    sink.set_drained(true);
    engine.tick();
    assert_eq!(sink.bytes_queued(output(&engine, track)), 200);
}

#[test]
fn test_matching_hook_jumps_in_place() {
    let jump = Jump {
        source_region: 1,
        hook_id: 5,
        dest_region: 3,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_hook(track, 5).unwrap();

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 3);
    assert_eq!(state.region_offset, 50);
    assert_eq!(state.hook_id, 0);
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn test_hook_mismatch_advances_sequentially() {
    let jump = Jump {
        source_region: 1,
        hook_id: 5,
        dest_region: 3,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_hook(track, 2).unwrap();

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 1);
    assert_eq!(state.hook_id, 2);
}

#[test]
fn test_jump_with_fade_spawns_shadow() {
    let jump = Jump {
        source_region: 1,
        hook_id: 5,
        dest_region: 3,
        fade_delay_ms: 500,
    };
    let (mut engine, sink) = setup(vec![sound(1, 5).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_hook(track, 5).unwrap();
    let first_queue = output(&engine, track);

    ticks(&mut engine, 3);

    let original = engine.track(track).unwrap();
    assert_eq!(original.current_region, 3);
    assert_ne!(original.output, Some(first_queue));
    assert!(!sink.is_finished(first_queue));

    let shadow = engine.pool().slot(FIRST_SHADOW).unwrap();
    assert_eq!(shadow.kind, TrackKind::Shadow);
    assert_eq!(shadow.current_region, 1);
    assert_eq!(shadow.region_offset, 0);
    assert_eq!(shadow.output, Some(first_queue));
    assert!(shadow.fade.active);
    assert_eq!(shadow.fade.target, 0);
    assert_eq!(shadow.fade.ticks_remaining, 5);

    engine.tick();
    assert!(engine.pool().slot(FIRST_SHADOW).unwrap().volume < MAX_VOLUME);

    // The shadow is released when it runs off the end of its region
    ticks(&mut engine, 2);
    assert!(engine.pool().slot(FIRST_SHADOW).is_none());
    assert!(sink.is_finished(first_queue));
    assert_eq!(engine.track(track).unwrap().current_region, 4);
}

#[test]
fn test_crossfade_without_shadow_slot_switches_in_place() {
    let config = EngineConfig {
        shadow_tracks: 0,
        ..config()
    };
    let jump = Jump {
        source_region: 1,
        hook_id: 0,
        dest_region: 3,
        fade_delay_ms: 500,
    };
    let (mut engine, _sink) = setup_with(config, vec![sound(1, 4).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let queue = output(&engine, track);

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 3);
    assert_eq!(state.output, Some(queue));
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn test_start_marker_forces_jump() {
    let jump = Jump {
        source_region: 1,
        hook_id: 9,
        dest_region: 3,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump).marker(3, 0, "START")]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();

    ticks(&mut engine, 3);
    assert_eq!(engine.track(track).unwrap().current_region, 3);
}

#[test]
fn test_forced_jump_switches_in_place_without_shadow() {
    let jump = Jump {
        source_region: 1,
        hook_id: 9,
        dest_region: 3,
        fade_delay_ms: 500,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump).marker(3, 0, "start")]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let queue = output(&engine, track);

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 3);
    assert_eq!(state.output, Some(queue));
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn test_fade_to_audible_level_still_takes_jumps() {
    let jump = Jump {
        source_region: 1,
        hook_id: 5,
        dest_region: 3,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_hook(track, 5).unwrap();
    engine.set_fade(track, 60, 100).unwrap();

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 3);
    assert!(state.is_fading_out());
}

#[test]
fn test_jump_cycle_through_empty_regions_does_not_stall() {
    let jump = Jump {
        source_region: 2,
        hook_id: 0,
        dest_region: 1,
        fade_delay_ms: 0,
    };
    let empty = SoundDescriptor::builder(SoundId(1), "empty")
        .format(8, 1, 1000)
        .data(pattern(10))
        .region(Region::new(0, 10))
        .region(Region::new(10, 0))
        .region(Region::new(10, 0))
        .jump(jump)
        .build();
    let mut store = MemoryRegionStore::new();
    store.insert(empty);
    let sink = RecordingSink::new();
    let mut engine = TrackEngine::new(config(), Arc::new(store), Box::new(sink.clone()));
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let queue = output(&engine, track);

    ticks(&mut engine, 2);
    assert_eq!(engine.music_timer(), 2);
    assert_eq!(sink.bytes_queued(queue), 10);
    assert!(engine.track(track).is_some());
}

#[test]
fn test_fading_out_track_ignores_jumps() {
    let jump = Jump {
        source_region: 1,
        hook_id: 0,
        dest_region: 3,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 4).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_fade(track, 0, 100).unwrap();

    ticks(&mut engine, 3);
    let state = engine.track(track).unwrap();
    assert_eq!(state.current_region, 1);
    assert!(state.is_fading_out());
}

#[test]
fn test_dangling_jump_is_ignored() {
    let jump = Jump {
        source_region: 1,
        hook_id: 0,
        dest_region: 10,
        fade_delay_ms: 0,
    };
    let (mut engine, _sink) = setup(vec![sound(1, 3).jump(jump)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();

    ticks(&mut engine, 3);
    assert_eq!(engine.track(track).unwrap().current_region, 1);
}

// =============================================================================
// Triggers
// =============================================================================

#[test]
fn test_trigger_fades_region_and_moves_on() {
    let (mut engine, _sink) = setup(vec![sound(1, 4).marker(1, 0, "boss")]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.set_hook(track, 7).unwrap();
    engine.arm_trigger(Trigger::new("BOSS", 10));

    ticks(&mut engine, 3);
    assert!(engine.trigger().is_none());

    let original = engine.track(track).unwrap();
    assert_eq!(original.current_region, 2);
    assert_eq!(original.region_offset, 50);
    assert_eq!(original.hook_id, 0);

    let shadow = engine.pool().slot(FIRST_SHADOW).unwrap();
    assert_eq!(shadow.current_region, 1);
    assert_eq!(shadow.fade.target, 0);
    assert_eq!(shadow.fade.ticks_remaining, 10);
}

#[test]
fn test_trigger_fires_once() {
    let (mut engine, _sink) = setup(vec![sound(1, 4).marker(1, 0, "boss").marker(2, 0, "boss")]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.arm_trigger(Trigger::new("boss", 2));

    // Region 1 fires and the track skips to region 2, which also has the marker
    ticks(&mut engine, 3);
    assert_eq!(engine.track(track).unwrap().current_region, 2);
    ticks(&mut engine, 3);
    assert_eq!(engine.track(track).unwrap().current_region, 3);
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn test_trigger_at_last_region_releases_track() {
    let (mut engine, _sink) = setup(vec![sound(1, 2).marker(1, 0, "end")]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    engine.arm_trigger(Trigger::new("end", 4));

    ticks(&mut engine, 3);
    assert!(engine.track(track).is_none());
    assert!(engine.pool().slot(FIRST_SHADOW).is_some());
}

#[test]
fn test_trigger_follow_up_rebinds_track() {
    let (mut engine, sink) = setup(vec![sound(1, 4).marker(1, 0, "boss"), sound(2, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let first_queue = output(&engine, track);
    engine.arm_trigger(Trigger {
        follow_up: Some(SoundId(2)),
        ..Trigger::new("boss", 6)
    });

    ticks(&mut engine, 3);

    let state = engine.track(track).unwrap();
    assert_eq!(state.sound_id, SoundId(2));
    assert_eq!(state.current_region, 0);
    assert_eq!(state.region_offset, 50);
    assert_eq!(state.output, sink.queues().last().copied());
    assert_eq!(engine.find_track(SoundId(2)), Some(track));

    let shadow = engine.pool().slot(FIRST_SHADOW).unwrap();
    assert_eq!(shadow.sound_id, SoundId(1));
    assert_eq!(shadow.output, Some(first_queue));
}

#[test]
fn test_follow_up_already_playing_releases_track() {
    let (mut engine, _sink) = setup(vec![sound(1, 4).marker(1, 0, "boss"), sound(2, 4)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let other = engine.start_sound(SoundId(2), VolumeGroup::Music, 127, 0).unwrap();
    engine.arm_trigger(Trigger {
        follow_up: Some(SoundId(2)),
        ..Trigger::new("boss", 6)
    });

    ticks(&mut engine, 3);
    assert!(engine.track(track).is_none());
    assert!(engine.track(other).is_some());
    assert!(engine.pool().slot(FIRST_SHADOW).is_some());
}

// =============================================================================
// Gain, streams and global state
// =============================================================================

#[test]
fn test_gain_follows_volume_and_pan() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    let track = engine
        .start_sound_with(StartOptions {
            volume: 100,
            pan: -40,
            ..StartOptions::new(SoundId(1), VolumeGroup::Sfx)
        })
        .unwrap();
    engine.tick();
    assert_eq!(sink.volume_balance(output(&engine, track)), Some((100, -40)));

    engine.set_pan(track, 127).unwrap();
    engine.set_volume(track, 64).unwrap();
    engine.tick();
    assert_eq!(sink.volume_balance(output(&engine, track)), Some((64, 127)));
}

#[test]
fn test_set_volume_cancels_fade() {
    let (mut engine, _sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    engine.set_fade(track, 0, 10).unwrap();
    engine.set_volume(track, 90).unwrap();
    engine.tick();
    let state = engine.track(track).unwrap();
    assert!(!state.fade.active);
    assert_eq!(state.public_volume(), 90);
}

#[test]
fn test_fade_to_zero_releases_track() {
    let (mut engine, sink) = setup(vec![sound(1, 8)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let queue = output(&engine, track);
    engine.set_fade(track, 0, 4).unwrap();

    ticks(&mut engine, 3);
    assert!(engine.track(track).is_some());
    engine.tick();
    assert!(engine.track(track).is_none());
    assert!(sink.is_finished(queue));
}

#[test]
fn test_stream_track_is_not_fed_by_engine() {
    let (mut engine, sink) = setup(vec![]);
    let stream = engine
        .start_stream(SoundId(50), VolumeGroup::Voice, 22_050, 16, 2, 100)
        .unwrap();
    let queue = output(&engine, stream);
    engine.push_stream(stream, vec![0; 64]).unwrap();

    ticks(&mut engine, 3);
    assert_eq!(sink.bytes_queued(queue), 64);
    assert_eq!(sink.volume_balance(queue), Some((100, 0)));
    assert!(engine.is_speech_active());
    assert_eq!(
        sink.queue(queue).unwrap().flags,
        MixerFlags::BITS_16 | MixerFlags::STEREO
    );

    assert!(matches!(
        engine.start_stream(SoundId(51), VolumeGroup::Sfx, 22_050, 12, 1, 100),
        Err(TrackError::UnsupportedBitDepth(12))
    ));
}

#[test]
fn test_push_to_region_track_is_rejected() {
    let (mut engine, _sink) = setup(vec![sound(1, 1)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    assert!(matches!(
        engine.push_stream(track, vec![0; 4]),
        Err(TrackError::InvalidTrack(_))
    ));
}

#[test]
fn test_paused_engine_does_not_tick() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    engine.set_paused(true);
    ticks(&mut engine, 5);
    assert_eq!(engine.music_timer(), 0);
    assert_eq!(sink.bytes_queued(output(&engine, track)), 0);

    engine.set_paused(false);
    engine.tick();
    assert_eq!(engine.music_timer(), 1);
    assert_eq!(sink.bytes_queued(output(&engine, track)), 100);
}

#[test]
fn test_mixer_not_ready_skips_feed_but_fades() {
    let (mut engine, sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();
    let queue = output(&engine, track);
    sink.set_ready(false);

    engine.tick();
    assert_eq!(engine.music_timer(), 1);
    assert_eq!(engine.track(track).unwrap().current_region, -1);
    assert_eq!(sink.bytes_queued(queue), 0);
    assert_eq!(sink.volume_balance(queue), Some((0, 0)));

    engine.set_fade(track, 0, 2).unwrap();
    ticks(&mut engine, 2);
    assert!(engine.track(track).is_none());
}

#[test]
fn test_unsupported_width_releases_track() {
    let odd = SoundDescriptor::builder(SoundId(3), "odd")
        .format(24, 1, 1000)
        .region(Region::new(0, 300))
        .data(vec![0; 300]);
    let (mut engine, sink) = setup(vec![odd]);
    let track = engine.start_sound(SoundId(3), VolumeGroup::Sfx, 127, 0).unwrap();
    let queue = output(&engine, track);

    engine.tick();
    assert!(engine.track(track).is_none());
    assert!(sink.is_finished(queue));
}

#[test]
fn test_radio_chatter_applies_to_configured_sound_only() {
    let config = EngineConfig {
        radio_chatter_sound: 1,
        ..config()
    };
    let (mut engine, sink) = setup_with(config, vec![sound(1, 2), sound(2, 2)]);
    let radio = engine.start_sound(SoundId(1), VolumeGroup::Voice, 127, 0).unwrap();
    let plain = engine.start_sound(SoundId(2), VolumeGroup::Sfx, 127, 0).unwrap();
    engine.set_radio_chatter(true);
    engine.tick();

    let mut expected = pattern(100);
    apply_radio_chatter(&mut expected);
    assert_eq!(sink.queue(output(&engine, radio)).unwrap().data, expected);
    assert_eq!(sink.queue(output(&engine, plain)).unwrap().data, pattern(100));
}

#[test]
fn test_music_ducks_while_voice_plays() {
    let config = EngineConfig {
        preset: ProfilePreset::EqualPower,
        ..config()
    };
    let (mut engine, _sink) = setup_with(config, vec![sound(1, 8), sound(2, 8)]);
    let music = engine.start_sound(SoundId(1), VolumeGroup::Music, 127, 0).unwrap();
    let voice = engine.start_sound(SoundId(2), VolumeGroup::Voice, 127, 0).unwrap();

    engine.tick();
    assert!(engine.is_speech_active());
    let ducked = engine.track(music).unwrap().gain_reduction;
    assert!(ducked > 0);
    assert_eq!(engine.track(voice).unwrap().gain_reduction, 0);

    engine.stop_sound(voice).unwrap();
    engine.tick();
    assert!(!engine.is_speech_active());
    assert_eq!(engine.track(music).unwrap().gain_reduction, 0);
}

#[test]
fn test_commands_route_to_operations() {
    let (mut engine, _sink) = setup(vec![sound(1, 2)]);
    let track = engine.start_sound(SoundId(1), VolumeGroup::Sfx, 127, 0).unwrap();

    engine.apply(EngineCommand::SetPan { track, pan: 20 }).unwrap();
    engine.apply(EngineCommand::SetHook { track, hook: 4 }).unwrap();
    engine
        .apply(EngineCommand::ArmTrigger(Trigger::new("x", 1)))
        .unwrap();
    engine.apply(EngineCommand::SetRadioChatter(true)).unwrap();

    let state = engine.track(track).unwrap();
    assert_eq!((state.pan, state.hook_id), (20, 4));
    assert!(engine.trigger().is_some());
    assert!(engine.radio_chatter());

    engine.apply(EngineCommand::DisarmTrigger).unwrap();
    engine.apply(EngineCommand::Stop(track)).unwrap();
    assert!(engine.trigger().is_none());
    assert!(engine.apply(EngineCommand::SetVolume { track, volume: 1 }).is_err());
}
