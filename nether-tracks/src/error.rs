//! Engine error type

use crate::pool::TrackRef;
use crate::sound::SoundId;
use crate::track::TrackKind;

/// Errors returned by engine operations
///
/// Conditions that only affect a single track during a tick (unsupported
/// sample width, failed crossfade clone, dangling jump) are logged and
/// handled in place; they never come back out of [`crate::TrackEngine::tick`].
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The region store does not know this sound
    #[error("sound {0} not found")]
    SoundNotFound(SoundId),

    /// The region store returned metadata that cannot be played
    #[error("sound {id} is corrupt: {reason}")]
    CorruptSound { id: SoundId, reason: String },

    /// No free slot of the requested kind
    #[error("no free {0} track slot")]
    PoolFull(TrackKind),

    /// A primary track already plays this sound
    #[error("sound {0} is already playing")]
    AlreadyPlaying(SoundId),

    /// The reference is stale or out of range
    #[error("track reference {0} is not active")]
    InvalidTrack(TrackRef),

    /// Sample width other than 8, 12 or 16 bits
    #[error("unsupported sample width: {0} bits")]
    UnsupportedBitDepth(u8),

    /// Save data written by a newer engine
    #[error("unsupported save version {0}")]
    UnsupportedSaveVersion(u32),

    /// Reading or writing save data failed
    #[error("save I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("invalid engine configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, TrackError>;
