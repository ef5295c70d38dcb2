pub mod codec;
pub mod player;

pub use codec::{CodecError, CodecResult, FRAME_DURATION, FRAME_SIZE};
pub use player::{AudioPlayer, PlaybackOutcome};
