pub mod errors;
pub mod formats;
pub mod frame;
pub mod model;
mod registry;

pub use errors::{DecoderAttempt, ParserError};
pub use formats::{NavisDecoder, NavisLayout, ProvorDecoder};
pub use frame::{channel_names, channel_values, ChannelFrameBuilder};
pub use model::{
    EngineeringTelemetry, FloatFamily, Profile, ProfileHeader, ProfileKey, SkipReason, SkippedRow,
    Transmission,
};
pub use registry::{decode_transmission, decode_with, decoder_for, ProfileDecoder};
