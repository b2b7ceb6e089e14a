use crate::errors::{DecoderAttempt, ParserError};
use crate::formats::{NavisDecoder, ProvorDecoder};
use crate::model::{FloatFamily, Profile, Transmission};

pub trait ProfileDecoder {
    fn name(&self) -> &'static str;
    fn family(&self) -> FloatFamily;
    fn decode(&self, transmission: &Transmission) -> Result<Profile, ParserError>;
}

/// The decoder registered for a float family.
pub fn decoder_for(family: FloatFamily) -> &'static dyn ProfileDecoder {
    match family {
        FloatFamily::Navis => &NavisDecoder,
        FloatFamily::Provor => &ProvorDecoder,
    }
}

/// Decodes a transmission with the decoder of its float family.
pub fn decode_transmission(transmission: &Transmission) -> Result<Profile, ParserError> {
    decode_with(decoder_for(transmission.family()), transmission)
}

/// Runs one decoder; a format mismatch becomes `NoMatchingDecoder` carrying its reason.
pub fn decode_with(
    decoder: &dyn ProfileDecoder,
    transmission: &Transmission,
) -> Result<Profile, ParserError> {
    decoder.decode(transmission).map_err(|err| match err {
        ParserError::FormatMismatch { reason, .. } => ParserError::NoMatchingDecoder {
            attempts: vec![DecoderAttempt::new(decoder.name(), reason)],
        },
        other => other,
    })
}
