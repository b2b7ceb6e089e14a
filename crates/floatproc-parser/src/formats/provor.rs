use chrono::NaiveDateTime;
use tracing::debug;

use crate::errors::ParserError;
use crate::frame::ChannelFrameBuilder;
use crate::model::{
    EngineeringTelemetry, FloatFamily, Profile, ProfileHeader, ProfileKey, SkipReason, SkippedRow,
    Transmission,
};
use crate::registry::ProfileDecoder;

use super::common::{build_park_dataframe, parse_optional_f64, parse_timestamp, ParkColumns};
use super::schema::PROVOR_CAST_CHANNELS;

const FIX_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FIX_FIELDS: usize = 6;
const CAST_FIELDS: usize = 2 + PROVOR_CAST_CHANNELS.len();

#[derive(Debug, Clone, PartialEq)]
struct FixRecord {
    key: ProfileKey,
    timestamp: Option<NaiveDateTime>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

pub struct ProvorDecoder;

impl Default for ProvorDecoder {
    fn default() -> Self {
        Self
    }
}

impl ProvorDecoder {
    pub const NAME: &'static str = "PROVOR";

    /// Joins a fix record file and a cast file describing the same profile.
    pub fn decode_files(&self, fix: &str, cast: &str) -> Result<Profile, ParserError> {
        let record = Self::first_fix_record(fix).ok_or_else(|| ParserError::MissingIdentity {
            decoder: Self::NAME,
            message: "fix file did not contain a valid fix record".to_string(),
        })?;

        let mut builder = ChannelFrameBuilder::with_channels(PROVOR_CAST_CHANNELS);
        let mut skipped_rows = Vec::new();

        for (line_index, line) in data_lines(cast) {
            match Self::parse_cast_row(line, record.key) {
                Ok(values) => {
                    for (channel, value) in PROVOR_CAST_CHANNELS.iter().zip(values) {
                        builder.push(channel, value);
                    }
                }
                Err(reason) => {
                    debug!(line_index, %reason, "skipping provor cast row");
                    skipped_rows.push(SkippedRow { line_index, reason });
                }
            }
        }

        builder.retain_observed();
        let observations = builder.build().map_err(|source| ParserError::Frame {
            decoder: Self::NAME,
            source,
        })?;
        let park_observations = build_park_dataframe(Self::NAME, ParkColumns::default())?;

        debug!(
            profile = %record.key,
            samples = observations.height(),
            skipped = skipped_rows.len(),
            "decoded provor transmission"
        );

        Ok(Profile {
            header: ProfileHeader {
                key: record.key,
                family: FloatFamily::Provor,
                timestamp: record.timestamp,
                latitude: record.latitude,
                longitude: record.longitude,
                complete: true,
                engineering: EngineeringTelemetry::default(),
            },
            observations,
            park_observations,
            skipped_rows,
        })
    }

    fn first_fix_record(fix: &str) -> Option<FixRecord> {
        data_lines(fix).find_map(|(_, line)| Self::parse_fix_line(line))
    }

    fn parse_fix_line(line: &str) -> Option<FixRecord> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != FIX_FIELDS {
            return None;
        }
        let key = parse_key(tokens[0], tokens[1])?;
        let timestamp = parse_timestamp(&format!("{} {}", tokens[2], tokens[3]), FIX_FORMAT);
        let latitude = parse_optional_f64(tokens[4]).ok()?;
        let longitude = parse_optional_f64(tokens[5]).ok()?;
        Some(FixRecord {
            key,
            timestamp,
            latitude,
            longitude,
        })
    }

    fn parse_cast_row(line: &str, expected: ProfileKey) -> Result<Vec<Option<f64>>, SkipReason> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != CAST_FIELDS {
            return Err(SkipReason::FieldCount {
                expected: CAST_FIELDS,
                found: tokens.len(),
            });
        }
        let key = parse_key(tokens[0], tokens[1]).ok_or_else(|| SkipReason::InvalidValue {
            field: "profile identity",
            value: format!("{} {}", tokens[0], tokens[1]),
        })?;
        if key != expected {
            return Err(SkipReason::OtherProfile(key));
        }

        PROVOR_CAST_CHANNELS
            .iter()
            .zip(&tokens[2..])
            .map(|(channel, token)| {
                parse_optional_f64(token).map_err(|_| SkipReason::InvalidValue {
                    field: *channel,
                    value: token.to_string(),
                })
            })
            .collect()
    }
}

impl ProfileDecoder for ProvorDecoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> FloatFamily {
        FloatFamily::Provor
    }

    fn decode(&self, transmission: &Transmission) -> Result<Profile, ParserError> {
        match transmission {
            Transmission::Provor { fix, cast, .. } => self.decode_files(fix, cast),
            other => Err(ParserError::FormatMismatch {
                decoder: Self::NAME,
                reason: format!(
                    "expected Provor fix and cast files, got a {} transmission",
                    other.family()
                ),
            }),
        }
    }
}

fn data_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_key(float_id: &str, profile_id: &str) -> Option<ProfileKey> {
    Some(ProfileKey::new(
        float_id.parse().ok()?,
        profile_id.parse().ok()?,
    ))
}
