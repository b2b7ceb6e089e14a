use chrono::NaiveDateTime;
use tracing::debug;

use crate::errors::ParserError;
use crate::frame::ChannelFrameBuilder;
use crate::model::{
    EngineeringTelemetry, FloatFamily, Profile, ProfileHeader, ProfileKey, SkipReason, SkippedRow,
    Transmission,
};
use crate::registry::ProfileDecoder;

use super::common::{
    build_park_dataframe, first_digit_run, parse_optional_f64, parse_timestamp, HexField,
    ParkColumns,
};
use super::schema::{NavisLayout, ACCEPTED_ROW_LENGTHS};

const PROFILE_BEGIN: &str = "ser1";
const PROFILE_END: &str = "Resm";
const TERMINATION: &str = "<EOT>";
const AUXILIARY_MARKERS: [&str; 2] = ["cRover", "Crover"];
const PREFERRED_FLOAT_ID: &str = "$ FloatId";
const FLOAT_ID: &str = "FloatId";
const PROFILE_ID: &str = "ProfileId=";
const TERMINATED: &str = "terminated";
const FIX: &str = "Fix:";
const PARK_SAMPLE: &str = "ParkObs:";

const TERMINATED_FORMAT: &str = "%a %b %d %H:%M:%S %Y";
const FIX_FORMAT: &str = "%m/%d/%Y %H%M%S";
const PARK_FORMAT: &str = "%b %d %Y %H:%M:%S";

const VOLTS_SUFFIX: &str = "Volts";
const AMPS_SUFFIX: &str = "Amps";
const VOLTS_PER_COUNT: f64 = 0.077;
const VOLTS_OFFSET: f64 = 0.486;
const MILLIAMPS_PER_COUNT: f64 = 4.052;
const MILLIAMPS_OFFSET: f64 = -3.606;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Header,
    ParkSample,
    ProfileData,
    Engineering,
}

/// Fields picked up from header lines, in whichever order they arrive.
#[derive(Debug, Default)]
struct HeaderScan {
    float_id: Option<u32>,
    profile_id: Option<u32>,
    timestamp: Option<NaiveDateTime>,
    timestamp_from_termination: bool,
    latitude: Option<f64>,
    longitude: Option<f64>,
    engineering: EngineeringTelemetry,
}

impl HeaderScan {
    fn scan(&mut self, line: &str) {
        if let Some(pos) = line.find(PREFERRED_FLOAT_ID) {
            if let Some(id) = first_digit_run(&line[pos + PREFERRED_FLOAT_ID.len()..]) {
                self.float_id = Some(id);
            }
            return;
        }
        if let Some(pos) = line.find(FLOAT_ID) {
            if self.float_id.is_none() {
                self.float_id = first_digit_run(&line[pos + FLOAT_ID.len()..]);
            }
            return;
        }
        if let Some(pos) = line.find(PROFILE_ID) {
            if let Some(id) = first_digit_run(&line[pos + PROFILE_ID.len()..]) {
                self.profile_id = Some(id);
            }
            return;
        }
        if let Some(pos) = line.find(TERMINATED) {
            let rest = line[pos + TERMINATED.len()..].trim_start_matches(':');
            if let Some(ts) = parse_timestamp(rest, TERMINATED_FORMAT) {
                self.timestamp = Some(ts);
                self.timestamp_from_termination = true;
            }
            return;
        }
        if let Some(pos) = line.find(FIX) {
            self.scan_fix(&line[pos + FIX.len()..]);
            return;
        }
        self.scan_engineering(line);
    }

    fn scan_fix(&mut self, rest: &str) {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if let Some(lon) = tokens.first().and_then(|t| t.parse::<f64>().ok()) {
            self.longitude = Some(lon);
        }
        if let Some(lat) = tokens.get(1).and_then(|t| t.parse::<f64>().ok()) {
            self.latitude = Some(lat);
        }
        if self.timestamp.is_none() {
            if let (Some(date), Some(time)) = (tokens.get(2), tokens.get(3)) {
                self.timestamp = parse_timestamp(&format!("{date} {time}"), FIX_FORMAT);
            }
        }
    }

    fn scan_engineering(&mut self, line: &str) {
        let Some((key, value)) = line.trim().split_once('=') else {
            return;
        };
        let Ok(counts) = value.trim().trim_end_matches(';').parse::<f64>() else {
            return;
        };
        let key = key.trim();
        if let Some(subsystem) = key.strip_suffix(VOLTS_SUFFIX).filter(|s| !s.is_empty()) {
            self.engineering.volts.insert(
                subsystem.to_string(),
                VOLTS_PER_COUNT * counts + VOLTS_OFFSET,
            );
        } else if let Some(subsystem) = key.strip_suffix(AMPS_SUFFIX).filter(|s| !s.is_empty()) {
            self.engineering.current_ma.insert(
                subsystem.to_string(),
                MILLIAMPS_PER_COUNT * counts + MILLIAMPS_OFFSET,
            );
        }
    }

    fn key(&self, source_name: Option<&str>) -> Result<ProfileKey, ParserError> {
        let fallback = source_name.and_then(ProfileKey::from_file_name);
        let float_id = self.float_id.or(fallback.map(|k| k.float_id));
        let profile_id = self.profile_id.or(fallback.map(|k| k.profile_id));
        match (float_id, profile_id) {
            (Some(float_id), Some(profile_id)) => Ok(ProfileKey::new(float_id, profile_id)),
            _ => Err(ParserError::MissingIdentity {
                decoder: NavisDecoder::NAME,
                message: format!(
                    "float id {:?} and profile id {:?} not found in header or file name {:?}",
                    self.float_id, self.profile_id, source_name
                ),
            }),
        }
    }
}

pub struct NavisDecoder;

impl Default for NavisDecoder {
    fn default() -> Self {
        Self
    }
}

impl NavisDecoder {
    pub const NAME: &'static str = "NAVIS";

    /// Looks for the beam transmissometer marker ahead of the profile data.
    pub fn detect_layout(lines: &[&str]) -> NavisLayout {
        let header = lines
            .iter()
            .take_while(|line| !line.contains(PROFILE_BEGIN));
        for line in header {
            if AUXILIARY_MARKERS.iter().any(|marker| line.contains(marker)) {
                return NavisLayout::WithAuxiliaryChannels;
            }
        }
        NavisLayout::WithoutAuxiliaryChannels
    }

    pub fn decode_message(
        &self,
        message: &str,
        source_name: Option<&str>,
    ) -> Result<Profile, ParserError> {
        let lines: Vec<&str> = message
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .collect();
        let layout = Self::detect_layout(&lines);
        let fields = layout.fields();

        let mut state = ScanState::Header;
        let mut header = HeaderScan::default();
        let mut park = ParkColumns::default();
        let mut builder = ChannelFrameBuilder::with_channels(layout.channels());
        let mut skipped_rows = Vec::new();
        let mut complete = false;

        for (line_index, line) in lines.iter().enumerate() {
            if line.contains(TERMINATION) {
                complete = true;
                state = ScanState::Engineering;
                continue;
            }

            match state {
                ScanState::Header | ScanState::ParkSample => {
                    if line.contains(PROFILE_BEGIN) {
                        state = ScanState::ProfileData;
                    } else if let Some(pos) = line.find(PARK_SAMPLE) {
                        state = ScanState::ParkSample;
                        let sample = &line[pos + PARK_SAMPLE.len()..];
                        if let Err(reason) = parse_park_sample(sample, &mut park) {
                            record_skip(&mut skipped_rows, line_index, reason);
                        }
                    } else {
                        header.scan(line);
                    }
                }
                ScanState::ProfileData => {
                    if line.contains(PROFILE_END) {
                        state = ScanState::Engineering;
                    } else if !line.trim().is_empty() {
                        match decode_row(layout, &fields, line) {
                            Ok(values) => {
                                for (field, value) in fields.iter().zip(values) {
                                    builder.push(field.channel, value);
                                }
                            }
                            Err(reason) => record_skip(&mut skipped_rows, line_index, reason),
                        }
                    }
                }
                ScanState::Engineering => header.scan(line),
            }
        }

        let key = header.key(source_name)?;
        let observations = builder.build().map_err(|source| ParserError::Frame {
            decoder: Self::NAME,
            source,
        })?;
        let park_observations = build_park_dataframe(Self::NAME, park)?;

        debug!(
            profile = %key,
            samples = observations.height(),
            skipped = skipped_rows.len(),
            complete,
            "decoded navis transmission"
        );

        Ok(Profile {
            header: ProfileHeader {
                key,
                family: FloatFamily::Navis,
                timestamp: header.timestamp,
                latitude: header.latitude,
                longitude: header.longitude,
                complete,
                engineering: header.engineering,
            },
            observations,
            park_observations,
            skipped_rows,
        })
    }
}

impl ProfileDecoder for NavisDecoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> FloatFamily {
        FloatFamily::Navis
    }

    fn decode(&self, transmission: &Transmission) -> Result<Profile, ParserError> {
        match transmission {
            Transmission::Navis { name, message } => self.decode_message(message, name.as_deref()),
            other => Err(ParserError::FormatMismatch {
                decoder: Self::NAME,
                reason: format!("expected a Navis message, got a {} transmission", other.family()),
            }),
        }
    }
}

fn decode_row(
    layout: NavisLayout,
    fields: &[HexField],
    row: &str,
) -> Result<Vec<Option<f64>>, SkipReason> {
    let len = row.len();
    if !ACCEPTED_ROW_LENGTHS.contains(&len) {
        return Err(SkipReason::UnexpectedLength(len));
    }
    if row.bytes().all(|b| b == b'0') {
        return Err(SkipReason::NoData);
    }
    if len < layout.required_length() {
        return Err(SkipReason::ShortRow {
            required: layout.required_length(),
            found: len,
        });
    }
    fields
        .iter()
        .map(|field| {
            field
                .raw(row)
                .map(|raw| field.rule.decode(raw))
                .ok_or(SkipReason::InvalidHex {
                    channel: field.channel,
                })
        })
        .collect()
}

fn parse_park_sample(rest: &str, park: &mut ParkColumns) -> Result<(), SkipReason> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 9 {
        return Err(SkipReason::MalformedParkSample(format!(
            "expected 9 fields, found {}",
            tokens.len()
        )));
    }
    let stamp = tokens[..4].join(" ");
    let timestamp = parse_timestamp(&stamp, PARK_FORMAT).ok_or_else(|| {
        SkipReason::MalformedParkSample(format!("invalid timestamp '{stamp}'"))
    })?;

    let mut values = [None; 5];
    for (slot, token) in values.iter_mut().zip(&tokens[4..9]) {
        let token = token.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '.');
        *slot = parse_optional_f64(token)
            .map_err(|_| SkipReason::MalformedParkSample(format!("invalid value '{token}'")))?;
    }
    park.push(timestamp, values);
    Ok(())
}

fn record_skip(skipped: &mut Vec<SkippedRow>, line_index: usize, reason: SkipReason) {
    debug!(line_index, %reason, "skipping navis record");
    skipped.push(SkippedRow { line_index, reason });
}
