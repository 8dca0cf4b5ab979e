use std::sync::OnceLock;

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub const WINDOW_MINUTES: i64 = 10;

const EPOCH_SECONDS_CUTOFF: i128 = 100_000_000_000;
const EPOCH_MILLIS_CUTOFF: i128 = 100_000_000_000_000;
const EPOCH_MICROS_CUTOFF: i128 = 100_000_000_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// A `start_time`/`end_time` pair rendered as `YYYY-MM-DDTHH:MM:SS` (UTC, no suffix).
///
/// Both halves are produced together so `end_time` can never drift away from
/// `start_time + WINDOW_MINUTES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_time: String,
    pub end_time: String,
}

impl TimeWindow {
    pub fn starting_at(start: PrimitiveDateTime) -> Result<Self> {
        let end = start
            .checked_add(Duration::minutes(WINDOW_MINUTES))
            .ok_or_else(|| anyhow!("time window end overflows the supported range"))?;

        Ok(Self {
            start_time: format_window_timestamp(start),
            end_time: format_window_timestamp(end),
        })
    }

    pub fn from_unix_ms(timestamp_unix_ms: u64) -> Result<Self> {
        let start = datetime_from_unix_ms(timestamp_unix_ms)?;
        Self::starting_at(PrimitiveDateTime::new(start.date(), start.time()))
    }
}

/// Builds the window from a calendar date and a wall-clock time taken from
/// different sources.
pub fn stitch_window(date: Date, hour: u8, minute: u8, second: u8) -> Result<TimeWindow> {
    let time = Time::from_hms(hour, minute, second)
        .map_err(|error| anyhow!("invalid wall-clock time {hour:02}:{minute:02}:{second:02} ({error})"))?;
    TimeWindow::starting_at(PrimitiveDateTime::new(date, time))
}

pub fn parse_timestamp_to_unix_ms(raw: &str) -> Result<u64> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }

    if let Ok(epoch_raw) = candidate.parse::<i128>() {
        return epoch_to_unix_ms(epoch_raw);
    }

    let normalized = normalize_iso_candidate(candidate);
    if let Ok(parsed) = OffsetDateTime::parse(&normalized, &Rfc3339) {
        return to_unix_ms(parsed);
    }

    bail!("unsupported timestamp format: {candidate}");
}

/// UTC calendar date of a source timestamp (epoch or ISO-8601).
pub fn utc_date_of(raw: &str) -> Result<Date> {
    let timestamp_unix_ms = parse_timestamp_to_unix_ms(raw)?;
    Ok(datetime_from_unix_ms(timestamp_unix_ms)?.date())
}

/// Parses an exact `YYYY-MM-DDTHH:MM:SS` string as a naive UTC datetime.
pub fn parse_window_timestamp(raw: &str) -> Result<PrimitiveDateTime> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'T'
        && bytes[13] == b':'
        && bytes[16] == b':';
    if !well_formed {
        bail!("expected YYYY-MM-DDTHH:MM:SS, got `{raw}`");
    }

    let field = |range: std::ops::Range<usize>| -> Result<u32> {
        raw[range]
            .parse::<u32>()
            .map_err(|_| anyhow!("non-numeric component in `{raw}`"))
    };
    let year = i32::try_from(field(0..4)?)?;
    let month = Month::try_from(u8::try_from(field(5..7)?)?)
        .map_err(|error| anyhow!("invalid month in `{raw}` ({error})"))?;
    let day = u8::try_from(field(8..10)?)?;
    let date = Date::from_calendar_date(year, month, day)
        .map_err(|error| anyhow!("invalid date in `{raw}` ({error})"))?;
    let time = Time::from_hms(
        u8::try_from(field(11..13)?)?,
        u8::try_from(field(14..16)?)?,
        u8::try_from(field(17..19)?)?,
    )
    .map_err(|error| anyhow!("invalid time in `{raw}` ({error})"))?;

    Ok(PrimitiveDateTime::new(date, time))
}

#[must_use]
pub fn format_window_timestamp(dt: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

fn datetime_from_unix_ms(timestamp_unix_ms: u64) -> Result<OffsetDateTime> {
    let nanos = i128::from(timestamp_unix_ms)
        .checked_mul(NANOS_PER_MILLI)
        .ok_or_else(|| anyhow!("unix milliseconds overflow"))?;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|error| anyhow!("unix milliseconds out of range ({error})"))?;
    Ok(dt.to_offset(UtcOffset::UTC))
}

// `+0000` becomes `Z`, other `+HHMM` offsets gain their colon, a bare
// date-time is read as UTC.
fn normalize_iso_candidate(candidate: &str) -> String {
    let mut normalized = candidate.to_string();
    if normalized.len() > 10 && normalized.as_bytes()[10] == b' ' {
        normalized.replace_range(10..11, "T");
    }

    if let Some(stripped) = normalized.strip_suffix("+0000") {
        return format!("{stripped}Z");
    }
    if compact_offset_regex().is_match(&normalized) {
        return compact_offset_regex()
            .replace(&normalized, "${1}${2}${3}:${4}")
            .into_owned();
    }
    if !zone_designator_regex().is_match(&normalized) {
        normalized.push('Z');
    }
    normalized
}

fn compact_offset_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(\d{2}:\d{2}(?:\.\d+)?)([+-])(\d{2})(\d{2})$")
            .expect("compact offset regex should compile")
    })
}

fn zone_designator_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?:[Zz]|[+-]\d{2}:\d{2})$").expect("zone designator regex should compile")
    })
}

fn epoch_to_unix_ms(epoch_raw: i128) -> Result<u64> {
    if epoch_raw < 0 {
        bail!("negative epoch values are not supported");
    }

    let epoch_ms = if epoch_raw < EPOCH_SECONDS_CUTOFF {
        epoch_raw.checked_mul(1_000)
    } else if epoch_raw < EPOCH_MILLIS_CUTOFF {
        Some(epoch_raw)
    } else if epoch_raw < EPOCH_MICROS_CUTOFF {
        Some(epoch_raw / 1_000)
    } else {
        Some(epoch_raw / 1_000_000)
    }
    .ok_or_else(|| anyhow!("epoch conversion overflow"))?;

    u64::try_from(epoch_ms).map_err(|_| anyhow!("timestamp exceeds supported unix millisecond range"))
}

fn to_unix_ms(parsed: OffsetDateTime) -> Result<u64> {
    if parsed.unix_timestamp() < 0 {
        bail!("timestamps before 1970-01-01T00:00:00Z are not supported");
    }

    let unix_ms = parsed.unix_timestamp_nanos() / NANOS_PER_MILLI;
    u64::try_from(unix_ms).map_err(|_| anyhow!("timestamp exceeds supported unix millisecond range"))
}
