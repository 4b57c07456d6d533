//! Show date formatting.
//!
//! The CMS stores the "doors open" moment as an ISO 8601 timestamp. The
//! tracking sheet wants a plain `DD-MM-YYYY` calendar date, and which
//! calendar day a late-evening UTC timestamp lands on depends on the zone
//! the date is read in. That zone is explicit here instead of silently
//! depending on the host.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use thiserror::Error;

const OUTPUT_FORMAT: &str = "%d-%m-%Y";

/// Errors produced while formatting a show date.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShowDateError {
    #[error("invalid show date timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid show date zone: {0:?} (expected local, utc or +HH:MM)")]
    InvalidZone(String),
}

/// Zone whose calendar fields are used for the show date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowDateZone {
    /// The host's local time zone.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl FromStr for ShowDateZone {
    type Err = ShowDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" | "z" => Ok(Self::Utc),
            other => other
                .parse::<FixedOffset>()
                .map(Self::Fixed)
                .map_err(|_| ShowDateError::InvalidZone(s.to_string())),
        }
    }
}

impl std::fmt::Display for ShowDateZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Utc => write!(f, "utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Format an ISO 8601 timestamp as `DD-MM-YYYY` in `zone`.
///
/// Accepts RFC 3339 timestamps (`2024-03-15T19:00:00.000Z`) and bare dates
/// (`2024-03-15`); bare dates are used as-is.
///
/// # Errors
///
/// Returns `ShowDateError::InvalidTimestamp` if the input is neither.
pub fn format_show_date(iso: &str, zone: ShowDateZone) -> Result<String, ShowDateError> {
    let trimmed = iso.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        let formatted = match zone {
            ShowDateZone::Local => timestamp.with_timezone(&Local).format(OUTPUT_FORMAT).to_string(),
            ShowDateZone::Utc => timestamp.with_timezone(&Utc).format(OUTPUT_FORMAT).to_string(),
            ShowDateZone::Fixed(offset) => {
                timestamp.with_timezone(&offset).format(OUTPUT_FORMAT).to_string()
            }
        };
        return Ok(formatted);
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.format(OUTPUT_FORMAT).to_string())
        .map_err(|_| ShowDateError::InvalidTimestamp(iso.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_utc() {
        let formatted = format_show_date("2024-03-15T19:00:00Z", ShowDateZone::Utc).unwrap();
        assert_eq!(formatted, "15-03-2024");
    }

    #[test]
    fn test_format_with_fractional_seconds() {
        let formatted =
            format_show_date("2024-03-15T19:00:00.000Z", ShowDateZone::Utc).unwrap();
        assert_eq!(formatted, "15-03-2024");
    }

    #[test]
    fn test_format_fixed_offset_rolls_calendar_day() {
        // 19:00 UTC is 06:00 the next morning at +11:00
        let zone: ShowDateZone = "+11:00".parse().unwrap();
        let formatted = format_show_date("2024-03-15T19:00:00Z", zone).unwrap();
        assert_eq!(formatted, "16-03-2024");

        let zone: ShowDateZone = "-05:00".parse().unwrap();
        let formatted = format_show_date("2024-03-15T02:00:00Z", zone).unwrap();
        assert_eq!(formatted, "14-03-2024");
    }

    #[test]
    fn test_format_local_matches_chrono_local() {
        let expected = DateTime::parse_from_rfc3339("2024-03-15T19:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .format("%d-%m-%Y")
            .to_string();
        let formatted = format_show_date("2024-03-15T19:00:00Z", ShowDateZone::Local).unwrap();
        assert_eq!(formatted, expected);
    }

    #[test]
    fn test_format_bare_date() {
        let formatted = format_show_date("2025-01-02", ShowDateZone::Local).unwrap();
        assert_eq!(formatted, "02-01-2025");
    }

    #[test]
    fn test_format_invalid() {
        let err = format_show_date("next friday", ShowDateZone::Utc).unwrap_err();
        assert!(matches!(err, ShowDateError::InvalidTimestamp(_)));
        assert!(format_show_date("", ShowDateZone::Utc).is_err());
    }

    #[test]
    fn test_zone_parsing() {
        assert_eq!("local".parse::<ShowDateZone>().unwrap(), ShowDateZone::Local);
        assert_eq!("UTC".parse::<ShowDateZone>().unwrap(), ShowDateZone::Utc);
        assert!(matches!(
            "+10:00".parse::<ShowDateZone>().unwrap(),
            ShowDateZone::Fixed(_)
        ));
        assert!(matches!(
            "Mars/Olympus".parse::<ShowDateZone>(),
            Err(ShowDateError::InvalidZone(_))
        ));
    }
}
