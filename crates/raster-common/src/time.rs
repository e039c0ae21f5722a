//! Time handling for acquisition timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The acquisition time of a raster: a single instant or an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionTime {
    /// A single UTC instant.
    Instant(DateTime<Utc>),
    /// A closed UTC interval, start <= end.
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl AcquisitionTime {
    pub fn instant(at: DateTime<Utc>) -> Self {
        AcquisitionTime::Instant(at)
    }

    /// Build an interval, rejecting reversed bounds.
    pub fn interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::ReversedInterval { start, end });
        }
        Ok(AcquisitionTime::Interval { start, end })
    }

    /// Earliest covered instant.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            AcquisitionTime::Instant(at) => *at,
            AcquisitionTime::Interval { start, .. } => *start,
        }
    }

    /// Latest covered instant.
    pub fn end(&self) -> DateTime<Utc> {
        match self {
            AcquisitionTime::Instant(at) => *at,
            AcquisitionTime::Interval { end, .. } => *end,
        }
    }

    /// Parse from ISO 8601 string.
    pub fn from_iso8601(s: &str) -> Result<DateTime<Utc>, TimeError> {
        // Try full datetime with timezone
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Try without timezone (assume UTC)
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        // Try fractional seconds without timezone
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        // Try date only
        if let Ok(ndt) =
            NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
        {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        Err(TimeError::InvalidFormat(s.to_string()))
    }

    /// Parse a compact `YYYYMMDD` date fragment.
    pub fn from_compact_date(s: &str) -> Result<NaiveDate, TimeError> {
        NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| TimeError::InvalidFormat(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Interval start ({start}) after end ({end})")]
    ReversedInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_iso8601() {
        let dt = AcquisitionTime::from_iso8601("2020-08-01T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2020);
        assert_eq!(dt.month(), 8);
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_iso8601_fractional() {
        let dt = AcquisitionTime::from_iso8601("2021-10-12T12:00:00.00Z").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_date_only() {
        let dt = AcquisitionTime::from_iso8601("2024-01-15").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.day(), 15);
    }

    #[test]
    fn test_parse_compact_date() {
        let date = AcquisitionTime::from_compact_date("20240115").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);
        assert!(AcquisitionTime::from_compact_date("2024-01-15").is_err());
    }

    #[test]
    fn test_interval_ordering() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(AcquisitionTime::interval(start, end).is_ok());
        assert!(matches!(
            AcquisitionTime::interval(end, start),
            Err(TimeError::ReversedInterval { .. })
        ));
    }

    #[test]
    fn test_instant_bounds() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap();
        let t = AcquisitionTime::instant(at);
        assert_eq!(t.start(), at);
        assert_eq!(t.end(), at);
    }
}
