//! Packed pump timestamps.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

/// Date and optional time-of-day read from a history record.
///
/// Components are kept as read; an impossible date (month 0, day 31 in
/// February) only fails when converted to `chrono` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpTimestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// `(hour, minute, second)`; `None` for date-only records.
    pub time: Option<(u32, u32, u32)>,
}

impl PumpTimestamp {
    /// Five packed bytes: second, minute, hour, day, year, with the month
    /// split across the top bits of the first two.
    pub fn parse_5byte(data: &[u8], offset: usize) -> Option<Self> {
        let b = data.get(offset..offset + 5)?;
        Some(PumpTimestamp {
            year: 2000 + (b[4] & 0x7f) as i32,
            month: (((b[0] & 0xc0) >> 4) | ((b[1] & 0xc0) >> 6)) as u32,
            day: (b[3] & 0x1f) as u32,
            time: Some(((b[2] & 0x1f) as u32, (b[1] & 0x3f) as u32, (b[0] & 0x3f) as u32)),
        })
    }

    /// Two packed bytes: day and year, with the month split across them.
    pub fn parse_2byte(data: &[u8], offset: usize) -> Option<Self> {
        let b = data.get(offset..offset + 2)?;
        Some(PumpTimestamp {
            year: 2000 + (b[1] & 0x7f) as i32,
            month: (((b[0] & 0xe0) >> 4) | ((b[1] & 0x80) >> 7)) as u32,
            day: (b[0] & 0x1f) as u32,
            time: None,
        })
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Local pump time; date-only stamps resolve to midnight.
    pub fn naive(&self) -> Option<NaiveDateTime> {
        let (h, m, s) = self.time.unwrap_or((0, 0, 0));
        self.date()?.and_hms_opt(h, m, s)
    }

    /// Pin the local pump time to a UTC offset.
    pub fn with_offset(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        offset.from_local_datetime(&self.naive()?).single()
    }

    /// ISO-8601 text, with offset when one is known.
    pub fn to_iso(&self, offset: Option<FixedOffset>) -> Option<String> {
        match offset {
            Some(offset) => self.with_offset(offset).map(|t| t.to_rfc3339()),
            None => self
                .naive()
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for PumpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if let Some((h, m, s)) = self.time {
            write!(f, " {:02}:{:02}:{:02}", h, m, s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_5byte() {
        let data = hex::decode("010018001800440001b8571510").unwrap();
        let ts = PumpTimestamp::parse_5byte(&data, 8).expect("should parse");
        assert_eq!(ts.to_string(), "2016-02-21 23:56:01");
        assert_eq!(
            ts.naive().unwrap(),
            NaiveDate::from_ymd_opt(2016, 2, 21)
                .unwrap()
                .and_hms_opt(23, 56, 1)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_2byte() {
        let data = hex::decode("6e351005112ce9b00a000004f001401903b04b00dd01a4013c").unwrap();
        let ts = PumpTimestamp::parse_2byte(&data, 1).expect("should parse");
        assert_eq!(ts.to_string(), "2016-02-21");
        assert_eq!(ts.time, None);
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(PumpTimestamp::parse_5byte(&[1, 2, 3], 0), None);
        assert_eq!(PumpTimestamp::parse_2byte(&[1, 2, 3], 2), None);
    }

    #[test]
    fn test_invalid_date_does_not_convert() {
        let ts = PumpTimestamp {
            year: 2016,
            month: 0,
            day: 3,
            time: None,
        };
        assert_eq!(ts.naive(), None);
        assert_eq!(ts.to_iso(None), None);
    }

    #[test]
    fn test_with_offset() {
        let data = hex::decode("01b8571510").unwrap();
        let ts = PumpTimestamp::parse_5byte(&data, 0).unwrap();
        let offset = FixedOffset::west_opt(6 * 3600).unwrap();
        assert_eq!(
            ts.to_iso(Some(offset)).unwrap(),
            "2016-02-21T23:56:01-06:00"
        );
        assert_eq!(ts.to_iso(None).unwrap(), "2016-02-21T23:56:01");
    }
}
