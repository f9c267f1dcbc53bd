use bstr::{BStr, BString, ByteSlice, ByteVec};

use crate::error::UtilError;
use crate::Result;

/// A parsed git date with timezone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitDate {
    /// Seconds since Unix epoch.
    pub timestamp: i64,
    /// Timezone offset in minutes from UTC (e.g., -300 for EST).
    pub tz_offset: i32,
}

/// Git timezone offset stored as integer (e.g. -0500 for EST = -500 integer).
/// This is the same format C git uses: the "decimal parse" where -0100 => -100.
fn tz_offset_to_minutes(tz: i32) -> i32 {
    let sign = if tz < 0 { -1 } else { 1 };
    let abs = tz.unsigned_abs() as i32;
    let hours = abs / 100;
    let mins = abs % 100;
    sign * (hours * 60 + mins)
}

/// Convert minutes offset to the git-style decimal representation.
fn minutes_to_tz_offset(minutes: i32) -> i32 {
    let sign = if minutes < 0 { -1 } else { 1 };
    let abs = minutes.unsigned_abs() as i32;
    let hours = abs / 60;
    let mins = abs % 60;
    sign * (hours * 100 + mins)
}

impl GitDate {
    /// Create a GitDate from a Unix timestamp and timezone offset in minutes.
    pub fn new(timestamp: i64, tz_offset_minutes: i32) -> Self {
        Self {
            timestamp,
            tz_offset: tz_offset_minutes,
        }
    }

    /// Parse raw git format: "timestamp +/-offset" or just "timestamp".
    pub fn parse_raw(input: &str) -> Result<Self> {
        let input = input.trim();

        let parts: Vec<&str> = input.splitn(2, ' ').collect();

        let timestamp: i64 = parts[0].parse().map_err(|_| {
            UtilError::DateParse(format!("invalid timestamp: '{}'", parts[0]))
        })?;

        let tz_offset = if parts.len() > 1 {
            let tz_str = parts[1].trim();
            let tz_int: i32 = tz_str
                .parse()
                .map_err(|_| UtilError::DateParse(format!("invalid timezone: '{}'", tz_str)))?;
            tz_offset_to_minutes(tz_int)
        } else {
            0
        };

        Ok(Self {
            timestamp,
            tz_offset,
        })
    }

    /// Format in git's raw wire format: "1234567890 +0000".
    pub fn format_raw(&self) -> String {
        let tz = minutes_to_tz_offset(self.tz_offset);
        format!("{} {:+05}", self.timestamp, tz)
    }
}

/// Author/committer identity with timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub date: GitDate,
}

impl Signature {
    /// Parse from git format: `Name <email> timestamp tz`
    ///
    /// Example: "John Doe <john@example.com> 1234567890 +0000"
    pub fn parse(input: &BStr) -> Result<Self> {
        let input = input.as_bytes();

        // Find the last '>' to split off the date portion
        let gt_pos = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| UtilError::DateParse("missing '>' in signature".into()))?;

        // Find the '<' for the email
        let lt_pos = input[..gt_pos]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| UtilError::DateParse("missing '<' in signature".into()))?;

        // Name is everything before '<', trimmed
        let name = &input[..lt_pos];
        let name = name.trim();

        // Email is between '<' and '>'
        let email = &input[lt_pos + 1..gt_pos];

        // Date is everything after '>'
        let date_str = &input[gt_pos + 1..];
        let date_str = date_str.trim();
        let date_str = std::str::from_utf8(date_str).map_err(|_| {
            UtilError::DateParse("non-UTF-8 date in signature".into())
        })?;

        let date = GitDate::parse_raw(date_str)?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            date,
        })
    }

    /// Format in git's canonical format: `Name <email> timestamp tz`
    pub fn to_bytes(&self) -> BString {
        let tz = minutes_to_tz_offset(self.date.tz_offset);
        let mut out = BString::new(Vec::new());
        out.push_str(&self.name);
        out.push_str(b" <");
        out.push_str(&self.email);
        out.push_str(b"> ");
        out.push_str(format!("{} {:+05}", self.date.timestamp, tz).as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_raw() {
        let d = GitDate::parse_raw("1234567890 +0000").unwrap();
        assert_eq!(d.timestamp, 1234567890);
        assert_eq!(d.tz_offset, 0);
    }

    #[test]
    fn parse_raw_negative_tz() {
        let d = GitDate::parse_raw("1234567890 -0500").unwrap();
        assert_eq!(d.timestamp, 1234567890);
        assert_eq!(d.tz_offset, -300); // -5 hours = -300 minutes
    }

    #[test]
    fn parse_raw_positive_tz() {
        let d = GitDate::parse_raw("1234567890 +0530").unwrap();
        assert_eq!(d.timestamp, 1234567890);
        assert_eq!(d.tz_offset, 330); // 5.5 hours = 330 minutes
    }

    #[test]
    fn format_raw() {
        let d = GitDate::new(1234567890, 0);
        assert_eq!(d.format_raw(), "1234567890 +0000");
    }

    #[test]
    fn format_raw_negative_tz() {
        let d = GitDate::new(1234567890, -300);
        assert_eq!(d.format_raw(), "1234567890 -0500");
    }

    #[test]
    fn signature_parse() {
        let input = BStr::new(b"John Doe <john@example.com> 1234567890 +0000");
        let sig = Signature::parse(input).unwrap();
        assert_eq!(sig.name, BString::from("John Doe"));
        assert_eq!(sig.email, BString::from("john@example.com"));
        assert_eq!(sig.date.timestamp, 1234567890);
        assert_eq!(sig.date.tz_offset, 0);
    }

    #[test]
    fn signature_roundtrip() {
        let sig = Signature {
            name: BString::from("Jane Doe"),
            email: BString::from("jane@example.com"),
            date: GitDate::new(1234567890, -300),
        };
        let bytes = sig.to_bytes();
        assert_eq!(
            bytes,
            BString::from("Jane Doe <jane@example.com> 1234567890 -0500")
        );

        // Parse back
        let parsed = Signature::parse(bytes.as_ref()).unwrap();
        assert_eq!(parsed.name, sig.name);
        assert_eq!(parsed.email, sig.email);
        assert_eq!(parsed.date.timestamp, sig.date.timestamp);
        assert_eq!(parsed.date.tz_offset, sig.date.tz_offset);
    }

    #[test]
    fn tz_conversion_roundtrip() {
        // +0530 -> 330 minutes -> +0530
        assert_eq!(tz_offset_to_minutes(530), 330);
        assert_eq!(minutes_to_tz_offset(330), 530);

        // -0500 -> -300 minutes -> -0500
        assert_eq!(tz_offset_to_minutes(-500), -300);
        assert_eq!(minutes_to_tz_offset(-300), -500);

        // +0000 -> 0 minutes -> +0000
        assert_eq!(tz_offset_to_minutes(0), 0);
        assert_eq!(minutes_to_tz_offset(0), 0);
    }
}
