use std::fmt;

use bstr::{BStr, BString, ByteSlice, ByteVec};
use chrono::{DateTime, FixedOffset};

use crate::ObjectError;

/// Author or committer of a commit: `Name <email> <unix-seconds> <±HHMM>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: BString,
    pub email: BString,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Offset from UTC as written by Git, e.g. `+0200` or `-0530`.
    pub timezone: String,
}

impl Identity {
    pub fn new(
        name: impl Into<BString>,
        email: impl Into<BString>,
        timestamp: i64,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            timezone: timezone.into(),
        }
    }

    /// Build an identity from a zoned timestamp.
    pub fn from_datetime(
        name: impl Into<BString>,
        email: impl Into<BString>,
        when: &DateTime<FixedOffset>,
    ) -> Self {
        let minutes = when.offset().local_minus_utc() / 60;
        Self::new(name, email, when.timestamp(), format_timezone(minutes))
    }

    /// Parse the value of an `author` or `committer` header.
    ///
    /// The email is delimited by the last `<`/`>` pair so names may
    /// contain angle brackets.
    pub fn parse(input: &[u8]) -> Result<Self, ObjectError> {
        let gt = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| invalid(input, "missing '>'"))?;
        let lt = input[..gt]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| invalid(input, "missing '<'"))?;

        let name = input[..lt].trim();
        let email = &input[lt + 1..gt];

        let rest = input[gt + 1..]
            .to_str()
            .map_err(|_| invalid(input, "non-UTF-8 date"))?;
        let mut fields = rest.split_whitespace();
        let timestamp = fields
            .next()
            .ok_or_else(|| invalid(input, "missing timestamp"))?
            .parse::<i64>()
            .map_err(|_| invalid(input, "bad timestamp"))?;
        let timezone = fields.next().unwrap_or("+0000");
        if fields.next().is_some() {
            return Err(invalid(input, "trailing data after timezone"));
        }
        parse_timezone(timezone)?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            timestamp,
            timezone: timezone.to_owned(),
        })
    }

    /// Serialize in the canonical header form.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::new(Vec::new());
        out.push_str(&self.name);
        out.push_str(b" <");
        out.push_str(&self.email);
        out.push_str(b"> ");
        out.push_str(format!("{} {}", self.timestamp, self.timezone).as_bytes());
        out
    }

    /// Offset from UTC in minutes.
    pub fn offset_minutes(&self) -> Result<i32, ObjectError> {
        parse_timezone(&self.timezone)
    }

    /// The timestamp in the identity's own timezone.
    pub fn to_datetime(&self) -> Result<DateTime<FixedOffset>, ObjectError> {
        let minutes = self.offset_minutes()?;
        let offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| ObjectError::InvalidTimezone(self.timezone.clone()))?;
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.with_timezone(&offset))
            .ok_or_else(|| {
                ObjectError::InvalidIdentity(format!("timestamp out of range: {}", self.timestamp))
            })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bytes().as_bstr())
    }
}

fn invalid(input: &[u8], reason: &str) -> ObjectError {
    ObjectError::InvalidIdentity(format!("{reason}: {:?}", BStr::new(input)))
}

/// `±HHMM` to minutes east of UTC.
fn parse_timezone(tz: &str) -> Result<i32, ObjectError> {
    let bad = || ObjectError::InvalidTimezone(tz.to_owned());
    let (sign, digits) = match tz.as_bytes().first() {
        Some(b'+') => (1, &tz[1..]),
        Some(b'-') => (-1, &tz[1..]),
        _ => return Err(bad()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| bad())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| bad())?;
    if minutes >= 60 {
        return Err(bad());
    }
    Ok(sign * (hours * 60 + minutes))
}

fn format_timezone(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.unsigned_abs();
    format!("{sign}{:02}{:02}", abs / 60, abs % 60)
}
