use std::cmp::Ordering;
use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// A calendar value: a date, a time of day, or both.
///
/// Times and datetimes keep their UTC offset when one was written. Values
/// without an offset are treated as UTC when compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Moment {
    Date(NaiveDate),
    Time {
        time: NaiveTime,
        offset: Option<FixedOffset>,
    },
    DateTime {
        datetime: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
}

impl Moment {
    /// Parses the text of a date, time or datetime literal.
    ///
    /// # Examples
    ///
    /// ```
    /// use fig_lang::value::Moment;
    ///
    /// assert!(Moment::parse("2024-02-29").is_some());
    /// assert!(Moment::parse("2023-02-29").is_none());
    /// assert!(Moment::parse("10:30:00Z").is_some());
    /// assert!(Moment::parse("2024-03-01T10:30:00.250+02:00").is_some());
    /// ```
    pub fn parse(text: &str) -> Option<Moment> {
        if text.len() >= 10 && text.as_bytes().get(4) == Some(&b'-') {
            let date = NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()?;
            if text.len() == 10 {
                return Some(Moment::Date(date));
            }
            let (time, offset) = parse_time(text.get(11..)?)?;
            return Some(Moment::DateTime {
                datetime: date.and_time(time),
                offset,
            });
        }
        let (time, offset) = parse_time(text)?;
        Some(Moment::Time { time, offset })
    }

    /// The instant this moment denotes, in UTC.
    fn instant(&self) -> NaiveDateTime {
        match self {
            Moment::Date(date) => date.and_time(NaiveTime::MIN),
            Moment::Time { time, offset } => {
                let base = NaiveDate::default().and_time(*time);
                shift_to_utc(base, *offset)
            }
            Moment::DateTime { datetime, offset } => shift_to_utc(*datetime, *offset),
        }
    }

    /// Orders two moments by instant. Times of day only compare with each other.
    pub fn compare(&self, other: &Moment) -> Option<Ordering> {
        match (self, other) {
            (Moment::Time { .. }, Moment::Time { .. }) => {}
            (Moment::Time { .. }, _) | (_, Moment::Time { .. }) => return None,
            _ => {}
        }
        Some(self.instant().cmp(&other.instant()))
    }
}

fn shift_to_utc(local: NaiveDateTime, offset: Option<FixedOffset>) -> NaiveDateTime {
    match offset {
        Some(offset) => local - chrono::Duration::seconds(offset.local_minus_utc() as i64),
        None => local,
    }
}

fn parse_time(text: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let zoned = text
        .len()
        .checked_sub(6)
        .filter(|&at| at > 0)
        .and_then(|at| text.split_at_checked(at))
        .filter(|(_, zone)| zone.starts_with(['+', '-']));
    let (clock, offset) = if let Some(clock) = text.strip_suffix('Z') {
        (clock, FixedOffset::east_opt(0))
    } else if let Some((clock, zone)) = zoned {
        (clock, Some(parse_offset(zone)?))
    } else {
        (text, None)
    };

    let time = match clock.len() {
        5 => NaiveTime::parse_from_str(clock, "%H:%M").ok()?,
        _ => NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").ok()?,
    };
    Some((time, offset))
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let hours: i32 = zone.get(1..3)?.parse().ok()?;
    let minutes: i32 = zone.get(4..6)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn zone(f: &mut fmt::Formatter<'_>, offset: &Option<FixedOffset>) -> fmt::Result {
            match offset {
                Some(o) if o.local_minus_utc() == 0 => f.write_str("Z"),
                Some(o) => write!(f, "{}", o),
                None => Ok(()),
            }
        }
        match self {
            Moment::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Moment::Time { time, offset } => {
                write!(f, "{}", time.format("%H:%M:%S%.f"))?;
                zone(f, offset)
            }
            Moment::DateTime { datetime, offset } => {
                write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.f"))?;
                zone(f, offset)
            }
        }
    }
}

/// A runtime value produced by evaluating an expression.
///
/// # Examples
///
/// ```
/// use fig_lang::Value;
///
/// let port = Value::Int(8080);
/// let ratio = Value::Double(0.75);
/// let hosts = Value::Slice(vec![Value::Text("a".into()), Value::Text("b".into())]);
///
/// assert!(port.is_truthy());
/// assert_eq!(hosts.type_name(), "slice");
/// assert_eq!(ratio.to_string(), "0.75");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,

    /// `true`/`false` (also `yes`/`no`, `on`/`off`)
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit float
    Double(f64),

    /// UTF-8 text
    Text(String),

    /// Date, time or datetime
    Moment(Moment),

    /// Ordered sequence of values
    Slice(Vec<Value>),
}

impl Value {
    /// Name of the value's type, as returned by `typeof()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Moment(_) => "moment",
            Value::Slice(_) => "slice",
        }
    }

    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Double(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Moment(_) => true,
            Value::Slice(items) => !items.is_empty(),
        }
    }

    /// Get as float; integers are promoted
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_moment(&self) -> Option<&Moment> {
        match self {
            Value::Moment(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Slice(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Moment> for Value {
    fn from(m: Moment) -> Self {
        Value::Moment(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Slice(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Moment(m) => write!(f, "{}", m),
            Value::Slice(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Text(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moment_ordering_respects_offsets() {
        let a = Moment::parse("2024-03-01T10:00:00+02:00").unwrap();
        let b = Moment::parse("2024-03-01T09:00:00Z").unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_date_and_time_do_not_compare() {
        let date = Moment::parse("2024-03-01").unwrap();
        let time = Moment::parse("10:00").unwrap();
        assert_eq!(date.compare(&time), None);
    }

    #[test]
    fn test_moment_rejects_non_ascii_digits() {
        assert_eq!(Moment::parse("2024-01-1\u{663}"), None);
        assert_eq!(Moment::parse("2024-01-01T10:3\u{663}"), None);
        assert_eq!(Moment::parse("1\u{663}:00+02:00"), None);
    }

    #[test]
    fn test_moment_display() {
        assert_eq!(Moment::parse("2024-03-01").unwrap().to_string(), "2024-03-01");
        assert_eq!(Moment::parse("10:30").unwrap().to_string(), "10:30:00");
        assert_eq!(
            Moment::parse("2024-03-01 10:30:00Z").unwrap().to_string(),
            "2024-03-01T10:30:00Z"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Double(0.5).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Slice(vec![Value::Null]).is_truthy());
    }
}
