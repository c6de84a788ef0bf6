//! Comma-separated field access for a single sentence body.
//!
//! Each parse builds its own [`Fields`] over a borrowed slice, so nothing is
//! shared between concurrent parses. Empty fields come out as empty slices,
//! which keeps field positions stable.

use core::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use super::NmeaError;

pub struct Fields<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Fields<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { rest: Some(body) }
    }

    /// Next field, which must be present and non-empty.
    pub fn required(&mut self, name: &'static str) -> Result<&'a [u8], NmeaError> {
        match self.next() {
            Some(field) if !field.is_empty() => Ok(field),
            _ => Err(NmeaError::MissingField(name)),
        }
    }

    /// Next field, `None` when empty or past the end of the sentence.
    pub fn optional(&mut self) -> Option<&'a [u8]> {
        self.next().filter(|field| !field.is_empty())
    }

    /// Step over `n` fields. Named apart from `Iterator::skip`, which would
    /// take the splitter by value.
    pub fn skip_fields(&mut self, n: usize) {
        for _ in 0..n {
            self.next();
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        match rest.iter().position(|&b| b == b',') {
            Some(i) => {
                self.rest = Some(&rest[i + 1..]);
                Some(&rest[..i])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

pub fn number<T: FromStr>(field: &[u8]) -> Option<T> {
    core::str::from_utf8(field).ok()?.parse().ok()
}

/// `DDMM.MMMM` (or `DDDMM.MMMM`) to decimal degrees.
pub fn ddmm_to_degrees(field: &[u8]) -> Option<f64> {
    let raw: f64 = number(field)?;
    if !(0.0..=18_000.0).contains(&raw) {
        return None;
    }
    // Truncation is floor for non-negative values
    let degrees = (raw / 100.0) as u32 as f64;
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return None;
    }
    Some(degrees + minutes / 60.0)
}

fn coordinate(
    fields: &mut Fields<'_>,
    name: &'static str,
    hemisphere: &'static str,
    (positive, negative): (u8, u8),
    max: f64,
) -> Result<f32, NmeaError> {
    let value = fields.required(name)?;
    let sign = match fields.required(hemisphere)? {
        [b] if *b == positive => 1.0,
        [b] if *b == negative => -1.0,
        _ => return Err(NmeaError::BadField(hemisphere)),
    };
    let degrees = ddmm_to_degrees(value)
        .filter(|d| *d <= max)
        .ok_or(NmeaError::BadField(name))?;
    Ok((sign * degrees) as f32)
}

/// Latitude value followed by its `N`/`S` indicator.
pub fn latitude(fields: &mut Fields<'_>) -> Result<f32, NmeaError> {
    coordinate(fields, "latitude", "N/S", (b'N', b'S'), 90.0)
}

/// Longitude value followed by its `E`/`W` indicator.
pub fn longitude(fields: &mut Fields<'_>) -> Result<f32, NmeaError> {
    coordinate(fields, "longitude", "E/W", (b'E', b'W'), 180.0)
}

fn two_digits(field: &[u8], at: usize) -> Option<u32> {
    match field.get(at..at + 2)? {
        [a @ b'0'..=b'9', b @ b'0'..=b'9'] => Some(((a - b'0') * 10 + (b - b'0')) as u32),
        _ => None,
    }
}

/// `hhmmss` with an optional fractional part.
pub fn utc_time(field: &[u8]) -> Option<NaiveTime> {
    let (hms, frac) = match field.iter().position(|&b| b == b'.') {
        Some(dot) => (&field[..dot], &field[dot + 1..]),
        None => (field, &[][..]),
    };
    if hms.len() != 6 {
        return None;
    }
    let mut milli = 0;
    let mut scale = 100;
    for &b in frac.iter().take(3) {
        if !b.is_ascii_digit() {
            return None;
        }
        milli += (b - b'0') as u32 * scale;
        scale /= 10;
    }
    NaiveTime::from_hms_milli_opt(
        two_digits(hms, 0)?,
        two_digits(hms, 2)?,
        two_digits(hms, 4)?,
        milli,
    )
}

/// `ddmmyy`. Two-digit years below 80 are taken as 20xx.
pub fn utc_date(field: &[u8]) -> Option<NaiveDate> {
    if field.len() != 6 {
        return None;
    }
    let yy = two_digits(field, 4)? as i32;
    let year = if yy < 80 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, two_digits(field, 2)?, two_digits(field, 0)?)
}
