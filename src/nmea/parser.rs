use chrono::{NaiveDate, NaiveTime};

use super::{
    fields::{latitude, longitude, number, utc_date, utc_time, Fields},
    verify, NmeaError, ParseStatus,
};
use crate::{config::MIN_SATELLITES, PositionFix};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SentenceKind {
    Gga,
    Gll,
    Rmc,
    Unknown,
}

impl SentenceKind {
    /// Classify by the first six bytes, `$` + talker + type. Only the GPS
    /// (`GP`) and multi-constellation (`GN`) talkers are recognised.
    pub fn from_header(sentence: &[u8]) -> Self {
        match sentence.get(..6) {
            Some(b"$GPGGA" | b"$GNGGA") => SentenceKind::Gga,
            Some(b"$GPGLL" | b"$GNGLL") => SentenceKind::Gll,
            Some(b"$GPRMC" | b"$GNRMC") => SentenceKind::Rmc,
            _ => SentenceKind::Unknown,
        }
    }
}

/// Global positioning system fix data
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Gga {
    pub time: NaiveTime,
    pub latitude: f32,
    pub longitude: f32,
    /// 1 = GPS, 2 = DGPS, ... 6 = dead reckoning. Never 0 here.
    pub fix_quality: u8,
    pub satellites: u8,
    pub hdop: f32,
    pub altitude: Option<f32>,
}

/// Geographic position, latitude/longitude
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Gll {
    pub latitude: f32,
    pub longitude: f32,
    pub time: NaiveTime,
}

/// Recommended minimum specific GNSS data
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rmc {
    pub time: Option<NaiveTime>,
    pub latitude: f32,
    pub longitude: f32,
    pub speed_knots: Option<f32>,
    pub course: Option<f32>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ParsedSentence {
    Gga(Gga),
    Gll(Gll),
    Rmc(Rmc),
}

impl ParsedSentence {
    pub fn kind(&self) -> SentenceKind {
        match self {
            ParsedSentence::Gga(_) => SentenceKind::Gga,
            ParsedSentence::Gll(_) => SentenceKind::Gll,
            ParsedSentence::Rmc(_) => SentenceKind::Rmc,
        }
    }

    /// GGA with too few satellites still has a position, just a shaky one.
    /// GLL and RMC have no such notion.
    pub fn status(&self) -> ParseStatus {
        match self {
            ParsedSentence::Gga(gga) if gga.satellites < MIN_SATELLITES => {
                ParseStatus::ValidLowConfidence
            }
            _ => ParseStatus::Valid,
        }
    }

    pub fn latitude(&self) -> f32 {
        match self {
            ParsedSentence::Gga(s) => s.latitude,
            ParsedSentence::Gll(s) => s.latitude,
            ParsedSentence::Rmc(s) => s.latitude,
        }
    }

    pub fn longitude(&self) -> f32 {
        match self {
            ParsedSentence::Gga(s) => s.longitude,
            ParsedSentence::Gll(s) => s.longitude,
            ParsedSentence::Rmc(s) => s.longitude,
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            ParsedSentence::Gga(s) => Some(s.time),
            ParsedSentence::Gll(s) => Some(s.time),
            ParsedSentence::Rmc(s) => s.time,
        }
    }

    /// Overwrite the position in `fix`. Only GGA knows the altitude, the other
    /// sentences leave whatever was there.
    pub fn apply_to(&self, fix: &mut PositionFix) {
        fix.latitude = self.latitude();
        fix.longitude = self.longitude();
        if let ParsedSentence::Gga(gga) = self {
            fix.altitude = gga.altitude;
        }
    }
}

fn required_time(fields: &mut Fields<'_>) -> Result<NaiveTime, NmeaError> {
    utc_time(fields.required("time")?).ok_or(NmeaError::BadField("time"))
}

// Every field up to the altitude must be filled in, the altitude itself may be
// blank
fn parse_gga(fields: &mut Fields<'_>) -> Result<Gga, NmeaError> {
    let time = required_time(fields)?;
    let latitude = latitude(fields)?;
    let longitude = longitude(fields)?;
    let fix_quality: u8 = number(fields.required("fix quality")?)
        .ok_or(NmeaError::BadField("fix quality"))?;
    if fix_quality == 0 {
        return Err(NmeaError::NoFix);
    }
    let satellites = number(fields.required("satellites")?)
        .ok_or(NmeaError::BadField("satellites"))?;
    let hdop = number(fields.required("hdop")?).ok_or(NmeaError::BadField("hdop"))?;
    // Anything after the altitude (units, geoid separation, DGPS) is ignored
    let altitude = fields.optional().and_then(number);

    Ok(Gga {
        time,
        latitude,
        longitude,
        fix_quality,
        satellites,
        hdop,
        altitude,
    })
}

fn parse_gll(fields: &mut Fields<'_>) -> Result<Gll, NmeaError> {
    let latitude = latitude(fields)?;
    let longitude = longitude(fields)?;
    let time = required_time(fields)?;
    if fields.required("status")? != b"A" {
        return Err(NmeaError::NoFix);
    }

    Ok(Gll {
        latitude,
        longitude,
        time,
    })
}

fn parse_rmc(fields: &mut Fields<'_>) -> Result<Rmc, NmeaError> {
    let time = fields.optional().and_then(utc_time);
    if fields.required("status")? != b"A" {
        return Err(NmeaError::NoFix);
    }
    let latitude = latitude(fields)?;
    let longitude = longitude(fields)?;
    let speed_knots = fields.optional().and_then(number);
    let course = fields.optional().and_then(number);
    let date = fields.optional().and_then(utc_date);

    Ok(Rmc {
        time,
        latitude,
        longitude,
        speed_knots,
        course,
        date,
    })
}

/// Validate the checksum, work out the sentence type and pull out its fields.
pub fn parse(sentence: &[u8]) -> Result<ParsedSentence, NmeaError> {
    let body = verify(sentence)?;
    let kind = SentenceKind::from_header(sentence);

    let mut fields = Fields::new(body);
    // Talker and sentence type
    fields.skip_fields(1);

    match kind {
        SentenceKind::Gga => parse_gga(&mut fields).map(ParsedSentence::Gga),
        SentenceKind::Gll => parse_gll(&mut fields).map(ParsedSentence::Gll),
        SentenceKind::Rmc => parse_rmc(&mut fields).map(ParsedSentence::Rmc),
        SentenceKind::Unknown => Err(NmeaError::UnrecognizedSentenceType),
    }
}
