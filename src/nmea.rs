use tinyvec::ArrayVec;

use crate::PositionFix;

pub mod fields;
pub mod generator;
pub mod parser;

pub use generator::{MessageId, NmeaGenerator, PubxRate, SendableSentence};
pub use parser::{parse, Gga, Gll, ParsedSentence, Rmc, SentenceKind};

#[derive(Default, Debug, Copy, Clone)]
pub struct NmeaBuf<const N: usize>(pub ArrayVec<[u8; N]>);

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for NmeaBuf<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=[u8]:a}", self.0.as_slice())
    }
}

impl<const N: usize> core::ops::Deref for NmeaBuf<N> {
    type Target = ArrayVec<[u8; N]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> core::ops::DerefMut for NmeaBuf<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Running XOR over the bytes between `$` and `*`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NmeaChecksum(pub u8);

impl NmeaChecksum {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(self, byte: u8) -> Self {
        Self(self.0 ^ byte)
    }

    pub fn over(bytes: &[u8]) -> Self {
        bytes.iter().fold(Self::new(), |c, &b| c.next(b))
    }
}

impl PartialEq<u8> for NmeaChecksum {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaError {
    #[error("sentence does not start with '$'")]
    MissingStart,
    #[error("checksum missing or misplaced")]
    MissingOrMisplacedChecksum,
    #[error("checksum mismatch: computed {expect:#04x}, sentence carries {saw:?}")]
    ChecksumMismatch { expect: u8, saw: Option<u8> },
    #[error("sentence type not handled")]
    UnrecognizedSentenceType,
    #[error("required field `{0}` is empty")]
    MissingField(&'static str),
    #[error("field `{0}` is malformed")]
    BadField(&'static str),
    #[error("receiver reports no fix")]
    NoFix,
}

/// Outcome of handing one sentence to [`parse_into`], ordered by how much the
/// position can be trusted.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseStatus {
    Invalid = 0,
    ValidLowConfidence = 1,
    Valid = 2,
}

impl ParseStatus {
    /// Whether the sentence carried a position worth storing.
    pub fn has_position(self) -> bool {
        self >= ParseStatus::ValidLowConfidence
    }
}

impl From<&Result<ParsedSentence, NmeaError>> for ParseStatus {
    fn from(res: &Result<ParsedSentence, NmeaError>) -> Self {
        match res {
            Ok(sentence) => sentence.status(),
            Err(_) => ParseStatus::Invalid,
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Check the `*HH` suffix of a sentence and return the checksummed body, i.e.
/// everything strictly between `$` and `*`.
pub fn verify(sentence: &[u8]) -> Result<&[u8], NmeaError> {
    let body = match sentence.split_first() {
        Some((b'$', rest)) => rest,
        _ => return Err(NmeaError::MissingStart),
    };
    let star = body
        .iter()
        .position(|&b| b == b'*')
        .ok_or(NmeaError::MissingOrMisplacedChecksum)?;
    let (data, suffix) = body.split_at(star);
    let hex = suffix
        .get(1..3)
        .ok_or(NmeaError::MissingOrMisplacedChecksum)?;
    // Nothing to checksum is a broken sentence, not a checksum of zero
    if data.is_empty() {
        return Err(NmeaError::MissingOrMisplacedChecksum);
    }

    let expect = NmeaChecksum::over(data);
    let saw = match (hex_digit(hex[0]), hex_digit(hex[1])) {
        (Some(hi), Some(lo)) => Some((hi << 4) | lo),
        _ => None,
    };
    match saw {
        Some(saw) if expect == saw => Ok(data),
        _ => Err(NmeaError::ChecksumMismatch {
            expect: expect.0,
            saw,
        }),
    }
}

pub fn validate(sentence: &[u8]) -> bool {
    verify(sentence).is_ok()
}

/// Parse one raw sentence and, if it carries a usable position, write it into
/// `fix`. `fix` is left untouched for anything `Invalid`.
pub fn parse_into(sentence: &[u8], fix: &mut PositionFix) -> ParseStatus {
    match parse(sentence) {
        Ok(parsed) => {
            parsed.apply_to(fix);
            parsed.status()
        }
        Err(NmeaError::UnrecognizedSentenceType) => {
            log_trace!("ignoring sentence type");
            ParseStatus::Invalid
        }
        Err(e) => {
            log_debug!("rejected sentence: {}", e);
            ParseStatus::Invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    #[test]
    fn accepts_known_good_sentence() {
        let body = verify(GGA).unwrap();
        assert!(body.starts_with(b"GPGGA,"));
        assert!(body.ends_with(b",,"));
        assert!(validate(GGA));
    }

    #[test]
    fn hex_case_does_not_matter() {
        assert!(validate(b"$GPGLL,4916.45,N,12311.12,W,225444,A*31"));
        assert!(validate(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47"));
        assert!(validate(b"$GNRMC,,V,,,,,,,,,,N*4d"));
    }

    #[test]
    fn any_single_tampered_byte_fails() {
        let star = GGA.iter().position(|&b| b == b'*').unwrap();
        for i in 1..star {
            let mut tampered = GGA.to_vec();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            assert!(!validate(&tampered), "byte {} flipped but still valid", i);
        }
    }

    #[test]
    fn flipped_checksum_digit_is_a_mismatch() {
        let res = verify(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48\r\n");
        assert_eq!(
            res,
            Err(NmeaError::ChecksumMismatch {
                expect: 0x47,
                saw: Some(0x48)
            })
        );
    }

    #[test]
    fn malformed_hex_is_a_mismatch_not_a_panic() {
        assert_eq!(
            verify(b"$GPGLL,4916.45,N,12311.12,W,225444,A*G1"),
            Err(NmeaError::ChecksumMismatch {
                expect: 0x31,
                saw: None
            })
        );
        assert!(!validate(b"$GPGLL,4916.45,N,12311.12,W,225444,A*+1"));
    }

    #[test]
    fn checksum_position_is_checked() {
        assert_eq!(
            verify(b"$GPGLL,4916.45,N,12311.12,W,225444,A\r\n"),
            Err(NmeaError::MissingOrMisplacedChecksum)
        );
        assert_eq!(
            verify(b"$GPGLL,4916.45,N,12311.12,W,225444,A*3"),
            Err(NmeaError::MissingOrMisplacedChecksum)
        );
        assert_eq!(verify(b"$*00"), Err(NmeaError::MissingOrMisplacedChecksum));
        assert_eq!(verify(b"GPGLL*00"), Err(NmeaError::MissingStart));
        assert_eq!(verify(b""), Err(NmeaError::MissingStart));
    }

    #[test]
    fn parse_into_leaves_fix_alone_on_failure() {
        let before = PositionFix {
            latitude: 1.0,
            longitude: 2.0,
            altitude: Some(3.0),
        };
        let mut fix = before;
        assert_eq!(
            parse_into(b"$GPGSV,1,1,00*79\r\n", &mut fix),
            ParseStatus::Invalid
        );
        assert_eq!(
            parse_into(b"$GPGLL,4916.45,N,12311.12,W,225444,V*26\r\n", &mut fix),
            ParseStatus::Invalid
        );
        assert_eq!(fix, before);

        assert_eq!(parse_into(GGA, &mut fix), ParseStatus::Valid);
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_666).abs() < 1e-4);
        assert_eq!(fix.altitude, Some(545.4));
    }

    #[test]
    fn status_ordering() {
        assert!(ParseStatus::Valid > ParseStatus::ValidLowConfidence);
        assert!(ParseStatus::ValidLowConfidence > ParseStatus::Invalid);
        assert_eq!(ParseStatus::ValidLowConfidence as u8, 1);
        assert!(!ParseStatus::Invalid.has_position());
    }
}
