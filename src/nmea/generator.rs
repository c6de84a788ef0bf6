use core::fmt::{self, Write};

use super::NmeaChecksum;
use crate::FmtBuf;

const BODY_SIZE: usize = 80;
const HEX: &[u8; 16] = b"0123456789ABCDEF";

pub trait SendableSentence {
    /// Everything between `$` and `*`.
    fn write_body<W: Write>(&self, out: &mut W) -> fmt::Result;

    fn to_bytes(&self) -> Result<NmeaGenerator, fmt::Error> {
        let mut body = FmtBuf::new();
        self.write_body(&mut body)?;
        Ok(NmeaGenerator {
            body,
            state: Start,
        })
    }
}

// States are named for the portion of the sentence which is *about to be sent*
#[derive(Copy, Clone, PartialEq, Eq)]
enum GeneratorState {
    Start,
    Body { idx: usize, checksum: NmeaChecksum },
    Checksum1 { checksum: NmeaChecksum },
    Checksum2 { checksum: NmeaChecksum },
    Cr,
    Lf,
    Done,
}
use GeneratorState::*;

/// Byte-at-a-time encoder producing `$<body>*HH\r\n`.
pub struct NmeaGenerator {
    body: FmtBuf<BODY_SIZE>,
    state: GeneratorState,
}

impl NmeaGenerator {
    pub fn done(&self) -> bool {
        self.state == Done
    }
}

impl Iterator for NmeaGenerator {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let (next, out) = match self.state {
            Start => (
                Body {
                    idx: 0,
                    checksum: NmeaChecksum::new(),
                },
                b'$',
            ),
            Body { idx, checksum } => match self.body.as_bytes().get(idx) {
                Some(&b) => (
                    Body {
                        idx: idx + 1,
                        checksum: checksum.next(b),
                    },
                    b,
                ),
                None => (Checksum1 { checksum }, b'*'),
            },
            Checksum1 { checksum } => (Checksum2 { checksum }, HEX[(checksum.0 >> 4) as usize]),
            Checksum2 { checksum } => (Cr, HEX[(checksum.0 & 0x0f) as usize]),
            Cr => (Lf, b'\r'),
            Lf => (Done, b'\n'),
            Done => return None,
        };
        self.state = next;
        Some(out)
    }
}

/// Sentence identifiers accepted by `PUBX,40`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageId {
    Gga,
    Gll,
    Gsa,
    Gsv,
    Rmc,
    Vtg,
    Txt,
}

impl MessageId {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageId::Gga => "GGA",
            MessageId::Gll => "GLL",
            MessageId::Gsa => "GSA",
            MessageId::Gsv => "GSV",
            MessageId::Rmc => "RMC",
            MessageId::Vtg => "VTG",
            MessageId::Txt => "TXT",
        }
    }
}

/// u-blox proprietary `PUBX,40`: output rate of one NMEA message per port, in
/// navigation epochs (0 turns the message off).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PubxRate {
    pub msg: MessageId,
    pub ddc: u8,
    pub uart1: u8,
    pub uart2: u8,
    pub usb: u8,
    pub spi: u8,
}

impl PubxRate {
    /// Emit `msg` every `rate` epochs on UART1 only.
    pub const fn uart1(msg: MessageId, rate: u8) -> Self {
        Self {
            msg,
            ddc: 0,
            uart1: rate,
            uart2: 0,
            usb: 0,
            spi: 0,
        }
    }

    pub const fn disable(msg: MessageId) -> Self {
        Self::uart1(msg, 0)
    }
}

impl SendableSentence for PubxRate {
    fn write_body<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "PUBX,40,{},{},{},{},{},{},0",
            self.msg.as_str(),
            self.ddc,
            self.uart1,
            self.uart2,
            self.usb,
            self.spi
        )
    }
}

/// GGA once per fix on UART1, every other standard sentence off.
pub const GGA_ONLY: [PubxRate; 7] = [
    PubxRate::uart1(MessageId::Gga, 1),
    PubxRate::disable(MessageId::Gll),
    PubxRate::disable(MessageId::Gsa),
    PubxRate::disable(MessageId::Gsv),
    PubxRate::disable(MessageId::Rmc),
    PubxRate::disable(MessageId::Vtg),
    PubxRate::disable(MessageId::Txt),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::validate;

    fn collect(rate: PubxRate) -> Vec<u8> {
        rate.to_bytes().unwrap().collect()
    }

    #[test]
    fn disable_gll() {
        assert_eq!(
            collect(PubxRate::disable(MessageId::Gll)),
            b"$PUBX,40,GLL,0,0,0,0,0,0*5C\r\n"
        );
    }

    #[test]
    fn enable_gga_on_uart1() {
        let bytes = collect(PubxRate::uart1(MessageId::Gga, 1));
        assert_eq!(bytes, b"$PUBX,40,GGA,0,1,0,0,0,0*5B\r\n");
        assert!(validate(&bytes));
    }

    #[test]
    fn preset_sentences_all_validate() {
        for rate in GGA_ONLY {
            let bytes = collect(rate);
            assert!(validate(&bytes));
            assert!(bytes.ends_with(b"\r\n"));
        }
    }

    #[test]
    fn generator_reports_done() {
        let mut gen = PubxRate::disable(MessageId::Vtg).to_bytes().unwrap();
        assert!(!gen.done());
        let n = gen.by_ref().count();
        assert_eq!(n, b"$PUBX,40,VTG,0,0,0,0,0,0*5E\r\n".len());
        assert!(gen.done());
        assert_eq!(gen.next(), None);
    }

    struct Oversized;

    impl SendableSentence for Oversized {
        fn write_body<W: Write>(&self, out: &mut W) -> fmt::Result {
            for _ in 0..BODY_SIZE + 1 {
                out.write_char('X')?;
            }
            Ok(())
        }
    }

    #[test]
    fn oversized_body_is_an_error() {
        assert!(Oversized.to_bytes().is_err());
    }
}
