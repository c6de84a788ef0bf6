#![cfg_attr(not(test), no_std)]

use core::fmt::{self, Write};
use tinyvec::ArrayVec;

#[macro_use]
mod log;

pub mod blocking;
pub mod config;
pub mod gps;
pub mod nmea;
pub mod rb;
pub mod state;

pub use blocking::BlockingGps;
pub use config::GpsConfig;
pub use gps::{Gps, GpsError, GpsIngest, GpsPoll};
pub use nmea::{NmeaError, ParseStatus, ParsedSentence, PubxRate, SentenceKind};

/// Fixed-capacity `fmt::Write` sink. Overflowing input is an `fmt::Error`, the
/// bytes that did fit are kept.
pub struct FmtBuf<const N: usize = 256>(pub ArrayVec<[u8; N]>);

impl<const N: usize> Write for FmtBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if self.0.try_push(b).is_some() {
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}

impl<const N: usize> FmtBuf<N> {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn new() -> Self {
        Self(Default::default())
    }
}

impl<const N: usize> Default for FmtBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest known position. `altitude` is only ever filled in from GGA.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionFix {
    /// Degrees, positive north
    pub latitude: f32,
    /// Degrees, positive east
    pub longitude: f32,
    /// Meters above mean sea level
    pub altitude: Option<f32>,
}

impl PositionFix {
    pub const fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }
}
