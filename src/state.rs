use core::cell::Cell;

use chrono::{DateTime, Utc};
use critical_section::Mutex;

use crate::{nmea::ParsedSentence, PositionFix};

/// Last known good position, shared between the interrupt-fed parser and any
/// reader. Every access is a copy inside one critical section.
pub struct SharedState {
    fix: Mutex<Cell<PositionFix>>,
    datetime: Mutex<Cell<Option<DateTime<Utc>>>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            fix: Mutex::new(Cell::new(PositionFix::new(0.0, 0.0))),
            datetime: Mutex::new(Cell::new(None)),
        }
    }

    pub fn read(&self) -> PositionFix {
        critical_section::with(|cs| self.fix.borrow(cs).get())
    }

    pub fn write(&self, fix: PositionFix) {
        critical_section::with(|cs| self.fix.borrow(cs).set(fix));
    }

    /// UTC timestamp of the most recent RMC carrying both a date and a time.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        critical_section::with(|cs| self.datetime.borrow(cs).get())
    }

    /// Fold a parsed sentence into the stored fix. Latitude, longitude and
    /// altitude change together, so a reader never sees half an update.
    pub fn apply(&self, sentence: &ParsedSentence) {
        let stamp = match sentence {
            ParsedSentence::Rmc(rmc) => match (rmc.date, rmc.time) {
                (Some(date), Some(time)) => Some(date.and_time(time).and_utc()),
                _ => None,
            },
            _ => None,
        };

        critical_section::with(|cs| {
            let cell = self.fix.borrow(cs);
            let mut fix = cell.get();
            sentence.apply_to(&mut fix);
            cell.set(fix);
            if stamp.is_some() {
                self.datetime.borrow(cs).set(stamp);
            }
        });
        log_trace!(
            "position updated: {} {}",
            sentence.latitude(),
            sentence.longitude()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::parse;
    use chrono::{Datelike, Timelike};

    #[test]
    fn starts_at_origin() {
        let state = SharedState::new();
        assert_eq!(state.read(), PositionFix::default());
        assert_eq!(state.datetime(), None);
    }

    #[test]
    fn write_then_read() {
        let state = SharedState::new();
        let fix = PositionFix {
            latitude: -33.9,
            longitude: 151.2,
            altitude: Some(12.0),
        };
        state.write(fix);
        assert_eq!(state.read(), fix);
    }

    #[test]
    fn gll_keeps_altitude_from_earlier_gga() {
        let state = SharedState::new();
        let gga = parse(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n")
            .unwrap();
        state.apply(&gga);
        let gll = parse(b"$GPGLL,4916.45,N,12311.12,W,225444,A*31\r\n").unwrap();
        state.apply(&gll);

        let fix = state.read();
        assert!((fix.latitude - 49.274_166).abs() < 1e-4);
        assert!((fix.longitude + 123.185_333).abs() < 1e-4);
        assert_eq!(fix.altitude, Some(545.4));
        // GLL has no date
        assert_eq!(state.datetime(), None);
    }

    #[test]
    fn rmc_sets_datetime() {
        let state = SharedState::new();
        let rmc = parse(
            b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        )
        .unwrap();
        state.apply(&rmc);

        let dt = state.datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (1994, 3, 23));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (12, 35, 19));
        assert_eq!(state.read().altitude, None);
    }
}
