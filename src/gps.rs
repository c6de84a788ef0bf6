use core::{
    cell::Cell,
    sync::atomic::{AtomicUsize, Ordering::Relaxed},
};

use chrono::{DateTime, Utc};
use critical_section::Mutex;

use crate::{
    config::{RX_BUFSIZE, SENTENCE_BUFSIZE},
    nmea::{parse, NmeaBuf, NmeaError, ParseStatus},
    rb::{Consumer, Producer, Ringbuf},
    state::SharedState,
    PositionFix,
};

#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsError {
    #[error("receive ring full, byte dropped")]
    BufferOverflow,
    #[error("sentence does not fit the working buffer")]
    SentenceTooLong,
    #[error("caught up with the writer before the end of the sentence")]
    ReadCollision,
    #[error("serial transport error")]
    Serial,
    #[error("no valid fix within the attempt budget")]
    Timeout,
    #[error(transparent)]
    Nmea(#[from] NmeaError),
}

/// One receiver channel: the interrupt-fed byte ring, the sentence-ready flag
/// and the last known fix. Meant to live in a `static`.
pub struct Gps<const N: usize = RX_BUFSIZE> {
    rx: Ringbuf<u8, N>,
    ready: Mutex<Cell<bool>>,
    state: SharedState,
    dropped: AtomicUsize,
}

impl<const N: usize> Default for Gps<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Gps<N> {
    pub const fn new() -> Self {
        Self {
            rx: Ringbuf::new(),
            ready: Mutex::new(Cell::new(false)),
            state: SharedState::new(),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Hand out the interrupt-side and task-side halves. Only succeeds once.
    pub fn try_split(&self) -> Option<(GpsIngest<'_, N>, GpsPoll<'_, N>)> {
        let (tx, rx) = self.rx.try_split()?;
        Some((
            GpsIngest { tx, gps: self },
            GpsPoll {
                rx,
                gps: self,
                line: NmeaBuf::default(),
                discarding: false,
            },
        ))
    }

    pub fn current_fix(&self) -> PositionFix {
        self.state.read()
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.state.datetime()
    }

    /// Bytes thrown away because the receive ring was full.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped.load(Relaxed)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Read and clear the ready flag.
    pub fn take_ready(&self) -> bool {
        critical_section::with(|cs| self.ready.borrow(cs).replace(false))
    }

    fn raise_ready(&self) {
        critical_section::with(|cs| self.ready.borrow(cs).set(true));
    }

    /// Parse one sentence and store its position if it has one.
    pub fn process(&self, sentence: &[u8]) -> ParseStatus {
        let res = parse(sentence);
        let status = ParseStatus::from(&res);
        match res {
            Ok(parsed) if status.has_position() => self.state.apply(&parsed),
            Ok(_) => (),
            Err(NmeaError::UnrecognizedSentenceType) => log_trace!("ignoring sentence type"),
            Err(e) => log_debug!("rejected sentence: {}", e),
        }
        status
    }
}

/// Producer half, owned by the UART receive interrupt.
pub struct GpsIngest<'a, const N: usize = RX_BUFSIZE> {
    tx: Producer<'a, u8, N>,
    gps: &'a Gps<N>,
}

impl<const N: usize> GpsIngest<'_, N> {
    /// Queue one received byte. Never blocks.
    pub fn ingest_byte(&self, byte: u8) -> Result<(), GpsError> {
        if self.tx.try_write(byte).is_err() {
            self.gps.dropped.fetch_add(1, Relaxed);
            log_warn!("rx ring full, dropped {}", byte);
            // A ring full of junk with no terminator would otherwise never be
            // drained
            self.gps.raise_ready();
            return Err(GpsError::BufferOverflow);
        }
        if byte == b'\n' {
            self.gps.raise_ready();
        }
        Ok(())
    }
}

/// Consumer half, owned by the task that parses sentences.
pub struct GpsPoll<'a, const N: usize = RX_BUFSIZE, const S: usize = SENTENCE_BUFSIZE> {
    rx: Consumer<'a, u8, N>,
    gps: &'a Gps<N>,
    line: NmeaBuf<S>,
    // Skipping the tail of a sentence that overflowed `line`
    discarding: bool,
}

enum Scan {
    Empty,
    Collision,
    TooLong,
    Sentence,
}

impl<'a, const N: usize, const S: usize> GpsPoll<'a, N, S> {
    /// Pull the next complete sentence out of the ring, starting at its `$`.
    /// The content is not validated.
    ///
    /// Nothing is released back to the producer unless a whole line has been
    /// consumed, so after a [`GpsError::ReadCollision`] the same call can simply
    /// be repeated once more bytes have arrived.
    pub fn extract(&mut self) -> Result<Option<&[u8]>, GpsError> {
        self.line.clear();
        let mut peek = self.rx.peek();
        // Bytes read since the last commit
        let mut pending = 0;

        let scan = loop {
            let Some(b) = peek.next() else {
                if self.discarding {
                    peek.commit();
                    break Scan::Empty;
                }
                if pending == 0 {
                    break Scan::Empty;
                }
                if pending >= N - 1 {
                    // The whole ring is one unterminated run, it can never
                    // complete
                    peek.commit();
                    self.discarding = true;
                    break Scan::TooLong;
                }
                break Scan::Collision;
            };

            if self.discarding {
                if b == b'\n' {
                    self.discarding = false;
                    peek.commit();
                }
                continue;
            }

            pending += 1;
            if b == b'$' {
                // Anything before the last `$` on a line is noise
                self.line.clear();
            } else if self.line.is_empty() && b != b'\n' {
                // Only bytes from the `$` on count against the buffer
                continue;
            }
            if self.line.try_push(b).is_some() {
                peek.commit();
                self.discarding = b != b'\n';
                break Scan::TooLong;
            }
            if b == b'\n' {
                peek.commit();
                if self.line.first() == Some(&b'$') {
                    break Scan::Sentence;
                }
                self.line.clear();
                pending = 0;
            }
        };

        match scan {
            Scan::Empty => Ok(None),
            Scan::Collision => {
                self.line.clear();
                log_debug!("read collision at {}", self.rx.cursor());
                Err(GpsError::ReadCollision)
            }
            Scan::TooLong => {
                self.line.clear();
                log_warn!("sentence longer than {} bytes, discarded", S);
                Err(GpsError::SentenceTooLong)
            }
            Scan::Sentence => Ok(Some(self.line.as_slice())),
        }
    }

    /// Process everything the ready flag says is waiting. Several terminators
    /// can arrive between polls, so this keeps extracting until no complete
    /// sentence is left. Returns the best status seen, `None` if no sentence
    /// was processed.
    pub fn poll(&mut self) -> Option<ParseStatus> {
        if !self.gps.take_ready() {
            return None;
        }

        let gps = self.gps;
        let mut best = None;
        loop {
            match self.extract() {
                Ok(Some(sentence)) => {
                    let status = gps.process(sentence);
                    best = best.max(Some(status));
                }
                Ok(None) | Err(GpsError::ReadCollision) => break,
                Err(_) => continue,
            }
        }
        best
    }

    pub fn gps(&self) -> &'a Gps<N> {
        self.gps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    fn feed<const N: usize>(tx: &GpsIngest<'_, N>, bytes: &[u8]) {
        for &b in bytes {
            tx.ingest_byte(b).unwrap();
        }
    }

    #[test]
    fn extracts_one_sentence() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, GGA);
        assert_eq!(rx.extract(), Ok(Some(GGA)));
        assert_eq!(rx.extract(), Ok(None));
    }

    #[test]
    fn only_one_split() {
        let gps = Gps::<16>::new();
        let _halves = gps.try_split().unwrap();
        assert!(gps.try_split().is_none());
    }

    #[test]
    fn ready_flag_on_terminator_only() {
        let gps = Gps::<256>::new();
        let (tx, _rx) = gps.try_split().unwrap();
        feed(&tx, b"$GPGSV");
        assert!(!gps.take_ready());
        feed(&tx, b",1,1,00*79\r\n");
        assert!(gps.take_ready());
        assert!(!gps.take_ready());
    }

    #[test]
    fn overflow_drops_and_counts() {
        let gps = Gps::<8>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, b"$ABCDEF");
        assert_eq!(tx.ingest_byte(b'G'), Err(GpsError::BufferOverflow));
        assert_eq!(tx.ingest_byte(b'\n'), Err(GpsError::BufferOverflow));
        assert_eq!(gps.dropped_bytes(), 2);
        // Overflow wakes the consumer even without a terminator
        assert!(gps.take_ready());
        // A ring's worth of bytes with no terminator is given up on
        assert_eq!(rx.extract(), Err(GpsError::SentenceTooLong));
        assert!(rx.rx.is_empty());
        feed(&tx, b"HI\r\n");
        assert_eq!(rx.extract(), Ok(None));
        assert!(!rx.discarding);
        assert!(rx.rx.is_empty());
    }

    #[test]
    fn collision_leaves_cursor_alone() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        let (head, tail) = GGA.split_at(30);

        feed(&tx, head);
        let before = rx.rx.cursor();
        assert_eq!(rx.extract(), Err(GpsError::ReadCollision));
        assert_eq!(rx.rx.cursor(), before);
        assert!(rx.line.is_empty());

        feed(&tx, tail);
        assert_eq!(rx.extract(), Ok(Some(GGA)));
    }

    #[test]
    fn noise_before_dollar_is_dropped() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, b"\xff\x00junk");
        feed(&tx, GGA);
        assert_eq!(rx.extract(), Ok(Some(GGA)));
    }

    #[test]
    fn long_junk_before_dollar_does_not_count() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, &[0xb5; SENTENCE_BUFSIZE + 8]);
        feed(&tx, GGA);
        assert_eq!(rx.extract(), Ok(Some(GGA)));
        assert_eq!(rx.extract(), Ok(None));
    }

    #[test]
    fn lines_without_dollar_are_skipped() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, b"\r\nnot nmea\r\n");
        assert_eq!(rx.extract(), Ok(None));
        assert!(rx.rx.is_empty());
    }

    #[test]
    fn too_long_discards_rest_of_line() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        let mut long = vec![b'$'];
        long.extend(core::iter::repeat(b'A').take(SENTENCE_BUFSIZE + 10));
        long.extend(b"*00\r\n");

        feed(&tx, &long);
        feed(&tx, GGA);
        assert_eq!(rx.extract(), Err(GpsError::SentenceTooLong));
        assert_eq!(rx.extract(), Ok(Some(GGA)));
        assert_eq!(rx.extract(), Ok(None));
    }

    #[test]
    fn discarding_survives_a_partial_tail() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, b"$");
        feed(&tx, &[b'B'; SENTENCE_BUFSIZE]);
        assert_eq!(rx.extract(), Err(GpsError::SentenceTooLong));

        // The rest of the runaway line arrives later
        feed(&tx, b"BBBB");
        assert_eq!(rx.extract(), Ok(None));
        feed(&tx, b"BB*00\r\n");
        feed(&tx, GGA);
        assert_eq!(rx.extract(), Ok(Some(GGA)));
    }

    #[test]
    fn poll_drains_coalesced_sentences() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        assert_eq!(rx.poll(), None);

        feed(&tx, b"$GPGSV,1,1,00*79\r\n");
        feed(&tx, GGA);
        feed(&tx, b"$GPGLL,4916.45,N,12311.12,W,225444,A*31\r\n");
        assert_eq!(rx.poll(), Some(ParseStatus::Valid));
        assert!(rx.rx.is_empty());

        // GLL came last, altitude stays from the GGA
        let fix = gps.current_fix();
        assert!((fix.latitude - 49.274_166).abs() < 1e-4);
        assert_eq!(fix.altitude, Some(545.4));

        // Flag was consumed
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn poll_only_invalid() {
        let gps = Gps::<256>::new();
        let (tx, mut rx) = gps.try_split().unwrap();
        feed(&tx, b"$GPGSV,1,1,00*79\r\n");
        assert_eq!(rx.poll(), Some(ParseStatus::Invalid));
        assert_eq!(gps.current_fix(), PositionFix::default());
    }

    #[test]
    fn low_confidence_still_updates() {
        let gps = Gps::<256>::new();
        assert_eq!(
            gps.process(b"$GPGGA,123519,4807.038,N,01131.000,E,1,04,0.9,545.4,M,46.9,M,,*4B\r\n"),
            ParseStatus::ValidLowConfidence
        );
        assert!((gps.current_fix().latitude - 48.1173).abs() < 1e-4);
    }
}
