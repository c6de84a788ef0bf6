/// Size of the interrupt-fed receive ring. One slot stays free, so 255 bytes
/// can be pending at once.
pub const RX_BUFSIZE: usize = 256;

/// Working buffer for sentences pulled out of the receive ring. Matches the
/// NMEA 0183 maximum of 82 characters including `$` and `\r\n`.
pub const SENTENCE_BUFSIZE: usize = 82;

/// Working buffer for the blocking line reader.
pub const LINE_BUFSIZE: usize = 128;

/// GGA fixes with fewer satellites than this are reported as low confidence.
pub const MIN_SATELLITES: u8 = 5;

/// NEO-8M factory default.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsConfig {
    /// Line reads attempted by `BlockingGps::read_fix` before giving up
    pub max_attempts: u32,
    /// Pause between blocking read attempts, and between configuration commands
    pub retry_delay_ms: u32,
    pub baud_rate: u32,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay_ms: 100,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}
