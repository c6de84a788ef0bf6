//! Polled receiver access for startup, before the interrupt path is running.

use embedded_hal::{blocking::delay::DelayMs, serial};

use crate::{
    config::{GpsConfig, LINE_BUFSIZE},
    gps::GpsError,
    nmea::{parse_into, NmeaBuf, ParseStatus, PubxRate, SendableSentence},
    PositionFix,
};

pub struct BlockingGps<S, D> {
    serial: S,
    delay: D,
    config: GpsConfig,
    line: NmeaBuf<LINE_BUFSIZE>,
    fix: PositionFix,
}

impl<S, D> BlockingGps<S, D>
where
    S: serial::Read<u8>,
    D: DelayMs<u32>,
{
    /// Nothing is sent to the receiver here, see [`BlockingGps::configure`].
    pub fn new(serial: S, delay: D, config: GpsConfig) -> Self {
        Self {
            serial,
            delay,
            config,
            line: NmeaBuf::default(),
            fix: PositionFix::default(),
        }
    }

    pub fn config(&self) -> &GpsConfig {
        &self.config
    }

    fn read_byte(&mut self) -> Result<u8, GpsError> {
        nb::block!(self.serial.read()).map_err(|_| {
            log_error!("serial read failed");
            GpsError::Serial
        })
    }

    fn fill_line(&mut self) -> Result<(), GpsError> {
        self.line.clear();
        while self.read_byte()? != b'$' {}
        self.line.push(b'$');

        loop {
            let b = self.read_byte()?;
            if self.line.try_push(b).is_some() {
                log_debug!("line longer than {} bytes", LINE_BUFSIZE);
                self.line.clear();
                return Err(GpsError::SentenceTooLong);
            }
            if b == b'\n' {
                return Ok(());
            }
        }
    }

    /// Block until one whole line, from `$` through `\n`, has been read.
    /// Bytes ahead of the `$` are thrown away.
    pub fn read_line(&mut self) -> Result<&[u8], GpsError> {
        self.fill_line()?;
        Ok(self.line.as_slice())
    }

    /// Read lines until one yields a full-confidence fix. Gives up with
    /// [`GpsError::Timeout`] after `max_attempts` lines; transport errors end
    /// the attempt loop straight away.
    pub fn read_fix(&mut self, max_attempts: u32) -> Result<PositionFix, GpsError> {
        for attempt in 1..=max_attempts {
            let status = match self.fill_line() {
                Ok(()) => parse_into(&self.line, &mut self.fix),
                Err(GpsError::Serial) => return Err(GpsError::Serial),
                Err(_) => ParseStatus::Invalid,
            };
            if status == ParseStatus::Valid {
                log_info!("fix after {} attempts", attempt);
                return Ok(self.fix);
            }

            log_debug!("attempt {} gave {}", attempt, status as u8);
            if attempt < max_attempts {
                self.delay.delay_ms(self.config.retry_delay_ms);
            }
        }
        log_warn!("no fix after {} attempts", max_attempts);
        Err(GpsError::Timeout)
    }

    /// Hand back the serial port and delay, e.g. to switch to interrupt-driven
    /// reception.
    pub fn release(self) -> (S, D) {
        (self.serial, self.delay)
    }
}

impl<S, D> BlockingGps<S, D>
where
    S: serial::Read<u8> + serial::Write<u8>,
    D: DelayMs<u32>,
{
    fn write_byte(&mut self, b: u8) -> Result<(), GpsError> {
        nb::block!(self.serial.write(b)).map_err(|_| {
            log_error!("serial write failed");
            GpsError::Serial
        })
    }

    /// Send one `PUBX,40` rate command per entry, pausing `retry_delay_ms`
    /// after each so the receiver can keep up.
    pub fn configure(&mut self, rates: &[PubxRate]) -> Result<(), GpsError> {
        for rate in rates {
            let sentence = rate
                .to_bytes()
                .map_err(|_| GpsError::SentenceTooLong)?;
            for b in sentence {
                self.write_byte(b)?;
            }
            nb::block!(self.serial.flush()).map_err(|_| GpsError::Serial)?;
            log_debug!("set {} rate to {}", rate.msg.as_str(), rate.uart1);
            self.delay.delay_ms(self.config.retry_delay_ms);
        }
        log_info!("sent {} output rate commands", rates.len());
        Ok(())
    }
}
