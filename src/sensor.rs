use crate::retry::Retry;
use embedded_hal::blocking::{delay::DelayMs, i2c};
use std::fmt;

const NAME: &str = "BH1750";

/// An illuminance measurement, in lux.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Lux(f32);

/// A recoverable failure to take a single measurement.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorFault {
    /// The bus transaction did not complete (NACK, timeout, arbitration loss...).
    Bus(String),
    /// The sensor reported its full-scale value.
    Saturated,
    /// The converted value is not a plausible illuminance.
    OutOfRange(f32),
}

/// A light sensor that takes one fresh measurement per call.
pub trait LightSensor {
    const NAME: &'static str;

    fn read(&mut self) -> Result<Lux, SensorFault>;
}

// === impl Lux ===

impl Lux {
    /// Full sunlight tops out around here.
    pub const MAX: f32 = 100_000.0;

    pub fn new(lux: f32) -> Result<Self, SensorFault> {
        if (0.0..=Self::MAX).contains(&lux) {
            Ok(Self(lux))
        } else {
            Err(SensorFault::OutOfRange(lux))
        }
    }

    #[must_use]
    pub fn get(self) -> f32 {
        self.0
    }
}

/// Formats with two fractional digits, as published on the wire.
impl fmt::Display for Lux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// === impl SensorFault ===

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorFault::Bus(error) => write!(f, "bus transaction failed: {error}"),
            SensorFault::Saturated => f.write_str("sensor saturated"),
            SensorFault::OutOfRange(lux) => write!(f, "reading out of range: {lux} lx"),
        }
    }
}

impl std::error::Error for SensorFault {}

impl<E: fmt::Debug> From<bh1750::Error<E>> for SensorFault {
    fn from(error: bh1750::Error<E>) -> Self {
        match error {
            bh1750::Error::I2c(error) => SensorFault::Bus(format!("{error:?}")),
            bh1750::Error::Saturated => SensorFault::Saturated,
        }
    }
}

// === impl Bh1750 ===

impl<I, D, E> LightSensor for bh1750::Bh1750<I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
    E: fmt::Debug,
{
    const NAME: &'static str = NAME;

    fn read(&mut self) -> Result<Lux, SensorFault> {
        let lux = self.read_lux()?;
        Lux::new(lux)
    }
}

/// Brings up a BH1750, retrying a few times if the bus hiccups.
///
/// A sensor that never answers is still returned: every read will report a
/// fault until it does, but that should not keep the rest of the device from
/// running.
pub fn bringup<I, D, E>(
    i2c: I,
    delay: D,
    addr: bh1750::Address,
    retries: usize,
) -> bh1750::Bh1750<I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
    E: fmt::Debug,
{
    log::debug!(target: NAME, "connecting to {NAME} at {:#x}", addr.addr());

    let mut sensor = bh1750::Bh1750::new(i2c, delay, addr);
    match Retry::new(retries)
        .with_target("lumiconnect::sensor")
        .run(|| sensor.init())
    {
        Ok(()) => log::info!(target: NAME, "{NAME} ready"),
        Err(error) => log::warn!(target: NAME, "failed to initialize {NAME}: {error}; continuing anyway"),
    }
    sensor
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted readings. Running out is a bus fault.
    #[derive(Debug, Default)]
    pub(crate) struct MockSensor {
        pub(crate) readings: VecDeque<Result<Lux, SensorFault>>,
        pub(crate) reads: usize,
    }

    impl MockSensor {
        pub(crate) fn with_lux(values: &[f32]) -> Self {
            Self {
                readings: values.iter().map(|&lux| Lux::new(lux)).collect(),
                reads: 0,
            }
        }
    }

    impl LightSensor for MockSensor {
        const NAME: &'static str = "mock";

        fn read(&mut self) -> Result<Lux, SensorFault> {
            self.reads += 1;
            self.readings
                .pop_front()
                .unwrap_or_else(|| Err(SensorFault::Bus("no reading scripted".into())))
        }
    }
}
