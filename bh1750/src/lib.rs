// register map and timings from the ROHM datasheet:
// https://www.mouser.com/datasheet/2/348/bh1750fvi-e-186247.pdf
// the "measurement accuracy" of 1.2 is the typical value; the datasheet allows
// anything from 0.96 to 1.44 depending on the part.
use core::fmt;
use embedded_hal::blocking::{delay::DelayMs, i2c};

#[derive(Debug)]
pub struct Bh1750<I, D> {
    i2c: I,
    delay: D,
    addr: Address,
}

/// The 7-bit I2C address of the sensor, selected by the level of the ADDR pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Address {
    /// ADDR pin tied low (or floating, on most breakout boards).
    Low,
    /// ADDR pin tied high.
    High,
}

#[derive(Debug)]
pub enum Error<E> {
    I2c(E),
    /// The data register read back as all ones, which is what the sensor
    /// reports when the light is too bright for the selected resolution.
    Saturated,
}

mod cmd {
    pub const POWER_ON: u8 = 0x01;
    /// Clears the data register. Only valid while powered on.
    pub const RESET: u8 = 0x07;
    /// One-time H-resolution mode: 1 lx resolution, powers down afterwards.
    pub const ONE_TIME_H_RES: u8 = 0x20;
}

/// Maximum H-resolution measurement time, in milliseconds.
pub const MEASUREMENT_TIME_MS: u8 = 180;

/// Raw counts per lux at the default measurement time.
const COUNTS_PER_LUX: f32 = 1.2;

impl Address {
    pub const fn addr(self) -> u8 {
        match self {
            Address::Low => 0x23,
            Address::High => 0x5c,
        }
    }
}

impl<I, D, E> Bh1750<I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    pub fn new(i2c: I, delay: D, addr: Address) -> Self {
        Self { i2c, delay, addr }
    }

    /// Powers the sensor on and clears its data register.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        self.command(cmd::POWER_ON)?;
        self.command(cmd::RESET)
    }

    /// Performs a complete one-shot measurement and returns it in lux.
    ///
    /// Every call powers the sensor on and starts a fresh conversion, so no
    /// state carries over from a previous reading (or a previous brownout).
    pub fn read_lux(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read_raw()?;
        Ok(raw as f32 / COUNTS_PER_LUX)
    }

    pub fn read_raw(&mut self) -> Result<u16, Error<E>> {
        self.command(cmd::POWER_ON)?;
        self.command(cmd::ONE_TIME_H_RES)?;
        self.delay.delay_ms(MEASUREMENT_TIME_MS);

        let mut buf = [0u8; 2];
        self.i2c
            .read(self.addr.addr(), &mut buf[..])
            .map_err(Error::I2c)?;

        match u16::from_be_bytes(buf) {
            u16::MAX => Err(Error::Saturated),
            raw => Ok(raw),
        }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn command(&mut self, cmd: u8) -> Result<(), Error<E>> {
        self.i2c.write(self.addr.addr(), &[cmd]).map_err(Error::I2c)
    }
}

// === impl Error ===

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(error) => write!(f, "I2C error: {error:?}"),
            Error::Saturated => f.write_str("sensor saturated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_lux_eq {
        ($a:expr, $b:expr) => {
            let a: f32 = $a;
            let b: f32 = $b;
            assert!((a - b).abs() < 0.01, "{a} != {b}")
        };
    }

    #[derive(Debug, Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        reads: Vec<[u8; 2]>,
        nack: bool,
    }

    #[derive(Debug, PartialEq)]
    struct Nack;

    struct NoDelay(u32);

    impl i2c::Write for FakeBus {
        type Error = Nack;
        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Nack> {
            if self.nack {
                return Err(Nack);
            }
            self.writes.push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    impl i2c::Read for FakeBus {
        type Error = Nack;
        fn read(&mut self, _addr: u8, buf: &mut [u8]) -> Result<(), Nack> {
            let next = self.reads.pop().ok_or(Nack)?;
            buf.copy_from_slice(&next);
            Ok(())
        }
    }

    impl DelayMs<u8> for NoDelay {
        fn delay_ms(&mut self, ms: u8) {
            self.0 += ms as u32;
        }
    }

    fn sensor(reads: Vec<[u8; 2]>) -> Bh1750<FakeBus, NoDelay> {
        let bus = FakeBus {
            reads,
            ..Default::default()
        };
        Bh1750::new(bus, NoDelay(0), Address::Low)
    }

    #[test]
    fn init_powers_on_and_resets() {
        let mut bh = sensor(vec![]);
        bh.init().unwrap();
        let (bus, _) = bh.release();
        assert_eq!(bus.writes, vec![(0x23, vec![0x01]), (0x23, vec![0x07])]);
    }

    #[test]
    fn read_issues_a_full_measurement() {
        let mut bh = sensor(vec![[0x00, 0x78], [0x01, 0x2c]]);
        // 0x012c = 300 counts = 250 lx
        assert_lux_eq!(bh.read_lux().unwrap(), 250.0);
        // 0x0078 = 120 counts = 100 lx
        assert_lux_eq!(bh.read_lux().unwrap(), 100.0);

        let (bus, delay) = bh.release();
        let cmds: Vec<u8> = bus.writes.iter().map(|(_, bytes)| bytes[0]).collect();
        assert_eq!(cmds, vec![0x01, 0x20, 0x01, 0x20]);
        assert_eq!(delay.0, 2 * MEASUREMENT_TIME_MS as u32);
    }

    #[test]
    fn high_address() {
        let bus = FakeBus {
            reads: vec![[0, 0]],
            ..Default::default()
        };
        let mut bh = Bh1750::new(bus, NoDelay(0), Address::High);
        assert_eq!(bh.read_raw().unwrap(), 0);
        let (bus, _) = bh.release();
        assert!(bus.writes.iter().all(|(addr, _)| *addr == 0x5c));
    }

    #[test]
    fn saturated_reading_is_an_error() {
        let mut bh = sensor(vec![[0xff, 0xff]]);
        assert!(matches!(bh.read_lux(), Err(Error::Saturated)));
    }

    #[test]
    fn nack_is_reported() {
        let mut bh = sensor(vec![[0, 1]]);
        bh.i2c.nack = true;
        match bh.read_lux() {
            Err(Error::I2c(Nack)) => {}
            other => panic!("expected NACK, got {other:?}"),
        }
    }
}
