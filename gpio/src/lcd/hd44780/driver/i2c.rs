use crate::delay::Delay;
use crate::i2c::{I2cAddress, I2cBus};
use crate::lcd::hd44780::driver::{HD44780Driver, INIT_SEQUENCE, POWER_ON_DELAY};
use crate::GpioResult;
use log::{debug, trace};

/// Bits of the back-pack expander's output byte.
///
/// ```text
/// P7 P6 P5 P4 P3 P2 P1 P0
/// D7 D6 D5 D4 BL EN RW RS
/// ```
pub mod backpack_bits {
    /// Register select: 0 for commands, 1 for data.
    pub const RS: u8 = 0x01;
    /// Read/write: always 0, the display is never read.
    pub const RW: u8 = 0x02;
    /// Enable: latches the data lines on its falling edge.
    pub const EN: u8 = 0x04;
    /// Backlight transistor.
    pub const BACKLIGHT: u8 = 0x08;
    /// D4-D7, carrying one nibble at a time.
    pub const DATA_MASK: u8 = 0xF0;
}

/// Which register of the controller a byte goes to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// Instruction register, RS = 0.
    Command,
    /// Data register, RS = 1.
    Data,
}

/// Back-pack settings, fixed for the lifetime of the driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BackpackConfig {
    pub address: I2cAddress,
    /// Whether the backlight is on. It's carried in every byte sent.
    pub backlight: bool,
}

impl BackpackConfig {
    pub fn new(address: I2cAddress) -> Self {
        BackpackConfig {
            address,
            backlight: true,
        }
    }
}

impl Default for BackpackConfig {
    fn default() -> Self {
        BackpackConfig::new(I2cAddress::PCF8574_DEFAULT)
    }
}

/// Encodes one byte as the four expander writes latching it in 4-bit mode.
///
/// High nibble first; each nibble is presented with EN set, then again with EN cleared.
/// RW is always 0.
pub fn encode_frame(byte: u8, register: RegisterSelect, backlight: bool) -> [u8; 4] {
    use backpack_bits::*;

    let mut control = if backlight { BACKLIGHT } else { 0 };
    if register == RegisterSelect::Data {
        control |= RS;
    }

    let high_nibble = (byte & DATA_MASK) | control;
    let low_nibble = ((byte << 4) & DATA_MASK) | control;

    [high_nibble | EN, high_nibble, low_nibble | EN, low_nibble]
}

/// HD44780 driver for a controller behind a PCF8574-style I2C back-pack.
///
/// Every command or data byte goes out as a single 4-byte write, see [encode_frame].
#[derive(Debug)]
pub struct I2cHD44780Driver<'a> {
    bus: &'a mut dyn I2cBus,
    delay: &'a mut dyn Delay,
    config: BackpackConfig,
}

impl<'a> I2cHD44780Driver<'a> {
    pub fn new(bus: &'a mut dyn I2cBus, delay: &'a mut dyn Delay, config: BackpackConfig) -> Self {
        I2cHD44780Driver { bus, delay, config }
    }

    fn send(&mut self, byte: u8, register: RegisterSelect) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", byte, register == RegisterSelect::Data);

        let frame = encode_frame(byte, register, self.config.backlight);
        self.bus.write(self.config.address, &frame)
    }
}

impl HD44780Driver for I2cHD44780Driver<'_> {
    fn init(&mut self) -> GpioResult<()> {
        debug!("Initializing HD44780 at {}...", self.config.address);

        self.delay.delay(POWER_ON_DELAY);

        for step in INIT_SEQUENCE {
            self.send_command(step.command)?;
            if !step.delay_after.is_zero() {
                self.delay.delay(step.delay_after);
            }
        }

        debug!("HD44780 at {} initialized.", self.config.address);
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, RegisterSelect::Command)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, RegisterSelect::Data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Clone, Eq, PartialEq)]
    enum Event {
        Write(I2cAddress, Vec<u8>),
        Delay(Duration),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    #[derive(Debug)]
    struct FakeBus {
        log: Log,
        /// Fails the write with this index, and every one after it.
        fail_from: Option<usize>,
        writes: usize,
    }

    impl I2cBus for FakeBus {
        fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> GpioResult<()> {
            let index = self.writes;
            self.writes += 1;
            if self.fail_from.is_some_and(|fail_from| index >= fail_from) {
                return Err(GpioError::NoAcknowledge(address.value()));
            }
            self.log.borrow_mut().push(Event::Write(address, bytes.to_vec()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FakeDelay(Log);

    impl Delay for FakeDelay {
        fn delay(&mut self, duration: Duration) {
            self.0.borrow_mut().push(Event::Delay(duration));
        }
    }

    fn fakes(fail_from: Option<usize>) -> (Log, FakeBus, FakeDelay) {
        let log = Log::default();
        let bus = FakeBus { log: log.clone(), fail_from, writes: 0 };
        let delay = FakeDelay(log.clone());
        (log, bus, delay)
    }

    fn written_bytes(log: &Log) -> Vec<u8> {
        log.borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Write(_, bytes) => Some(bytes.clone()),
                Event::Delay(_) => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn command_frame_splits_nibbles() {
        for byte in 0..=u8::MAX {
            let frame = encode_frame(byte, RegisterSelect::Command, true);
            assert_eq!(frame[0] & 0xF0, byte & 0xF0);
            assert_eq!(frame[2] & 0xF0, (byte << 4) & 0xF0);
            assert_eq!(frame[0] & 0x0F, 0x0C);
            assert_eq!(frame[1] & 0x0F, 0x08);
        }
    }

    #[test]
    fn enable_pulses_pair_up() {
        for register in [RegisterSelect::Command, RegisterSelect::Data] {
            for byte in 0..=u8::MAX {
                let frame = encode_frame(byte, register, true);
                for pulse in frame.chunks(2) {
                    assert_ne!(pulse[0] & backpack_bits::EN, 0);
                    assert_eq!(pulse[1] & backpack_bits::EN, 0);
                    assert_eq!(pulse[0] & !backpack_bits::EN, pulse[1]);
                }
            }
        }
    }

    #[test]
    fn register_select_follows_kind() {
        for byte in 0..=u8::MAX {
            let command = encode_frame(byte, RegisterSelect::Command, true);
            let data = encode_frame(byte, RegisterSelect::Data, true);
            assert!(command.iter().all(|b| b & backpack_bits::RS == 0));
            assert!(data.iter().all(|b| b & backpack_bits::RS != 0));
            assert!(command.iter().chain(&data).all(|b| b & backpack_bits::RW == 0));
        }
    }

    #[test]
    fn data_frame_bytes() {
        // 'M' = 0x4D
        assert_eq!(encode_frame(b'M', RegisterSelect::Data, true), [0x4D, 0x49, 0xDD, 0xD9]);
        assert_eq!(encode_frame(0x28, RegisterSelect::Command, true), [0x2C, 0x28, 0x8C, 0x88]);
    }

    #[test]
    fn backlight_off_clears_bit() {
        assert_eq!(encode_frame(0x28, RegisterSelect::Command, false), [0x24, 0x20, 0x84, 0x80]);
        assert_eq!(encode_frame(b'M', RegisterSelect::Data, false), [0x45, 0x41, 0xD5, 0xD1]);
    }

    #[test]
    fn send_command_writes_one_frame_to_configured_address() {
        let (log, mut bus, mut delay) = fakes(None);
        let address = I2cAddress::new(0x3F).unwrap();
        let mut lcd = I2cHD44780Driver::new(&mut bus, &mut delay, BackpackConfig::new(address));

        lcd.send_command(0x0C).unwrap();

        assert_eq!(*log.borrow(), [Event::Write(address, vec![0x0C, 0x08, 0xCC, 0xC8])]);
    }

    #[test]
    fn init_sends_sequence_with_delays() {
        let (log, mut bus, mut delay) = fakes(None);
        let mut lcd = I2cHD44780Driver::new(&mut bus, &mut delay, BackpackConfig::default());

        lcd.init().unwrap();

        let address = I2cAddress::PCF8574_DEFAULT;
        let write = |command: u8| {
            Event::Write(address, encode_frame(command, RegisterSelect::Command, true).to_vec())
        };
        assert_eq!(
            *log.borrow(),
            [
                Event::Delay(Duration::from_millis(50)),
                write(0x03),
                Event::Delay(Duration::from_millis(5)),
                write(0x03),
                Event::Delay(Duration::from_micros(150)),
                write(0x03),
                write(0x02),
                write(0x28),
                write(0x0C),
                write(0x06),
                write(0x01),
                Event::Delay(Duration::from_millis(5)),
            ],
        );
    }

    #[test]
    fn init_stops_at_first_failure() {
        let (log, mut bus, mut delay) = fakes(Some(1));
        let mut lcd = I2cHD44780Driver::new(&mut bus, &mut delay, BackpackConfig::default());

        let result = lcd.init();

        assert_eq!(result, Err(GpioError::NoAcknowledge(0x27)));
        // Power-on wait, first command and its delay
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(bus.writes, 2);
    }

    #[test]
    fn print_aborts_on_failure() {
        let (log, mut bus, mut delay) = fakes(Some(2));
        let mut lcd = I2cHD44780Driver::new(&mut bus, &mut delay, BackpackConfig::default());

        let result = lcd.print("Yaseer");

        assert!(result.is_err_and(|err| err.is_transport_failure()));
        assert_eq!(
            written_bytes(&log),
            [
                encode_frame(b'Y', RegisterSelect::Data, true),
                encode_frame(b'a', RegisterSelect::Data, true),
            ]
            .concat(),
        );
        assert_eq!(bus.writes, 3);
    }
}
