//! I2C bus module.
//!
//! Only the write direction is covered, since nothing in this project reads from the bus.
//! For the raw implementation and device-level documentation, see [raw::RawI2cDriver].

pub mod raw;

use std::fmt::{Debug, Display, Formatter};
use log::debug;
use crate::{GpioBias, GpioDriver, GpioError, GpioPin, GpioResult, PinFunction};

/// A 7-bit I2C slave address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// Default address of PCF8574 back-packs, with all address jumpers open.
    pub const PCF8574_DEFAULT: I2cAddress = I2cAddress(0x27);

    /// Creates a new [I2cAddress].
    ///
    /// Fails with [GpioError::InvalidArgument] if the address doesn't fit in 7 bits.
    pub const fn new(address: u8) -> GpioResult<Self> {
        if address > 0x7F {
            return Err(GpioError::InvalidArgument);
        }
        Ok(I2cAddress(address))
    }

    /// Gets the raw 7-bit address.
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Display for I2cAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// The `I2cBus` trait is the blocking write primitive drivers use to talk to I2C devices.
pub trait I2cBus: Debug {
    /// Writes all `bytes`, in order, to the device at `address` as a single transaction
    /// (start, address, bytes, stop).
    ///
    /// # Errors
    /// - [GpioError::NoAcknowledge] if the device didn't acknowledge the address or a byte.
    /// - [GpioError::ClockStretchTimeout] if the device held the clock line for too long.
    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> GpioResult<()>;
}

/// GPIO pins carrying the I2C signals.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct I2cPins {
    pub sda: usize,
    pub scl: usize,
    /// Function routing both pins to the I2C controller.
    pub function: PinFunction,
}

impl I2cPins {
    /// GPIO2/GPIO3, the pins exposed on the 40-pin header for the second BSC controller.
    pub const BSC1: I2cPins = I2cPins {
        sda: 2,
        scl: 3,
        function: PinFunction::Alt0,
    };
}

/// Routes the SDA and SCL pins to the I2C controller and enables their pull-ups.
///
/// The pins stay routed as long as the returned handles are alive. The function of both pins is
/// read back and a failed read is an error; a bias that can't be read back is skipped, since
/// some SoCs have no readable pull state.
pub fn claim_pins<'a>(
    gpio: &'a dyn GpioDriver,
    pins: I2cPins,
) -> GpioResult<[Box<dyn GpioPin + 'a>; 2]> {
    debug!("Routing I2C pins: SDA={} SCL={} ({:?})", pins.sda, pins.scl, pins.function);
    let sda = gpio.claim_pin(pins.sda, pins.function, GpioBias::PullUp)?;
    let scl = gpio.claim_pin(pins.scl, pins.function, GpioBias::PullUp)?;
    for pin in [&sda, &scl] {
        let function = pin.function()?;
        match pin.bias() {
            Ok(bias) => debug!("{:?} routed: {:?}, {:?}", pin, function, bias),
            Err(GpioError::NotSupported) => debug!("{:?} routed: {:?}", pin, function),
            Err(err) => return Err(err),
        }
    }
    Ok([sda, scl])
}
