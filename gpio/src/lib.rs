pub mod delay;
pub mod i2c;
pub mod lcd;
pub mod raw;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Copy, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("no acknowledgement from device at address {0:#04x}")]
    NoAcknowledge(u8),
    #[error("slave held the clock line for too long")]
    ClockStretchTimeout,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl GpioError {
    /// Whether the error was reported by the bus transport itself, as opposed to a setup or
    /// argument problem.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, GpioError::NoAcknowledge(_) | GpioError::ClockStretchTimeout)
    }
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index, routing it to `function` with the given bias.
    ///
    /// The pin stays claimed until the returned handle is dropped, after which it's reset to
    /// an input without bias.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed.
    fn claim_pin(
        &self,
        index: usize,
        function: PinFunction,
        bias: GpioBias,
    ) -> GpioResult<Box<dyn GpioPin + '_>>;
}

/// A claimed GPIO pin.
pub trait GpioPin: Debug {
    /// Gets the index of the pin.
    fn index(&self) -> usize;
    /// Gets the function the pin is currently routed to.
    fn function(&self) -> GpioResult<PinFunction>;
    /// Gets the bias of the pin.
    fn bias(&self) -> GpioResult<GpioBias>;
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes, as well as for the alternate functions.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Specifies which peripheral drives a GPIO pin.
///
/// Alternate functions depend on the pin, e.g. GPIO2 and GPIO3 in [PinFunction::Alt0] are the
/// SDA and SCL lines of the second I2C controller.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PinFunction {
    #[default] Input,
    Output,
    Alt0,
    Alt1,
    Alt2,
    Alt3,
    Alt4,
    Alt5,
}

impl PinFunction {
    /// Converts an index to a [PinFunction].
    ///
    /// Index corresponds to the 3-bit values in the `GPFSELn` registers. Note that the alternate
    /// functions are not numbered in order there.
    pub fn from_index(index: u32) -> GpioResult<Self> {
        match index {
            0b000 => Ok(PinFunction::Input),
            0b001 => Ok(PinFunction::Output),
            0b100 => Ok(PinFunction::Alt0),
            0b101 => Ok(PinFunction::Alt1),
            0b110 => Ok(PinFunction::Alt2),
            0b111 => Ok(PinFunction::Alt3),
            0b011 => Ok(PinFunction::Alt4),
            0b010 => Ok(PinFunction::Alt5),
            _ => Err(GpioError::InvalidArgument),
        }
    }

    /// Converts a [PinFunction] to an index.
    ///
    /// Index corresponds to the 3-bit values in the `GPFSELn` registers.
    pub fn to_index(&self) -> u32 {
        match self {
            PinFunction::Input => 0b000,
            PinFunction::Output => 0b001,
            PinFunction::Alt0 => 0b100,
            PinFunction::Alt1 => 0b101,
            PinFunction::Alt2 => 0b110,
            PinFunction::Alt3 => 0b111,
            PinFunction::Alt4 => 0b011,
            PinFunction::Alt5 => 0b010,
        }
    }
}
