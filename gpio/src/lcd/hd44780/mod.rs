//! HD44780 LCD module.
//!
//! The controller is driven write-only in 4-bit mode, through a PCF8574-style I2C back-pack.
//! See [driver::HD44780Driver] for the interface and [driver::I2cHD44780Driver] for the
//! back-pack implementation.

pub mod driver;
