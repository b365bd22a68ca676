mod config;
mod display;

use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, error, info};
use lcdpack_gpio::delay::ThreadDelay;
use lcdpack_gpio::i2c::{self, I2cAddress};
use lcdpack_gpio::i2c::raw::RawI2cDriver;
use lcdpack_gpio::lcd::hd44780::driver::{BackpackConfig, HD44780Driver, I2cHD44780Driver};
use lcdpack_gpio::raw::RawGpioDriver;
use crate::config::{Config, GpioMem, I2C_CONTROLLER, I2C_FREQUENCY, I2C_PINS, LCD_ADDRESS};
use crate::display::show_lines;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("lcdpack starting...");

    let config = Config::from_env()?;

    info!("LCD @ {:#04x} on BSC{} at {} Hz, SDA: {}, SCL: {}",
        LCD_ADDRESS, I2C_CONTROLLER, I2C_FREQUENCY, I2C_PINS.sda, I2C_PINS.scl);

    debug!("Initializing GPIO driver...");
    let gpio = match config.gpio_mem {
        GpioMem::GpioMem => RawGpioDriver::new_gpiomem()?,
        GpioMem::Mem => RawGpioDriver::new_mem()?,
    };
    debug!("{:?} initialized.", gpio);

    // Held until exit, dropping them would release the pins
    let _i2c_pins = i2c::claim_pins(&gpio, I2C_PINS)?;

    debug!("Initializing I2C driver...");
    let mut bus = RawI2cDriver::new_mem(I2C_CONTROLLER)?;
    bus.set_frequency(I2C_FREQUENCY)?;
    debug!("{:?} initialized, clock at {} Hz.", bus, bus.frequency());

    let mut delay = ThreadDelay;
    let mut lcd = I2cHD44780Driver::new(
        &mut bus,
        &mut delay,
        BackpackConfig::new(I2cAddress::new(LCD_ADDRESS)?),
    );

    let shown = lcd.init().and_then(|_| show_lines(&mut lcd, &config.lines));
    if let Err(err) = shown {
        if err.is_transport_failure() {
            error!("LCD @ {:#04x} is not responding, check the wiring and address.", LCD_ADDRESS);
        }
        return Err(err.into());
    }

    info!("lcdpack initialized, idling.");

    loop {
        thread::sleep(Duration::from_millis(500));
    }

    // Ok(())
}
