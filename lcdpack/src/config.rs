use dotenv::var;
use lcdpack_gpio::i2c::I2cPins;
use thiserror::Error;

/// I2C address of the LCD back-pack.
pub const LCD_ADDRESS: u8 = 0x27;
/// Columns per row of the display.
pub const LCD_COLUMNS: usize = 16;
/// Index of the BSC controller the back-pack is wired to.
pub const I2C_CONTROLLER: usize = 1;
pub const I2C_PINS: I2cPins = I2cPins::BSC1;
/// Standard-mode I2C.
pub const I2C_FREQUENCY: u32 = 100_000;

const DEFAULT_LINES: [&str; 2] = ["Mulla", "Yaseer"];

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("line {row} is {length} characters long, but the display has {columns} columns", columns = LCD_COLUMNS)]
    LineTooLong { row: usize, length: usize },
    #[error("unknown GPIO memory device {0:?}, expected \"gpiomem\" or \"mem\"")]
    UnknownGpioMem(String),
}

/// Which device the GPIO registers are mapped from.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum GpioMem {
    /// `/dev/gpiomem`, works without root.
    #[default] GpioMem,
    /// `/dev/mem`.
    Mem,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// Text of each display row.
    pub lines: [String; 2],
    pub gpio_mem: GpioMem,
}

impl Config {
    /// Loads the config from the environment (`.env` included, if loaded before).
    ///
    /// - `LCDPACK_LINE_0`, `LCDPACK_LINE_1`: text of the rows.
    /// - `LCDPACK_GPIO_MEM`: `gpiomem` or `mem`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lines = [
            lookup("LCDPACK_LINE_0").unwrap_or_else(|| DEFAULT_LINES[0].to_string()),
            lookup("LCDPACK_LINE_1").unwrap_or_else(|| DEFAULT_LINES[1].to_string()),
        ];

        for (row, line) in lines.iter().enumerate() {
            let length = line.chars().count();
            if length > LCD_COLUMNS {
                return Err(ConfigError::LineTooLong { row, length });
            }
        }

        let gpio_mem = match lookup("LCDPACK_GPIO_MEM").as_deref() {
            None | Some("gpiomem") => GpioMem::GpioMem,
            Some("mem") => GpioMem::Mem,
            Some(other) => return Err(ConfigError::UnknownGpioMem(other.to_string())),
        };

        Ok(Config { lines, gpio_mem })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lines: DEFAULT_LINES.map(String::from),
            gpio_mem: GpioMem::default(),
        }
    }
}
