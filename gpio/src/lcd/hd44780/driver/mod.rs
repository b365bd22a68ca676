mod i2c;

use crate::GpioResult;
pub use i2c::*;
use log::warn;
use std::fmt::Debug;
use std::time::Duration;

/// Instruction codes of the HD44780 controller.
pub mod commands {
    use super::CursorDirection;

    /// Clears the display and sets the cursor to the home position.
    pub const CLEAR_DISPLAY: u8 = 0b00000001;

    /// Sent three times after power-on to force the controller into a known interface width.
    ///
    /// Sent as a whole byte, the high nibble (0) is a no-op for a controller still in 8-bit
    /// mode, and the low nibble reads as "function set, 8-bit interface".
    pub const WAKE_UP: u8 = 0b00000011;

    /// Commits the controller to the 4-bit interface, the same way [WAKE_UP] forces 8 bits.
    pub const FOUR_BIT_INTERFACE: u8 = 0b00000010;

    /// Sets the DDRAM address; OR it with the address.
    pub const SET_DDRAM_ADDRESS: u8 = 0b10000000;

    /// DDRAM address of the first column of the second row.
    pub const SECOND_ROW_OFFSET: u8 = 0x40;

    /// Entry mode set: `000001IS`.
    /// `I` is `1` for right cursor direction, `0` for left cursor direction.
    /// `S` is `1` for display shift, `0` for no display shift.
    pub const fn entry_mode(cursor_direction: CursorDirection, shift: bool) -> u8 {
        let mut command = 0b00000100;
        if matches!(cursor_direction, CursorDirection::Right) {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        command
    }

    /// Display on/off control: `00001DCB`.
    pub const fn display_control(display_on: bool, cursor_on: bool, blink_on: bool) -> u8 {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        command
    }

    /// Function set: `001DNF00`.
    /// `D` is `1` for the 8-bit interface, `N` for two lines and `F` for the 5×10 font.
    pub const fn function_set(data_length: bool, two_lines: bool, font: bool) -> u8 {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        command
    }
}

/// One step of [INIT_SEQUENCE]: a command, and how long to wait after sending it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InitStep {
    pub command: u8,
    pub delay_after: Duration,
}

impl InitStep {
    pub const fn new(command: u8, delay_after: Duration) -> Self {
        InitStep { command, delay_after }
    }
}

/// Wait before the first command, for the supply to stabilize (at least 40 ms).
pub const POWER_ON_DELAY: Duration = Duration::from_millis(50);

/// The power-on initialization sequence for a 4-bit interface, 2-line display.
///
/// There's no feedback from the controller, so the order and the delays here are all that
/// puts it into a known state. Shortening the first two delays (at least 4.1 ms and 100 µs)
/// makes the controller lose track of nibble boundaries.
pub const INIT_SEQUENCE: [InitStep; 8] = [
    InitStep::new(commands::WAKE_UP, Duration::from_millis(5)),
    InitStep::new(commands::WAKE_UP, Duration::from_micros(150)),
    InitStep::new(commands::WAKE_UP, Duration::ZERO),
    InitStep::new(commands::FOUR_BIT_INTERFACE, Duration::ZERO),
    InitStep::new(commands::function_set(false, true, false), Duration::ZERO),
    InitStep::new(commands::display_control(true, false, false), Duration::ZERO),
    InitStep::new(commands::entry_mode(CursorDirection::Right, false), Duration::ZERO),
    // Clearing takes at least 1.6 ms and the busy flag is never polled
    InitStep::new(commands::CLEAR_DISPLAY, Duration::from_millis(5)),
];

/// The `HD44780Driver` trait is the write-only interface of an HD44780 controller.
pub trait HD44780Driver: Debug {
    /// Brings the controller out of power-on reset, using [INIT_SEQUENCE].
    ///
    /// Must be called once, before anything else, with the bus already set up.
    fn init(&mut self) -> GpioResult<()>;

    /// Moves the cursor to the given position.
    ///
    /// Row `0` starts at DDRAM address `0x00`, any other row at `0x40`. The column isn't
    /// checked against the display width.
    fn set_cursor(&mut self, row: u8, column: u8) -> GpioResult<()> {
        let row_start = if row == 0 { 0 } else { commands::SECOND_ROW_OFFSET };
        self.send_command((commands::SET_DDRAM_ADDRESS | row_start).wrapping_add(column))
    }

    /// Writes the text at the cursor position, one character after another.
    ///
    /// Stops at the first failed transmission.
    fn print(&mut self, text: &str) -> GpioResult<()> {
        for c in text.chars() {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?
            }
        }
        Ok(())
    }

    // Low-level commands
    // These raw commands are used by the high-level functions above.

    /// Sends a command to the HD44780 controller.
    /// Sets the RS line to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller.
    /// Sets the RS line to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        commands: Vec<u8>,
        data: Vec<u8>,
    }

    impl HD44780Driver for Recorder {
        fn init(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> GpioResult<()> {
            self.data.push(data);
            Ok(())
        }
    }

    #[test]
    fn init_sequence_matches_datasheet() {
        let commands: Vec<u8> = INIT_SEQUENCE.iter().map(|step| step.command).collect();
        assert_eq!(commands, [0x03, 0x03, 0x03, 0x02, 0x28, 0x0C, 0x06, 0x01]);

        assert!(INIT_SEQUENCE[0].delay_after >= Duration::from_micros(4100));
        assert!(INIT_SEQUENCE[1].delay_after >= Duration::from_micros(100));
        assert!(INIT_SEQUENCE[7].delay_after >= Duration::from_micros(1600));
        assert!(POWER_ON_DELAY >= Duration::from_millis(40));
    }

    #[test]
    fn command_builders() {
        assert_eq!(commands::entry_mode(CursorDirection::Left, false), 0x04);
        assert_eq!(commands::entry_mode(CursorDirection::Right, true), 0x07);
        assert_eq!(commands::display_control(false, false, false), 0x08);
        assert_eq!(commands::display_control(true, true, true), 0x0F);
        assert_eq!(commands::function_set(true, false, true), 0x34);
    }

    #[test]
    fn cursor_rows_map_to_ddram_bases() {
        let mut lcd = Recorder::default();
        lcd.set_cursor(0, 0).unwrap();
        lcd.set_cursor(0, 15).unwrap();
        lcd.set_cursor(1, 0).unwrap();
        lcd.set_cursor(1, 7).unwrap();
        assert_eq!(lcd.commands, [0x80, 0x8F, 0xC0, 0xC7]);
        assert!(lcd.data.is_empty());
    }

    #[test]
    fn cursor_column_is_not_validated() {
        let mut lcd = Recorder::default();
        lcd.set_cursor(0, 0x50).unwrap();
        lcd.set_cursor(2, 3).unwrap();
        assert_eq!(lcd.commands, [0xD0, 0xC3]);
    }

    #[test]
    fn print_sends_characters_in_order() {
        let mut lcd = Recorder::default();
        lcd.print("AB").unwrap();
        assert_eq!(lcd.data, b"AB");
        assert!(lcd.commands.is_empty());
    }

    #[test]
    fn print_empty_sends_nothing() {
        let mut lcd = Recorder::default();
        lcd.print("").unwrap();
        assert!(lcd.data.is_empty());
    }

    #[test]
    fn print_replaces_non_ascii() {
        let mut lcd = Recorder::default();
        lcd.print("a€b").unwrap();
        assert_eq!(lcd.data, b"a?b");
    }
}
