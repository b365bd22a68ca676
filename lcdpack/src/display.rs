use lcdpack_gpio::GpioResult;
use lcdpack_gpio::lcd::hd44780::driver::HD44780Driver;
use log::debug;

/// Writes each line at the start of its row, top to bottom.
pub fn show_lines(lcd: &mut dyn HD44780Driver, lines: &[String]) -> GpioResult<()> {
    for (row, line) in lines.iter().enumerate() {
        debug!("Row {}: {:?}", row, line);
        lcd.set_cursor(row as u8, 0)?;
        lcd.print(line)?;
    }
    Ok(())
}
