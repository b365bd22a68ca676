//! Raw BSC (Broadcom Serial Controller) driver.

use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::hint::spin_loop;
use log::{debug, trace};
use memmap2::{MmapOptions, MmapRaw};
use crate::i2c::{I2cAddress, I2cBus};
use crate::{GpioError, GpioResult};

/// Raw I2C driver, talking to one of the BSC controllers directly.
///
/// Requires `/dev/mem` access, so root privileges are needed. The SDA and SCL pins have to be
/// routed to the controller first, see [crate::i2c::claim_pins].
///
/// # Registers
///
/// Each controller has its own block of 32-bit registers:
/// - `C` (`0x00`): control. `I2CEN` (bit 15) enables the controller, `ST` (bit 7) starts a
///   transfer, `CLEAR` (bits 5:4) empties the FIFO and `READ` (bit 0) selects the direction.
/// - `S` (`0x04`): status. `CLKT` (bit 9) and `ERR` (bit 8) report a clock stretch timeout and
///   a missing acknowledgement, `TXD` (bit 4) means the FIFO can accept data, `DONE` (bit 1)
///   marks the end of the transfer and `TA` (bit 0) is set while it's active. `CLKT`, `ERR` and
///   `DONE` are cleared by writing `1` to them.
/// - `DLEN` (`0x08`): amount of bytes to transfer.
/// - `A` (`0x0C`): 7-bit slave address.
/// - `FIFO` (`0x10`): 16 bytes deep data FIFO.
/// - `DIV` (`0x14`): clock divider `CDIV`; SCL = core clock / `CDIV`. Always rounded down to an
///   even value, `0` means 32768.
///
/// BSC0 is at offset `0x205000` and BSC1 at offset `0x804000` from the peripheral base. On the
/// 40-pin header only BSC1 is exposed, on GPIO2 and GPIO3.
pub struct RawI2cDriver {
    mmap: MmapRaw,
    controller_index: u8,
}

impl RawI2cDriver {
    // #[cfg(target_pointer_width = "64")]
    // const PERIPHERAL_BASE: u32 = 0xFE000000;
    /// The base address of the peripherals in the Raspberry Pi memory map.
    pub const PERIPHERAL_BASE: u32 = 0x3F000000;

    /// Offsets of the BSC controllers from the peripheral base.
    pub const CONTROLLER_OFFSETS: [u32; 2] = [0x205000, 0x804000];

    /// The frequency of the core clock feeding the controllers.
    pub const CORE_CLOCK_HZ: u32 = 250_000_000;

    const REG_C: usize = 0x00;
    const REG_S: usize = 0x04;
    const REG_DLEN: usize = 0x08;
    const REG_A: usize = 0x0C;
    const REG_FIFO: usize = 0x10;
    const REG_DIV: usize = 0x14;

    const C_I2CEN: u32 = 1 << 15;
    const C_ST: u32 = 1 << 7;
    const C_CLEAR: u32 = 0b11 << 4;

    const S_CLKT: u32 = 1 << 9;
    const S_ERR: u32 = 1 << 8;
    const S_TXD: u32 = 1 << 4;
    const S_DONE: u32 = 1 << 1;

    fn create(path: &str, controller_index: usize) -> GpioResult<Self> {
        let Some(offset) = Self::CONTROLLER_OFFSETS.get(controller_index) else {
            return Err(GpioError::InvalidArgument);
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(Self::PERIPHERAL_BASE as u64 + *offset as u64)
            .len(0x20)
            .map_raw(&file)?;

        debug!("Mapped BSC{} registers", controller_index);

        Ok(RawI2cDriver {
            mmap,
            controller_index: controller_index as u8,
        })
    }

    /// Creates a new [RawI2cDriver] instance using `/dev/mem` for the specified controller.
    pub fn new_mem(controller_index: usize) -> GpioResult<Self> {
        Self::create("/dev/mem", controller_index)
    }

    /// Converts a bus frequency to the `CDIV` value of the `DIV` register.
    ///
    /// It fails with [GpioError::InvalidArgument] if the frequency can't be reached with an
    /// even divisor in range [2, 32768].
    pub fn frequency_to_cdiv(frequency: u32) -> GpioResult<u32> {
        if frequency == 0 {
            return Err(GpioError::InvalidArgument);
        }

        let divisor = (Self::CORE_CLOCK_HZ / frequency) & !1;
        match divisor {
            0 | 0x8001.. => Err(GpioError::InvalidArgument),
            // 32768 doesn't fit the 16-bit field and is written as 0
            0x8000 => Ok(0),
            divisor => Ok(divisor),
        }
    }

    /// Converts the `CDIV` value of the `DIV` register to the bus frequency.
    pub fn cdiv_to_frequency(cdiv: u32) -> u32 {
        let divisor = match cdiv & 0xFFFE {
            0 => 0x8000,
            divisor => divisor,
        };
        Self::CORE_CLOCK_HZ / divisor
    }

    /// Gets the current bus frequency, by reading the `DIV` register.
    pub fn frequency(&self) -> u32 {
        Self::cdiv_to_frequency(self.read_register(Self::REG_DIV) & 0xFFFF)
    }

    /// Sets the bus frequency, by modifying the `DIV` register.
    pub fn set_frequency(&mut self, frequency: u32) -> GpioResult<()> {
        let cdiv = Self::frequency_to_cdiv(frequency)?;
        self.write_register(Self::REG_DIV, cdiv);
        debug!("BSC{} clock set to {} Hz", self.controller_index, Self::cdiv_to_frequency(cdiv));
        Ok(())
    }

    fn read_register(&self, offset: usize) -> u32 {
        let mmap = self.mmap.as_ptr() as *const u32;
        let register_ptr = unsafe { mmap.add(offset / 4) };
        unsafe { register_ptr.read_volatile() }
    }

    fn write_register(&self, offset: usize, value: u32) {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        let register_ptr = unsafe { mmap.add(offset / 4) };
        unsafe { register_ptr.write_volatile(value) };
    }

    /// Pushes bytes into the FIFO for as long as it accepts them, advancing `bytes`.
    fn fill_fifo(&self, bytes: &mut &[u8]) {
        while let Some((&first, rest)) = bytes.split_first() {
            if self.read_register(Self::REG_S) & Self::S_TXD == 0 {
                break;
            }
            self.write_register(Self::REG_FIFO, first as u32);
            *bytes = rest;
        }
    }
}

impl Debug for RawI2cDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawI2cDriver({:?}, BSC{})", self.mmap.as_ptr(), self.controller_index)
    }
}

impl I2cBus for RawI2cDriver {
    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> GpioResult<()> {
        // DLEN is 16 bits wide
        if bytes.len() > 0xFFFF {
            return Err(GpioError::InvalidArgument);
        }

        trace!("BSC{} write to {}: {:02x?}", self.controller_index, address, bytes);

        self.write_register(Self::REG_S, Self::S_CLKT | Self::S_ERR | Self::S_DONE);
        self.write_register(Self::REG_C, Self::C_CLEAR);
        self.write_register(Self::REG_A, address.value() as u32);
        self.write_register(Self::REG_DLEN, bytes.len() as u32);

        let mut remaining = bytes;
        self.fill_fifo(&mut remaining);

        self.write_register(Self::REG_C, Self::C_I2CEN | Self::C_ST);

        // No timeout here, the controller reports a stuck slave itself through CLKT
        let status = loop {
            let status = self.read_register(Self::REG_S);
            if status & (Self::S_ERR | Self::S_CLKT | Self::S_DONE) != 0 {
                break status;
            }
            self.fill_fifo(&mut remaining);
            spin_loop();
        };

        self.write_register(Self::REG_S, Self::S_CLKT | Self::S_ERR | Self::S_DONE);

        if status & Self::S_ERR != 0 {
            return Err(GpioError::NoAcknowledge(address.value()));
        }
        if status & Self::S_CLKT != 0 {
            return Err(GpioError::ClockStretchTimeout);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_divisor() {
        assert_eq!(RawI2cDriver::frequency_to_cdiv(100_000), Ok(2500));
        assert_eq!(RawI2cDriver::cdiv_to_frequency(2500), 100_000);
    }

    #[test]
    fn divisor_is_rounded_down_to_even() {
        // 250 MHz / 3 MHz = 83.3
        assert_eq!(RawI2cDriver::frequency_to_cdiv(3_000_000), Ok(82));
        assert_eq!(RawI2cDriver::cdiv_to_frequency(83), RawI2cDriver::cdiv_to_frequency(82));
    }

    #[test]
    fn slowest_divisor_is_written_as_zero() {
        let slowest = RawI2cDriver::CORE_CLOCK_HZ / 0x8000;
        assert_eq!(RawI2cDriver::frequency_to_cdiv(slowest), Ok(0));
        assert_eq!(RawI2cDriver::cdiv_to_frequency(0), slowest);
    }

    #[test]
    fn unreachable_frequencies_are_rejected() {
        assert_eq!(RawI2cDriver::frequency_to_cdiv(0), Err(GpioError::InvalidArgument));
        assert_eq!(RawI2cDriver::frequency_to_cdiv(1_000), Err(GpioError::InvalidArgument));
        assert_eq!(
            RawI2cDriver::frequency_to_cdiv(RawI2cDriver::CORE_CLOCK_HZ),
            Err(GpioError::InvalidArgument),
        );
    }
}
