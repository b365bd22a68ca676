use crate::{GpioBias, GpioDriver, GpioError, GpioPin, GpioResult, PinFunction};
use bitvec::vec::BitVec;
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;
use std::thread;
use std::time::Duration;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    // BCM2837, 0x7E200000 on the bus
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 54;

    const REG_GPPUD: usize = 0x94;
    const REG_GPPUDCLK0: usize = 0x98;

    /// At least 150 core clock cycles, with plenty of margin.
    const PULL_SETUP_TIME: Duration = Duration::from_micros(5);

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which doesn't need root privileges.
    pub fn new_gpiomem() -> GpioResult<Self> {
        // gpiomem exposes only the GPIO block, starting at offset 0
        Self::create("/dev/gpiomem", 0)
    }

    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    pub fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<PinFunction> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_ptr() as *const u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let register_value = unsafe { register_ptr.read_volatile() };
        let value = (register_value >> shift) & 0b111;
        trace!("Read pin function: pin_index={} value={:03b}", pin_index, value);
        PinFunction::from_index(value)
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: PinFunction) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift); // Clear the bits for this pin
        register_value |= function.to_index() << shift; // Route the pin
        unsafe { register_ptr.write_volatile(register_value) };

        trace!("Set pin function: pin_index={} function={:?}", pin_index, function);

        Ok(())
    }

    /// Value of `GPPUD` selecting the given bias.
    pub fn pull_control_value(bias: GpioBias) -> u32 {
        match bias {
            GpioBias::None => 0b00,
            GpioBias::PullDown => 0b01,
            GpioBias::PullUp => 0b10,
        }
    }

    /// Offset of the `GPPUDCLKn` register clocking the pin, and the pin's bit in it.
    pub fn pull_clock_register(pin_index: usize) -> (usize, u32) {
        (Self::REG_GPPUDCLK0 + (pin_index / 32) * 4, 1 << (pin_index % 32))
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

    /// Sets the pull resistor of a pin.
    ///
    /// The BCM2835/BCM2837 has no per-pin pull register. The control signal is written to
    /// `GPPUD`, held for 150 cycles, clocked into the pin through `GPPUDCLKn`, held again, and
    /// then both registers are cleared.
    pub(crate) fn raw_set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let (clock_register, pin_bit) = Self::pull_clock_register(pin_index);

        self.write_register(Self::REG_GPPUD, Self::pull_control_value(bias));
        thread::sleep(Self::PULL_SETUP_TIME);
        self.write_register(clock_register, pin_bit);
        thread::sleep(Self::PULL_SETUP_TIME);
        self.write_register(Self::REG_GPPUD, 0);
        self.write_register(clock_register, 0);

        trace!("Set pin bias: pin_index={} bias={:?}", pin_index, bias);

        Ok(())
    }

    /// Always fails with [GpioError::NotSupported]: the pull state can't be read back on this SoC.
    pub(crate) fn raw_get_bias(&self, pin_index: usize) -> GpioResult<GpioBias> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Err(GpioError::NotSupported)
    }

    pub(crate) fn raw_reset(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_function(pin_index, PinFunction::Input)?;
        self.raw_set_bias(pin_index, GpioBias::None)?;
        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn claim_pin(
        &self,
        index: usize,
        function: PinFunction,
        bias: GpioBias,
    ) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        // Bias first, so an open-drain line is never left floating once routed
        let routed = self
            .raw_set_bias(index, bias)
            .and_then(|_| self.raw_set_pin_function(index, function));
        if let Err(err) = routed {
            self.used_pins.set_aliased(index, false);
            return Err(err);
        }

        Ok(Box::new(RawGpioPin {
            driver: self,
            pin_index: index,
        }))
    }
}

struct RawGpioPin<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
}

impl Debug for RawGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin<'_> {
    fn index(&self) -> usize {
        self.pin_index
    }

    fn function(&self) -> GpioResult<PinFunction> {
        self.driver.raw_get_pin_function(self.pin_index)
    }

    fn bias(&self) -> GpioResult<GpioBias> {
        self.driver.raw_get_bias(self.pin_index)
    }
}

impl Drop for RawGpioPin<'_> {
    fn drop(&mut self) {
        _ = self.driver.raw_reset(self.pin_index);
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}
