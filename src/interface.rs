use embedded_hal::{digital::OutputPin, i2c};

use crate::Error;

/// Trait for giving read and write access to the registers of one chip, plus
/// control over its hardware shutdown line.
pub trait RegisterAccess {
    type Error;

    /// Reads `data.len()` values from multiple registers, starting from `start_register`
    /// and incrementing the register for every element.
    fn read_registers(&mut self, start_register: u8, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes to multiple registers, starting from `start_register` and incrementing
    /// the register by one for every element in `data`.
    fn write_registers(&mut self, start_register: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Drives the SDB line. `true` releases the chip from hardware shutdown.
    fn set_hardware_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Reads a single value from `register`.
    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut buffer: [u8; 1] = [0; 1];
        self.read_registers(register, &mut buffer)?;

        Ok(buffer[0])
    }

    /// Writes a single value to `register`.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.write_registers(register, &[value])
    }
}

/// I2C transport for one chip together with its SDB pin.
pub struct I2cInterface<I2C, SDB> {
    pub(crate) i2c: I2C,
    pub(crate) address: u8,
    pub(crate) sdb: SDB,
}

impl<I2C, SDB> I2cInterface<I2C, SDB> {
    /// `address` is the 7bit i2c address, see [`crate::i2c_address`].
    pub fn new(i2c: I2C, address: u8, sdb: SDB) -> Self {
        Self { i2c, address, sdb }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl<I2C: i2c::I2c, SDB: OutputPin> I2cInterface<I2C, SDB> {
    pub fn release(self) -> (I2C, SDB) {
        (self.i2c, self.sdb)
    }
}

impl<I2C, SDB, IE> RegisterAccess for I2cInterface<I2C, SDB>
where
    I2C: i2c::I2c<Error = IE>,
    SDB: OutputPin,
{
    type Error = Error<IE>;

    fn read_registers(&mut self, start_register: u8, data: &mut [u8]) -> Result<(), Self::Error> {
        let header = [start_register];
        let mut operations = [i2c::Operation::Write(&header), i2c::Operation::Read(data)];

        self.i2c
            .transaction(self.address, &mut operations)
            .map_err(Error::Interface)?;

        Ok(())
    }

    fn write_registers(&mut self, start_register: u8, data: &[u8]) -> Result<(), Self::Error> {
        let header = [start_register];

        // adjacent writes are sent without a restart condition
        let mut operations = [i2c::Operation::Write(&header), i2c::Operation::Write(data)];

        self.i2c
            .transaction(self.address, &mut operations)
            .map_err(Error::Interface)?;

        Ok(())
    }

    fn set_hardware_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        if enable {
            self.sdb.set_high()
        } else {
            self.sdb.set_low()
        }
        .map_err(|_| Error::HardwareEnable)
    }
}
