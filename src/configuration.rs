use crate::{i2c_address, AddrPin, PullDownResistor, PullUpResistor, SyncMode, DEFAULT_GCC};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Configuration {
    pub(crate) addr1: AddrPin,
    pub(crate) addr2: AddrPin,
    pub(crate) gcc: u8,
    pub(crate) sync_mode: SyncMode,
    pub(crate) swpur: PullUpResistor,
    pub(crate) cspdr: PullDownResistor,
}

impl Configuration {
    pub fn address(&self) -> u8 {
        i2c_address(self.addr2, self.addr1)
    }
}

/// Builder for creating the chip configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    pub(crate) configuration: Configuration,
}

macro_rules! builder_property {
    ($field:ident, $field_type:path, $doc:literal) => {
        #[doc = $doc]
        pub fn $field(mut self, $field: $field_type) -> Self {
            self.configuration.$field = $field;
            self
        }
    };
}

impl ConfigBuilder {
    /// Create a configuration for a chip with both address pins tied to GND,
    /// running as sync slave.
    pub fn new() -> Self {
        ConfigBuilder {
            configuration: Configuration {
                addr1: AddrPin::Gnd,
                addr2: AddrPin::Gnd,
                gcc: DEFAULT_GCC,
                sync_mode: SyncMode::Slave,
                swpur: PullUpResistor::None,
                cspdr: PullDownResistor::None,
            },
        }
    }

    /// Configuration of the upper chip of the 91TKL board (GND/GND, clock master).
    pub fn upper() -> Self {
        Self::new().sync_mode(SyncMode::Master)
    }

    /// Configuration of the lower chip of the 91TKL board (ADDR2 on GND, ADDR1 on VCC).
    pub fn lower() -> Self {
        Self::new().addr1(AddrPin::Vcc)
    }

    /// 7bit i2c address resulting from the strap pins.
    pub fn address(&self) -> u8 {
        self.configuration.address()
    }

    builder_property!(addr1, AddrPin, "Connection of the ADDR1 pin");
    builder_property!(addr2, AddrPin, "Connection of the ADDR2 pin");
    builder_property!(gcc, u8, "Global current control value written at init");
    builder_property!(
        sync_mode,
        SyncMode,
        "Clock synchronisation role. Exactly one chip of a pair has to be master"
    );
    builder_property!(swpur, PullUpResistor, "SWy pull-up resistor written at init");
    builder_property!(cspdr, PullDownResistor, "CSx pull-down resistor written at init");
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
