/// IS31FL3733 registers
///
/// Paged registers carry the page in the high byte and the in-page address in the
/// low byte. Common registers are reachable without a page select.
pub struct Register;
#[allow(dead_code)]
impl Register {
    pub const IMR: u8 = 0xF0;
    pub const ISR: u8 = 0xF1;
    pub const PSR: u8 = 0xFD;
    pub const PSWL: u8 = 0xFE;

    // Page 0
    pub const LEDONOFF: u16 = 0x0000;
    pub const LEDOPEN: u16 = 0x0018;
    pub const LEDSHORT: u16 = 0x0030;

    // Page 1
    pub const LEDPWM: u16 = 0x0100;

    // Page 2
    pub const LEDABM: u16 = 0x0200;

    // Page 3
    pub const CR: u16 = 0x0300;
    pub const GCC: u16 = 0x0301;
    pub const ABM1: u16 = 0x0302;
    pub const ABM2: u16 = 0x0306;
    pub const ABM3: u16 = 0x030A;
    pub const TUR: u16 = 0x030E;
    pub const SWPUR: u16 = 0x030F;
    pub const CSPDR: u16 = 0x0310;
    pub const RESET: u16 = 0x0311;

    pub const fn page(register: u16) -> u8 {
        (register >> 8) as u8
    }

    pub const fn address(register: u16) -> u8 {
        (register & 0xff) as u8
    }
}

/// Bitflags for registers
pub struct BitFlags;
#[allow(dead_code)]
impl BitFlags {
    /// Value unlocking the page select register for one write.
    pub const PSWL_ENABLE: u8 = 0xC5;
    pub const PSWL_DISABLE: u8 = 0x00;

    pub const CR_SYNC_MASTER: u8 = 1 << 6;
    pub const CR_SYNC_SLAVE: u8 = 1 << 7;
    pub const CR_OSD: u8 = 1 << 2;
    pub const CR_BEN: u8 = 1 << 1;
    pub const CR_SSD: u8 = 1 << 0;

    pub const ABM_CR1_T1_SHIFT: u8 = 5;
    pub const ABM_CR1_T2_SHIFT: u8 = 1;
    pub const ABM_CR2_T3_SHIFT: u8 = 5;
    pub const ABM_CR2_T4_SHIFT: u8 = 1;
    pub const ABM_CR3_LE_SHIFT: u8 = 4;
    pub const ABM_CR3_LB_SHIFT: u8 = 2;
    pub const ABM_CR3_LTA_MASK: u8 = 0b11;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_and_address() {
        assert_eq!(Register::page(Register::LEDPWM), 1);
        assert_eq!(Register::address(Register::LEDPWM), 0);
        assert_eq!(Register::page(Register::CSPDR), 3);
        assert_eq!(Register::address(Register::CSPDR), 0x10);
        assert_eq!(Register::address(Register::LEDSHORT), 0x30);
    }
}
