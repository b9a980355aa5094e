use crate::host::BusWidth;

/// Size of the EXT_CSD register block.
pub const EXT_CSD_SIZE: usize = 512;

// EXT_CSD byte indices, JEDEC numbering.
pub const EXT_CSD_BUS_WIDTH: usize = 183;
pub const EXT_CSD_HS_TIMING: usize = 185;
pub const EXT_CSD_POWER_CLASS: usize = 187;
pub const EXT_CSD_CARD_TYPE: usize = 196;
pub const EXT_CSD_PWR_CL_52_360: usize = 202;
pub const EXT_CSD_PWR_CL_26_360: usize = 203;
pub const EXT_CSD_SEC_COUNT: usize = 212;

// CARD_TYPE speed-class bits.
pub const EXT_CSD_CARD_TYPE_F_26M: u8 = 1 << 0;
pub const EXT_CSD_CARD_TYPE_F_52M: u8 = 1 << 1;
pub const EXT_CSD_CARD_TYPE_F_52M_1_8V: u8 = 1 << 2;

/// HS_TIMING value selecting high speed.
pub const EXT_CSD_HS_TIMING_HS: u8 = 1;

/// Command set targeted by switch writes.
pub const EXT_CSD_CMD_SET_NORMAL: u8 = 1;

/// EXT_CSD register block snapshot, read during MMC bring-up.
pub struct ExtCsd(pub [u8; EXT_CSD_SIZE]);

impl ExtCsd {
    pub const fn new() -> Self {
        ExtCsd([0; EXT_CSD_SIZE])
    }

    /// Supported speed classes, a CARD_TYPE bitmask.
    pub fn card_type(&self) -> u8 {
        self.0[EXT_CSD_CARD_TYPE]
    }

    /// Currently selected timing.
    pub fn hs_timing(&self) -> u8 {
        self.0[EXT_CSD_HS_TIMING]
    }

    /// Power class for the negotiated speed and width: byte 202 covers the
    /// 52 MHz class, 203 the 26 MHz class, high nibble for 8-bit buses and
    /// low nibble for 4-bit. A 1-bit bus needs no switch.
    pub fn power_class(&self, high_speed: bool, width: BusWidth) -> u8 {
        let index = if high_speed { EXT_CSD_PWR_CL_52_360 } else { EXT_CSD_PWR_CL_26_360 };
        match width {
            BusWidth::_8BIT => self.0[index] >> 4,
            BusWidth::_4BIT => self.0[index] & 0xF,
            BusWidth::_1BIT => 0,
        }
    }

    /// SEC_COUNT, four bytes little endian. Meaningful only on cards big
    /// enough to outgrow the CSD capacity fields.
    pub fn sector_count(&self) -> u32 {
        u32::from_le_bytes([
            self.0[EXT_CSD_SEC_COUNT],
            self.0[EXT_CSD_SEC_COUNT + 1],
            self.0[EXT_CSD_SEC_COUNT + 2],
            self.0[EXT_CSD_SEC_COUNT + 3],
        ])
    }
}

impl Default for ExtCsd {
    fn default() -> Self {
        ExtCsd::new()
    }
}
