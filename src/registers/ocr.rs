use bit_field::BitField;

/// MMC addressing mode, negotiated through the OCR access-mode field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Byte-offset addressing (cards up to 2 GiB).
    Byte,
    /// Sector addressing (high-capacity cards).
    Sector,
}

/// Operating Conditions Register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OcrRegister {
    pub val: u32,
}

impl OcrRegister {
    /// 2.7-3.6 V voltage window bits.
    pub const VOLTAGE_MASK: u32 = 0x00FF_8000;

    pub fn set_vdd_27_28(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(15, enabled);
        self
    }

    pub fn set_vdd_28_29(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(16, enabled);
        self
    }

    pub fn set_vdd_29_30(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(17, enabled);
        self
    }

    pub fn set_vdd_30_31(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(18, enabled);
        self
    }

    pub fn set_vdd_31_32(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(19, enabled);
        self
    }

    pub fn set_vdd_32_33(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(20, enabled);
        self
    }

    pub fn set_vdd_33_34(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(21, enabled);
        self
    }

    pub fn set_vdd_34_35(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(22, enabled);
        self
    }

    pub fn set_vdd_35_36(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(23, enabled);
        self
    }

    /// Busy bit, set once the card has finished powering up.
    pub fn card_powered_up_status(&self) -> bool {
        self.val.get_bit(31)
    }

    /// CCS: the card uses sector addressing and a fixed 512-byte block.
    pub fn card_capacity_status(&self) -> bool {
        self.val.get_bit(30)
    }

    pub fn set_card_capacity_status(&mut self, enabled: bool) -> &mut Self {
        self.val.set_bit(30, enabled);
        self
    }

    /// MMC access-mode field, bits 30:29.
    pub fn access_mode(&self) -> AccessMode {
        if self.val.get_bits(29..31) == 0b10 {
            AccessMode::Sector
        } else {
            AccessMode::Byte
        }
    }

    pub fn set_access_mode(&mut self, mode: AccessMode) -> &mut Self {
        let bits = match mode {
            AccessMode::Byte => 0b00,
            AccessMode::Sector => 0b10,
        };
        self.val.set_bits(29..31, bits);
        self
    }
}

/// Full 2.7-3.6 V window the driver advertises while negotiating
/// operating conditions.
pub fn ocr_voltage_support() -> OcrRegister {
    let mut ocr = OcrRegister::default();
    ocr.set_vdd_27_28(true)
        .set_vdd_28_29(true)
        .set_vdd_29_30(true)
        .set_vdd_30_31(true)
        .set_vdd_31_32(true)
        .set_vdd_32_33(true)
        .set_vdd_33_34(true)
        .set_vdd_34_35(true)
        .set_vdd_35_36(true);
    ocr
}
