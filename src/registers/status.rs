use bit_field::BitField;

/// Card status word carried by short (R1) responses on the native bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CardStatusRegister {
    pub val: u32,
}

impl CardStatusRegister {
    /// Buffer empty, the card can take more data.
    pub fn ready_for_data(&self) -> bool {
        self.val.get_bit(8)
    }

    /// The last switch command was rejected.
    pub fn switch_error(&self) -> bool {
        self.val.get_bit(7)
    }

    /// The card expects an application command next.
    pub fn app_cmd(&self) -> bool {
        self.val.get_bit(5)
    }
}

/// Reduced status byte SPI framing reports instead of the full card
/// status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpiStatusRegister {
    pub val: u8,
}

impl SpiStatusRegister {
    /// The card is still in its idle/initialization phase.
    pub fn idle_state(&self) -> bool {
        self.val.get_bit(0)
    }
}
