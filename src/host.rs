use embedded_error::mci::MciError;

use crate::command::Command;

/// Probing clock rate used until a faster one is negotiated, in kHz.
pub const FREQ_PROBING: u32 = 400;
/// Standard-speed MMC clock ceiling, in kHz.
pub const FREQ_26M: u32 = 26_000;
/// High-speed MMC clock ceiling, in kHz.
pub const FREQ_52M: u32 = 52_000;

/// How commands and responses are framed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusMode {
    /// Native SD/MMC bus: register responses arrive inline on the command
    /// line.
    Native,
    /// SPI framing: large registers arrive as data transfers, byte-reversed
    /// relative to the native convention, and the card reports a reduced
    /// status byte.
    Spi,
}

/// Card family, driving opcode and argument selection during bring-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardFamily {
    Sd,
    Mmc,
}

impl CardFamily {
    pub(crate) fn other(self) -> Self {
        match self {
            CardFamily::Sd => CardFamily::Mmc,
            CardFamily::Mmc => CardFamily::Sd,
        }
    }
}

/// Data bus width.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusWidth {
    _1BIT,
    _4BIT,
    _8BIT,
}

impl BusWidth {
    /// EXT_CSD BUS_WIDTH register encoding of this width.
    pub(crate) fn ext_csd_value(self) -> u8 {
        match self {
            BusWidth::_1BIT => 0,
            BusWidth::_4BIT => 1,
            BusWidth::_8BIT => 2,
        }
    }

    /// Number of data lines.
    pub fn bits(self) -> u8 {
        match self {
            BusWidth::_1BIT => 1,
            BusWidth::_4BIT => 4,
            BusWidth::_8BIT => 8,
        }
    }
}

/// Static host capabilities and bring-up hints, supplied once per session.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Host slot the session is bound to; passed through to every
    /// transaction untouched.
    pub slot: u8,
    pub mode: BusMode,
    /// Which family to probe first. Negotiation flips it at most once when
    /// the first family never answers.
    pub family: CardFamily,
    /// Widest data bus the host can drive.
    pub bus_width: BusWidth,
    /// Card clock ceiling in kHz.
    pub max_freq_khz: u32,
    /// When set, overrides the timeout of every command descriptor.
    pub command_timeout_ms: Option<u32>,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            slot: 0,
            mode: BusMode::Native,
            family: CardFamily::Sd,
            bus_width: BusWidth::_4BIT,
            max_freq_khz: FREQ_52M,
            command_timeout_ms: None,
        }
    }
}

/// Host-side command executor, the seam between protocol and transport.
///
/// An implementation clocks one command at a time: it sends opcode and
/// argument, runs the data phase if the descriptor carries one, then fills
/// `cmd.response` and `cmd.error` before returning. Response words follow
/// the native register convention: a short response lands in
/// `response[0]`, a long (136-bit) response spans all four words with
/// register bits [127:8] in bits [119:0], least significant word first.
/// The CRC byte is never captured.
///
/// `Err` from [`Host::transaction`] means the exchange itself broke down;
/// a failure specific to the command goes into `cmd.error` instead. Either
/// way the caller sees it verbatim.
pub trait Host {
    fn transaction(&mut self, slot: u8, cmd: &mut Command<'_>) -> Result<(), MciError>;

    /// Reclock the slot, in kHz.
    fn set_clock(&mut self, slot: u8, freq_khz: u32) -> Result<(), MciError>;

    /// Widen (or narrow) the data bus. Called only after the card has
    /// switched its own side.
    fn set_bus_width(&mut self, slot: u8, width: BusWidth) -> Result<(), MciError>;

    /// Whether the data engine can use `buf` in place. Buffers it cannot
    /// reach are staged through driver-owned memory instead.
    fn dma_capable(&self, buf: &[u8]) -> bool;
}
