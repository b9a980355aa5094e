use embedded_hal::blocking::delay::DelayMs;
use log::trace;

use crate::command::{Command, DEFAULT_CMD_TIMEOUT_MS};
use crate::commands;
use crate::error::Error;
use crate::host::{BusMode, CardFamily, Host, HostConfig};
use crate::registers::cid::Cid;
use crate::registers::csd::Csd;
use crate::registers::ocr::OcrRegister;
use crate::registers::status::CardStatusRegister;

/// Relative-address source for families whose address the driver assigns.
///
/// One allocator serves every session a caller manages, so two cards never
/// share an address. Zero never comes out of it; zero is the
/// broadcast/deselect address.
#[derive(Clone, Debug, Default)]
pub struct RcaAllocator {
    last: u16,
}

impl RcaAllocator {
    pub const fn new() -> Self {
        RcaAllocator { last: 0 }
    }

    /// Next relative address, skipping zero on wraparound.
    pub fn allocate(&mut self) -> u16 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }
}

/// One card session: the host transport, the capability snapshot given at
/// creation, and every register decoded during bring-up.
pub struct Card<H, D> {
    pub(crate) host: H,
    pub(crate) delay: D,
    pub(crate) config: HostConfig,
    pub(crate) ocr: OcrRegister,
    pub(crate) cid: Cid,
    pub(crate) csd: Csd,
    pub(crate) rca: u16,
}

impl<H: Host, D: DelayMs<u32>> Card<H, D> {
    /// A fresh, un-negotiated session. [`Card::init`] brings it up.
    pub fn new(host: H, delay: D, config: HostConfig) -> Self {
        Card {
            host,
            delay,
            config,
            ocr: OcrRegister::default(),
            cid: Cid::default(),
            csd: Csd::default(),
            rca: 0,
        }
    }

    /// Tear the session apart and hand the transport back.
    pub fn free(self) -> (H, D) {
        (self.host, self.delay)
    }

    /// Dispatch one descriptor: settle the effective timeout, run it on
    /// the host, surface the transport or per-command failure verbatim.
    /// Never retries.
    pub(crate) fn send_cmd(&mut self, cmd: &mut Command<'_>) -> Result<(), Error> {
        if let Some(timeout_ms) = self.config.command_timeout_ms {
            cmd.timeout_ms = timeout_ms;
        } else if cmd.timeout_ms == 0 {
            cmd.timeout_ms = DEFAULT_CMD_TIMEOUT_MS;
        }
        trace!(
            "sending CMD{} arg={:#010x} datalen={} timeout={}ms",
            cmd.opcode,
            cmd.arg,
            cmd.data_len(),
            cmd.timeout_ms
        );
        self.host.transaction(self.config.slot, cmd)?;
        if let Some(err) = cmd.error.take() {
            let err = Error::Host(err);
            trace!("CMD{} failed: {:?}", cmd.opcode, err);
            return Err(err);
        }
        trace!(
            "CMD{} response {:08x} {:08x} {:08x} {:08x}",
            cmd.opcode,
            cmd.response[0],
            cmd.response[1],
            cmd.response[2],
            cmd.response[3]
        );
        Ok(())
    }

    /// Two-step application command: CMD55 carrying the session address,
    /// then the wrapped command. On the native bus the card must
    /// acknowledge the prefix; the SPI status byte has no such bit.
    pub(crate) fn send_app_cmd(&mut self, cmd: &mut Command<'_>) -> Result<(), Error> {
        let mut prefix = commands::app_cmd(self.rca);
        self.send_cmd(&mut prefix)?;
        if self.config.mode == BusMode::Native {
            let status = CardStatusRegister { val: prefix.response[0] };
            if !status.app_cmd() {
                return Err(Error::NotSupported);
            }
        }
        self.send_cmd(cmd)
    }

    /// Decoded identification register.
    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// Decoded parameter register.
    pub fn csd(&self) -> &Csd {
        &self.csd
    }

    /// Operating conditions after the voltage-window merge.
    pub fn ocr(&self) -> OcrRegister {
        self.ocr
    }

    /// Relative card address; zero until native bring-up assigns one.
    pub fn rca(&self) -> u16 {
        self.rca
    }

    /// Capacity in sectors.
    pub fn capacity(&self) -> u32 {
        self.csd.capacity
    }

    /// Bytes per sector.
    pub fn sector_size(&self) -> u32 {
        self.csd.sector_size
    }

    /// Negotiated transfer speed in Hz.
    pub fn transfer_speed(&self) -> u32 {
        self.csd.transfer_speed
    }

    /// Sector-addressed card with a fixed 512-byte block.
    pub fn high_capacity(&self) -> bool {
        self.ocr.card_capacity_status()
    }

    pub fn mode(&self) -> BusMode {
        self.config.mode
    }

    /// Family settled during negotiation.
    pub fn family(&self) -> CardFamily {
        self.config.family
    }
}
