use embedded_hal::blocking::delay::DelayMs;
use log::{debug, error, warn};

use crate::card::{Card, RcaAllocator};
use crate::commands;
use crate::error::Error;
use crate::host::{BusMode, BusWidth, CardFamily, Host, FREQ_26M, FREQ_52M, FREQ_PROBING};
use crate::io::DmaBuffer;
use crate::registers::cid::Cid;
use crate::registers::csd::{Csd, MMC_VERSION_4_0};
use crate::registers::ext_csd::{self, ExtCsd};
use crate::registers::ocr::{ocr_voltage_support, OcrRegister};
use crate::registers::status::{CardStatusRegister, SpiStatusRegister};
use crate::registers::{flip_byte_order, response_from_le_bytes};

/// Settle time after each reset command.
pub const GO_IDLE_DELAY_MS: u32 = 20;
/// Operating-condition poll budget and pacing.
const OP_COND_RETRIES: u32 = 100;
const OP_COND_DELAY_MS: u32 = 10;
/// Settle time after EXT_CSD switch writes.
const SWITCH_DELAY_MS: u32 = 10;
/// Capacities past 2 GiB only fit in EXT_CSD SEC_COUNT.
const SEC_COUNT_THRESHOLD: u32 = (2 * 1024 * 1024 * 1024u64 / 512) as u32;

/// Permits the single family flip operating-condition fallback may take.
#[derive(Debug, Default)]
struct FamilyFallback {
    used: bool,
}

impl FamilyFallback {
    /// Flip `family` and report true, at most once.
    fn flip(&mut self, family: &mut CardFamily) -> bool {
        if self.used {
            return false;
        }
        self.used = true;
        *family = family.other();
        true
    }
}

impl<H: Host, D: DelayMs<u32>> Card<H, D> {
    /// Probe and initialize the card behind the host slot.
    ///
    /// Runs the whole bring-up sequence: reset, interface-condition probe,
    /// operating-condition negotiation with a one-shot family fallback,
    /// identification, parameter decode, selection, and the MMC
    /// extended-register negotiation. On success the session is ready for
    /// block I/O. `rcas` assigns relative addresses to families that do
    /// not pick their own.
    pub fn init(&mut self, rcas: &mut RcaAllocator) -> Result<(), Error> {
        // A rerun starts from a blank slate, like a power cycle would.
        self.ocr = OcrRegister::default();
        self.cid = Cid::default();
        self.csd = Csd::default();
        self.rca = 0;

        self.go_idle_state()?;
        self.delay.delay_ms(GO_IDLE_DELAY_MS);
        // Cards already idle ignore the follow-up reset; its outcome
        // carries no information.
        self.go_idle_state().ok();
        self.delay.delay_ms(GO_IDLE_DELAY_MS);

        let mut host_ocr = ocr_voltage_support();
        match self.send_if_cond(host_ocr) {
            Ok(()) => {
                debug!("card answered the interface probe, high capacity capable");
                host_ocr.set_card_capacity_status(true);
            }
            Err(err) if err.is_timeout() => {
                debug!("no interface-condition response, legacy card");
            }
            Err(err) => return Err(err),
        }

        if self.config.mode == BusMode::Spi {
            self.crc_on_off(true)?;
        }

        let mut fallback = FamilyFallback::default();
        loop {
            match self.send_op_cond(host_ocr) {
                Ok(()) => break,
                Err(err) if err.is_timeout() => {
                    if !fallback.flip(&mut self.config.family) {
                        return Err(err);
                    }
                    debug!("no operating-condition answer, retrying as {:?}", self.config.family);
                }
                Err(err) => return Err(err),
            }
        }

        if self.config.mode == BusMode::Spi {
            self.read_ocr()?;
        }
        // Drop the voltage bits the host cannot drive; everything else in
        // the card's OCR survives the merge, the capacity bit included.
        self.ocr.val &= host_ocr.val | !OcrRegister::VOLTAGE_MASK;
        debug!("host ocr={:#010x}, card ocr={:#010x}", host_ocr.val, self.ocr.val);

        match self.config.mode {
            BusMode::Native => {
                self.all_send_cid()?;
                self.set_relative_addr(rcas)?;
            }
            BusMode::Spi => self.send_cid()?,
        }
        self.send_csd()?;

        // Byte addressing runs out of argument range before a
        // nonconforming card runs out of sectors. Saturates for one-byte
        // sectors, where the bound is the whole address space.
        let max_byte_addressed = (u32::MAX / self.csd.sector_size).saturating_add(1);
        if !self.high_capacity() && self.csd.capacity > max_byte_addressed {
            warn!(
                "capacity {} exceeds byte addressing, clamping to {} sectors",
                self.csd.capacity, max_byte_addressed
            );
            self.csd.capacity = max_byte_addressed;
        }

        if self.config.mode == BusMode::Native {
            self.select_card(self.rca)?;
        }
        if !self.high_capacity() {
            self.set_blocklen(self.csd.sector_size)?;
        }
        match self.config.family {
            CardFamily::Mmc => self.init_mmc_bus()?,
            CardFamily::Sd => debug!("SD card ready, rca={:#06x}", self.rca),
        }
        Ok(())
    }

    /// CMD0: reset every card on the bus to idle.
    fn go_idle_state(&mut self) -> Result<(), Error> {
        let mut cmd = commands::go_idle_state();
        self.send_cmd(&mut cmd)
    }

    /// CMD8: voltage and interface probe. A card that answers speaks the
    /// high-capacity dialect, and must hand the check pattern back
    /// unchanged.
    fn send_if_cond(&mut self, host_ocr: OcrRegister) -> Result<(), Error> {
        let mut cmd = commands::send_if_cond(host_ocr);
        self.send_cmd(&mut cmd)?;
        if cmd.response[0] & 0xFF != commands::IF_COND_CHECK_PATTERN {
            return Err(Error::InvalidResponse);
        }
        Ok(())
    }

    /// CMD59 (SPI): CRC protection is opt-in under SPI framing; settle it
    /// before negotiating anything else.
    fn crc_on_off(&mut self, enable: bool) -> Result<(), Error> {
        let mut cmd = commands::crc_on_off(enable);
        self.send_cmd(&mut cmd)
    }

    /// CMD1/ACMD41: poll operating conditions until the card reports
    /// itself powered up. `self.ocr` holds the card's answer afterwards.
    fn send_op_cond(&mut self, host_ocr: OcrRegister) -> Result<(), Error> {
        for _ in 0..OP_COND_RETRIES {
            let mut cmd = match self.config.family {
                CardFamily::Mmc => commands::mmc_op_cond(host_ocr),
                CardFamily::Sd => commands::sd_op_cond(host_ocr),
            };
            match self.config.family {
                CardFamily::Mmc => self.send_cmd(&mut cmd)?,
                CardFamily::Sd => self.send_app_cmd(&mut cmd)?,
            }
            let powered_up = match self.config.mode {
                // A zero argument only queries the OCR; no point waiting
                // for power-up then.
                BusMode::Native => {
                    OcrRegister { val: cmd.response[0] }.card_powered_up_status()
                        || host_ocr.val == 0
                }
                BusMode::Spi => !SpiStatusRegister { val: cmd.response[0] as u8 }.idle_state(),
            };
            if powered_up {
                self.ocr = OcrRegister { val: cmd.response[0] };
                return Ok(());
            }
            self.delay.delay_ms(OP_COND_DELAY_MS);
        }
        Err(Error::Timeout)
    }

    /// CMD58 (SPI): the words exchanged while polling are not the real
    /// OCR; fetch the authoritative one. `self.ocr` is updated.
    fn read_ocr(&mut self) -> Result<(), Error> {
        let mut cmd = commands::read_ocr();
        self.send_cmd(&mut cmd)?;
        self.ocr = OcrRegister { val: cmd.response[0] };
        Ok(())
    }

    /// CMD2: collect the identification register off the broadcast
    /// response. `self.cid` is updated.
    fn all_send_cid(&mut self) -> Result<(), Error> {
        let mut cmd = commands::all_send_cid();
        self.send_cmd(&mut cmd)?;
        self.cid = Cid::decode(&cmd.response);
        Ok(())
    }

    /// CMD10 (SPI): the identification register arrives as a data block
    /// and needs its byte order restored first. `self.cid` is updated.
    fn send_cid(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; 16];
        let mut cmd = commands::send_cid(&mut buf);
        self.send_cmd(&mut cmd)?;
        let mut words = response_from_le_bytes(&buf);
        flip_byte_order(&mut words);
        self.cid = Cid::decode(&words);
        Ok(())
    }

    /// CMD3: settle the relative address. SD cards publish theirs in the
    /// response; MMC cards adopt the allocated one the argument carries.
    fn set_relative_addr(&mut self, rcas: &mut RcaAllocator) -> Result<(), Error> {
        let rca = match self.config.family {
            CardFamily::Sd => 0,
            CardFamily::Mmc => rcas.allocate(),
        };
        let mut cmd = commands::set_relative_addr(rca);
        self.send_cmd(&mut cmd)?;
        self.rca = match self.config.family {
            CardFamily::Sd => (cmd.response[0] >> 16) as u16,
            CardFamily::Mmc => rca,
        };
        Ok(())
    }

    /// CMD9: read and decode the card-specific data register. `self.csd`
    /// is updated.
    fn send_csd(&mut self) -> Result<(), Error> {
        let response = match self.config.mode {
            BusMode::Native => {
                let mut cmd = commands::send_csd(self.rca);
                self.send_cmd(&mut cmd)?;
                cmd.response
            }
            BusMode::Spi => {
                let mut buf = [0u8; 16];
                let mut cmd = commands::send_csd_spi(&mut buf);
                self.send_cmd(&mut cmd)?;
                let mut words = response_from_le_bytes(&buf);
                flip_byte_order(&mut words);
                words
            }
        };
        self.csd = match self.config.family {
            CardFamily::Mmc => Csd::decode_mmc(&response)?,
            CardFamily::Sd => Csd::decode_sd(&response)?,
        };
        Ok(())
    }

    /// CMD7: move the addressed card into transfer state.
    fn select_card(&mut self, rca: u16) -> Result<(), Error> {
        let mut cmd = commands::select_card(rca);
        self.send_cmd(&mut cmd)
    }

    /// CMD16: pin the block length on cards that still honor it.
    fn set_blocklen(&mut self, block_len: u32) -> Result<(), Error> {
        let mut cmd = commands::set_blocklen(block_len);
        self.send_cmd(&mut cmd)
    }

    /// MMC speed and width negotiation through EXT_CSD. Needs at least a
    /// version 4 card; older ones have no extended register to negotiate
    /// with.
    fn init_mmc_bus(&mut self) -> Result<(), Error> {
        debug!("MMC card, rca={:#06x}", self.rca);
        if self.csd.mmc_version < MMC_VERSION_4_0 {
            warn!("MMC version {} has no EXT_CSD", self.csd.mmc_version);
            return Err(Error::NotSupported);
        }
        let mut ext = ExtCsd::new();
        self.read_ext_csd(&mut ext)?;

        let card_type = ext.card_type();
        let mut freq_khz = FREQ_PROBING;
        if card_type & (ext_csd::EXT_CSD_CARD_TYPE_F_52M_1_8V | ext_csd::EXT_CSD_CARD_TYPE_F_52M)
            != 0
        {
            freq_khz = FREQ_52M;
        } else if card_type & ext_csd::EXT_CSD_CARD_TYPE_F_26M != 0 {
            freq_khz = FREQ_26M;
        } else {
            error!("unknown CARD_TYPE {:#04x}", card_type);
        }
        if freq_khz > self.config.max_freq_khz {
            freq_khz = self.config.max_freq_khz;
        }

        let high_speed = freq_khz > FREQ_26M;
        if high_speed {
            self.mmc_switch(
                ext_csd::EXT_CSD_CMD_SET_NORMAL,
                ext_csd::EXT_CSD_HS_TIMING,
                ext_csd::EXT_CSD_HS_TIMING_HS,
            )?;
            self.delay.delay_ms(SWITCH_DELAY_MS);
            self.read_ext_csd(&mut ext)?;
            if ext.hs_timing() != ext_csd::EXT_CSD_HS_TIMING_HS {
                error!("HS_TIMING switch did not take effect");
                return Err(Error::InvalidResponse);
            }
        }
        debug!("switching card clock to {} kHz", freq_khz);
        self.host.set_clock(self.config.slot, freq_khz)?;

        let width = self.config.bus_width;
        let power_class = ext.power_class(high_speed, width);
        if power_class != 0 {
            debug!("switching power class to {}", power_class);
            self.mmc_switch(
                ext_csd::EXT_CSD_CMD_SET_NORMAL,
                ext_csd::EXT_CSD_POWER_CLASS,
                power_class,
            )?;
            self.delay.delay_ms(SWITCH_DELAY_MS);
        }
        if width != BusWidth::_1BIT {
            debug!("switching bus width to {}", width.bits());
            self.mmc_switch(
                ext_csd::EXT_CSD_CMD_SET_NORMAL,
                ext_csd::EXT_CSD_BUS_WIDTH,
                width.ext_csd_value(),
            )?;
            // The card switches first; only then may the host follow.
            self.host.set_bus_width(self.config.slot, width)?;
            self.delay.delay_ms(SWITCH_DELAY_MS);
        }

        let sectors = ext.sector_count();
        if sectors > SEC_COUNT_THRESHOLD {
            self.csd.capacity = sectors;
        }
        debug!(
            "MMC card ready: width={} clock={}kHz card_type={:#04x} capacity={} sectors",
            width.bits(),
            freq_khz,
            card_type,
            self.csd.capacity
        );
        Ok(())
    }

    /// CMD6 (MMC): write one EXT_CSD byte and check the card took it.
    fn mmc_switch(&mut self, set: u8, index: usize, value: u8) -> Result<(), Error> {
        let mut cmd = commands::mmc_switch(set, index, value);
        self.send_cmd(&mut cmd)?;
        let status = CardStatusRegister { val: cmd.response[0] };
        if status.switch_error() {
            return Err(Error::InvalidResponse);
        }
        Ok(())
    }

    /// CMD8 (MMC): pull the EXT_CSD register block through a word-aligned
    /// staging buffer, so the transport sees DMA-safe memory no matter
    /// where the caller keeps the snapshot.
    fn read_ext_csd(&mut self, ext: &mut ExtCsd) -> Result<(), Error> {
        let mut staging = DmaBuffer::with_len(ext.0.len())?;
        let mut cmd = commands::send_cxd_data(commands::MMC_SEND_EXT_CSD, staging.bytes_mut());
        self.send_cmd(&mut cmd)?;
        ext.0.copy_from_slice(staging.bytes());
        Ok(())
    }
}
