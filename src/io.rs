use alloc::vec::Vec;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, error, trace};

use crate::card::Card;
use crate::command::DEFAULT_CMD_TIMEOUT_MS;
use crate::commands;
use crate::error::Error;
use crate::host::{BusMode, Host};
use crate::registers::status::CardStatusRegister;

/// Data buffers handed to the transport must sit on this alignment.
pub const WORD_ALIGN: usize = 4;

/// Word-aligned, fallibly allocated staging memory for transfers whose
/// caller buffer the transport cannot use in place. Dropping it releases
/// the memory on every path out of a transfer.
pub(crate) struct DmaBuffer(Vec<u32>);

impl DmaBuffer {
    /// Allocate at least `len` zeroed bytes, rounded up to a whole number
    /// of words. [`DmaBuffer::bytes`] returns the rounded length.
    pub(crate) fn with_len(len: usize) -> Result<Self, Error> {
        let words = (len + WORD_ALIGN - 1) / WORD_ALIGN;
        let mut buf = Vec::new();
        buf.try_reserve_exact(words).map_err(|_| Error::NoMemory)?;
        buf.resize(words, 0);
        Ok(DmaBuffer(buf))
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.0.len() * WORD_ALIGN)
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            core::slice::from_raw_parts_mut(
                self.0.as_mut_ptr() as *mut u8,
                self.0.len() * WORD_ALIGN,
            )
        }
    }
}

impl<H: Host, D: DelayMs<u32>> Card<H, D> {
    /// Write whole sectors from `src`, whose length must be a multiple of
    /// the sector size. A buffer the transport cannot use in place is
    /// staged sector by sector through an aligned bounce buffer; slower,
    /// but any caller memory works.
    pub fn write_sectors(&mut self, src: &[u8], start_sector: u32) -> Result<(), Error> {
        if src.is_empty() {
            return Ok(());
        }
        let sector_size = self.csd.sector_size as usize;
        if sector_size == 0 || src.len() % sector_size != 0 {
            return Err(Error::InvalidArgument);
        }
        if self.host.dma_capable(src) && src.as_ptr() as usize % WORD_ALIGN == 0 {
            return self.write_sectors_dma(src, start_sector);
        }
        trace!("staging write of {} sectors", src.len() / sector_size);
        let mut staging = DmaBuffer::with_len(sector_size)?;
        for (i, sector) in src.chunks_exact(sector_size).enumerate() {
            staging.bytes_mut()[..sector_size].copy_from_slice(sector);
            let staged = &staging.bytes()[..sector_size];
            if let Err(err) = self.write_sectors_dma(staged, start_sector + i as u32) {
                debug!("write failed at sector {}: {:?}", start_sector + i as u32, err);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Direct write followed by the best-effort readiness wait.
    pub fn write_sectors_dma(&mut self, src: &[u8], start_sector: u32) -> Result<(), Error> {
        self.write_sectors_dma_no_wait(src, start_sector)?;
        self.wait_ready(DEFAULT_CMD_TIMEOUT_MS)
    }

    /// Direct write without waiting for the card to drain its buffers.
    /// `src` must already satisfy the transport's placement rules; the
    /// next command observes the card busy instead.
    pub fn write_sectors_dma_no_wait(&mut self, src: &[u8], start_sector: u32) -> Result<(), Error> {
        if src.is_empty() {
            return Ok(());
        }
        let sector_size = self.csd.sector_size as usize;
        if sector_size == 0 || src.len() % sector_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let count = (src.len() / sector_size) as u32;
        if start_sector as u64 + count as u64 > self.csd.capacity as u64 {
            error!(
                "write of {}+{} sectors reaches beyond capacity {}",
                start_sector, count, self.csd.capacity
            );
            return Err(Error::InvalidSize);
        }
        let mut cmd = commands::write_blocks(src, self.block_arg(start_sector), count, sector_size);
        if let Err(err) = self.send_cmd(&mut cmd) {
            error!("write command failed: {:?}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Read whole sectors into `dst`, which must be word aligned, usable
    /// by the transport in place, and a multiple of the sector size long.
    /// Anything else is rejected before the transport sees the request.
    pub fn read_sectors_dma(&mut self, dst: &mut [u8], start_sector: u32) -> Result<(), Error> {
        if dst.is_empty() {
            return Ok(());
        }
        if !self.host.dma_capable(dst) || dst.as_ptr() as usize % WORD_ALIGN != 0 {
            error!("read buffer is not DMA-reachable word-aligned memory");
            return Err(Error::InvalidArgument);
        }
        let sector_size = self.csd.sector_size as usize;
        if sector_size == 0 || dst.len() % sector_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let count = (dst.len() / sector_size) as u32;
        if start_sector as u64 + count as u64 > self.csd.capacity as u64 {
            error!(
                "read of {}+{} sectors reaches beyond capacity {}",
                start_sector, count, self.csd.capacity
            );
            return Err(Error::InvalidSize);
        }
        let mut cmd = commands::read_blocks(dst, self.block_arg(start_sector), count, sector_size);
        if let Err(err) = self.send_cmd(&mut cmd) {
            error!("read command failed: {:?}", err);
            return Err(err);
        }
        if self.config.mode == BusMode::Native {
            // TODO bound this poll the way wait_ready is bounded; a card
            // that wedges after the transfer keeps us here forever.
            let mut polls = 0u32;
            loop {
                let status = self.send_status()?;
                if status.ready_for_data() {
                    break;
                }
                polls += 1;
                if polls % 10 == 0 {
                    trace!("waiting for card to become ready ({})", polls);
                }
            }
        }
        Ok(())
    }

    /// CMD13 poll until the card reports ready-for-data, rechecking once
    /// per millisecond up to `timeout_ms`. Running out of budget is not a
    /// failure; the next command observes the busy card itself. SPI
    /// framing has no equivalent poll.
    pub fn wait_ready(&mut self, timeout_ms: u32) -> Result<(), Error> {
        if self.config.mode == BusMode::Spi {
            return Ok(());
        }
        for poll in 0..timeout_ms {
            let status = self.send_status()?;
            if status.ready_for_data() {
                return Ok(());
            }
            if poll % 10 == 0 {
                trace!("waiting for card to become ready ({}ms)", poll);
            }
            self.delay.delay_ms(1);
        }
        Ok(())
    }

    /// Sector index or byte offset, per the card's addressing mode.
    fn block_arg(&self, sector: u32) -> u32 {
        if self.high_capacity() {
            sector
        } else {
            sector * self.csd.sector_size
        }
    }

    /// CMD13: fetch card status.
    fn send_status(&mut self) -> Result<CardStatusRegister, Error> {
        let mut cmd = commands::send_status(self.rca);
        self.send_cmd(&mut cmd)?;
        Ok(CardStatusRegister { val: cmd.response[0] })
    }
}
