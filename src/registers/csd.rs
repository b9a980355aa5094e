use crate::error::Error;
use crate::registers::{rsp_bits, Response};

/// Largest block this layer addresses; bigger card blocks are folded into
/// 512-byte sectors at decode time.
pub const SECTOR_SIZE: u32 = 512;

/// First MMC protocol version with an EXT_CSD register.
pub const MMC_VERSION_4_0: u8 = 4;

/// TRAN_SPEED code for the 50 MHz class.
const SPEED_CODE_50M: u32 = 0x5A;

/// Card-Specific Data, decoded per family into a family-neutral shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Csd {
    /// CSD structure version, family-specific numbering.
    pub structure: u8,
    /// MMC protocol version; zero on SD cards.
    pub mmc_version: u8,
    /// Capacity in sectors of `sector_size` bytes.
    pub capacity: u32,
    /// Bytes per sector after folding, at most [`SECTOR_SIZE`].
    pub sector_size: u32,
    /// Raw READ_BL_LEN exponent as the card reported it.
    pub read_block_len: u8,
    /// Supported command classes; SD only.
    pub card_command_class: u16,
    /// Maximum transfer speed in Hz.
    pub transfer_speed: u32,
}

impl Csd {
    /// MMC layout. Structure versions 1.0, 2.0 and EXT_CSD (1, 2, 3) share
    /// the fields read here; 0 is reserved.
    pub fn decode_mmc(resp: &Response) -> Result<Csd, Error> {
        let structure = rsp_bits(resp, 126, 2) as u8;
        if !(1..=3).contains(&structure) {
            return Err(Error::InvalidResponse);
        }
        let mut csd = Csd {
            structure,
            mmc_version: rsp_bits(resp, 122, 4) as u8,
            capacity: (rsp_bits(resp, 62, 12) + 1) << (rsp_bits(resp, 47, 3) + 2),
            read_block_len: rsp_bits(resp, 80, 4) as u8,
            transfer_speed: decode_transfer_speed(resp),
            ..Csd::default()
        };
        csd.fold_to_sector_size();
        Ok(csd)
    }

    /// SD layout. Structure version 0 is the legacy byte-addressed layout,
    /// version 1 the high-capacity one with fixed 512-byte blocks.
    pub fn decode_sd(resp: &Response) -> Result<Csd, Error> {
        let structure = rsp_bits(resp, 126, 2) as u8;
        let mut csd = Csd { structure, ..Csd::default() };
        match structure {
            0 => {
                csd.capacity = (rsp_bits(resp, 62, 12) + 1) << (rsp_bits(resp, 47, 3) + 2);
                csd.read_block_len = rsp_bits(resp, 80, 4) as u8;
            }
            1 => {
                // C_SIZE counts 512 KiB units here.
                csd.capacity = (rsp_bits(resp, 48, 22) + 1) << 10;
                csd.read_block_len = 9;
            }
            _ => return Err(Error::InvalidResponse),
        }
        csd.fold_to_sector_size();
        csd.card_command_class = rsp_bits(resp, 84, 12) as u16;
        csd.transfer_speed = decode_transfer_speed(resp);
        Ok(csd)
    }

    /// Fold an oversized card block length into 512-byte sectors without
    /// changing the byte capacity.
    fn fold_to_sector_size(&mut self) {
        let read_bl_size = 1u32 << self.read_block_len;
        self.sector_size = read_bl_size.min(SECTOR_SIZE);
        if self.sector_size < read_bl_size {
            self.capacity *= read_bl_size / self.sector_size;
        }
    }
}

/// TRAN_SPEED resolves to one of two rates.
fn decode_transfer_speed(resp: &Response) -> u32 {
    if rsp_bits(resp, 96, 8) == SPEED_CODE_50M {
        50_000_000
    } else {
        25_000_000
    }
}
