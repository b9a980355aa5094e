use crate::command::{Command, Data, ResponseKind, WRITE_CMD_TIMEOUT_MS};
use crate::registers::ocr::{AccessMode, OcrRegister};

pub const MMC_GO_IDLE_STATE: u8 = 0;
pub const MMC_SEND_OP_COND: u8 = 1;
pub const MMC_ALL_SEND_CID: u8 = 2;
pub const MMC_SET_RELATIVE_ADDR: u8 = 3;
pub const MMC_SWITCH: u8 = 6;
pub const MMC_SELECT_CARD: u8 = 7;
pub const SD_SEND_IF_COND: u8 = 8;
pub const MMC_SEND_EXT_CSD: u8 = 8;
pub const MMC_SEND_CSD: u8 = 9;
pub const MMC_SEND_CID: u8 = 10;
pub const MMC_SEND_STATUS: u8 = 13;
pub const MMC_SET_BLOCKLEN: u8 = 16;
pub const MMC_READ_BLOCK_SINGLE: u8 = 17;
pub const MMC_READ_BLOCK_MULTIPLE: u8 = 18;
pub const MMC_WRITE_BLOCK_SINGLE: u8 = 24;
pub const MMC_WRITE_BLOCK_MULTIPLE: u8 = 25;
pub const SD_APP_OP_COND: u8 = 41;
pub const MMC_APP_CMD: u8 = 55;
pub const SD_READ_OCR: u8 = 58;
pub const SD_CRC_ON_OFF: u8 = 59;

/// Echo pattern the card must return from the interface-condition probe.
pub const IF_COND_CHECK_PATTERN: u32 = 0xAA;

/// CMD6 access mode writing a single EXT_CSD byte.
const MMC_SWITCH_MODE_WRITE_BYTE: u32 = 3;

/// CMD0: force every card on the bus into idle state. No response.
pub fn go_idle_state() -> Command<'static> {
    Command::new(MMC_GO_IDLE_STATE, 0, ResponseKind::None)
}

/// CMD8 (SD): interface-condition probe. The argument carries the host
/// voltage window flag and an echo pattern; a card that answers can speak
/// the high-capacity dialect.
pub fn send_if_cond(host_ocr: OcrRegister) -> Command<'static> {
    let voltage_supplied = (host_ocr.val & OcrRegister::VOLTAGE_MASK != 0) as u32;
    let arg = voltage_supplied << 8 | IF_COND_CHECK_PATTERN;
    Command::new(SD_SEND_IF_COND, arg, ResponseKind::Short)
}

/// ACMD41 (SD): operating-condition negotiation, dispatched inside the
/// application-command envelope.
pub fn sd_op_cond(host_ocr: OcrRegister) -> Command<'static> {
    Command::new(SD_APP_OP_COND, host_ocr.val, ResponseKind::Short)
}

/// CMD1 (MMC): operating-condition negotiation with the access mode forced
/// to sector addressing.
pub fn mmc_op_cond(host_ocr: OcrRegister) -> Command<'static> {
    let mut ocr = host_ocr;
    ocr.set_access_mode(AccessMode::Sector);
    Command::new(MMC_SEND_OP_COND, ocr.val, ResponseKind::Short)
}

/// CMD58 (SPI): read the authoritative OCR.
pub fn read_ocr() -> Command<'static> {
    Command::new(SD_READ_OCR, 0, ResponseKind::Short)
}

/// CMD59 (SPI): turn CRC protection on or off.
pub fn crc_on_off(enable: bool) -> Command<'static> {
    Command::new(SD_CRC_ON_OFF, enable as u32, ResponseKind::Short)
}

/// CMD55: prefix announcing that the next command is application-specific.
pub fn app_cmd(rca: u16) -> Command<'static> {
    Command::new(MMC_APP_CMD, (rca as u32) << 16, ResponseKind::Short)
}

/// CMD2: every card in identification state answers with its CID.
pub fn all_send_cid() -> Command<'static> {
    Command::new(MMC_ALL_SEND_CID, 0, ResponseKind::Long)
}

/// CMD10 (SPI): the CID arrives as a 16-byte data read instead of a long
/// response.
pub fn send_cid(buf: &mut [u8; 16]) -> Command<'_> {
    Command::adtc(MMC_SEND_CID, 0, ResponseKind::Short, Data::Read(buf), 16)
}

/// CMD3: SD cards publish their relative address in the response; MMC
/// cards adopt the one carried in the argument.
pub fn set_relative_addr(rca: u16) -> Command<'static> {
    Command::new(MMC_SET_RELATIVE_ADDR, (rca as u32) << 16, ResponseKind::Short)
}

/// CMD9 (native): the card answers with its CSD as a long response.
pub fn send_csd(rca: u16) -> Command<'static> {
    Command::new(MMC_SEND_CSD, (rca as u32) << 16, ResponseKind::Long)
}

/// CMD9 (SPI): the CSD arrives as a 16-byte data read.
pub fn send_csd_spi(buf: &mut [u8; 16]) -> Command<'_> {
    Command::adtc(MMC_SEND_CSD, 0, ResponseKind::Short, Data::Read(buf), 16)
}

/// CMD7: select the addressed card, or deselect everything when `rca` is
/// zero. No card answers a deselect.
pub fn select_card(rca: u16) -> Command<'static> {
    let response_kind = if rca == 0 { ResponseKind::None } else { ResponseKind::Short };
    Command::new(MMC_SELECT_CARD, (rca as u32) << 16, response_kind)
}

/// CMD16: fix the card block length.
pub fn set_blocklen(block_len: u32) -> Command<'static> {
    Command::new(MMC_SET_BLOCKLEN, block_len, ResponseKind::Short)
}

/// CMD13: card status.
pub fn send_status(rca: u16) -> Command<'static> {
    Command::new(MMC_SEND_STATUS, (rca as u32) << 16, ResponseKind::Short)
}

/// Register block streamed out of the card as a single data transfer, the
/// full length as one block (CMD8 for EXT_CSD).
pub fn send_cxd_data(opcode: u8, buf: &mut [u8]) -> Command<'_> {
    let len = buf.len();
    Command::adtc(opcode, 0, ResponseKind::Short, Data::Read(buf), len)
}

/// CMD6 (MMC): write one EXT_CSD byte.
pub fn mmc_switch(set: u8, index: usize, value: u8) -> Command<'static> {
    let arg = MMC_SWITCH_MODE_WRITE_BYTE << 24
        | (index as u32) << 16
        | (value as u32) << 8
        | set as u32;
    Command::new(MMC_SWITCH, arg, ResponseKind::ShortBusy)
}

/// CMD24/CMD25: single or multi block write. `arg` must already be in the
/// session's addressing mode.
pub fn write_blocks(src: &[u8], arg: u32, block_count: u32, block_len: usize) -> Command<'_> {
    let opcode = if block_count == 1 { MMC_WRITE_BLOCK_SINGLE } else { MMC_WRITE_BLOCK_MULTIPLE };
    let mut cmd = Command::adtc(opcode, arg, ResponseKind::Short, Data::Write(src), block_len);
    cmd.timeout_ms = WRITE_CMD_TIMEOUT_MS;
    cmd
}

/// CMD17/CMD18: single or multi block read.
pub fn read_blocks(dst: &mut [u8], arg: u32, block_count: u32, block_len: usize) -> Command<'_> {
    let opcode = if block_count == 1 { MMC_READ_BLOCK_SINGLE } else { MMC_READ_BLOCK_MULTIPLE };
    Command::adtc(opcode, arg, ResponseKind::Short, Data::Read(dst), block_len)
}
