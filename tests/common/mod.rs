#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_error::mci::{CommandOrDataError, MciError};
use embedded_hal::blocking::delay::DelayMs;

use sdmmc::card::Card;
use sdmmc::command::{Command, Data};
use sdmmc::host::{BusWidth, Host, HostConfig};
use sdmmc::registers::flip_byte_order;

/// R1 status with READY_FOR_DATA set.
pub const R1_READY: u32 = 1 << 8;
/// R1 status with APP_CMD set.
pub const R1_APP_CMD: u32 = 1 << 5;
/// Powered-up OCR for a high-capacity card in the full voltage window.
pub const OCR_READY_HC: u32 = 0x8000_0000 | 0x4000_0000 | 0x00FF_8000;
/// Powered-up OCR for a byte-addressed card.
pub const OCR_READY_SC: u32 = 0x8000_0000 | 0x00FF_8000;

/// What the scripted executor should do with the next command.
pub enum Reply {
    /// Succeed with these response words.
    Ok([u32; 4]),
    /// Succeed and fill the command's read buffer with this data.
    OkData([u32; 4], Vec<u8>),
    /// Fail the transaction call itself.
    Fail(MciError),
    /// Succeed the call but report a per-command error.
    CmdError(MciError),
}

pub fn ok0() -> Reply {
    Reply::Ok([0; 4])
}

pub fn r1(word: u32) -> Reply {
    Reply::Ok([word, 0, 0, 0])
}

pub fn timeout() -> Reply {
    Reply::Fail(MciError::CommandError(CommandOrDataError::Timeout))
}

/// One recorded transaction.
#[derive(Debug)]
pub struct Sent {
    pub opcode: u8,
    pub arg: u32,
    pub data_len: usize,
    pub is_read: bool,
    pub timeout_ms: u32,
    /// Copy of the written data, when the command carried any.
    pub wrote: Vec<u8>,
}

/// Transport that plays back a script of (expected opcode, reply) pairs
/// and records everything the driver asked of it.
#[derive(Default)]
pub struct MockHost {
    pub script: VecDeque<(u8, Reply)>,
    pub sent: Vec<Sent>,
    pub clocks_khz: Vec<u32>,
    pub widths: Vec<BusWidth>,
    pub dma_ok: bool,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost { dma_ok: true, ..MockHost::default() }
    }

    pub fn expect(&mut self, opcode: u8, reply: Reply) {
        self.script.push_back((opcode, reply));
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.sent.iter().filter(|sent| sent.opcode == opcode).count()
    }
}

impl Host for MockHost {
    fn transaction(&mut self, _slot: u8, cmd: &mut Command<'_>) -> Result<(), MciError> {
        let wrote = match &cmd.data {
            Some(Data::Write(buf)) => buf.to_vec(),
            _ => Vec::new(),
        };
        self.sent.push(Sent {
            opcode: cmd.opcode,
            arg: cmd.arg,
            data_len: cmd.data.as_ref().map_or(0, Data::len),
            is_read: cmd.data.as_ref().map_or(false, Data::is_read),
            timeout_ms: cmd.timeout_ms,
            wrote,
        });
        let (expected, reply) = self.script.pop_front().expect("transport script exhausted");
        assert_eq!(expected, cmd.opcode, "unexpected command");
        match reply {
            Reply::Ok(words) => {
                cmd.response = words;
                Ok(())
            }
            Reply::OkData(words, data) => {
                cmd.response = words;
                match cmd.data.as_mut() {
                    Some(Data::Read(buf)) => buf[..data.len()].copy_from_slice(&data),
                    _ => panic!("CMD{} reply carries data but the command reads none", cmd.opcode),
                }
                Ok(())
            }
            Reply::Fail(err) => Err(err),
            Reply::CmdError(err) => {
                cmd.error = Some(err);
                Ok(())
            }
        }
    }

    fn set_clock(&mut self, _slot: u8, freq_khz: u32) -> Result<(), MciError> {
        self.clocks_khz.push(freq_khz);
        Ok(())
    }

    fn set_bus_width(&mut self, _slot: u8, width: BusWidth) -> Result<(), MciError> {
        self.widths.push(width);
        Ok(())
    }

    fn dma_capable(&self, _buf: &[u8]) -> bool {
        self.dma_ok
    }
}

/// Delay that only accumulates what it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ms: u32,
}

impl DelayMs<u32> for NoDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

pub fn new_card(host: MockHost, config: HostConfig) -> Card<MockHost, NoDelay> {
    Card::new(host, NoDelay::default(), config)
}

/// Pack `value` into register bits [start, start+len) of a response,
/// using the register's documented bit numbering (CRC byte included).
pub fn put_bits(resp: &mut [u32; 4], start: usize, len: usize, value: u32) {
    let start = start - 8;
    let shift = start % 32;
    resp[start / 32] |= value << shift;
    if shift + len > 32 {
        resp[start / 32 + 1] |= value >> (32 - shift);
    }
}

/// CID of a made-up card named "RM08G".
pub fn cid_fixture() -> [u32; 4] {
    let mut resp = [0u32; 4];
    put_bits(&mut resp, 120, 8, 0x1B);
    put_bits(&mut resp, 104, 16, 0x534D);
    for (i, byte) in b"RM08G".iter().enumerate() {
        put_bits(&mut resp, 96 - 8 * i, 8, *byte as u32);
    }
    put_bits(&mut resp, 56, 8, 0x14);
    put_bits(&mut resp, 24, 32, 0xCAFE_F00D);
    put_bits(&mut resp, 8, 12, (19 << 4) | 0x3);
    resp
}

/// SD CSD, high-capacity layout: capacity comes out as (c_size + 1) << 10.
pub fn sd_csd_v2(c_size: u32) -> [u32; 4] {
    let mut resp = [0u32; 4];
    put_bits(&mut resp, 126, 2, 1);
    put_bits(&mut resp, 96, 8, 0x32);
    put_bits(&mut resp, 84, 12, 0x5B5);
    put_bits(&mut resp, 48, 22, c_size);
    resp
}

/// SD CSD, legacy layout: 0xE40 << 9 blocks of `1 << read_bl_len` bytes.
pub fn sd_csd_v1(read_bl_len: u32) -> [u32; 4] {
    let mut resp = [0u32; 4];
    put_bits(&mut resp, 96, 8, 0x32);
    put_bits(&mut resp, 84, 12, 0x1B5);
    put_bits(&mut resp, 80, 4, read_bl_len);
    put_bits(&mut resp, 62, 12, 0xE3F);
    put_bits(&mut resp, 47, 3, 7);
    resp
}

/// MMC CSD: structure 1.2, 50 MHz speed class, small legacy capacity.
pub fn mmc_csd(mmc_version: u32) -> [u32; 4] {
    let mut resp = [0u32; 4];
    put_bits(&mut resp, 126, 2, 2);
    put_bits(&mut resp, 122, 4, mmc_version);
    put_bits(&mut resp, 96, 8, 0x5A);
    put_bits(&mut resp, 80, 4, 9);
    put_bits(&mut resp, 62, 12, 0xFFF);
    put_bits(&mut resp, 47, 3, 7);
    resp
}

/// EXT_CSD block with the fields bring-up looks at.
pub fn ext_csd_bytes(
    card_type: u8,
    hs_timing: u8,
    pwr_cl_52: u8,
    pwr_cl_26: u8,
    sec_count: u32,
) -> Vec<u8> {
    let mut bytes = vec![0u8; 512];
    bytes[196] = card_type;
    bytes[185] = hs_timing;
    bytes[202] = pwr_cl_52;
    bytes[203] = pwr_cl_26;
    bytes[212..216].copy_from_slice(&sec_count.to_le_bytes());
    bytes
}

/// Serialize native response words into the byte stream a register read
/// returns over SPI framing.
pub fn to_spi_wire(words: [u32; 4]) -> Vec<u8> {
    let mut flipped = words;
    flip_byte_order(&mut flipped);
    flipped.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Word-aligned byte buffer for I/O calls with placement rules.
pub struct AlignedBuf(Vec<u32>);

impl AlignedBuf {
    pub fn zeroed(len: usize) -> Self {
        assert_eq!(len % 4, 0);
        AlignedBuf(vec![0; len / 4])
    }

    /// Filled with a per-byte rolling pattern, for content assertions.
    pub fn patterned(len: usize) -> Self {
        let mut buf = AlignedBuf::zeroed(len);
        for (i, byte) in buf.bytes_mut().iter_mut().enumerate() {
            *byte = i as u8;
        }
        buf
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.0.len() * 4) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.0.as_mut_ptr() as *mut u8, self.0.len() * 4)
        }
    }
}

/// Scripted bring-up of an SPI-framed SD card.
pub fn push_sd_spi_init(host: &mut MockHost, ocr: u32, csd: [u32; 4]) {
    host.expect(0, ok0());
    host.expect(0, ok0());
    host.expect(8, r1(0x1AA));
    host.expect(59, r1(0));
    host.expect(55, r1(0x01));
    host.expect(41, r1(0x00));
    host.expect(58, r1(ocr));
    host.expect(10, Reply::OkData([0; 4], to_spi_wire(cid_fixture())));
    host.expect(9, Reply::OkData([0; 4], to_spi_wire(csd)));
    if ocr & 0x4000_0000 == 0 {
        host.expect(16, r1(0));
    }
}

/// Scripted bring-up of a native-mode SD card. `ocr` decides high
/// capacity, `busy_rounds` how many polls stay busy first.
pub fn push_sd_native_init(
    host: &mut MockHost,
    busy_rounds: usize,
    ocr: u32,
    csd: [u32; 4],
    rca: u16,
) {
    host.expect(0, ok0());
    host.expect(0, ok0());
    host.expect(8, r1(0x1AA));
    for _ in 0..busy_rounds {
        host.expect(55, r1(R1_APP_CMD));
        host.expect(41, r1(0));
    }
    host.expect(55, r1(R1_APP_CMD));
    host.expect(41, r1(ocr));
    host.expect(2, Reply::Ok(cid_fixture()));
    host.expect(3, r1((rca as u32) << 16));
    host.expect(9, Reply::Ok(csd));
    host.expect(7, r1(R1_READY));
    if ocr & 0x4000_0000 == 0 {
        host.expect(16, r1(R1_READY));
    }
}
