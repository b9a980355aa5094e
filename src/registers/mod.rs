pub mod cid;
pub mod csd;
pub mod ext_csd;
pub mod ocr;
pub mod status;

/// Response words of a long (136-bit) response in the native register
/// convention: register bits [127:8] live in bits [119:0], least
/// significant word first. The CRC byte is never captured.
pub type Response = [u32; 4];

/// Extract `len` bits starting at register bit `start` from a long
/// response. `start` uses the register's documented bit numbering, which
/// counts the CRC byte the response words do not carry.
pub(crate) fn rsp_bits(resp: &Response, start: usize, len: usize) -> u32 {
    debug_assert!(len <= 32);
    let start = start - 8;
    let shift = start % 32;
    let mut bits = resp[start / 32] >> shift;
    if shift + len > 32 {
        bits |= resp[start / 32 + 1] << (32 - shift);
    }
    if len < 32 {
        bits &= (1 << len) - 1;
    }
    bits
}

/// Restore a register block read over SPI framing, which arrives
/// byte-reversed relative to the native response convention. Swaps outer
/// word pairs inward, byte-swapping each word; applying it twice is the
/// identity. `words.len()` must be even.
pub fn flip_byte_order(words: &mut [u32]) {
    debug_assert!(words.len() % 2 == 0);
    for i in 0..words.len() / 2 {
        let left = words[i].swap_bytes();
        let right = words[words.len() - i - 1].swap_bytes();
        words[i] = right;
        words[words.len() - i - 1] = left;
    }
}

/// Assemble response words from a little-endian data-read buffer.
pub(crate) fn response_from_le_bytes(buf: &[u8; 16]) -> Response {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Pack `value` into register bits [start, start+len), the inverse of
/// [`rsp_bits`], for building response fixtures.
#[cfg(test)]
pub(crate) fn set_rsp_bits(resp: &mut Response, start: usize, len: usize, value: u32) {
    debug_assert!(len == 32 || value < 1 << len);
    let start = start - 8;
    let shift = start % 32;
    resp[start / 32] |= value << shift;
    if shift + len > 32 {
        resp[start / 32 + 1] |= value >> (32 - shift);
    }
}
