use crate::registers::{rsp_bits, Response};

/// Card Identification register, decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cid {
    /// Manufacturer ID assigned by the card association.
    pub manufacturer_id: u8,
    /// OEM/application ID.
    pub oem_id: u16,
    /// Product name, 5 ASCII bytes.
    pub name: [u8; 5],
    /// Product revision, binary-coded decimal.
    pub revision: u8,
    /// Product serial number.
    pub serial: u32,
    /// Manufacturing date, packed year offset and month.
    pub date: u16,
}

impl Cid {
    /// Field extraction only; a CID is whatever the card sent.
    pub fn decode(resp: &Response) -> Cid {
        let mut name = [0u8; 5];
        for (i, byte) in name.iter_mut().enumerate() {
            *byte = rsp_bits(resp, 96 - 8 * i, 8) as u8;
        }
        Cid {
            manufacturer_id: rsp_bits(resp, 120, 8) as u8,
            oem_id: rsp_bits(resp, 104, 16) as u16,
            name,
            revision: rsp_bits(resp, 56, 8) as u8,
            serial: rsp_bits(resp, 24, 32),
            date: rsp_bits(resp, 8, 12) as u16,
        }
    }

    /// Product name as text, for summaries.
    pub fn product_name(&self) -> &str {
        core::str::from_utf8(&self.name).unwrap_or("?????")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::set_rsp_bits;

    fn fixture() -> Response {
        let mut resp = [0u32; 4];
        set_rsp_bits(&mut resp, 120, 8, 0x1B);
        set_rsp_bits(&mut resp, 104, 16, 0x534D);
        for (i, byte) in b"EB1QT".iter().enumerate() {
            set_rsp_bits(&mut resp, 96 - 8 * i, 8, *byte as u32);
        }
        set_rsp_bits(&mut resp, 56, 8, 0x30);
        set_rsp_bits(&mut resp, 24, 32, 0xDEAD_BEEF);
        set_rsp_bits(&mut resp, 8, 12, (17 << 4) | 0x8);
        resp
    }

    #[test]
    fn decodes_every_field() {
        let cid = Cid::decode(&fixture());
        assert_eq!(cid.manufacturer_id, 0x1B);
        assert_eq!(cid.oem_id, 0x534D);
        assert_eq!(cid.product_name(), "EB1QT");
        assert_eq!(cid.revision, 0x30);
        assert_eq!(cid.serial, 0xDEAD_BEEF);
        assert_eq!(cid.date, (17 << 4) | 0x8);
    }

    #[test]
    fn non_ascii_name_falls_back() {
        let mut resp = fixture();
        set_rsp_bits(&mut resp, 96, 8, 0xFF);
        let cid = Cid::decode(&resp);
        assert_eq!(cid.product_name(), "?????");
    }
}
