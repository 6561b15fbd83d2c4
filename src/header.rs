use crate::boxes::FourCC;
use crate::error::ErrorKind;
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

pub const SMALL_HEADER_LEN: u8 = 8;
pub const LARGE_HEADER_LEN: u8 = 16;

/// Box envelope as it appeared on the wire.
///
/// `declared_size` is the raw size field after extended-size resolution:
/// `0` still means "to the end of the enclosing scope".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxHeader {
    pub typ: FourCC,
    pub declared_size: u64,
    pub header_length: u8,
}

impl BoxHeader {
    pub fn is_unbounded(&self) -> bool {
        self.declared_size == 0
    }

    /// Total box length, with size 0 resolved against what is left in the scope.
    pub fn resolve_size(&self, remaining: u64) -> u64 {
        if self.is_unbounded() {
            remaining
        } else {
            self.declared_size
        }
    }

    pub fn body_len(&self, remaining: u64) -> u64 {
        self.resolve_size(remaining) - self.header_length as u64
    }
}

/// Reads a box header from the start of `buf`.
///
/// `buf` must span exactly the bytes left in the enclosing scope so a declared
/// size can be checked against it. Returns the header and the number of bytes
/// the header occupies.
pub fn read_header(buf: &[u8]) -> Result<(BoxHeader, usize), ErrorKind> {
    let remaining = buf.len() as u64;
    if buf.len() < SMALL_HEADER_LEN as usize {
        return Err(ErrorKind::TruncatedHeader {
            needed: SMALL_HEADER_LEN as u64,
            available: remaining,
        });
    }

    let size32 = BigEndian::read_u32(&buf[0..4]);
    let typ = FourCC([buf[4], buf[5], buf[6], buf[7]]);

    let header = match size32 {
        0 => BoxHeader {
            typ,
            declared_size: 0,
            header_length: SMALL_HEADER_LEN,
        },
        1 => {
            if buf.len() < LARGE_HEADER_LEN as usize {
                return Err(ErrorKind::InvalidSize {
                    size: 1,
                    reason: "missing extended size",
                });
            }
            let size = BigEndian::read_u64(&buf[8..16]);
            if size < LARGE_HEADER_LEN as u64 {
                return Err(ErrorKind::InvalidSize {
                    size,
                    reason: "extended size smaller than its 16-byte header",
                });
            }
            BoxHeader {
                typ,
                declared_size: size,
                header_length: LARGE_HEADER_LEN,
            }
        }
        2..=7 => {
            return Err(ErrorKind::InvalidSize {
                size: size32 as u64,
                reason: "smaller than the 8-byte header",
            });
        }
        n => BoxHeader {
            typ,
            declared_size: n as u64,
            header_length: SMALL_HEADER_LEN,
        },
    };

    if header.declared_size > remaining {
        return Err(ErrorKind::TruncatedBox {
            declared: header.declared_size,
            available: remaining,
        });
    }

    Ok((header, header.header_length as usize))
}

/// Header length needed for a body of `body_len` bytes: 8 unless the total
/// length exceeds what the 32-bit size field can hold.
pub fn header_len_for(body_len: u64) -> u8 {
    match body_len.checked_add(SMALL_HEADER_LEN as u64) {
        Some(total) if total <= u32::MAX as u64 => SMALL_HEADER_LEN,
        _ => LARGE_HEADER_LEN,
    }
}

/// Appends the envelope for a box whose body (fields plus children) is `body_len` bytes.
pub fn write_header(out: &mut Vec<u8>, typ: FourCC, body_len: u64) {
    let mut b = [0u8; 8];
    if header_len_for(body_len) == SMALL_HEADER_LEN {
        BigEndian::write_u32(&mut b[0..4], (body_len + SMALL_HEADER_LEN as u64) as u32);
        b[4..8].copy_from_slice(&typ.0);
        out.extend_from_slice(&b);
    } else {
        BigEndian::write_u32(&mut b[0..4], 1);
        b[4..8].copy_from_slice(&typ.0);
        out.extend_from_slice(&b);
        BigEndian::write_u64(&mut b, body_len.saturating_add(LARGE_HEADER_LEN as u64));
        out.extend_from_slice(&b);
    }
}
