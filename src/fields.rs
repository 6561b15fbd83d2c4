use crate::boxes::FourCC;
use crate::error::{ErrorKind, SerializeErrorKind};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

type DecodeResult<T> = Result<(T, usize), ErrorKind>;
type EncodeResult = Result<(), SerializeErrorKind>;

fn take<'a>(buf: &'a [u8], offset: usize, width: usize, field: &'static str) -> Result<&'a [u8], ErrorKind> {
    let available = buf.len().saturating_sub(offset);
    if available < width || offset > buf.len() {
        return Err(ErrorKind::MalformedField {
            field,
            needed: width,
            available,
        });
    }
    Ok(&buf[offset..offset + width])
}

macro_rules! fixed_width {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $width:expr, $read:expr) => {
        $(#[$doc])*
        pub fn $name(buf: &[u8], offset: usize, field: &'static str) -> DecodeResult<$ty> {
            let bytes = take(buf, offset, $width, field)?;
            Ok(($read(bytes), offset + $width))
        }
    };
}

fixed_width!(decode_u8, u8, 1, |b: &[u8]| b[0]);
fixed_width!(decode_u16, u16, 2, BigEndian::read_u16);
fixed_width!(decode_i16, i16, 2, BigEndian::read_i16);
fixed_width!(
    /// 24-bit unsigned, as used for full box flags.
    decode_u24, u32, 3, BigEndian::read_u24
);
fixed_width!(decode_u32, u32, 4, BigEndian::read_u32);
fixed_width!(decode_i32, i32, 4, BigEndian::read_i32);
fixed_width!(decode_u64, u64, 8, BigEndian::read_u64);
fixed_width!(decode_i64, i64, 8, BigEndian::read_i64);

pub fn decode_fourcc(buf: &[u8], offset: usize, field: &'static str) -> DecodeResult<FourCC> {
    let b = take(buf, offset, 4, field)?;
    Ok((FourCC([b[0], b[1], b[2], b[3]]), offset + 4))
}

/// Null-terminated string. A missing terminator reads to the end of `buf`.
pub fn decode_cstring(buf: &[u8], offset: usize, field: &'static str) -> DecodeResult<NulString> {
    let rest = buf.get(offset..).ok_or(ErrorKind::MalformedField {
        field,
        needed: 1,
        available: 0,
    })?;
    match rest.iter().position(|&c| c == 0) {
        Some(nul) => Ok((NulString::new(&rest[..nul]), offset + nul + 1)),
        None => Ok((
            NulString {
                bytes: rest.to_vec(),
                terminated: false,
            },
            buf.len(),
        )),
    }
}

/// Byte string prefixed by its u16 length.
pub fn decode_prefixed_u16(buf: &[u8], offset: usize, field: &'static str) -> DecodeResult<Vec<u8>> {
    let (len, offset) = decode_u16(buf, offset, field)?;
    let bytes = take(buf, offset, len as usize, field)?;
    Ok((bytes.to_vec(), offset + len as usize))
}

/// Sequential reader over a box body.
///
/// On failure the position is left at the start of the failing field, so
/// [`FieldReader::offset`] reports where decoding stopped.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

macro_rules! reader_method {
    ($name:ident, $ty:ty, $decode:ident) => {
        pub fn $name(&mut self, field: &'static str) -> Result<$ty, ErrorKind> {
            let (v, next) = $decode(self.buf, self.pos, field)?;
            self.pos = next;
            Ok(v)
        }
    };
}

impl<'a> FieldReader<'a> {
    /// `base` is the absolute offset of `buf[0]` in the parsed input.
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self { buf, pos: 0, base }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    reader_method!(u8, u8, decode_u8);
    reader_method!(u16, u16, decode_u16);
    reader_method!(i16, i16, decode_i16);
    reader_method!(u24, u32, decode_u24);
    reader_method!(u32, u32, decode_u32);
    reader_method!(i32, i32, decode_i32);
    reader_method!(u64, u64, decode_u64);
    reader_method!(i64, i64, decode_i64);
    reader_method!(fourcc, FourCC, decode_fourcc);
    reader_method!(cstring, NulString, decode_cstring);
    reader_method!(prefixed_u16, Vec<u8>, decode_prefixed_u16);

    /// Time, duration and offset fields: 32 bits in version 0, 64 bits in version 1.
    pub fn versioned_u64(&mut self, field: &'static str, version: u8) -> Result<u64, ErrorKind> {
        match version {
            0 => self.u32(field).map(u64::from),
            1 => self.u64(field),
            v => Err(ErrorKind::InvalidFieldValue {
                field: "version",
                value: v as u64,
            }),
        }
    }

    pub fn versioned_i64(&mut self, field: &'static str, version: u8) -> Result<i64, ErrorKind> {
        match version {
            0 => self.i32(field).map(i64::from),
            1 => self.i64(field),
            v => Err(ErrorKind::InvalidFieldValue {
                field: "version",
                value: v as u64,
            }),
        }
    }

    pub fn fixed16_16(&mut self, field: &'static str) -> Result<Fixed16_16, ErrorKind> {
        self.u32(field).map(Fixed16_16)
    }

    pub fn fixed8_8(&mut self, field: &'static str) -> Result<Fixed8_8, ErrorKind> {
        self.i16(field).map(Fixed8_8)
    }

    pub fn bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], ErrorKind> {
        let b = take(self.buf, self.pos, len, field)?;
        self.pos += len;
        Ok(b)
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ErrorKind> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(field, N)?);
        Ok(out)
    }

    /// Reserved or pre-defined bytes that are written back as zeros.
    pub fn skip(&mut self, field: &'static str, len: usize) -> Result<(), ErrorKind> {
        self.bytes(field, len).map(|_| ())
    }

    /// Everything left in the body, without consuming it.
    pub fn peek_rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Everything left in the body.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    /// Vec capacity for `count` entries of `width` bytes, bounded by what the body can hold.
    pub fn capacity_for(&self, count: u64, width: usize) -> usize {
        let fits = self.remaining() / width.max(1);
        count.min(fits as u64) as usize
    }
}

fn overflow(field: &'static str, value: impl Into<i128>, bits: u8) -> SerializeErrorKind {
    SerializeErrorKind::FieldOverflow {
        field,
        value: value.into(),
        bits,
    }
}

fn unsupported_version(version: u8) -> SerializeErrorKind {
    SerializeErrorKind::InvalidFieldValue {
        field: "version",
        value: version as u64,
    }
}

/// Checks that `value` fits in `bits` bits.
pub fn check_bits(field: &'static str, value: u64, bits: u8) -> Result<u64, SerializeErrorKind> {
    if bits < 64 && value >> bits != 0 {
        return Err(overflow(field, value, bits));
    }
    Ok(value)
}

/// Body writer mirroring [`FieldReader`].
///
/// Width checks happen before any byte of the field is emitted.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn i16(&mut self, v: i16) {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn u24(&mut self, field: &'static str, v: u32) -> EncodeResult {
        check_bits(field, v as u64, 24)?;
        let mut b = [0u8; 3];
        BigEndian::write_u24(&mut b, v);
        self.buf.extend_from_slice(&b);
        Ok(())
    }

    pub fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        BigEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn i64(&mut self, v: i64) {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    /// Inverse of [`FieldReader::versioned_u64`]; a version-0 value above `u32::MAX` overflows.
    pub fn versioned_u64(&mut self, field: &'static str, version: u8, v: u64) -> EncodeResult {
        match version {
            0 => self.u32(u32::try_from(v).map_err(|_| overflow(field, v, 32))?),
            1 => self.u64(v),
            other => return Err(unsupported_version(other)),
        }
        Ok(())
    }

    pub fn versioned_i64(&mut self, field: &'static str, version: u8, v: i64) -> EncodeResult {
        match version {
            0 => self.i32(i32::try_from(v).map_err(|_| overflow(field, v, 32))?),
            1 => self.i64(v),
            other => return Err(unsupported_version(other)),
        }
        Ok(())
    }

    /// Array length written as a u32 prefix.
    pub fn count_u32(&mut self, field: &'static str, n: usize) -> EncodeResult {
        let n = u32::try_from(n).map_err(|_| overflow(field, n as u64, 32))?;
        self.u32(n);
        Ok(())
    }

    pub fn count_u16(&mut self, field: &'static str, n: usize) -> EncodeResult {
        let n = u16::try_from(n).map_err(|_| overflow(field, n as u64, 16))?;
        self.u16(n);
        Ok(())
    }

    pub fn fourcc(&mut self, v: FourCC) {
        self.buf.extend_from_slice(&v.0);
    }

    pub fn fixed16_16(&mut self, v: Fixed16_16) {
        self.u32(v.0);
    }

    pub fn fixed8_8(&mut self, v: Fixed8_8) {
        self.i16(v.0);
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn zeros(&mut self, len: usize) {
        self.buf.resize(self.buf.len() + len, 0);
    }

    /// An interior NUL would end the string early on the next read.
    pub fn cstring(&mut self, field: &'static str, v: &NulString) -> EncodeResult {
        if v.bytes.contains(&0) {
            return Err(SerializeErrorKind::InvalidFieldValue { field, value: 0 });
        }
        self.buf.extend_from_slice(&v.bytes);
        if v.terminated {
            self.buf.push(0);
        }
        Ok(())
    }

    /// Count prefix for the short tables of the HDS boxes.
    pub fn count_u8(&mut self, field: &'static str, n: usize) -> EncodeResult {
        let n = u8::try_from(n).map_err(|_| overflow(field, n as u64, 8))?;
        self.u8(n);
        Ok(())
    }

    pub fn prefixed_u16(&mut self, field: &'static str, v: &[u8]) -> EncodeResult {
        self.count_u16(field, v.len())?;
        self.bytes(v);
        Ok(())
    }
}

/// String field stored as the bytes on the wire.
///
/// Names are not always UTF-8 and some QuickTime writers leave off the
/// terminator, so both are kept to write the field back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NulString {
    pub bytes: Vec<u8>,
    pub terminated: bool,
}

impl NulString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            terminated: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl Default for NulString {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<&str> for NulString {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for NulString {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl PartialEq<str> for NulString {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for NulString {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl fmt::Display for NulString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Unsigned 16.16 fixed-point value, kept as its raw bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed16_16(pub u32);

impl Fixed16_16 {
    pub const ONE: Self = Self(0x0001_0000);

    pub fn from_f64(v: f64) -> Self {
        Self((v * 65536.0).round() as u32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 65536.0
    }

    pub fn integer_part(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl fmt::Display for Fixed16_16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// Signed 8.8 fixed-point value (volume, balance).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed8_8(pub i16);

impl Fixed8_8 {
    pub const ONE: Self = Self(0x0100);

    pub fn from_f64(v: f64) -> Self {
        Self((v * 256.0).round() as i16)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }
}

impl fmt::Display for Fixed8_8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// ISO-639-2/T language code packed as three 5-bit letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Language(pub [u8; 3]);

impl Language {
    pub const UNDETERMINED: Self = Self(*b"und");

    pub fn from_packed(code: u16) -> Self {
        let letter = |shift: u16| ((code >> shift) & 0x1F) as u8 + 0x60;
        Self([letter(10), letter(5), letter(0)])
    }

    pub fn to_packed(self) -> Result<u16, SerializeErrorKind> {
        let mut code = 0u16;
        for c in self.0 {
            let bits = c
                .checked_sub(0x60)
                .filter(|b| *b <= 0x1F)
                .ok_or_else(|| overflow("language", c, 5))?;
            code = (code << 5) | bits as u16;
        }
        Ok(code)
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::UNDETERMINED
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}

/// Per-sample dependency flags shared by `trex`, `tfhd` and `trun`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleFlags {
    /// Top four bits, zero in conforming files.
    pub reserved: u8,
    pub is_leading: u8,
    pub sample_depends_on: u8,
    pub sample_is_depended_on: u8,
    pub sample_has_redundancy: u8,
    pub sample_padding_value: u8,
    pub sample_is_non_sync_sample: bool,
    pub sample_degradation_priority: u16,
}

impl SampleFlags {
    pub fn from_u32(v: u32) -> Self {
        Self {
            reserved: (v >> 28) as u8,
            is_leading: ((v >> 26) & 0x3) as u8,
            sample_depends_on: ((v >> 24) & 0x3) as u8,
            sample_is_depended_on: ((v >> 22) & 0x3) as u8,
            sample_has_redundancy: ((v >> 20) & 0x3) as u8,
            sample_padding_value: ((v >> 17) & 0x7) as u8,
            sample_is_non_sync_sample: (v >> 16) & 0x1 != 0,
            sample_degradation_priority: (v & 0xFFFF) as u16,
        }
    }

    pub fn to_u32(self) -> Result<u32, SerializeErrorKind> {
        let mut v = check_bits("reserved", self.reserved as u64, 4)? << 28;
        v |= check_bits("is_leading", self.is_leading as u64, 2)? << 26;
        v |= check_bits("sample_depends_on", self.sample_depends_on as u64, 2)? << 24;
        v |= check_bits("sample_is_depended_on", self.sample_is_depended_on as u64, 2)? << 22;
        v |= check_bits("sample_has_redundancy", self.sample_has_redundancy as u64, 2)? << 20;
        v |= check_bits("sample_padding_value", self.sample_padding_value as u64, 3)? << 17;
        v |= (self.sample_is_non_sync_sample as u64) << 16;
        v |= self.sample_degradation_priority as u64;
        Ok(v as u32)
    }
}
