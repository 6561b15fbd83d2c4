//! Typed bodies of the well-known box types.
//!
//! Each struct holds the fields that follow the header (and, for full boxes,
//! the version/flags word, which lives on [`StructuredBox`](crate::boxes::StructuredBox)).
//! Entry counts that prefix arrays or child boxes are derived when encoding.
//! Whole reserved and pre-defined bytes are skipped when reading and written
//! as zeros; reserved bits that share a byte with a field are kept.

use crate::boxes::FourCC;
use crate::error::{ErrorKind, SerializeErrorKind};
use crate::fields::{check_bits, FieldReader, FieldWriter, Fixed16_16, Fixed8_8, Language, NulString, SampleFlags};
use crate::header::{read_header, write_header};
use serde::{Deserialize, Serialize};

type DecodeResult<T> = Result<T, ErrorKind>;
type EncodeResult = Result<(), SerializeErrorKind>;

/// Values from the enclosing box that an encoder may need.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeContext {
    pub version: u8,
    pub flags: u32,
    pub child_count: usize,
}

/// Codec for one structured body layout.
pub trait BoxBody: Sized {
    /// Body starts with `u8 version` and `u24 flags`.
    const FULL_BOX: bool;
    /// Child boxes follow the fixed fields.
    const HAS_CHILDREN: bool = false;

    fn decode(r: &mut FieldReader<'_>, version: u8, flags: u32) -> DecodeResult<Self>;
    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult;
}

/// Typed view into [`BoxFields`], used by [`Mp4Box::body`](crate::boxes::Mp4Box::body).
pub trait BoxVariant: Sized {
    fn from_fields(fields: &BoxFields) -> Option<&Self>;
    fn from_fields_mut(fields: &mut BoxFields) -> Option<&mut Self>;
}

macro_rules! box_fields {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Decoded body of a structured box.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum BoxFields {
            $($variant($ty)),*
        }

        impl BoxFields {
            pub fn is_full_box(&self) -> bool {
                match self {
                    $(BoxFields::$variant(_) => <$ty as BoxBody>::FULL_BOX),*
                }
            }

            pub fn has_children(&self) -> bool {
                match self {
                    $(BoxFields::$variant(_) => <$ty as BoxBody>::HAS_CHILDREN),*
                }
            }

            pub fn variant_name(&self) -> &'static str {
                match self {
                    $(BoxFields::$variant(_) => stringify!($variant)),*
                }
            }

            pub fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
                match self {
                    $(BoxFields::$variant(b) => b.encode(w, ctx)),*
                }
            }
        }

        $(
            impl From<$ty> for BoxFields {
                fn from(v: $ty) -> Self {
                    BoxFields::$variant(v)
                }
            }

            impl BoxVariant for $ty {
                fn from_fields(fields: &BoxFields) -> Option<&Self> {
                    match fields {
                        BoxFields::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn from_fields_mut(fields: &mut BoxFields) -> Option<&mut Self> {
                    match fields {
                        BoxFields::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

box_fields! {
    FileType(FileTypeBox),
    MovieHeader(MovieHeaderBox),
    TrackHeader(TrackHeaderBox),
    MediaHeader(MediaHeaderBox),
    HandlerReference(HandlerReferenceBox),
    VideoMediaHeader(VideoMediaHeaderBox),
    SoundMediaHeader(SoundMediaHeaderBox),
    DataReference(DataReferenceBox),
    DataEntryUrl(DataEntryUrlBox),
    DataEntryUrn(DataEntryUrnBox),
    SampleDescription(SampleDescriptionBox),
    VisualSampleEntry(VisualSampleEntry),
    AudioSampleEntry(AudioSampleEntry),
    AvcConfiguration(AvcConfigurationBox),
    HevcConfiguration(HevcConfigurationBox),
    PixelAspectRatio(PixelAspectRatioBox),
    BitRate(BitRateBox),
    Ac3Specific(Ac3SpecificBox),
    Uuid(UuidBox),
    TimeToSample(TimeToSampleBox),
    CompositionOffset(CompositionOffsetBox),
    SampleToChunk(SampleToChunkBox),
    SampleSize(SampleSizeBox),
    CompactSampleSize(CompactSampleSizeBox),
    ChunkOffset(ChunkOffsetBox),
    ChunkLargeOffset(ChunkLargeOffsetBox),
    SyncSample(SyncSampleBox),
    EditList(EditListBox),
    SegmentIndex(SegmentIndexBox),
    MovieFragmentHeader(MovieFragmentHeaderBox),
    TrackFragmentHeader(TrackFragmentHeaderBox),
    TrackFragmentDecodeTime(TrackFragmentDecodeTimeBox),
    TrackRun(TrackRunBox),
    MovieExtendsHeader(MovieExtendsHeaderBox),
    TrackExtends(TrackExtendsBox),
    SampleToGroup(SampleToGroupBox),
    BootstrapInfo(BootstrapInfoBox),
    SegmentRunTable(SegmentRunTableBox),
    FragmentRunTable(FragmentRunTableBox),
}

/// Reads a u32 entry count followed by that many entries of `width` bytes each.
fn read_entries<'a, T>(
    r: &mut FieldReader<'a>,
    width: usize,
    mut read: impl FnMut(&mut FieldReader<'a>) -> DecodeResult<T>,
) -> DecodeResult<Vec<T>> {
    let count = r.u32("entry_count")?;
    let mut out = Vec::with_capacity(r.capacity_for(count as u64, width));
    for _ in 0..count {
        out.push(read(r)?);
    }
    Ok(out)
}

fn write_entries<T>(
    w: &mut FieldWriter,
    entries: &[T],
    mut write: impl FnMut(&mut FieldWriter, &T) -> EncodeResult,
) -> EncodeResult {
    w.count_u32("entry_count", entries.len())?;
    for e in entries {
        write(w, e)?;
    }
    Ok(())
}

fn require<T: Copy>(field: &'static str, v: Option<T>) -> Result<T, SerializeErrorKind> {
    v.ok_or(SerializeErrorKind::MissingField { field })
}

pub const UNITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

fn read_matrix(r: &mut FieldReader<'_>) -> DecodeResult<[i32; 9]> {
    let mut m = [0i32; 9];
    for v in m.iter_mut() {
        *v = r.i32("matrix")?;
    }
    Ok(m)
}

fn write_matrix(w: &mut FieldWriter, m: &[i32; 9]) {
    for v in m {
        w.i32(*v);
    }
}

// ---------- file level ----------

/// `ftyp` and `styp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl BoxBody for FileTypeBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let major_brand = r.fourcc("major_brand")?;
        let minor_version = r.u32("minor_version")?;
        let mut compatible_brands = Vec::with_capacity(r.remaining() / 4);
        while r.remaining() >= 4 {
            compatible_brands.push(r.fourcc("compatible_brands")?);
        }
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.fourcc(self.major_brand);
        w.u32(self.minor_version);
        for b in &self.compatible_brands {
            w.fourcc(*b);
        }
        Ok(())
    }
}

/// `uuid`: extended type followed by opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidBox {
    pub extended_type: [u8; 16],
    pub data: Vec<u8>,
}

impl BoxBody for UuidBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            extended_type: r.array("extended_type")?,
            data: r.rest().to_vec(),
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.bytes(&self.extended_type);
        w.bytes(&self.data);
        Ok(())
    }
}

// ---------- movie / track headers ----------

/// `mvhd`. Times and duration are 64-bit in version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieHeaderBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: Fixed16_16,
    pub volume: Fixed8_8,
    pub matrix: [i32; 9],
    pub next_track_id: u32,
}

impl MovieHeaderBox {
    pub fn new(timescale: u32, duration: u64) -> Self {
        Self {
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            rate: Fixed16_16::ONE,
            volume: Fixed8_8::ONE,
            matrix: UNITY_MATRIX,
            next_track_id: 0xFFFF_FFFF,
        }
    }
}

impl BoxBody for MovieHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let creation_time = r.versioned_u64("creation_time", version)?;
        let modification_time = r.versioned_u64("modification_time", version)?;
        let timescale = r.u32("timescale")?;
        let duration = r.versioned_u64("duration", version)?;
        let rate = r.fixed16_16("rate")?;
        let volume = r.fixed8_8("volume")?;
        r.skip("reserved", 10)?;
        let matrix = read_matrix(r)?;
        r.skip("pre_defined", 24)?;
        let next_track_id = r.u32("next_track_id")?;
        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            matrix,
            next_track_id,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.versioned_u64("creation_time", ctx.version, self.creation_time)?;
        w.versioned_u64("modification_time", ctx.version, self.modification_time)?;
        w.u32(self.timescale);
        w.versioned_u64("duration", ctx.version, self.duration)?;
        w.fixed16_16(self.rate);
        w.fixed8_8(self.volume);
        w.zeros(10);
        write_matrix(w, &self.matrix);
        w.zeros(24);
        w.u32(self.next_track_id);
        Ok(())
    }
}

/// `tkhd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackHeaderBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: Fixed8_8,
    pub matrix: [i32; 9],
    pub width: Fixed16_16,
    pub height: Fixed16_16,
}

impl TrackHeaderBox {
    pub const ENABLED: u32 = 0x1;
    pub const IN_MOVIE: u32 = 0x2;
    pub const IN_PREVIEW: u32 = 0x4;
    pub const DEFAULT_FLAGS: u32 = Self::ENABLED;

    pub fn new(track_id: u32, duration: u64, width: Fixed16_16, height: Fixed16_16) -> Self {
        Self {
            creation_time: 0,
            modification_time: 0,
            track_id,
            duration,
            layer: 0,
            alternate_group: 0,
            volume: Fixed8_8::ONE,
            matrix: UNITY_MATRIX,
            width,
            height,
        }
    }
}

impl BoxBody for TrackHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let creation_time = r.versioned_u64("creation_time", version)?;
        let modification_time = r.versioned_u64("modification_time", version)?;
        let track_id = r.u32("track_id")?;
        r.skip("reserved", 4)?;
        let duration = r.versioned_u64("duration", version)?;
        r.skip("reserved", 8)?;
        let layer = r.i16("layer")?;
        let alternate_group = r.i16("alternate_group")?;
        let volume = r.fixed8_8("volume")?;
        r.skip("reserved", 2)?;
        let matrix = read_matrix(r)?;
        let width = r.fixed16_16("width")?;
        let height = r.fixed16_16("height")?;
        Ok(Self {
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.versioned_u64("creation_time", ctx.version, self.creation_time)?;
        w.versioned_u64("modification_time", ctx.version, self.modification_time)?;
        w.u32(self.track_id);
        w.zeros(4);
        w.versioned_u64("duration", ctx.version, self.duration)?;
        w.zeros(8);
        w.i16(self.layer);
        w.i16(self.alternate_group);
        w.fixed8_8(self.volume);
        w.zeros(2);
        write_matrix(w, &self.matrix);
        w.fixed16_16(self.width);
        w.fixed16_16(self.height);
        Ok(())
    }
}

/// `mdhd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHeaderBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: Language,
    /// Bit above the packed language, zero in conforming files.
    pub pad: bool,
}

impl BoxBody for MediaHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let creation_time = r.versioned_u64("creation_time", version)?;
        let modification_time = r.versioned_u64("modification_time", version)?;
        let timescale = r.u32("timescale")?;
        let duration = r.versioned_u64("duration", version)?;
        let packed = r.u16("language")?;
        r.skip("pre_defined", 2)?;
        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            language: Language::from_packed(packed & 0x7FFF),
            pad: packed >> 15 != 0,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.versioned_u64("creation_time", ctx.version, self.creation_time)?;
        w.versioned_u64("modification_time", ctx.version, self.modification_time)?;
        w.u32(self.timescale);
        w.versioned_u64("duration", ctx.version, self.duration)?;
        w.u16((self.pad as u16) << 15 | self.language.to_packed()?);
        w.zeros(2);
        Ok(())
    }
}

/// `hdlr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerReferenceBox {
    pub handler_type: FourCC,
    pub name: NulString,
}

impl BoxBody for HandlerReferenceBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.skip("pre_defined", 4)?;
        let handler_type = r.fourcc("handler_type")?;
        r.skip("reserved", 12)?;
        let name = r.cstring("name")?;
        Ok(Self { handler_type, name })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.zeros(4);
        w.fourcc(self.handler_type);
        w.zeros(12);
        w.cstring("name", &self.name)
    }
}

/// `vmhd`; flags are normally 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMediaHeaderBox {
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl BoxBody for VideoMediaHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let graphics_mode = r.u16("graphics_mode")?;
        let opcolor = [r.u16("opcolor")?, r.u16("opcolor")?, r.u16("opcolor")?];
        Ok(Self {
            graphics_mode,
            opcolor,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u16(self.graphics_mode);
        for c in self.opcolor {
            w.u16(c);
        }
        Ok(())
    }
}

/// `smhd`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundMediaHeaderBox {
    pub balance: Fixed8_8,
}

impl BoxBody for SoundMediaHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let balance = r.fixed8_8("balance")?;
        r.skip("reserved", 2)?;
        Ok(Self { balance })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.fixed8_8(self.balance);
        w.zeros(2);
        Ok(())
    }
}

// ---------- data references ----------

/// `dref`: entry count, then `url `/`urn ` child boxes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataReferenceBox {}

impl BoxBody for DataReferenceBox {
    const FULL_BOX: bool = true;
    const HAS_CHILDREN: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.u32("entry_count")?;
        Ok(Self {})
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.count_u32("entry_count", ctx.child_count)
    }
}

/// `url `. With flag 1 set the media is in the same file and there is no location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntryUrlBox {
    pub location: NulString,
}

impl DataEntryUrlBox {
    pub const SELF_CONTAINED: u32 = 0x1;
}

impl BoxBody for DataEntryUrlBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, flags: u32) -> DecodeResult<Self> {
        let location = if flags & Self::SELF_CONTAINED != 0 {
            NulString::default()
        } else {
            r.cstring("location")?
        };
        Ok(Self { location })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        if ctx.flags & Self::SELF_CONTAINED == 0 {
            w.cstring("location", &self.location)?;
        }
        Ok(())
    }
}

/// `urn `.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntryUrnBox {
    pub name: NulString,
    pub location: Option<NulString>,
}

impl BoxBody for DataEntryUrnBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let name = r.cstring("name")?;
        let location = if r.is_empty() {
            None
        } else {
            Some(r.cstring("location")?)
        };
        Ok(Self { name, location })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        if let Some(loc) = &self.location {
            // an unterminated name would swallow the location
            if !self.name.terminated {
                return Err(SerializeErrorKind::InvalidFieldValue {
                    field: "name",
                    value: self.name.bytes.len() as u64,
                });
            }
            w.cstring("name", &self.name)?;
            w.cstring("location", loc)?;
            return Ok(());
        }
        w.cstring("name", &self.name)
    }
}

// ---------- sample description ----------

/// `stsd`: entry count, then one sample entry box per description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDescriptionBox {}

impl BoxBody for SampleDescriptionBox {
    const FULL_BOX: bool = true;
    const HAS_CHILDREN: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.u32("entry_count")?;
        Ok(Self {})
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.count_u32("entry_count", ctx.child_count)
    }
}

/// `avc1`, `avc3`, `hvc1`, `hev1`, `encv`. Codec configuration boxes follow as children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: Fixed16_16,
    pub vertical_resolution: Fixed16_16,
    pub frame_count: u16,
    pub compressor_name: CompressorName,
    pub depth: u16,
}

/// The 32-byte `compressorname` field: a length byte, up to 31 name bytes,
/// then padding. Kept verbatim since writers disagree on the padding and
/// on the encoding of the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressorName(pub [u8; 32]);

impl CompressorName {
    pub fn new(name: &[u8]) -> Result<Self, SerializeErrorKind> {
        if name.len() > 31 {
            return Err(SerializeErrorKind::FieldOverflow {
                field: "compressorname",
                value: name.len() as i128,
                bits: 5,
            });
        }
        let mut raw = [0u8; 32];
        raw[0] = name.len() as u8;
        raw[1..1 + name.len()].copy_from_slice(name);
        Ok(Self(raw))
    }

    /// Name bytes selected by the length byte, clamped to the field.
    pub fn name(&self) -> &[u8] {
        let len = (self.0[0] as usize).min(31);
        &self.0[1..1 + len]
    }

    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.name())
    }
}

impl Default for CompressorName {
    fn default() -> Self {
        Self([0; 32])
    }
}

impl VisualSampleEntry {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            data_reference_index: 1,
            width,
            height,
            horizontal_resolution: Fixed16_16(0x0048_0000),
            vertical_resolution: Fixed16_16(0x0048_0000),
            frame_count: 1,
            compressor_name: CompressorName::default(),
            depth: 0x0018,
        }
    }
}

impl BoxBody for VisualSampleEntry {
    const FULL_BOX: bool = false;
    const HAS_CHILDREN: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.skip("reserved", 6)?;
        let data_reference_index = r.u16("data_reference_index")?;
        r.skip("pre_defined", 16)?;
        let width = r.u16("width")?;
        let height = r.u16("height")?;
        let horizontal_resolution = r.fixed16_16("horizresolution")?;
        let vertical_resolution = r.fixed16_16("vertresolution")?;
        r.skip("reserved", 4)?;
        let frame_count = r.u16("frame_count")?;
        let compressor_name = CompressorName(r.array("compressorname")?);
        let depth = r.u16("depth")?;
        r.skip("pre_defined", 2)?;
        Ok(Self {
            data_reference_index,
            width,
            height,
            horizontal_resolution,
            vertical_resolution,
            frame_count,
            compressor_name,
            depth,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.zeros(6);
        w.u16(self.data_reference_index);
        w.zeros(16);
        w.u16(self.width);
        w.u16(self.height);
        w.fixed16_16(self.horizontal_resolution);
        w.fixed16_16(self.vertical_resolution);
        w.zeros(4);
        w.u16(self.frame_count);
        w.bytes(&self.compressor_name.0);
        w.u16(self.depth);
        w.i16(-1);
        Ok(())
    }
}

/// `mp4a`, `enca`, `ac-3`, `ec-3`.
///
/// QuickTime sound descriptions (version 1 and 2) carry extra bytes after the
/// common fields; they are kept verbatim in `qt_extension`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSampleEntry {
    pub data_reference_index: u16,
    pub version: u16,
    pub revision: u16,
    pub vendor: u32,
    pub channel_count: u16,
    pub sample_size: u16,
    pub compression_id: u16,
    pub packet_size: u16,
    pub sample_rate: Fixed16_16,
    pub qt_extension: Vec<u8>,
}

impl AudioSampleEntry {
    pub fn new(channel_count: u16, sample_size: u16, sample_rate: u16) -> Self {
        Self {
            data_reference_index: 1,
            version: 0,
            revision: 0,
            vendor: 0,
            channel_count,
            sample_size,
            compression_id: 0,
            packet_size: 0,
            sample_rate: Fixed16_16((sample_rate as u32) << 16),
            qt_extension: Vec::new(),
        }
    }

    fn extension_len(version: u16) -> usize {
        match version {
            1 => 16,
            2 => 36,
            _ => 0,
        }
    }
}

impl BoxBody for AudioSampleEntry {
    const FULL_BOX: bool = false;
    const HAS_CHILDREN: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.skip("reserved", 6)?;
        let data_reference_index = r.u16("data_reference_index")?;
        let version = r.u16("version")?;
        let revision = r.u16("revision")?;
        let vendor = r.u32("vendor")?;
        let channel_count = r.u16("channel_count")?;
        let sample_size = r.u16("sample_size")?;
        let compression_id = r.u16("compression_id")?;
        let packet_size = r.u16("packet_size")?;
        let sample_rate = r.fixed16_16("sample_rate")?;
        let qt_extension = r
            .bytes("qt_extension", Self::extension_len(version))?
            .to_vec();
        Ok(Self {
            data_reference_index,
            version,
            revision,
            vendor,
            channel_count,
            sample_size,
            compression_id,
            packet_size,
            sample_rate,
            qt_extension,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        if self.qt_extension.len() != Self::extension_len(self.version) {
            return Err(SerializeErrorKind::InvalidFieldValue {
                field: "qt_extension",
                value: self.qt_extension.len() as u64,
            });
        }
        w.zeros(6);
        w.u16(self.data_reference_index);
        w.u16(self.version);
        w.u16(self.revision);
        w.u32(self.vendor);
        w.u16(self.channel_count);
        w.u16(self.sample_size);
        w.u16(self.compression_id);
        w.u16(self.packet_size);
        w.fixed16_16(self.sample_rate);
        w.bytes(&self.qt_extension);
        Ok(())
    }
}

/// `avcC` decoder configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvcConfigurationBox {
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// NAL unit length field size minus one (0..=3).
    pub length_size_minus_one: u8,
    /// Six bits above `length_size_minus_one`, normally all ones.
    pub length_size_reserved: u8,
    /// Three bits above the SPS count, normally all ones.
    pub sps_count_reserved: u8,
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    pub picture_parameter_sets: Vec<Vec<u8>>,
    /// High-profile chroma/bit-depth fields and anything after them.
    pub extension: Vec<u8>,
}

impl BoxBody for AvcConfigurationBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let configuration_version = r.u8("configuration_version")?;
        let profile_indication = r.u8("profile_indication")?;
        let profile_compatibility = r.u8("profile_compatibility")?;
        let level_indication = r.u8("level_indication")?;
        let length_size = r.u8("length_size_minus_one")?;

        let sps_byte = r.u8("num_sequence_parameter_sets")?;
        let sps_count = sps_byte & 0x1F;
        let mut sequence_parameter_sets = Vec::with_capacity(sps_count as usize);
        for _ in 0..sps_count {
            sequence_parameter_sets.push(r.prefixed_u16("sequence_parameter_set")?);
        }

        let pps_count = r.u8("num_picture_parameter_sets")?;
        let mut picture_parameter_sets = Vec::with_capacity(pps_count as usize);
        for _ in 0..pps_count {
            picture_parameter_sets.push(r.prefixed_u16("picture_parameter_set")?);
        }

        Ok(Self {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one: length_size & 0x03,
            length_size_reserved: length_size >> 2,
            sps_count_reserved: sps_byte >> 5,
            sequence_parameter_sets,
            picture_parameter_sets,
            extension: r.rest().to_vec(),
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        let lsm1 = check_bits("length_size_minus_one", self.length_size_minus_one as u64, 2)?;
        let lsm1_reserved = check_bits("length_size_reserved", self.length_size_reserved as u64, 6)?;
        let sps_reserved = check_bits("sps_count_reserved", self.sps_count_reserved as u64, 3)?;
        let sps_count = check_bits(
            "num_sequence_parameter_sets",
            self.sequence_parameter_sets.len() as u64,
            5,
        )?;
        let pps_count = check_bits(
            "num_picture_parameter_sets",
            self.picture_parameter_sets.len() as u64,
            8,
        )?;

        w.u8(self.configuration_version);
        w.u8(self.profile_indication);
        w.u8(self.profile_compatibility);
        w.u8(self.level_indication);
        w.u8((lsm1_reserved << 2 | lsm1) as u8);
        w.u8((sps_reserved << 5 | sps_count) as u8);
        for sps in &self.sequence_parameter_sets {
            w.prefixed_u16("sequence_parameter_set", sps)?;
        }
        w.u8(pps_count as u8);
        for pps in &self.picture_parameter_sets {
            w.prefixed_u16("picture_parameter_set", pps)?;
        }
        w.bytes(&self.extension);
        Ok(())
    }
}

/// One `hvcC` parameter set array (VPS, SPS, PPS or SEI NAL units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HevcNalArray {
    pub array_completeness: bool,
    pub reserved: bool,
    pub nal_unit_type: u8,
    pub nal_units: Vec<Vec<u8>>,
}

/// `hvcC` decoder configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HevcConfigurationBox {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub length_size_minus_one: u8,
    /// Reserved high bits of the five fields from `min_spatial_segmentation_idc`
    /// to `bit_depth_chroma_minus8`, in order. Normally all ones.
    pub reserved_bits: [u8; 5],
    pub arrays: Vec<HevcNalArray>,
}

impl HevcConfigurationBox {
    const RESERVED_WIDTHS: [u8; 5] = [4, 6, 6, 5, 5];
}

impl BoxBody for HevcConfigurationBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let configuration_version = r.u8("configuration_version")?;
        let profile = r.u8("general_profile_idc")?;
        let general_profile_compatibility_flags = r.u32("general_profile_compatibility_flags")?;
        let general_constraint_indicator_flags = r.array("general_constraint_indicator_flags")?;
        let general_level_idc = r.u8("general_level_idc")?;
        let segmentation = r.u16("min_spatial_segmentation_idc")?;
        let parallelism = r.u8("parallelism_type")?;
        let chroma = r.u8("chroma_format_idc")?;
        let luma_depth = r.u8("bit_depth_luma_minus8")?;
        let chroma_depth = r.u8("bit_depth_chroma_minus8")?;
        let avg_frame_rate = r.u16("avg_frame_rate")?;
        let nalu = r.u8("length_size_minus_one")?;

        let array_count = r.u8("num_of_arrays")?;
        let mut arrays = Vec::with_capacity(r.capacity_for(array_count as u64, 3));
        for _ in 0..array_count {
            let head = r.u8("nal_unit_type")?;
            let unit_count = r.u16("num_nalus")?;
            let mut nal_units = Vec::with_capacity(r.capacity_for(unit_count as u64, 2));
            for _ in 0..unit_count {
                nal_units.push(r.prefixed_u16("nal_unit")?);
            }
            arrays.push(HevcNalArray {
                array_completeness: head >> 7 != 0,
                reserved: (head >> 6) & 0x1 != 0,
                nal_unit_type: head & 0x3F,
                nal_units,
            });
        }

        Ok(Self {
            configuration_version,
            general_profile_space: profile >> 6,
            general_tier_flag: (profile >> 5) & 0x1 != 0,
            general_profile_idc: profile & 0x1F,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
            min_spatial_segmentation_idc: segmentation & 0x0FFF,
            parallelism_type: parallelism & 0x03,
            chroma_format_idc: chroma & 0x03,
            bit_depth_luma_minus8: luma_depth & 0x07,
            bit_depth_chroma_minus8: chroma_depth & 0x07,
            avg_frame_rate,
            constant_frame_rate: nalu >> 6,
            num_temporal_layers: (nalu >> 3) & 0x07,
            temporal_id_nested: (nalu >> 2) & 0x1 != 0,
            length_size_minus_one: nalu & 0x03,
            reserved_bits: [
                (segmentation >> 12) as u8,
                parallelism >> 2,
                chroma >> 2,
                luma_depth >> 3,
                chroma_depth >> 3,
            ],
            arrays,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        let mut reserved = [0u64; 5];
        for (i, (bits, width)) in self.reserved_bits.iter().zip(Self::RESERVED_WIDTHS).enumerate() {
            reserved[i] = check_bits("reserved", *bits as u64, width)?;
        }
        let profile = check_bits("general_profile_space", self.general_profile_space as u64, 2)? << 6
            | (self.general_tier_flag as u64) << 5
            | check_bits("general_profile_idc", self.general_profile_idc as u64, 5)?;
        let segmentation = check_bits(
            "min_spatial_segmentation_idc",
            self.min_spatial_segmentation_idc as u64,
            12,
        )?;
        let parallelism = check_bits("parallelism_type", self.parallelism_type as u64, 2)?;
        let chroma = check_bits("chroma_format_idc", self.chroma_format_idc as u64, 2)?;
        let luma_depth = check_bits("bit_depth_luma_minus8", self.bit_depth_luma_minus8 as u64, 3)?;
        let chroma_depth = check_bits("bit_depth_chroma_minus8", self.bit_depth_chroma_minus8 as u64, 3)?;
        let nalu = check_bits("constant_frame_rate", self.constant_frame_rate as u64, 2)? << 6
            | check_bits("num_temporal_layers", self.num_temporal_layers as u64, 3)? << 3
            | (self.temporal_id_nested as u64) << 2
            | check_bits("length_size_minus_one", self.length_size_minus_one as u64, 2)?;
        let array_count = check_bits("num_of_arrays", self.arrays.len() as u64, 8)?;

        w.u8(self.configuration_version);
        w.u8(profile as u8);
        w.u32(self.general_profile_compatibility_flags);
        w.bytes(&self.general_constraint_indicator_flags);
        w.u8(self.general_level_idc);
        w.u16((reserved[0] << 12 | segmentation) as u16);
        w.u8((reserved[1] << 2 | parallelism) as u8);
        w.u8((reserved[2] << 2 | chroma) as u8);
        w.u8((reserved[3] << 3 | luma_depth) as u8);
        w.u8((reserved[4] << 3 | chroma_depth) as u8);
        w.u16(self.avg_frame_rate);
        w.u8(nalu as u8);
        w.u8(array_count as u8);
        for a in &self.arrays {
            let unit_type = check_bits("nal_unit_type", a.nal_unit_type as u64, 6)?;
            w.u8(((a.array_completeness as u64) << 7 | (a.reserved as u64) << 6 | unit_type) as u8);
            w.count_u16("num_nalus", a.nal_units.len())?;
            for unit in &a.nal_units {
                w.prefixed_u16("nal_unit", unit)?;
            }
        }
        Ok(())
    }
}

/// `pasp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelAspectRatioBox {
    pub h_spacing: u32,
    pub v_spacing: u32,
}

impl BoxBody for PixelAspectRatioBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            h_spacing: r.u32("h_spacing")?,
            v_spacing: r.u32("v_spacing")?,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.h_spacing);
        w.u32(self.v_spacing);
        Ok(())
    }
}

/// `btrt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitRateBox {
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

impl BoxBody for BitRateBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            buffer_size_db: r.u32("buffer_size_db")?,
            max_bitrate: r.u32("max_bitrate")?,
            avg_bitrate: r.u32("avg_bitrate")?,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.buffer_size_db);
        w.u32(self.max_bitrate);
        w.u32(self.avg_bitrate);
        Ok(())
    }
}

/// `dac3`: AC-3 stream parameters packed into 24 bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ac3SpecificBox {
    pub fscod: u8,
    pub bsid: u8,
    pub bsmod: u8,
    pub acmod: u8,
    pub lfeon: bool,
    pub bit_rate_code: u8,
    /// Low five bits, zero in conforming files.
    pub reserved: u8,
}

impl BoxBody for Ac3SpecificBox {
    const FULL_BOX: bool = false;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let v = r.u24("ac3_specific")?;
        let bits = |shift: u32, mask: u32| ((v >> shift) & mask) as u8;
        Ok(Self {
            fscod: bits(22, 0x3),
            bsid: bits(17, 0x1F),
            bsmod: bits(14, 0x7),
            acmod: bits(11, 0x7),
            lfeon: bits(10, 0x1) != 0,
            bit_rate_code: bits(5, 0x1F),
            reserved: bits(0, 0x1F),
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        let mut v = check_bits("fscod", self.fscod as u64, 2)? << 22;
        v |= check_bits("bsid", self.bsid as u64, 5)? << 17;
        v |= check_bits("bsmod", self.bsmod as u64, 3)? << 14;
        v |= check_bits("acmod", self.acmod as u64, 3)? << 11;
        v |= (self.lfeon as u64) << 10;
        v |= check_bits("bit_rate_code", self.bit_rate_code as u64, 5)? << 5;
        v |= check_bits("reserved", self.reserved as u64, 5)?;
        w.u24("ac3_specific", v as u32)
    }
}

// ---------- sample tables ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// `stts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeToSampleBox {
    pub entries: Vec<TimeToSampleEntry>,
}

impl BoxBody for TimeToSampleBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let entries = read_entries(r, 8, |r| {
            Ok(TimeToSampleEntry {
                sample_count: r.u32("sample_count")?,
                sample_delta: r.u32("sample_delta")?,
            })
        })?;
        Ok(Self { entries })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.sample_count);
            w.u32(e.sample_delta);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionOffsetEntry {
    pub sample_count: u32,
    pub sample_offset: i64,
}

/// `ctts`. Offsets are unsigned in version 0 and signed in version 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionOffsetBox {
    pub entries: Vec<CompositionOffsetEntry>,
}

fn read_composition_offset(r: &mut FieldReader<'_>, version: u8, field: &'static str) -> DecodeResult<i64> {
    match version {
        0 => r.u32(field).map(i64::from),
        1 => r.i32(field).map(i64::from),
        v => Err(ErrorKind::InvalidFieldValue {
            field: "version",
            value: v as u64,
        }),
    }
}

fn write_composition_offset(w: &mut FieldWriter, version: u8, field: &'static str, v: i64) -> EncodeResult {
    let overflow = || SerializeErrorKind::FieldOverflow {
        field,
        value: v as i128,
        bits: 32,
    };
    match version {
        0 => w.u32(u32::try_from(v).map_err(|_| overflow())?),
        1 => w.i32(i32::try_from(v).map_err(|_| overflow())?),
        other => {
            return Err(SerializeErrorKind::InvalidFieldValue {
                field: "version",
                value: other as u64,
            });
        }
    }
    Ok(())
}

impl BoxBody for CompositionOffsetBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let entries = read_entries(r, 8, |r| {
            Ok(CompositionOffsetEntry {
                sample_count: r.u32("sample_count")?,
                sample_offset: read_composition_offset(r, version, "sample_offset")?,
            })
        })?;
        Ok(Self { entries })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.sample_count);
            write_composition_offset(w, ctx.version, "sample_offset", e.sample_offset)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// `stsc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleToChunkBox {
    pub entries: Vec<SampleToChunkEntry>,
}

impl BoxBody for SampleToChunkBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let entries = read_entries(r, 12, |r| {
            Ok(SampleToChunkEntry {
                first_chunk: r.u32("first_chunk")?,
                samples_per_chunk: r.u32("samples_per_chunk")?,
                sample_description_index: r.u32("sample_description_index")?,
            })
        })?;
        Ok(Self { entries })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.first_chunk);
            w.u32(e.samples_per_chunk);
            w.u32(e.sample_description_index);
            Ok(())
        })
    }
}

/// `stsz`.
///
/// When `sample_size` is non-zero every sample has that size, `sample_count`
/// is written as-is and `entry_sizes` is ignored. Otherwise the count comes
/// from `entry_sizes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSizeBox {
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl BoxBody for SampleSizeBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let sample_size = r.u32("sample_size")?;
        let sample_count = r.u32("sample_count")?;
        let mut entry_sizes = Vec::new();
        if sample_size == 0 {
            entry_sizes.reserve(r.capacity_for(sample_count as u64, 4));
            for _ in 0..sample_count {
                entry_sizes.push(r.u32("entry_size")?);
            }
        }
        Ok(Self {
            sample_size,
            sample_count,
            entry_sizes,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.sample_size);
        if self.sample_size != 0 {
            w.u32(self.sample_count);
            return Ok(());
        }
        w.count_u32("sample_count", self.entry_sizes.len())?;
        for s in &self.entry_sizes {
            w.u32(*s);
        }
        Ok(())
    }
}

/// `stz2`: sample sizes packed in 4, 8 or 16 bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactSampleSizeBox {
    pub field_size: u8,
    pub entry_sizes: Vec<u16>,
}

impl BoxBody for CompactSampleSizeBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        r.skip("reserved", 3)?;
        let field_size = r.u8("field_size")?;
        let count = r.u32("sample_count")?;
        let mut entry_sizes = Vec::new();
        match field_size {
            4 => {
                let packed = r.bytes("entry_size", (count as usize).div_ceil(2))?;
                entry_sizes.reserve(count as usize);
                for b in packed {
                    entry_sizes.push((b >> 4) as u16);
                    entry_sizes.push((b & 0x0F) as u16);
                }
                entry_sizes.truncate(count as usize);
            }
            8 => {
                let packed = r.bytes("entry_size", count as usize)?;
                entry_sizes.extend(packed.iter().map(|b| *b as u16));
            }
            16 => {
                entry_sizes.reserve(r.capacity_for(count as u64, 2));
                for _ in 0..count {
                    entry_sizes.push(r.u16("entry_size")?);
                }
            }
            other => {
                return Err(ErrorKind::InvalidFieldValue {
                    field: "field_size",
                    value: other as u64,
                });
            }
        }
        Ok(Self {
            field_size,
            entry_sizes,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        if !matches!(self.field_size, 4 | 8 | 16) {
            return Err(SerializeErrorKind::InvalidFieldValue {
                field: "field_size",
                value: self.field_size as u64,
            });
        }
        for s in &self.entry_sizes {
            check_bits("entry_size", *s as u64, self.field_size)?;
        }
        w.zeros(3);
        w.u8(self.field_size);
        w.count_u32("sample_count", self.entry_sizes.len())?;
        match self.field_size {
            4 => {
                for pair in self.entry_sizes.chunks(2) {
                    let lo = pair.get(1).copied().unwrap_or(0);
                    w.u8(((pair[0] << 4) | lo) as u8);
                }
            }
            8 => {
                for s in &self.entry_sizes {
                    w.u8(*s as u8);
                }
            }
            _ => {
                for s in &self.entry_sizes {
                    w.u16(*s);
                }
            }
        }
        Ok(())
    }
}

/// `stco`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOffsetBox {
    pub chunk_offsets: Vec<u32>,
}

impl BoxBody for ChunkOffsetBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let chunk_offsets = read_entries(r, 4, |r| r.u32("chunk_offset"))?;
        Ok(Self { chunk_offsets })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.chunk_offsets, |w, o| {
            w.u32(*o);
            Ok(())
        })
    }
}

/// `co64`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLargeOffsetBox {
    pub chunk_offsets: Vec<u64>,
}

impl BoxBody for ChunkLargeOffsetBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let chunk_offsets = read_entries(r, 8, |r| r.u64("chunk_offset"))?;
        Ok(Self { chunk_offsets })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.chunk_offsets, |w, o| {
            w.u64(*o);
            Ok(())
        })
    }
}

/// `stss`: 1-based numbers of the sync samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSampleBox {
    pub sample_numbers: Vec<u32>,
}

impl BoxBody for SyncSampleBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let sample_numbers = read_entries(r, 4, |r| r.u32("sample_number"))?;
        Ok(Self { sample_numbers })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.sample_numbers, |w, n| {
            w.u32(*n);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditListEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

/// `elst`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditListBox {
    pub entries: Vec<EditListEntry>,
}

impl BoxBody for EditListBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let width = if version == 1 { 20 } else { 12 };
        let entries = read_entries(r, width, |r| {
            Ok(EditListEntry {
                segment_duration: r.versioned_u64("segment_duration", version)?,
                media_time: r.versioned_i64("media_time", version)?,
                media_rate_integer: r.i16("media_rate_integer")?,
                media_rate_fraction: r.i16("media_rate_fraction")?,
            })
        })?;
        Ok(Self { entries })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        write_entries(w, &self.entries, |w, e| {
            w.versioned_u64("segment_duration", ctx.version, e.segment_duration)?;
            w.versioned_i64("media_time", ctx.version, e.media_time)?;
            w.i16(e.media_rate_integer);
            w.i16(e.media_rate_fraction);
            Ok(())
        })
    }
}

// ---------- fragments ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentReference {
    /// True when the reference points at another `sidx`.
    pub reference_type: bool,
    pub referenced_size: u32,
    pub subsegment_duration: u32,
    pub starts_with_sap: bool,
    pub sap_type: u8,
    pub sap_delta_time: u32,
}

/// `sidx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentIndexBox {
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    pub references: Vec<SegmentReference>,
}

impl BoxBody for SegmentIndexBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let reference_id = r.u32("reference_id")?;
        let timescale = r.u32("timescale")?;
        let earliest_presentation_time = r.versioned_u64("earliest_presentation_time", version)?;
        let first_offset = r.versioned_u64("first_offset", version)?;
        r.skip("reserved", 2)?;
        let count = r.u16("reference_count")?;
        let mut references = Vec::with_capacity(r.capacity_for(count as u64, 12));
        for _ in 0..count {
            let a = r.u32("referenced_size")?;
            let subsegment_duration = r.u32("subsegment_duration")?;
            let c = r.u32("sap")?;
            references.push(SegmentReference {
                reference_type: a >> 31 != 0,
                referenced_size: a & 0x7FFF_FFFF,
                subsegment_duration,
                starts_with_sap: c >> 31 != 0,
                sap_type: ((c >> 28) & 0x7) as u8,
                sap_delta_time: c & 0x0FFF_FFFF,
            });
        }
        Ok(Self {
            reference_id,
            timescale,
            earliest_presentation_time,
            first_offset,
            references,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.reference_id);
        w.u32(self.timescale);
        w.versioned_u64("earliest_presentation_time", ctx.version, self.earliest_presentation_time)?;
        w.versioned_u64("first_offset", ctx.version, self.first_offset)?;
        w.zeros(2);
        w.count_u16("reference_count", self.references.len())?;
        for rf in &self.references {
            let size = check_bits("referenced_size", rf.referenced_size as u64, 31)?;
            let sap_type = check_bits("sap_type", rf.sap_type as u64, 3)?;
            let delta = check_bits("sap_delta_time", rf.sap_delta_time as u64, 28)?;
            w.u32(((rf.reference_type as u64) << 31 | size) as u32);
            w.u32(rf.subsegment_duration);
            w.u32(((rf.starts_with_sap as u64) << 31 | sap_type << 28 | delta) as u32);
        }
        Ok(())
    }
}

/// `mfhd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieFragmentHeaderBox {
    pub sequence_number: u32,
}

impl BoxBody for MovieFragmentHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            sequence_number: r.u32("sequence_number")?,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.sequence_number);
        Ok(())
    }
}

/// `tfhd`. Which optional fields are on the wire is decided by the box flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFragmentHeaderBox {
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<SampleFlags>,
}

impl TrackFragmentHeaderBox {
    pub const BASE_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
    pub const SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x00_0002;
    pub const DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x00_0008;
    pub const DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x00_0010;
    pub const DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0020;
    pub const DURATION_IS_EMPTY: u32 = 0x01_0000;
    pub const DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

    /// Presence flags matching the optional fields that are set.
    pub fn required_flags(&self) -> u32 {
        let mut flags = 0;
        if self.base_data_offset.is_some() {
            flags |= Self::BASE_DATA_OFFSET_PRESENT;
        }
        if self.sample_description_index.is_some() {
            flags |= Self::SAMPLE_DESCRIPTION_INDEX_PRESENT;
        }
        if self.default_sample_duration.is_some() {
            flags |= Self::DEFAULT_SAMPLE_DURATION_PRESENT;
        }
        if self.default_sample_size.is_some() {
            flags |= Self::DEFAULT_SAMPLE_SIZE_PRESENT;
        }
        if self.default_sample_flags.is_some() {
            flags |= Self::DEFAULT_SAMPLE_FLAGS_PRESENT;
        }
        flags
    }
}

impl BoxBody for TrackFragmentHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, flags: u32) -> DecodeResult<Self> {
        let mut b = Self {
            track_id: r.u32("track_id")?,
            ..Self::default()
        };
        if flags & Self::BASE_DATA_OFFSET_PRESENT != 0 {
            b.base_data_offset = Some(r.u64("base_data_offset")?);
        }
        if flags & Self::SAMPLE_DESCRIPTION_INDEX_PRESENT != 0 {
            b.sample_description_index = Some(r.u32("sample_description_index")?);
        }
        if flags & Self::DEFAULT_SAMPLE_DURATION_PRESENT != 0 {
            b.default_sample_duration = Some(r.u32("default_sample_duration")?);
        }
        if flags & Self::DEFAULT_SAMPLE_SIZE_PRESENT != 0 {
            b.default_sample_size = Some(r.u32("default_sample_size")?);
        }
        if flags & Self::DEFAULT_SAMPLE_FLAGS_PRESENT != 0 {
            b.default_sample_flags = Some(SampleFlags::from_u32(r.u32("default_sample_flags")?));
        }
        Ok(b)
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.track_id);
        if ctx.flags & Self::BASE_DATA_OFFSET_PRESENT != 0 {
            w.u64(require("base_data_offset", self.base_data_offset)?);
        }
        if ctx.flags & Self::SAMPLE_DESCRIPTION_INDEX_PRESENT != 0 {
            w.u32(require("sample_description_index", self.sample_description_index)?);
        }
        if ctx.flags & Self::DEFAULT_SAMPLE_DURATION_PRESENT != 0 {
            w.u32(require("default_sample_duration", self.default_sample_duration)?);
        }
        if ctx.flags & Self::DEFAULT_SAMPLE_SIZE_PRESENT != 0 {
            w.u32(require("default_sample_size", self.default_sample_size)?);
        }
        if ctx.flags & Self::DEFAULT_SAMPLE_FLAGS_PRESENT != 0 {
            w.u32(require("default_sample_flags", self.default_sample_flags)?.to_u32()?);
        }
        Ok(())
    }
}

/// `tfdt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFragmentDecodeTimeBox {
    pub base_media_decode_time: u64,
}

impl BoxBody for TrackFragmentDecodeTimeBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            base_media_decode_time: r.versioned_u64("base_media_decode_time", version)?,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.versioned_u64("base_media_decode_time", ctx.version, self.base_media_decode_time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRunSample {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<SampleFlags>,
    pub composition_time_offset: Option<i64>,
}

/// `trun`.
///
/// `samples` is only populated when at least one per-sample field is flagged
/// present; otherwise `sample_count` alone describes the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRunBox {
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<SampleFlags>,
    pub samples: Vec<TrackRunSample>,
}

impl TrackRunBox {
    pub const DATA_OFFSET_PRESENT: u32 = 0x00_0001;
    pub const FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0004;
    pub const SAMPLE_DURATION_PRESENT: u32 = 0x00_0100;
    pub const SAMPLE_SIZE_PRESENT: u32 = 0x00_0200;
    pub const SAMPLE_FLAGS_PRESENT: u32 = 0x00_0400;
    pub const SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT: u32 = 0x00_0800;

    const PER_SAMPLE: u32 = Self::SAMPLE_DURATION_PRESENT
        | Self::SAMPLE_SIZE_PRESENT
        | Self::SAMPLE_FLAGS_PRESENT
        | Self::SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT;

    /// Presence flags matching the fields that are set.
    pub fn required_flags(&self) -> u32 {
        let mut flags = 0;
        if self.data_offset.is_some() {
            flags |= Self::DATA_OFFSET_PRESENT;
        }
        if self.first_sample_flags.is_some() {
            flags |= Self::FIRST_SAMPLE_FLAGS_PRESENT;
        }
        for s in &self.samples {
            if s.duration.is_some() {
                flags |= Self::SAMPLE_DURATION_PRESENT;
            }
            if s.size.is_some() {
                flags |= Self::SAMPLE_SIZE_PRESENT;
            }
            if s.flags.is_some() {
                flags |= Self::SAMPLE_FLAGS_PRESENT;
            }
            if s.composition_time_offset.is_some() {
                flags |= Self::SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT;
            }
        }
        flags
    }
}

impl BoxBody for TrackRunBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, flags: u32) -> DecodeResult<Self> {
        let sample_count = r.u32("sample_count")?;
        let data_offset = if flags & Self::DATA_OFFSET_PRESENT != 0 {
            Some(r.i32("data_offset")?)
        } else {
            None
        };
        let first_sample_flags = if flags & Self::FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            Some(SampleFlags::from_u32(r.u32("first_sample_flags")?))
        } else {
            None
        };

        let mut samples = Vec::new();
        let row = 4 * (flags & Self::PER_SAMPLE).count_ones() as usize;
        if row > 0 {
            samples.reserve(r.capacity_for(sample_count as u64, row));
            for _ in 0..sample_count {
                let mut s = TrackRunSample::default();
                if flags & Self::SAMPLE_DURATION_PRESENT != 0 {
                    s.duration = Some(r.u32("sample_duration")?);
                }
                if flags & Self::SAMPLE_SIZE_PRESENT != 0 {
                    s.size = Some(r.u32("sample_size")?);
                }
                if flags & Self::SAMPLE_FLAGS_PRESENT != 0 {
                    s.flags = Some(SampleFlags::from_u32(r.u32("sample_flags")?));
                }
                if flags & Self::SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
                    s.composition_time_offset = Some(read_composition_offset(
                        r,
                        version,
                        "sample_composition_time_offset",
                    )?);
                }
                samples.push(s);
            }
        }

        Ok(Self {
            sample_count,
            data_offset,
            first_sample_flags,
            samples,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        let flags = ctx.flags;
        if flags & Self::PER_SAMPLE != 0 {
            w.count_u32("sample_count", self.samples.len())?;
        } else {
            w.u32(self.sample_count);
        }
        if flags & Self::DATA_OFFSET_PRESENT != 0 {
            w.i32(require("data_offset", self.data_offset)?);
        }
        if flags & Self::FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            w.u32(require("first_sample_flags", self.first_sample_flags)?.to_u32()?);
        }
        if flags & Self::PER_SAMPLE == 0 {
            return Ok(());
        }
        for s in &self.samples {
            if flags & Self::SAMPLE_DURATION_PRESENT != 0 {
                w.u32(require("sample_duration", s.duration)?);
            }
            if flags & Self::SAMPLE_SIZE_PRESENT != 0 {
                w.u32(require("sample_size", s.size)?);
            }
            if flags & Self::SAMPLE_FLAGS_PRESENT != 0 {
                w.u32(require("sample_flags", s.flags)?.to_u32()?);
            }
            if flags & Self::SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
                let offset = require("sample_composition_time_offset", s.composition_time_offset)?;
                write_composition_offset(w, ctx.version, "sample_composition_time_offset", offset)?;
            }
        }
        Ok(())
    }
}

/// `mehd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieExtendsHeaderBox {
    pub fragment_duration: u64,
}

impl BoxBody for MovieExtendsHeaderBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            fragment_duration: r.versioned_u64("fragment_duration", version)?,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.versioned_u64("fragment_duration", ctx.version, self.fragment_duration)
    }
}

/// `trex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackExtendsBox {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: SampleFlags,
}

impl BoxBody for TrackExtendsBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        Ok(Self {
            track_id: r.u32("track_id")?,
            default_sample_description_index: r.u32("default_sample_description_index")?,
            default_sample_duration: r.u32("default_sample_duration")?,
            default_sample_size: r.u32("default_sample_size")?,
            default_sample_flags: SampleFlags::from_u32(r.u32("default_sample_flags")?),
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.track_id);
        w.u32(self.default_sample_description_index);
        w.u32(self.default_sample_duration);
        w.u32(self.default_sample_size);
        w.u32(self.default_sample_flags.to_u32()?);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleToGroupEntry {
    pub sample_count: u32,
    pub group_description_index: u32,
}

/// `sbgp`. `grouping_type_parameter` exists only in version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleToGroupBox {
    pub grouping_type: FourCC,
    pub grouping_type_parameter: Option<u32>,
    pub entries: Vec<SampleToGroupEntry>,
}

impl BoxBody for SampleToGroupBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, version: u8, _flags: u32) -> DecodeResult<Self> {
        let grouping_type = r.fourcc("grouping_type")?;
        let grouping_type_parameter = if version == 1 {
            Some(r.u32("grouping_type_parameter")?)
        } else {
            None
        };
        let entries = read_entries(r, 8, |r| {
            Ok(SampleToGroupEntry {
                sample_count: r.u32("sample_count")?,
                group_description_index: r.u32("group_description_index")?,
            })
        })?;
        Ok(Self {
            grouping_type,
            grouping_type_parameter,
            entries,
        })
    }

    fn encode(&self, w: &mut FieldWriter, ctx: &EncodeContext) -> EncodeResult {
        w.fourcc(self.grouping_type);
        if ctx.version == 1 {
            w.u32(require("grouping_type_parameter", self.grouping_type_parameter)?);
        }
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.sample_count);
            w.u32(e.group_description_index);
            Ok(())
        })
    }
}


// ---------- HTTP Dynamic Streaming ----------

/// A box stored inside another box's fields rather than as a child, as the
/// run tables of `abst` are: each table list is preceded by its own count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedBox<T> {
    pub version: u8,
    pub flags: u32,
    pub fields: T,
    /// Bytes after the decoded fields, written back as-is.
    pub trailing: Vec<u8>,
}

impl<T> NestedBox<T> {
    pub fn new(fields: T) -> Self {
        Self {
            version: 0,
            flags: 0,
            fields,
            trailing: Vec::new(),
        }
    }
}

fn read_nested<T: BoxBody>(r: &mut FieldReader<'_>, typ: FourCC, field: &'static str) -> DecodeResult<NestedBox<T>> {
    let base = r.offset();
    let rest = r.peek_rest();
    let (header, header_len) = read_header(rest)?;
    if header.typ != typ {
        return Err(ErrorKind::InvalidFieldValue {
            field,
            value: u32::from_be_bytes(header.typ.0) as u64,
        });
    }
    let size = header.resolve_size(rest.len() as u64) as usize;

    let mut inner = FieldReader::new(&rest[header_len..size], base + header_len as u64);
    let (version, flags) = if T::FULL_BOX {
        (inner.u8("version")?, inner.u24("flags")?)
    } else {
        (0, 0)
    };
    let fields = T::decode(&mut inner, version, flags)?;
    let trailing = inner.rest().to_vec();
    r.skip(field, size)?;
    Ok(NestedBox {
        version,
        flags,
        fields,
        trailing,
    })
}

fn write_nested<T: BoxBody>(w: &mut FieldWriter, typ: FourCC, b: &NestedBox<T>) -> EncodeResult {
    let mut inner = FieldWriter::new();
    if T::FULL_BOX {
        inner.u8(b.version);
        inner.u24("flags", b.flags)?;
    }
    let ctx = EncodeContext {
        version: b.version,
        flags: b.flags,
        child_count: 0,
    };
    b.fields.encode(&mut inner, &ctx)?;
    inner.bytes(&b.trailing);
    let body = inner.into_inner();

    let mut header = Vec::with_capacity(16);
    write_header(&mut header, typ, body.len() as u64);
    w.bytes(&header);
    w.bytes(&body);
    Ok(())
}

fn read_string_table(r: &mut FieldReader<'_>, field: &'static str) -> DecodeResult<Vec<NulString>> {
    let count = r.u8(field)?;
    let mut out = Vec::with_capacity(r.capacity_for(count as u64, 1));
    for _ in 0..count {
        out.push(r.cstring(field)?);
    }
    Ok(out)
}

fn write_string_table(w: &mut FieldWriter, field: &'static str, strings: &[NulString]) -> EncodeResult {
    w.count_u8(field, strings.len())?;
    for s in strings {
        w.cstring(field, s)?;
    }
    Ok(())
}

const ASRT: FourCC = FourCC::new(b"asrt");
const AFRT: FourCC = FourCC::new(b"afrt");

/// `abst`: bootstrap information for an HDS presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapInfoBox {
    pub bootstrap_info_version: u32,
    pub profile: u8,
    pub live: bool,
    pub update: bool,
    pub reserved: u8,
    pub time_scale: u32,
    pub current_media_time: u64,
    pub smpte_time_code_offset: u64,
    pub movie_identifier: NulString,
    pub server_entries: Vec<NulString>,
    pub quality_entries: Vec<NulString>,
    pub drm_data: NulString,
    pub metadata: NulString,
    pub segment_run_tables: Vec<NestedBox<SegmentRunTableBox>>,
    pub fragment_run_tables: Vec<NestedBox<FragmentRunTableBox>>,
}

impl BoxBody for BootstrapInfoBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let bootstrap_info_version = r.u32("bootstrap_info_version")?;
        let attrs = r.u8("profile")?;
        let time_scale = r.u32("time_scale")?;
        let current_media_time = r.u64("current_media_time")?;
        let smpte_time_code_offset = r.u64("smpte_time_code_offset")?;
        let movie_identifier = r.cstring("movie_identifier")?;
        let server_entries = read_string_table(r, "server_entry")?;
        let quality_entries = read_string_table(r, "quality_entry")?;
        let drm_data = r.cstring("drm_data")?;
        let metadata = r.cstring("metadata")?;

        let count = r.u8("segment_run_table_count")?;
        let mut segment_run_tables = Vec::with_capacity(r.capacity_for(count as u64, 8));
        for _ in 0..count {
            segment_run_tables.push(read_nested(r, ASRT, "segment_run_table")?);
        }
        let count = r.u8("fragment_run_table_count")?;
        let mut fragment_run_tables = Vec::with_capacity(r.capacity_for(count as u64, 8));
        for _ in 0..count {
            fragment_run_tables.push(read_nested(r, AFRT, "fragment_run_table")?);
        }

        Ok(Self {
            bootstrap_info_version,
            profile: attrs >> 6,
            live: (attrs >> 5) & 0x1 != 0,
            update: (attrs >> 4) & 0x1 != 0,
            reserved: attrs & 0x0F,
            time_scale,
            current_media_time,
            smpte_time_code_offset,
            movie_identifier,
            server_entries,
            quality_entries,
            drm_data,
            metadata,
            segment_run_tables,
            fragment_run_tables,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        let attrs = check_bits("profile", self.profile as u64, 2)? << 6
            | (self.live as u64) << 5
            | (self.update as u64) << 4
            | check_bits("reserved", self.reserved as u64, 4)?;
        w.u32(self.bootstrap_info_version);
        w.u8(attrs as u8);
        w.u32(self.time_scale);
        w.u64(self.current_media_time);
        w.u64(self.smpte_time_code_offset);
        w.cstring("movie_identifier", &self.movie_identifier)?;
        write_string_table(w, "server_entry", &self.server_entries)?;
        write_string_table(w, "quality_entry", &self.quality_entries)?;
        w.cstring("drm_data", &self.drm_data)?;
        w.cstring("metadata", &self.metadata)?;
        w.count_u8("segment_run_table_count", self.segment_run_tables.len())?;
        for t in &self.segment_run_tables {
            write_nested(w, ASRT, t)?;
        }
        w.count_u8("fragment_run_table_count", self.fragment_run_tables.len())?;
        for t in &self.fragment_run_tables {
            write_nested(w, AFRT, t)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRunEntry {
    pub first_segment: u32,
    pub fragments_per_segment: u32,
}

/// `asrt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRunTableBox {
    pub quality_segment_url_modifiers: Vec<NulString>,
    pub entries: Vec<SegmentRunEntry>,
}

impl BoxBody for SegmentRunTableBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let quality_segment_url_modifiers = read_string_table(r, "quality_segment_url_modifier")?;
        let entries = read_entries(r, 8, |r| {
            Ok(SegmentRunEntry {
                first_segment: r.u32("first_segment")?,
                fragments_per_segment: r.u32("fragments_per_segment")?,
            })
        })?;
        Ok(Self {
            quality_segment_url_modifiers,
            entries,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        write_string_table(w, "quality_segment_url_modifier", &self.quality_segment_url_modifiers)?;
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.first_segment);
            w.u32(e.fragments_per_segment);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRunEntry {
    pub first_fragment: u32,
    pub first_fragment_timestamp: u64,
    pub fragment_duration: u32,
    /// Present only when `fragment_duration` is zero.
    pub discontinuity_indicator: Option<u8>,
}

/// `afrt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRunTableBox {
    pub time_scale: u32,
    pub quality_segment_url_modifiers: Vec<NulString>,
    pub entries: Vec<FragmentRunEntry>,
}

impl FragmentRunTableBox {
    pub const UPDATE: u32 = 0x1;
}

impl BoxBody for FragmentRunTableBox {
    const FULL_BOX: bool = true;

    fn decode(r: &mut FieldReader<'_>, _version: u8, _flags: u32) -> DecodeResult<Self> {
        let time_scale = r.u32("time_scale")?;
        let quality_segment_url_modifiers = read_string_table(r, "quality_segment_url_modifier")?;
        let entries = read_entries(r, 16, |r| {
            let first_fragment = r.u32("first_fragment")?;
            let first_fragment_timestamp = r.u64("first_fragment_timestamp")?;
            let fragment_duration = r.u32("fragment_duration")?;
            let discontinuity_indicator = if fragment_duration == 0 {
                Some(r.u8("discontinuity_indicator")?)
            } else {
                None
            };
            Ok(FragmentRunEntry {
                first_fragment,
                first_fragment_timestamp,
                fragment_duration,
                discontinuity_indicator,
            })
        })?;
        Ok(Self {
            time_scale,
            quality_segment_url_modifiers,
            entries,
        })
    }

    fn encode(&self, w: &mut FieldWriter, _ctx: &EncodeContext) -> EncodeResult {
        w.u32(self.time_scale);
        write_string_table(w, "quality_segment_url_modifier", &self.quality_segment_url_modifiers)?;
        write_entries(w, &self.entries, |w, e| {
            w.u32(e.first_fragment);
            w.u64(e.first_fragment_timestamp);
            w.u32(e.fragment_duration);
            match (e.fragment_duration, e.discontinuity_indicator) {
                (0, indicator) => w.u8(require("discontinuity_indicator", indicator)?),
                (_, Some(indicator)) => {
                    return Err(SerializeErrorKind::InvalidFieldValue {
                        field: "discontinuity_indicator",
                        value: indicator as u64,
                    });
                }
                (_, None) => {}
            }
            Ok(())
        })
    }
}
