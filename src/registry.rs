use crate::boxes::FourCC;
use crate::catalog::*;
use crate::error::ErrorKind;
use crate::fields::FieldReader;
use std::collections::HashMap;
use std::sync::OnceLock;

type DecodeFn = fn(&mut FieldReader<'_>, u8, u32) -> Result<BoxFields, ErrorKind>;

fn decode_as<T: BoxBody + Into<BoxFields>>(
    r: &mut FieldReader<'_>,
    version: u8,
    flags: u32,
) -> Result<BoxFields, ErrorKind> {
    T::decode(r, version, flags).map(Into::into)
}

/// How a registered box body is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Body is nothing but child boxes.
    Container,
    /// Typed fields, optionally preceded by version/flags and followed by child boxes.
    Structured { full_box: bool, has_children: bool },
}

/// Codec registered for one fourcc.
#[derive(Debug, Clone, Copy)]
pub struct CodecEntry {
    pub fourcc: FourCC,
    pub name: &'static str,
    pub layout: Layout,
    decode: Option<DecodeFn>,
}

impl CodecEntry {
    pub fn is_container(&self) -> bool {
        self.layout == Layout::Container
    }

    pub fn is_full_box(&self) -> bool {
        matches!(self.layout, Layout::Structured { full_box: true, .. })
    }

    pub fn has_children(&self) -> bool {
        match self.layout {
            Layout::Container => true,
            Layout::Structured { has_children, .. } => has_children,
        }
    }

    /// Decodes the fields that follow version/flags.
    ///
    /// Returns `None` for containers, which have no fields.
    pub fn decode(
        &self,
        r: &mut FieldReader<'_>,
        version: u8,
        flags: u32,
    ) -> Option<Result<BoxFields, ErrorKind>> {
        self.decode.map(|f| f(r, version, flags))
    }
}

/// Table of box codecs keyed by fourcc.
///
/// The registry is immutable once constructed; use the `with_*` methods
/// to build it fluently. Encoding does not go through the registry: a
/// [`BoxFields`] value already knows its own layout.
#[derive(Debug, Clone)]
pub struct Registry {
    map: HashMap<FourCC, CodecEntry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with `fourcc` parsed as a plain container.
    pub fn with_container(mut self, fourcc: FourCC, name: &'static str) -> Self {
        self.map.insert(
            fourcc,
            CodecEntry {
                fourcc,
                name,
                layout: Layout::Container,
                decode: None,
            },
        );
        self
    }

    /// Return a new registry with `fourcc` decoded into `T`.
    ///
    /// `name` is human-readable and used for logging and the dump tool.
    pub fn with_structured<T: BoxBody + Into<BoxFields>>(mut self, fourcc: FourCC, name: &'static str) -> Self {
        self.map.insert(
            fourcc,
            CodecEntry {
                fourcc,
                name,
                layout: Layout::Structured {
                    full_box: T::FULL_BOX,
                    has_children: T::HAS_CHILDREN,
                },
                decode: Some(decode_as::<T> as DecodeFn),
            },
        );
        self
    }

    pub fn lookup(&self, fourcc: FourCC) -> Option<&CodecEntry> {
        self.map.get(&fourcc)
    }

    pub fn name_of(&self, fourcc: FourCC) -> Option<&'static str> {
        self.lookup(fourcc).map(|e| e.name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The default catalog, built on first use and shared by every parse.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(default_registry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

const fn cc(b: &[u8; 4]) -> FourCC {
    FourCC::new(b)
}

/// Registry with every box type this crate knows how to decode.
pub fn default_registry() -> Registry {
    Registry::new()
        // containers
        .with_container(cc(b"moov"), "Movie Box")
        .with_container(cc(b"trak"), "Track Box")
        .with_container(cc(b"mdia"), "Media Box")
        .with_container(cc(b"minf"), "Media Information Box")
        .with_container(cc(b"dinf"), "Data Information Box")
        .with_container(cc(b"stbl"), "Sample Table Box")
        .with_container(cc(b"edts"), "Edit Box")
        .with_container(cc(b"mvex"), "Movie Extends Box")
        .with_container(cc(b"moof"), "Movie Fragment Box")
        .with_container(cc(b"traf"), "Track Fragment Box")
        // file level
        .with_structured::<FileTypeBox>(cc(b"ftyp"), "File Type Box")
        .with_structured::<FileTypeBox>(cc(b"styp"), "Segment Type Box")
        .with_structured::<UuidBox>(cc(b"uuid"), "User Extension Box")
        // movie and track headers
        .with_structured::<MovieHeaderBox>(cc(b"mvhd"), "Movie Header Box")
        .with_structured::<TrackHeaderBox>(cc(b"tkhd"), "Track Header Box")
        .with_structured::<MediaHeaderBox>(cc(b"mdhd"), "Media Header Box")
        .with_structured::<HandlerReferenceBox>(cc(b"hdlr"), "Handler Reference Box")
        .with_structured::<VideoMediaHeaderBox>(cc(b"vmhd"), "Video Media Header Box")
        .with_structured::<SoundMediaHeaderBox>(cc(b"smhd"), "Sound Media Header Box")
        .with_structured::<DataReferenceBox>(cc(b"dref"), "Data Reference Box")
        .with_structured::<DataEntryUrlBox>(cc(b"url "), "Data Entry URL Box")
        .with_structured::<DataEntryUrnBox>(cc(b"urn "), "Data Entry URN Box")
        // sample description
        .with_structured::<SampleDescriptionBox>(cc(b"stsd"), "Sample Description Box")
        .with_structured::<VisualSampleEntry>(cc(b"avc1"), "AVC Sample Entry")
        .with_structured::<VisualSampleEntry>(cc(b"avc3"), "AVC Sample Entry")
        .with_structured::<VisualSampleEntry>(cc(b"hvc1"), "HEVC Sample Entry")
        .with_structured::<VisualSampleEntry>(cc(b"hev1"), "HEVC Sample Entry")
        .with_structured::<VisualSampleEntry>(cc(b"encv"), "Encrypted Video Sample Entry")
        .with_structured::<AudioSampleEntry>(cc(b"mp4a"), "MPEG-4 Audio Sample Entry")
        .with_structured::<AudioSampleEntry>(cc(b"enca"), "Encrypted Audio Sample Entry")
        .with_structured::<AudioSampleEntry>(cc(b"ac-3"), "AC-3 Sample Entry")
        .with_structured::<AudioSampleEntry>(cc(b"ec-3"), "E-AC-3 Sample Entry")
        .with_structured::<AvcConfigurationBox>(cc(b"avcC"), "AVC Configuration Box")
        .with_structured::<HevcConfigurationBox>(cc(b"hvcC"), "HEVC Configuration Box")
        .with_structured::<PixelAspectRatioBox>(cc(b"pasp"), "Pixel Aspect Ratio Box")
        .with_structured::<BitRateBox>(cc(b"btrt"), "Bit Rate Box")
        .with_structured::<Ac3SpecificBox>(cc(b"dac3"), "AC-3 Specific Box")
        // sample tables
        .with_structured::<TimeToSampleBox>(cc(b"stts"), "Decoding Time to Sample Box")
        .with_structured::<CompositionOffsetBox>(cc(b"ctts"), "Composition Time to Sample Box")
        .with_structured::<SampleToChunkBox>(cc(b"stsc"), "Sample To Chunk Box")
        .with_structured::<SampleSizeBox>(cc(b"stsz"), "Sample Size Box")
        .with_structured::<CompactSampleSizeBox>(cc(b"stz2"), "Compact Sample Size Box")
        .with_structured::<ChunkOffsetBox>(cc(b"stco"), "Chunk Offset Box")
        .with_structured::<ChunkLargeOffsetBox>(cc(b"co64"), "Chunk Large Offset Box")
        .with_structured::<SyncSampleBox>(cc(b"stss"), "Sync Sample Box")
        .with_structured::<EditListBox>(cc(b"elst"), "Edit List Box")
        .with_structured::<SampleToGroupBox>(cc(b"sbgp"), "Sample To Group Box")
        // fragments
        .with_structured::<SegmentIndexBox>(cc(b"sidx"), "Segment Index Box")
        .with_structured::<MovieExtendsHeaderBox>(cc(b"mehd"), "Movie Extends Header Box")
        .with_structured::<TrackExtendsBox>(cc(b"trex"), "Track Extends Box")
        .with_structured::<MovieFragmentHeaderBox>(cc(b"mfhd"), "Movie Fragment Header Box")
        .with_structured::<TrackFragmentHeaderBox>(cc(b"tfhd"), "Track Fragment Header Box")
        .with_structured::<TrackFragmentDecodeTimeBox>(cc(b"tfdt"), "Track Fragment Decode Time Box")
        .with_structured::<TrackRunBox>(cc(b"trun"), "Track Fragment Run Box")
        // HTTP Dynamic Streaming
        .with_structured::<BootstrapInfoBox>(cc(b"abst"), "Bootstrap Info Box")
        .with_structured::<SegmentRunTableBox>(cc(b"asrt"), "Segment Run Table Box")
        .with_structured::<FragmentRunTableBox>(cc(b"afrt"), "Fragment Run Table Box")
}
