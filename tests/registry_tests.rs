use mp4tree::catalog::*;
use mp4tree::fields::{Fixed16_16, Language, NulString};
use mp4tree::{parse, serialize, BoxTree, FourCC, Mp4Box};

fn bx(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

fn full(typ: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut b = vec![version];
    b.extend_from_slice(&flags.to_be_bytes()[1..]);
    b.extend_from_slice(body);
    bx(typ, &b)
}

fn u16s(v: &[u16]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_be_bytes()).collect()
}

fn u32s(v: &[u32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_be_bytes()).collect()
}

/// Parses a single box, checks it serializes back to the same bytes and returns it.
fn round_trip(data: &[u8]) -> Mp4Box {
    let tree = parse(data).expect("parse failed");
    assert_eq!(tree.boxes.len(), 1);
    assert_eq!(serialize(&tree).expect("serialize failed"), data);
    let BoxTree { mut boxes } = tree;
    boxes.remove(0)
}

fn matrix_bytes() -> Vec<u8> {
    UNITY_MATRIX.iter().flat_map(|x| x.to_be_bytes()).collect()
}

#[test]
fn mvhd_version_0_and_1() {
    let tail = |body: &mut Vec<u8>| {
        body.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate
        body.extend_from_slice(&0x0100u16.to_be_bytes()); // volume
        body.extend_from_slice(&[0; 10]);
        body.extend(matrix_bytes());
        body.extend_from_slice(&[0; 24]);
        body.extend_from_slice(&3u32.to_be_bytes()); // next_track_id
    };

    let mut v0 = u32s(&[1, 2, 1000, 5000]);
    tail(&mut v0);
    assert_eq!(v0.len(), 96);
    let b = round_trip(&full(b"mvhd", 0, 0, &v0));
    let mvhd = b.body::<MovieHeaderBox>().unwrap();
    assert_eq!(b.version(), Some(0));
    assert_eq!(mvhd.creation_time, 1);
    assert_eq!(mvhd.modification_time, 2);
    assert_eq!(mvhd.timescale, 1000);
    assert_eq!(mvhd.duration, 5000);
    assert_eq!(mvhd.rate.to_f64(), 1.0);
    assert_eq!(mvhd.matrix, UNITY_MATRIX);
    assert_eq!(mvhd.next_track_id, 3);

    let mut v1 = Vec::new();
    v1.extend_from_slice(&1u64.to_be_bytes());
    v1.extend_from_slice(&2u64.to_be_bytes());
    v1.extend_from_slice(&1000u32.to_be_bytes());
    v1.extend_from_slice(&(u32::MAX as u64 + 10).to_be_bytes());
    tail(&mut v1);
    assert_eq!(v1.len(), 108);
    let b = round_trip(&full(b"mvhd", 1, 0, &v1));
    assert_eq!(b.version(), Some(1));
    assert_eq!(b.body::<MovieHeaderBox>().unwrap().duration, u32::MAX as u64 + 10);
}

#[test]
fn tkhd_fields_and_flags() {
    let mut body = u32s(&[0, 0, 7, 0, 900]);
    body.extend_from_slice(&[0; 8]);
    body.extend(u16s(&[0, 0, 0, 0])); // layer, alternate_group, volume, reserved
    body.extend(matrix_bytes());
    body.extend(u32s(&[640 << 16, 480 << 16]));

    let b = round_trip(&full(b"tkhd", 0, 3, &body));
    assert_eq!(b.flags(), Some(TrackHeaderBox::ENABLED | TrackHeaderBox::IN_MOVIE));
    let tkhd = b.body::<TrackHeaderBox>().unwrap();
    assert_eq!(tkhd.track_id, 7);
    assert_eq!(tkhd.duration, 900);
    assert_eq!(tkhd.width.integer_part(), 640);
    assert_eq!(tkhd.height, Fixed16_16(480 << 16));
}

#[test]
fn mdhd_language_and_hdlr_name() {
    let mut body = u32s(&[0, 0, 48000, 96000]);
    body.extend(u16s(&[0x55C4, 0]));
    let b = round_trip(&full(b"mdhd", 0, 0, &body));
    let mdhd = b.body::<MediaHeaderBox>().unwrap();
    assert_eq!(mdhd.timescale, 48000);
    assert_eq!(mdhd.language, Language(*b"und"));

    let mut body = vec![0; 4];
    body.extend_from_slice(b"soun");
    body.extend_from_slice(&[0; 12]);
    body.extend_from_slice(b"SoundHandler\0");
    let b = round_trip(&full(b"hdlr", 0, 0, &body));
    let hdlr = b.body::<HandlerReferenceBox>().unwrap();
    assert_eq!(hdlr.handler_type, FourCC(*b"soun"));
    assert_eq!(hdlr.name, "SoundHandler");
}

#[test]
fn stts_stsc_stco_co64_stss() {
    let b = round_trip(&full(b"stts", 0, 0, &u32s(&[2, 100, 1024, 1, 512])));
    let stts = b.body::<TimeToSampleBox>().unwrap();
    assert_eq!(
        stts.entries,
        vec![
            TimeToSampleEntry { sample_count: 100, sample_delta: 1024 },
            TimeToSampleEntry { sample_count: 1, sample_delta: 512 },
        ]
    );

    let b = round_trip(&full(b"stsc", 0, 0, &u32s(&[1, 1, 10, 1])));
    assert_eq!(b.body::<SampleToChunkBox>().unwrap().entries[0].samples_per_chunk, 10);

    let b = round_trip(&full(b"stco", 0, 0, &u32s(&[3, 48, 1000, 2000])));
    assert_eq!(b.body::<ChunkOffsetBox>().unwrap().chunk_offsets, vec![48, 1000, 2000]);

    let mut co64 = u32s(&[1]);
    co64.extend_from_slice(&0x1_0000_0000u64.to_be_bytes());
    let b = round_trip(&full(b"co64", 0, 0, &co64));
    assert_eq!(b.body::<ChunkLargeOffsetBox>().unwrap().chunk_offsets, vec![0x1_0000_0000]);

    let b = round_trip(&full(b"stss", 0, 0, &u32s(&[2, 1, 31])));
    assert_eq!(b.body::<SyncSampleBox>().unwrap().sample_numbers, vec![1, 31]);
}

#[test]
fn ctts_signedness_follows_version() {
    let body = u32s(&[1, 2, 0xFFFF_FFFF]);

    let b = round_trip(&full(b"ctts", 0, 0, &body));
    assert_eq!(b.body::<CompositionOffsetBox>().unwrap().entries[0].sample_offset, 0xFFFF_FFFF);

    let b = round_trip(&full(b"ctts", 1, 0, &body));
    assert_eq!(b.body::<CompositionOffsetBox>().unwrap().entries[0].sample_offset, -1);
}

#[test]
fn stsz_variable_and_fixed() {
    let b = round_trip(&full(b"stsz", 0, 0, &u32s(&[0, 3, 1000, 2000, 3000])));
    let stsz = b.body::<SampleSizeBox>().unwrap();
    assert_eq!(stsz.sample_size, 0);
    assert_eq!(stsz.sample_count, 3);
    assert_eq!(stsz.entry_sizes, vec![1000, 2000, 3000]);

    let b = round_trip(&full(b"stsz", 0, 0, &u32s(&[512, 40])));
    let stsz = b.body::<SampleSizeBox>().unwrap();
    assert_eq!(stsz.sample_size, 512);
    assert_eq!(stsz.sample_count, 40);
    assert!(stsz.entry_sizes.is_empty());
}

#[test]
fn stz2_packed_fields() {
    let mut body = vec![0, 0, 0, 4];
    body.extend(u32s(&[3]));
    body.extend_from_slice(&[0x12, 0x30]);
    let b = round_trip(&full(b"stz2", 0, 0, &body));
    let stz2 = b.body::<CompactSampleSizeBox>().unwrap();
    assert_eq!(stz2.field_size, 4);
    assert_eq!(stz2.entry_sizes, vec![1, 2, 3]);

    let mut body = vec![0, 0, 0, 16];
    body.extend(u32s(&[2]));
    body.extend(u16s(&[300, 4000]));
    let b = round_trip(&full(b"stz2", 0, 0, &body));
    assert_eq!(b.body::<CompactSampleSizeBox>().unwrap().entry_sizes, vec![300, 4000]);
}

#[test]
fn elst_version_1_is_wide() {
    let mut body = u32s(&[1]);
    body.extend_from_slice(&10_000u64.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body.extend(u16s(&[1, 0]));
    let b = round_trip(&full(b"elst", 1, 0, &body));
    let elst = b.body::<EditListBox>().unwrap();
    assert_eq!(
        elst.entries,
        vec![EditListEntry {
            segment_duration: 10_000,
            media_time: -1,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        }]
    );
}

#[test]
fn sidx_references_are_bit_packed() {
    let mut body = u32s(&[1, 90000, 0, 0]);
    body.extend(u16s(&[0, 1]));
    body.extend(u32s(&[0x8000_0000 | 1000, 3000, 0x9000_0000 | 5]));
    let b = round_trip(&full(b"sidx", 0, 0, &body));
    let sidx = b.body::<SegmentIndexBox>().unwrap();
    assert_eq!(sidx.timescale, 90000);
    assert_eq!(
        sidx.references,
        vec![SegmentReference {
            reference_type: true,
            referenced_size: 1000,
            subsegment_duration: 3000,
            starts_with_sap: true,
            sap_type: 1,
            sap_delta_time: 5,
        }]
    );
}

#[test]
fn tfhd_optional_fields_follow_flags() {
    let flags = TrackFragmentHeaderBox::DEFAULT_BASE_IS_MOOF
        | TrackFragmentHeaderBox::DEFAULT_SAMPLE_DURATION_PRESENT
        | TrackFragmentHeaderBox::DEFAULT_SAMPLE_FLAGS_PRESENT;
    let b = round_trip(&full(b"tfhd", 0, flags, &u32s(&[1, 1024, 0x0101_0000])));
    let tfhd = b.body::<TrackFragmentHeaderBox>().unwrap();
    assert_eq!(tfhd.track_id, 1);
    assert_eq!(tfhd.base_data_offset, None);
    assert_eq!(tfhd.default_sample_duration, Some(1024));
    let sf = tfhd.default_sample_flags.unwrap();
    assert_eq!(sf.sample_depends_on, 1);
    assert!(sf.sample_is_non_sync_sample);
    assert_eq!(tfhd.required_flags(), 0x28);
}

#[test]
fn trun_per_sample_fields() {
    let flags = TrackRunBox::DATA_OFFSET_PRESENT
        | TrackRunBox::SAMPLE_DURATION_PRESENT
        | TrackRunBox::SAMPLE_SIZE_PRESENT
        | TrackRunBox::SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT;
    let body = u32s(&[2, 100, 1000, 500, (-200i32) as u32, 1000, 600, 0]);
    let b = round_trip(&full(b"trun", 1, flags, &body));
    let trun = b.body::<TrackRunBox>().unwrap();
    assert_eq!(trun.sample_count, 2);
    assert_eq!(trun.data_offset, Some(100));
    assert_eq!(trun.samples.len(), 2);
    assert_eq!(trun.samples[0].composition_time_offset, Some(-200));
    assert_eq!(trun.samples[1].size, Some(600));
    assert_eq!(trun.samples[1].flags, None);
    assert_eq!(trun.required_flags(), flags);
}

#[test]
fn fragment_headers() {
    let b = round_trip(&full(b"mfhd", 0, 0, &u32s(&[42])));
    assert_eq!(b.body::<MovieFragmentHeaderBox>().unwrap().sequence_number, 42);

    let b = round_trip(&full(b"tfdt", 1, 0, &(1u64 << 40).to_be_bytes()));
    assert_eq!(b.body::<TrackFragmentDecodeTimeBox>().unwrap().base_media_decode_time, 1 << 40);

    let b = round_trip(&full(b"mehd", 0, 0, &u32s(&[9000])));
    assert_eq!(b.body::<MovieExtendsHeaderBox>().unwrap().fragment_duration, 9000);

    let b = round_trip(&full(b"trex", 0, 0, &u32s(&[1, 1, 0, 0, 0x0001_0000])));
    let trex = b.body::<TrackExtendsBox>().unwrap();
    assert!(trex.default_sample_flags.sample_is_non_sync_sample);

    let mut body = b"roll".to_vec();
    body.extend(u32s(&[7, 1, 10, 1]));
    let b = round_trip(&full(b"sbgp", 1, 0, &body));
    let sbgp = b.body::<SampleToGroupBox>().unwrap();
    assert_eq!(sbgp.grouping_type_parameter, Some(7));
    assert_eq!(sbgp.entries[0].sample_count, 10);
}

fn avc1_fields() -> Vec<u8> {
    let mut body = vec![0; 6];
    body.extend(u16s(&[1]));
    body.extend_from_slice(&[0; 16]);
    body.extend(u16s(&[1920, 1080]));
    body.extend(u32s(&[0x0048_0000, 0x0048_0000, 0]));
    body.extend(u16s(&[1]));
    let mut name = vec![4];
    name.extend_from_slice(b"x264");
    name.resize(32, 0);
    body.extend(name);
    body.extend(u16s(&[0x0018, 0xFFFF]));
    assert_eq!(body.len(), 78);
    body
}

#[test]
fn stsd_with_visual_entry_and_codec_boxes() {
    let avcc = bx(
        b"avcC",
        &[1, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x02, 0x68, 0xEE],
    );
    let pasp = bx(b"pasp", &u32s(&[1, 1]));
    let mut avc1 = avc1_fields();
    avc1.extend(avcc);
    avc1.extend(pasp);
    let mut stsd = u32s(&[1]);
    stsd.extend(bx(b"avc1", &avc1));

    let b = round_trip(&full(b"stsd", 0, 0, &stsd));
    assert!(b.body::<SampleDescriptionBox>().is_some());
    assert_eq!(b.children().len(), 1);

    let entry = &b.children()[0];
    let visual = entry.body::<VisualSampleEntry>().unwrap();
    assert_eq!((visual.width, visual.height), (1920, 1080));
    assert_eq!(visual.compressor_name.name(), b"x264");
    assert_eq!(visual.compressor_name.to_string_lossy(), "x264");
    assert_eq!(entry.children().len(), 2);

    let avcc = entry.child(FourCC(*b"avcC")).unwrap().body::<AvcConfigurationBox>().unwrap();
    assert_eq!(avcc.profile_indication, 0x64);
    assert_eq!(avcc.length_size_minus_one, 3);
    assert_eq!(avcc.sequence_parameter_sets, vec![vec![0x67, 0x64, 0x00, 0x1F]]);
    assert_eq!(avcc.picture_parameter_sets, vec![vec![0x68, 0xEE]]);
    assert!(avcc.extension.is_empty());
}

#[test]
fn audio_entry_with_dac3() {
    let mut mp4a = vec![0; 6];
    mp4a.extend(u16s(&[1, 0, 0]));
    mp4a.extend(u32s(&[0]));
    mp4a.extend(u16s(&[2, 16, 0, 0]));
    mp4a.extend(u32s(&[48000 << 16]));
    mp4a.extend(bx(b"dac3", &[0x10, 0x3D, 0xC0]));

    let b = round_trip(&bx(b"ac-3", &mp4a));
    let audio = b.body::<AudioSampleEntry>().unwrap();
    assert_eq!(audio.channel_count, 2);
    assert_eq!(audio.sample_rate.integer_part(), 48000);

    let dac3 = b.children()[0].body::<Ac3SpecificBox>().unwrap();
    assert_eq!(
        dac3,
        &Ac3SpecificBox {
            fscod: 0,
            bsid: 8,
            bsmod: 0,
            acmod: 7,
            lfeon: true,
            bit_rate_code: 14,
            reserved: 0,
        }
    );
}

#[test]
fn dref_with_self_contained_url() {
    let mut dref = u32s(&[1]);
    dref.extend(full(b"url ", 0, 1, &[]));
    let b = round_trip(&full(b"dref", 0, 0, &dref));
    let url = &b.children()[0];
    assert_eq!(url.flags(), Some(DataEntryUrlBox::SELF_CONTAINED));
    assert_eq!(url.body::<DataEntryUrlBox>().unwrap().location, "");
}

#[test]
fn uuid_and_media_headers() {
    let mut body = vec![0x11; 16];
    body.extend_from_slice(b"payload");
    let b = round_trip(&bx(b"uuid", &body));
    let u = b.body::<UuidBox>().unwrap();
    assert_eq!(u.extended_type, [0x11; 16]);
    assert_eq!(u.data, b"payload");

    let b = round_trip(&full(b"vmhd", 0, 1, &u16s(&[0, 0, 0, 0])));
    assert!(b.body::<VideoMediaHeaderBox>().is_some());

    let b = round_trip(&full(b"smhd", 0, 0, &u16s(&[0xFF00, 0])));
    assert_eq!(b.body::<SoundMediaHeaderBox>().unwrap().balance.to_f64(), -1.0);

    let b = round_trip(&bx(b"btrt", &u32s(&[0, 128_000, 96_000])));
    assert_eq!(b.body::<BitRateBox>().unwrap().avg_bitrate, 96_000);
}

#[test]
fn styp_shares_the_ftyp_layout() {
    let mut body = b"msdh".to_vec();
    body.extend(u32s(&[0]));
    body.extend_from_slice(b"msdhmsix");
    let b = round_trip(&bx(b"styp", &body));
    let styp = b.body::<FileTypeBox>().unwrap();
    assert_eq!(styp.compatible_brands, vec![FourCC(*b"msdh"), FourCC(*b"msix")]);
}

#[test]
fn compressorname_is_kept_verbatim() {
    // Latin-1 name filling the whole field
    let mut body = avc1_fields();
    let name = 42..74;
    let mut raw = vec![31u8];
    raw.extend_from_slice(&[0xE9; 31]);
    body[name.clone()].copy_from_slice(&raw);
    let b = round_trip(&bx(b"avc1", &body));
    let visual = b.body::<VisualSampleEntry>().unwrap();
    assert_eq!(visual.compressor_name.name(), &[0xE9u8; 31]);

    // junk after the name is padding that must come back too
    let mut body = avc1_fields();
    body[name.start + 5..name.start + 12].copy_from_slice(b"Coding\0");
    let b = round_trip(&bx(b"avc1", &body));
    let visual = b.body::<VisualSampleEntry>().unwrap();
    assert_eq!(visual.compressor_name.name(), b"x264");
    assert_eq!(&visual.compressor_name.0[5..12], b"Coding\0");
}

#[test]
fn string_fields_keep_their_bytes() {
    let hdlr_body = |name: &[u8]| {
        let mut body = vec![0; 4];
        body.extend_from_slice(b"vide");
        body.extend_from_slice(&[0; 12]);
        body.extend_from_slice(name);
        body
    };

    let b = round_trip(&full(b"hdlr", 0, 0, &hdlr_body(b"Vid\xe9o\0")));
    let hdlr = b.body::<HandlerReferenceBox>().unwrap();
    assert_eq!(hdlr.name.as_bytes(), b"Vid\xe9o");
    assert!(hdlr.name.terminated);

    // QuickTime writers often drop the terminator
    let b = round_trip(&full(b"hdlr", 0, 0, &hdlr_body(b"VideoHandler")));
    let hdlr = b.body::<HandlerReferenceBox>().unwrap();
    assert_eq!(hdlr.name, "VideoHandler");
    assert!(!hdlr.name.terminated);

    let b = round_trip(&full(b"url ", 0, 0, b"file:///a.mp4"));
    let url = b.body::<DataEntryUrlBox>().unwrap();
    assert_eq!(url.location, "file:///a.mp4");
    assert!(!url.location.terminated);

    let b = round_trip(&full(b"urn ", 0, 0, b"urn:x\0http://y\0"));
    let urn = b.body::<DataEntryUrnBox>().unwrap();
    assert_eq!(urn.name, "urn:x");
    assert_eq!(urn.location.as_ref().unwrap(), "http://y");
}

#[test]
fn reserved_bits_are_written_back() {
    let mut trex = u32s(&[1, 1, 0, 0]);
    trex.extend(u32s(&[0xF000_0000]));
    let b = round_trip(&full(b"trex", 0, 0, &trex));
    assert_eq!(b.body::<TrackExtendsBox>().unwrap().default_sample_flags.reserved, 0xF);

    let mut mdhd = u32s(&[0, 0, 48000, 0]);
    mdhd.extend(u16s(&[0x8000 | 0x55C4, 0]));
    let b = round_trip(&full(b"mdhd", 0, 0, &mdhd));
    let mdhd = b.body::<MediaHeaderBox>().unwrap();
    assert!(mdhd.pad);
    assert_eq!(mdhd.language, Language(*b"und"));

    // reserved bits cleared instead of the usual ones
    let b = round_trip(&bx(b"avcC", &[1, 0x42, 0xC0, 0x1E, 0x03, 0x00, 0x00]));
    let avcc = b.body::<AvcConfigurationBox>().unwrap();
    assert_eq!(avcc.length_size_minus_one, 3);
    assert_eq!((avcc.length_size_reserved, avcc.sps_count_reserved), (0, 0));

    let b = round_trip(&bx(b"dac3", &[0x10, 0x3D, 0xDF]));
    assert_eq!(b.body::<Ac3SpecificBox>().unwrap().reserved, 0x1F);
}

fn hvcc_body() -> Vec<u8> {
    let mut body = vec![1, 0x01];
    body.extend(u32s(&[0x6000_0000]));
    body.extend_from_slice(&[0x90, 0, 0, 0, 0, 0]);
    body.push(93);
    body.extend_from_slice(&[0xF0, 0x00, 0xFC, 0xFD, 0xF8, 0xF8]);
    body.extend(u16s(&[0]));
    body.push(0x0F);
    body.push(2);
    // VPS array, complete
    body.extend_from_slice(&[0xA0, 0x00, 0x01, 0x00, 0x03, 0x40, 0x01, 0x0C]);
    // SPS array with two units
    body.extend_from_slice(&[0x21, 0x00, 0x02, 0x00, 0x02, 0x42, 0x01, 0x00, 0x01, 0x44]);
    body
}

#[test]
fn hvcc_with_nal_arrays() {
    let b = round_trip(&bx(b"hvcC", &hvcc_body()));
    let hvcc = b.body::<HevcConfigurationBox>().unwrap();
    assert_eq!(hvcc.general_profile_idc, 1);
    assert!(!hvcc.general_tier_flag);
    assert_eq!(hvcc.general_profile_compatibility_flags, 0x6000_0000);
    assert_eq!(hvcc.general_level_idc, 93);
    assert_eq!(hvcc.chroma_format_idc, 1);
    assert_eq!(hvcc.num_temporal_layers, 1);
    assert!(hvcc.temporal_id_nested);
    assert_eq!(hvcc.length_size_minus_one, 3);
    assert_eq!(hvcc.reserved_bits, [0xF, 0x3F, 0x3F, 0x1F, 0x1F]);

    assert_eq!(hvcc.arrays.len(), 2);
    assert!(hvcc.arrays[0].array_completeness);
    assert_eq!(hvcc.arrays[0].nal_unit_type, 32);
    assert_eq!(hvcc.arrays[0].nal_units, vec![vec![0x40, 0x01, 0x0C]]);
    assert_eq!(hvcc.arrays[1].nal_unit_type, 33);
    assert_eq!(hvcc.arrays[1].nal_units, vec![vec![0x42, 0x01], vec![0x44]]);
}

fn asrt_box() -> Vec<u8> {
    let mut body = vec![0];
    body.extend(u32s(&[1, 1, 10]));
    full(b"asrt", 0, 0, &body)
}

fn afrt_box(flags: u32) -> Vec<u8> {
    let mut body = u32s(&[1000]);
    body.push(0);
    body.extend(u32s(&[2, 1]));
    body.extend_from_slice(&0u64.to_be_bytes());
    body.extend(u32s(&[4000, 0]));
    body.extend_from_slice(&0u64.to_be_bytes());
    body.extend(u32s(&[0]));
    body.push(1); // discontinuity, only after a zero duration
    full(b"afrt", 0, flags, &body)
}

#[test]
fn hds_bootstrap_with_run_tables() {
    let mut body = u32s(&[1]);
    body.push(0x20); // live
    body.extend(u32s(&[1000]));
    body.extend_from_slice(&0x1234u64.to_be_bytes());
    body.extend_from_slice(&0u64.to_be_bytes());
    body.push(0);
    body.push(1);
    body.extend_from_slice(b"srv\0");
    body.push(0);
    body.extend_from_slice(b"\0\0");
    body.push(1);
    body.extend(asrt_box());
    body.push(1);
    body.extend(afrt_box(0));

    let b = round_trip(&full(b"abst", 0, 0, &body));
    let abst = b.body::<BootstrapInfoBox>().unwrap();
    assert!(abst.live);
    assert!(!abst.update);
    assert_eq!(abst.profile, 0);
    assert_eq!(abst.current_media_time, 0x1234);
    assert!(abst.movie_identifier.is_empty());
    assert_eq!(abst.server_entries, vec![NulString::from("srv")]);
    assert_eq!(
        abst.segment_run_tables[0].fields.entries,
        vec![SegmentRunEntry {
            first_segment: 1,
            fragments_per_segment: 10
        }]
    );
    let afrt = &abst.fragment_run_tables[0].fields;
    assert_eq!(afrt.time_scale, 1000);
    assert_eq!(afrt.entries[0].discontinuity_indicator, None);
    assert_eq!(afrt.entries[1].discontinuity_indicator, Some(1));
}

#[test]
fn hds_run_tables_at_top_level() {
    let b = round_trip(&asrt_box());
    assert_eq!(b.body::<SegmentRunTableBox>().unwrap().entries.len(), 1);

    let b = round_trip(&afrt_box(FragmentRunTableBox::UPDATE));
    assert_eq!(b.flags(), Some(FragmentRunTableBox::UPDATE));
    assert_eq!(b.body::<FragmentRunTableBox>().unwrap().entries[0].fragment_duration, 4000);
}

#[test]
fn bootstrap_rejects_misplaced_run_table() {
    let mut body = u32s(&[1]);
    body.push(0);
    body.extend(u32s(&[1000]));
    body.extend_from_slice(&[0; 16]);
    body.extend_from_slice(&[0, 0, 0, 0, 0]);
    body.push(1);
    body.extend(afrt_box(0));
    body.push(0);

    let err = parse(&full(b"abst", 0, 0, &body)).unwrap_err();
    assert_eq!(
        err.kind,
        mp4tree::ErrorKind::InvalidFieldValue {
            field: "segment_run_table",
            value: u32::from_be_bytes(*b"afrt") as u64
        }
    );
    // offset points at the start of the nested box
    assert_eq!(err.offset, 12 + 4 + 1 + 4 + 16 + 5 + 1);
}
