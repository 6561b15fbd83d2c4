use mp4tree::catalog::{FileTypeBox, MovieFragmentHeaderBox};
use mp4tree::{parse, serialize, BoxTree, FourCC, Mp4Box};
use serde_json::Value;

/// [ftyp] [free] [moof [mfhd]] [mdat]
fn make_minimal_mp4() -> Vec<u8> {
    let mut data = Vec::new();

    data.extend_from_slice(&20u32.to_be_bytes());
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(b"isom");
    data.extend_from_slice(&512u32.to_be_bytes());
    data.extend_from_slice(b"isom");

    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(b"free");

    data.extend_from_slice(&24u32.to_be_bytes());
    data.extend_from_slice(b"moof");
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"mfhd");
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&3u32.to_be_bytes());

    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[0u8; 8]);
    data
}

#[test]
fn analyze_and_serialize_to_json() {
    let data = make_minimal_mp4();
    let tree = parse(&data).expect("parse failed");

    let json = serde_json::to_string_pretty(&tree).expect("to_string failed");
    let v: Value = serde_json::from_str(&json).expect("from_str failed");

    let boxes = v["boxes"].as_array().expect("boxes array");
    assert_eq!(boxes.len(), 4);
    assert_eq!(boxes[0]["Structured"]["typ"], "ftyp");
    assert_eq!(boxes[0]["Structured"]["fields"]["FileType"]["minor_version"], 512);
    assert_eq!(boxes[1]["Leaf"]["typ"], "free");
    assert_eq!(boxes[2]["Container"]["children"][0]["Structured"]["typ"], "mfhd");
}

#[test]
fn json_round_trip_preserves_tree() {
    let data = make_minimal_mp4();
    let tree = parse(&data).unwrap();

    let json = serde_json::to_string(&tree).unwrap();
    let back: BoxTree = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tree);
    assert_eq!(serialize(&back).unwrap(), data);

    let mfhd = back.first(FourCC(*b"mfhd")).unwrap();
    assert_eq!(mfhd.body::<MovieFragmentHeaderBox>().unwrap().sequence_number, 3);
    assert_eq!(
        back.boxes[0].body::<FileTypeBox>().unwrap().compatible_brands,
        vec![FourCC(*b"isom")]
    );
}

#[test]
fn fourcc_json_uses_latin1() {
    let cc = FourCC(*b"\xa9nam");
    let json = serde_json::to_string(&cc).unwrap();
    assert_eq!(json, "\"\u{a9}nam\"");
    let back: FourCC = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cc);

    let leaf = Mp4Box::leaf(cc, b"abc".to_vec());
    let json = serde_json::to_string(&leaf).unwrap();
    let back: Mp4Box = serde_json::from_str(&json).unwrap();
    assert_eq!(back, leaf);
}

#[test]
fn fourcc_json_rejects_bad_strings() {
    assert!(serde_json::from_str::<FourCC>("\"abc\"").is_err());
    assert!(serde_json::from_str::<FourCC>("\"abcde\"").is_err());
    assert!(serde_json::from_str::<FourCC>("\"ab\u{2603}d\"").is_err());
}
