//! Property-based round trips over generated box trees.

use mp4tree::catalog::{ChunkOffsetBox, MovieFragmentHeaderBox, TrackFragmentDecodeTimeBox};
use mp4tree::{parse, parse_with, serialize, BoxTree, FourCC, Mp4Box, ParseOptions, Registry};
use proptest::prelude::*;

fn arb_leaf() -> impl Strategy<Value = Mp4Box> {
    (
        prop::sample::select(vec![*b"free", *b"mdat", *b"skip", *b"wide", *b"zzzz"]),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(typ, payload)| Mp4Box::leaf(FourCC(typ), payload))
}

fn arb_structured() -> impl Strategy<Value = Mp4Box> {
    prop_oneof![
        any::<u32>().prop_map(|sequence_number| {
            Mp4Box::structured(FourCC(*b"mfhd"), 0, 0, MovieFragmentHeaderBox { sequence_number })
        }),
        (0u64..=u32::MAX as u64).prop_map(|t| {
            Mp4Box::structured(
                FourCC(*b"tfdt"),
                0,
                0,
                TrackFragmentDecodeTimeBox {
                    base_media_decode_time: t,
                },
            )
        }),
        any::<u64>().prop_map(|t| {
            Mp4Box::structured(
                FourCC(*b"tfdt"),
                1,
                0,
                TrackFragmentDecodeTimeBox {
                    base_media_decode_time: t,
                },
            )
        }),
        prop::collection::vec(any::<u32>(), 0..20).prop_map(|chunk_offsets| {
            Mp4Box::structured(FourCC(*b"stco"), 0, 0, ChunkOffsetBox { chunk_offsets })
        }),
    ]
}

/// Trees of containers with leaf and structured boxes at the bottom.
fn arb_box() -> impl Strategy<Value = Mp4Box> {
    let base = prop_oneof![arb_leaf(), arb_structured()];
    base.prop_recursive(4, 32, 6, |inner| {
        (
            prop::sample::select(vec![*b"moov", *b"trak", *b"udta"]),
            prop::collection::vec(inner, 0..6),
        )
            .prop_map(|(typ, children)| Mp4Box::container(FourCC(typ), children))
    })
}

fn arb_tree() -> impl Strategy<Value = BoxTree> {
    prop::collection::vec(arb_box(), 0..6).prop_map(BoxTree::new)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// serialize then parse gives back the same tree
    #[test]
    fn tree_roundtrip(tree in arb_tree()) {
        let bytes = serialize(&tree).unwrap();
        let back = parse(&bytes).unwrap();
        prop_assert_eq!(back, tree);
    }

    /// encoded_len agrees with the bytes actually written
    #[test]
    fn encoded_len_matches_output(b in arb_box()) {
        let bytes = mp4tree::serialize_box(&b).unwrap();
        prop_assert_eq!(b.encoded_len().unwrap(), bytes.len() as u64);
    }

    /// leaf payloads come back byte for byte
    #[test]
    fn leaf_bytes_pass_through(leaf in arb_leaf()) {
        let bytes = mp4tree::serialize_box(&leaf).unwrap();
        let tree = parse(&bytes).unwrap();
        prop_assert_eq!(serialize(&tree).unwrap(), bytes);
    }

    /// arbitrary input never panics, in either mode
    #[test]
    fn arbitrary_bytes_do_not_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = parse(&data);
        let opts = ParseOptions { best_effort: true, ..ParseOptions::default() };
        let out = parse_with(&data, Registry::global(), &opts).unwrap();
        let _ = serialize(&out.tree);
    }
}
