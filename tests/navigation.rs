use mp4tree::catalog::{MediaHeaderBox, MovieHeaderBox, UuidBox};
use mp4tree::fields::Language;
use mp4tree::{parse, serialize, BoxTree, FourCC, Mp4Box};

fn cc(b: &[u8; 4]) -> FourCC {
    FourCC(*b)
}

fn mdhd(timescale: u32) -> Mp4Box {
    Mp4Box::structured(
        cc(b"mdhd"),
        0,
        0,
        MediaHeaderBox {
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration: 0,
            language: Language::UNDETERMINED,
            pad: false,
        },
    )
}

fn trak(timescale: u32) -> Mp4Box {
    Mp4Box::container(cc(b"trak"), vec![Mp4Box::container(cc(b"mdia"), vec![mdhd(timescale)])])
}

fn movie() -> BoxTree {
    let uuid = UuidBox {
        extended_type: [0xA5; 16],
        data: vec![1, 2, 3],
    };
    BoxTree::new(vec![
        Mp4Box::leaf(cc(b"free"), vec![]),
        Mp4Box::container(
            cc(b"moov"),
            vec![
                Mp4Box::structured(cc(b"mvhd"), 0, 0, MovieHeaderBox::new(1000, 0)),
                trak(48000),
                trak(90000),
                Mp4Box::container(cc(b"udta"), vec![Mp4Box::leaf(cc(b"free"), vec![0; 4])]),
            ],
        ),
        Mp4Box::structured(cc(b"uuid"), 0, 0, uuid),
    ])
}

fn timescale(b: &Mp4Box) -> u32 {
    b.body::<MediaHeaderBox>().unwrap().timescale
}

#[test]
fn first_and_find_all_are_depth_first() {
    let tree = movie();
    assert_eq!(tree.first(cc(b"free")).unwrap().children().len(), 0);
    assert_eq!(timescale(tree.first(cc(b"mdhd")).unwrap()), 48000);

    let all: Vec<u32> = tree.find_all(cc(b"mdhd")).into_iter().map(timescale).collect();
    assert_eq!(all, vec![48000, 90000]);
    assert_eq!(tree.find_all(cc(b"free")).len(), 2);
    assert!(tree.first(cc(b"stbl")).is_none());
}

#[test]
fn child_lookup_and_index() {
    let tree = movie();
    let moov = &tree.boxes[1];
    assert_eq!(moov.index_of(cc(b"trak")), Some(1));
    assert_eq!(moov.index_of(cc(b"udta")), Some(3));
    assert_eq!(moov.index_of(cc(b"mdat")), None);
    assert!(moov.child(cc(b"mvhd")).unwrap().body::<MovieHeaderBox>().is_some());
    assert!(tree.boxes[0].child(cc(b"mvhd")).is_none());
}

#[test]
fn select_dotted_paths() {
    let tree = movie();

    assert_eq!(tree.select("moov.trak").len(), 2);
    let second = tree.select("moov.trak[1].mdia.mdhd");
    assert_eq!(second.len(), 1);
    assert_eq!(timescale(second[0]), 90000);

    let both: Vec<u32> = tree.select("moov.trak.mdia.mdhd").into_iter().map(timescale).collect();
    assert_eq!(both, vec![48000, 90000]);

    assert!(tree.select("moov.trak[2]").is_empty());
    assert!(tree.select("moov.nope").is_empty());
    assert!(tree.select("toolong").is_empty());
}

#[test]
fn remove_all_reaches_nested_boxes() {
    let mut tree = movie();
    assert_eq!(tree.remove_all(cc(b"free")), 2);
    assert!(tree.first(cc(b"free")).is_none());
    assert_eq!(tree.boxes.len(), 2);

    // sizes of the parents shrink accordingly
    let back = parse(&serialize(&tree).unwrap()).unwrap();
    assert_eq!(back, tree);
}

#[test]
fn find_extended_uuid() {
    let tree = movie();
    let u = tree.find_extended(&[0xA5; 16]).unwrap();
    assert_eq!(u.body::<UuidBox>().unwrap().data, vec![1, 2, 3]);
    assert!(tree.find_extended(&[0; 16]).is_none());
}

#[test]
fn body_mut_edits_in_place() {
    let mut tree = movie();
    let moov = &mut tree.boxes[1];
    let trak = moov.children_mut().unwrap().get_mut(2).unwrap();
    let mdhd = trak.child_mut(cc(b"mdia")).unwrap().child_mut(cc(b"mdhd")).unwrap();
    mdhd.body_mut::<MediaHeaderBox>().unwrap().timescale = 25;
    assert!(mdhd.body_mut::<MovieHeaderBox>().is_none());

    let all: Vec<u32> = tree.find_all(cc(b"mdhd")).into_iter().map(timescale).collect();
    assert_eq!(all, vec![48000, 25]);
}

#[test]
fn iteration_over_top_level() {
    let tree = movie();
    let types: Vec<FourCC> = (&tree).into_iter().map(|b| b.typ()).collect();
    assert_eq!(types, vec![cc(b"free"), cc(b"moov"), cc(b"uuid")]);
    assert_eq!(tree.iter().count(), 3);
}
