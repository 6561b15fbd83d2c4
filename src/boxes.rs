use crate::catalog::{BoxFields, BoxVariant, UuidBox};
use crate::error::SerializeError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(b: &[u8; 4]) -> Self {
        FourCC(*b)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }

    /// True when all four bytes are printable ASCII.
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|c| (32..=126).contains(c))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

// Latin-1 so tags like "\xa9nam" survive a JSON round trip.
impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let text: String = self.0.iter().map(|&b| b as char).collect();
        s.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        let mut out = [0u8; 4];
        let mut n = 0;
        for c in text.chars() {
            if n == 4 || c as u32 > 0xFF {
                return Err(D::Error::custom(format!("invalid fourcc {text:?}")));
            }
            out[n] = c as u32 as u8;
            n += 1;
        }
        if n != 4 {
            return Err(D::Error::custom(format!("invalid fourcc {text:?}")));
        }
        Ok(FourCC(out))
    }
}

/// A box with a typed body from the catalog.
///
/// `version` and `flags` are only written when the body is a full box.
/// `trailing` holds body bytes left over after the fields and children,
/// kept so the box re-serializes to the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredBox {
    pub typ: FourCC,
    pub version: u8,
    pub flags: u32,
    pub fields: BoxFields,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerBox {
    pub typ: FourCC,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

/// Opaque box; `payload` is everything between the header and the end of the box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafBox {
    pub typ: FourCC,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mp4Box {
    Structured(StructuredBox),
    Container(ContainerBox),
    Leaf(LeafBox),
}

impl Mp4Box {
    pub fn structured(typ: FourCC, version: u8, flags: u32, fields: impl Into<BoxFields>) -> Self {
        Mp4Box::Structured(StructuredBox {
            typ,
            version,
            flags,
            fields: fields.into(),
            children: Vec::new(),
            trailing: Vec::new(),
        })
    }

    pub fn container(typ: FourCC, children: Vec<Mp4Box>) -> Self {
        Mp4Box::Container(ContainerBox {
            typ,
            children,
            trailing: Vec::new(),
        })
    }

    pub fn leaf(typ: FourCC, payload: Vec<u8>) -> Self {
        Mp4Box::Leaf(LeafBox { typ, payload })
    }

    /// Builder form of [`Mp4Box::push_child`].
    ///
    /// A leaf has nowhere to keep the child, so it is dropped; use
    /// `push_child` when the box kind is not known up front.
    pub fn with_child(mut self, child: Mp4Box) -> Self {
        let _ = self.push_child(child);
        self
    }

    /// Appends a child, handing it back if this box is a leaf.
    ///
    /// Structured boxes whose layout has no children accept it here but
    /// fail to serialize.
    pub fn push_child(&mut self, child: Mp4Box) -> Result<(), Mp4Box> {
        match self.children_mut() {
            Some(kids) => {
                kids.push(child);
                Ok(())
            }
            None => Err(child),
        }
    }

    pub fn typ(&self) -> FourCC {
        match self {
            Mp4Box::Structured(b) => b.typ,
            Mp4Box::Container(b) => b.typ,
            Mp4Box::Leaf(b) => b.typ,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Mp4Box::Structured(_) => "structured",
            Mp4Box::Container(_) => "container",
            Mp4Box::Leaf(_) => "leaf",
        }
    }

    pub fn children(&self) -> &[Mp4Box] {
        match self {
            Mp4Box::Structured(b) => &b.children,
            Mp4Box::Container(b) => &b.children,
            Mp4Box::Leaf(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Mp4Box>> {
        match self {
            Mp4Box::Structured(b) => Some(&mut b.children),
            Mp4Box::Container(b) => Some(&mut b.children),
            Mp4Box::Leaf(_) => None,
        }
    }

    /// First direct child of the given type.
    pub fn child(&self, typ: FourCC) -> Option<&Mp4Box> {
        self.children().iter().find(|c| c.typ() == typ)
    }

    pub fn child_mut(&mut self, typ: FourCC) -> Option<&mut Mp4Box> {
        self.children_mut()?.iter_mut().find(|c| c.typ() == typ)
    }

    /// Position of the first direct child of the given type.
    pub fn index_of(&self, typ: FourCC) -> Option<usize> {
        self.children().iter().position(|c| c.typ() == typ)
    }

    pub fn fields(&self) -> Option<&BoxFields> {
        match self {
            Mp4Box::Structured(b) => Some(&b.fields),
            _ => None,
        }
    }

    /// Typed body, e.g. `b.body::<MovieHeaderBox>()`.
    pub fn body<T: BoxVariant>(&self) -> Option<&T> {
        self.fields().and_then(T::from_fields)
    }

    pub fn body_mut<T: BoxVariant>(&mut self) -> Option<&mut T> {
        match self {
            Mp4Box::Structured(b) => T::from_fields_mut(&mut b.fields),
            _ => None,
        }
    }

    pub fn version(&self) -> Option<u8> {
        match self {
            Mp4Box::Structured(b) if b.fields.is_full_box() => Some(b.version),
            _ => None,
        }
    }

    pub fn flags(&self) -> Option<u32> {
        match self {
            Mp4Box::Structured(b) if b.fields.is_full_box() => Some(b.flags),
            _ => None,
        }
    }

    /// Total serialized size including the header.
    pub fn encoded_len(&self) -> Result<u64, SerializeError> {
        crate::writer::encoded_len(self)
    }
}

/// Parsed file: top-level boxes in on-disk order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxTree {
    pub boxes: Vec<Mp4Box>,
}

impl BoxTree {
    pub fn new(boxes: Vec<Mp4Box>) -> Self {
        Self { boxes }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mp4Box> {
        self.boxes.iter()
    }

    /// First box of the given type in depth-first order.
    pub fn first(&self, typ: FourCC) -> Option<&Mp4Box> {
        first_in(&self.boxes, &|b| b.typ() == typ)
    }

    /// Every box of the given type in depth-first order.
    pub fn find_all(&self, typ: FourCC) -> Vec<&Mp4Box> {
        let mut out = Vec::new();
        collect(&self.boxes, &|b| b.typ() == typ, &mut out);
        out
    }

    /// Deletes every box of the given type at any depth, returning how many were removed.
    pub fn remove_all(&mut self, typ: FourCC) -> usize {
        remove_in(&mut self.boxes, typ)
    }

    /// `uuid` box with the given extended type.
    pub fn find_extended(&self, extended_type: &[u8; 16]) -> Option<&Mp4Box> {
        first_in(&self.boxes, &|b| {
            b.body::<UuidBox>()
                .is_some_and(|u| &u.extended_type == extended_type)
        })
    }

    /// Resolves a dotted path such as `moov.trak[1].mdia`.
    ///
    /// Each segment matches children of the previous matches; `[n]` picks the
    /// n-th match among one parent's children.
    pub fn select(&self, path: &str) -> Vec<&Mp4Box> {
        let mut current: Vec<&Mp4Box> = Vec::new();

        for (depth, seg) in path.split('.').enumerate() {
            let (name, idx) = parse_segment(seg);
            let Some(fourcc) = FourCC::from_str(name) else {
                return Vec::new();
            };

            let scopes: Vec<&[Mp4Box]> = if depth == 0 {
                vec![&self.boxes]
            } else {
                current.iter().map(|b| b.children()).collect()
            };

            let mut next = Vec::new();
            for scope in scopes {
                let matches = scope.iter().filter(|b| b.typ() == fourcc);
                match idx {
                    Some(i) => next.extend(matches.skip(i).take(1)),
                    None => next.extend(matches),
                }
            }

            current = next;
            if current.is_empty() {
                break;
            }
        }

        current
    }
}

impl<'a> IntoIterator for &'a BoxTree {
    type Item = &'a Mp4Box;
    type IntoIter = std::slice::Iter<'a, Mp4Box>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

fn first_in<'a>(list: &'a [Mp4Box], pred: &dyn Fn(&Mp4Box) -> bool) -> Option<&'a Mp4Box> {
    for b in list {
        if pred(b) {
            return Some(b);
        }
        if let Some(found) = first_in(b.children(), pred) {
            return Some(found);
        }
    }
    None
}

fn collect<'a>(list: &'a [Mp4Box], pred: &dyn Fn(&Mp4Box) -> bool, out: &mut Vec<&'a Mp4Box>) {
    for b in list {
        if pred(b) {
            out.push(b);
        }
        collect(b.children(), pred, out);
    }
}

fn remove_in(list: &mut Vec<Mp4Box>, typ: FourCC) -> usize {
    let before = list.len();
    list.retain(|b| b.typ() != typ);
    let mut removed = before - list.len();
    for b in list.iter_mut() {
        if let Some(kids) = b.children_mut() {
            removed += remove_in(kids, typ);
        }
    }
    removed
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}
