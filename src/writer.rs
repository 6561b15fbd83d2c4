use crate::boxes::{BoxTree, FourCC, Mp4Box, StructuredBox};
use crate::catalog::EncodeContext;
use crate::error::{BoxPath, SerializeError, SerializeErrorKind};
use crate::fields::FieldWriter;
use crate::header::{header_len_for, write_header};

/// Serializes every top-level box in order.
///
/// Fails only when a field value does not fit the width its box layout
/// (and version) gives it, or when a flag-gated field is missing.
/// Children on a structured box whose layout has none are also rejected.
pub fn serialize(tree: &BoxTree) -> Result<Vec<u8>, SerializeError> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    for b in &tree.boxes {
        write_box(b, &mut out, &mut path)?;
    }
    Ok(out)
}

pub fn serialize_box(b: &Mp4Box) -> Result<Vec<u8>, SerializeError> {
    let mut out = Vec::new();
    write_box(b, &mut out, &mut Vec::new())?;
    Ok(out)
}

/// Exact serialized size of `b`, header included.
pub fn encoded_len(b: &Mp4Box) -> Result<u64, SerializeError> {
    box_len(b, &mut Vec::new())
}

fn fail(kind: SerializeErrorKind, path: &[FourCC]) -> SerializeError {
    SerializeError {
        kind,
        path: BoxPath(path.to_vec()),
    }
}

fn write_box(b: &Mp4Box, out: &mut Vec<u8>, path: &mut Vec<FourCC>) -> Result<(), SerializeError> {
    if let Mp4Box::Leaf(leaf) = b {
        write_header(out, leaf.typ, leaf.payload.len() as u64);
        out.extend_from_slice(&leaf.payload);
        return Ok(());
    }

    path.push(b.typ());
    let body = encode_body(b, path);
    path.pop();
    let body = body?;

    write_header(out, b.typ(), body.len() as u64);
    out.extend_from_slice(&body);
    Ok(())
}

/// Fields, then children in order, then any preserved trailing bytes.
fn encode_body(b: &Mp4Box, path: &mut Vec<FourCC>) -> Result<Vec<u8>, SerializeError> {
    let (mut body, children, trailing) = match b {
        Mp4Box::Structured(s) => (encode_fields(s, path)?, &s.children, &s.trailing),
        Mp4Box::Container(c) => (Vec::new(), &c.children, &c.trailing),
        Mp4Box::Leaf(l) => return Ok(l.payload.clone()),
    };
    for child in children {
        write_box(child, &mut body, path)?;
    }
    body.extend_from_slice(trailing);
    Ok(body)
}

fn encode_fields(s: &StructuredBox, path: &[FourCC]) -> Result<Vec<u8>, SerializeError> {
    // they would read back as fields or trailing bytes
    if !s.fields.has_children() && !s.children.is_empty() {
        let kind = SerializeErrorKind::UnexpectedChildren {
            count: s.children.len(),
        };
        return Err(fail(kind, path));
    }
    let mut w = FieldWriter::new();
    if s.fields.is_full_box() {
        w.u8(s.version);
        w.u24("flags", s.flags).map_err(|k| fail(k, path))?;
    }
    let ctx = EncodeContext {
        version: s.version,
        flags: s.flags,
        child_count: s.children.len(),
    };
    s.fields.encode(&mut w, &ctx).map_err(|k| fail(k, path))?;
    Ok(w.into_inner())
}

fn box_len(b: &Mp4Box, path: &mut Vec<FourCC>) -> Result<u64, SerializeError> {
    let body = match b {
        Mp4Box::Leaf(l) => l.payload.len() as u64,
        Mp4Box::Container(c) => {
            path.push(c.typ);
            let kids = children_len(&c.children, path);
            path.pop();
            kids? + c.trailing.len() as u64
        }
        Mp4Box::Structured(s) => {
            path.push(s.typ);
            let fields = encode_fields(s, path).map(|f| f.len() as u64);
            let kids = children_len(&s.children, path);
            path.pop();
            fields? + kids? + s.trailing.len() as u64
        }
    };
    Ok(header_len_for(body) as u64 + body)
}

fn children_len(children: &[Mp4Box], path: &mut Vec<FourCC>) -> Result<u64, SerializeError> {
    let mut total = 0u64;
    for c in children {
        total += box_len(c, path)?;
    }
    Ok(total)
}
