use crate::boxes::{BoxTree, ContainerBox, FourCC, LeafBox, Mp4Box, StructuredBox};
use crate::error::{BoxPath, ErrorKind, ParseError, Result};
use crate::fields::FieldReader;
use crate::header::{read_header, BoxHeader};
use crate::known_boxes::KnownBox;
use crate::registry::{CodecEntry, Registry};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Knobs for [`parse_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Treat bytes left over after a box's fields or last child as an error.
    pub strict: bool,
    /// On a malformed top-level box, keep the boxes parsed before it and stop.
    pub best_effort: bool,
    /// Deepest nesting accepted; top-level boxes are depth 1.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            best_effort: false,
            max_depth: 64,
        }
    }
}

/// Recoverable problems seen while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// Bytes after the last field or child of a box; kept in the box's `trailing`.
    TrailingData { offset: u64, path: BoxPath, len: u64 },
    /// Best-effort mode stopped at a malformed top-level box.
    Abandoned(ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutput {
    pub tree: BoxTree,
    pub warnings: Vec<ParseWarning>,
}

/// Parses a complete buffer with the default registry and options.
pub fn parse(bytes: &[u8]) -> Result<BoxTree> {
    parse_with(bytes, Registry::global(), &ParseOptions::default()).map(|out| out.tree)
}

pub fn parse_with(bytes: &[u8], registry: &Registry, options: &ParseOptions) -> Result<ParseOutput> {
    let mut reader = BoxReader::new(registry, options);
    let boxes = reader.read_top_level(bytes)?;
    Ok(ParseOutput {
        tree: BoxTree::new(boxes),
        warnings: reader.warnings,
    })
}

/// Parses the single box at the start of `bytes`.
///
/// `bytes` is everything available to the box, so a size-0 box takes all of it.
/// Returns the box and the number of bytes it occupies.
pub fn parse_box(bytes: &[u8]) -> Result<(Mp4Box, usize)> {
    let options = ParseOptions::default();
    BoxReader::new(Registry::global(), &options).read_box(bytes, 0)
}

struct BoxReader<'r> {
    registry: &'r Registry,
    options: &'r ParseOptions,
    path: Vec<FourCC>,
    warnings: Vec<ParseWarning>,
}

impl<'r> BoxReader<'r> {
    fn new(registry: &'r Registry, options: &'r ParseOptions) -> Self {
        Self {
            registry,
            options,
            path: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&self, kind: ErrorKind, offset: u64) -> ParseError {
        ParseError {
            kind,
            offset,
            path: BoxPath(self.path.clone()),
        }
    }

    fn read_top_level(&mut self, bytes: &[u8]) -> Result<Vec<Mp4Box>> {
        let mut boxes = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            match self.read_box(&bytes[pos..], pos as u64) {
                Ok((b, used)) => {
                    boxes.push(b);
                    pos += used;
                }
                Err(e) if self.options.best_effort => {
                    warn!(error = %e, kept = boxes.len(), "abandoning parse at malformed top-level box");
                    self.warnings.push(ParseWarning::Abandoned(e));
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(boxes)
    }

    /// `buf` starts at the box header and ends where the enclosing scope ends.
    fn read_box(&mut self, buf: &[u8], base: u64) -> Result<(Mp4Box, usize)> {
        let (hdr, header_len) = read_header(buf).map_err(|k| self.error(k, base))?;
        let total = hdr.resolve_size(buf.len() as u64) as usize;

        self.path.push(hdr.typ);
        let result = if self.path.len() > self.options.max_depth {
            Err(self.error(
                ErrorKind::DepthExceeded {
                    max_depth: self.options.max_depth,
                },
                base,
            ))
        } else {
            self.read_body(&hdr, &buf[header_len..total], base + header_len as u64)
        };
        self.path.pop();

        let b = result?;
        trace!(fourcc = %hdr.typ, offset = base, size = total, kind = b.kind_name(), "decoded box");
        Ok((b, total))
    }

    fn read_body(&mut self, hdr: &BoxHeader, body: &[u8], base: u64) -> Result<Mp4Box> {
        if !hdr.typ.is_printable() {
            debug!(fourcc = ?hdr.typ.0, offset = base, "non-printable box type");
        }

        if let Some(entry) = self.registry.lookup(hdr.typ) {
            return self.read_registered(entry, hdr, body, base);
        }

        let known = KnownBox::from(hdr.typ);
        if known.is_container() {
            return self.read_container(hdr.typ, body, base);
        }

        debug!(fourcc = %hdr.typ, len = body.len(), known = !matches!(known, KnownBox::Unknown(_)), "passing box through as opaque bytes");
        Ok(Mp4Box::Leaf(LeafBox {
            typ: hdr.typ,
            payload: body.to_vec(),
        }))
    }

    fn read_container(&mut self, typ: FourCC, body: &[u8], base: u64) -> Result<Mp4Box> {
        let (children, trailing) = self.read_children(body, base)?;
        Ok(Mp4Box::Container(ContainerBox {
            typ,
            children,
            trailing,
        }))
    }

    fn read_registered(&mut self, entry: &CodecEntry, hdr: &BoxHeader, body: &[u8], base: u64) -> Result<Mp4Box> {
        let mut r = FieldReader::new(body, base);
        let (version, flags) = if entry.is_full_box() {
            let version = r.u8("version").map_err(|k| self.error(k, r.offset()))?;
            let flags = r.u24("flags").map_err(|k| self.error(k, r.offset()))?;
            (version, flags)
        } else {
            (0, 0)
        };

        let fields = match entry.decode(&mut r, version, flags) {
            Some(decoded) => decoded.map_err(|k| self.error(k, r.offset()))?,
            None => return self.read_container(hdr.typ, body, base),
        };

        let rest_base = r.offset();
        let rest = r.rest();
        let (children, trailing) = if entry.has_children() {
            self.read_children(rest, rest_base)?
        } else if rest.is_empty() {
            (Vec::new(), Vec::new())
        } else if hdr.is_unbounded() {
            return Err(self.error(
                ErrorKind::UnboundedNotLast {
                    len: rest.len() as u64,
                },
                rest_base,
            ));
        } else {
            (Vec::new(), self.trailing(rest, rest_base)?)
        };

        Ok(Mp4Box::Structured(StructuredBox {
            typ: hdr.typ,
            version,
            flags,
            fields,
            children,
            trailing,
        }))
    }

    /// Parses boxes until `body` is used up. Fewer than 8 bytes at the end
    /// cannot hold a header and are returned as trailing data.
    fn read_children(&mut self, body: &[u8], base: u64) -> Result<(Vec<Mp4Box>, Vec<u8>)> {
        let mut children = Vec::new();
        let mut pos = 0usize;
        while pos < body.len() {
            let rest = &body[pos..];
            if rest.len() < 8 {
                let trailing = self.trailing(rest, base + pos as u64)?;
                return Ok((children, trailing));
            }
            let (child, used) = self.read_box(rest, base + pos as u64)?;
            children.push(child);
            pos += used;
        }
        Ok((children, Vec::new()))
    }

    fn trailing(&mut self, rest: &[u8], offset: u64) -> Result<Vec<u8>> {
        let len = rest.len() as u64;
        if self.options.strict {
            return Err(self.error(ErrorKind::TrailingData { len }, offset));
        }
        let path = BoxPath(self.path.clone());
        warn!(%path, offset, len, "trailing bytes after box contents");
        self.warnings.push(ParseWarning::TrailingData { offset, path, len });
        Ok(rest.to_vec())
    }
}
