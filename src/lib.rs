pub mod boxes;
pub mod catalog;
pub mod error;
pub mod fields;
pub mod header;
pub mod known_boxes;
pub mod parser;
pub mod registry;
pub mod util;
pub mod writer;

pub use boxes::{BoxTree, ContainerBox, FourCC, LeafBox, Mp4Box, StructuredBox};
pub use catalog::{BoxBody, BoxFields, BoxVariant};
pub use error::{BoxPath, ErrorKind, ParseError, SerializeError, SerializeErrorKind};
pub use header::BoxHeader;
pub use parser::{parse, parse_box, parse_with, ParseOptions, ParseOutput, ParseWarning};
pub use registry::{default_registry, Registry};
pub use writer::{serialize, serialize_box};
