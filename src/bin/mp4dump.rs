use anyhow::Context;
use clap::{ArgAction, Parser};
use mp4tree::{
    catalog::UuidBox,
    header::header_len_for,
    known_boxes::KnownBox,
    parse_with, serialize, serialize_box,
    util::{first_difference, hex_dump},
    BoxTree, FourCC, Mp4Box, ParseOptions, ParseWarning, Registry,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box tree explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump the body of this 4CC (e.g. --raw stsd) or uuid:xxxxxxxx...
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Limit recursion depth of the printed tree
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print decoded fields of structured boxes
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Bytes to show when dumping raw (0 means the entire body)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Fail on trailing bytes inside boxes instead of warning
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Keep the boxes before a malformed top-level box instead of failing
    #[arg(long, action = ArgAction::SetTrue)]
    best_effort: bool,

    /// Re-serialize the tree and compare it with the input
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,

    /// Debug logging from the parser
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over -v
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if args.verbose {
            "mp4tree=debug".to_string()
        } else {
            "mp4tree=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let data = std::fs::read(&args.path).with_context(|| format!("reading {}", args.path))?;
    let options = ParseOptions {
        strict: args.strict,
        best_effort: args.best_effort,
        ..ParseOptions::default()
    };
    let out = parse_with(&data, Registry::global(), &options)
        .with_context(|| format!("parsing {}", args.path))?;
    for w in &out.warnings {
        if let ParseWarning::Abandoned(e) = w {
            eprintln!("warning: stopped early: {e}");
        }
    }

    let tree = out.tree;
    let nodes = layout(&tree)?;

    let targets: Vec<&Node> = match &args.filter {
        Some(path) => {
            let picked = tree.select(path);
            let mut found = Vec::new();
            find_nodes(&nodes, &picked, &mut found);
            found
        }
        None => nodes.iter().collect(),
    };

    if args.json {
        let json: Vec<JsonBox> = targets.iter().map(|n| JsonBox::from_node(n)).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for n in &targets {
            print_node(n, 0, args.max_depth, args.decode)?;
        }
    }

    if let Some(sel) = args.raw.as_ref() {
        dump_raw(&nodes, sel, args.bytes)?;
    }

    if args.verify {
        verify(&tree, &data)?;
    }

    Ok(())
}

/// A box with its position in the serialized tree.
struct Node<'a> {
    offset: u64,
    size: u64,
    header_len: u64,
    b: &'a Mp4Box,
    children: Vec<Node<'a>>,
}

fn layout(tree: &BoxTree) -> anyhow::Result<Vec<Node<'_>>> {
    let mut offset = 0;
    let mut nodes = Vec::with_capacity(tree.boxes.len());
    for b in &tree.boxes {
        let node = layout_box(b, offset)?;
        offset += node.size;
        nodes.push(node);
    }
    Ok(nodes)
}

fn layout_box(b: &Mp4Box, offset: u64) -> anyhow::Result<Node<'_>> {
    let size = b.encoded_len()?;
    let header_len = header_len_for(size.saturating_sub(8)) as u64;

    let mut kids_len = 0;
    for c in b.children() {
        kids_len += c.encoded_len()?;
    }
    let trailing = match b {
        Mp4Box::Structured(s) => s.trailing.len() as u64,
        Mp4Box::Container(c) => c.trailing.len() as u64,
        Mp4Box::Leaf(_) => 0,
    };

    // children start after the fields
    let mut child_offset = offset + size - trailing - kids_len;
    let mut children = Vec::new();
    for c in b.children() {
        let node = layout_box(c, child_offset)?;
        child_offset += node.size;
        children.push(node);
    }

    Ok(Node {
        offset,
        size,
        header_len,
        b,
        children,
    })
}

fn find_nodes<'n, 'a>(nodes: &'n [Node<'a>], picked: &[&Mp4Box], out: &mut Vec<&'n Node<'a>>) {
    for n in nodes {
        if picked.iter().any(|p| std::ptr::eq(*p, n.b)) {
            out.push(n);
        }
        find_nodes(&n.children, picked, out);
    }
}

fn display_name(b: &Mp4Box) -> &'static str {
    Registry::global()
        .name_of(b.typ())
        .unwrap_or_else(|| KnownBox::from(b.typ()).full_name())
}

fn display_type(b: &Mp4Box) -> String {
    match b.body::<UuidBox>() {
        Some(u) => format!("uuid:{}", hex::encode(u.extended_type)),
        None => b.typ().to_string(),
    }
}

// ---------- Human-readable tree ----------

fn print_node(n: &Node, depth: usize, max_depth: usize, decode: bool) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    let b = n.b;
    let head = format!(
        "{indent}{:>8} {:>10} {} {}",
        format!("{:#x}", n.offset),
        n.size,
        display_type(b),
        display_name(b)
    );
    match (b.version(), b.flags()) {
        (Some(v), Some(f)) => println!("{head} (ver={v}, flags=0x{f:06x})"),
        _ if matches!(b, Mp4Box::Container(_)) => println!("{head} (container)"),
        _ => println!("{head}"),
    }

    if decode {
        if let Some(fields) = b.fields() {
            println!("{indent}        -> {}", serde_json::to_string(fields)?);
        }
    }

    if depth < max_depth {
        for c in &n.children {
            print_node(c, depth + 1, max_depth, decode)?;
        }
    }
    Ok(())
}

// ---------- Raw dump ----------

fn matches_selector(b: &Mp4Box, sel: &str) -> bool {
    if let Some(prefix) = sel.strip_prefix("uuid:") {
        return b
            .body::<UuidBox>()
            .is_some_and(|u| hex::encode(u.extended_type).starts_with(&prefix.to_ascii_lowercase()));
    }
    FourCC::from_str(sel).is_some_and(|cc| b.typ() == cc)
}

fn dump_raw(nodes: &[Node], sel: &str, limit: usize) -> anyhow::Result<()> {
    let mut matches = Vec::new();
    collect_matches(nodes, sel, &mut matches);
    for (i, n) in matches.into_iter().enumerate() {
        let bytes = serialize_box(n.b)?;
        let body = &bytes[n.header_len as usize..];
        let shown = if limit == 0 { body } else { &body[..limit.min(body.len())] };
        let off = n.offset + n.header_len;
        println!(
            "\n== Dump {} ({}) body: offset={:#x}, len={} ==",
            i,
            display_type(n.b),
            off,
            shown.len()
        );
        print!("{}", hex_dump(shown, off));
    }
    Ok(())
}

fn collect_matches<'n, 'a>(nodes: &'n [Node<'a>], sel: &str, out: &mut Vec<&'n Node<'a>>) {
    for n in nodes {
        if matches_selector(n.b, sel) {
            out.push(n);
        }
        collect_matches(&n.children, sel, out);
    }
}

// ---------- Round trip ----------

fn verify(tree: &BoxTree, original: &[u8]) -> anyhow::Result<()> {
    let rewritten = serialize(tree)?;
    match first_difference(original, &rewritten) {
        None => {
            println!("verify: {} bytes, identical", original.len());
            Ok(())
        }
        Some(at) => anyhow::bail!(
            "verify: output differs at offset {at:#x} (input {} bytes, output {} bytes)",
            original.len(),
            rewritten.len()
        ),
    }
}

// ---------- JSON representation ----------

#[derive(Serialize)]
struct JsonBox {
    offset: u64,
    size: u64,
    typ: FourCC,
    name: &'static str,
    kind: &'static str,
    uuid: Option<String>,
    version: Option<u8>,
    flags: Option<u32>,
    fields: Option<serde_json::Value>,
    payload_len: Option<usize>,
    trailing_len: usize,
    children: Vec<JsonBox>,
}

impl JsonBox {
    fn from_node(n: &Node) -> Self {
        let b = n.b;
        let (payload_len, trailing_len) = match b {
            Mp4Box::Leaf(l) => (Some(l.payload.len()), 0),
            Mp4Box::Container(c) => (None, c.trailing.len()),
            Mp4Box::Structured(s) => (None, s.trailing.len()),
        };
        JsonBox {
            offset: n.offset,
            size: n.size,
            typ: b.typ(),
            name: display_name(b),
            kind: b.kind_name(),
            uuid: b.body::<UuidBox>().map(|u| hex::encode(u.extended_type)),
            version: b.version(),
            flags: b.flags(),
            fields: b.fields().and_then(|f| serde_json::to_value(f).ok()),
            payload_len,
            trailing_len,
            children: n.children.iter().map(JsonBox::from_node).collect(),
        }
    }
}
