//! `aion-gpi probe`: resolve one object by dotted path.
//!
//! A path segment may carry indices, as in `top.lane(2).data`: the name is
//! resolved first and each index is then resolved against the result, the
//! same two steps an engine takes for `dut.lane[2]`.

use std::fmt::Write as _;
use std::rc::Rc;

use aion_gpi::{Gpi, ObjectHandle, SetAction};
use serde::Serialize;

use crate::session;
use crate::{GlobalArgs, OutputFormat, ProbeArgs};

/// Properties of a resolved object.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    /// Fully-qualified name.
    pub fullname: String,
    /// Object kind string.
    pub kind: String,
    /// Owning backend.
    pub backend: String,
    /// Whether the object is constant.
    pub constant: bool,
    /// Element count.
    pub num_elems: usize,
    /// Index range `[left, right]`, if indexable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[i32; 2]>,
    /// Definition name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Current value, for signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One dotted-path segment: a name and any trailing indices.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The name part.
    pub name: &'a str,
    /// Indices, in order.
    pub indices: Vec<i32>,
}

/// Splits `name(i)(j)` into its name and indices.
pub fn parse_segment(segment: &str) -> Result<Segment<'_>, String> {
    let (name, mut rest) = match segment.find('(') {
        Some(pos) => segment.split_at(pos),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(format!("empty name in '{segment}'"));
    }
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest
            .find(')')
            .ok_or_else(|| format!("unclosed index in '{segment}'"))?;
        let index = rest[1..close]
            .trim()
            .parse()
            .map_err(|_| format!("bad index in '{segment}'"))?;
        indices.push(index);
        rest = &rest[close + 1..];
        if !rest.is_empty() && !rest.starts_with('(') {
            return Err(format!("unexpected text after index in '{segment}'"));
        }
    }
    Ok(Segment { name, indices })
}

/// Resolves a dotted path from the root.
pub fn resolve(gpi: &Gpi, path: &str) -> Result<Rc<ObjectHandle>, Box<dyn std::error::Error>> {
    let mut segments = path.split('.');
    let first = parse_segment(segments.next().unwrap_or_default())?;
    let mut handle = gpi.root_handle(Some(first.name))?;
    for index in first.indices {
        handle = gpi.child_by_index(&handle, index)?;
    }
    for segment in segments {
        let segment = parse_segment(segment)?;
        handle = gpi.child_by_name(&handle, segment.name)?;
        for index in segment.indices {
            handle = gpi.child_by_index(&handle, index)?;
        }
    }
    Ok(handle)
}

/// Describes a resolved handle.
pub fn describe(handle: &ObjectHandle) -> ProbeReport {
    ProbeReport {
        fullname: handle.fullname().to_string(),
        kind: handle.kind().as_str().to_string(),
        backend: handle.backend_name().to_string(),
        constant: handle.is_const(),
        num_elems: handle.num_elems(),
        range: handle.range_left().zip(handle.range_right()).map(|(l, r)| [l, r]),
        definition: handle.definition_name().map(str::to_string),
        value: if handle.is_signal() {
            handle.value_str().ok()
        } else {
            None
        },
    }
}

/// Renders a report as `key: value` lines.
pub fn render_text(report: &ProbeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name:      {}", report.fullname);
    let _ = writeln!(out, "kind:      {}", report.kind);
    let _ = writeln!(out, "backend:   {}", report.backend);
    let _ = writeln!(out, "constant:  {}", report.constant);
    let _ = writeln!(out, "elements:  {}", report.num_elems);
    if let Some([left, right]) = report.range {
        let _ = writeln!(out, "range:     [{left}:{right}]");
    }
    if let Some(def) = &report.definition {
        let _ = writeln!(out, "definition: {def}");
    }
    if let Some(value) = &report.value {
        let _ = writeln!(out, "value:     {value}");
    }
    out
}

/// Runs the `aion-gpi probe` command.
pub fn run(args: &ProbeArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = session::open(&args.design, global)?;
    let handle = resolve(&session.gpi, &args.path)?;
    if let Some(value) = &args.set {
        handle.set_value_str(value, SetAction::Deposit)?;
    }
    let report = describe(&handle);
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}
