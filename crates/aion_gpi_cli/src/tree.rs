//! `aion-gpi tree`: hierarchy listing.
//!
//! Walks the design from the root handle with the adapter's iterator, so the
//! listing shows exactly what an engine would see: generate iterations are
//! grouped under their pseudo-regions and children owned by other backends
//! appear where the fallback resolves them.

use std::fmt::Write as _;
use std::rc::Rc;

use aion_gpi::{Gpi, IterSelector, ObjectHandle};
use serde::Serialize;

use crate::session;
use crate::{GlobalArgs, OutputFormat, TreeArgs};

/// One object in the listing.
#[derive(Debug, Serialize)]
pub struct TreeNode {
    /// Short name.
    pub name: String,
    /// Fully-qualified name.
    pub fullname: String,
    /// Object kind string.
    pub kind: String,
    /// Owning backend.
    pub backend: String,
    /// Current value, for signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Children, in iteration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// The whole listing.
#[derive(Debug, Serialize)]
pub struct TreeReport {
    /// Simulator product.
    pub product: String,
    /// Simulator version.
    pub version: String,
    /// Time precision, e.g. `1ps`.
    pub precision: String,
    /// The top scope.
    pub top: TreeNode,
    /// Package scopes, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<TreeNode>,
}

/// Describes `handle` and, up to `depth` more levels, its children.
pub fn walk(gpi: &Gpi, handle: &Rc<ObjectHandle>, depth: Option<usize>) -> TreeNode {
    let value = if handle.is_signal() {
        handle.value_str().ok()
    } else {
        None
    };
    let children = match depth {
        Some(0) => Vec::new(),
        _ => gpi
            .iterate(handle, IterSelector::Objects)
            .map(|iter| {
                iter.map(|child| walk(gpi, &child, depth.map(|d| d - 1)))
                    .collect()
            })
            .unwrap_or_default(),
    };
    TreeNode {
        name: handle.name().to_string(),
        fullname: handle.fullname().to_string(),
        kind: handle.kind().as_str().to_string(),
        backend: handle.backend_name().to_string(),
        value,
        children,
    }
}

/// Builds the report for the current design.
pub fn report(gpi: &Gpi, depth: Option<usize>, packages: bool) -> Result<TreeReport, Box<dyn std::error::Error>> {
    let root = gpi.root_handle(None)?;
    let packages = if packages {
        gpi.iterate(&root, IterSelector::PackageScopes)
            .map(|iter| iter.map(|pkg| walk(gpi, &pkg, depth)).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    Ok(TreeReport {
        product: gpi.simulator_product()?,
        version: gpi.simulator_version()?,
        precision: aion_gpi::time::precision_to_string(gpi.sim_precision()?),
        top: walk(gpi, &root, depth),
        packages,
    })
}

fn render_node(out: &mut String, node: &TreeNode, indent: usize) {
    let _ = write!(out, "{:indent$}{} [{}]", "", node.name, node.kind, indent = indent * 2);
    if let Some(value) = &node.value {
        let _ = write!(out, " = {value}");
    }
    out.push('\n');
    for child in &node.children {
        render_node(out, child, indent + 1);
    }
}

/// Renders the report as an indented listing.
pub fn render_text(report: &TreeReport) -> String {
    let mut out = format!(
        "{} {} (precision {})\n",
        report.product, report.version, report.precision
    );
    render_node(&mut out, &report.top, 0);
    for pkg in &report.packages {
        render_node(&mut out, pkg, 0);
    }
    out
}

/// Runs the `aion-gpi tree` command.
pub fn run(args: &TreeArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = session::open(&args.design, global)?;
    let report = report(&session.gpi, args.depth, args.packages)?;
    tracing::debug!(lookups = session.model.lookups().len(), "hierarchy walked");
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{design_file, global};

    fn open() -> (tempfile::NamedTempFile, session::Session) {
        let f = design_file();
        let s = session::open(f.path().to_str().unwrap(), &global()).unwrap();
        (f, s)
    }

    #[test]
    fn text_listing_groups_generate_members() {
        let (_f, s) = open();
        let text = render_text(&report(&s.gpi, None, false).unwrap());
        let expected = "\
aion-model 0.1.0 (precision 1ps)
top [GPI_MODULE]
  cpu [GPI_MODULE]
    pc [GPI_LOGIC_ARRAY] = 00000001
  lane [GPI_GENARRAY]
    lane(0) [GPI_MODULE]
    lane(1) [GPI_MODULE]
      data [GPI_LOGIC_ARRAY] = 10
  clk [GPI_LOGIC] = 0
";
        assert_eq!(text, expected);
    }

    #[test]
    fn depth_limits_the_walk() {
        let (_f, s) = open();
        let r = report(&s.gpi, Some(1), false).unwrap();
        let cpu = &r.top.children[0];
        assert_eq!(cpu.fullname, "top.cpu");
        assert!(cpu.children.is_empty());
    }

    #[test]
    fn json_includes_packages_when_asked() {
        let (_f, s) = open();
        let r = report(&s.gpi, None, true).unwrap();
        let json: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(json["packages"][0]["kind"], "GPI_PACKAGE");
        assert_eq!(json["top"]["children"][2]["value"], "0");
        assert!(json["top"].get("value").is_none());
    }
}
