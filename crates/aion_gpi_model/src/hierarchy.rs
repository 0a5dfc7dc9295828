//! The object tree built from a [`Design`].

use std::collections::{HashMap, HashSet};

use aion_gpi::{GenerateMember, NativeObject, NativeRef, ObjectInfo, ObjectKind, Range};

use crate::design::{Design, SignalSpec, SignalType};
use crate::error::ModelError;

/// One entry in a scope's child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Child {
    /// An object of this model.
    Node(usize),
    /// A child owned by another backend.
    Foreign {
        /// Short name.
        name: String,
        /// Raw reference, when reported nameless.
        raw: Option<u64>,
    },
}

/// One object of the model.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) fullname: String,
    pub(crate) native: u64,
    pub(crate) info: ObjectInfo,
    pub(crate) signal: Option<SignalSpec>,
    pub(crate) generate: Option<GenerateMember>,
    pub(crate) children: Vec<Child>,
}

impl Node {
    /// The description handed to the adapter.
    pub(crate) fn describe(&self) -> NativeObject {
        NativeObject {
            native: NativeRef(self.native),
            name: self.name.clone(),
            fullname: self.fullname.clone(),
            info: self.info.clone(),
            generate: self.generate.clone(),
        }
    }
}

/// All objects of a design, indexed by path and by native reference.
#[derive(Debug, Default)]
pub(crate) struct Hierarchy {
    nodes: Vec<Node>,
    by_path: HashMap<String, usize>,
    by_native: HashMap<u64, usize>,
    families: HashMap<String, Vec<usize>>,
    packages: Vec<usize>,
    top: usize,
}

enum Decl<'a> {
    Scope(&'a crate::design::ScopeSpec),
    Signal(&'a SignalSpec),
    Generate(&'a crate::design::GenerateSpec),
    Foreign(&'a crate::design::ForeignSpec),
}

impl Decl<'_> {
    fn path(&self) -> &str {
        match self {
            Decl::Scope(s) => &s.path,
            Decl::Signal(s) => &s.path,
            Decl::Generate(g) => &g.path,
            Decl::Foreign(f) => &f.path,
        }
    }
}

/// Hands out native references, avoiding the fixed ones a design declares.
struct NativeAllocator {
    next: u64,
    fixed: HashSet<u64>,
}

impl NativeAllocator {
    fn new(design: &Design) -> Result<Self, ModelError> {
        let mut fixed = HashSet::new();
        let declared = design
            .scopes
            .iter()
            .filter_map(|s| s.raw)
            .chain(design.signals.iter().filter_map(|s| s.raw));
        for raw in declared {
            if !fixed.insert(raw) {
                return Err(ModelError::DuplicateRaw(raw));
            }
        }
        Ok(Self { next: 1, fixed })
    }

    fn allocate(&mut self, fixed: Option<u64>) -> u64 {
        if let Some(raw) = fixed {
            return raw;
        }
        while self.fixed.contains(&self.next) {
            self.next += 1;
        }
        let native = self.next;
        self.next += 1;
        native
    }
}

fn split_path(path: &str) -> Result<(&str, &str), ModelError> {
    path.rsplit_once('.')
        .filter(|(parent, name)| !parent.is_empty() && !name.is_empty())
        .ok_or_else(|| ModelError::MissingParent(path.to_string()))
}

fn signal_info(spec: &SignalSpec) -> ObjectInfo {
    let info = match spec.ty {
        SignalType::Logic if spec.width == 1 => ObjectInfo::signal(ObjectKind::Logic, 1),
        SignalType::Logic => ObjectInfo::signal(ObjectKind::LogicArray, spec.width),
        SignalType::Real => ObjectInfo::signal(ObjectKind::Real, 1),
        SignalType::Integer => ObjectInfo::signal(ObjectKind::Integer, 1),
        SignalType::String => ObjectInfo::signal(ObjectKind::String, 1),
    };
    let info = match spec.range {
        Some([left, right]) => info.with_range(Range::new(left, right)),
        None => info,
    };
    if spec.constant {
        info.constant()
    } else {
        info
    }
}

impl Hierarchy {
    /// Builds the tree. Declarations are placed shallowest first, so a child
    /// may be declared before its parent in the file.
    pub(crate) fn build(design: &Design) -> Result<Self, ModelError> {
        let mut natives = NativeAllocator::new(design)?;
        let mut h = Hierarchy::default();

        let mut top = ObjectInfo::scope(ObjectKind::Module);
        top.definition_name = Some(design.top.clone());
        h.top = h.insert(
            None,
            Node {
                name: design.top.clone(),
                fullname: design.top.clone(),
                native: natives.allocate(None),
                info: top,
                signal: None,
                generate: None,
                children: Vec::new(),
            },
        )?;
        for package in &design.packages {
            let id = h.insert(
                None,
                Node {
                    name: package.name.clone(),
                    fullname: package.name.clone(),
                    native: natives.allocate(None),
                    info: ObjectInfo::scope(ObjectKind::Package),
                    signal: None,
                    generate: None,
                    children: Vec::new(),
                },
            )?;
            h.packages.push(id);
        }

        let mut decls: Vec<Decl<'_>> = design
            .scopes
            .iter()
            .map(Decl::Scope)
            .chain(design.generates.iter().map(Decl::Generate))
            .chain(design.signals.iter().map(Decl::Signal))
            .chain(design.foreign.iter().map(Decl::Foreign))
            .collect();
        decls.sort_by_key(|d| d.path().matches('.').count());

        for decl in decls {
            let path = decl.path();
            let (parent_path, name) = split_path(path)?;
            let parent = h
                .by_path
                .get(parent_path)
                .copied()
                .ok_or_else(|| ModelError::MissingParent(path.to_string()))?;
            match decl {
                Decl::Scope(spec) => {
                    let mut info = ObjectInfo::scope(ObjectKind::Module);
                    info.definition_name = spec.definition.clone();
                    info.definition_file = spec.file.clone();
                    h.insert(
                        Some(parent),
                        Node {
                            name: name.to_string(),
                            fullname: path.to_string(),
                            native: natives.allocate(spec.raw),
                            info,
                            signal: None,
                            generate: None,
                            children: Vec::new(),
                        },
                    )?;
                }
                Decl::Signal(spec) => {
                    h.insert(
                        Some(parent),
                        Node {
                            name: name.to_string(),
                            fullname: path.to_string(),
                            native: natives.allocate(spec.raw),
                            info: signal_info(spec),
                            signal: Some(spec.clone()),
                            generate: None,
                            children: Vec::new(),
                        },
                    )?;
                }
                Decl::Generate(spec) => {
                    if h.by_path.contains_key(path) || h.families.contains_key(path) {
                        return Err(ModelError::DuplicatePath(path.to_string()));
                    }
                    let member = GenerateMember {
                        label: name.to_string(),
                        region_fullname: path.to_string(),
                    };
                    let mut members = Vec::with_capacity(spec.count);
                    for i in 0..spec.count {
                        let id = h.insert(
                            Some(parent),
                            Node {
                                name: format!("{name}({i})"),
                                fullname: format!("{path}({i})"),
                                native: natives.allocate(None),
                                info: ObjectInfo::scope(ObjectKind::Module),
                                signal: None,
                                generate: Some(member.clone()),
                                children: Vec::new(),
                            },
                        )?;
                        members.push(id);
                    }
                    h.families.insert(path.to_string(), members);
                }
                Decl::Foreign(spec) => {
                    h.nodes[parent].children.push(Child::Foreign {
                        name: name.to_string(),
                        raw: spec.raw,
                    });
                }
            }
        }
        Ok(h)
    }

    fn insert(&mut self, parent: Option<usize>, node: Node) -> Result<usize, ModelError> {
        if self.by_path.contains_key(&node.fullname) || self.families.contains_key(&node.fullname) {
            return Err(ModelError::DuplicatePath(node.fullname));
        }
        if self.by_native.contains_key(&node.native) {
            return Err(ModelError::DuplicateRaw(node.native));
        }
        let id = self.nodes.len();
        self.by_path.insert(node.fullname.clone(), id);
        self.by_native.insert(node.native, id);
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent].children.push(Child::Node(id));
        }
        Ok(id)
    }

    pub(crate) fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn top(&self) -> &Node {
        &self.nodes[self.top]
    }

    pub(crate) fn find(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn find_native(&self, native: u64) -> Option<usize> {
        self.by_native.get(&native).copied()
    }

    /// Members of the generate family whose pseudo-region is `path`.
    pub(crate) fn family(&self, path: &str) -> Option<&[usize]> {
        self.families.get(path).map(Vec::as_slice)
    }

    pub(crate) fn packages(&self) -> &[usize] {
        &self.packages
    }

    /// Indices of every value-carrying object.
    pub(crate) fn signals(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.signal.is_some())
            .map(|(i, _)| i)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
