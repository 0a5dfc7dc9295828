//! Lazy hierarchy iteration.
//!
//! A [`GpiIterator`] pulls [`IterStep`]s from the owning backend's native
//! iterator and turns each into a cached handle:
//!
//! | step                 | action                                           |
//! |----------------------|--------------------------------------------------|
//! | `Native`             | adopted through the cache and yielded            |
//! | `NativeNoName`       | skipped                                          |
//! | `NotNative`          | resolved by name on the other backends           |
//! | `NotNativeNoName`    | resolved from raw on the other backends          |
//! | `End`                | iteration is over, for good                      |
//!
//! Iterations of a generate loop are never yielded themselves. The first
//! member of each family yields the family's pseudo-region instead; later
//! members are skipped. Members are reached by indexing the pseudo-region.

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::rc::Rc;

use crate::backend::{IterStep, NativeIterator};
use crate::context::Gpi;
use crate::handle::ObjectHandle;

/// Iterator over the children of one parent.
pub struct GpiIterator {
    gpi: Gpi,
    parent: Rc<ObjectHandle>,
    native: Option<Box<dyn NativeIterator>>,
    regions: HashSet<String>,
}

impl GpiIterator {
    pub(crate) fn new(gpi: Gpi, parent: Rc<ObjectHandle>, native: Box<dyn NativeIterator>) -> Self {
        Self {
            gpi,
            parent,
            native: Some(native),
            regions: HashSet::new(),
        }
    }

    /// The handle being iterated.
    pub fn parent(&self) -> &Rc<ObjectHandle> {
        &self.parent
    }
}

impl Iterator for GpiIterator {
    type Item = Rc<ObjectHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = self.native.as_mut()?.next_step();
            let owner = self.parent.backend_name();
            match step {
                IterStep::End => {
                    self.native = None;
                    return None;
                }
                IterStep::NativeNoName => {
                    tracing::trace!(parent = self.parent.fullname(), "skipping nameless child");
                }
                IterStep::Native(obj) => {
                    let Some(member) = obj.generate.clone() else {
                        let backend = Rc::clone(self.parent.backend());
                        return Some(self.gpi.adopt(backend, obj));
                    };
                    // The member itself is never handed out.
                    self.parent.backend().release(obj.native);
                    if self.regions.insert(member.region_fullname.clone()) {
                        return Some(self.gpi.pseudo_region(
                            &self.parent,
                            &member.label,
                            &member.region_fullname,
                        ));
                    }
                }
                IterStep::NotNative { name } => {
                    if let Ok(handle) =
                        self.gpi
                            .resolve_child_by_name(&self.parent, &name, Some(owner))
                    {
                        return Some(handle);
                    }
                }
                IterStep::NotNativeNoName { raw } => {
                    if let Ok(handle) =
                        self.gpi
                            .resolve_child_from_raw(&self.parent, raw, Some(owner))
                    {
                        return Some(handle);
                    }
                }
            }
        }
    }
}

impl FusedIterator for GpiIterator {}

impl std::fmt::Debug for GpiIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpiIterator")
            .field("parent", &self.parent.fullname())
            .field("finished", &self.native.is_none())
            .finish()
    }
}
