//! Window registry: live windows and their parent/child edges.
//!
//! Only the coordinator actor owns a `WindowRegistry`; every other window
//! learns about it through messages.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use ezs_core::WindowLabel;

use crate::host::WindowHandle;

/// One tracked window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub handle: WindowHandle,
    /// `None` for the main window and for children whose parent was unknown
    /// when they announced themselves.
    pub parent: Option<WindowLabel>,
    pub children: BTreeSet<WindowHandle>,
}

impl WindowDescriptor {
    fn new(handle: WindowHandle, parent: Option<WindowLabel>) -> Self {
        Self {
            handle,
            parent,
            children: BTreeSet::new(),
        }
    }
}

/// Label-keyed map of live windows.
#[derive(Debug, Clone)]
pub struct WindowRegistry {
    windows: HashMap<WindowLabel, WindowDescriptor>,
}

impl WindowRegistry {
    /// Creates a registry holding only the main window.
    pub fn new(main: WindowHandle) -> Self {
        let mut windows = HashMap::new();
        windows.insert(main.label.clone(), WindowDescriptor::new(main, None));
        Self { windows }
    }

    pub fn get(&self, label: &WindowLabel) -> Option<&WindowDescriptor> {
        self.windows.get(label)
    }

    pub fn contains(&self, label: &WindowLabel) -> bool {
        self.windows.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Sorted labels of every tracked window.
    pub fn labels(&self) -> Vec<WindowLabel> {
        let mut labels: Vec<_> = self.windows.keys().cloned().collect();
        labels.sort();
        labels
    }

    /// Inserts or updates the descriptor for `handle.label`.
    ///
    /// Existing children are kept. When the parent changes, the window is
    /// detached from the previous parent. Returns true if the label was new.
    pub fn upsert(&mut self, handle: WindowHandle, parent: Option<WindowLabel>) -> bool {
        let label = handle.label.clone();
        let previous_parent = match self.windows.get_mut(&label) {
            Some(existing) => {
                let previous = std::mem::replace(&mut existing.parent, parent.clone());
                existing.handle = handle.clone();
                previous
            }
            None => {
                self.windows
                    .insert(label, WindowDescriptor::new(handle, parent));
                return true;
            }
        };

        if previous_parent != parent {
            if let Some(old) = previous_parent {
                if let Some(descriptor) = self.windows.get_mut(&old) {
                    descriptor.children.retain(|child| child.label != handle.label);
                }
            }
        }
        false
    }

    /// Records `child` under `parent`. Returns false when the parent is unknown.
    pub fn add_child(&mut self, parent: &WindowLabel, child: WindowHandle) -> bool {
        match self.windows.get_mut(parent) {
            Some(descriptor) => {
                descriptor.children.retain(|c| c.label != child.label);
                descriptor.children.insert(child);
                true
            }
            None => false,
        }
    }

    /// Removes a window and detaches it from its parent.
    pub fn remove(&mut self, label: &WindowLabel) -> Option<WindowDescriptor> {
        let descriptor = self.windows.remove(label)?;
        if let Some(parent) = &descriptor.parent {
            if let Some(parent) = self.windows.get_mut(parent) {
                parent.children.retain(|c| &c.label != label);
            }
        }
        Some(descriptor)
    }

    /// Handles to close for `label`, descendants first, `label` itself last.
    ///
    /// Empty when the label is not tracked. A child edge pointing at a
    /// window without a descriptor still yields that child's handle.
    pub fn close_order(&self, label: &WindowLabel) -> Vec<WindowHandle> {
        let Some(root) = self.windows.get(label) else {
            return Vec::new();
        };

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(label.clone());

        // Iterative post-order: (handle, children expanded?)
        let mut stack = vec![(root.handle.clone(), false)];
        while let Some((handle, expanded)) = stack.pop() {
            if expanded {
                order.push(handle);
                continue;
            }
            let children: Vec<WindowHandle> = self
                .windows
                .get(&handle.label)
                .map(|d| d.children.iter().cloned().collect())
                .unwrap_or_default();
            stack.push((handle, true));
            for child in children.into_iter().rev() {
                if visited.insert(child.label.clone()) {
                    stack.push((child, false));
                } else {
                    debug!(label = %child.label, "skipping repeated child edge");
                }
            }
        }
        order
    }
}
