//! Ancestor tracking for directory loop detection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use oumanifest_core::{FileId, ManifestError};

/// The directories between a traversal root and the directory being read.
///
/// Each push allocates a node holding its own copy of every ancestor's
/// [`FileId`], so a pending directory keeps exactly the view it was
/// discovered with. Dropping a chain never affects siblings or parents.
///
/// A directory whose identity matches an ancestor is a loop: descending
/// into it would never terminate.
#[derive(Debug, Clone, Default)]
pub struct AncestorChain {
    head: Option<Arc<AncestorNode>>,
}

#[derive(Debug)]
struct AncestorNode {
    path: PathBuf,
    /// Identities of this directory and all its ancestors, innermost last.
    ids: Vec<FileId>,
    parent: Option<Arc<AncestorNode>>,
}

impl AncestorChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Create a chain holding only a traversal root.
    pub fn root(path: impl Into<PathBuf>, id: FileId) -> Self {
        Self {
            head: Some(Arc::new(AncestorNode {
                path: path.into(),
                ids: vec![id],
                parent: None,
            })),
        }
    }

    /// Descend into a directory.
    ///
    /// Fails with [`ManifestError::InfiniteLoop`] if `id` already appears in
    /// the chain.
    pub fn push(&self, path: impl Into<PathBuf>, id: FileId) -> Result<Self, ManifestError> {
        let path = path.into();

        if let Some(ancestor) = self.find(id) {
            return Err(ManifestError::InfiniteLoop {
                path,
                ancestor: ancestor.to_path_buf(),
            });
        }

        let mut ids = Vec::with_capacity(self.depth() + 1);
        ids.extend_from_slice(self.ids());
        ids.push(id);

        Ok(Self {
            head: Some(Arc::new(AncestorNode {
                path,
                ids,
                parent: self.head.clone(),
            })),
        })
    }

    /// The parent's view of the chain.
    pub fn pop(&self) -> Self {
        Self {
            head: self.head.as_ref().and_then(|node| node.parent.clone()),
        }
    }

    /// Check if a directory identity is already on the chain.
    pub fn contains(&self, id: FileId) -> bool {
        self.ids().contains(&id)
    }

    /// Path of the ancestor with identity `id`, if any.
    pub fn find(&self, id: FileId) -> Option<&Path> {
        if !self.contains(id) {
            return None;
        }

        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if current.ids.last() == Some(&id) {
                return Some(&current.path);
            }
            node = current.parent.as_deref();
        }
        None
    }

    /// Path of the innermost directory.
    pub fn path(&self) -> Option<&Path> {
        self.head.as_deref().map(|node| node.path.as_path())
    }

    /// Identities on the chain, outermost first.
    pub fn ids(&self) -> &[FileId] {
        self.head.as_deref().map(|node| node.ids.as_slice()).unwrap_or(&[])
    }

    /// Number of directories on the chain.
    pub fn depth(&self) -> usize {
        self.ids().len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}
