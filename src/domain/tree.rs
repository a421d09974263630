//! Nested folder structure mirroring uploaded relative paths.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{FileName, UploadPath};

/// Node of a [`FileTree`]: either a folder of named children or a file leaf.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FileTreeNode<F> {
    Folder(BTreeMap<FileName, FileTreeNode<F>>),
    File(F),
}

impl<F> FileTreeNode<F> {
    fn empty_folder() -> Self {
        FileTreeNode::Folder(BTreeMap::new())
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileTreeNode::Folder(_))
    }

    pub fn as_file(&self) -> Option<&F> {
        match self {
            FileTreeNode::File(file) => Some(file),
            FileTreeNode::Folder(_) => None,
        }
    }
}

/// Flattened view of a tree node, addressed by its full segment path.
#[derive(Debug, Eq, PartialEq)]
pub enum TreeEntry<F> {
    Folder(Vec<FileName>),
    File(Vec<FileName>, F),
}

/// Target directory structure of an upload, keyed by path segment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FileTree<F> {
    children: BTreeMap<FileName, FileTreeNode<F>>,
}

impl<F> Default for FileTree<F> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
        }
    }
}

impl<F> FileTree<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &BTreeMap<FileName, FileTreeNode<F>> {
        &self.children
    }

    /// Place `file` at `path`, creating intermediate folders.
    ///
    /// An existing leaf at `path` is overwritten. A leaf sitting where an
    /// intermediate folder is needed is replaced by that folder.
    pub fn insert(&mut self, path: &UploadPath, file: F) {
        Self::insert_into(&mut self.children, path.segments(), file);
    }

    fn insert_into(
        children: &mut BTreeMap<FileName, FileTreeNode<F>>,
        segments: &[FileName],
        file: F,
    ) {
        match segments {
            [] => {}
            [leaf] => {
                children.insert(leaf.clone(), FileTreeNode::File(file));
            }
            [folder, rest @ ..] => {
                let node = children
                    .entry(folder.clone())
                    .or_insert_with(FileTreeNode::empty_folder);
                if !node.is_folder() {
                    *node = FileTreeNode::empty_folder();
                }
                if let FileTreeNode::Folder(grandchildren) = node {
                    Self::insert_into(grandchildren, rest, file);
                }
            }
        }
    }

    /// Look up the node at a slash-delimited path.
    pub fn get(&self, path: &str) -> Option<&FileTreeNode<F>> {
        let mut segments = path.split('/');
        let mut node = self.children.get(segments.next()?)?;
        for segment in segments {
            node = match node {
                FileTreeNode::Folder(children) => children.get(segment)?,
                FileTreeNode::File(_) => return None,
            };
        }
        Some(node)
    }

    /// Consume the tree, yielding folders before their contents.
    pub fn into_entries(self) -> Vec<TreeEntry<F>> {
        let mut entries = Vec::new();
        Self::flatten(&[], self.children, &mut entries);
        entries
    }

    fn flatten(
        prefix: &[FileName],
        children: BTreeMap<FileName, FileTreeNode<F>>,
        out: &mut Vec<TreeEntry<F>>,
    ) {
        for (name, node) in children {
            let mut path = prefix.to_vec();
            path.push(name);
            match node {
                FileTreeNode::Folder(grandchildren) => {
                    out.push(TreeEntry::Folder(path.clone()));
                    Self::flatten(&path, grandchildren, out);
                }
                FileTreeNode::File(file) => out.push(TreeEntry::File(path, file)),
            }
        }
    }
}
