//! Strongly-typed domain structures for folder uploads.
use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub mod tree;

pub use tree::{FileTree, FileTreeNode, TreeEntry};

/// Authenticated owner of uploaded entries. Names the owner's storage directory.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn try_new(value: String) -> Result<Self, TypeConstraintError> {
        FileName::try_new(value)
            .map(|name| Self(name.into_string()))
            .map_err(|_| TypeConstraintError::InvalidUserId)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Absolute path to the upload root (e.g. `./upload`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadRoot(PathBuf);

impl UploadRoot {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for UploadRoot {
    fn from(value: PathBuf) -> Self {
        Self::new(value)
    }
}

/// Path relative to a user's storage root. Assumed sanitized.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    pub fn try_new(path: PathBuf) -> Result<Self, TypeConstraintError> {
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(TypeConstraintError::InvalidPath);
        }

        Ok(Self(path))
    }

    pub fn try_from_str(input: &str) -> Result<Self, TypeConstraintError> {
        let trimmed = input.trim_start_matches('/');
        Self::try_new(Path::new(trimmed).to_path_buf())
    }

    pub fn root() -> Self {
        Self(PathBuf::new())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// Folder that receives an upload, addressed relative to the owner's storage root.
/// The empty path is the root itself.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ParentId(RelativePath);

impl ParentId {
    pub fn root() -> Self {
        Self(RelativePath::root())
    }

    pub fn try_from_str(input: &str) -> Result<Self, TypeConstraintError> {
        RelativePath::try_from_str(input).map(Self)
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_path().display())
    }
}

/// Sanitized file name (single path component).
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    pub fn try_new(value: String) -> Result<Self, TypeConstraintError> {
        let path = Path::new(&value);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(component)), None) if component == value.as_str() => {
                Ok(Self(value))
            }
            _ => Err(TypeConstraintError::InvalidFileName),
        }
    }

    pub fn try_from_str(value: &str) -> Result<Self, TypeConstraintError> {
        Self::try_new(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Borrow<str> for FileName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Slash-delimited relative path of an uploaded file, e.g. `Photos/2024/1.jpg`.
///
/// Always holds at least one segment; the last one names the file.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct UploadPath(Vec<FileName>);

impl UploadPath {
    pub fn try_from_str(input: &str) -> Result<Self, TypeConstraintError> {
        let segments = input
            .split('/')
            .map(FileName::try_from_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| TypeConstraintError::InvalidPath)?;

        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[FileName] {
        &self.0
    }
}

impl fmt::Display for UploadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(FileName::as_str)
            .collect::<Vec<_>>()
            .join("/");
        f.write_str(&joined)
    }
}

/// Handle to an uploaded file as seen by the upload processor.
pub trait UploadedFile {
    /// File name as sent by the client, if any.
    fn client_original_name(&self) -> Option<&str>;
}

/// User-scoped access to storage paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserStorage {
    root: UploadRoot,
    user_id: UserId,
}

impl UserStorage {
    pub fn new(root: UploadRoot, user_id: UserId) -> Self {
        Self { root, user_id }
    }

    /// Absolute path to the user root (root + user id).
    pub fn user_root(&self) -> PathBuf {
        self.root.as_path().join(self.user_id.as_str())
    }

    /// Resolve a parent folder within the user root.
    pub fn resolve_parent(&self, parent: &ParentId) -> PathBuf {
        self.user_root().join(parent.as_path())
    }

    /// Resolve a direct child entry of the given parent.
    pub fn resolve_entry(&self, parent: &ParentId, name: &FileName) -> PathBuf {
        let mut path = self.resolve_parent(parent);
        path.push(name.as_str());
        path
    }

    /// Resolve a nested path below the given parent.
    pub fn resolve_nested(&self, parent: &ParentId, segments: &[FileName]) -> PathBuf {
        let mut path = self.resolve_parent(parent);
        path.extend(segments.iter().map(FileName::as_str));
        path
    }
}

#[derive(Debug, Error)]
pub enum TypeConstraintError {
    #[error("invalid relative path")]
    InvalidPath,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("invalid user id")]
    InvalidUserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::try_new(id.to_string()).unwrap()
    }

    #[test]
    fn user_storage_resolves_paths() {
        let storage = UserStorage::new(UploadRoot::from(PathBuf::from("upload")), user("7"));
        let parent = ParentId::try_from_str("nested/path").unwrap();
        let name = FileName::try_from_str("file.txt").unwrap();

        assert_eq!(storage.user_root(), PathBuf::from("upload/7"));
        assert_eq!(
            storage.resolve_entry(&parent, &name),
            PathBuf::from("upload/7/nested/path/file.txt")
        );

        let nested = UploadPath::try_from_str("Photos/2024/1.jpg").unwrap();
        assert_eq!(
            storage.resolve_nested(&ParentId::root(), nested.segments()),
            PathBuf::from("upload/7/Photos/2024/1.jpg")
        );
    }

    #[test]
    fn parent_id_rejects_parent_components() {
        assert!(ParentId::try_from_str("../foo").is_err());
        assert!(ParentId::try_from_str("a/../../b").is_err());
        assert_eq!(
            ParentId::try_from_str("/docs").unwrap().as_path(),
            Path::new("docs")
        );
    }

    #[test]
    fn file_name_rejects_nested_and_special() {
        assert!(FileName::try_from_str("foo/bar.txt").is_err());
        assert!(FileName::try_from_str("../evil.txt").is_err());
        assert!(FileName::try_from_str("..").is_err());
        assert!(FileName::try_from_str(".").is_err());
        assert!(FileName::try_from_str("").is_err());
        assert!(FileName::try_from_str("report.pdf").is_ok());
    }

    #[test]
    fn user_id_must_be_single_component() {
        assert!(UserId::try_new("a/b".to_string()).is_err());
        assert!(UserId::try_new("".to_string()).is_err());
        assert_eq!(user("42").as_str(), "42");
    }

    #[test]
    fn upload_path_splits_segments() {
        let path = UploadPath::try_from_str("a/b/1.jpg").unwrap();
        let names: Vec<&str> = path.segments().iter().map(FileName::as_str).collect();

        assert_eq!(names, vec!["a", "b", "1.jpg"]);
        assert_eq!(path.to_string(), "a/b/1.jpg");
    }

    #[test]
    fn upload_path_bare_file_is_one_segment() {
        let path = UploadPath::try_from_str("1.jpg").unwrap();
        assert_eq!(path.segments().len(), 1);
    }

    #[test]
    fn upload_path_rejects_bad_segments() {
        assert!(UploadPath::try_from_str("").is_err());
        assert!(UploadPath::try_from_str("/a.jpg").is_err());
        assert!(UploadPath::try_from_str("a//b.jpg").is_err());
        assert!(UploadPath::try_from_str("a/../b.jpg").is_err());
        assert!(UploadPath::try_from_str("a/./b.jpg").is_err());
        assert!(UploadPath::try_from_str("a/").is_err());
    }
}
