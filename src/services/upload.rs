//! Validation of multi-file upload requests and their reshaping into a folder tree.
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;
use std::iter;

use serde::Serialize;
use validator::ValidationError;

use crate::domain::{FileName, FileTree, ParentId, UploadPath, UploadedFile, UserId};
use crate::services::{ServiceError, ServiceResult};

/// Existence check against stored entries.
pub trait FileLookup {
    /// Whether a non-deleted entry called `name`, created by `owner`, exists under `parent`.
    fn name_exists(&self, name: &FileName, owner: &UserId, parent: &ParentId) -> io::Result<bool>;
}

/// Whether `name` would collide with an existing entry of `user_id` under `parent_id`.
pub fn is_duplicate_name<L: FileLookup + ?Sized>(
    lookup: &L,
    name: &FileName,
    user_id: &UserId,
    parent_id: &ParentId,
) -> ServiceResult<bool> {
    lookup
        .name_exists(name, user_id, parent_id)
        .map_err(ServiceError::Lookup)
}

/// First segment of the first relative path, if any path was given.
pub fn detect_folder_name<'a>(file_paths: &[&'a str]) -> Option<&'a str> {
    file_paths.first().and_then(|path| path.split('/').next())
}

/// Pair paths with files by position and arrange the pairs into a tree.
///
/// Paths beyond the number of files are ignored. Files without a path are
/// returned separately, in upload order.
pub fn build_file_tree<F>(file_paths: Vec<Option<UploadPath>>, files: Vec<F>) -> (FileTree<F>, Vec<F>) {
    let mut tree = FileTree::new();
    let mut flat_files = Vec::new();

    let paths = file_paths.into_iter().chain(iter::repeat_with(|| None));
    for (path, file) in paths.zip(files) {
        match path {
            Some(path) => tree.insert(&path, file),
            None => flat_files.push(file),
        }
    }

    (tree, flat_files)
}

/// Field-level validation failures keyed by form field (`files.0`, `folder_name`, ...).
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct UploadErrors(BTreeMap<String, Vec<ValidationError>>);

impl UploadErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, error: ValidationError) {
        self.0.entry(field.into()).or_default().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: &str) -> Option<&[ValidationError]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Human-readable messages per field, falling back to the error code.
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        self.0
            .iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| e.message.as_deref().unwrap_or(&*e.code).to_string())
                    .collect();
                (field.clone(), messages)
            })
            .collect()
    }

    pub fn into_result(self) -> ServiceResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

pub(crate) fn rule_error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn duplicate_error(message: String, name: &FileName) -> ValidationError {
    let mut error = rule_error("duplicate", message);
    error.add_param(Cow::Borrowed("name"), &name.as_str());
    error
}

/// Raw upload batch as received: nullable relative paths paired by position with files.
#[derive(Debug)]
pub struct UploadBatch<F> {
    relative_paths: Vec<Option<String>>,
    files: Vec<F>,
}

impl<F> UploadBatch<F> {
    pub fn new(relative_paths: Vec<Option<String>>, files: Vec<F>) -> Self {
        Self {
            relative_paths,
            files,
        }
    }

    /// Non-null relative paths in upload order.
    pub fn file_paths(&self) -> Vec<&str> {
        self.relative_paths.iter().flatten().map(String::as_str).collect()
    }

    pub fn folder_name(&self) -> Option<&str> {
        detect_folder_name(&self.file_paths())
    }

    /// Relative path sent at the same position as the file at `index`.
    fn paired_path(&self, index: usize) -> Option<&str> {
        self.relative_paths.get(index).and_then(Option::as_deref)
    }
}

/// Uploaded file with its position in the batch and its validated name.
#[derive(Debug, PartialEq)]
pub struct StagedFile<F> {
    pub index: usize,
    pub name: FileName,
    pub file: F,
}

/// Upload that passed validation, ready to be materialized under its parent.
#[derive(Debug)]
pub struct ValidatedUpload<F> {
    /// Set only when the folder is part of the tree being stored.
    pub folder_name: Option<FileName>,
    pub file_tree: FileTree<StagedFile<F>>,
    /// Files sent without a relative path; they go directly under the parent.
    pub flat_files: Vec<StagedFile<F>>,
}

/// Rule failures plus the file names that parsed, by upload position.
struct Checked {
    errors: UploadErrors,
    names: Vec<Option<FileName>>,
}

/// Validates upload batches for one user and parent folder.
pub struct UploadRequestProcessor<'a, L: ?Sized> {
    lookup: &'a L,
}

impl<'a, L: FileLookup + ?Sized> UploadRequestProcessor<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Run every rule against the batch and collect all failures.
    ///
    /// Only lookup failures abort early; rule failures are accumulated.
    pub fn validate<F: UploadedFile>(
        &self,
        batch: &UploadBatch<F>,
        user_id: &UserId,
        parent_id: &ParentId,
    ) -> ServiceResult<UploadErrors> {
        self.check(batch, user_id, parent_id).map(|checked| checked.errors)
    }

    fn check<F: UploadedFile>(
        &self,
        batch: &UploadBatch<F>,
        user_id: &UserId,
        parent_id: &ParentId,
    ) -> ServiceResult<Checked> {
        let mut errors = UploadErrors::new();
        let mut names = Vec::with_capacity(batch.files.len());
        let folder_name = batch.folder_name().filter(|name| !name.is_empty());

        if batch.files.is_empty() {
            errors.add(
                "files",
                rule_error("required", "The files field is required.".to_string()),
            );
        }

        for (index, file) in batch.files.iter().enumerate() {
            let field = format!("files.{index}");
            let name = match file.client_original_name() {
                Some(raw) => match FileName::try_from_str(raw) {
                    Ok(name) => name,
                    Err(_) => {
                        errors.add(
                            field,
                            rule_error("file_name", format!("The file name \"{raw}\" is invalid.")),
                        );
                        names.push(None);
                        continue;
                    }
                },
                None => {
                    errors.add(
                        field,
                        rule_error("file", format!("The files.{index} field must be a file.")),
                    );
                    names.push(None);
                    continue;
                }
            };

            // Duplicate files only matter for flat uploads.
            if folder_name.is_none() && is_duplicate_name(self.lookup, &name, user_id, parent_id)? {
                errors.add(
                    field,
                    duplicate_error(format!("File \"{name}\" already exists."), &name),
                );
            }
            names.push(Some(name));
        }

        for index in 0..batch.files.len() {
            if let Some(raw) = batch.paired_path(index) {
                if UploadPath::try_from_str(raw).is_err() {
                    errors.add(
                        format!("relative_paths.{index}"),
                        rule_error("path", format!("The relative path \"{raw}\" is invalid.")),
                    );
                }
            }
        }

        self.check_top_level(batch, &names, folder_name, user_id, parent_id, &mut errors)?;

        if let Some(raw) = folder_name {
            match FileName::try_from_str(raw) {
                Ok(name) => {
                    if is_duplicate_name(self.lookup, &name, user_id, parent_id)? {
                        errors.add(
                            "folder_name",
                            duplicate_error(format!("Folder \"{name}\" already exists."), &name),
                        );
                    }
                }
                Err(_) => errors.add(
                    "folder_name",
                    rule_error(
                        "folder_name",
                        format!("The folder name \"{raw}\" is invalid."),
                    ),
                ),
            }
        }

        Ok(Checked { errors, names })
    }

    /// Entries placed directly under the parent must not replace existing
    /// entries or each other.
    ///
    /// Targets already covered by the flat or folder duplicate checks are not
    /// looked up again. Paths that share a top-level folder merge, and paths
    /// inside the tree may replace each other; a flat file may not share its
    /// name with any other top-level entry of the batch.
    fn check_top_level<F>(
        &self,
        batch: &UploadBatch<F>,
        names: &[Option<FileName>],
        folder_name: Option<&str>,
        user_id: &UserId,
        parent_id: &ParentId,
        errors: &mut UploadErrors,
    ) -> ServiceResult<()> {
        let mut targets: BTreeMap<FileName, bool> = BTreeMap::new();

        for (index, name) in names.iter().enumerate() {
            let (target, flat) = match batch.paired_path(index) {
                Some(raw) => match UploadPath::try_from_str(raw) {
                    Ok(path) => match path.segments().first() {
                        Some(first) => (first.clone(), false),
                        None => continue,
                    },
                    Err(_) => continue,
                },
                None => match name {
                    Some(name) => (name.clone(), true),
                    None => continue,
                },
            };
            let field = format!("files.{index}");

            if let Some(&seen_flat) = targets.get(&target) {
                if flat || seen_flat {
                    errors.add(
                        field,
                        rule_error(
                            "distinct",
                            format!("\"{target}\" is uploaded more than once."),
                        ),
                    );
                }
                continue;
            }

            let covered = if flat {
                folder_name.is_none()
            } else {
                folder_name == Some(target.as_str())
            };
            if !covered && is_duplicate_name(self.lookup, &target, user_id, parent_id)? {
                errors.add(
                    field,
                    duplicate_error(format!("\"{target}\" already exists."), &target),
                );
            }
            targets.insert(target, flat);
        }

        Ok(())
    }

    /// Validate the batch and, on success, build its folder tree.
    pub fn process<F: UploadedFile>(
        &self,
        batch: UploadBatch<F>,
        user_id: &UserId,
        parent_id: &ParentId,
    ) -> ServiceResult<ValidatedUpload<F>> {
        let Checked { errors, names } = self.check(&batch, user_id, parent_id)?;
        // Every file without a valid name has an error recorded against it.
        let names = match names.into_iter().collect::<Option<Vec<_>>>() {
            Some(names) if errors.is_empty() => names,
            _ => {
                log::debug!(
                    "upload for {user_id} into {parent_id} rejected with {} error(s)",
                    errors.len()
                );
                return Err(ServiceError::Validation(errors));
            }
        };

        let folder_name = batch
            .folder_name()
            .and_then(|name| FileName::try_from_str(name).ok());

        let UploadBatch {
            relative_paths,
            files,
        } = batch;
        let file_paths = relative_paths
            .into_iter()
            .map(|path| path.and_then(|raw| UploadPath::try_from_str(&raw).ok()))
            .collect();
        let staged = files
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (file, name))| StagedFile { index, name, file })
            .collect();
        let (file_tree, flat_files) = build_file_tree(file_paths, staged);
        let folder_name = folder_name.filter(|name| file_tree.children().contains_key(name));

        Ok(ValidatedUpload {
            folder_name,
            file_tree,
            flat_files,
        })
    }
}
