use std::fs;
use std::io;
use std::path::PathBuf;

use actix_multipart::form::tempfile::TempFile;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::{FileName, ParentId, TreeEntry, UploadRoot, UserId, UserStorage};
use crate::dto::UploadSummaryDto;
use crate::models::auth::AuthenticatedUser;
use crate::services::upload::{
    FileLookup, StagedFile, UploadBatch, UploadErrors, UploadRequestProcessor, ValidatedUpload,
    rule_error,
};
use crate::services::{ServiceError, ServiceResult};

/// Entries on disk are the live records of their owner; deleting removes them.
impl FileLookup for UploadRoot {
    fn name_exists(&self, name: &FileName, owner: &UserId, parent: &ParentId) -> io::Result<bool> {
        UserStorage::new(self.clone(), owner.clone())
            .resolve_entry(parent, name)
            .try_exists()
    }
}

/// Service responsible for storing uploads inside a user's storage.
#[derive(Clone, Debug)]
pub struct FileService {
    upload_root: UploadRoot,
}

impl FileService {
    pub fn new(upload_root: UploadRoot) -> Self {
        Self { upload_root }
    }

    fn sanitize_parent_param(parent: Option<&str>) -> ServiceResult<ParentId> {
        match parent {
            Some(p) => ParentId::try_from_str(p).map_err(|_| ServiceError::InvalidPath),
            None => Ok(ParentId::root()),
        }
    }

    fn storage_for_user(&self, user_id: UserId) -> UserStorage {
        UserStorage::new(self.upload_root.clone(), user_id)
    }

    fn authorize(&self, user: &AuthenticatedUser) -> ServiceResult<(UserId, UserStorage)> {
        if !user.has_role(SERVICE_ACCESS_ROLE) {
            return Err(ServiceError::Unauthorized);
        }
        let user_id = UserId::try_new(user.sub.clone()).map_err(|_| ServiceError::Unauthorized)?;
        let storage = self.storage_for_user(user_id.clone());
        Ok((user_id, storage))
    }

    fn ensure_user_root(&self, storage: &UserStorage) -> ServiceResult<()> {
        fs::create_dir_all(storage.user_root()).map_err(ServiceError::StorageSetup)
    }

    fn ensure_parent(storage: &UserStorage, parent: &ParentId) -> ServiceResult<()> {
        if storage.resolve_parent(parent).is_dir() {
            return Ok(());
        }
        let mut errors = UploadErrors::new();
        errors.add(
            "parent_id",
            rule_error(
                "exists",
                "The selected parent folder does not exist.".to_string(),
            ),
        );
        Err(ServiceError::Validation(errors))
    }

    /// Validate an upload batch and store it under the given parent folder.
    pub fn store_upload(
        &self,
        user: &AuthenticatedUser,
        parent: Option<&str>,
        batch: UploadBatch<TempFile>,
    ) -> ServiceResult<UploadSummaryDto> {
        let (user_id, storage) = self.authorize(user)?;
        let parent_id = Self::sanitize_parent_param(parent)?;
        self.ensure_user_root(&storage)?;
        Self::ensure_parent(&storage, &parent_id)?;

        let upload = UploadRequestProcessor::new(&self.upload_root).process(
            batch,
            &user_id,
            &parent_id,
        )?;
        let folder_name = upload.folder_name.clone();
        let mut stored = Self::materialize(&storage, &parent_id, upload)?;
        stored.sort();

        log::info!(
            "stored {} file(s) for {user_id} under {parent_id}",
            stored.len()
        );

        Ok(UploadSummaryDto {
            folder_name: folder_name.map(FileName::into_string),
            stored,
        })
    }

    /// Write the tree and flat files to disk, returning the stored paths
    /// relative to the parent.
    ///
    /// Existing entries are never replaced. If any write fails, everything
    /// this upload created is removed again.
    fn materialize(
        storage: &UserStorage,
        parent: &ParentId,
        upload: ValidatedUpload<TempFile>,
    ) -> ServiceResult<Vec<String>> {
        let mut created = CreatedEntries::default();
        let result = Self::write_entries(storage, parent, upload, &mut created);
        if result.is_err() {
            created.remove_all();
        }
        result
    }

    fn write_entries(
        storage: &UserStorage,
        parent: &ParentId,
        upload: ValidatedUpload<TempFile>,
        created: &mut CreatedEntries,
    ) -> ServiceResult<Vec<String>> {
        let mut stored = Vec::new();

        for entry in upload.file_tree.into_entries() {
            match entry {
                TreeEntry::Folder(segments) => {
                    let path = storage.resolve_nested(parent, &segments);
                    match fs::create_dir(&path) {
                        Ok(()) => created.folders.push(path),
                        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                            return Err(conflict("files".to_string(), &join_segments(&segments)));
                        }
                        Err(err) => return Err(ServiceError::CreateFolder(err)),
                    }
                }
                TreeEntry::File(segments, staged) => {
                    let stored_path = join_segments(&segments);
                    let target = storage.resolve_nested(parent, &segments);
                    Self::persist(staged, target, &stored_path, created)?;
                    stored.push(stored_path);
                }
            }
        }

        for staged in upload.flat_files {
            let stored_path = staged.name.to_string();
            let target = storage.resolve_entry(parent, &staged.name);
            Self::persist(staged, target, &stored_path, created)?;
            stored.push(stored_path);
        }

        Ok(stored)
    }

    fn persist(
        staged: StagedFile<TempFile>,
        target: PathBuf,
        stored_path: &str,
        created: &mut CreatedEntries,
    ) -> ServiceResult<()> {
        match staged.file.file.persist_noclobber(&target) {
            Ok(_) => {
                created.files.push(target);
                Ok(())
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(conflict(format!("files.{}", staged.index), stored_path))
            }
            Err(err) => Err(ServiceError::SaveFile(err.error)),
        }
    }
}

/// Entries written by one upload, in creation order.
#[derive(Default)]
struct CreatedEntries {
    files: Vec<PathBuf>,
    folders: Vec<PathBuf>,
}

impl CreatedEntries {
    fn remove_all(self) {
        for path in self.files.iter().rev() {
            if let Err(err) = fs::remove_file(path) {
                log::warn!("failed to remove {}: {err}", path.display());
            }
        }
        for path in self.folders.iter().rev() {
            if let Err(err) = fs::remove_dir(path) {
                log::warn!("failed to remove {}: {err}", path.display());
            }
        }
    }
}

/// An entry appeared on disk between validation and the write.
fn conflict(field: String, stored_path: &str) -> ServiceError {
    let mut errors = UploadErrors::new();
    errors.add(
        field,
        rule_error("duplicate", format!("\"{stored_path}\" already exists.")),
    );
    ServiceError::Validation(errors)
}

fn join_segments(segments: &[FileName]) -> String {
    segments
        .iter()
        .map(FileName::as_str)
        .collect::<Vec<_>>()
        .join("/")
}
