use actix_multipart::form::{MultipartForm, tempfile::TempFile, text::Text};
use serde::Deserialize;
use validator::Validate;

use crate::domain::UploadedFile;
use crate::services::upload::UploadBatch;

/// Multipart body of `POST /files/upload`.
///
/// `relative_paths[]` and `files[]` are correlated by position; an empty
/// path part marks a file uploaded without a folder.
#[derive(MultipartForm)]
pub struct StoreFilesForm {
    #[multipart(rename = "relative_paths[]")]
    pub relative_paths: Vec<Text<String>>,
    #[multipart(rename = "files[]", limit = "100MB")]
    pub files: Vec<TempFile>,
}

impl StoreFilesForm {
    pub fn into_batch(self) -> UploadBatch<TempFile> {
        let relative_paths = self
            .relative_paths
            .into_iter()
            .map(|path| Some(path.into_inner()).filter(|p| !p.is_empty()))
            .collect();
        UploadBatch::new(relative_paths, self.files)
    }
}

#[derive(Deserialize, Validate)]
pub struct UploadQueryParams {
    #[validate(length(max = 1024))]
    pub parent_id: Option<String>,
}

impl UploadedFile for TempFile {
    fn client_original_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}
