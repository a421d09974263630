use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::upload::UploadErrors;

/// Result of a stored upload.
#[derive(Clone, Debug, Serialize)]
pub struct UploadSummaryDto {
    pub folder_name: Option<String>,
    /// Stored paths relative to the parent folder, sorted.
    pub stored: Vec<String>,
}

/// Body of a `422` response: messages keyed by form field.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationErrorsDto {
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl From<&UploadErrors> for ValidationErrorsDto {
    fn from(errors: &UploadErrors) -> Self {
        Self {
            message: "The given data was invalid.".to_string(),
            errors: errors.messages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use validator::ValidationError;

    use super::*;

    #[test]
    fn validation_errors_serialize_by_field() {
        let mut errors = UploadErrors::new();
        errors.add(
            "files.0",
            ValidationError::new("duplicate")
                .with_message(Cow::Borrowed("File \"a.txt\" already exists.")),
        );
        errors.add("folder_name", ValidationError::new("folder_name"));

        let json = serde_json::to_value(ValidationErrorsDto::from(&errors)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "message": "The given data was invalid.",
                "errors": {
                    "files.0": ["File \"a.txt\" already exists."],
                    "folder_name": ["folder_name"],
                }
            })
        );
    }
}
