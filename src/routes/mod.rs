use actix_web::HttpResponse;

use crate::dto::ValidationErrorsDto;
use crate::services::ServiceError;

pub mod main;

/// Map a service failure onto the HTTP response returned to the client.
fn service_error_response(err: &ServiceError) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => HttpResponse::Unauthorized().finish(),
        ServiceError::Validation(errors) => {
            HttpResponse::UnprocessableEntity().json(ValidationErrorsDto::from(errors))
        }
        ServiceError::InvalidPath => HttpResponse::BadRequest().body(err.to_string()),
        ServiceError::Lookup(_)
        | ServiceError::StorageSetup(_)
        | ServiceError::CreateFolder(_)
        | ServiceError::SaveFile(_) => {
            log::error!("Upload failed: {err:?}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
