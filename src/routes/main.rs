use actix_multipart::form::MultipartForm;
use actix_web::{HttpResponse, Responder, post, web};
use validator::Validate;

use crate::forms::main::{StoreFilesForm, UploadQueryParams};
use crate::models::auth::AuthenticatedUser;
use crate::routes::service_error_response;
use crate::services::files::FileService;

#[post("/files/upload")]
pub async fn upload_files(
    params: web::Query<UploadQueryParams>,
    user: AuthenticatedUser,
    file_service: web::Data<FileService>,
    MultipartForm(form): MultipartForm<StoreFilesForm>,
) -> impl Responder {
    if let Err(e) = params.validate() {
        log::warn!("Rejected upload query: {e:?}");
        return HttpResponse::BadRequest().body("Invalid parent folder");
    }

    match file_service.store_upload(&user, params.parent_id.as_deref(), form.into_batch()) {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(err) => service_error_response(&err),
    }
}
