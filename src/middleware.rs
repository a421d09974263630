use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{self, Service, ServiceRequest, ServiceResponse, Transform},
    http::{StatusCode, header},
    web,
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

use crate::models::config::ServerConfig;

/// Sends browsers without a valid session to the auth service.
///
/// Requests that accept JSON (upload clients) keep the plain `401`.
pub struct RedirectUnauthorized;

impl<S, B> Transform<S, ServiceRequest> for RedirectUnauthorized
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RedirectUnauthorizedMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RedirectUnauthorizedMiddleware { service }))
    }
}

pub struct RedirectUnauthorizedMiddleware<S> {
    service: S,
}

fn wants_json(req: &ServiceRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

impl<S, B> Service<ServiceRequest> for RedirectUnauthorizedMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_service_url = match req.app_data::<web::Data<ServerConfig>>() {
            Some(config) => config.auth_service_url.clone(),
            None => {
                return Box::pin(async {
                    Err(actix_web::error::ErrorInternalServerError(
                        "Server config not found",
                    ))
                });
            }
        };
        let redirect = !wants_json(&req);

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;

            if redirect && res.status() == StatusCode::UNAUTHORIZED {
                let (req_parts, _) = res.into_parts();
                let redirect_response = HttpResponse::SeeOther()
                    .insert_header((header::LOCATION, auth_service_url))
                    .finish()
                    .map_into_right_body();

                return Ok(ServiceResponse::new(req_parts, redirect_response));
            }

            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            domain: "example.com".into(),
            address: "127.0.0.1".into(),
            port: 8080,
            auth_service_url: "https://auth.example.com".into(),
            secret: "secret".into(),
            upload_path: "./upload".into(),
        }
    }

    async fn unauthorized() -> HttpResponse {
        HttpResponse::Unauthorized().finish()
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn browser_requests_are_redirected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .wrap(RedirectUnauthorized)
                .route("/private", web::get().to(unauthorized))
                .route("/public", web::get().to(ok)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/private").to_request()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "https://auth.example.com"
        );

        let res = test::call_service(&app, test::TestRequest::get().uri("/public").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn json_clients_keep_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .wrap(RedirectUnauthorized)
                .route("/private", web::post().to(unauthorized)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/private")
            .insert_header((header::ACCEPT, "application/json"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
