use std::future::{Ready, ready};

use actix_identity::Identity;
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::{Error, FromRequest, HttpRequest, dev::Payload, web::Data};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use crate::models::config::ServerConfig;

/// Claims issued by the auth service and carried in the identity cookie.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub sub: String, // subject (user ID)
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub exp: usize, // expiration as timestamp
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn from_jwt(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let validation = jsonwebtoken::Validation::default();
        let token_data = jsonwebtoken::decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &validation,
        )?;
        Ok(token_data.claims)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let identity = Identity::from_request(req, &mut Payload::None)
            .into_inner()
            .map(|i| i.id().ok());

        let server_config = match req.app_data::<Data<ServerConfig>>() {
            Some(config) => config,
            None => return ready(Err(ErrorInternalServerError("Server config not found"))),
        };

        if let Ok(Some(uid)) = identity {
            return match AuthenticatedUser::from_jwt(&uid, &server_config.secret) {
                Ok(claims) => ready(Ok(claims)),
                Err(err) => {
                    log::warn!("Rejected session token: {err}");
                    ready(Err(ErrorUnauthorized("Invalid user")))
                }
            };
        }
        ready(Err(ErrorUnauthorized("Unauthorized")))
    }
}
