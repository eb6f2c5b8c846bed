use actix_web::{web, HttpResponse, Result};
use log::{error, info, warn};

use crate::db::models::NewUser;
use crate::db::{RepositoryError, UserRepository};

use super::jwt::JwtService;
use super::middleware::AuthenticatedUser;
use super::models::{AuthResponse, AuthUser, ChangePasswordRequest, LoginRequest, RegisterRequest};
use super::password::{PasswordError, PasswordHasher};

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_json(error: impl Into<String>) -> ErrorResponse {
    ErrorResponse { error: error.into() }
}

const INVALID_CREDENTIALS: &str = "Invalid email or password";

async fn hash_blocking(hasher: &PasswordHasher, password: String) -> Result<Result<String, PasswordError>> {
    let hasher = hasher.clone();
    Ok(web::block(move || hasher.hash(&password)).await?)
}

async fn verify_blocking(hasher: &PasswordHasher, password: String, stored: String) -> Result<bool> {
    let hasher = hasher.clone();
    let verified = web::block(move || hasher.verify(&password, &stored)).await?;
    Ok(verified.unwrap_or_else(|e| {
        error!("Stored password hash could not be read: {}", e);
        false
    }))
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

pub async fn register(
    body: web::Json<RegisterRequest>,
    users: web::Data<UserRepository>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse> {
    let RegisterRequest { name, email, password } = body.into_inner();

    if name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(error_json("Name is required")));
    }
    if !looks_like_email(&email) {
        return Ok(HttpResponse::BadRequest().json(error_json("A valid email is required")));
    }

    let password_hash = match hash_blocking(&hasher, password).await? {
        Ok(hash) => hash,
        Err(e) => return Ok(HttpResponse::BadRequest().json(error_json(e.to_string()))),
    };

    match users.create(&NewUser { name, email, password_hash }).await {
        Ok(user) => {
            info!("Registered user {}", user.email);
            Ok(HttpResponse::Created().json(user.profile()))
        }
        Err(RepositoryError::EmailTaken) => {
            Ok(HttpResponse::Conflict().json(error_json("Email is already registered")))
        }
        Err(e) => {
            error!("Failed to register user: {:?}", e);
            Ok(HttpResponse::InternalServerError().json(error_json("Failed to register user")))
        }
    }
}

pub async fn login(
    body: web::Json<LoginRequest>,
    users: web::Data<UserRepository>,
    hasher: web::Data<PasswordHasher>,
    jwt_service: web::Data<JwtService>,
) -> Result<HttpResponse> {
    let LoginRequest { email, password } = body.into_inner();

    let user = match users.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Login attempt for unknown email");
            return Ok(HttpResponse::Unauthorized().json(error_json(INVALID_CREDENTIALS)));
        }
        Err(e) => {
            error!("Failed to look up user for login: {:?}", e);
            return Ok(HttpResponse::InternalServerError().json(error_json("Login failed")));
        }
    };

    if !verify_blocking(&hasher, password, user.password_hash.clone()).await? {
        warn!("Wrong password for user {}", user.id);
        return Ok(HttpResponse::Unauthorized().json(error_json(INVALID_CREDENTIALS)));
    }

    let token = match jwt_service.generate_token(&AuthUser::from(&user)) {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to generate JWT token: {:?}", e);
            return Ok(HttpResponse::InternalServerError()
                .json(error_json("Failed to generate authentication token")));
        }
    };

    info!("User logged in: {}", user.email);
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_service.expires_in_secs(),
        user: user.profile(),
    }))
}

pub async fn me(user: AuthenticatedUser, users: web::Data<UserRepository>) -> Result<HttpResponse> {
    match users.get_by_id(user.0).await {
        Ok(Some(found)) => Ok(HttpResponse::Ok().json(found.profile())),
        Ok(None) => {
            warn!("Token refers to unknown user {}", user.0);
            Ok(HttpResponse::Unauthorized().json(error_json("Unknown user")))
        }
        Err(e) => {
            error!("Failed to fetch user {}: {:?}", user.0, e);
            Ok(HttpResponse::InternalServerError().json(error_json("Failed to fetch user")))
        }
    }
}

pub async fn change_password(
    user: AuthenticatedUser,
    body: web::Json<ChangePasswordRequest>,
    users: web::Data<UserRepository>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse> {
    let ChangePasswordRequest {
        current_password,
        new_password,
    } = body.into_inner();

    let stored = match users.get_by_id(user.0).await {
        Ok(Some(found)) => found.password_hash,
        Ok(None) => return Ok(HttpResponse::Unauthorized().json(error_json("Unknown user"))),
        Err(e) => {
            error!("Failed to fetch user {}: {:?}", user.0, e);
            return Ok(HttpResponse::InternalServerError().json(error_json("Failed to change password")));
        }
    };

    if !verify_blocking(&hasher, current_password, stored).await? {
        return Ok(HttpResponse::Unauthorized().json(error_json("Current password is incorrect")));
    }

    let new_hash = match hash_blocking(&hasher, new_password).await? {
        Ok(hash) => hash,
        Err(e) => return Ok(HttpResponse::BadRequest().json(error_json(e.to_string()))),
    };

    match users.update_password(user.0, &new_hash).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => {
            error!("Failed to update password for {}: {:?}", user.0, e);
            Ok(HttpResponse::InternalServerError().json(error_json("Failed to change password")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@b.co"));
        assert!(looks_like_email(" guru@sekolah.sch.id "));
        assert!(!looks_like_email("nobody"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@localhost"));
        assert!(!looks_like_email("a b@c.de"));
    }
}
