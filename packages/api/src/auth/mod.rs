//! # Authentication: Argon2 passwords and signed bearer tokens
//!
//! - [`password`]: hashing and verification of stored credentials.
//! - [`token`]: HS256 access tokens issued at login and registration.
//!
//! Handlers take an [`AuthUser`] argument to require a valid token. Routes open to a
//! fixed set of roles take [`Authorized`] instead, which also checks the role before
//! the request body is read, so a caller with the wrong role always gets 403.

pub mod password;
pub mod token;

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use store::Role;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub use token::{Claims, TokenSigner};

pub const FAMILY: &[Role] = &[Role::Family];
pub const STAFF_OR_ADMIN: &[Role] = &[Role::FacilityStaff, Role::SystemAdmin];
pub const FAMILY_OR_ADMIN: &[Role] = &[Role::Family, Role::SystemAdmin];
pub const ADMIN: &[Role] = &[Role::SystemAdmin];

/// A set of roles a route admits, for use with [`Authorized`].
pub trait Roles: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

macro_rules! roles {
    ($($name:ident => $roles:expr),* $(,)?) => {
        $(
            pub struct $name;

            impl Roles for $name {
                const ROLES: &'static [Role] = $roles;
            }
        )*
    };
}

roles! {
    FamilyOnly => FAMILY,
    StaffOrAdmin => STAFF_OR_ADMIN,
    FamilyOrAdmin => FAMILY_OR_ADMIN,
    AdminOnly => ADMIN,
}

/// The caller, as asserted by a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::SystemAdmin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Second whitespace-separated part of the header, as in `Bearer <token>`.
fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)
            .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;
        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!("Rejected access token: {e}");
            ApiError::forbidden("Invalid or expired token")
        })?;
        Ok(claims.into())
    }
}

/// An [`AuthUser`] already checked against `R::ROLES`.
pub struct Authorized<R>(pub AuthUser, pub PhantomData<R>);

impl<R: Roles> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(R::ROLES)?;
        Ok(Self(user, PhantomData))
    }
}
