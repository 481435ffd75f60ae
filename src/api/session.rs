use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::LabError;
use crate::session::{Role, Session};

pub const USER_ID_HEADER: &str = "x-lab-user-id";
pub const ROLE_HEADER: &str = "x-lab-role";
pub const GROUP_ID_HEADER: &str = "x-lab-group-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Read the caller's session from request headers.
///
/// A present but unparsable group id is treated like a missing session.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    let user_id = header(headers, USER_ID_HEADER)?.parse().ok()?;
    let role: Role = header(headers, ROLE_HEADER)?.parse().ok()?;
    let group_id = match header(headers, GROUP_ID_HEADER) {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };
    Some(Session {
        user_id,
        role,
        group_id,
    })
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = LabError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers).ok_or(LabError::MissingSession)
    }
}
