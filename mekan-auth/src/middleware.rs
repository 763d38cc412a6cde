//! Request identity extraction from bearer tokens

use actix_web::HttpRequest;

use mekan_common::error::{Error, Result};
use mekan_common::types::TokenClaims;

use crate::jwt::JwtManager;

/// Authenticated caller attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub username: Option<String>,
    pub groups: Vec<String>,
}

impl AuthContext {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

impl From<TokenClaims> for AuthContext {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            groups: claims.groups,
        }
    }
}

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(AuthContext),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn context(&self) -> Option<&AuthContext> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(context) => Some(context),
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.context().is_some_and(|context| context.in_group(group))
    }

    /// Short label for logs
    pub fn describe(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated(context) => &context.user_id,
        }
    }
}

/// Resolve the caller's identity.
///
/// A missing `Authorization` header, or one using a scheme other than
/// `Bearer`, yields [`Identity::Anonymous`]. A `Bearer` header whose token
/// does not validate is an error on every request, reads included.
pub fn authenticate(req: &HttpRequest, jwt_manager: &JwtManager) -> Result<Identity> {
    match extract_token(req)? {
        None => Ok(Identity::Anonymous),
        Some(token) => {
            let claims = jwt_manager.validate_access_token(&token)?;
            Ok(Identity::Authenticated(AuthContext::from(claims)))
        }
    }
}

/// Extract bearer token from request
fn extract_token(req: &HttpRequest) -> Result<Option<String>> {
    let Some(header) = req.headers().get("authorization") else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| Error::InvalidToken)?;

    let mut parts = header.split_whitespace();
    match parts.next() {
        Some("Bearer") => {}
        _ => return Ok(None),
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token.to_string())),
        // "Bearer" alone, or a token containing spaces
        _ => Err(Error::InvalidToken),
    }
}
