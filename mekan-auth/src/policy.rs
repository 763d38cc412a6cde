//! Write access policy for restaurant data
//!
//! Safe methods are open to everyone. Mutations require an authenticated
//! caller in the editors group. The same predicate runs once per request and
//! again once the target restaurant is resolved.

use actix_web::http::Method;

use mekan_common::error::{Error, Result};
use mekan_common::types::Restaurant;

use crate::middleware::Identity;

/// Group whose members may mutate restaurant data
pub const EDITOR_GROUP: &str = "editors";

/// Whether an HTTP method can change state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Safe,
    Mutating,
}

impl MethodKind {
    pub fn of(method: &Method) -> Self {
        if *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS {
            Self::Safe
        } else {
            Self::Mutating
        }
    }
}

/// Pure permission predicate over (method, identity, group membership)
pub fn permits(method: &Method, identity: &Identity) -> bool {
    match MethodKind::of(method) {
        MethodKind::Safe => true,
        MethodKind::Mutating => identity.in_group(EDITOR_GROUP),
    }
}

/// Request- and object-level permission checks
pub trait AccessPolicy: Send + Sync {
    fn has_permission(&self, method: &Method, identity: &Identity) -> bool;

    fn has_object_permission(
        &self,
        method: &Method,
        identity: &Identity,
        _restaurant: &Restaurant,
    ) -> bool {
        self.has_permission(method, identity)
    }

    /// Request-level check, mapping a refusal to 401 or 403
    fn authorize(&self, method: &Method, identity: &Identity) -> Result<()> {
        if self.has_permission(method, identity) {
            Ok(())
        } else {
            Err(denial(identity))
        }
    }

    /// Object-level check once the target is known
    fn authorize_object(
        &self,
        method: &Method,
        identity: &Identity,
        restaurant: &Restaurant,
    ) -> Result<()> {
        if self.has_object_permission(method, identity, restaurant) {
            Ok(())
        } else {
            Err(denial(identity))
        }
    }
}

fn denial(identity: &Identity) -> Error {
    if identity.is_authenticated() {
        Error::Forbidden
    } else {
        Error::Unauthorized
    }
}

/// Editors-only writes, open reads
#[derive(Debug, Clone, Copy, Default)]
pub struct EditorPolicy;

impl AccessPolicy for EditorPolicy {
    fn has_permission(&self, method: &Method, identity: &Identity) -> bool {
        permits(method, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::AuthContext;

    fn member_of(groups: &[&str]) -> Identity {
        Identity::Authenticated(AuthContext {
            user_id: "1".to_string(),
            username: None,
            groups: groups.iter().map(|g| (*g).to_string()).collect(),
        })
    }

    #[test]
    fn test_safe_methods_always_permitted() {
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert!(permits(&method, &Identity::Anonymous));
            assert!(permits(&method, &member_of(&[])));
        }
    }

    #[test]
    fn test_mutations_require_editor_group() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(!permits(&method, &Identity::Anonymous));
            assert!(!permits(&method, &member_of(&["reviewers"])));
            assert!(permits(&method, &member_of(&["reviewers", EDITOR_GROUP])));
        }
    }

    #[test]
    fn test_denial_distinguishes_anonymous_from_non_editor() {
        let policy = EditorPolicy;
        assert!(matches!(
            policy.authorize(&Method::POST, &Identity::Anonymous),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            policy.authorize(&Method::POST, &member_of(&[])),
            Err(Error::Forbidden)
        ));
        assert!(policy.authorize(&Method::POST, &member_of(&[EDITOR_GROUP])).is_ok());
    }

    #[test]
    fn test_object_check_matches_request_check() {
        let policy = EditorPolicy;
        let restaurant = Restaurant::new("Mikla", "mikla", 1);
        assert!(matches!(
            policy.authorize_object(&Method::DELETE, &member_of(&[]), &restaurant),
            Err(Error::Forbidden)
        ));
        assert!(policy
            .authorize_object(&Method::DELETE, &member_of(&[EDITOR_GROUP]), &restaurant)
            .is_ok());
        assert!(policy
            .authorize_object(&Method::GET, &Identity::Anonymous, &restaurant)
            .is_ok());
    }

    #[test]
    fn test_method_kind() {
        assert_eq!(MethodKind::of(&Method::GET), MethodKind::Safe);
        assert_eq!(MethodKind::of(&Method::PATCH), MethodKind::Mutating);
    }
}
