//! Request identity resolution
//!
//! Turns the credentials on a request into a [`Principal`]. A missing or
//! invalid token yields [`Principal::Anonymous`]; a verified token whose
//! claims cannot describe a principal is a [`PolicyError`].

use tracing::debug;

use super::jwt::{
    extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator, AUTH_COOKIE,
};
use crate::policy::{Identity, PolicyError, Principal};

/// Credentials carried by a request
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub authorization: Option<&'a str>,
    pub cookie: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    /// Bearer header first, then the auth cookie
    pub fn token(&self) -> Option<&'a str> {
        extract_token_from_header(self.authorization)
            .or_else(|| extract_token_from_cookie(self.cookie, AUTH_COOKIE))
    }
}

/// Verified claims for a request, if any
pub fn verified_claims(jwt: &JwtValidator, credentials: Credentials<'_>) -> Option<Claims> {
    let token = credentials.token()?;
    let result = jwt.verify_token(token);
    if !result.valid {
        debug!(error = ?result.error, "Ignoring invalid token");
    }
    result.claims
}

/// Build the principal described by verified claims
pub fn principal_from_claims(claims: &Claims) -> Result<Principal, PolicyError> {
    if !is_object_id(&claims.sub) {
        return Err(PolicyError::MalformedPrincipal(format!(
            "token subject '{}' is not a user id",
            claims.sub
        )));
    }
    Identity::new(claims.sub.clone(), claims.role.privilege(), claims.house).map(Principal::User)
}

/// Resolve a request's principal straight from its credentials
pub fn resolve_principal(
    jwt: &JwtValidator,
    credentials: Credentials<'_>,
) -> Result<Principal, PolicyError> {
    match verified_claims(jwt, credentials) {
        Some(claims) => principal_from_claims(&claims),
        None => Ok(Principal::Anonymous),
    }
}

fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenInput;
    use crate::policy::{House, Role, UserRole};

    const USER_ID: &str = "652f1c0e9b1e8a0012345678";

    fn token(jwt: &JwtValidator, role: UserRole, house: House) -> String {
        jwt.generate_token(TokenInput {
            user_id: USER_ID.into(),
            username: "someone@kvs".into(),
            role,
            house,
        })
        .unwrap()
    }

    #[test]
    fn test_no_credentials_is_anonymous() {
        let jwt = JwtValidator::new_dev();
        let principal = resolve_principal(&jwt, Credentials::default()).unwrap();
        assert!(principal.is_anonymous());
    }

    #[test]
    fn test_invalid_token_is_anonymous() {
        let jwt = JwtValidator::new_dev();
        let credentials = Credentials {
            authorization: Some("Bearer not.a.token"),
            cookie: None,
        };
        assert!(resolve_principal(&jwt, credentials).unwrap().is_anonymous());
    }

    #[test]
    fn test_bearer_and_cookie() {
        let jwt = JwtValidator::new_dev();
        let bearer = format!("Bearer {}", token(&jwt, UserRole::Captain, House::Green));
        let principal = resolve_principal(
            &jwt,
            Credentials {
                authorization: Some(&bearer),
                cookie: None,
            },
        )
        .unwrap();
        assert_eq!(principal.role(), Some(Role::Student));
        assert_eq!(principal.house(), Some(House::Green));
        assert_eq!(principal.user_id(), Some(USER_ID));

        let cookie = format!("auth-token={}", token(&jwt, UserRole::Admin, House::None));
        let principal = resolve_principal(
            &jwt,
            Credentials {
                authorization: None,
                cookie: Some(&cookie),
            },
        )
        .unwrap();
        assert!(principal.is_admin());
    }

    #[test]
    fn test_houseless_teacher_is_malformed() {
        let jwt = JwtValidator::new_dev();
        let bearer = format!("Bearer {}", token(&jwt, UserRole::Teacher, House::None));
        let result = resolve_principal(
            &jwt,
            Credentials {
                authorization: Some(&bearer),
                cookie: None,
            },
        );
        assert!(matches!(result, Err(PolicyError::MalformedPrincipal(_))));
    }
}
