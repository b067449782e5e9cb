use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, HttpMessage, ResponseError,
};

use crate::errors::ServerError;

/// Opaque capability string taken from the `Authorization` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationToken(String);

impl AnnotationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<(), ServerError>;
}

/// Accepts every token as-is.
pub struct AcceptAny;

impl TokenVerifier for AcceptAny {
    fn verify(&self, _token: &str) -> Result<(), ServerError> {
        Ok(())
    }
}

pub struct Access {
    verifier: Box<dyn TokenVerifier>,
    enforce_ownership: bool,
}

impl Access {
    pub fn new(verifier: impl TokenVerifier + 'static, enforce_ownership: bool) -> Self {
        Access {
            verifier: Box::new(verifier),
            enforce_ownership,
        }
    }

    /// The owner a mutation must match, if ownership is enforced.
    pub fn owner_guard<'a>(&self, token: &'a AnnotationToken) -> Option<&'a str> {
        self.enforce_ownership.then(|| token.as_str())
    }
}

impl Default for Access {
    fn default() -> Self {
        Access::new(AcceptAny, false)
    }
}

/// Strips the first `Bearer` marker (with its trailing whitespace) and trims
/// the rest; anything else is taken verbatim.
pub fn bearer_token(raw: &str) -> String {
    for (start, marker) in raw.match_indices("Bearer") {
        let rest = &raw[start + marker.len()..];
        let trimmed = rest.trim_start();
        if trimmed.len() < rest.len() {
            return format!("{}{}", &raw[..start], trimmed).trim().to_owned();
        }
    }
    raw.trim().to_owned()
}

/// Rejects requests without an `Authorization` header and makes the token
/// available to handlers as [`AnnotationToken`].
pub async fn authorize<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|raw| bearer_token(&String::from_utf8_lossy(raw.as_bytes())));
    let Some(token) = token else {
        return Ok(reject(req, ServerError::Unauthorized));
    };

    if let Some(access) = req.app_data::<web::Data<Access>>() {
        if let Err(err) = access.verifier.verify(&token) {
            log::debug!("token rejected: {err}");
            return Ok(reject(req, err));
        }
    }

    req.extensions_mut().insert(AnnotationToken(token));
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

fn reject<B>(req: ServiceRequest, err: ServerError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(err.error_response()).map_into_right_body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bearer_prefix() {
        assert_eq!(bearer_token("Bearer abc123"), "abc123");
        assert_eq!(bearer_token("Bearer \t  abc123  "), "abc123");
    }

    #[test]
    fn other_shapes_are_verbatim() {
        assert_eq!(bearer_token("abc123"), "abc123");
        assert_eq!(bearer_token("Basic dXNlcg=="), "Basic dXNlcg==");
        assert_eq!(bearer_token("Bearerabc"), "Bearerabc");
        assert_eq!(bearer_token("bearer abc"), "bearer abc");
        assert_eq!(bearer_token(""), "");
        assert_eq!(bearer_token("Bearer "), "");
    }

    #[test]
    fn only_first_marker_is_removed() {
        assert_eq!(bearer_token("Bearer Bearer x"), "Bearer x");
        assert_eq!(bearer_token("BearerX Bearer y"), "BearerX y");
    }

    #[test]
    fn owner_guard_follows_policy() {
        let token = AnnotationToken("tok1".to_owned());
        assert_eq!(Access::default().owner_guard(&token), None);
        assert_eq!(Access::new(AcceptAny, true).owner_guard(&token), Some("tok1"));
    }
}
