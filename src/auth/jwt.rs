use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use uuid::Uuid;

use super::{Claims, Role};
use crate::error::AppError;

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

pub fn now_unix() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

/// Opaque random token for refresh tokens and OAuth state.
pub fn random_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn encode_token(keys: &JwtKeys, claims: &Claims) -> Result<String, AppError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".into());

    encode(&header, claims, &keys.enc)
        .map_err(|err| AppError::internal_with_source("Token encoding failed", err))
}

pub fn decode_token(keys: &JwtKeys, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &keys.dec, &validation)?;
    Ok(data.claims)
}

pub fn make_access_claims(
    user_id: &Uuid,
    session_id: &Uuid,
    roles: Vec<Role>,
    ttl_secs: usize,
) -> Claims {
    let iat = now_unix();
    Claims {
        sub: user_id.to_string(),
        sid: session_id.to_string(),
        roles,
        iat,
        exp: iat + ttl_secs,
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::bad_request(format!("Invalid or expired token: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{JwtKeys, Role, decode_token, encode_token, make_access_claims, random_token};

    #[test]
    fn makes_claims_with_subject_session_and_ttl() {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let claims = make_access_claims(&user_id, &session_id, vec![Role::User], 60);

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.sid, session_id.to_string());
        assert_eq!(claims.roles, vec![Role::User]);
        assert_eq!(claims.exp.saturating_sub(claims.iat), 60);
    }

    #[test]
    fn encoded_token_decodes_with_same_secret() {
        let keys = JwtKeys::from_secret(b"unit-test-secret");
        let claims = make_access_claims(
            &Uuid::new_v4(),
            &Uuid::new_v4(),
            vec![Role::Admin, Role::User],
            600,
        );
        let token = encode_token(&keys, &claims).expect("token should encode");

        let decoded = decode_token(&keys, &token).expect("token should decode");
        assert_eq!(decoded, claims);
    }

    #[test]
    fn random_tokens_are_alphanumeric_and_distinct() {
        let first = random_token(32);
        let second = random_token(32);
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::from_secret(b"unit-test-secret");
        let mut claims = make_access_claims(&Uuid::new_v4(), &Uuid::new_v4(), vec![], 0);
        claims.iat -= 3_600;
        claims.exp = claims.iat + 60;
        let token = encode_token(&keys, &claims).expect("token should encode");

        let err = decode_token(&keys, &token).expect_err("expired token should fail");
        assert!(err.message().starts_with("Invalid or expired token:"));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let claims = make_access_claims(&Uuid::new_v4(), &Uuid::new_v4(), vec![Role::User], 600);
        let token = encode_token(&JwtKeys::from_secret(b"secret-a"), &claims).unwrap();

        assert!(decode_token(&JwtKeys::from_secret(b"secret-b"), &token).is_err());
    }
}
