//! Authentication: password hashing, signed session tokens, signup and login.

use crate::db::{Database, Owner, OwnerKind, OwnerStatus, now_timestamp, now_timestamp_millis};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a secure random signing secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Claims carried by a session token. The token is the only session state;
/// nothing is stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner ID the token is bound to.
    pub sub: String,
    /// Issued-at unix timestamp.
    pub iat: i64,
    /// Expiry unix timestamp.
    pub exp: i64,
}

/// Mints and verifies HMAC-SHA256 signed session tokens.
///
/// Token layout: `base64url(claims-json) . base64url(hmac)`.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    /// Create a signer from the shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Sign a token bound to `owner_id`, valid for `ttl_seconds`.
    pub fn sign(&self, owner_id: &str, ttl_seconds: i64) -> Result<String> {
        let now = now_timestamp();
        let claims = Claims {
            sub: owner_id.to_string(),
            iat: now,
            exp: now + ttl_seconds,
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Internal(format!("Failed to encode claims: {}", e)))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid token secret: {}", e)))?;
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload_b64, sig_b64))
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// Every failure mode collapses into `Unauthenticated` so callers cannot
    /// distinguish a malformed token from a forged or expired one.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let unauthorized = || AppError::Unauthenticated("Not authorized, token failed".to_string());

        let (payload_b64, sig_b64) = token.split_once('.').ok_or_else(unauthorized)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| unauthorized())?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid token secret: {}", e)))?;
        mac.update(payload_b64.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&sig).map_err(|_| unauthorized())?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| unauthorized())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| unauthorized())?;

        if claims.exp < now_timestamp() {
            return Err(unauthorized());
        }

        Ok(claims)
    }
}

/// Profile fields accepted at signup.
#[derive(Debug, Clone, Default)]
pub struct SignupProfile {
    /// Display name (required).
    pub name: String,
    /// Login email (required, unique).
    pub email: String,
    /// Plaintext password (required).
    pub password: String,
    /// Account kind: "author" or "bookstore" (required).
    pub kind: String,
    /// Store name.
    pub store_name: Option<String>,
    /// Biography.
    pub bio: Option<String>,
    /// WhatsApp contact number.
    pub whatsapp_number: Option<String>,
    /// Requested handle; derived from the email when absent.
    pub username: Option<String>,
}

/// Derive a username from an email's local-part: keep `[A-Za-z0-9_-]`,
/// lowercase, fall back to a timestamp token when nothing survives, and
/// always suffix a millisecond timestamp so a raw derived name is never
/// inserted bare (two signups deriving the same base must not collide).
pub fn derive_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>()
        .to_lowercase();

    let millis = now_timestamp_millis();
    if base.is_empty() {
        format!("user{}", millis)
    } else {
        format!("{}-{}", base, millis)
    }
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    signer: TokenSigner,
    session_days: u32,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, signer: TokenSigner, session_days: u32) -> Self {
        Self {
            db,
            signer,
            session_days,
        }
    }

    /// Session lifetime in seconds (cookie max-age and token expiry).
    pub fn session_seconds(&self) -> i64 {
        self.session_days as i64 * 24 * 60 * 60
    }

    /// Register a new owner. `profile_image` is the already-uploaded blob
    /// URL; the upload itself happens before this call and fails closed.
    ///
    /// The new record is always `pending` regardless of input. Email and
    /// username are pre-checked, and a storage-level UNIQUE violation from a
    /// lost race is translated to the same `Conflict` result.
    pub fn signup(&self, profile: SignupProfile, profile_image: Option<String>) -> Result<Owner> {
        if profile.name.is_empty() || profile.email.is_empty() || profile.password.is_empty() {
            return Err(AppError::Validation(
                "Missing required fields: name, email or password".to_string(),
            ));
        }
        if !profile.email.contains('@') {
            return Err(AppError::Validation("Invalid email".to_string()));
        }
        let kind = OwnerKind::parse(&profile.kind)?;

        if self.db.get_owner_by_email(&profile.email)?.is_some() {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }
        if let Some(ref username) = profile.username
            && self.db.get_owner_by_username(username)?.is_some()
        {
            return Err(AppError::Conflict("Username already in use".to_string()));
        }

        let username = match profile.username {
            Some(u) if !u.is_empty() => u,
            _ => derive_username(&profile.email),
        };

        let password_hash = hash_password(&profile.password)?;
        let now = now_timestamp();

        let owner = Owner {
            id: uuid::Uuid::new_v4().to_string(),
            name: profile.name,
            store_name: profile.store_name,
            email: profile.email,
            username: Some(username),
            password_hash,
            kind,
            bio: profile.bio,
            whatsapp_number: profile.whatsapp_number,
            profile_image,
            status: OwnerStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.db.create_owner(&owner)?;
        Ok(owner)
    }

    /// Authenticate by email and password and mint a session token.
    ///
    /// A lookup miss and a password mismatch return the same generic error.
    /// Correct credentials on a non-approved account are a distinct
    /// `Forbidden` and never produce a token.
    pub fn login(&self, email: &str, password: &str) -> Result<(Owner, String)> {
        let invalid = || AppError::Unauthenticated("Invalid credentials".to_string());

        let owner = self.db.get_owner_by_email(email)?.ok_or_else(invalid)?;

        if !verify_password(password, &owner.password_hash)? {
            return Err(invalid());
        }

        if owner.status != OwnerStatus::Approved {
            return Err(AppError::Forbidden("Account not approved yet".to_string()));
        }

        let token = self.signer.sign(&owner.id, self.session_seconds())?;
        Ok((owner, token))
    }

    /// Resolve a session token to a live owner.
    ///
    /// Identity is re-resolved on every call; a valid token whose owner was
    /// deleted since issuance fails with `Unauthenticated`. The returned
    /// owner carries no password hash.
    pub fn resolve(&self, token: &str) -> Result<Owner> {
        let claims = self.signer.verify(token)?;

        let mut owner = self.db.get_owner_by_id(&claims.sub)?.ok_or_else(|| {
            AppError::Unauthenticated("Not authorized, owner not found".to_string())
        })?;

        owner.password_hash.clear();
        Ok(owner)
    }

    /// Second gate: the resolved owner must be approved.
    pub fn ensure_approved(&self, owner: &Owner) -> Result<()> {
        if owner.status != OwnerStatus::Approved {
            return Err(AppError::Forbidden("Account not approved yet".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn token_roundtrip() {
        let signer = TokenSigner::new("secret-key");
        let token = signer.sign("owner-1", 3600).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.sub, "owner-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_rejected() {
        let signer = TokenSigner::new("secret-key");
        let token = signer.sign("owner-1", 3600).unwrap();

        let mut tampered = token.clone();
        tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        assert!(matches!(
            signer.verify(&tampered),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn token_signed_with_other_secret_rejected() {
        let token = TokenSigner::new("one").sign("owner-1", 3600).unwrap();
        assert!(TokenSigner::new("two").verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let signer = TokenSigner::new("secret-key");
        let token = signer.sign("owner-1", -10).unwrap();
        assert!(matches!(
            signer.verify(&token),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn garbage_token_rejected() {
        let signer = TokenSigner::new("secret-key");
        assert!(signer.verify("not-a-token").is_err());
        assert!(signer.verify("a.b.c").is_err());
        assert!(signer.verify("").is_err());
    }

    #[test]
    fn derive_username_sanitizes_local_part() {
        let name = derive_username("Jane.Doe+spam@example.com");
        // Dots and plus are stripped, result is lowercased.
        assert!(name.starts_with("janedoespam-"));
    }

    #[test]
    fn derive_username_keeps_underscore_and_hyphen() {
        let name = derive_username("a_b-c@example.com");
        assert!(name.starts_with("a_b-c-"));
    }

    #[test]
    fn derive_username_falls_back_on_empty_local_part() {
        let name = derive_username("....@example.com");
        assert!(name.starts_with("user"));
        assert!(name.len() > "user".len());
    }
}
