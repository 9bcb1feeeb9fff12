/*!
 * Authentication
 *
 * - one-time codes for phone login, held in a TTL cache keyed by phone
 * - signed session tokens carrying the subject id and a role claim
 * - argon2 password hashing for admin accounts
 */

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{AdminUser, Role, User};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use moka::sync::Cache;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, warn};
use uuid::Uuid;

const OTP_CACHE_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn subject_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth("Invalid token subject".to_string()))
    }
}

/// Pending login codes. Issuing again for the same phone replaces the
/// previous code; entries vanish after the TTL.
#[derive(Clone)]
pub struct OtpStore {
    cache: Cache<String, String>,
}

impl OtpStore {
    pub fn new(ttl: StdDuration) -> Self {
        let cache = Cache::builder()
            .max_capacity(OTP_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn issue(&self, phone: &str) -> String {
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        self.cache.insert(phone.to_string(), code.clone());
        code
    }

    /// Consumes the stored code when it matches.
    pub fn verify(&self, phone: &str, code: &str) -> bool {
        let Some(expected) = self.cache.get(phone) else {
            return false;
        };
        if constant_time_eq::constant_time_eq(expected.as_bytes(), code.trim().as_bytes()) {
            self.cache.invalidate(phone);
            true
        } else {
            false
        }
    }

    pub fn discard(&self, phone: &str) {
        self.cache.invalidate(phone);
    }
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    db: Database,
    otp: OtpStore,
    user_token_ttl: Duration,
    admin_token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        jwt_secret: String,
        db: Database,
        otp_ttl: StdDuration,
        user_token_ttl_hours: i64,
        admin_token_ttl_hours: i64,
    ) -> Self {
        Self {
            jwt_secret,
            db,
            otp: OtpStore::new(otp_ttl),
            user_token_ttl: Duration::hours(user_token_ttl_hours),
            admin_token_ttl: Duration::hours(admin_token_ttl_hours),
        }
    }

    pub fn otp(&self) -> &OtpStore {
        &self.otp
    }

    // ------------------------------------------------------------------
    // Passwords
    // ------------------------------------------------------------------

    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Unknown email and wrong password answer the same way.
    pub async fn authenticate_admin(&self, email: &str, password: &str) -> AppResult<AdminUser> {
        let admin = match self.db.get_admin_by_email(email).await? {
            Some(admin) => admin,
            None => {
                warn!("Admin login for unknown email {}", email);
                return Err(AppError::Auth("Invalid credentials".to_string()));
            }
        };

        if !self.verify_password(password, &admin.password_hash)? {
            warn!("Admin login with wrong password for {}", email);
            return Err(AppError::Auth("Invalid credentials".to_string()));
        }
        Ok(admin)
    }

    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> AppResult<AdminUser> {
        if password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if self.db.get_admin_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Admin already exists".to_string()));
        }
        let password_hash = self.hash_password(password)?;
        self.db.create_admin(email, name, &password_hash, role).await
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    pub fn issue_user_token(&self, user: &User) -> AppResult<(String, DateTime<Utc>)> {
        self.sign(user.id, Role::User, self.user_token_ttl)
    }

    pub fn issue_admin_token(&self, admin: &AdminUser) -> AppResult<(String, DateTime<Utc>)> {
        self.sign(admin.id, admin.role, self.admin_token_ttl)
    }

    fn sign(&self, subject: Uuid, role: Role, ttl: Duration) -> AppResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires = now + ttl;
        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp: expires.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(signing_error)?;
        debug!("Issued {} token for {}", role, subject);

        Ok((token, expires))
    }

    /// Checks signature and expiry. Role checks belong to the caller.
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;

        Ok(token_data.claims)
    }
}

fn signing_error(err: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("Token signing failed: {}", err))
}
