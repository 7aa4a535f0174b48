use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Claims, CurrentUser, SignInRequest, SignInResponse, SignUpRequest, User, UserResponse,
    AVATAR_PLACEHOLDER_URL,
};

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Create a new account
    pub async fn create_account(db: &Database, req: SignUpRequest) -> Result<UserResponse> {
        let email = req.email.trim().to_lowercase();
        let full_name = req.full_name.trim().to_string();

        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }

        if full_name.is_empty() {
            return Err(AppError::BadRequest("Full name is required".to_string()));
        }

        if req.password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(db.pool())
            .await?;

        if existing.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = Self::hash_password(&req.password)?;

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, email, password_hash, avatar, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&full_name)
        .bind(&email)
        .bind(&password_hash)
        .bind(AVATAR_PLACEHOLDER_URL)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(db.pool())
            .await?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(UserResponse::from(user))
    }

    /// Check credentials and issue an access token
    pub async fn sign_in(
        db: &Database,
        config: &Config,
        req: SignInRequest,
    ) -> Result<SignInResponse> {
        let email = req.email.trim().to_lowercase();

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.password_hash.is_empty() {
            return Err(AppError::BadRequest(
                "Account does not have a password. Please sign up again.".to_string(),
            ));
        }

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;

        Ok(SignInResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    /// Resolve a token to the user it was issued for
    pub async fn current_user(db: &Database, config: &Config, token: &str) -> Result<CurrentUser> {
        let claims = Self::validate_token(token, config)?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
        })
    }

    /// Generate access token (JWT)
    fn generate_access_token(user: &User, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(config.jwt.expire_minutes as i64);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate access token and extract claims
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid token".to_string()))
    }

    /// Hash password using Argon2
    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify password against hash
    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("Stored password hash is unreadable: {}", e);
                return Ok(false);
            }
        };

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
