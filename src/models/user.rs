use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Avatar assigned to every new account
pub const AVATAR_PLACEHOLDER_URL: &str =
    "https://img.freepik.com/free-psd/3d-illustration-person-with-sunglasses_23-2149436188.jpg";

/// User model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub created_at: String,
    pub updated_at: String,
}

/// User response (without sensitive data)
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

/// Sign-up request
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Sign-in request
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign-in response; the token is also set as the `jwt` cookie
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Current authenticated user (extracted from JWT)
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
}

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub full_name: String,
    pub exp: usize,
    pub iat: usize,
}

/// Per-category usage bucket
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryUsage {
    pub size: i64,
    pub latest_date: Option<String>,
}

/// Storage usage summary for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct StorageSummary {
    pub document: CategoryUsage,
    pub image: CategoryUsage,
    pub video: CategoryUsage,
    pub audio: CategoryUsage,
    pub other: CategoryUsage,
    pub used: i64,
    pub all: i64,
}
