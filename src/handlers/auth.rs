use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::{ApiResponse, Result};
use crate::middleware::auth::AUTH_COOKIE;
use crate::models::{SignInRequest, SignUpRequest};
use crate::services::AuthService;
use crate::AppState;

/// Create an account
/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::create_account(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// Sign in and set the `jwt` cookie
/// POST /api/v1/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse> {
    let response = AuthService::sign_in(&state.db, &state.config, req).await?;

    let cookie = Cookie::build((AUTH_COOKIE, response.access_token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.jwt.cookie_secure)
        .path("/")
        .build();

    Ok((jar.add(cookie), Json(ApiResponse::success(response))))
}

/// Remove the `jwt` cookie
/// POST /api/v1/auth/sign-out
pub async fn sign_out(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((AUTH_COOKIE, "")).path("/"));
    (jar, Json(ApiResponse::<()>::success_message("Signed out")))
}
