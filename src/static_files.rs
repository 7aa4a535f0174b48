use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

use crate::middleware::auth::extract_token;
use crate::services::AuthService;
use crate::AppState;

/// Paths the page gate never looks at
const EXCLUDED_PREFIXES: [&str; 4] = ["/api", "/_next/static", "/_next/image", "/favicon.ico"];

/// Pages reachable without signing in
const PUBLIC_PAGES: [&str; 4] = ["/", "/sign-in", "/sign-up", "/landing"];

/// Decision of the page gate for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAccess {
    Pass,
    ToDashboard,
    ToSignIn,
}

/// Decide what happens to a page request
pub fn route_access(path: &str, authenticated: bool) -> PageAccess {
    if EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return PageAccess::Pass;
    }

    if path.starts_with("/share/") {
        return PageAccess::Pass;
    }

    let is_public = PUBLIC_PAGES.contains(&path);
    match (is_public, authenticated) {
        (true, true) => PageAccess::ToDashboard,
        (false, false) => PageAccess::ToSignIn,
        _ => PageAccess::Pass,
    }
}

/// Redirect page requests according to sign-in state
pub async fn page_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authenticated = extract_token(request.headers())
        .map(|token| AuthService::validate_token(&token, &state.config).is_ok())
        .unwrap_or(false);

    match route_access(request.uri().path(), authenticated) {
        PageAccess::Pass => next.run(request).await,
        PageAccess::ToDashboard => Redirect::temporary("/dashboard").into_response(),
        PageAccess::ToSignIn => Redirect::temporary("/sign-in").into_response(),
    }
}

/// Serve the built frontend, falling back to `index.html` for client-side routes
pub fn spa_service(web_root: &Path) -> ServeDir<ServeFile> {
    let index = web_root.join("index.html");
    ServeDir::new(web_root).fallback(ServeFile::new(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_paths_pass() {
        for path in ["/api/v1/files", "/_next/static/chunk.js", "/_next/image", "/favicon.ico"] {
            assert_eq!(route_access(path, false), PageAccess::Pass);
            assert_eq!(route_access(path, true), PageAccess::Pass);
        }
    }

    #[test]
    fn test_public_pages() {
        assert_eq!(route_access("/sign-in", false), PageAccess::Pass);
        assert_eq!(route_access("/", false), PageAccess::Pass);
        assert_eq!(route_access("/sign-up", true), PageAccess::ToDashboard);
        assert_eq!(route_access("/landing", true), PageAccess::ToDashboard);
    }

    #[test]
    fn test_private_pages() {
        assert_eq!(route_access("/dashboard", false), PageAccess::ToSignIn);
        assert_eq!(route_access("/documents", false), PageAccess::ToSignIn);
        assert_eq!(route_access("/dashboard", true), PageAccess::Pass);
    }

    #[test]
    fn test_share_pages_open_to_all() {
        assert_eq!(route_access("/share/abc123", false), PageAccess::Pass);
        assert_eq!(route_access("/share/abc123", true), PageAccess::Pass);
    }
}
