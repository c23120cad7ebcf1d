use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Access level of a registered user.
///
/// A closed enumeration checked at the authorization boundary; admin status
/// is never a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// A registered application user.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Email address (unique identifier for the user)
    pub email: String,

    /// Display name shown in the dashboard
    pub username: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Access level
    pub role: Role,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// Credential data for login and registration forms.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,

    /// Display name (optional for login, required for registration)
    #[serde(default)]
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// An authenticated requester, injected by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User session data.
#[derive(Debug, Clone)]
pub struct Session {
    pub email: String,
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

// Constants
pub const DATABASE_DIR: &str = "database";
const USERS_FILE: &str = "database/users.json";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Initialize the database structure.
///
/// Creates the database directory and users file if they don't exist.
/// This should be called before any other database operations.
pub fn init_database() -> std::io::Result<()> {
    if !std::path::Path::new(DATABASE_DIR).exists() {
        create_dir_all(DATABASE_DIR)?;
    }

    let users_path = std::path::Path::new(USERS_FILE);
    if !users_path.exists() {
        let mut file = File::create(users_path)?;
        file.write_all(b"{}")?;
    }

    Ok(())
}

/// Read the users file into a map keyed by email.
pub fn get_users() -> Result<HashMap<String, User>, String> {
    let contents =
        std::fs::read_to_string(USERS_FILE).map_err(|_| "Failed to read users file".to_string())?;

    serde_json::from_str(&contents).map_err(|_| "Failed to parse users data".to_string())
}

/// Write the users map back to disk.
pub fn save_users(users: &HashMap<String, User>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(users)
        .map_err(|_| "Failed to serialize users data".to_string())?;

    std::fs::write(USERS_FILE, json).map_err(|_| "Failed to write users file".to_string())
}

/// Register a new user account.
///
/// The password is hashed before storage; every new account starts with
/// [`Role::User`] and can only be promoted through the admin workflow.
///
/// # Errors
/// * Returns an error if any field is empty or the email is already registered
pub fn register_user(email: &str, username: &str, password: &str) -> Result<(), String> {
    if email.is_empty() || username.is_empty() || password.is_empty() {
        return Err("Email, username and password cannot be empty".to_string());
    }

    let mut users = get_users()?;
    if users.contains_key(email) {
        return Err("Email address is already registered".to_string());
    }

    let password_hash = hash_password(password)?;

    let user_dir = std::path::Path::new(DATABASE_DIR).join(email);
    if create_dir_all(&user_dir).is_err() {
        return Err("Failed to create user directory".to_string());
    }

    let user = User {
        email: email.to_string(),
        username: username.to_string(),
        password_hash,
        role: Role::User,
        created_at: Utc::now(),
    };

    users.insert(email.to_string(), user);
    save_users(&users)?;

    Ok(())
}

/// Check whether the provided email and password match a registered user.
pub fn verify_user(email: &str, password: &str) -> Result<bool, String> {
    let users = get_users()?;

    if let Some(user) = users.get(email) {
        verify_password(password, &user.password_hash)
    } else {
        Ok(false)
    }
}

/// Look up a user's role; unknown users read as plain users.
pub fn user_role(email: &str) -> Role {
    get_users()
        .ok()
        .and_then(|users| users.get(email).map(|u| u.role))
        .unwrap_or(Role::User)
}

/// Hash a password with Argon2id and a fresh random salt.
pub(crate) fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a plaintext password against a stored Argon2 hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| "Invalid password hash format".to_string())?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a new session for an authenticated user.
///
/// # Returns
/// * `String` - A unique session ID for the cookie
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        email: email.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session, returning the email if it exists and has not expired.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.email.clone());
        }
    }

    None
}

/// Drop a session (logout).
pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

#[cfg(test)]
pub(crate) fn expire_session_for_test(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    if let Some(session) = sessions.get_mut(session_id) {
        session.expires_at = SystemTime::now() - Duration::from_secs(1);
    }
}

// Web handlers

/// Serve the login page HTML.
pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Serve the signup page HTML.
pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

/// Handle login form submissions: validate credentials and set the session
/// cookie on success.
pub async fn handle_login(jar: CookieJar, Form(credentials): Form<UserCredentials>) -> Response {
    match verify_user(&credentials.email, &credentials.password) {
        Ok(true) => {
            let session_id = create_session(&credentials.email);
            let cookie = Cookie::new("session", session_id);
            (jar.add(cookie), Redirect::to("/dashboard")).into_response()
        }
        Ok(false) => (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response(),
    }
}

/// Handle signup form submissions and create a new user account.
pub async fn handle_signup(
    Form(credentials): Form<UserCredentials>,
) -> Result<Redirect, (StatusCode, String)> {
    match register_user(
        &credentials.email,
        &credentials.username,
        &credentials.password,
    ) {
        Ok(_) => Ok(Redirect::to("/login?registered=true")),
        Err(e) => Err((StatusCode::BAD_REQUEST, e)),
    }
}

/// Clear the session and send the user back to the login page.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get("session") {
        destroy_session(cookie.value());
    }

    let cookie = Cookie::new("session", "");
    (jar.add(cookie), Redirect::to("/login"))
}

/// Authentication middleware.
///
/// Requests with a valid session get an [`AuthUser`] inserted into their
/// extensions; everything else is redirected to the login page.
pub async fn require_auth(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get("session") {
        if let Some(email) = validate_session(session_cookie.value()) {
            let role = user_role(&email);
            request.extensions_mut().insert(AuthUser { email, role });
            return next.run(request).await;
        }
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn invalid_hash_format_is_an_error() {
        assert!(verify_password("whatever", "not-a-phc-string").is_err());
    }

    #[test]
    fn session_lifecycle() {
        let id = create_session("user@example.com");
        assert_eq!(validate_session(&id), Some("user@example.com".to_string()));

        destroy_session(&id);
        assert_eq!(validate_session(&id), None);
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let id = create_session("stale@example.com");
        expire_session_for_test(&id);
        assert_eq!(validate_session(&id), None);
    }

    #[test]
    fn unknown_session_is_rejected() {
        assert_eq!(validate_session("no-such-session"), None);
    }

    #[test]
    fn role_serializes_as_lowercase_string() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"user\"").unwrap(),
            Role::User
        );
    }
}
