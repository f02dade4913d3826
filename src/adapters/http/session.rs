use crate::adapters::http::SharedState;
use crate::domain::model::UserId;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use crate::utils::error::{AppError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "chord_session";
/// cookie 有效期：31 天
const MAX_AGE_SECS: u64 = 31 * 24 * 60 * 60;

/// 以密鑰簽章的匿名使用者 cookie：`<uuid>.<HMAC-SHA256 hex>`
#[derive(Clone)]
pub struct SessionKeys {
    mac: HmacSha256,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::ConfigError {
            message: format!("invalid session secret: {}", e),
        })?;
        Ok(Self { mac })
    }

    fn mac_for(&self, user: &UserId) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(user.to_string().as_bytes());
        mac
    }

    pub fn sign(&self, user: &UserId) -> String {
        let tag = self.mac_for(user).finalize().into_bytes();
        format!("{}.{}", user, hex::encode(tag))
    }

    /// 驗證簽章 (常數時間比較)，成功時回傳使用者 id
    pub fn verify(&self, value: &str) -> Option<UserId> {
        let (id, tag) = value.split_once('.')?;
        let user = UserId::parse(id)?;
        let tag = hex::decode(tag).ok()?;
        self.mac_for(&user).verify_slice(&tag).ok().map(|_| user)
    }

    /// 從 `Cookie` 標頭中找出有效的 session
    pub fn user_from_cookie_header(&self, header: &str) -> Option<UserId> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == COOKIE_NAME)
            .find_map(|(_, value)| self.verify(value))
    }

    pub fn set_cookie_header(&self, user: &UserId) -> String {
        format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            COOKIE_NAME,
            self.sign(user),
            MAX_AGE_SECS
        )
    }
}

/// 為每個請求找出 (或發給) 使用者 id，放進 request extensions
pub async fn session_layer(State(state): State<SharedState>, mut request: Request, next: Next) -> Response {
    let existing = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| state.sessions.user_from_cookie_header(header));

    let (user, is_new) = match existing {
        Some(user) => (user, false),
        None => (UserId::generate(), true),
    };
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    tracing::debug!("{} {} -> {} (user {})", method, path, response.status(), user);

    if is_new {
        match HeaderValue::from_str(&state.sessions.set_cookie_header(&user)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Cannot encode session cookie: {}", e),
        }
    }
    response
}
