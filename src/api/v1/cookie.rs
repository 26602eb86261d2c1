use crate::settings::Cookie;
use std::time::Duration;

/// Builds `Set-Cookie` values for the refresh token: HttpOnly, SameSite=Lax,
/// scoped to the auth routes.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub enabled: bool,
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub max_age: Duration,
}

impl RefreshCookie {
    pub fn from_settings(cookie: &Cookie, max_age: Duration) -> Self {
        RefreshCookie {
            enabled: cookie.enabled,
            name: cookie.name.clone(),
            path: cookie.path.clone(),
            domain: cookie.domain.clone(),
            secure: cookie.secure,
            max_age,
        }
    }

    pub fn set(&self, token: &str) -> Option<String> {
        self.enabled
            .then(|| self.render(token, self.max_age.as_secs()))
    }

    pub fn clear(&self) -> Option<String> {
        self.enabled.then(|| self.render("", 0))
    }

    /// Extracts this cookie's value from a request `Cookie` header.
    pub fn read(&self, header: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    fn render(&self, value: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name, value, self.path, max_age_secs
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
