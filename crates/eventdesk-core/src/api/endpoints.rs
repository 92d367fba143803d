use super::transport::url_path;

/// Base URL used when neither config nor environment provide one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// Remote endpoint URLs, derived from the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub users: String,
}

impl Endpoints {
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            login: format!("{}/user/login", base),
            refresh: format!("{}/user/refresh", base),
            users: format!("{}/user", base),
        }
    }

    /// Whether `url` targets the login endpoint: same origin and path,
    /// query string ignored. Scheme and host compare case-insensitively.
    pub fn is_login(&self, url: &str) -> bool {
        origin(url).eq_ignore_ascii_case(origin(&self.login))
            && url_path(url) == url_path(&self.login)
    }

    pub fn user(&self, user_id: &str) -> String {
        format!("{}/{}", self.users, user_id)
    }

    pub fn user_events(&self, user_id: &str) -> String {
        format!("{}/{}/addEvent", self.users, user_id)
    }
}

/// `scheme://authority` of an absolute URL, empty for a relative one
fn origin(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => {
            let authority_end = url[idx + 3..]
                .find(['/', '?', '#'])
                .map(|end| idx + 3 + end)
                .unwrap_or(url.len());
            &url[..authority_end]
        }
        None => "",
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_base(DEFAULT_API_BASE_URL)
    }
}
