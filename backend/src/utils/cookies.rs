use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secure: config.cookie_secure,
            same_site: config.cookie_same_site,
        }
    }
}

/// Session cookie carrying the JWT for the server-rendered views.
pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const ACCESS_COOKIE_PATH: &str = "/";

pub fn build_auth_cookie(value: &str, max_age: Duration, options: CookieOptions) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
        ACCESS_COOKIE_NAME,
        value,
        ACCESS_COOKIE_PATH,
        max_age.as_secs(),
        same_site_value(options.same_site)
    );
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn build_clear_cookie(options: CookieOptions) -> String {
    let mut cookie = format!(
        "{}=; Path={}; Max-Age=0; HttpOnly; SameSite={}",
        ACCESS_COOKIE_NAME,
        ACCESS_COOKIE_PATH,
        same_site_value(options.same_site)
    );
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

fn same_site_value(same_site: SameSite) -> &'static str {
    match same_site {
        SameSite::Lax => "Lax",
        SameSite::Strict => "Strict",
        SameSite::None => "None",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_cookie_includes_security_attributes() {
        let opts = CookieOptions {
            secure: true,
            same_site: SameSite::Lax,
        };
        let cookie = build_auth_cookie("abc", Duration::from_secs(3600), opts);
        assert!(cookie.starts_with("access_token=abc"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let opts = CookieOptions {
            secure: false,
            same_site: SameSite::Strict,
        };
        let cookie = build_clear_cookie(opts);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn extract_cookie_value_finds_matching_name() {
        let header = "a=1; access_token=token-value; b=2";
        assert_eq!(
            extract_cookie_value(header, ACCESS_COOKIE_NAME).as_deref(),
            Some("token-value")
        );
        assert!(extract_cookie_value(header, "missing").is_none());
    }
}
