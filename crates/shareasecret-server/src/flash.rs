//! One-shot notifications carried in cookies: set on one response, shown and
//! cleared on the next read.
//!
//! Cookies only ever hold a notice code. Messages live here, so a client
//! cannot make the server echo arbitrary text.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

const COOKIE_ERR: &str = "flash_err";
const COOKIE_SUCCESS: &str = "flash_success";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    SecretNotFound,
    SecretDeleted,
}

impl Notice {
    fn cookie_name(self) -> &'static str {
        match self {
            Self::SecretNotFound => COOKIE_ERR,
            Self::SecretDeleted => COOKIE_SUCCESS,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::SecretNotFound => "not_found",
            Self::SecretDeleted => "deleted",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "not_found" => Some(Self::SecretNotFound),
            "deleted" => Some(Self::SecretDeleted),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::SecretNotFound => "Secret does not exist or has been deleted.",
            Self::SecretDeleted => "Secret successfully deleted.",
        }
    }
}

/// Messages to show on the page being rendered.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Notifications {
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

/// Queue `notice` for the next page the client loads.
pub fn set(jar: CookieJar, notice: Notice) -> CookieJar {
    jar.add(
        Cookie::build((notice.cookie_name(), notice.code()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Read pending notices and expire their cookies in the same response.
pub fn take(jar: CookieJar) -> (CookieJar, Notifications) {
    let mut notes = Notifications::default();
    let mut jar = jar;
    for name in [COOKIE_ERR, COOKIE_SUCCESS] {
        let Some(code) = jar.get(name).map(|c| c.value().to_owned()) else {
            continue;
        };
        let message = Notice::from_code(&code)
            .filter(|n| n.cookie_name() == name)
            .map(Notice::message);
        if name == COOKIE_ERR {
            notes.error = message;
        } else {
            notes.success = message;
        }
        jar = jar.remove(Cookie::build(name).path("/"));
    }
    (jar, notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar_with(name: &'static str, value: &'static str) -> CookieJar {
        CookieJar::new().add(Cookie::new(name, value))
    }

    #[test]
    fn set_stores_code_not_message() {
        let jar = set(CookieJar::new(), Notice::SecretNotFound);
        let cookie = jar.get(COOKIE_ERR).unwrap();
        assert_eq!(cookie.value(), "not_found");
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn take_reads_then_clears() {
        let (jar, notes) = take(jar_with(COOKIE_SUCCESS, "deleted"));
        assert_eq!(notes.success, Some("Secret successfully deleted."));
        assert_eq!(notes.error, None);
        assert!(jar.get(COOKIE_SUCCESS).is_none());
    }

    #[test]
    fn take_ignores_unknown_or_misplaced_codes() {
        let (jar, notes) = take(jar_with(COOKIE_ERR, "<script>"));
        assert_eq!(notes, Notifications::default());
        assert!(jar.get(COOKIE_ERR).is_none());

        let (_, notes) = take(jar_with(COOKIE_ERR, "deleted"));
        assert_eq!(notes.error, None);
    }

    #[test]
    fn take_without_cookies_is_empty() {
        let (_, notes) = take(CookieJar::new());
        assert_eq!(notes, Notifications::default());
    }
}
