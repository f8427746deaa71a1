use std::path::Path;

use reqwest::Url;

use crate::error::ConfigError;

/// Credential precedence: explicit `user` + `pass`, then a Bitcoin Core
/// cookie file, then no auth.
pub(super) fn resolve_auth(
    user: Option<&str>,
    pass: Option<&str>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, ConfigError> {
    match (user, pass) {
        (Some(u), Some(p)) => return Ok(Some((u.to_owned(), p.to_owned()))),
        (Some(_), None) | (None, Some(_)) => return Err(ConfigError::PartialCredentials),
        (None, None) => {}
    }

    let Some(cookie_file) = cookie_file else {
        return Ok(None);
    };

    let content =
        std::fs::read_to_string(cookie_file).map_err(|source| ConfigError::CookieUnreadable {
            path: cookie_file.to_owned(),
            source,
        })?;
    let malformed = || ConfigError::MalformedCookie(cookie_file.to_owned());

    let line = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(malformed)?;
    let (cookie_user, cookie_pass) = line.split_once(':').ok_or_else(malformed)?;
    if cookie_user.is_empty() || cookie_pass.is_empty() {
        return Err(malformed());
    }

    Ok(Some((cookie_user.to_owned(), cookie_pass.to_owned())))
}

/// Validate the node URL and return it without a trailing slash, so wallet
/// paths can be appended directly.
pub(super) fn parse_connection(connection: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(connection).map_err(|e| ConfigError::InvalidUrl {
        url: connection.to_owned(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(connection.trim_end_matches('/').to_owned()),
        other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_cookie(tag: &str, contents: &str) -> std::path::PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time must be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("corewire-{tag}-cookie-{unique}.txt"));
        fs::write(&path, contents).expect("cookie file must be writable");
        path
    }

    #[test]
    fn parse_connection_strips_trailing_slash() {
        let parsed = parse_connection("http://127.0.0.1:18443/").expect("should parse");
        assert_eq!(parsed, "http://127.0.0.1:18443");
    }

    #[test]
    fn parse_connection_invalid_scheme() {
        let err = parse_connection("ftp://example.com").expect_err("must reject ftp");
        assert!(err.to_string().contains("unsupported connection scheme"));
        assert!(matches!(
            parse_connection("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn resolve_auth_rejects_partial_credentials() {
        let err = resolve_auth(Some("user"), None, None).expect_err("must reject partial auth");
        assert!(err.to_string().contains("must be set together"));
    }

    #[test]
    fn explicit_credentials_win_over_cookie() {
        let missing = Path::new("/nonexistent/.cookie");
        let auth = resolve_auth(Some("alice"), Some("secret"), Some(missing))
            .expect("cookie is not read when credentials are given");
        assert_eq!(auth, Some(("alice".to_owned(), "secret".to_owned())));
        assert_eq!(resolve_auth(None, None, None).expect("no auth"), None);
    }

    #[test]
    fn resolve_auth_reads_cookie_file() {
        let cookie_path = temp_cookie("valid", "__cookie__:token\n");
        let auth = resolve_auth(None, None, Some(&cookie_path)).expect("cookie must parse");
        assert_eq!(auth, Some(("__cookie__".to_owned(), "token".to_owned())));
        let _ = fs::remove_file(cookie_path);
    }

    #[test]
    fn malformed_cookie_is_rejected() {
        let cookie_path = temp_cookie("malformed", "no-colon-here\n");
        let err = resolve_auth(None, None, Some(&cookie_path)).expect_err("malformed");
        assert!(matches!(err, ConfigError::MalformedCookie(_)));
        let _ = fs::remove_file(cookie_path);

        let err = resolve_auth(None, None, Some(Path::new("/nonexistent/.cookie")))
            .expect_err("unreadable");
        assert!(matches!(err, ConfigError::CookieUnreadable { .. }));
    }
}
