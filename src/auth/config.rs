use std::fmt;

use crate::auth::{AuthError, AuthResult};

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Upper bound for either token lifetime: ten years.
const MAX_TOKEN_TTL_SECS: i64 = 3650 * SECS_PER_DAY;

/// Authentication configuration loaded once from environment variables and
/// handed to the token issuer, the auth service and the cookie helpers.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub token_leeway_secs: u64,
    pub access_cookie_name: String,
    pub refresh_cookie_name: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    /// Passwords must be strictly longer than this many characters.
    pub password_min_length: usize,
    pub revoke_sessions_on_password_change: bool,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_token_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("ACCESS_TOKEN_SECRET is required".into()))?;
        let refresh_token_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("REFRESH_TOKEN_SECRET is required".into()))?;
        let access_token_ttl_secs = duration_var("ACCESS_TOKEN_EXPIRY", 15 * 60)?;
        let refresh_token_ttl_secs = duration_var("REFRESH_TOKEN_EXPIRY", 10 * 24 * 60 * 60)?;
        let token_leeway_secs = number_var("TOKEN_LEEWAY_SECS", 30u64)?;
        let access_cookie_name =
            std::env::var("ACCESS_COOKIE_NAME").unwrap_or_else(|_| "accessToken".into());
        let refresh_cookie_name =
            std::env::var("REFRESH_COOKIE_NAME").unwrap_or_else(|_| "refreshToken".into());
        let cookie_domain = std::env::var("COOKIE_DOMAIN").ok();
        let cookie_secure = flag_var("COOKIE_SECURE", true);
        let password_min_length = number_var("PASSWORD_MIN_LENGTH", 10usize)?;
        let revoke_sessions_on_password_change =
            flag_var("REVOKE_SESSIONS_ON_PASSWORD_CHANGE", true);

        let config = Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            token_leeway_secs,
            access_cookie_name,
            refresh_cookie_name,
            cookie_domain,
            cookie_secure,
            password_min_length,
            revoke_sessions_on_password_change,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.access_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            return Err(AuthError::Config("token expiry must be positive".into()));
        }
        if self.access_token_ttl_secs > MAX_TOKEN_TTL_SECS
            || self.refresh_token_ttl_secs > MAX_TOKEN_TTL_SECS
        {
            return Err(AuthError::Config(format!(
                "token expiry must not exceed {} days",
                MAX_TOKEN_TTL_SECS / SECS_PER_DAY
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("token_leeway_secs", &self.token_leeway_secs)
            .field("access_cookie_name", &self.access_cookie_name)
            .field("refresh_cookie_name", &self.refresh_cookie_name)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_secure", &self.cookie_secure)
            .field("password_min_length", &self.password_min_length)
            .field(
                "revoke_sessions_on_password_change",
                &self.revoke_sessions_on_password_change,
            )
            .finish()
    }
}

fn flag_var(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
        .unwrap_or(default)
}

fn number_var<T: std::str::FromStr>(name: &str, default: T) -> AuthResult<T> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| AuthError::Config(format!("{name} is not a valid number: {value}"))),
        Err(_) => Ok(default),
    }
}

fn duration_var(name: &str, default_secs: i64) -> AuthResult<i64> {
    match std::env::var(name) {
        Ok(value) => parse_duration_secs(&value)
            .ok_or_else(|| AuthError::Config(format!("{name} is not a valid duration: {value}"))),
        Err(_) => Ok(default_secs),
    }
}

/// Parse `900`, `45s`, `15m`, `1h` or `10d` into seconds.
pub fn parse_duration_secs(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (digits, multiplier) = match value.char_indices().last()? {
        (idx, 's') => (&value[..idx], 1),
        (idx, 'm') => (&value[..idx], 60),
        (idx, 'h') => (&value[..idx], 60 * 60),
        (idx, 'd') => (&value[..idx], SECS_PER_DAY),
        _ => (value, 1),
    };
    digits
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_with_units() {
        assert_eq!(parse_duration_secs("900"), Some(900));
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("1h"), Some(3600));
        assert_eq!(parse_duration_secs("10d"), Some(864_000));
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("soon"), None);
        assert_eq!(parse_duration_secs("d"), None);
    }

    fn valid_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret-value".into(),
            refresh_token_secret: "refresh-secret-value".into(),
            access_token_ttl_secs: 60,
            refresh_token_ttl_secs: 600,
            token_leeway_secs: 0,
            access_cookie_name: "accessToken".into(),
            refresh_cookie_name: "refreshToken".into(),
            cookie_domain: None,
            cookie_secure: false,
            password_min_length: 10,
            revoke_sessions_on_password_change: true,
        }
    }

    #[test]
    fn rejects_expiry_beyond_the_representable_range() {
        let mut config = valid_config();
        config.refresh_token_ttl_secs =
            parse_duration_secs("100000000000d").expect("parses without overflow");
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let mut config = valid_config();
        config.access_token_ttl_secs = MAX_TOKEN_TTL_SECS + 1;
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let mut config = valid_config();
        config.refresh_token_ttl_secs = MAX_TOKEN_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        // SAFETY: the variable names are unique to this test.
        unsafe {
            std::env::set_var("ACCOUNT_TEST_LEEWAY", "thirty");
            std::env::set_var("ACCOUNT_TEST_MIN_LENGTH", " 12 ");
        }
        assert!(matches!(
            number_var("ACCOUNT_TEST_LEEWAY", 30u64),
            Err(AuthError::Config(_))
        ));
        assert_eq!(
            number_var("ACCOUNT_TEST_MIN_LENGTH", 10usize).expect("parses"),
            12
        );
        assert_eq!(
            number_var("ACCOUNT_TEST_UNSET_NUMBER", 10usize).expect("default"),
            10
        );
    }

    #[test]
    fn rejects_shared_secrets() {
        let config = AuthConfig {
            access_token_secret: "same".into(),
            refresh_token_secret: "same".into(),
            access_token_ttl_secs: 60,
            refresh_token_ttl_secs: 600,
            token_leeway_secs: 0,
            access_cookie_name: "accessToken".into(),
            refresh_cookie_name: "refreshToken".into(),
            cookie_domain: None,
            cookie_secure: false,
            password_min_length: 10,
            revoke_sessions_on_password_change: true,
        };
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = valid_config();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("access-secret-value"));
        assert!(!rendered.contains("refresh-secret-value"));
    }
}
