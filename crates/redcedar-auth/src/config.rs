//! Provider configuration.
//!
//! Both configurations can be built in code or read from the environment.
//! `from_env` goes through `dotenvy`, so a `.env` file in the working
//! directory is honoured.
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `SESSION_SECRET` | dbAuth session decryption |
//! | `SUPABASE_URL` | Supabase project ref (cookie name) |
//! | `SUPABASE_JWT_SECRET` | Supabase token verification |
//! | `SUPABASE_KEY` | Supabase anon key (optional) |

use url::Url;

use crate::error::{ConfigResult, ConfigurationError};

/// Environment variable holding the dbAuth session secret.
pub const SESSION_SECRET_VAR: &str = "SESSION_SECRET";
/// Environment variable holding the Supabase project URL.
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the Supabase JWT secret.
pub const SUPABASE_JWT_SECRET_VAR: &str = "SUPABASE_JWT_SECRET";
/// Environment variable holding the Supabase anon key.
pub const SUPABASE_KEY_VAR: &str = "SUPABASE_KEY";

/// Cookie naming which provider issued the session.
pub const AUTH_PROVIDER_COOKIE: &str = "auth-provider";

/// Placeholder replaced by the web port in cookie name templates.
pub const PORT_PLACEHOLDER: &str = "%port%";

/// Minimum session secret length in bytes (AES-256 key).
pub const MIN_SESSION_SECRET_LEN: usize = 32;

fn env_var(name: &str) -> Option<String> {
    dotenvy::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// dbAuth provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbAuthConfig {
    /// Session cookie name; `%port%` is replaced by [`web_port`](Self::web_port).
    pub cookie_name: String,
    /// Port substituted into the cookie name.
    pub web_port: u16,
    /// Path prefix of the dbAuth endpoints.
    pub endpoint_prefix: String,
    /// Secret used to decrypt session cookies.
    pub session_secret: Option<String>,
}

impl Default for DbAuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: format!("session_{PORT_PLACEHOLDER}"),
            web_port: 8911,
            endpoint_prefix: "/middleware/dbauth".to_string(),
            session_secret: None,
        }
    }
}

impl DbAuthConfig {
    /// Returns a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> DbAuthConfigBuilder {
        DbAuthConfigBuilder::default()
    }

    /// Reads `SESSION_SECRET` on top of the defaults.
    pub fn from_env() -> ConfigResult<Self> {
        let session_secret = env_var(SESSION_SECRET_VAR)
            .ok_or_else(|| ConfigurationError::missing_var(SESSION_SECRET_VAR))?;

        Self::builder().session_secret(session_secret).build()
    }

    /// Returns the session cookie name with the port filled in.
    #[must_use]
    pub fn resolved_cookie_name(&self) -> String {
        self.cookie_name
            .replace(PORT_PLACEHOLDER, &self.web_port.to_string())
    }

    /// Returns the AES-256 key derived from the session secret.
    pub fn session_key(&self) -> ConfigResult<[u8; 32]> {
        let secret = self
            .session_secret
            .as_deref()
            .ok_or_else(|| ConfigurationError::missing_var(SESSION_SECRET_VAR))?;

        secret
            .as_bytes()
            .get(..MIN_SESSION_SECRET_LEN)
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .ok_or_else(|| {
                ConfigurationError::invalid_value(
                    "session_secret",
                    format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
                )
            })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "cookie_name",
                "must not be empty",
            ));
        }
        if !self.endpoint_prefix.starts_with('/') {
            return Err(ConfigurationError::invalid_value(
                "endpoint_prefix",
                "must start with '/'",
            ));
        }
        if self.session_secret.is_some() {
            self.session_key()?;
        }
        Ok(())
    }
}

/// Builder for [`DbAuthConfig`].
#[derive(Debug, Clone, Default)]
pub struct DbAuthConfigBuilder {
    config: DbAuthConfig,
}

impl DbAuthConfigBuilder {
    /// Sets the session cookie name (may contain `%port%`).
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    /// Sets the web port used in the cookie name.
    #[must_use]
    pub fn web_port(mut self, port: u16) -> Self {
        self.config.web_port = port;
        self
    }

    /// Sets the dbAuth endpoint prefix.
    #[must_use]
    pub fn endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.endpoint_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the session secret.
    #[must_use]
    pub fn session_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.session_secret = Some(secret.into());
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ConfigResult<DbAuthConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Supabase provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://example.supabase.co`.
    pub url: Url,
    /// Secret used to verify access tokens.
    pub jwt_secret: Option<String>,
    /// Anon key, passed through to applications that need it.
    pub anon_key: Option<String>,
    /// Expected `aud` claim.
    pub audience: String,
    /// Path prefix of the Supabase middleware endpoints.
    pub endpoint_prefix: String,
}

impl SupabaseConfig {
    /// Returns a builder for the given project URL.
    pub fn builder(url: &str) -> ConfigResult<SupabaseConfigBuilder> {
        let url = Url::parse(url).map_err(|e| {
            ConfigurationError::invalid_value("supabase_url", e.to_string())
        })?;

        Ok(SupabaseConfigBuilder {
            config: Self {
                url,
                jwt_secret: None,
                anon_key: None,
                audience: "authenticated".to_string(),
                endpoint_prefix: "/middleware/supabase".to_string(),
            },
        })
    }

    /// Reads `SUPABASE_URL`, `SUPABASE_JWT_SECRET` and `SUPABASE_KEY`.
    pub fn from_env() -> ConfigResult<Self> {
        let url = env_var(SUPABASE_URL_VAR)
            .ok_or_else(|| ConfigurationError::missing_var(SUPABASE_URL_VAR))?;
        let jwt_secret = env_var(SUPABASE_JWT_SECRET_VAR)
            .ok_or_else(|| ConfigurationError::missing_var(SUPABASE_JWT_SECRET_VAR))?;

        let mut builder = Self::builder(&url)?.jwt_secret(jwt_secret);
        if let Some(key) = env_var(SUPABASE_KEY_VAR) {
            builder = builder.anon_key(key);
        }
        builder.build()
    }

    /// Returns the project ref: the first label of the project host.
    pub fn project_ref(&self) -> ConfigResult<String> {
        self.url
            .host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigurationError::invalid_value("supabase_url", "URL has no host"))
    }

    /// Returns the session cookie name, `sb-<project_ref>-auth-token`.
    pub fn session_cookie_name(&self) -> ConfigResult<String> {
        Ok(format!("sb-{}-auth-token", self.project_ref()?))
    }
}

/// Builder for [`SupabaseConfig`].
#[derive(Debug, Clone)]
pub struct SupabaseConfigBuilder {
    config: SupabaseConfig,
}

impl SupabaseConfigBuilder {
    /// Sets the JWT secret.
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Sets the anon key.
    #[must_use]
    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.config.anon_key = Some(key.into());
        self
    }

    /// Sets the expected `aud` claim.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = audience.into();
        self
    }

    /// Sets the endpoint prefix.
    #[must_use]
    pub fn endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.endpoint_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ConfigResult<SupabaseConfig> {
        self.config.project_ref()?;
        if self.config.jwt_secret.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigurationError::invalid_value(
                "jwt_secret",
                "must not be empty",
            ));
        }
        Ok(self.config)
    }
}
