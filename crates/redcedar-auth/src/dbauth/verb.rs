//! dbAuth verbs selected by the `method` query parameter.

use std::fmt;
use std::str::FromStr;

use http::Method;
use thiserror::Error;

/// An operation served by the dbAuth endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbAuthVerb {
    /// `login`
    Login,
    /// `logout`
    Logout,
    /// `signup`
    Signup,
    /// `forgotPassword`
    ForgotPassword,
    /// `getToken`
    GetToken,
    /// `resetPassword`
    ResetPassword,
    /// `validateResetToken`
    ValidateResetToken,
    /// `webAuthnRegOptions`
    WebAuthnRegOptions,
    /// `webAuthnRegister`
    WebAuthnRegister,
    /// `webAuthnAuthOptions`
    WebAuthnAuthOptions,
    /// `webAuthnAuthenticate`
    WebAuthnAuthenticate,
}

impl DbAuthVerb {
    /// Every verb, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Login,
        Self::Logout,
        Self::Signup,
        Self::ForgotPassword,
        Self::GetToken,
        Self::ResetPassword,
        Self::ValidateResetToken,
        Self::WebAuthnRegOptions,
        Self::WebAuthnRegister,
        Self::WebAuthnAuthOptions,
        Self::WebAuthnAuthenticate,
    ];

    /// Returns the canonical query-parameter spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Signup => "signup",
            Self::ForgotPassword => "forgotPassword",
            Self::GetToken => "getToken",
            Self::ResetPassword => "resetPassword",
            Self::ValidateResetToken => "validateResetToken",
            Self::WebAuthnRegOptions => "webAuthnRegOptions",
            Self::WebAuthnRegister => "webAuthnRegister",
            Self::WebAuthnAuthOptions => "webAuthnAuthOptions",
            Self::WebAuthnAuthenticate => "webAuthnAuthenticate",
        }
    }

    /// The HTTP method clients use for this verb.
    ///
    /// Only used for diagnostics; dispatch never rejects on method.
    #[must_use]
    pub fn http_method(self) -> Method {
        if self.reads_session() {
            Method::GET
        } else {
            Method::POST
        }
    }

    /// Returns `true` for verbs that act on the caller's existing session.
    #[must_use]
    pub const fn reads_session(self) -> bool {
        matches!(
            self,
            Self::GetToken | Self::WebAuthnRegOptions | Self::WebAuthnAuthOptions
        )
    }
}

impl fmt::Display for DbAuthVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `method` parameter names no known verb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dbAuth verb: {0}")]
pub struct UnknownVerb(pub String);

impl FromStr for DbAuthVerb {
    type Err = UnknownVerb;

    /// Parses a verb, ignoring ASCII case (`signUp` is `signup`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("signUp".parse::<DbAuthVerb>(), Ok(DbAuthVerb::Signup));
        assert_eq!("LOGIN".parse::<DbAuthVerb>(), Ok(DbAuthVerb::Login));
        assert_eq!(
            "webauthnregoptions".parse::<DbAuthVerb>(),
            Ok(DbAuthVerb::WebAuthnRegOptions)
        );
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(
            "unsupportedVerb".parse::<DbAuthVerb>(),
            Err(UnknownVerb("unsupportedVerb".to_string()))
        );
        assert!("".parse::<DbAuthVerb>().is_err());
    }

    #[test]
    fn test_http_methods() {
        let get: Vec<_> = DbAuthVerb::ALL
            .into_iter()
            .filter(|verb| verb.http_method() == Method::GET)
            .collect();

        assert_eq!(
            get,
            vec![
                DbAuthVerb::GetToken,
                DbAuthVerb::WebAuthnRegOptions,
                DbAuthVerb::WebAuthnAuthOptions,
            ]
        );
    }

    #[test]
    fn test_display_round_trips() {
        for verb in DbAuthVerb::ALL {
            assert_eq!(verb.to_string().parse::<DbAuthVerb>(), Ok(verb));
        }
    }
}
