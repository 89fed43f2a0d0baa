use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::request::Request;

/// How a session proves its credentials during `/login`.
///
/// Devices differ by firmware generation; the session never guesses,
/// it is told which one to use.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum LoginMethod {
    /// `=password=<plain>` (current firmware).
    #[default]
    #[strum(serialize = "plaintext")]
    #[serde(rename = "plaintext")]
    Plaintext,
    /// `=response=<digest>` derived from the greeting challenge (legacy firmware).
    #[strum(serialize = "challenge")]
    #[serde(rename = "challenge")]
    ChallengeResponse,
}

/// Username and secret for one device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Derive the legacy login response for `challenge_hex`.
///
/// `"00"` followed by the lowercase hex MD5 of `0x00 ‖ password ‖ challenge`,
/// where `challenge` is the hex-decoded greeting value.
pub fn challenge_response(challenge_hex: &str, password: &SecretString) -> Result<String, Error> {
    let challenge = hex::decode(challenge_hex)
        .ok()
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| Error::Handshake {
            message: format!("challenge is not valid hex: {challenge_hex:?}"),
        })?;

    let mut hasher = Md5::new();
    hasher.update([0u8]);
    hasher.update(password.expose_secret().as_bytes());
    hasher.update(&challenge);
    let digest = hasher.finalize();

    Ok(format!("00{}", hex::encode(digest)))
}

/// Build the `/login` command for the given method.
///
/// `challenge` is the greeting's `=ret=` value; it is required for
/// [`LoginMethod::ChallengeResponse`].
pub fn login_request(
    credentials: &Credentials,
    method: LoginMethod,
    challenge: Option<&str>,
) -> Result<Request, Error> {
    let request = Request::new("/login").attribute("name", &credentials.username);
    match method {
        LoginMethod::Plaintext => {
            Ok(request.attribute("password", credentials.password.expose_secret()))
        }
        LoginMethod::ChallengeResponse => {
            let challenge = challenge.ok_or_else(|| Error::Handshake {
                message: "greeting carried no challenge".into(),
            })?;
            let response = challenge_response(challenge, &credentials.password)?;
            Ok(request.attribute("response", response))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn known_digests() {
        assert_eq!(
            challenge_response("0123456789abcdef", &secret("secret")).unwrap(),
            "00dd0f78b68041388e9838a3644c1a8a7c"
        );
        assert_eq!(
            challenge_response("0123456789abcdef", &secret("")).unwrap(),
            "005f4227ca086d638ddecc10ce85ccfea2"
        );
        assert_eq!(
            challenge_response("a1b2c3d4e5f60718", &secret("admin")).unwrap(),
            "00562542e0e71f3e2e0e60bdb7354e73bb"
        );
    }

    #[test]
    fn uppercase_challenge_is_accepted() {
        assert_eq!(
            challenge_response("0123456789ABCDEF", &secret("secret")).unwrap(),
            challenge_response("0123456789abcdef", &secret("secret")).unwrap()
        );
    }

    #[test]
    fn bad_challenge_is_a_handshake_error() {
        for bad in ["", "abc", "zz00", "0123456789abcdeg"] {
            let err = challenge_response(bad, &secret("x")).unwrap_err();
            assert!(matches!(err, Error::Handshake { .. }), "{bad}: {err:?}");
        }
    }

    #[test]
    fn plaintext_login_words() {
        let creds = Credentials::new("admin", "pw");
        let request = login_request(&creds, LoginMethod::Plaintext, Some("00ff")).unwrap();
        assert_eq!(
            request.to_sentence().words(),
            ["/login", "=name=admin", "=password=pw"]
        );
    }

    #[test]
    fn challenge_login_requires_a_challenge() {
        let creds = Credentials::new("admin", "admin");
        assert!(login_request(&creds, LoginMethod::ChallengeResponse, None).is_err());

        let request =
            login_request(&creds, LoginMethod::ChallengeResponse, Some("a1b2c3d4e5f60718"))
                .unwrap();
        assert_eq!(
            request.to_sentence().attribute("response"),
            Some("00562542e0e71f3e2e0e60bdb7354e73bb")
        );
    }

    #[test]
    fn login_method_parses_from_config_strings() {
        assert_eq!(
            "challenge".parse::<LoginMethod>().unwrap(),
            LoginMethod::ChallengeResponse
        );
        assert_eq!(LoginMethod::Plaintext.to_string(), "plaintext");
    }
}
