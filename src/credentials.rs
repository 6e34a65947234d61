//! Test credential generation.
//!
//! The throwaway database role the probe provisions uses a password
//! generated once at process start and reused across cycles.

use std::fmt;

use rand::Rng;

/// Name of the throwaway database role.
pub const TEST_USER: &str = "test_user";

/// Length of the generated password.
const PASSWORD_LEN: usize = 24;

/// Characters drawn from when generating a password: letters, digits, and
/// punctuation. Statement builders quote literals, so quote characters are
/// safe to include.
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
      !\"#$%&'()*+,-./:;<=>?@[]^_`{|}~";

/// A username/password pair valid for the current process lifetime.
#[derive(Clone)]
pub struct TestCredential {
    /// Role name.
    pub user: String,
    password: String,
}

impl TestCredential {
    /// Generate the credential for this process.
    pub fn generate() -> Self {
        Self {
            user: TEST_USER.to_string(),
            password: generate_password(PASSWORD_LEN),
        }
    }

    /// Build a credential from known values (test fixtures).
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The password for the role.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for TestCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCredential")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn generate_password(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}
