//! Random token generation.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Returns a random string of `len` ASCII letters and digits.
///
/// Drawn from the thread-local CSPRNG; suitable for anti-CSRF state tokens
/// and throwaway placeholder secrets.
#[must_use]
pub fn alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
