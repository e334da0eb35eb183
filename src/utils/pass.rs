//! Password-related utilities.

use lazy_static::lazy_static;
use libreauth::pass::{Algorithm, HashBuilder, Hasher};

use crate::error::ServerError;

pub(crate) const PWD_ALGORITHM: Algorithm = Algorithm::Argon2;
pub(crate) const PWD_SCHEME_VERSION: usize = 1;
pub(crate) const PWD_MIN_LEN: usize = 6;
pub(crate) const PWD_MAX_LEN: usize = 128;

// If the Hasher changes, make sure to increment PWD_SCHEME_VERSION
lazy_static! {
    pub(crate) static ref HASHER: Hasher = {
        HashBuilder::new()
            .algorithm(PWD_ALGORITHM)
            .version(PWD_SCHEME_VERSION)
            .min_len(PWD_MIN_LEN)
            .max_len(PWD_MAX_LEN)
            .finalize()
            .unwrap()
    };
}

/// Hash a plaintext password into PHC form.
pub(crate) fn hash_password(password: &str) -> Result<String, ServerError> {
    HASHER.hash(password).map_err(|e| {
        tracing::debug!("Hasher rejected password: {:?}", e);
        ServerError::bad_request(format!(
            "Password must be between {} and {} characters",
            PWD_MIN_LEN, PWD_MAX_LEN
        ))
    })
}

/// Outcome of checking a password against a stored PHC string.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PasswordCheck {
    Invalid,
    Valid,
    /// Correct, but hashed with an older scheme; the caller should store a fresh hash.
    ValidNeedsRehash,
}

pub(crate) fn check_password(password: &str, phc: &str) -> PasswordCheck {
    let checker = match HashBuilder::from_phc(phc) {
        Ok(checker) => checker,
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {:?}", e);
            return PasswordCheck::Invalid;
        }
    };

    if !checker.is_valid(password) {
        PasswordCheck::Invalid
    } else if checker.needs_update(Some(PWD_SCHEME_VERSION)) {
        PasswordCheck::ValidNeedsRehash
    } else {
        PasswordCheck::Valid
    }
}

pub(crate) fn verify_password(password: &str, phc: &str) -> bool {
    check_password(password, phc) != PasswordCheck::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let phc = hash_password("carrots-and-peas1").unwrap();
        assert!(verify_password("carrots-and-peas1", &phc));
        assert!(!verify_password("carrots-and-peas2", &phc));
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(matches!(
            hash_password("short"),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert_eq!(
            check_password("anything-at-all", "not-a-phc-string"),
            PasswordCheck::Invalid
        );
    }
}
