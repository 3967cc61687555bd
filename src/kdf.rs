//! Passphrase key derivation with Argon2id.
//!
//! Deterministic for identical inputs, which is what lets decryption
//! reproduce the encrypt-time key from the salt and cost triple stored in
//! the container header. Each encrypted file gets a fresh random salt so
//! identical passphrases never yield identical keys across files.

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};
use rand::TryRng;
use rand::rngs::SysRng;

use crate::config::SALT_LEN;
use crate::error::{CipherError, Result};
use crate::params::CipherParameters;
use crate::secret::{DerivedKey, Passphrase};

/// Derives the suite key for `params` from a passphrase and salt.
///
/// Output length follows the resolved suite's key length. Fails only on
/// cost/length misconfiguration, never on passphrase content.
pub fn derive(passphrase: &Passphrase, salt: &[u8; SALT_LEN], params: &CipherParameters) -> Result<DerivedKey> {
    let suite = params.suite()?;
    params.kdf.validate()?;

    let argon_params =
        Params::new(params.kdf.memory_kib, params.kdf.time, params.kdf.parallelism, Some(suite.key_len())).map_err(|e| CipherError::KeyDerivation(format!("invalid argon2 parameter: {e}")))?;
    let argon2 = Argon2::new(Argon2id, V0x13, argon_params);

    let mut key = vec![0u8; suite.key_len()];
    argon2.hash_password_into(passphrase.expose(), salt, &mut key).map_err(|e| CipherError::KeyDerivation(format!("derivation failed: {e}")))?;

    Ok(DerivedKey::from_vec(key))
}

/// Generates a fresh random salt from the OS generator.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    SysRng.try_fill_bytes(&mut salt).map_err(|e| CipherError::Io(std::io::Error::other(format!("rng failed: {e}"))))?;

    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::KdfCost;

    fn test_params() -> CipherParameters {
        CipherParameters { kdf: KdfCost { memory_kib: 8 * 1024, time: 1, parallelism: 1 }, ..CipherParameters::default() }
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = test_params();
        let salt = [7u8; SALT_LEN];
        let passphrase = Passphrase::new("correct-horse");

        let a = derive(&passphrase, &salt, &params).unwrap();
        let b = derive(&passphrase, &salt, &params).unwrap();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn salt_changes_key() {
        let params = test_params();
        let passphrase = Passphrase::new("correct-horse");

        let a = derive(&passphrase, &[1u8; SALT_LEN], &params).unwrap();
        let b = derive(&passphrase, &[2u8; SALT_LEN], &params).unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn key_length_follows_suite() {
        let mut params = test_params();
        params.key_size = 128;
        let salt = [0u8; SALT_LEN];

        let key = derive(&Passphrase::new("pw"), &salt, &params).unwrap();
        assert_eq!(key.expose().len(), 16);
    }

    #[test]
    fn bad_cost_is_rejected() {
        let mut params = test_params();
        params.kdf.time = 0;

        let err = derive(&Passphrase::new("pw"), &[0u8; SALT_LEN], &params).unwrap_err();
        assert!(matches!(err, CipherError::KeyDerivation(_)));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }
}
