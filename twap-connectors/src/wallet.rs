//! HMAC request-signing wallet.
//!
//! The wallet is built from an address plus a shared signing secret. The
//! secret is wiped from memory when the wallet is dropped.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use twap_exec::{ExecError, WalletPort};

type HmacSha256 = Hmac<Sha256>;

/// Wallet that signs request payloads with HMAC-SHA256.
pub struct HmacWallet {
    address: String,
    secret: Zeroizing<Vec<u8>>,
}

impl HmacWallet {
    /// Create a wallet.
    ///
    /// # Errors
    ///
    /// Fails if the address or the secret is empty.
    pub fn new(address: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, ExecError> {
        let address = address.into();
        let secret = Zeroizing::new(secret.into());

        if address.trim().is_empty() {
            return Err(ExecError::Config("wallet address is empty".to_string()));
        }
        if secret.is_empty() {
            return Err(ExecError::Config("wallet secret is empty".to_string()));
        }

        Ok(Self { address, secret })
    }
}

impl fmt::Debug for HmacWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacWallet")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl WalletPort for HmacWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, payload: &[u8]) -> Result<String, ExecError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ExecError::Signing(format!("HMAC error: {}", e)))?;

        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_rfc4231_vector() {
        let wallet = HmacWallet::new("0xabc", "Jefe").unwrap();

        let signature = wallet.sign(b"what do ya want for nothing?").unwrap();

        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_rejects_empty_credentials() {
        assert!(HmacWallet::new("", "secret").is_err());
        assert!(HmacWallet::new("0xabc", "").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let wallet = HmacWallet::new("0xabc", "super-secret").unwrap();
        let debug = format!("{:?}", wallet);

        assert!(debug.contains("0xabc"));
        assert!(!debug.contains("super-secret"));
    }
}
