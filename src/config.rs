use std::sync::Arc;

use crate::crypto::rust_crypto;
use crate::crypto::{CipherSuite, CryptoProvider};
use crate::session::{ResumptionCache, Ticketer};
use crate::Error;

/// A certificate chain plus the matching private key.
#[derive(Clone)]
pub struct Identity {
    pub cert_chain: Vec<Vec<u8>>,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("cert_chain", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// Engine configuration.
#[derive(Clone)]
pub struct Config {
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<CipherSuite>,
    identity: Option<Arc<Identity>>,
    resumption_cache: Option<Arc<ResumptionCache>>,
    issue_tickets: bool,
    /// Ticket sealing key, shared by every connection built from this
    /// config. Present iff `issue_tickets`.
    ticketer: Option<Arc<Ticketer>>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            crypto_provider: None,
            cipher_suites: vec![
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
                CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            ],
            identity: None,
            resumption_cache: None,
            issue_tickets: true,
        }
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Cipher suites offered (client) or accepted (server), in preference
    /// order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Local identity. Required for servers.
    #[inline(always)]
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    /// Session store used for client-side resumption.
    #[inline(always)]
    pub fn resumption_cache(&self) -> Option<&Arc<ResumptionCache>> {
        self.resumption_cache.as_ref()
    }

    /// Whether a server issues RFC 5077 session tickets.
    #[inline(always)]
    pub fn issue_tickets(&self) -> bool {
        self.issue_tickets
    }

    #[inline(always)]
    pub(crate) fn ticketer(&self) -> Option<&Arc<Ticketer>> {
        self.ticketer.as_ref()
    }
}

/// Builder for the engine configuration.
pub struct ConfigBuilder {
    crypto_provider: Option<CryptoProvider>,
    cipher_suites: Vec<CipherSuite>,
    identity: Option<Arc<Identity>>,
    resumption_cache: Option<Arc<ResumptionCache>>,
    issue_tickets: bool,
}

impl ConfigBuilder {
    /// Set a custom crypto provider.
    ///
    /// Defaults to the RustCrypto-backed provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Set the cipher suites, in preference order.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the local identity (certificate chain and private key).
    pub fn with_identity(mut self, cert_chain: Vec<Vec<u8>>, key: Vec<u8>) -> Self {
        self.identity = Some(Arc::new(Identity { cert_chain, key }));
        self
    }

    /// Share a session store for client-side resumption. Without one the
    /// client never resumes.
    pub fn with_resumption_cache(mut self, cache: Arc<ResumptionCache>) -> Self {
        self.resumption_cache = Some(cache);
        self
    }

    /// Set whether a server issues session tickets.
    ///
    /// Defaults to true.
    pub fn issue_tickets(mut self, issue: bool) -> Self {
        self.issue_tickets = issue;
        self
    }

    /// Build the configuration, validating it against the provider.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(rust_crypto::default_provider);

        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError("no cipher suites configured".into()));
        }
        for suite in &self.cipher_suites {
            if crypto_provider.find_cipher_suite(*suite).is_none() {
                return Err(Error::ConfigError(format!(
                    "provider does not support {:?}",
                    suite
                )));
            }
        }

        if let Some(identity) = &self.identity {
            if identity.cert_chain.is_empty() {
                return Err(Error::ConfigError("identity has no certificates".into()));
            }
            crypto_provider
                .key_provider
                .load_private_key(&identity.key)
                .map_err(Error::ConfigError)?;
        }

        let ticketer = if self.issue_tickets {
            let ticketer =
                Ticketer::new(crypto_provider.secure_random).map_err(Error::ConfigError)?;
            Some(Arc::new(ticketer))
        } else {
            None
        };

        Ok(Config {
            crypto_provider,
            cipher_suites: self.cipher_suites,
            identity: self.identity,
            resumption_cache: self.resumption_cache,
            issue_tickets: self.issue_tickets,
            ticketer,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
