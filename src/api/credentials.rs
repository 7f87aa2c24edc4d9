use crate::Result;
use core::fmt::{Debug, Formatter};
use ohno::bail;
use std::sync::Arc;

/// An opaque access token used to authenticate API calls.
///
/// The token text is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    #[must_use]
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Arc::from(token.as_ref()))
    }

    /// The raw token text.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A non-empty, ordered set of credentials.
///
/// Indexes wrap around modulo the pool size.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Arc<[Credential]>,
}

impl CredentialPool {
    /// Create a pool from the given tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if `tokens` is empty or contains a blank token.
    pub fn new<I, T>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let credentials: Vec<Credential> = tokens.into_iter().map(Credential::new).collect();

        if credentials.is_empty() {
            bail!("a credential pool needs at least one credential");
        }

        if credentials.iter().any(|c| c.token().trim().is_empty()) {
            bail!("credential pool contains a blank credential");
        }

        Ok(Self {
            credentials: credentials.into(),
        })
    }

    /// Number of credentials in the pool. Never zero.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.credentials.len()
    }

    /// The credential at `index`, wrapping around the end of the pool.
    #[must_use]
    pub fn get(&self, index: usize) -> &Credential {
        &self.credentials[index % self.credentials.len()]
    }

    /// The index that follows `index`, wrapping around the end of the pool.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.credentials.len()
    }

    /// Split the pool into single-credential pools, one per credential.
    ///
    /// Used to give each swarm worker its own credential and quota tracker.
    #[must_use]
    pub fn split(&self) -> Vec<Self> {
        self.credentials
            .iter()
            .map(|c| Self {
                credentials: Arc::from([c.clone()]),
            })
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_rejected() {
        let result = CredentialPool::new(Vec::<String>::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_credential_rejected() {
        let result = CredentialPool::new(["a", " "]);
        assert!(result.is_err());
    }

    #[test]
    fn test_indexes_wrap() {
        let pool = CredentialPool::new(["a", "b", "c"]).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.next_index(0), 1);
        assert_eq!(pool.next_index(2), 0);
        assert_eq!(pool.get(4).token(), "b");
    }

    #[test]
    fn test_single_credential_wraps_to_itself() {
        let pool = CredentialPool::new(["only"]).unwrap();
        assert_eq!(pool.next_index(0), 0);
    }

    #[test]
    fn test_split() {
        let pool = CredentialPool::new(["a", "b"]).unwrap();
        let parts = pool.split();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].get(0).token(), "a");
        assert_eq!(parts[1].get(0).token(), "b");
        assert_eq!(parts[1].len(), 1);
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("super-secret");
        let text = format!("{credential:?}");
        assert!(!text.contains("super-secret"));
    }
}
