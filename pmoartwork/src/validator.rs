//! Validateurs de contenu (ETag)
//!
//! Le validateur d'une image est l'encodage hexadécimal des 16 premiers
//! octets du SHA-256 de son contenu. Il ne dépend que des octets : deux
//! appels sur le même contenu donnent le même validateur.

use sha2::{Digest, Sha256};
use std::fmt;

/// Validateur opaque d'un contenu d'image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Validator(String);

impl Validator {
    /// Calcule le validateur d'un contenu.
    ///
    /// # Exemple
    ///
    /// ```
    /// use pmoartwork::Validator;
    ///
    /// let v = Validator::compute(b"cover");
    /// assert_eq!(v.as_str().len(), 32);
    /// assert_eq!(v, Validator::compute(b"cover"));
    /// ```
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = hasher.finalize();
        Self(hex::encode(&hash[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Valeur d'en-tête `ETag` (forme entre guillemets).
    pub fn header_value(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Compare une valeur `If-None-Match` fournie par le client.
    ///
    /// Les guillemets, le préfixe faible `W/` et les espaces sont ignorés.
    /// Une liste séparée par des virgules correspond si l'un de ses membres
    /// correspond ; `*` correspond toujours.
    pub fn matches(&self, client: &str) -> bool {
        client
            .split(',')
            .map(normalize)
            .any(|candidate| candidate == "*" || candidate == self.0)
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compute_validator(bytes: &[u8]) -> Validator {
    Validator::compute(bytes)
}

pub fn matches(client: &str, current: &Validator) -> bool {
    current.matches(client)
}

fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    trimmed.trim_matches('"').trim()
}
