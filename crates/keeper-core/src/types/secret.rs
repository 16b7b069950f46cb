//! The typed secret model.

use crate::encoding::base64_bytes;
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored secret. `0` means "not yet persisted".
pub type SecretId = u64;

/// Discriminant of [`SecretData`], used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretKind {
    Credential,
    Text,
    Card,
    Blob,
    /// Any kind this build does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

impl SecretKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Text => "text",
            Self::Card => "card",
            Self::Blob => "blob",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login and password pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub login: String,
    pub password: String,
}

/// Free-form note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
}

/// Payment card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cvv: u32,
}

impl Card {
    /// Check the card number (Luhn), expiry month and CVV length.
    pub fn validate(&self) -> Result<()> {
        let digits: String = self.number.chars().filter(|c| !c.is_whitespace()).collect();
        if !luhn_check(&digits) {
            return Err(Error::InvalidSecret(format!(
                "card number '{}' failed checksum",
                self.number
            )));
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(Error::InvalidSecret(format!(
                "expiry month {} out of range",
                self.exp_month
            )));
        }
        if self.cvv > 9999 {
            return Err(Error::InvalidSecret("cvv has too many digits".to_string()));
        }
        Ok(())
    }

    /// Whether the card is past its expiry month as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let year = if self.exp_year < 100 {
            2000 + self.exp_year
        } else {
            self.exp_year
        };
        let now_year = now.year() as u32;
        (year, self.exp_month) < (now_year, now.month())
    }
}

/// File attachment. The content travels over the streaming path; the
/// envelope stored alongside it keeps only the name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub file_name: String,
    #[serde(default, with = "base64_bytes")]
    pub file_bytes: Vec<u8>,
}

/// Typed content of a secret. Exactly one variant is ever present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretData {
    Credential(Credential),
    Text(Text),
    Card(Card),
    Blob(Blob),
    #[default]
    Unknown,
}

impl SecretData {
    pub fn kind(&self) -> SecretKind {
        match self {
            Self::Credential(_) => SecretKind::Credential,
            Self::Text(_) => SecretKind::Text,
            Self::Card(_) => SecretKind::Card,
            Self::Blob(_) => SecretKind::Blob,
            Self::Unknown => SecretKind::Unknown,
        }
    }

    pub fn credential(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Credential(Credential {
            login: login.into(),
            password: password.into(),
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(Text {
            content: content.into(),
        })
    }
}

/// A secret in open (decrypted) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub id: SecretId,
    pub title: String,
    #[serde(default)]
    pub metadata: String,
    pub data: SecretData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    /// Create an unpersisted secret stamped with the current time.
    pub fn new(title: impl Into<String>, metadata: impl Into<String>, data: SecretData) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.into(),
            metadata: metadata.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> SecretKind {
        self.data.kind()
    }

    /// Run the content checks that apply to this secret's variant.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidSecret("title must not be empty".to_string()));
        }
        match &self.data {
            SecretData::Card(card) => card.validate(),
            SecretData::Unknown => Err(Error::InvalidSecret(
                "secret has no typed content".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Human-readable content, suitable for printing or the clipboard.
    pub fn render_plain(&self) -> String {
        match &self.data {
            SecretData::Credential(c) => format!("login: {}\npassword: {}", c.login, c.password),
            SecretData::Text(t) => t.content.clone(),
            SecretData::Card(c) => format!(
                "number: {}\nexpires: {:02}/{:02}\ncvv: {:03}",
                c.number,
                c.exp_month,
                c.exp_year % 100,
                c.cvv
            ),
            SecretData::Blob(b) => format!("file: {} ({} bytes)", b.file_name, b.file_bytes.len()),
            SecretData::Unknown => String::new(),
        }
    }
}

/// Luhn checksum over an ASCII digit string.
pub fn luhn_check(number: &str) -> bool {
    if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut digit = u32::from(b - b'0');
            if i % 2 == 1 {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            digit
        })
        .sum();

    sum % 10 == 0
}
