//! Tenant identifiers and the naming policy they must satisfy.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Naming policy for tenant identifiers: lowercase alphanumeric, starting with a
/// letter, at least two characters long.
pub const TENANT_ID_PATTERN: &str = "^[a-z][a-z0-9]+$";

fn tenant_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TENANT_ID_PATTERN).expect("tenant id pattern is valid"))
}

/// A validated tenant identifier.
///
/// The only way to obtain one is [`TenantId::parse`], so holding a `TenantId`
/// means the naming policy has already been checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validates `raw` against [`TENANT_ID_PATTERN`].
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        if raw.is_empty() {
            return Err(ProvisionError::invalid_identifier(raw, "identifier is empty"));
        }
        if !tenant_id_regex().is_match(raw) {
            return Err(ProvisionError::invalid_identifier(
                raw,
                "must be lowercase alphanumeric, start with a letter and be at least 2 characters",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}
