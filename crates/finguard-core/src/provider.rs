use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Canonical provider identifiers used in breaker keys and error metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Bank account aggregation.
    Plaid,
    /// Crypto exchange balances and trades.
    Coinbase,
    /// Payment processing.
    Stripe,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Plaid, Self::Coinbase, Self::Stripe];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plaid => "plaid",
            Self::Coinbase => "coinbase",
            Self::Stripe => "stripe",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plaid" => Ok(Self::Plaid),
            "coinbase" => Ok(Self::Coinbase),
            "stripe" => Ok(Self::Stripe),
            other => Err(ConfigError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Regional endpoint qualifier for a provider, for example `us` or `eu`.
///
/// Breaker state is keyed per (provider, region) so a failing regional
/// endpoint does not penalize traffic to healthy regions of the same
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    const MAX_LEN: usize = 8;

    pub fn parse(value: impl AsRef<str>) -> Result<Self, ConfigError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN {
            return Err(ConfigError::InvalidRegion {
                value: trimmed.to_owned(),
            });
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        {
            return Err(ConfigError::InvalidRegion {
                value: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Breaker registry key: one live circuit state per (provider, region).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub provider: ProviderId,
    pub region: Region,
}

impl ProviderKey {
    pub fn new(provider: ProviderId, region: Region) -> Self {
        Self { provider, region }
    }
}

impl Display for ProviderKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.region)
    }
}
