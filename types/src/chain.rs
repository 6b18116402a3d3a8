//! Chain specification naming the network a queue serves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// `arch:fork:network_id[:common_name]`, e.g. `evm:byzantium:8996:bloxberg`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChainSpec {
    pub arch: String,
    pub fork: String,
    pub network_id: u64,
    pub common_name: Option<String>,
}

impl ChainSpec {
    pub fn new(arch: impl Into<String>, fork: impl Into<String>, network_id: u64) -> Self {
        Self {
            arch: arch.into(),
            fork: fork.into(),
            network_id,
            common_name: None,
        }
    }

    /// Directory name used to namespace per-chain storage.
    pub fn path_segment(&self) -> String {
        format!("{}_{}_{}", self.arch, self.fork, self.network_id)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::new("evm", "byzantium", 1)
    }
}

impl FromStr for ChainSpec {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypesError::InvalidChainSpec {
            spec: s.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = s.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(invalid("expected arch:fork:network_id[:common_name]"));
        }
        if parts[..2].iter().any(|p| p.is_empty()) {
            return Err(invalid("empty component"));
        }
        let network_id = parts[2]
            .parse::<u64>()
            .map_err(|_| invalid("network id is not a number"))?;
        let common_name = parts
            .get(3)
            .filter(|n| !n.is_empty())
            .map(|n| n.to_string());
        Ok(Self {
            arch: parts[0].to_string(),
            fork: parts[1].to_string(),
            network_id,
            common_name,
        })
    }
}

impl fmt::Display for ChainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.arch, self.fork, self.network_id)?;
        if let Some(name) = &self.common_name {
            write!(f, ":{name}")?;
        }
        Ok(())
    }
}

impl Serialize for ChainSpec {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainSpec {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_spec() {
        let spec: ChainSpec = "evm:byzantium:8996:bloxberg".parse().unwrap();
        assert_eq!(spec.arch, "evm");
        assert_eq!(spec.fork, "byzantium");
        assert_eq!(spec.network_id, 8996);
        assert_eq!(spec.common_name.as_deref(), Some("bloxberg"));
        assert_eq!(spec.path_segment(), "evm_byzantium_8996");
    }

    #[test]
    fn parse_without_common_name() {
        let spec: ChainSpec = "evm:london:1".parse().unwrap();
        assert_eq!(spec.common_name, None);
        assert_eq!(spec.to_string(), "evm:london:1");
    }

    #[test]
    fn rejects_malformed() {
        assert!("evm".parse::<ChainSpec>().is_err());
        assert!("evm:london:one".parse::<ChainSpec>().is_err());
        assert!(":london:1".parse::<ChainSpec>().is_err());
        assert!("a:b:1:c:d".parse::<ChainSpec>().is_err());
    }
}
