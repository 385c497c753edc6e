//! Stream API deployments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Deployment the client connects to when no explicit URL is configured.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production stream
    #[default]
    Mainnet,
    /// Stream for test networks
    Testnet,
}

impl Network {
    /// Default socket endpoint for this network.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "wss://stream.openseabeta.com/socket",
            Network::Testnet => "wss://testnets-stream.openseabeta.com/socket",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}
