use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketStateError;

/// Coarse market-posture label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    RiskOn,
    RiskOff,
    /// Neither side fired, or both did
    Base,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::RiskOn => "risk_on",
            Regime::RiskOff => "risk_off",
            Regime::Base => "base",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = MarketStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "risk_on" => Ok(Regime::RiskOn),
            "risk_off" => Ok(Regime::RiskOff),
            "base" => Ok(Regime::Base),
            _ => Err(MarketStateError::invalid_label("regime", s)),
        }
    }
}

/// Bitcoin derivatives-leverage state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BtcState {
    /// Leverage build-up
    S1,
    /// Leverage flush
    S2,
    /// Repair after a flush
    S3,
    /// Neutral / unclassified
    S4,
}

impl BtcState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BtcState::S1 => "S1",
            BtcState::S2 => "S2",
            BtcState::S3 => "S3",
            BtcState::S4 => "S4",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BtcState::S1 => "leverage build-up",
            BtcState::S2 => "leverage flush",
            BtcState::S3 => "repair",
            BtcState::S4 => "neutral",
        }
    }
}

impl fmt::Display for BtcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BtcState {
    type Err = MarketStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S1" => Ok(BtcState::S1),
            "S2" => Ok(BtcState::S2),
            "S3" => Ok(BtcState::S3),
            "S4" => Ok(BtcState::S4),
            _ => Err(MarketStateError::invalid_label("btc state", s)),
        }
    }
}

/// Direction of stablecoin-supply liquidity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityTag {
    Expanding,
    Contracting,
    Unknown,
}

impl LiquidityTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidityTag::Expanding => "Expanding",
            LiquidityTag::Contracting => "Contracting",
            LiquidityTag::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LiquidityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiquidityTag {
    type Err = MarketStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expanding" => Ok(LiquidityTag::Expanding),
            "contracting" => Ok(LiquidityTag::Contracting),
            "unknown" => Ok(LiquidityTag::Unknown),
            _ => Err(MarketStateError::invalid_label("liquidity", s)),
        }
    }
}

/// Stability signal: first detection vs. persistence across cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Watch,
    Confirmed,
}

impl Stability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Watch => "watch",
            Stability::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stability {
    type Err = MarketStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watch" => Ok(Stability::Watch),
            "confirmed" => Ok(Stability::Confirmed),
            _ => Err(MarketStateError::invalid_label("stability", s)),
        }
    }
}

/// ETF flow momentum label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowMomentum {
    Supportive,
    Drag,
    Neutral,
}

impl FlowMomentum {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowMomentum::Supportive => "Supportive",
            FlowMomentum::Drag => "Drag",
            FlowMomentum::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for FlowMomentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
