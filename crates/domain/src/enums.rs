use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Rebalance,
    Manual,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    UpperBreach,
    LowerBreach,
    Manual,
}

/// How a pool's range is skewed. Carried through configuration and
/// persisted for reporting; range bounds themselves come from the bps offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    #[default]
    Neutral,
    AccumulateUsdc,
    AccumulateToken,
}

/// The two assets the skim wallet accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkimAsset {
    Usdc,
    Native,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rebalance => "rebalance",
            Self::Manual => "manual",
            Self::Emergency => "emergency",
        }
    }
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpperBreach => "upper_breach",
            Self::LowerBreach => "lower_breach",
            Self::Manual => "manual",
        }
    }
}

impl SkimAsset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usdc => "usdc",
            Self::Native => "native",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ty, $label:literal, [$($variant:ident),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case(Self::$variant.as_str()) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("unknown {}: {}", $label, s))
            }
        }
    };
}

impl_str_enum!(PositionStatus, "position status", [Active, Closed]);
impl_str_enum!(CloseReason, "close reason", [Rebalance, Manual, Emergency]);
impl_str_enum!(TriggerReason, "trigger reason", [UpperBreach, LowerBreach, Manual]);
impl_str_enum!(SkimAsset, "skim asset", [Usdc, Native]);
