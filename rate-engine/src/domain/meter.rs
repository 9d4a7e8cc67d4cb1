use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Utility {
    Electricity,
    Gas,
    Water,
    Heat,
}

impl Utility {
    /// Half-hourly utilities produce a reading every 30 minutes, the rest once a day.
    pub fn is_half_hourly(self) -> bool {
        matches!(self, Self::Electricity)
    }

    pub fn step_minutes(self) -> i64 {
        if self.is_half_hourly() {
            30
        } else {
            1440
        }
    }

    pub fn default_unit(self) -> &'static str {
        match self {
            Self::Electricity | Self::Gas | Self::Heat => "kWh",
            Self::Water => "m3",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Gas => "gas",
            Self::Water => "water",
            Self::Heat => "heat",
        }
    }
}

impl fmt::Display for Utility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub id: String,
    pub site_id: String,
    pub utility: Utility,
    #[serde(default)]
    pub label: Option<String>,
}
