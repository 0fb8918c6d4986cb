//! Season selection.
//!
//! The season is either pinned by configuration or derived from the calendar month of an
//! injectable clock, so tests can drive it with fixed dates.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    Winter,
    MidSeason,
}

impl Season {
    pub fn mode(&self) -> HvacMode {
        match self {
            Season::Summer => HvacMode::Cooling,
            Season::Winter => HvacMode::Heating,
            Season::MidSeason => HvacMode::Ventilation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Summer => "summer",
            Season::Winter => "winter",
            Season::MidSeason => "mid_season",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "summer" | "ete" | "été" => Ok(Season::Summer),
            "winter" | "hiver" => Ok(Season::Winter),
            "mid_season" | "midseason" | "mi_saison" => Ok(Season::MidSeason),
            other => Err(format!("unknown season '{}'", other)),
        }
    }
}

/// What the plant does when the action is ON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HvacMode {
    Cooling,
    Heating,
    Ventilation,
}

impl HvacMode {
    /// Cooling and ventilation switch on above the target, heating below it.
    pub fn switches_on_above_target(&self) -> bool {
        !matches!(self, HvacMode::Heating)
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            HvacMode::Cooling => "COOL",
            HvacMode::Heating => "HEAT",
            HvacMode::Ventilation => "VENT",
        }
    }
}

/// How the season is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeasonPolicy {
    Fixed { season: Season },
    Calendar {
        summer_months: Vec<u32>,
        #[serde(default)]
        mid_season_months: Vec<u32>,
    },
}

impl SeasonPolicy {
    /// May through September is summer, everything else winter.
    pub fn calendar() -> Self {
        SeasonPolicy::Calendar {
            summer_months: vec![5, 6, 7, 8, 9],
            mid_season_months: Vec::new(),
        }
    }

    pub fn fixed(season: Season) -> Self {
        SeasonPolicy::Fixed { season }
    }

    pub fn season_for(&self, date: NaiveDate) -> Season {
        match self {
            SeasonPolicy::Fixed { season } => *season,
            SeasonPolicy::Calendar { summer_months, mid_season_months } => {
                let month = date.month();
                if mid_season_months.contains(&month) {
                    Season::MidSeason
                } else if summer_months.contains(&month) {
                    Season::Summer
                } else {
                    Season::Winter
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let SeasonPolicy::Calendar { summer_months, mid_season_months } = self {
            for m in summer_months.iter().chain(mid_season_months) {
                if !(1..=12).contains(m) {
                    return Err(format!("month {} is outside 1..=12", m));
                }
            }
            if let Some(m) = summer_months.iter().find(|m| mid_season_months.contains(m)) {
                return Err(format!("month {} is both summer and mid-season", m));
            }
        }
        Ok(())
    }
}

impl Default for SeasonPolicy {
    fn default() -> Self {
        Self::calendar()
    }
}

pub type DateSource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Resolves the current season from a policy and a date source.
#[derive(Clone)]
pub struct SeasonSelector {
    policy: SeasonPolicy,
    today: DateSource,
}

impl SeasonSelector {
    /// Selector reading the local wall clock.
    pub fn new(policy: SeasonPolicy) -> Self {
        Self::with_clock(policy, Arc::new(|| Local::now().date_naive()))
    }

    pub fn with_clock(policy: SeasonPolicy, today: DateSource) -> Self {
        Self { policy, today }
    }

    pub fn current(&self) -> Season {
        self.policy.season_for((self.today)())
    }

    pub fn policy(&self) -> &SeasonPolicy {
        &self.policy
    }
}

impl fmt::Debug for SeasonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeasonSelector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
