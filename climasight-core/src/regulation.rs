//! Occupancy-aware setpoint and hysteresis regulation.
//!
//! `regulate` is a pure function: the occupancy count picks a band from a breakpoint table,
//! the season picks that band's setpoint, and the temperature is compared against a
//! dead-band of `margin` on each side of the target. Only [`RegulationThrottle`] and
//! [`HvacRelay`] carry state between calls, and both live with the caller.

use crate::error::{Error, Result};
use crate::season::{HvacMode, Season};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Inclusive occupancy range. `max: None` means unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyBand {
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl OccupancyBand {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, occupancy: u32) -> bool {
        occupancy >= self.min && self.max.map_or(true, |max| occupancy <= max)
    }

    fn distance(&self, occupancy: u32) -> u32 {
        if occupancy < self.min {
            self.min - occupancy
        } else {
            self.max.map_or(0, |max| occupancy.saturating_sub(max))
        }
    }
}

impl fmt::Display for OccupancyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, ">={}", self.min),
        }
    }
}

/// What one band means in one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSetpoint {
    pub target: f64,
    /// Fan label shown to the operator (`ECO`, `MOYEN`, ...).
    pub label: String,
    /// Occupancy state shown next to the label (`VEILLE`, `CONFORT`, ...).
    #[serde(default)]
    pub state: String,
    /// Fan percentage with an empty room.
    #[serde(default)]
    pub fan_base: f64,
    #[serde(default)]
    pub fan_per_occupant: f64,
}

impl BandSetpoint {
    pub fn new(
        target: f64,
        label: &str,
        state: &str,
        fan_base: f64,
        fan_per_occupant: f64,
    ) -> Self {
        Self {
            target,
            label: label.to_string(),
            state: state.to_string(),
            fan_base,
            fan_per_occupant,
        }
    }

    /// Fan speed in percent, clamped to 0..=100.
    pub fn fan_level(&self, occupancy: u32) -> u8 {
        let raw = self.fan_base + self.fan_per_occupant * occupancy as f64;
        raw.clamp(0.0, 100.0).round() as u8
    }
}

/// Season x band table. Each season holds one setpoint per band, in band order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonSetpoints {
    pub summer: Vec<BandSetpoint>,
    pub winter: Vec<BandSetpoint>,
    pub mid_season: Vec<BandSetpoint>,
}

impl SeasonSetpoints {
    pub fn for_season(&self, season: Season) -> &[BandSetpoint] {
        match season {
            Season::Summer => &self.summer,
            Season::Winter => &self.winter,
            Season::MidSeason => &self.mid_season,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (Season, &[BandSetpoint])> {
        [Season::Summer, Season::Winter, Season::MidSeason]
            .into_iter()
            .map(move |s| (s, self.for_season(s)))
    }
}

impl Default for SeasonSetpoints {
    fn default() -> Self {
        Self {
            summer: vec![
                BandSetpoint::new(29.0, "ECO", "VEILLE", 10.0, 0.0),
                BandSetpoint::new(25.0, "MOYEN", "CONFORT", 20.0, 5.0),
                BandSetpoint::new(24.0, "FORT", "COMPENS.", 20.0, 5.0),
                BandSetpoint::new(23.0, "MAX", "FOULE", 20.0, 5.0),
            ],
            winter: vec![
                BandSetpoint::new(15.0, "ECO", "VEILLE", 10.0, 0.0),
                BandSetpoint::new(19.0, "MOYEN", "CONFORT", 10.0, 0.0),
                BandSetpoint::new(18.0, "BAS", "COMPENS.", 10.0, 0.0),
                BandSetpoint::new(17.0, "MIN", "ARRET", 10.0, 0.0),
            ],
            mid_season: vec![
                BandSetpoint::new(22.0, "VENT", "VEILLE", 10.0, 0.0),
                BandSetpoint::new(22.0, "VENT", "CONFORT", 20.0, 5.0),
                BandSetpoint::new(22.0, "VENT", "COMPENS.", 20.0, 5.0),
                BandSetpoint::new(22.0, "VENT", "FOULE", 20.0, 5.0),
            ],
        }
    }
}

/// Everything `regulate` needs besides its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulationPolicy {
    /// Half-width of the dead-band, in °C.
    pub margin: f64,
    /// Heat released per occupant, for the thermal load readout.
    pub watts_per_person: f64,
    /// Sorted, non-overlapping breakpoints.
    pub bands: Vec<OccupancyBand>,
    pub setpoints: SeasonSetpoints,
}

impl Default for RegulationPolicy {
    fn default() -> Self {
        Self {
            margin: 0.5,
            watts_per_person: 100.0,
            bands: vec![
                OccupancyBand::new(0, Some(0)),
                OccupancyBand::new(1, Some(4)),
                OccupancyBand::new(5, Some(9)),
                OccupancyBand::new(10, None),
            ],
            setpoints: SeasonSetpoints::default(),
        }
    }
}

impl RegulationPolicy {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(format!("margin must be a finite value >= 0, got {}", self.margin));
        }
        if !self.watts_per_person.is_finite() || self.watts_per_person < 0.0 {
            return Err(format!("watts_per_person must be >= 0, got {}", self.watts_per_person));
        }
        if self.bands.is_empty() {
            return Err("band table is empty".to_string());
        }

        for (i, band) in self.bands.iter().enumerate() {
            if let Some(max) = band.max {
                if max < band.min {
                    return Err(format!("band {} is inverted ({} > {})", i, band.min, max));
                }
            }
            if let Some(next) = self.bands.get(i + 1) {
                match band.max {
                    None => return Err(format!("band {} is unbounded but is not the last band", i)),
                    Some(max) if max >= next.min => {
                        return Err(format!("bands {} and {} overlap or are out of order", i, i + 1))
                    }
                    _ => {}
                }
            }
        }

        for (season, table) in self.setpoints.iter() {
            if table.len() != self.bands.len() {
                return Err(format!(
                    "{} table has {} setpoints for {} bands",
                    season,
                    table.len(),
                    self.bands.len()
                ));
            }
            if let Some(sp) = table.iter().find(|sp| !sp.target.is_finite()) {
                return Err(format!("{} band '{}' has a non-finite target", season, sp.label));
            }
        }
        Ok(())
    }

    /// Index of the band covering `occupancy`. Counts outside every band go to the nearest
    /// one; on a tie between two bands the lower one wins. `None` only for an empty table.
    pub fn select_band(&self, occupancy: u32) -> Option<usize> {
        if let Some(i) = self.bands.iter().position(|b| b.contains(occupancy)) {
            return Some(i);
        }
        let mut best: Option<(usize, u32)> = None;
        for (i, band) in self.bands.iter().enumerate() {
            let d = band.distance(occupancy);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// ON/OFF dead-band around `target`. Cooling and ventilation switch on above the target,
/// heating below it.
pub fn thresholds(mode: HvacMode, target: f64, margin: f64) -> (f64, f64) {
    if mode.switches_on_above_target() {
        (target + margin, target - margin)
    } else {
        (target - margin, target + margin)
    }
}

/// Hysteresis decision. A temperature sitting exactly on a threshold holds; a missing or
/// non-finite one is unknown and gives STANDBY.
pub fn decide(
    mode: HvacMode,
    temperature: Option<f64>,
    threshold_on: f64,
    threshold_off: f64,
) -> HvacAction {
    let Some(t) = temperature.filter(|t| t.is_finite()) else {
        return HvacAction::Standby;
    };
    if mode.switches_on_above_target() {
        if t > threshold_on {
            HvacAction::On
        } else if t < threshold_off {
            HvacAction::Off
        } else {
            HvacAction::Hold
        }
    } else if t < threshold_on {
        HvacAction::On
    } else if t > threshold_off {
        HvacAction::Off
    } else {
        HvacAction::Hold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HvacAction {
    On,
    Off,
    Hold,
    Standby,
}

impl HvacAction {
    pub fn label(&self) -> &'static str {
        match self {
            HvacAction::On => "ON",
            HvacAction::Off => "OFF",
            HvacAction::Hold => "HOLD",
            HvacAction::Standby => "STANDBY",
        }
    }

    /// Operator text, e.g. `HEAT ON` or `HOLD`.
    pub fn describe(&self, mode: HvacMode) -> String {
        match self {
            HvacAction::On => format!("{} ON", mode.short_label()),
            other => other.label().to_string(),
        }
    }
}

impl fmt::Display for HvacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationResult {
    pub occupancy: u32,
    pub season: Season,
    pub mode: HvacMode,
    pub band_index: usize,
    pub band_label: String,
    pub band_state: String,
    pub target: f64,
    pub threshold_on: f64,
    pub threshold_off: f64,
    pub fan_level: u8,
    pub temperature: Option<f64>,
    pub action: HvacAction,
    pub thermal_load_w: f64,
}

impl RegulationResult {
    pub fn action_text(&self) -> String {
        self.action.describe(self.mode)
    }
}

/// Map an occupancy count, season and optional temperature to a setpoint and action.
///
/// Fails only when the policy has no setpoint for the selected band, which a policy that
/// passed [`RegulationPolicy::validate`] never does.
pub fn regulate(
    occupancy: u32,
    season: Season,
    temperature: Option<f64>,
    policy: &RegulationPolicy,
) -> Result<RegulationResult> {
    let band_index = policy
        .select_band(occupancy)
        .ok_or_else(|| Error::Config("band table is empty".to_string()))?;
    let setpoint = policy
        .setpoints
        .for_season(season)
        .get(band_index)
        .ok_or_else(|| Error::Config(format!("no {} setpoint for band {}", season, band_index)))?;

    let temperature = temperature.filter(|t| t.is_finite());
    let mode = season.mode();
    let (threshold_on, threshold_off) = thresholds(mode, setpoint.target, policy.margin);
    let action = decide(mode, temperature, threshold_on, threshold_off);

    Ok(RegulationResult {
        occupancy,
        season,
        mode,
        band_index,
        band_label: setpoint.label.clone(),
        band_state: setpoint.state.clone(),
        target: setpoint.target,
        threshold_on,
        threshold_off,
        fan_level: setpoint.fan_level(occupancy),
        temperature,
        action,
        thermal_load_w: occupancy as f64 * policy.watts_per_person,
    })
}

/// Limits recomputation to once per interval. The caller supplies the clock.
#[derive(Debug, Clone)]
pub struct RegulationThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RegulationThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// True (and records `now`) when the first call or a full interval has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Effective plant state across results: ON engages, OFF releases, HOLD and STANDBY keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HvacRelay {
    engaged: bool,
}

impl HvacRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action. Returns true when the relay changed state.
    pub fn apply(&mut self, action: HvacAction) -> bool {
        let next = match action {
            HvacAction::On => true,
            HvacAction::Off => false,
            HvacAction::Hold | HvacAction::Standby => self.engaged,
        };
        let changed = next != self.engaged;
        self.engaged = next;
        changed
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}
