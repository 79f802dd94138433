//! Named simulation scenarios.

use serde::Serialize;

/// Scenario identifiers; serialized by [`ScenarioId::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// HLS-001: Short straight drive, full pipeline, look-at playback
    Cruise,

    /// HLS-002: Multi-leg road with sharp bends
    Winding,

    /// HLS-003: Long route where the point budget widens the spacing
    LongHaul,

    /// HLS-004: Panorama coverage stops partway along the road
    CoverageGap,

    /// HLS-005: Elevation service rate-limits every request
    ElevationOutage,

    /// HLS-006: Cancel arrives while panoramas are being resolved
    CancelSequencing,

    /// HLS-007: Cancel arrives while imagery is loading
    CancelLoading,

    /// HLS-008: One panorama texture fails to download
    BrokenImagery,

    /// HLS-009: Steep terrain under a look-at landmark
    Hillclimb,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Cruise,
            ScenarioId::Winding,
            ScenarioId::LongHaul,
            ScenarioId::CoverageGap,
            ScenarioId::ElevationOutage,
            ScenarioId::CancelSequencing,
            ScenarioId::CancelLoading,
            ScenarioId::BrokenImagery,
            ScenarioId::Hillclimb,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Cruise => "cruise",
            ScenarioId::Winding => "winding",
            ScenarioId::LongHaul => "long_haul",
            ScenarioId::CoverageGap => "coverage_gap",
            ScenarioId::ElevationOutage => "elevation_outage",
            ScenarioId::CancelSequencing => "cancel_sequencing",
            ScenarioId::CancelLoading => "cancel_loading",
            ScenarioId::BrokenImagery => "broken_imagery",
            ScenarioId::Hillclimb => "hillclimb",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Cruise => {
                "1.5km drive, every stage end to end, ping-pong playback with look-at"
            }
            ScenarioId::Winding => {
                "4 legs with 120m bends, samples stay evenly spaced along the road"
            }
            ScenarioId::LongHaul => "25km route capped at 100 points, spacing widens to fit",
            ScenarioId::CoverageGap => {
                "No captures past 60% of the road, the walk truncates at the gap"
            }
            ScenarioId::ElevationOutage => {
                "OVER_QUERY_LIMIT on elevation, playback runs with zero pitch"
            }
            ScenarioId::CancelSequencing => {
                "Cancel on the 8th panorama lookup, no request after it"
            }
            ScenarioId::CancelLoading => "Cancel on the 5th image request, one canceled event",
            ScenarioId::BrokenImagery => "7th texture fails, generate halts with nothing active",
            ScenarioId::Hillclimb => "120m terrain swings, corrected pitch follows the slope",
        }
    }

    /// Returns true if the scenario expects `generate` to finish with a sequence.
    pub fn expects_sequence(&self) -> bool {
        !matches!(
            self,
            ScenarioId::CancelSequencing | ScenarioId::CancelLoading | ScenarioId::BrokenImagery
        )
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cruise" | "hls-001" => Ok(ScenarioId::Cruise),
            "winding" | "hls-002" => Ok(ScenarioId::Winding),
            "long_haul" | "longhaul" | "hls-003" => Ok(ScenarioId::LongHaul),
            "coverage_gap" | "coveragegap" | "hls-004" => Ok(ScenarioId::CoverageGap),
            "elevation_outage" | "elevationoutage" | "hls-005" => Ok(ScenarioId::ElevationOutage),
            "cancel_sequencing" | "cancelsequencing" | "hls-006" => {
                Ok(ScenarioId::CancelSequencing)
            }
            "cancel_loading" | "cancelloading" | "hls-007" => Ok(ScenarioId::CancelLoading),
            "broken_imagery" | "brokenimagery" | "hls-008" => Ok(ScenarioId::BrokenImagery),
            "hillclimb" | "hls-009" => Ok(ScenarioId::Hillclimb),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
