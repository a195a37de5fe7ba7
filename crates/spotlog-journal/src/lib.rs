//! Journal domain types: fishing spots, general notes, and the derived
//! statistics the stats screen renders. Pure data, no I/O.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Preset fish species offered when logging a catch.
pub const FISH_TYPES: &[&str] = &[
    "Pike", "Carp", "Perch", "Trout", "Bass", "Salmon", "Catfish", "Walleye",
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WaterType {
    River,
    Lake,
    Pond,
    Sea,
}

impl WaterType {
    pub const ALL: [WaterType; 4] = [
        WaterType::River,
        WaterType::Lake,
        WaterType::Pond,
        WaterType::Sea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterType::River => "River",
            WaterType::Lake => "Lake",
            WaterType::Pond => "Pond",
            WaterType::Sea => "Sea",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FishingResult {
    Poor,
    Good,
    Excellent,
}

impl FishingResult {
    pub const ALL: [FishingResult; 3] = [
        FishingResult::Poor,
        FishingResult::Good,
        FishingResult::Excellent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FishingResult::Poor => "Poor",
            FishingResult::Good => "Good",
            FishingResult::Excellent => "Excellent",
        }
    }
}

/// A logged fishing outing. Field names stay camelCase to match the blobs
/// the mobile app already persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: Uuid,
    pub name: String,
    pub water_type: WaterType,
    pub result: FishingResult,
    pub fish_caught: Vec<String>,
    pub notes: String,
    pub date: DateTime<Utc>,
}

impl Spot {
    pub fn new(name: impl Into<String>, water_type: WaterType, result: FishingResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            water_type,
            result,
            fish_caught: Vec::new(),
            notes: String::new(),
            date: Utc::now(),
        }
    }
}

// Identity equality, as the journal screens treat edits in place.
impl PartialEq for Spot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Spot {}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneralNotes {
    #[serde(default)]
    pub notes: String,
}

/// Aggregates derived from the full spot list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JournalStats {
    /// Distinct calendar days with at least one outing.
    pub fishing_days: usize,
    /// Most frequent water type, if any spots exist.
    pub favorite_water: Option<WaterType>,
    /// Tally per fish species across all outings.
    pub fish_tallies: BTreeMap<String, u32>,
    /// Outings per result grade.
    pub result_counts: BTreeMap<FishingResult, u32>,
    /// Outings per calendar month, keyed "YYYY-MM".
    pub outings_by_month: BTreeMap<String, u32>,
}

impl JournalStats {
    pub fn from_spots(spots: &[Spot]) -> Self {
        let fishing_days = spots
            .iter()
            .map(|s| s.date.date_naive())
            .collect::<HashSet<_>>()
            .len();

        let mut water_counts: BTreeMap<&'static str, u32> = BTreeMap::new();
        let mut favorite: Option<(WaterType, u32)> = None;
        for spot in spots {
            let n = water_counts.entry(spot.water_type.as_str()).or_insert(0);
            *n += 1;
            match favorite {
                Some((_, best)) if *n <= best => {}
                _ => favorite = Some((spot.water_type, *n)),
            }
        }

        let mut fish_tallies: BTreeMap<String, u32> = BTreeMap::new();
        for fish in spots.iter().flat_map(|s| s.fish_caught.iter()) {
            *fish_tallies.entry(fish.clone()).or_insert(0) += 1;
        }

        let mut result_counts: BTreeMap<FishingResult, u32> = BTreeMap::new();
        let mut outings_by_month: BTreeMap<String, u32> = BTreeMap::new();
        for spot in spots {
            *result_counts.entry(spot.result).or_insert(0) += 1;
            let month = format!("{:04}-{:02}", spot.date.year(), spot.date.month());
            *outings_by_month.entry(month).or_insert(0) += 1;
        }

        Self {
            fishing_days,
            favorite_water: favorite.map(|(w, _)| w),
            fish_tallies,
            result_counts,
            outings_by_month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spot_on(day: u32, water: WaterType, result: FishingResult, fish: &[&str]) -> Spot {
        let mut spot = Spot::new("Test bank", water, result);
        spot.date = Utc.with_ymd_and_hms(2026, 5, day, 6, 30, 0).unwrap();
        spot.fish_caught = fish.iter().map(|s| s.to_string()).collect();
        spot
    }

    #[test]
    fn stats_over_empty_journal_are_zeroed() {
        let stats = JournalStats::from_spots(&[]);
        assert_eq!(stats.fishing_days, 0);
        assert_eq!(stats.favorite_water, None);
        assert!(stats.fish_tallies.is_empty());
    }

    #[test]
    fn stats_count_days_species_and_months() {
        let spots = vec![
            spot_on(3, WaterType::Lake, FishingResult::Good, &["Pike", "Perch"]),
            spot_on(3, WaterType::Lake, FishingResult::Poor, &["Pike"]),
            spot_on(9, WaterType::River, FishingResult::Excellent, &["Trout"]),
        ];
        let stats = JournalStats::from_spots(&spots);
        assert_eq!(stats.fishing_days, 2);
        assert_eq!(stats.favorite_water, Some(WaterType::Lake));
        assert_eq!(stats.fish_tallies.get("Pike"), Some(&2));
        assert_eq!(stats.result_counts.get(&FishingResult::Good), Some(&1));
        assert_eq!(stats.outings_by_month.get("2026-05"), Some(&3));
    }

    #[test]
    fn spot_equality_is_by_id() {
        let a = Spot::new("North pier", WaterType::Sea, FishingResult::Good);
        let mut b = a.clone();
        b.name = "Renamed".into();
        assert_eq!(a, b);
        let c = Spot::new("North pier", WaterType::Sea, FishingResult::Good);
        assert_ne!(a, c);
    }

    #[test]
    fn spot_blobs_round_trip_with_camel_case_keys() {
        let spot = Spot::new("Reed bay", WaterType::Pond, FishingResult::Excellent);
        let value = serde_json::to_value(&spot).expect("serialize spot");
        assert!(value.get("waterType").is_some());
        assert!(value.get("fishCaught").is_some());
        let back: Spot = serde_json::from_value(value).expect("deserialize spot");
        assert_eq!(back, spot);
    }
}
