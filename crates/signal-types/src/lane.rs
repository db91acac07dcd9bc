//! Intersection approaches and the per-lane container used throughout the
//! engine.
//!
//! A four-way intersection has exactly four approaches. Their enumeration
//! order (`north`, `south`, `east`, `west`) is fixed and determines the
//! order of every output, including emergency tie-breaks. The order carries
//! no traffic-engineering meaning.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A lane identifier that is not one of the four known approaches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid lane identifier: {value:?} (expected one of north, south, east, west)")]
pub struct InvalidLaneError {
    /// The offending identifier exactly as it was supplied.
    pub value: String,
}

/// One of the four fixed approaches of the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Lane {
    /// Northern approach.
    North,
    /// Southern approach.
    South,
    /// Eastern approach.
    East,
    /// Western approach.
    West,
}

impl Lane {
    /// All lanes in fixed enumeration order.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Lowercase wire name of the lane.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = InvalidLaneError;

    /// Parse a lane name. Matching ignores ASCII case and surrounding
    /// whitespace; anything else is rejected with the original text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Self::North),
            "south" => Ok(Self::South),
            "east" => Ok(Self::East),
            "west" => Ok(Self::West),
            _ => Err(InvalidLaneError {
                value: s.to_owned(),
            }),
        }
    }
}

/// A value for every lane, addressed by [`Lane`] rather than by index.
///
/// Iteration always follows [`Lane::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LaneMap<T> {
    /// Value for the northern approach.
    pub north: T,
    /// Value for the southern approach.
    pub south: T,
    /// Value for the eastern approach.
    pub east: T,
    /// Value for the western approach.
    pub west: T,
}

impl<T> LaneMap<T> {
    /// Build a map by evaluating `f` once per lane in enumeration order.
    pub fn from_fn(mut f: impl FnMut(Lane) -> T) -> Self {
        Self {
            north: f(Lane::North),
            south: f(Lane::South),
            east: f(Lane::East),
            west: f(Lane::West),
        }
    }

    /// Borrow the value for `lane`.
    pub const fn get(&self, lane: Lane) -> &T {
        match lane {
            Lane::North => &self.north,
            Lane::South => &self.south,
            Lane::East => &self.east,
            Lane::West => &self.west,
        }
    }

    /// Mutably borrow the value for `lane`.
    pub const fn get_mut(&mut self, lane: Lane) -> &mut T {
        match lane {
            Lane::North => &mut self.north,
            Lane::South => &mut self.south,
            Lane::East => &mut self.east,
            Lane::West => &mut self.west,
        }
    }

    /// Transform every value, keeping the lane association.
    pub fn map<U>(self, mut f: impl FnMut(Lane, T) -> U) -> LaneMap<U> {
        LaneMap {
            north: f(Lane::North, self.north),
            south: f(Lane::South, self.south),
            east: f(Lane::East, self.east),
            west: f(Lane::West, self.west),
        }
    }

    /// Iterate `(lane, &value)` pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> {
        Lane::ALL.into_iter().map(move |lane| (lane, self.get(lane)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_lanes_case_insensitively() {
        assert_eq!("north".parse::<Lane>().unwrap(), Lane::North);
        assert_eq!("South".parse::<Lane>().unwrap(), Lane::South);
        assert_eq!(" EAST ".parse::<Lane>().unwrap(), Lane::East);
        assert_eq!("west".parse::<Lane>().unwrap(), Lane::West);
    }

    #[test]
    fn rejects_unknown_lane_with_original_text() {
        let err = "northeast".parse::<Lane>().unwrap_err();
        assert_eq!(err.value, "northeast");
        assert!(err.to_string().contains("northeast"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Lane::East).unwrap();
        assert_eq!(json, "\"east\"");
        let lane: Lane = serde_json::from_str("\"west\"").unwrap();
        assert_eq!(lane, Lane::West);
    }

    #[test]
    fn lane_map_iterates_in_fixed_order() {
        let map = LaneMap::from_fn(Lane::as_str);
        let order: Vec<Lane> = map.iter().map(|(lane, _)| lane).collect();
        assert_eq!(order, Lane::ALL.to_vec());
        assert_eq!(*map.get(Lane::East), "east");
    }

    #[test]
    fn lane_map_get_mut_targets_one_lane() {
        let mut map = LaneMap::<u32>::default();
        *map.get_mut(Lane::South) = 7;
        assert_eq!(map.south, 7);
        assert_eq!(map.north, 0);
        assert_eq!(map.east, 0);
        assert_eq!(map.west, 0);
    }
}
