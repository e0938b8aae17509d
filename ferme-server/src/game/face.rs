//! Die Faces
//!
//! Six faces: five fruits and the `BAR` penalty face.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::game::engine::GameError;

/// One of the five scoring fruits.
///
/// Declaration order is the grid's column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Fruit {
    /// Cherry
    Cerise = 0,
    /// Bell
    Cloche = 1,
    /// Plum
    Prune = 2,
    /// Lemon
    Citron = 3,
    /// Orange
    Orange = 4,
}

impl Fruit {
    /// All fruits in column order.
    pub const ALL: [Fruit; 5] = [
        Fruit::Cerise,
        Fruit::Cloche,
        Fruit::Prune,
        Fruit::Citron,
        Fruit::Orange,
    ];

    /// Wire name of this fruit.
    pub fn as_str(self) -> &'static str {
        match self {
            Fruit::Cerise => "cerise",
            Fruit::Cloche => "cloche",
            Fruit::Prune => "prune",
            Fruit::Citron => "citron",
            Fruit::Orange => "orange",
        }
    }
}

impl fmt::Display for Fruit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fruit {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fruit::ALL
            .into_iter()
            .find(|fruit| fruit.as_str() == s)
            .ok_or_else(|| GameError::InvalidFruit(s.to_string()))
    }
}

/// A face of the die.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    /// Cherry
    #[serde(rename = "cerise")]
    Cerise = 0,
    /// Bell
    #[serde(rename = "cloche")]
    Cloche = 1,
    /// Plum
    #[serde(rename = "prune")]
    Prune = 2,
    /// Lemon
    #[serde(rename = "citron")]
    Citron = 3,
    /// Orange
    #[serde(rename = "orange")]
    Orange = 4,
    /// Penalty face
    #[serde(rename = "BAR")]
    Bar = 5,
}

impl Face {
    /// All faces, one per side of the die.
    pub const ALL: [Face; 6] = [
        Face::Cerise,
        Face::Cloche,
        Face::Prune,
        Face::Citron,
        Face::Orange,
        Face::Bar,
    ];

    /// The fruit on this face, or `None` for `BAR`.
    pub fn fruit(self) -> Option<Fruit> {
        match self {
            Face::Cerise => Some(Fruit::Cerise),
            Face::Cloche => Some(Fruit::Cloche),
            Face::Prune => Some(Fruit::Prune),
            Face::Citron => Some(Fruit::Citron),
            Face::Orange => Some(Fruit::Orange),
            Face::Bar => None,
        }
    }

    /// Is this the penalty face?
    #[inline]
    pub fn is_bar(self) -> bool {
        self == Face::Bar
    }

    /// Wire name of this face.
    pub fn as_str(self) -> &'static str {
        match self.fruit() {
            Some(fruit) => fruit.as_str(),
            None => "BAR",
        }
    }
}

impl From<Fruit> for Face {
    fn from(fruit: Fruit) -> Self {
        match fruit {
            Fruit::Cerise => Face::Cerise,
            Fruit::Cloche => Face::Cloche,
            Fruit::Prune => Face::Prune,
            Fruit::Citron => Face::Citron,
            Fruit::Orange => Face::Orange,
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fruit() {
        for fruit in Fruit::ALL {
            assert_eq!(fruit.as_str().parse::<Fruit>().unwrap(), fruit);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!("banane".parse::<Fruit>(), Err(GameError::InvalidFruit(s)) if s == "banane"));
        // BAR is a face, never a fruit argument
        assert!("BAR".parse::<Fruit>().is_err());
        // Names are case sensitive on the wire
        assert!("Cerise".parse::<Fruit>().is_err());
    }

    #[test]
    fn test_face_fruit_mapping() {
        for fruit in Fruit::ALL {
            assert_eq!(Face::from(fruit).fruit(), Some(fruit));
        }
        assert_eq!(Face::Bar.fruit(), None);
        assert!(Face::Bar.is_bar());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Face::Bar).unwrap(), "\"BAR\"");
        assert_eq!(serde_json::to_string(&Face::Citron).unwrap(), "\"citron\"");
        assert_eq!(serde_json::to_string(&Fruit::Cloche).unwrap(), "\"cloche\"");
        assert_eq!(Face::Prune.to_string(), "prune");
    }
}
