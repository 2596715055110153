// Choice lists offered by the quick project intake

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownChoiceError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! choice_list {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($id:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $id)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $id),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownChoiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|choice| choice.as_str() == s)
                    .ok_or_else(|| UnknownChoiceError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

choice_list! {
    /// Kind of building work
    ProjectType, "project type" {
        Extension => ("extension", "Extension"),
        LoftConversion => ("loft_conversion", "Loft Conversion"),
        NewBuild => ("new_build", "New Build"),
        Renovation => ("renovation", "Renovation"),
        GardenBuilding => ("garden_building", "Garden Room / Outbuilding"),
        InteriorRemodel => ("interior_remodel", "Interior Remodeling"),
        Other => ("other", "Other Project Type"),
    }
}

choice_list! {
    BudgetRange, "budget range" {
        Under10k => ("under_10k", "Under £10,000"),
        From10kTo25k => ("10k_25k", "£10,000 - £25,000"),
        From25kTo50k => ("25k_50k", "£25,000 - £50,000"),
        From50kTo100k => ("50k_100k", "£50,000 - £100,000"),
        From100kTo250k => ("100k_250k", "£100,000 - £250,000"),
        Over250k => ("over_250k", "Over £250,000"),
        NotSure => ("not_sure", "Not sure yet"),
    }
}

choice_list! {
    /// How soon the homeowner wants work to start
    Timeline, "timeline" {
        Asap => ("asap", "As soon as possible"),
        OneToThreeMonths => ("1_3_months", "1-3 months"),
        ThreeToSixMonths => ("3_6_months", "3-6 months"),
        SixToTwelveMonths => ("6_12_months", "6-12 months"),
        MoreThanTwelve => ("more_than_12", "More than 12 months"),
        NotSure => ("not_sure", "Not sure yet"),
    }
}

choice_list! {
    PropertyType, "property type" {
        Residential => ("residential", "Residential"),
        Commercial => ("commercial", "Commercial"),
        MixedUse => ("mixed_use", "Mixed Use"),
        Land => ("land", "Land"),
    }
}

impl Default for PropertyType {
    fn default() -> Self {
        PropertyType::Residential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uses_stored_ids() {
        assert_eq!("loft_conversion".parse(), Ok(ProjectType::LoftConversion));
        assert_eq!("10k_25k".parse(), Ok(BudgetRange::From10kTo25k));
        assert_eq!("1_3_months".parse(), Ok(Timeline::OneToThreeMonths));

        let err = "bungalow".parse::<PropertyType>().unwrap_err();
        assert_eq!(err.kind, "property type");
        assert_eq!(err.to_string(), "unknown property type: bungalow");
    }

    #[test]
    fn test_serde_uses_stored_ids() {
        let json = serde_json::to_string(&ProjectType::GardenBuilding).unwrap();
        assert_eq!(json, "\"garden_building\"");
        let parsed: Timeline = serde_json::from_str("\"more_than_12\"").unwrap();
        assert_eq!(parsed, Timeline::MoreThanTwelve);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ProjectType::GardenBuilding.label(), "Garden Room / Outbuilding");
        assert_eq!(PropertyType::default().label(), "Residential");
        assert_eq!(BudgetRange::ALL.len(), 7);
    }
}
