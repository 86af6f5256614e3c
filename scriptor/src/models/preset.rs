use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingSpeed {
    Fast,
    #[default]
    Balanced,
    High,
    Maximum,
}

impl ProcessingSpeed {
    pub const ALL: [ProcessingSpeed; 4] = [Self::Fast, Self::Balanced, Self::High, Self::Maximum];
}

impl std::fmt::Display for ProcessingSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::High => write!(f, "high"),
            Self::Maximum => write!(f, "maximum"),
        }
    }
}

impl std::str::FromStr for ProcessingSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            "maximum" | "max" => Ok(Self::Maximum),
            _ => Err(format!("Unknown processing speed: {s}")),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyLevel {
    Low,
    Medium,
    #[default]
    High,
    Maximum,
}

impl AccuracyLevel {
    pub const ALL: [AccuracyLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Maximum];
}

impl std::fmt::Display for AccuracyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Maximum => write!(f, "maximum"),
        }
    }
}

impl std::str::FromStr for AccuracyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "maximum" | "max" => Ok(Self::Maximum),
            _ => Err(format!("Unknown accuracy level: {s}")),
        }
    }
}

/// The human-facing quality knob pair a request carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, utoipa::ToSchema,
)]
pub struct SpeedAccuracyPreset {
    pub speed: ProcessingSpeed,
    pub accuracy: AccuracyLevel,
}

impl SpeedAccuracyPreset {
    pub fn new(speed: ProcessingSpeed, accuracy: AccuracyLevel) -> Self {
        Self { speed, accuracy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_balanced_and_high() {
        let preset = SpeedAccuracyPreset::default();
        assert_eq!(preset.speed, ProcessingSpeed::Balanced);
        assert_eq!(preset.accuracy, AccuracyLevel::High);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for speed in ProcessingSpeed::ALL {
            assert_eq!(speed.to_string().parse::<ProcessingSpeed>().unwrap(), speed);
        }
        for accuracy in AccuracyLevel::ALL {
            assert_eq!(
                accuracy.to_string().parse::<AccuracyLevel>().unwrap(),
                accuracy
            );
        }
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!("turbo".parse::<ProcessingSpeed>().is_err());
        assert!("perfect".parse::<AccuracyLevel>().is_err());
    }
}
