use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Small,
    Base,
    Large,
}

impl ModelTier {
    fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Base => "base",
            Self::Large => "large",
        }
    }

    pub fn approx_size_bytes(self) -> u64 {
        match self {
            Self::Small => 150_000_000,
            Self::Base => 450_000_000,
            Self::Large => 1_400_000_000,
        }
    }

    fn size_label(self) -> &'static str {
        match self {
            Self::Small => "~150MB",
            Self::Base => "~450MB",
            Self::Large => "~1.4GB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelStyle {
    Handwritten,
    Printed,
}

impl ModelStyle {
    fn as_str(self) -> &'static str {
        match self {
            Self::Handwritten => "handwritten",
            Self::Printed => "printed",
        }
    }
}

/// Key of one installable TrOCR variant, e.g. `large-handwritten`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelType {
    pub tier: ModelTier,
    pub style: ModelStyle,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::new(ModelTier::Small, ModelStyle::Handwritten),
        ModelType::new(ModelTier::Base, ModelStyle::Handwritten),
        ModelType::new(ModelTier::Large, ModelStyle::Handwritten),
        ModelType::new(ModelTier::Small, ModelStyle::Printed),
        ModelType::new(ModelTier::Base, ModelStyle::Printed),
        ModelType::new(ModelTier::Large, ModelStyle::Printed),
    ];

    pub const fn new(tier: ModelTier, style: ModelStyle) -> Self {
        Self { tier, style }
    }

    pub fn repository_id(&self) -> String {
        format!("microsoft/trocr-{self}")
    }

    /// Name of the model's directory under the cache root.
    pub fn cache_dir_name(&self) -> String {
        format!("trocr-{self}")
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            model_type: self.to_string(),
            repository_id: self.repository_id(),
            approx_size_bytes: self.tier.approx_size_bytes(),
            size_label: self.tier.size_label().to_string(),
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::new(ModelTier::Large, ModelStyle::Handwritten)
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.tier.as_str(), self.style.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|model_type| model_type.to_string() == key)
            .ok_or_else(|| {
                let known: Vec<String> = Self::ALL.iter().map(ToString::to_string).collect();
                format!("Unknown model type: {s} (expected one of {})", known.join(", "))
            })
    }
}

impl Serialize for ModelType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Catalog entry describing one installable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ModelDescriptor {
    pub model_type: String,
    pub repository_id: String,
    pub approx_size_bytes: u64,
    pub size_label: String,
}

/// The fixed catalog, in display order.
pub fn catalog() -> Vec<ModelDescriptor> {
    ModelType::ALL.iter().map(ModelType::descriptor).collect()
}
