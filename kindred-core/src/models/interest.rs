use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestCategory {
    Hobbies,
    Sports,
    Music,
    Movies,
    Food,
    Travel,
    Reading,
    Technology,
    Art,
    Fitness,
    Gaming,
    Nature,
    Other,
}

impl InterestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestCategory::Hobbies => "hobbies",
            InterestCategory::Sports => "sports",
            InterestCategory::Music => "music",
            InterestCategory::Movies => "movies",
            InterestCategory::Food => "food",
            InterestCategory::Travel => "travel",
            InterestCategory::Reading => "reading",
            InterestCategory::Technology => "technology",
            InterestCategory::Art => "art",
            InterestCategory::Fitness => "fitness",
            InterestCategory::Gaming => "gaming",
            InterestCategory::Nature => "nature",
            InterestCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for InterestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hobbies" => Ok(InterestCategory::Hobbies),
            "sports" => Ok(InterestCategory::Sports),
            "music" => Ok(InterestCategory::Music),
            "movies" => Ok(InterestCategory::Movies),
            "food" => Ok(InterestCategory::Food),
            "travel" => Ok(InterestCategory::Travel),
            "reading" => Ok(InterestCategory::Reading),
            "technology" => Ok(InterestCategory::Technology),
            "art" => Ok(InterestCategory::Art),
            "fitness" => Ok(InterestCategory::Fitness),
            "gaming" => Ok(InterestCategory::Gaming),
            "nature" => Ok(InterestCategory::Nature),
            "other" => Ok(InterestCategory::Other),
            _ => Err(format!("unknown interest category: {s}")),
        }
    }
}

/// A selectable profile interest. Profiles store interest ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interest {
    pub id: i32,
    pub name: String,
    pub category: InterestCategory,
}

/// Seed catalog. The migration inserts the same rows.
pub const DEFAULT_INTERESTS: &[(i32, &str, InterestCategory)] = &[
    (1, "Photography", InterestCategory::Hobbies),
    (2, "Board games", InterestCategory::Hobbies),
    (3, "Football", InterestCategory::Sports),
    (4, "Basketball", InterestCategory::Sports),
    (5, "Tennis", InterestCategory::Sports),
    (6, "Live music", InterestCategory::Music),
    (7, "Playing an instrument", InterestCategory::Music),
    (8, "Cinema", InterestCategory::Movies),
    (9, "Documentaries", InterestCategory::Movies),
    (10, "Cooking", InterestCategory::Food),
    (11, "Coffee", InterestCategory::Food),
    (12, "Backpacking", InterestCategory::Travel),
    (13, "Road trips", InterestCategory::Travel),
    (14, "Fiction", InterestCategory::Reading),
    (15, "Poetry", InterestCategory::Reading),
    (16, "Programming", InterestCategory::Technology),
    (17, "Gadgets", InterestCategory::Technology),
    (18, "Painting", InterestCategory::Art),
    (19, "Museums", InterestCategory::Art),
    (20, "Running", InterestCategory::Fitness),
    (21, "Yoga", InterestCategory::Fitness),
    (22, "Video games", InterestCategory::Gaming),
    (23, "Hiking", InterestCategory::Nature),
    (24, "Camping", InterestCategory::Nature),
    (25, "Volunteering", InterestCategory::Other),
];

pub fn default_interests() -> Vec<Interest> {
    DEFAULT_INTERESTS
        .iter()
        .map(|(id, name, category)| Interest {
            id: *id,
            name: (*name).to_string(),
            category: *category,
        })
        .collect()
}
