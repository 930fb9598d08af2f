use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub title: String,
    pub description: String,
    pub cover_image: String,
    pub start_at: String, // ISO-8601
    pub end_at: String,
    pub timezone: String, // IANA name, GMT±N, or 3-4 letter abbreviation
    pub location: Location,
    pub category: String,
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "location_type", rename_all = "UPPERCASE")]
pub enum Location {
    Google {
        place_id: String,
        name: String,
        full_address: String,
        address: String,
        city: String,
        country: String,
        postal_code: String,
        description: String,
    },
    Virtual {
        name: String,
        description: String,
    },
    Custom {
        name: String,
        full_address: String,
        address: String,
        city: String,
        country: String,
        postal_code: String,
        description: String,
    },
}

impl Location {
    pub fn custom_named(name: impl Into<String>) -> Self {
        Location::Custom {
            name: name.into(),
            full_address: String::new(),
            address: String::new(),
            city: String::new(),
            country: String::new(),
            postal_code: String::new(),
            description: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Location::Google { name, .. }
            | Location::Virtual { name, .. }
            | Location::Custom { name, .. } => name,
        }
    }

    pub fn city(&self) -> &str {
        match self {
            Location::Google { city, .. } | Location::Custom { city, .. } => city,
            Location::Virtual { .. } => "",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlaceDetails {
    pub name: String,
    pub address: String,
    pub full_address: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
}
