//! The three collections served by the service and their field layout.
//!
//! Visits carry copies of selected User and Location fields ("shadow
//! fields") so that filtered visit reads never need to join.

pub mod fields;

use crate::core::{CollectionSchema, Field, Result};
use crate::storage::EntityStore;
use std::fmt;

pub use fields::merge_json;

pub const USERS: &str = "users";
pub const LOCATIONS: &str = "locations";
pub const VISITS: &str = "visits";

pub const ID: &str = "id";
pub const GENDER: &str = "gender";
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const BIRTH_DATE: &str = "birth_date";
pub const EMAIL: &str = "email";
pub const PLACE: &str = "place";
pub const CITY: &str = "city";
pub const COUNTRY: &str = "country";
pub const DISTANCE: &str = "distance";
pub const USER: &str = "user";
pub const LOCATION: &str = "location";
pub const VISITED_AT: &str = "visited_at";
pub const MARK: &str = "mark";

/// Location fields copied onto every visit.
pub const LOCATION_SHADOW_FIELDS: [&str; 3] = [PLACE, COUNTRY, DISTANCE];
/// User fields copied onto every visit.
pub const USER_SHADOW_FIELDS: [&str; 2] = [GENDER, BIRTH_DATE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Location,
    Visit,
}

impl EntityKind {
    /// Referenced collections come first, so visits can be denormalized as
    /// they are loaded.
    pub const LOAD_ORDER: [EntityKind; 3] = [Self::User, Self::Location, Self::Visit];

    pub fn collection(self) -> &'static str {
        match self {
            Self::User => USERS,
            Self::Location => LOCATIONS,
            Self::Visit => VISITS,
        }
    }

    /// Fields returned by a point read, in response order.
    pub fn public_fields(self) -> &'static [&'static str] {
        match self {
            Self::User => &[ID, GENDER, FIRST_NAME, LAST_NAME, BIRTH_DATE, EMAIL],
            Self::Location => &[ID, PLACE, CITY, COUNTRY, DISTANCE],
            Self::Visit => &[ID, USER, LOCATION, VISITED_AT, MARK],
        }
    }

    pub fn schema(self) -> Result<CollectionSchema> {
        let fields = match self {
            Self::User => vec![
                Field::integer(ID).primary_key(),
                Field::text(GENDER),
                Field::text(FIRST_NAME),
                Field::text(LAST_NAME),
                Field::integer(BIRTH_DATE),
                Field::text(EMAIL),
            ],
            Self::Location => vec![
                Field::integer(ID).primary_key(),
                Field::text(PLACE),
                Field::text(CITY),
                Field::text(COUNTRY),
                Field::integer(DISTANCE),
            ],
            Self::Visit => vec![
                Field::integer(ID).primary_key(),
                Field::integer(USER).indexed(),
                Field::integer(LOCATION).indexed(),
                Field::integer(VISITED_AT).indexed(),
                Field::integer(MARK).default_value(1),
                Field::integer(DISTANCE).indexed(),
                Field::text(COUNTRY).indexed(),
                Field::text(PLACE),
                Field::text(GENDER).indexed(),
                Field::integer(BIRTH_DATE).indexed(),
            ],
        };
        CollectionSchema::new(self.collection(), fields)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Declares any of the three collections that do not exist yet.
pub async fn declare_collections(store: &dyn EntityStore) -> Result<()> {
    for kind in EntityKind::LOAD_ORDER {
        if !store.collection_exists(kind.collection()).await {
            store.create_collection(kind.schema()?).await?;
        }
    }
    Ok(())
}
