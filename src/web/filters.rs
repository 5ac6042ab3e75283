use super::WebError;
use crate::model::{BIRTH_DATE, COUNTRY, DISTANCE, GENDER, VISITED_AT};
use crate::storage::{Cond, Query};
use std::collections::HashMap;

pub type Params = HashMap<String, String>;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Seconds in `age` years, with one leap day per started four years.
/// `None` when the result does not fit in an `i64`.
pub fn years(age: i64) -> Option<i64> {
    let days = age.checked_mul(365)?.checked_add(age.checked_add(3)? / 4)?;
    days.checked_mul(SECONDS_PER_DAY)
}

/// Birth-date bound for an age filter.
fn born_before(now: i64, age: i64, name: &str) -> Result<i64, WebError> {
    years(age)
        .and_then(|span| now.checked_sub(span))
        .ok_or_else(|| WebError::Input(format!("{} is out of range", name)))
}

/// Rounds half up to five decimals.
pub fn round5(value: f64) -> f64 {
    (0.5 + value * 100_000.0).floor() / 100_000.0
}

/// Integer query parameter. Absent and empty values are skipped.
fn int_param(params: &Params, name: &str) -> Result<Option<i64>, WebError> {
    match params.get(name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| WebError::Input(format!("can't convert {} to number", name))),
    }
}

fn text_param<'p>(params: &'p Params, name: &str) -> Option<&'p str> {
    params.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

/// Filters of `GET /users/{id}/visits`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VisitFilter {
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub country: Option<String>,
    pub to_distance: Option<i64>,
}

impl VisitFilter {
    pub fn from_params(params: &Params) -> Result<Self, WebError> {
        Ok(Self {
            from_date: int_param(params, "fromDate")?,
            to_date: int_param(params, "toDate")?,
            country: text_param(params, "country").map(str::to_string),
            to_distance: int_param(params, "toDistance")?,
        })
    }

    pub fn apply(&self, mut query: Query) -> Query {
        if let Some(from) = self.from_date {
            query = query.filter(VISITED_AT, Cond::Gt, from);
        }
        if let Some(to) = self.to_date {
            query = query.filter(VISITED_AT, Cond::Lt, to);
        }
        if let Some(country) = &self.country {
            query = query.filter(COUNTRY, Cond::Eq, country.as_str());
        }
        if let Some(distance) = self.to_distance {
            query = query.filter(DISTANCE, Cond::Lt, distance);
        }
        query
    }
}

/// Filters of `GET /locations/{id}/avg`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AvgFilter {
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub from_age: Option<i64>,
    pub to_age: Option<i64>,
    pub gender: Option<String>,
}

impl AvgFilter {
    pub fn from_params(params: &Params) -> Result<Self, WebError> {
        let gender = match text_param(params, "gender") {
            Some(g @ ("m" | "f")) => Some(g.to_string()),
            Some(other) => return Err(WebError::Input(format!("invalid gender value '{}'", other))),
            None => None,
        };

        Ok(Self {
            from_date: int_param(params, "fromDate")?,
            to_date: int_param(params, "toDate")?,
            from_age: int_param(params, "fromAge")?,
            to_age: int_param(params, "toAge")?,
            gender,
        })
    }

    /// Ages are measured against `now` (unix seconds).
    pub fn apply(&self, mut query: Query, now: i64) -> Result<Query, WebError> {
        if let Some(from) = self.from_date {
            query = query.filter(VISITED_AT, Cond::Gt, from);
        }
        if let Some(to) = self.to_date {
            query = query.filter(VISITED_AT, Cond::Lt, to);
        }
        if let Some(age) = self.from_age {
            query = query.filter(BIRTH_DATE, Cond::Lt, born_before(now, age, "fromAge")?);
        }
        if let Some(age) = self.to_age {
            query = query.filter(BIRTH_DATE, Cond::Gt, born_before(now, age, "toAge")?);
        }
        if let Some(gender) = &self.gender {
            query = query.filter(GENDER, Cond::Eq, gender.as_str());
        }
        Ok(query)
    }
}
