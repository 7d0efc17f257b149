use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::{actor, movie};

/// Create bodies keep every field optional so validation can name all of the
/// missing ones in a single response instead of failing at deserialization.
#[derive(Debug, Deserialize)]
pub struct CreateMovie {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug)]
pub struct NewMovie {
    pub title: String,
    pub release_date: NaiveDate,
}

impl CreateMovie {
    pub fn validate(self) -> Result<NewMovie, Vec<&'static str>> {
        match (self.title, self.release_date) {
            (Some(title), Some(release_date)) => Ok(NewMovie { title, release_date }),
            (title, release_date) => {
                let mut missing = Vec::new();
                if title.is_none() {
                    missing.push("title");
                }
                if release_date.is_none() {
                    missing.push("release_date");
                }
                Err(missing)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateActor {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub movie_id: Option<i32>,
}

#[derive(Debug)]
pub struct NewActor {
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub movie_id: i32,
}

impl CreateActor {
    pub fn validate(self) -> Result<NewActor, Vec<&'static str>> {
        match (self.name, self.age, self.gender, self.movie_id) {
            (Some(name), Some(age), Some(gender), Some(movie_id)) => {
                Ok(NewActor { name, age, gender, movie_id })
            }
            (name, age, gender, movie_id) => {
                let mut missing = Vec::new();
                if name.is_none() {
                    missing.push("name");
                }
                if age.is_none() {
                    missing.push("age");
                }
                if gender.is_none() {
                    missing.push("gender");
                }
                if movie_id.is_none() {
                    missing.push("movie_id");
                }
                Err(missing)
            }
        }
    }
}

/// Partial-update bodies; only supplied fields are written.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovie {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateActor {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub movie_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ActorJson {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub movie_id: Option<i32>,
}

impl From<actor::Model> for ActorJson {
    fn from(actor: actor::Model) -> Self {
        Self {
            id: actor.id,
            name: actor.name,
            age: actor.age,
            gender: actor.gender,
            movie_id: actor.movie_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieJson {
    pub id: i32,
    pub title: String,
    pub release_date: NaiveDate,
    pub actors: Vec<ActorJson>,
}

impl MovieJson {
    pub fn new(movie: movie::Model, actors: Vec<actor::Model>) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            release_date: movie.release_date,
            actors: actors.into_iter().map(ActorJson::from).collect(),
        }
    }
}
