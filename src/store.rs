use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder, TransactionTrait, sea_query::Expr,
};

use crate::{
    entities::{actor, movie},
    error::{ApiError, ApiResult},
    models::{NewActor, NewMovie, UpdateActor, UpdateMovie},
};

/// Persistence layer around an explicitly passed connection. Writes that span
/// more than one statement run inside a transaction; a dropped transaction
/// rolls back.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn movies(&self) -> ApiResult<Vec<(movie::Model, Vec<actor::Model>)>> {
        Ok(movie::Entity::find().find_with_related(actor::Entity).all(&self.db).await?)
    }

    pub async fn actors(&self) -> ApiResult<Vec<actor::Model>> {
        Ok(actor::Entity::find().order_by_asc(actor::Column::Id).all(&self.db).await?)
    }

    pub async fn create_movie(&self, new: NewMovie) -> ApiResult<movie::Model> {
        let model = movie::ActiveModel {
            title: Set(new.title),
            release_date: Set(new.release_date),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn update_movie(
        &self,
        id: i32,
        fields: UpdateMovie,
    ) -> ApiResult<(movie::Model, Vec<actor::Model>)> {
        let txn = self.db.begin().await?;

        let Some(existing) = movie::Entity::find_by_id(id).one(&txn).await? else {
            return Err(ApiError::NotFound("Movie not found.".to_string()));
        };

        let changed = fields.title.is_some() || fields.release_date.is_some();
        let mut active: movie::ActiveModel = existing.clone().into();
        if let Some(title) = fields.title {
            active.title = Set(title);
        }
        if let Some(release_date) = fields.release_date {
            active.release_date = Set(release_date);
        }

        let updated = if changed { active.update(&txn).await? } else { existing };
        let actors = actor::Entity::find()
            .filter(actor::Column::MovieId.eq(id))
            .order_by_asc(actor::Column::Id)
            .all(&txn)
            .await?;

        txn.commit().await?;
        Ok((updated, actors))
    }

    /// Deletes a movie, detaching its actors first so they survive with a
    /// null `movie_id`.
    pub async fn delete_movie(&self, id: i32) -> ApiResult<i32> {
        let txn = self.db.begin().await?;

        let Some(existing) = movie::Entity::find_by_id(id).one(&txn).await? else {
            return Err(ApiError::NotFound("Movie not found.".to_string()));
        };

        actor::Entity::update_many()
            .col_expr(actor::Column::MovieId, Expr::value(sea_orm::Value::Int(None)))
            .filter(actor::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;

        existing.delete(&txn).await?;
        txn.commit().await?;
        Ok(id)
    }

    pub async fn create_actor(&self, new: NewActor) -> ApiResult<actor::Model> {
        let txn = self.db.begin().await?;

        ensure_movie_exists(&txn, new.movie_id).await?;
        let model = actor::ActiveModel {
            name: Set(new.name),
            age: Set(new.age),
            gender: Set(new.gender),
            movie_id: Set(Some(new.movie_id)),
            ..Default::default()
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;
        Ok(created)
    }

    pub async fn update_actor(&self, id: i32, fields: UpdateActor) -> ApiResult<actor::Model> {
        let txn = self.db.begin().await?;

        let Some(existing) = actor::Entity::find_by_id(id).one(&txn).await? else {
            return Err(ApiError::NotFound("Actor not found.".to_string()));
        };

        if let Some(movie_id) = fields.movie_id {
            ensure_movie_exists(&txn, movie_id).await?;
        }

        let changed = fields.name.is_some()
            || fields.age.is_some()
            || fields.gender.is_some()
            || fields.movie_id.is_some();
        let mut active: actor::ActiveModel = existing.clone().into();
        if let Some(name) = fields.name {
            active.name = Set(name);
        }
        if let Some(age) = fields.age {
            active.age = Set(age);
        }
        if let Some(gender) = fields.gender {
            active.gender = Set(gender);
        }
        if let Some(movie_id) = fields.movie_id {
            active.movie_id = Set(Some(movie_id));
        }

        let updated = if changed { active.update(&txn).await? } else { existing };
        txn.commit().await?;
        Ok(updated)
    }

    pub async fn delete_actor(&self, id: i32) -> ApiResult<i32> {
        let Some(existing) = actor::Entity::find_by_id(id).one(&self.db).await? else {
            return Err(ApiError::NotFound("Actor not found.".to_string()));
        };
        existing.delete(&self.db).await?;
        Ok(id)
    }
}

async fn ensure_movie_exists<C: ConnectionTrait>(conn: &C, movie_id: i32) -> ApiResult<()> {
    if movie::Entity::find_by_id(movie_id).one(conn).await?.is_none() {
        return Err(ApiError::BadRequest(format!("Movie {movie_id} does not exist.")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::testutil;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn store() -> Store {
        Store::new(testutil::memory_db().await)
    }

    async fn seed_movie(store: &Store) -> movie::Model {
        store
            .create_movie(NewMovie { title: "Cast Away".to_string(), release_date: date("2000-12-22") })
            .await
            .unwrap()
    }

    async fn seed_actor(store: &Store, movie_id: i32) -> actor::Model {
        store
            .create_actor(NewActor {
                name: "Tom Hanks".to_string(),
                age: 54,
                gender: "Male".to_string(),
                movie_id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn movie_crud_roundtrip() {
        let store = store().await;

        let created = seed_movie(&store).await;
        assert_eq!(created.title, "Cast Away");

        let (updated, _) = store
            .update_movie(created.id, UpdateMovie { title: Some("Cast Away 2".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.title, "Cast Away 2");
        assert_eq!(updated.release_date, date("2000-12-22"));

        let deleted = store.delete_movie(created.id).await.unwrap();
        assert_eq!(deleted, created.id);
        assert!(store.movies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_missing_movie_is_not_found() {
        let store = store().await;
        let err = store.update_movie(99, UpdateMovie::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_missing_actor_is_not_found() {
        let store = store().await;
        let err = store.delete_actor(99).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn actor_requires_existing_movie() {
        let store = store().await;
        let err = store
            .create_actor(NewActor {
                name: "Tom Hanks".to_string(),
                age: 54,
                gender: "Male".to_string(),
                movie_id: 41,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(store.actors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn actor_update_rejects_unknown_movie() {
        let store = store().await;
        let movie = seed_movie(&store).await;
        let actor = seed_actor(&store, movie.id).await;

        let err = store
            .update_actor(actor.id, UpdateActor { movie_id: Some(999), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        // failed update leaves the record untouched
        let actors = store.actors().await.unwrap();
        assert_eq!(actors[0].movie_id, Some(movie.id));
    }

    #[tokio::test]
    async fn partial_actor_update_preserves_other_fields() {
        let store = store().await;
        let movie = seed_movie(&store).await;
        let actor = seed_actor(&store, movie.id).await;

        let updated = store
            .update_actor(actor.id, UpdateActor { age: Some(55), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.age, 55);
        assert_eq!(updated.name, "Tom Hanks");
        assert_eq!(updated.gender, "Male");
        assert_eq!(updated.movie_id, Some(movie.id));
    }

    #[tokio::test]
    async fn deleting_movie_detaches_actors() {
        let store = store().await;
        let movie = seed_movie(&store).await;
        let actor = seed_actor(&store, movie.id).await;

        store.delete_movie(movie.id).await.unwrap();

        let actors = store.actors().await.unwrap();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].id, actor.id);
        assert_eq!(actors[0].movie_id, None);
    }

    #[tokio::test]
    async fn listing_movies_embeds_actors() {
        let store = store().await;
        let movie = seed_movie(&store).await;
        seed_actor(&store, movie.id).await;

        let movies = store.movies().await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].1.len(), 1);
        assert_eq!(movies[0].1[0].name, "Tom Hanks");
    }
}
