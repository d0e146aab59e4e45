use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::drink::{default_drink, Drink, DrinkChanges, NewDrink, Recipe};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a drink titled '{0}' already exists")]
    Conflict(String),
    #[error("stored recipe for drink {id} is not a list of ingredients: {source}")]
    CorruptRecipe {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode recipe: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence port for the menu. Each call is a single, independent
/// operation; no transaction spans two calls.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn create(&self, drink: NewDrink) -> StoreResult<Drink>;

    /// Every drink, ordered by id.
    async fn list(&self) -> StoreResult<Vec<Drink>>;

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>>;

    /// Writes only the fields present in `changes`, so concurrent updates of
    /// different fields do not overwrite each other. `None` when the record
    /// does not exist.
    async fn update(&self, id: i64, changes: DrinkChanges) -> StoreResult<Option<Drink>>;

    /// `true` when a record was removed.
    async fn delete(&self, id: i64) -> StoreResult<bool>;

    /// Drop every record, restart id assignment, and seed the default drink.
    async fn reset(&self) -> StoreResult<Drink>;
}

/// Row shape of the `drinks` table; the recipe is JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DrinkRow {
    pub id: i64,
    pub title: String,
    pub recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = StoreError;

    fn try_from(row: DrinkRow) -> StoreResult<Self> {
        let recipe = Recipe::from_stored(&row.recipe)
            .map_err(|source| StoreError::CorruptRecipe { id: row.id, source })?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

#[derive(Clone)]
pub struct PgMenuStore {
    db: PgPool,
}

impl PgMenuStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(err: sqlx::Error, title: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(title.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl MenuStore for PgMenuStore {
    async fn create(&self, drink: NewDrink) -> StoreResult<Drink> {
        let recipe = drink.recipe.to_stored()?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(&drink.title)
        .bind(recipe)
        .fetch_one(&self.db)
        .await
        .map_err(|err| map_write_error(err, &drink.title))?;
        Drink::try_from(row)
    }

    async fn list(&self) -> StoreResult<Vec<Drink>> {
        let rows = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drinks ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(Drink::try_from).collect()
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>> {
        let row = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drinks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Drink::try_from).transpose()
    }

    async fn update(&self, id: i64, changes: DrinkChanges) -> StoreResult<Option<Drink>> {
        let recipe = changes.recipe.as_ref().map(Recipe::to_stored).transpose()?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "UPDATE drinks SET title = COALESCE($1, title), recipe = COALESCE($2, recipe) \
             WHERE id = $3 RETURNING id, title, recipe",
        )
        .bind(changes.title.as_deref())
        .bind(recipe)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|err| map_write_error(err, changes.title.as_deref().unwrap_or_default()))?;
        row.map(Drink::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM drinks WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset(&self) -> StoreResult<Drink> {
        let seed = default_drink();
        let recipe = seed.recipe.to_stored()?;
        let mut tx = self.db.begin().await?;
        sqlx::query("TRUNCATE drinks RESTART IDENTITY")
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drinks (title, recipe) VALUES ($1, $2) RETURNING id, title, recipe",
        )
        .bind(&seed.title)
        .bind(recipe)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Drink::try_from(row)
    }
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<i64, DrinkRow>,
}

impl MemoryState {
    fn title_taken(&self, title: &str, except: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|row| row.title == title && Some(row.id) != except)
    }

    fn insert(&mut self, drink: &NewDrink) -> StoreResult<DrinkRow> {
        if self.title_taken(&drink.title, None) {
            return Err(StoreError::Conflict(drink.title.clone()));
        }
        let recipe = drink.recipe.to_stored()?;
        self.last_id += 1;
        let row = DrinkRow {
            id: self.last_id,
            title: drink.title.clone(),
            recipe,
        };
        self.rows.insert(row.id, row.clone());
        Ok(row)
    }
}

/// Process-local store. Recipes are kept as JSON text, exactly as the
/// database backend stores them.
#[derive(Default)]
pub struct MemoryMenuStore {
    state: Mutex<MemoryState>,
}

impl MemoryMenuStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MenuStore for MemoryMenuStore {
    async fn create(&self, drink: NewDrink) -> StoreResult<Drink> {
        let row = self.lock().insert(&drink)?;
        Drink::try_from(row)
    }

    async fn list(&self) -> StoreResult<Vec<Drink>> {
        let rows: Vec<DrinkRow> = self.lock().rows.values().cloned().collect();
        rows.into_iter().map(Drink::try_from).collect()
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Drink>> {
        let row = self.lock().rows.get(&id).cloned();
        row.map(Drink::try_from).transpose()
    }

    async fn update(&self, id: i64, changes: DrinkChanges) -> StoreResult<Option<Drink>> {
        let recipe = changes.recipe.as_ref().map(Recipe::to_stored).transpose()?;
        let mut state = self.lock();
        if let Some(title) = &changes.title {
            if state.rows.contains_key(&id) && state.title_taken(title, Some(id)) {
                return Err(StoreError::Conflict(title.clone()));
            }
        }
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(recipe) = recipe {
            row.recipe = recipe;
        }
        let row = row.clone();
        drop(state);
        Drink::try_from(row).map(Some)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        Ok(self.lock().rows.remove(&id).is_some())
    }

    async fn reset(&self) -> StoreResult<Drink> {
        let mut state = self.lock();
        *state = MemoryState::default();
        let row = state.insert(&default_drink())?;
        drop(state);
        Drink::try_from(row)
    }
}
