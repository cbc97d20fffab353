/// Generic CRUD repository over PostgreSQL tables
///
/// Every persisted entity implements [`Entity`], which names its table and
/// columns. [`Repository<T>`] then offers the same small set of operations for
/// each of them: get, list, create, partial update, delete and equality
/// filtering. Entity-specific behavior lives in inherent impls on concrete
/// instantiations (for example `impl Repository<User>`) next to each model.
///
/// Values travel as [`Fields`], an ordered list of `(column, value)` pairs.
/// Every column is checked against [`Entity::COLUMNS`] before any SQL is
/// built, so column names are never taken from user input.
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::models::team::Team;
/// use teamdesk_shared::repository::{Fields, Repository};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let teams = Repository::<Team>::new(pool);
///
/// let team = teams.create(Fields::new().set("name", "Platform")).await?;
/// let renamed = teams.update(team.id, Fields::new().set("name", "Core")).await?;
/// assert_eq!(renamed.map(|t| t.name), Some("Core".to_string()));
///
/// teams.delete(team.id).await?;
/// # Ok(())
/// # }
/// ```

use std::marker::PhantomData;

use chrono::NaiveDateTime;
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::auth::password::PasswordError;

/// Errors raised by the repository layer and the domain repositories built on it
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("A user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Performer {0} does not exist")]
    InvalidPerformer(i64),

    #[error("Member {0} does not exist")]
    UnknownMember(i64),

    #[error("Unknown column {column} for table {table}")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// A row type stored in its own table with a `BIGSERIAL` primary key `id`
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;

    /// Every column of the table, including `id`, in select order
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
}

/// A value bound into a generated statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(i64),
    NullableBigInt(Option<i64>),
    NullableInt(Option<i32>),
    Text(String),
    Timestamp(NaiveDateTime),
    /// Postgres enum label, bound as text and cast to `type_name`
    Enum {
        type_name: &'static str,
        label: &'static str,
    },
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            SqlValue::NullableBigInt(None) | SqlValue::NullableInt(None)
        )
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(value: Option<i64>) -> Self {
        SqlValue::NullableBigInt(value)
    }
}

impl From<Option<i32>> for SqlValue {
    fn from(value: Option<i32>) -> Self {
        SqlValue::NullableInt(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::NullableInt(Some(value))
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// Ordered `(column, value)` pairs used for inserts, updates and filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(&'static str, SqlValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an earlier value for the same column
    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    /// In-place variant of [`Fields::set`]
    pub fn push(&mut self, column: &'static str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(c, _)| *c)
    }

    fn into_inner(self) -> Vec<(&'static str, SqlValue)> {
        self.0
    }
}

/// Generic data access for one [`Entity`] type
///
/// Holds a pool handle only; every call runs as its own statement on a pooled
/// connection.
pub struct Repository<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Repository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl<T: Entity> Repository<T> {
    /// Fetches one row by id
    pub async fn get(&self, id: i64) -> Result<Option<T>, RepositoryError> {
        let mut qb = select_from::<T>();
        qb.push(" WHERE id = ").push_bind(id);

        Ok(qb.build_query_as::<T>().fetch_optional(&self.pool).await?)
    }

    /// Fetches every row, ordered by id
    pub async fn list_all(&self) -> Result<Vec<T>, RepositoryError> {
        let mut qb = select_from::<T>();
        qb.push(" ORDER BY id");

        Ok(qb.build_query_as::<T>().fetch_all(&self.pool).await?)
    }

    /// Inserts a row and returns it as stored
    ///
    /// Columns not present in `fields` take their schema defaults.
    pub async fn create(&self, fields: Fields) -> Result<T, RepositoryError> {
        check_columns::<T>(&fields)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {}", T::TABLE));
        if fields.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            let columns = fields.columns().collect::<Vec<_>>().join(", ");
            qb.push(format!(" ({}) VALUES (", columns));
            for (i, (_, value)) in fields.into_inner().into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(&mut qb, value);
            }
            qb.push(")");
        }
        qb.push(format!(" RETURNING {}", T::COLUMNS.join(", ")));

        let row = qb.build_query_as::<T>().fetch_one(&self.pool).await?;
        debug!(table = T::TABLE, id = row.id(), "Row created");
        Ok(row)
    }

    /// Sets the given columns on row `id`
    ///
    /// Returns `None` when no row has that id. An empty `fields` changes
    /// nothing and behaves like [`Repository::get`].
    pub async fn update(&self, id: i64, fields: Fields) -> Result<Option<T>, RepositoryError> {
        check_columns::<T>(&fields)?;
        if fields.is_empty() {
            return self.get(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", T::TABLE));
        for (i, (column, value)) in fields.into_inner().into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column).push(" = ");
            push_value(&mut qb, value);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {}", T::COLUMNS.join(", ")));

        let row = qb.build_query_as::<T>().fetch_optional(&self.pool).await?;
        debug!(table = T::TABLE, id, found = row.is_some(), "Row updated");
        Ok(row)
    }

    /// Deletes row `id`; returns whether a row was removed
    ///
    /// Deleting a missing row is not an error.
    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::TABLE))
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(table = T::TABLE, id, rows = result.rows_affected(), "Row deleted");
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every row matching all `fields` and returns the count
    ///
    /// An empty `fields` is refused rather than truncating the table.
    pub async fn delete_where(&self, fields: Fields) -> Result<u64, RepositoryError> {
        check_columns::<T>(&fields)?;
        if fields.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {}", T::TABLE));
        push_where(&mut qb, fields);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Fetches rows where every given column equals its value, ordered by id
    ///
    /// A null value matches with `IS NULL`.
    pub async fn filter(&self, fields: Fields) -> Result<Vec<T>, RepositoryError> {
        check_columns::<T>(&fields)?;

        let mut qb = select_from::<T>();
        push_where(&mut qb, fields);
        qb.push(" ORDER BY id");

        Ok(qb.build_query_as::<T>().fetch_all(&self.pool).await?)
    }

    /// Total number of rows in the table
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", T::TABLE))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// True when `err` is a unique constraint violation (SQLSTATE 23505)
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map_or(false, |code| code == "23505")
}

/// True when `err` is a foreign key violation (SQLSTATE 23503)
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map_or(false, |code| code == "23503")
}

fn check_columns<T: Entity>(fields: &Fields) -> Result<(), RepositoryError> {
    match fields.columns().find(|c| !T::COLUMNS.contains(c)) {
        Some(column) => Err(RepositoryError::UnknownColumn {
            table: T::TABLE,
            column,
        }),
        None => Ok(()),
    }
}

fn select_from<T: Entity>() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT {} FROM {}", T::COLUMNS.join(", "), T::TABLE))
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, fields: Fields) {
    for (i, (column, value)) in fields.into_inner().into_iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(column);
        if value.is_null() {
            qb.push(" IS NULL");
        } else {
            qb.push(" = ");
            push_value(qb, value);
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::BigInt(v) => {
            qb.push_bind(v);
        }
        SqlValue::NullableBigInt(v) => {
            qb.push_bind(v);
        }
        SqlValue::NullableInt(v) => {
            qb.push_bind(v);
        }
        SqlValue::Text(v) => {
            qb.push_bind(v);
        }
        SqlValue::Timestamp(v) => {
            qb.push_bind(v);
        }
        SqlValue::Enum { type_name, label } => {
            qb.push_bind(label).push("::").push(type_name);
        }
    }
}
