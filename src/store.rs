use diesel::{
    connection::SimpleConnection,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection},
    sqlite::SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use nanoid::nanoid;
use serde_json::Value;

use crate::{
    errors::ServerError,
    models::annotation::{self, Document},
    schema::annotations,
};

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const ID_LENGTH: usize = 16;

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = annotations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct AnnotationRow {
    id: String,
    owner: String,
    body: String,
}

impl AnnotationRow {
    fn from_document(id: String, mut doc: Document) -> Result<Self, ServerError> {
        doc.remove(annotation::ID);
        let owner = doc
            .get(annotation::USER)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        Ok(AnnotationRow {
            id,
            owner,
            body: serde_json::to_string(&doc)?,
        })
    }

    fn into_document(self) -> Result<Document, ServerError> {
        let mut doc: Document = serde_json::from_str(&self.body)?;
        doc.insert(annotation::ID.to_owned(), Value::from(self.id));
        Ok(doc)
    }
}

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Handle to the annotation collection. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    /// Opens (creating if needed) the database file and brings its schema up
    /// to date before the first request is served.
    pub fn open(database_url: &str) -> Result<Self, ServerError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = r2d2::Pool::builder()
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)?;

        let mut pooled = pool.get()?;
        let connection: &mut SqliteConnection = &mut pooled;
        connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| ServerError::StoreFailure(e.to_string()))?;

        Ok(Store { pool })
    }

    pub fn find_by_owner(&self, user: &str) -> Result<Vec<Document>, ServerError> {
        let mut connection = self.pool.get()?;
        annotations::table
            .filter(annotations::owner.eq(user))
            .select(AnnotationRow::as_select())
            .load::<AnnotationRow>(&mut connection)?
            .into_iter()
            .map(AnnotationRow::into_document)
            .collect()
    }

    pub fn find_one(&self, annotation_id: &str) -> Result<Option<Document>, ServerError> {
        let mut connection = self.pool.get()?;
        annotations::table
            .find(annotation_id)
            .select(AnnotationRow::as_select())
            .first::<AnnotationRow>(&mut connection)
            .optional()?
            .map(AnnotationRow::into_document)
            .transpose()
    }

    /// Inserts a new document, keeping a caller-chosen `_id` when it is a string.
    pub fn insert(&self, doc: Document) -> Result<Document, ServerError> {
        let new_id = match doc.get(annotation::ID) {
            Some(Value::String(custom_id)) => custom_id.to_owned(),
            _ => nanoid!(ID_LENGTH),
        };
        let row = AnnotationRow::from_document(new_id, doc)?;

        let mut connection = self.pool.get()?;
        diesel::insert_into(annotations::table)
            .values(&row)
            .execute(&mut connection)?;

        row.into_document()
    }

    /// `$set` merge of `set` into the document, creating it from `set` and
    /// `insert_only` when absent. With `guard`, an existing document owned by
    /// someone else is left untouched and reported as not found.
    pub fn upsert(
        &self,
        annotation_id: &str,
        set: Document,
        insert_only: Document,
        guard: Option<&str>,
    ) -> Result<(), ServerError> {
        match set.get(annotation::ID) {
            Some(Value::String(other)) if other == annotation_id => {}
            None => {}
            Some(_) => {
                return Err(ServerError::StoreFailure(
                    "cannot change a document's _id".to_owned(),
                ))
            }
        }

        let mut connection = self.pool.get()?;
        connection.immediate_transaction(|conn| {
            let existing = find_row(conn, annotation_id)?;

            match existing {
                Some(row) => {
                    check_owner(&row, guard)?;
                    let mut doc = row.into_document()?;
                    doc.extend(set);
                    let row = AnnotationRow::from_document(annotation_id.to_owned(), doc)?;
                    diesel::update(annotations::table.find(annotation_id))
                        .set((
                            annotations::owner.eq(&row.owner),
                            annotations::body.eq(&row.body),
                        ))
                        .execute(conn)?;
                }
                None => {
                    let mut doc = insert_only;
                    doc.extend(set);
                    let row = AnnotationRow::from_document(annotation_id.to_owned(), doc)?;
                    diesel::insert_into(annotations::table)
                        .values(&row)
                        .execute(conn)?;
                }
            }

            Ok(())
        })
    }

    /// Returns how many documents were removed.
    pub fn remove(&self, annotation_id: &str, guard: Option<&str>) -> Result<usize, ServerError> {
        let mut connection = self.pool.get()?;
        connection.immediate_transaction(|conn| {
            if guard.is_some() {
                match find_row(conn, annotation_id)? {
                    Some(row) => check_owner(&row, guard)?,
                    None => return Ok(0),
                }
            }

            Ok(diesel::delete(annotations::table.find(annotation_id)).execute(conn)?)
        })
    }
}

fn find_row(
    conn: &mut SqliteConnection,
    annotation_id: &str,
) -> Result<Option<AnnotationRow>, ServerError> {
    Ok(annotations::table
        .find(annotation_id)
        .select(AnnotationRow::as_select())
        .first::<AnnotationRow>(conn)
        .optional()?)
}

fn check_owner(row: &AnnotationRow, guard: Option<&str>) -> Result<(), ServerError> {
    match guard {
        Some(user) if row.owner != user => Err(ServerError::NotFound(row.id.clone())),
        _ => Ok(()),
    }
}
