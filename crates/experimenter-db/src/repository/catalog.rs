//! SurrealDB implementation of [`CatalogRepository`].

use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::catalog::{Country, Locale};
use experimenter_core::repository::CatalogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CodeNameRow {
    code: String,
    name: String,
}

/// SurrealDB implementation of the locale/country catalog.
#[derive(Clone)]
pub struct SurrealCatalogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCatalogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn insert(&self, table: &str, code: String, name: String) -> Result<(), DbError> {
        let query = format!("CREATE {table} SET code = $code, name = $name");
        self.db
            .query(query)
            .bind(("code", code))
            .bind(("name", name))
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    async fn all(&self, table: &str) -> Result<Vec<CodeNameRow>, DbError> {
        let query = format!("SELECT code, name FROM {table} ORDER BY name ASC");
        let mut result = self.db.query(query).await?;
        Ok(result.take(0)?)
    }
}

impl<C: Connection> CatalogRepository for SurrealCatalogRepository<C> {
    async fn create_locale(&self, locale: Locale) -> ExperimenterResult<Locale> {
        self.insert("locale", locale.code.clone(), locale.name.clone())
            .await?;
        Ok(locale)
    }

    async fn list_locales(&self) -> ExperimenterResult<Vec<Locale>> {
        let rows = self.all("locale").await?;
        Ok(rows
            .into_iter()
            .map(|r| Locale {
                code: r.code,
                name: r.name,
            })
            .collect())
    }

    async fn create_country(&self, country: Country) -> ExperimenterResult<Country> {
        self.insert("country", country.code.clone(), country.name.clone())
            .await?;
        Ok(country)
    }

    async fn list_countries(&self) -> ExperimenterResult<Vec<Country>> {
        let rows = self.all("country").await?;
        Ok(rows
            .into_iter()
            .map(|r| Country {
                code: r.code,
                name: r.name,
            })
            .collect())
    }
}
