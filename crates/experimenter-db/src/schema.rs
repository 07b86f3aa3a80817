//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs and dates are stored as strings,
//! enums as their stored choice value with ASSERT constraints. Risk
//! answers and review sign-offs are FLEXIBLE objects.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "notifications",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD permissions ON TABLE user TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Projects
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD slug ON TABLE project TYPE string;
DEFINE FIELD created_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_name ON TABLE project COLUMNS name UNIQUE;
DEFINE INDEX idx_project_slug ON TABLE project COLUMNS slug UNIQUE;

-- =======================================================================
-- Targeting catalog
-- =======================================================================
DEFINE TABLE locale SCHEMAFULL;
DEFINE FIELD code ON TABLE locale TYPE string;
DEFINE FIELD name ON TABLE locale TYPE string;
DEFINE INDEX idx_locale_code ON TABLE locale COLUMNS code UNIQUE;

DEFINE TABLE country SCHEMAFULL;
DEFINE FIELD code ON TABLE country TYPE string;
DEFINE FIELD name ON TABLE country TYPE string;
DEFINE INDEX idx_country_code ON TABLE country COLUMNS code UNIQUE;

-- =======================================================================
-- Experiments
-- =======================================================================
DEFINE TABLE experiment SCHEMAFULL;
DEFINE FIELD experiment_type ON TABLE experiment TYPE string \
    ASSERT $value IN ['pref', 'addon'];
DEFINE FIELD owner_id ON TABLE experiment TYPE option<string>;
DEFINE FIELD project_id ON TABLE experiment TYPE option<string>;
DEFINE FIELD status ON TABLE experiment TYPE string \
    ASSERT $value IN ['Draft', 'Review', 'Ship', 'Accepted', 'Live', \
    'Complete', 'Rejected'];
DEFINE FIELD archived ON TABLE experiment TYPE bool DEFAULT false;
DEFINE FIELD name ON TABLE experiment TYPE string;
DEFINE FIELD slug ON TABLE experiment TYPE string;
DEFINE FIELD short_description ON TABLE experiment TYPE string DEFAULT '';
DEFINE FIELD related_work ON TABLE experiment TYPE string DEFAULT '';
DEFINE FIELD proposed_start_date ON TABLE experiment TYPE option<string>;
DEFINE FIELD proposed_duration ON TABLE experiment TYPE option<int>;
DEFINE FIELD proposed_enrollment ON TABLE experiment TYPE option<int>;
DEFINE FIELD addon_experiment_id ON TABLE experiment TYPE option<string>;
DEFINE FIELD addon_release_url ON TABLE experiment TYPE option<string>;
DEFINE FIELD pref_key ON TABLE experiment TYPE option<string>;
DEFINE FIELD pref_type ON TABLE experiment TYPE option<string>;
DEFINE FIELD pref_branch ON TABLE experiment TYPE option<string>;
DEFINE FIELD public_name ON TABLE experiment TYPE option<string>;
DEFINE FIELD public_description ON TABLE experiment TYPE option<string>;
DEFINE FIELD population_percent ON TABLE experiment TYPE float DEFAULT 0.0;
DEFINE FIELD firefox_version ON TABLE experiment TYPE option<string>;
DEFINE FIELD firefox_channel ON TABLE experiment TYPE option<string>;
DEFINE FIELD client_matching ON TABLE experiment TYPE string DEFAULT '';
DEFINE FIELD locales ON TABLE experiment TYPE array<string> DEFAULT [];
DEFINE FIELD countries ON TABLE experiment TYPE array<string> DEFAULT [];
DEFINE FIELD platform ON TABLE experiment TYPE string \
    ASSERT $value IN ['All Platforms', 'All Windows', 'All Mac', 'All Linux'];
DEFINE FIELD objectives ON TABLE experiment TYPE string DEFAULT '';
DEFINE FIELD analysis ON TABLE experiment TYPE string DEFAULT '';
DEFINE FIELD analysis_owner ON TABLE experiment TYPE option<string>;
DEFINE FIELD engineering_owner ON TABLE experiment TYPE option<string>;
DEFINE FIELD bugzilla_id ON TABLE experiment TYPE option<string>;
DEFINE FIELD normandy_slug ON TABLE experiment TYPE option<string>;
DEFINE FIELD normandy_id ON TABLE experiment TYPE option<int>;
DEFINE FIELD data_science_bugzilla_url ON TABLE experiment \
    TYPE option<string>;
DEFINE FIELD feature_bugzilla_url ON TABLE experiment TYPE option<string>;
DEFINE FIELD risk_flags ON TABLE experiment TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD risk_technical_description ON TABLE experiment \
    TYPE option<string>;
DEFINE FIELD risks ON TABLE experiment TYPE option<string>;
DEFINE FIELD testing ON TABLE experiment TYPE option<string>;
DEFINE FIELD test_builds ON TABLE experiment TYPE option<string>;
DEFINE FIELD qa_status ON TABLE experiment TYPE option<string>;
DEFINE FIELD reviews ON TABLE experiment TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE experiment TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE experiment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_experiment_name ON TABLE experiment COLUMNS name UNIQUE;
DEFINE INDEX idx_experiment_slug ON TABLE experiment COLUMNS slug UNIQUE;
DEFINE INDEX idx_experiment_status ON TABLE experiment COLUMNS status;

-- =======================================================================
-- Variants
-- =======================================================================
DEFINE TABLE experiment_variant SCHEMAFULL;
DEFINE FIELD experiment_id ON TABLE experiment_variant TYPE string;
DEFINE FIELD name ON TABLE experiment_variant TYPE string;
DEFINE FIELD slug ON TABLE experiment_variant TYPE string;
DEFINE FIELD is_control ON TABLE experiment_variant TYPE bool \
    DEFAULT false;
DEFINE FIELD description ON TABLE experiment_variant TYPE string \
    DEFAULT '';
DEFINE FIELD ratio ON TABLE experiment_variant TYPE int \
    ASSERT $value >= 1 AND $value <= 100;
DEFINE FIELD value ON TABLE experiment_variant TYPE option<string>;
DEFINE FIELD created_at ON TABLE experiment_variant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_variant_experiment_slug ON TABLE experiment_variant \
    COLUMNS experiment_id, slug UNIQUE;

-- =======================================================================
-- Change log (append-only)
-- =======================================================================
DEFINE TABLE experiment_change_log SCHEMAFULL \
    PERMISSIONS FOR update, delete NONE;
DEFINE FIELD experiment_id ON TABLE experiment_change_log TYPE string;
DEFINE FIELD changed_on ON TABLE experiment_change_log TYPE datetime;
DEFINE FIELD changed_by ON TABLE experiment_change_log TYPE string;
DEFINE FIELD old_status ON TABLE experiment_change_log TYPE option<string>;
DEFINE FIELD new_status ON TABLE experiment_change_log TYPE string;
DEFINE FIELD message ON TABLE experiment_change_log TYPE option<string>;
DEFINE INDEX idx_change_log_experiment ON TABLE experiment_change_log \
    COLUMNS experiment_id;

-- =======================================================================
-- Comments
-- =======================================================================
DEFINE TABLE experiment_comment SCHEMAFULL;
DEFINE FIELD experiment_id ON TABLE experiment_comment TYPE string;
DEFINE FIELD created_by ON TABLE experiment_comment TYPE string;
DEFINE FIELD section ON TABLE experiment_comment TYPE string \
    ASSERT $value IN ['overview', 'population', 'design', 'addon', \
    'objectives', 'analysis', 'risks', 'testing'];
DEFINE FIELD text ON TABLE experiment_comment TYPE string;
DEFINE FIELD created_on ON TABLE experiment_comment TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Graph edges
-- =======================================================================

-- User -> Experiment subscription
DEFINE TABLE subscribed_to TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_subscribed_to_unique ON TABLE subscribed_to \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE notification SCHEMAFULL;
DEFINE FIELD user_id ON TABLE notification TYPE string;
DEFINE FIELD message ON TABLE notification TYPE string;
DEFINE FIELD read ON TABLE notification TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE notification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_notification_user ON TABLE notification COLUMNS user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_status_is_allowed_by_the_schema() {
        use experimenter_core::models::experiment::ExperimentStatus;
        for status in ExperimentStatus::ALL {
            assert!(SCHEMA_V1.contains(&format!("'{}'", status.as_str())));
        }
    }
}
