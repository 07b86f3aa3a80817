//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations live in
//! `experimenter-db`; the service layer only sees these traits, bundled
//! together by [`Store`].

use uuid::Uuid;

use crate::error::ExperimenterResult;
use crate::models::{
    catalog::{Country, Locale},
    change_log::{CreateChangeLog, ExperimentChangeLog},
    comment::{CreateComment, ExperimentComment},
    experiment::{
        CreateExperiment, Experiment, ExperimentStatus, ExperimentType, FirefoxChannel,
        UpdateExperiment,
    },
    notification::{CreateNotification, Notification},
    project::{CreateProject, Project},
    user::{User, UserPermission},
    variant::{CreateVariant, ExperimentVariant, UpdateVariant, VariantChanges},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Filters applied by the storage layer when listing experiments.
///
/// Every `None` matches everything. Archived experiments are excluded
/// unless `include_archived` is set.
#[derive(Debug, Clone, Default)]
pub struct ExperimentQuery {
    pub experiment_type: Option<ExperimentType>,
    pub status: Option<ExperimentStatus>,
    pub firefox_channel: Option<FirefoxChannel>,
    pub firefox_version: Option<String>,
    pub project_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub include_archived: bool,
    /// QA has been requested and not yet signed off.
    pub in_qa: bool,
}

// ---------------------------------------------------------------------------
// Experiments
// ---------------------------------------------------------------------------

pub trait ExperimentRepository: Send + Sync {
    fn create(
        &self,
        input: CreateExperiment,
    ) -> impl Future<Output = ExperimenterResult<Experiment>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ExperimenterResult<Experiment>> + Send;
    fn get_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = ExperimenterResult<Experiment>> + Send;
    /// Lookup used by uniqueness checks; `Ok(None)` when free.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = ExperimenterResult<Option<Experiment>>> + Send;
    fn find_by_addon_experiment_id(
        &self,
        addon_experiment_id: &str,
    ) -> impl Future<Output = ExperimenterResult<Option<Experiment>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateExperiment,
    ) -> impl Future<Output = ExperimenterResult<Experiment>> + Send;
    fn list(
        &self,
        query: ExperimentQuery,
    ) -> impl Future<Output = ExperimenterResult<Vec<Experiment>>> + Send;

    fn add_subscriber(
        &self,
        experiment_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<()>> + Send;
    fn remove_subscriber(
        &self,
        experiment_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<()>> + Send;
    fn is_subscribed(
        &self,
        experiment_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<bool>> + Send;
    fn list_subscribers(
        &self,
        experiment_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Vec<User>>> + Send;
}

pub trait VariantRepository: Send + Sync {
    fn create(
        &self,
        input: CreateVariant,
    ) -> impl Future<Output = ExperimenterResult<ExperimentVariant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateVariant,
    ) -> impl Future<Output = ExperimenterResult<ExperimentVariant>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = ExperimenterResult<()>> + Send;
    /// Delete, overwrite and create branches of one experiment in a single
    /// transaction, returning the resulting set. Either every change lands
    /// or none does.
    fn apply_changes(
        &self,
        experiment_id: Uuid,
        changes: VariantChanges,
    ) -> impl Future<Output = ExperimenterResult<Vec<ExperimentVariant>>> + Send;
    /// Control first, then by creation time.
    fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Vec<ExperimentVariant>>> + Send;
}

/// Append-only audit trail. There is no update or delete.
pub trait ChangeLogRepository: Send + Sync {
    fn append(
        &self,
        input: CreateChangeLog,
    ) -> impl Future<Output = ExperimenterResult<ExperimentChangeLog>> + Send;
    fn latest(
        &self,
        experiment_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Option<ExperimentChangeLog>>> + Send;
    /// Oldest first.
    fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Vec<ExperimentChangeLog>>> + Send;
}

pub trait CommentRepository: Send + Sync {
    fn create(
        &self,
        input: CreateComment,
    ) -> impl Future<Output = ExperimenterResult<ExperimentComment>> + Send;
    fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Vec<ExperimentComment>>> + Send;
}

// ---------------------------------------------------------------------------
// Supporting entities
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Users are created the first time their email is seen.
    fn get_or_create_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = ExperimenterResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ExperimenterResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = ExperimenterResult<User>> + Send;
    fn set_permissions(
        &self,
        id: Uuid,
        permissions: Vec<UserPermission>,
    ) -> impl Future<Output = ExperimenterResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = ExperimenterResult<PaginatedResult<User>>> + Send;
}

pub trait ProjectRepository: Send + Sync {
    fn create(
        &self,
        input: CreateProject,
    ) -> impl Future<Output = ExperimenterResult<Project>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ExperimenterResult<Project>> + Send;
    /// Sorted by name.
    fn list(&self) -> impl Future<Output = ExperimenterResult<Vec<Project>>> + Send;
}

pub trait CatalogRepository: Send + Sync {
    fn create_locale(
        &self,
        locale: Locale,
    ) -> impl Future<Output = ExperimenterResult<Locale>> + Send;
    fn list_locales(&self) -> impl Future<Output = ExperimenterResult<Vec<Locale>>> + Send;
    fn create_country(
        &self,
        country: Country,
    ) -> impl Future<Output = ExperimenterResult<Country>> + Send;
    fn list_countries(&self) -> impl Future<Output = ExperimenterResult<Vec<Country>>> + Send;
}

pub trait NotificationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateNotification,
    ) -> impl Future<Output = ExperimenterResult<Notification>> + Send;
    /// Newest first.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = ExperimenterResult<Vec<Notification>>> + Send;
}

/// Every repository the service layer needs, behind one handle.
pub trait Store: Send + Sync {
    type Experiments: ExperimentRepository;
    type Variants: VariantRepository;
    type ChangeLogs: ChangeLogRepository;
    type Comments: CommentRepository;
    type Users: UserRepository;
    type Projects: ProjectRepository;
    type Catalog: CatalogRepository;
    type Notifications: NotificationRepository;

    fn experiments(&self) -> &Self::Experiments;
    fn variants(&self) -> &Self::Variants;
    fn change_logs(&self) -> &Self::ChangeLogs;
    fn comments(&self) -> &Self::Comments;
    fn users(&self) -> &Self::Users;
    fn projects(&self) -> &Self::Projects;
    fn catalog(&self) -> &Self::Catalog;
    fn notifications(&self) -> &Self::Notifications;
}
