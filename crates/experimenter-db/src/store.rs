//! [`Store`] bundle over the SurrealDB repositories.

use experimenter_core::repository::Store;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealCatalogRepository, SurrealChangeLogRepository, SurrealCommentRepository,
    SurrealExperimentRepository, SurrealNotificationRepository, SurrealProjectRepository,
    SurrealUserRepository, SurrealVariantRepository,
};

/// All Experimenter repositories sharing one SurrealDB client.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    experiments: SurrealExperimentRepository<C>,
    variants: SurrealVariantRepository<C>,
    change_logs: SurrealChangeLogRepository<C>,
    comments: SurrealCommentRepository<C>,
    users: SurrealUserRepository<C>,
    projects: SurrealProjectRepository<C>,
    catalog: SurrealCatalogRepository<C>,
    notifications: SurrealNotificationRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            experiments: SurrealExperimentRepository::new(db.clone()),
            variants: SurrealVariantRepository::new(db.clone()),
            change_logs: SurrealChangeLogRepository::new(db.clone()),
            comments: SurrealCommentRepository::new(db.clone()),
            users: SurrealUserRepository::new(db.clone()),
            projects: SurrealProjectRepository::new(db.clone()),
            catalog: SurrealCatalogRepository::new(db.clone()),
            notifications: SurrealNotificationRepository::new(db),
        }
    }
}

impl<C: Connection> Store for SurrealStore<C> {
    type Experiments = SurrealExperimentRepository<C>;
    type Variants = SurrealVariantRepository<C>;
    type ChangeLogs = SurrealChangeLogRepository<C>;
    type Comments = SurrealCommentRepository<C>;
    type Users = SurrealUserRepository<C>;
    type Projects = SurrealProjectRepository<C>;
    type Catalog = SurrealCatalogRepository<C>;
    type Notifications = SurrealNotificationRepository<C>;

    fn experiments(&self) -> &Self::Experiments {
        &self.experiments
    }

    fn variants(&self) -> &Self::Variants {
        &self.variants
    }

    fn change_logs(&self) -> &Self::ChangeLogs {
        &self.change_logs
    }

    fn comments(&self) -> &Self::Comments {
        &self.comments
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn projects(&self) -> &Self::Projects {
        &self.projects
    }

    fn catalog(&self) -> &Self::Catalog {
        &self.catalog
    }

    fn notifications(&self) -> &Self::Notifications {
        &self.notifications
    }
}
