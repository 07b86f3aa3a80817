//! Experiment workflow: saving forms, moving experiments through their
//! lifecycle and assembling the list and detail documents.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use experimenter_core::error::{ExperimenterError, ExperimenterResult, FormErrors};
use experimenter_core::models::change_log::{
    CreateChangeLog, DailyChanges, ExperimentChangeLog, group_changes,
};
use experimenter_core::models::comment::{
    CommentSection, CreateComment, ExperimentComment, comments_by_section,
};
use experimenter_core::models::experiment::{
    Experiment, ExperimentStatus, SectionProgress, UpdateExperiment,
};
use experimenter_core::models::notification::CreateNotification;
use experimenter_core::models::review::{Review, ReviewSignOffs};
use experimenter_core::models::timeline::Timeline;
use experimenter_core::models::user::User;
use experimenter_core::models::variant::{ExperimentVariant, VariantChanges};
use experimenter_core::repository::{
    CatalogRepository, ChangeLogRepository, CommentRepository, ExperimentRepository,
    NotificationRepository, ProjectRepository, Store, UserRepository, VariantRepository,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bugzilla::BugTracker;
use crate::config::ServiceConfig;
use crate::filter::{ExperimentFilter, ExperimentOrdering, ExperimentSummary, paginate};
use crate::forms::status::check_transition;
use crate::forms::overview::NAME_IN_USE;
use crate::forms::variants::NAMES_MUST_BE_UNIQUE;
use crate::forms::{
    CommentForm, NormandyIdForm, ObjectivesForm, OverviewChecks, OverviewForm, ReviewForm,
    RisksForm, StatusForm, VariantsContext, VariantsForm,
};
use crate::links::ExperimentLinks;

/// Result of saving the review checklist.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub experiment: Experiment,
    /// Sign-off changes that were dropped for lack of permission.
    pub warnings: Vec<String>,
    pub changed: bool,
}

/// Human-readable summary of the active list filters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterDisplay {
    #[serde(rename = "type")]
    pub experiment_type: Option<&'static str>,
    pub project: Option<String>,
    pub owner: Option<String>,
    pub dates: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentPage {
    pub experiments: Vec<ExperimentSummary>,
    pub page: usize,
    pub num_pages: usize,
    pub total: usize,
    pub ordering: ExperimentOrdering,
    pub ordering_label: &'static str,
    pub filters: FilterDisplay,
    /// Invalid filter values. When present the list is empty.
    pub errors: FormErrors,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentDetail {
    pub experiment: Experiment,
    pub owner_email: Option<String>,
    pub variants: Vec<ExperimentVariant>,
    pub changes: Vec<DailyChanges>,
    pub comments: BTreeMap<CommentSection, Vec<ExperimentComment>>,
    pub timeline: Timeline,
    /// Formatted `dates`, `enrollment` and `observation` windows.
    pub date_ranges: BTreeMap<&'static str, String>,
    pub progress: SectionProgress,
    pub required_reviews: Vec<Review>,
    pub optional_reviews: Vec<Review>,
    pub links: ExperimentLinks,
    pub subscribed: bool,
    pub subscriber_count: usize,
}

/// Experiment workflow service.
///
/// Generic over the storage bundle and the bug tracker so the workflow
/// has no dependency on the database crate or on HTTP.
pub struct ExperimentService<S: Store, B: BugTracker> {
    store: S,
    bugs: B,
    config: ServiceConfig,
}

impl<S: Store, B: BugTracker> ExperimentService<S, B> {
    pub fn new(store: S, bugs: B, config: ServiceConfig) -> Self {
        Self {
            store,
            bugs,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub async fn get(&self, slug: &str) -> ExperimenterResult<Experiment> {
        self.store.experiments().get_by_slug(slug).await
    }

    /// Append a change log entry. The old status is the new status of the
    /// previous entry, so consecutive entries chain.
    async fn record_change(
        &self,
        experiment: &Experiment,
        user: &User,
        message: Option<String>,
    ) -> ExperimenterResult<ExperimentChangeLog> {
        let old_status = self
            .store
            .change_logs()
            .latest(experiment.id)
            .await?
            .map(|c| c.new_status);

        self.store
            .change_logs()
            .append(CreateChangeLog {
                experiment_id: experiment.id,
                changed_by: user.id,
                old_status,
                new_status: experiment.status,
                message: message.filter(|m| !m.is_empty()),
                changed_on: None,
            })
            .await
    }

    async fn save(
        &self,
        experiment: &Experiment,
        user: &User,
        update: UpdateExperiment,
        message: Option<String>,
    ) -> ExperimenterResult<Experiment> {
        let updated = if update.is_empty() {
            experiment.clone()
        } else {
            self.store.experiments().update(experiment.id, update).await?
        };
        self.record_change(&updated, user, message).await?;
        Ok(updated)
    }

    async fn exists<T>(lookup: impl Future<Output = ExperimenterResult<T>>) -> ExperimenterResult<bool> {
        match lookup.await {
            Ok(_) => Ok(true),
            Err(ExperimenterError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether another experiment already owns `slug`.
    async fn slug_taken(&self, slug: Option<&str>, except: Option<Uuid>) -> ExperimenterResult<bool> {
        let Some(slug) = slug else {
            return Ok(false);
        };
        match self.store.experiments().get_by_slug(slug).await {
            Ok(other) => Ok(Some(other.id) != except),
            Err(ExperimenterError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn overview_checks(
        &self,
        form: &OverviewForm,
        except: Option<Uuid>,
    ) -> ExperimenterResult<OverviewChecks> {
        let slug = form.slug();
        let mut name_taken = self.slug_taken(slug.as_deref(), except).await?;
        if !name_taken && let Some(name) = form.name.as_deref().map(str::trim) {
            name_taken = self
                .store
                .experiments()
                .find_by_name(name)
                .await?
                .is_some_and(|other| Some(other.id) != except);
        }

        let owner_exists = match form.owner {
            Some(id) => Self::exists(self.store.users().get_by_id(id)).await?,
            None => false,
        };
        let project_exists = match form.project {
            Some(id) => Self::exists(self.store.projects().get_by_id(id)).await?,
            None => true,
        };

        Ok(OverviewChecks {
            today: Utc::now().date_naive(),
            name_taken,
            owner_exists,
            project_exists,
        })
    }

    async fn owner_email(&self, experiment: &Experiment) -> ExperimenterResult<Option<String>> {
        let Some(owner_id) = experiment.owner_id else {
            return Ok(None);
        };
        match self.store.users().get_by_id(owner_id).await {
            Ok(user) => Ok(Some(user.email)),
            Err(ExperimenterError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Create an experiment from the overview step.
    pub async fn create(&self, user: &User, form: OverviewForm) -> ExperimenterResult<Experiment> {
        let checks = self.overview_checks(&form, None).await?;
        let clean = form.clean(checks)?;

        let experiment = self
            .store
            .experiments()
            .create(clean.into_create())
            .await
            .map_err(name_taken)?;
        self.record_change(&experiment, user, None).await?;

        info!(
            slug = %experiment.slug,
            experiment_id = %experiment.id,
            user_id = %user.id,
            "Experiment created"
        );
        Ok(experiment)
    }

    pub async fn update_overview(
        &self,
        user: &User,
        slug: &str,
        form: OverviewForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let checks = self.overview_checks(&form, Some(experiment.id)).await?;
        let clean = form.clean(checks)?;
        self.save(&experiment, user, clean.into_update(), None)
            .await
            .map_err(name_taken)
    }

    /// Save the population fields and reconcile the branch rows.
    pub async fn update_variants(
        &self,
        user: &User,
        slug: &str,
        form: VariantsForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;

        // 1. Gather what the form validates against.
        let addon_id_taken = match form.addon_experiment_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => self
                .store
                .experiments()
                .find_by_addon_experiment_id(id)
                .await?
                .is_some_and(|other| other.id != experiment.id),
            _ => false,
        };
        let context = VariantsContext {
            locales: codes(self.store.catalog().list_locales().await?, |l| l.code),
            countries: codes(self.store.catalog().list_countries().await?, |c| c.code),
            addon_id_taken,
        };

        // 2. Validate.
        let clean = form.clean(experiment.experiment_type, &context)?;

        // 3. Branches the form leaves alone keep their slugs, so the
        //    submitted ones must not collide with them.
        let existing = self.store.variants().list_for_experiment(experiment.id).await?;
        let is_existing = |id: &Uuid| existing.iter().any(|v| v.id == *id);
        let untouched_slugs: HashSet<&str> = existing
            .iter()
            .filter(|v| !clean.deleted.contains(&v.id))
            .filter(|v| !clean.variants.iter().any(|c| c.id == Some(v.id)))
            .map(|v| v.slug.as_str())
            .collect();
        if clean
            .variants
            .iter()
            .any(|c| untouched_slugs.contains(c.slug.as_str()))
        {
            let mut errors = FormErrors::new();
            errors.add_non_field(NAMES_MUST_BE_UNIQUE);
            return Err(ExperimenterError::InvalidForm(errors));
        }

        // 4. Rewrite the branch set in one transaction.
        let mut changes = VariantChanges {
            deleted: clean.deleted.iter().copied().filter(is_existing).collect(),
            ..VariantChanges::default()
        };
        for variant in &clean.variants {
            let row = variant.to_create(experiment.id);
            match variant.id {
                Some(id) if is_existing(&id) => changes.updated.push((id, row)),
                _ => changes.created.push(row),
            }
        }
        self.store
            .variants()
            .apply_changes(experiment.id, changes)
            .await?;

        // 5. Save the experiment fields.
        self.save(&experiment, user, clean.update, None).await
    }

    pub async fn update_objectives(
        &self,
        user: &User,
        slug: &str,
        form: ObjectivesForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let update = form.clean()?;
        self.save(&experiment, user, update, None).await
    }

    pub async fn update_risks(
        &self,
        user: &User,
        slug: &str,
        form: RisksForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let update = form.clean()?;
        self.save(&experiment, user, update, None).await
    }

    /// Save the sign-off checklist. The acting user is notified of what
    /// changed.
    pub async fn update_review(
        &self,
        user: &User,
        slug: &str,
        form: ReviewForm,
    ) -> ExperimenterResult<ReviewOutcome> {
        let experiment = self.get(slug).await?;
        let changes = form.clean(&experiment.reviews, user);

        for warning in &changes.warnings {
            warn!(slug = %experiment.slug, user_id = %user.id, "{warning}");
        }

        let changed = changes.has_changes();
        let message = changes.message();
        let update = UpdateExperiment {
            reviews: changed.then(|| changes.reviews.clone()),
            ..UpdateExperiment::default()
        };
        let experiment = self
            .save(&experiment, user, update, Some(message.clone()))
            .await?;

        if changed {
            self.store
                .notifications()
                .create(CreateNotification {
                    user_id: user.id,
                    message,
                })
                .await?;
        }

        Ok(ReviewOutcome {
            experiment,
            warnings: changes.warnings,
            changed,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Move an experiment to a new status and run the side effects of the
    /// transition.
    pub async fn update_status(
        &self,
        user: &User,
        slug: &str,
        form: StatusForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let change = form.clean(experiment.status)?;
        let has_bug = experiment.bugzilla_id.as_deref().is_some_and(|id| !id.is_empty());

        // The Normandy slug must be derivable before the status moves to Ship.
        let normandy_slug = if change.is(ExperimentStatus::Review, ExperimentStatus::Ship) && has_bug
        {
            Some(experiment.generate_normandy_slug()?)
        } else {
            None
        };
        let shipping = normandy_slug.is_some();

        let update = UpdateExperiment {
            status: (change.old != change.new).then_some(change.new),
            normandy_slug: normandy_slug.map(Some),
            ..UpdateExperiment::default()
        };
        let mut experiment = self.save(&experiment, user, update, None).await?;

        info!(
            slug = %experiment.slug,
            user_id = %user.id,
            status = %change.new,
            old_status = %change.old,
            "Experiment status changed"
        );

        if change.is(ExperimentStatus::Draft, ExperimentStatus::Review) && !has_bug {
            info!(
                slug = %experiment.slug,
                needs_attention = change.needs_attention,
                url = %crate::links::experiment_url(&self.config, &experiment.slug),
                "Experiment ready for review"
            );

            let owner_email = match self.owner_email(&experiment).await? {
                Some(email) => email,
                None => user.email.clone(),
            };
            if let Some(bug_id) = self.bugs.create_experiment_bug(&experiment, &owner_email).await
            {
                experiment = self
                    .store
                    .experiments()
                    .update(
                        experiment.id,
                        UpdateExperiment {
                            bugzilla_id: Some(Some(bug_id.to_string())),
                            ..UpdateExperiment::default()
                        },
                    )
                    .await?;
            }
        }

        if shipping {
            self.bugs.add_experiment_comment(&experiment).await;
        }

        Ok(experiment)
    }

    async fn transition(
        &self,
        user: &User,
        experiment: Experiment,
        to: ExperimentStatus,
        message: Option<String>,
    ) -> ExperimenterResult<Experiment> {
        check_transition(experiment.status, to)?;
        let update = UpdateExperiment {
            status: Some(to),
            ..UpdateExperiment::default()
        };
        let experiment = self.save(&experiment, user, update, message).await?;
        info!(slug = %experiment.slug, status = %to, user_id = %user.id, "Experiment status changed");
        Ok(experiment)
    }

    /// Record the delivery-service recipe id, then mark the experiment
    /// accepted. Nothing is written unless both steps are valid.
    pub async fn set_normandy_id(
        &self,
        user: &User,
        slug: &str,
        form: &NormandyIdForm,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let normandy_id = form.clean()?;
        check_transition(experiment.status, ExperimentStatus::Accepted)?;

        let update = UpdateExperiment {
            normandy_id: Some(Some(normandy_id)),
            ..UpdateExperiment::default()
        };
        let experiment = self.save(&experiment, user, update, None).await?;
        self.transition(user, experiment, ExperimentStatus::Accepted, None)
            .await
    }

    /// Delivery-service callback: the recipe was approved.
    pub async fn accept(&self, user: &User, slug: &str) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        if experiment.status != ExperimentStatus::Ship {
            return Err(ExperimenterError::InvalidTransition {
                from: experiment.status.to_string(),
                to: ExperimentStatus::Accepted.to_string(),
            });
        }
        self.transition(user, experiment, ExperimentStatus::Accepted, None)
            .await
    }

    /// Delivery-service callback: the recipe was rejected.
    pub async fn reject(
        &self,
        user: &User,
        slug: &str,
        message: Option<String>,
    ) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        if experiment.status == ExperimentStatus::Rejected {
            return Err(ExperimenterError::InvalidTransition {
                from: experiment.status.to_string(),
                to: ExperimentStatus::Rejected.to_string(),
            });
        }
        let message = message.map(|m| m.trim().to_string());
        self.transition(user, experiment, ExperimentStatus::Rejected, message)
            .await
    }

    pub async fn toggle_archive(&self, user: &User, slug: &str) -> ExperimenterResult<Experiment> {
        let experiment = self.get(slug).await?;
        let update = UpdateExperiment {
            archived: Some(!experiment.archived),
            ..UpdateExperiment::default()
        };
        self.save(&experiment, user, update, None).await
    }

    /// Flip the user's subscription. Returns whether they are now
    /// subscribed.
    pub async fn toggle_subscription(&self, user: &User, slug: &str) -> ExperimenterResult<bool> {
        let experiment = self.get(slug).await?;
        let experiments = self.store.experiments();
        if experiments.is_subscribed(experiment.id, user.id).await? {
            experiments.remove_subscriber(experiment.id, user.id).await?;
            Ok(false)
        } else {
            experiments.add_subscriber(experiment.id, user.id).await?;
            Ok(true)
        }
    }

    pub async fn add_comment(
        &self,
        user: &User,
        slug: &str,
        form: CommentForm,
    ) -> ExperimenterResult<ExperimentComment> {
        let experiment = self.get(slug).await?;
        let (section, text) = form.clean()?;
        self.store
            .comments()
            .create(CreateComment {
                experiment_id: experiment.id,
                created_by: user.id,
                section,
                text,
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    pub async fn list(&self, filter: &ExperimentFilter) -> ExperimenterResult<ExperimentPage> {
        let ordering = filter.ordering();
        let mut page = ExperimentPage {
            experiments: Vec::new(),
            page: 1,
            num_pages: 1,
            total: 0,
            ordering,
            ordering_label: ordering.label(),
            filters: self.filter_display(filter).await?,
            errors: FormErrors::new(),
        };

        let clean = match filter.clean() {
            Ok(clean) => clean,
            Err(errors) => {
                page.errors = errors;
                return Ok(page);
            }
        };

        let experiments = self.store.experiments().list(clean.query.clone()).await?;
        let mut emails: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut rows = Vec::with_capacity(experiments.len());
        for experiment in experiments {
            let owner_email = match experiment.owner_id {
                Some(id) => match emails.get(&id) {
                    Some(email) => email.clone(),
                    None => {
                        let email = self.owner_email(&experiment).await?;
                        emails.insert(id, email.clone());
                        email
                    }
                },
                None => None,
            };
            let changes = self.store.change_logs().list_for_experiment(experiment.id).await?;
            rows.push(ExperimentSummary {
                latest_change: changes.iter().map(|c| c.changed_on).max(),
                timeline: Timeline::new(&experiment, &changes),
                owner_email,
                experiment,
            });
        }

        let rows = clean.apply(rows, ordering);
        let number = filter.page.unwrap_or(1);
        let Some(slice) = paginate(rows, number, self.config.paginate_by) else {
            return Err(ExperimenterError::NotFound {
                entity: "page".into(),
                id: number.to_string(),
            });
        };

        page.experiments = slice.items;
        page.page = slice.number;
        page.num_pages = slice.num_pages;
        page.total = slice.total;
        Ok(page)
    }

    async fn filter_display(&self, filter: &ExperimentFilter) -> ExperimenterResult<FilterDisplay> {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| Uuid::parse_str(s.trim()).ok());

        let project = match parse(&filter.project) {
            Some(id) => match self.store.projects().get_by_id(id).await {
                Ok(p) => Some(p.name),
                Err(ExperimenterError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let owner = match parse(&filter.owner) {
            Some(id) => match self.store.users().get_by_id(id).await {
                Ok(u) => Some(u.email),
                Err(ExperimenterError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(FilterDisplay {
            experiment_type: filter.type_display(),
            project,
            owner,
            dates: filter.date_range_display(),
        })
    }

    pub async fn detail(&self, user: &User, slug: &str) -> ExperimenterResult<ExperimentDetail> {
        let experiment = self.get(slug).await?;

        let variants = self.store.variants().list_for_experiment(experiment.id).await?;
        let changes = self.store.change_logs().list_for_experiment(experiment.id).await?;
        let comments = self.store.comments().list_for_experiment(experiment.id).await?;
        let subscribers = self.store.experiments().list_subscribers(experiment.id).await?;
        let timeline = Timeline::new(&experiment, &changes);

        Ok(ExperimentDetail {
            owner_email: self.owner_email(&experiment).await?,
            date_ranges: BTreeMap::from([
                ("dates", timeline.dates()),
                ("enrollment", timeline.enrollment_dates()),
                ("observation", timeline.observation_dates()),
            ]),
            timeline,
            progress: experiment.progress(variants.len()),
            required_reviews: ReviewSignOffs::required(&experiment.risk_flags),
            optional_reviews: ReviewSignOffs::optional(&experiment.risk_flags),
            links: ExperimentLinks::new(&self.config, &experiment),
            subscribed: subscribers.iter().any(|s| s.id == user.id),
            subscriber_count: subscribers.len(),
            changes: group_changes(&changes),
            comments: comments_by_section(comments),
            variants,
            experiment,
        })
    }
}

/// Name and slug are the only unique experiment columns, so a write that
/// loses a race to another experiment is reported like the form check.
fn name_taken(err: ExperimenterError) -> ExperimenterError {
    match err {
        ExperimenterError::AlreadyExists { .. } => {
            let mut errors = FormErrors::new();
            errors.add("name", NAME_IN_USE);
            ExperimenterError::InvalidForm(errors)
        }
        other => other,
    }
}

fn codes<T>(items: Vec<T>, code: impl Fn(T) -> String) -> Vec<String> {
    items.into_iter().map(code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_unique_race_reads_as_name_in_use() {
        let err = name_taken(ExperimenterError::AlreadyExists {
            entity: "experiment".into(),
        });
        match err {
            ExperimenterError::InvalidForm(errors) => {
                assert_eq!(errors.get("name").unwrap(), [NAME_IN_USE]);
            }
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn other_failures_pass_through() {
        let err = name_taken(ExperimenterError::Database("down".into()));
        assert!(matches!(err, ExperimenterError::Database(_)));
    }
}
