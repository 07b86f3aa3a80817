//! Integration tests for the Experiment repository using in-memory SurrealDB.

use chrono::NaiveDate;
use experimenter_core::error::ExperimenterError;
use experimenter_core::models::experiment::{
    CreateExperiment, ExperimentStatus, ExperimentType, FirefoxChannel, OBJECTIVES_DEFAULT,
    PrefType, UpdateExperiment,
};
use experimenter_core::models::review::{ReviewSignOffs, RiskAssessment};
use experimenter_core::repository::{ExperimentQuery, ExperimentRepository, UserRepository};
use experimenter_db::repository::{SurrealExperimentRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    experimenter_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(name: &str) -> CreateExperiment {
    CreateExperiment {
        experiment_type: ExperimentType::Pref,
        owner_id: None,
        project_id: None,
        name: name.into(),
        slug: experimenter_core::slug::slugify(name),
        short_description: "A short description".into(),
        related_work: String::new(),
        engineering_owner: None,
        public_name: None,
        public_description: None,
        data_science_bugzilla_url: Some("https://bugzilla.mozilla.org/123/".into()),
        feature_bugzilla_url: None,
        proposed_start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
        proposed_duration: Some(30),
        proposed_enrollment: Some(7),
    }
}

#[tokio::test]
async fn create_and_fetch_experiment() {
    let repo = SurrealExperimentRepository::new(setup().await);

    let created = repo.create(create_input("Pref Flip Test")).await.unwrap();
    assert_eq!(created.status, ExperimentStatus::Draft);
    assert_eq!(created.slug, "pref-flip-test");
    assert_eq!(created.objectives, OBJECTIVES_DEFAULT);
    assert_eq!(created.proposed_start_date, NaiveDate::from_ymd_opt(2030, 1, 1));
    assert!(!created.archived);

    let by_id = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(by_id.name, "Pref Flip Test");

    let by_slug = repo.get_by_slug("pref-flip-test").await.unwrap();
    assert_eq!(by_slug.id, created.id);

    assert!(repo.find_by_name("Pref Flip Test").await.unwrap().is_some());
    assert!(repo.find_by_name("Other").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_experiment_is_not_found() {
    let repo = SurrealExperimentRepository::new(setup().await);
    let err = repo.get_by_slug("nope").await.unwrap_err();
    assert!(matches!(err, ExperimenterError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_slug_is_rejected() {
    let repo = SurrealExperimentRepository::new(setup().await);
    repo.create(create_input("Same")).await.unwrap();
    let err = repo.create(create_input("Same")).await.unwrap_err();
    assert!(matches!(err, ExperimenterError::AlreadyExists { .. }));

    let other = repo.create(create_input("Other")).await.unwrap();
    let err = repo
        .update(
            other.id,
            UpdateExperiment {
                name: Some("Same".into()),
                slug: Some("same".into()),
                ..UpdateExperiment::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExperimenterError::AlreadyExists { .. }));
    assert_eq!(repo.get_by_id(other.id).await.unwrap().name, "Other");
}

#[tokio::test]
async fn update_sets_and_clears_fields() {
    let repo = SurrealExperimentRepository::new(setup().await);
    let created = repo.create(create_input("Updatable")).await.unwrap();

    let updated = repo
        .update(
            created.id,
            UpdateExperiment {
                status: Some(ExperimentStatus::Review),
                population_percent: Some(12.5),
                firefox_channel: Some(Some(FirefoxChannel::Beta)),
                firefox_version: Some(Some("60.0".into())),
                pref_type: Some(Some(PrefType::Boolean)),
                locales: Some(vec!["en-US".into(), "de".into()]),
                bugzilla_id: Some(Some("12345".into())),
                risk_flags: Some(RiskAssessment::all(false)),
                reviews: Some(ReviewSignOffs {
                    qa_requested: Some(true),
                    qa: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, ExperimentStatus::Review);
    assert_eq!(updated.population_percent, 12.5);
    assert_eq!(updated.firefox_channel, Some(FirefoxChannel::Beta));
    assert_eq!(updated.pref_type, Some(PrefType::Boolean));
    assert_eq!(updated.locales, vec!["en-US".to_string(), "de".to_string()]);
    assert_eq!(updated.bugzilla_id.as_deref(), Some("12345"));
    assert!(updated.risk_flags.all_answered());
    assert!(updated.is_in_qa());
    assert!(updated.updated_at >= created.updated_at);

    let cleared = repo
        .update(
            created.id,
            UpdateExperiment {
                bugzilla_id: Some(None),
                proposed_start_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.bugzilla_id, None);
    assert_eq!(cleared.proposed_start_date, None);
    assert_eq!(cleared.firefox_channel, Some(FirefoxChannel::Beta));
}

#[tokio::test]
async fn list_filters_in_the_database() {
    let repo = SurrealExperimentRepository::new(setup().await);

    let a = repo.create(create_input("Alpha")).await.unwrap();
    let b = repo.create(create_input("Beta Test")).await.unwrap();
    let c = repo.create(create_input("Gamma")).await.unwrap();

    repo.update(
        b.id,
        UpdateExperiment {
            status: Some(ExperimentStatus::Review),
            firefox_channel: Some(Some(FirefoxChannel::Nightly)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.update(
        c.id,
        UpdateExperiment {
            archived: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let visible = repo.list(ExperimentQuery::default()).await.unwrap();
    assert_eq!(visible.len(), 2);
    assert_eq!(visible[0].id, a.id);

    let all = repo
        .list(ExperimentQuery {
            include_archived: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let in_review = repo
        .list(ExperimentQuery {
            status: Some(ExperimentStatus::Review),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_review.len(), 1);
    assert_eq!(in_review[0].id, b.id);

    let nightly = repo
        .list(ExperimentQuery {
            firefox_channel: Some(FirefoxChannel::Nightly),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nightly.len(), 1);
}

#[tokio::test]
async fn subscriptions_are_edges() {
    let db = setup().await;
    let repo = SurrealExperimentRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);

    let experiment = repo.create(create_input("Subscribed")).await.unwrap();
    let alice = users
        .get_or_create_by_email("alice@example.com")
        .await
        .unwrap();

    assert!(!repo.is_subscribed(experiment.id, alice.id).await.unwrap());

    repo.add_subscriber(experiment.id, alice.id).await.unwrap();
    repo.add_subscriber(experiment.id, alice.id).await.unwrap();
    assert!(repo.is_subscribed(experiment.id, alice.id).await.unwrap());

    let subscribers = repo.list_subscribers(experiment.id).await.unwrap();
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].email, "alice@example.com");

    repo.remove_subscriber(experiment.id, alice.id).await.unwrap();
    assert!(!repo.is_subscribed(experiment.id, alice.id).await.unwrap());
}
