//! Router tests over an in-memory store.

use axum::Router;
use axum::body::{Body, to_bytes};
use chrono::{Duration, Utc};
use experimenter_core::models::experiment::Experiment;
use experimenter_core::models::user::User;
use experimenter_core::repository::{Store, UserRepository};
use experimenter_db::SurrealStore;
use experimenter_server::routes::WARNING_HEADER;
use experimenter_server::{AppState, build_router};
use experimenter_service::{BugTracker, ExperimentService, ServiceConfig};
use http::{HeaderName, Request, StatusCode, header};
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use tower::ServiceExt;

const EMAIL_HEADER: &str = "x-forwarded-user";
const EMAIL: &str = "owner@example.com";

struct NoBugs;

impl BugTracker for NoBugs {
    async fn create_experiment_bug(&self, _: &Experiment, _: &str) -> Option<i64> {
        None
    }

    async fn add_experiment_comment(&self, _: &Experiment) -> Option<i64> {
        None
    }
}

async fn setup() -> (Router, User) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    experimenter_db::run_migrations(&db).await.unwrap();

    let store = SurrealStore::new(db);
    let user = store.users().get_or_create_by_email(EMAIL).await.unwrap();

    let service = ExperimentService::new(store, NoBugs, ServiceConfig::default());
    let state = AppState::new(service, HeaderName::from_static(EMAIL_HEADER));
    (build_router(state), user)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(EMAIL_HEADER, EMAIL)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(EMAIL_HEADER, EMAIL)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn overview(owner: &User) -> Value {
    json!({
        "type": "pref",
        "owner": owner.id,
        "name": "Bigger Buttons",
        "short_description": "Are bigger buttons better?",
        "data_science_bugzilla_url": "https://bugzilla.mozilla.org/show_bug.cgi?id=1",
        "proposed_start_date": (Utc::now().date_naive() + Duration::days(7)).to_string(),
        "proposed_duration": 28,
        "proposed_enrollment": 7,
    })
}

async fn create(router: &Router, owner: &User) -> String {
    let response = router
        .clone()
        .oneshot(post("/experiments", overview(owner)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = location(&response).to_string();
    location
        .trim_start_matches("/experiments/")
        .trim_end_matches('/')
        .to_string()
}

#[tokio::test]
async fn healthz_needs_no_user() {
    let (router, _) = setup().await;
    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let (router, _) = setup().await;
    let request = Request::builder()
        .uri("/experiments")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["category"], "authentication");
}

#[tokio::test]
async fn empty_user_header_is_unauthorized() {
    let (router, _) = setup().await;
    let request = Request::builder()
        .uri("/experiments")
        .header(EMAIL_HEADER, "  ")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_redirects_to_detail_or_next_step() {
    let (router, owner) = setup().await;

    let slug = create(&router, &owner).await;
    assert_eq!(slug, "bigger-buttons");

    let mut second = overview(&owner);
    second["name"] = json!("Smaller Buttons");
    second["action"] = json!("continue");
    let response = router
        .clone()
        .oneshot(post("/experiments", second))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/experiments/smaller-buttons/edit/variants");
}

#[tokio::test]
async fn invalid_form_is_unprocessable_with_field_errors() {
    let (router, owner) = setup().await;
    let mut body = overview(&owner);
    body["name"] = json!("");

    let response = router.oneshot(post("/experiments", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["category"], "validation");
    assert!(body["error"]["fields"]["name"].is_array());
}

#[tokio::test]
async fn detail_returns_experiment_document() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    for uri in [format!("/experiments/{slug}"), format!("/experiments/{slug}/")] {
        let response = router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["experiment"]["name"], "Bigger Buttons");
        assert_eq!(body["owner_email"], EMAIL);
        assert_eq!(body["subscribed"], false);
    }
}

#[tokio::test]
async fn unknown_experiment_is_not_found() {
    let (router, _) = setup().await;
    let response = router.oneshot(get("/experiments/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_steps_continue_in_order() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let body = json!({
        "action": "continue",
        "objectives": "Learn whether size matters",
        "analysis_owner": "analyst@example.com",
        "analysis": "Compare click rates",
    });
    let response = router
        .clone()
        .oneshot(post(&format!("/experiments/{slug}/edit/objectives"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/experiments/{slug}/edit/risks"));

    let mut body = overview(&owner);
    body["short_description"] = json!("Edited");
    let response = router
        .clone()
        .oneshot(post(&format!("/experiments/{slug}/edit/overview"), body))
        .await
        .unwrap();
    assert_eq!(location(&response), format!("/experiments/{slug}/"));
}

#[tokio::test]
async fn illegal_status_change_redirects_to_detail() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .clone()
        .oneshot(post(&format!("/experiments/{slug}/status"), json!({ "status": "Live" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/experiments/{slug}/"));

    let body = json_body(router.oneshot(get(&format!("/experiments/{slug}"))).await.unwrap()).await;
    assert_eq!(body["experiment"]["status"], "Draft");
}

#[tokio::test]
async fn invalid_normandy_id_is_echoed_back() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .oneshot(post(
            &format!("/experiments/{slug}/normandy"),
            json!({ "normandy_id": "abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/experiments/{slug}/?normandy_id=abc"));
}

#[tokio::test]
async fn echoed_normandy_id_is_query_encoded() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .clone()
        .oneshot(post(
            &format!("/experiments/{slug}/normandy"),
            json!({ "normandy_id": "1&status=Live" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/experiments/{slug}/?normandy_id=1%26status%3DLive")
    );

    let response = router
        .clone()
        .oneshot(post(
            &format!("/experiments/{slug}/normandy"),
            json!({ "normandy_id": "é 2" }),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        format!("/experiments/{slug}/?normandy_id=%C3%A9+2")
    );

    let body = json_body(router.oneshot(get(&format!("/experiments/{slug}"))).await.unwrap()).await;
    assert_eq!(body["experiment"]["status"], "Draft");
    assert_eq!(body["experiment"]["normandy_id"], Value::Null);
}

#[tokio::test]
async fn comment_redirects_to_section_anchor() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .clone()
        .oneshot(post(
            &format!("/experiments/{slug}/comment"),
            json!({ "section": "objectives", "text": "Which metric?" }),
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), format!("/experiments/{slug}/#objectives-comments"));

    let response = router
        .oneshot(post(
            &format!("/experiments/{slug}/comment"),
            json!({ "section": "objectives", "text": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), format!("/experiments/{slug}/"));
}

#[tokio::test]
async fn subscribe_and_archive_toggle() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    for action in ["subscribe", "archive"] {
        let response = router
            .clone()
            .oneshot(post(&format!("/experiments/{slug}/{action}"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let body = json_body(
        router
            .oneshot(get(&format!("/experiments/{slug}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["subscriber_count"], 1);
    assert_eq!(body["experiment"]["archived"], true);
}

#[tokio::test]
async fn review_without_permission_sends_warning() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .oneshot(post(
            &format!("/experiments/{slug}/review"),
            json!({ "review_science": true, "review_qa": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get_all(WARNING_HEADER).iter().count(), 1);
}

#[tokio::test]
async fn delivery_callbacks_follow_transitions() {
    let (router, owner) = setup().await;
    let slug = create(&router, &owner).await;

    let response = router
        .clone()
        .oneshot(post(&format!("/api/v1/experiments/{slug}/accept"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    router
        .clone()
        .oneshot(post(&format!("/experiments/{slug}/status"), json!({ "status": "Review" })))
        .await
        .unwrap();

    let response = router
        .oneshot(post(
            &format!("/api/v1/experiments/{slug}/reject"),
            json!({ "message": "Not this release" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "Rejected");
}

#[tokio::test]
async fn list_returns_page() {
    let (router, owner) = setup().await;
    create(&router, &owner).await;

    let response = router
        .clone()
        .oneshot(get("/experiments?search=bigger&ordering=-latest_change"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["experiments"][0]["experiment"]["slug"], "bigger-buttons");

    let response = router.oneshot(get("/experiments?page=5")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
