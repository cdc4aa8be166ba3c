//! HTTP API: route table and shared middleware.

mod admin;
mod appointments;
pub mod auth;
mod doctors;
pub mod error;
mod news;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to City General Hospital API" }))
}

async fn health() -> &'static str {
    "OK"
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let news_routes = Router::new()
        .route("/", get(news::list_news))
        .route("/:id", get(news::get_news));

    let doctor_routes = Router::new().route("/", get(doctors::list_doctors));

    let appointment_routes = Router::new()
        .route(
            "/",
            post(appointments::create_appointment).get(appointments::list_my_appointments),
        )
        .route(
            "/:id",
            get(appointments::get_my_appointment)
                .put(appointments::update_my_appointment)
                .delete(appointments::cancel_appointment),
        );

    let admin_routes = Router::new()
        .route("/login", post(admin::login))
        .route("/profile", get(admin::get_profile).put(admin::update_profile))
        .route("/statistics", get(admin::statistics))
        .route(
            "/news",
            get(news::admin_list_news).post(news::admin_create_news),
        )
        .route("/categories", get(news::list_categories))
        .route(
            "/news/:id",
            put(news::admin_update_news).delete(news::admin_delete_news),
        )
        .route("/users", get(admin::list_users))
        .route(
            "/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/appointments", get(appointments::admin_list_appointments))
        .route(
            "/appointments/:id",
            put(appointments::admin_update_appointment),
        )
        .route("/appointments/:id/assign", post(appointments::assign_doctor));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/auth", auth_routes)
        .nest("/api/news", news_routes)
        .nest("/api/doctors", doctor_routes)
        .nest("/api/appointments", appointment_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn test_app() -> Router {
        let pool = db::init_in_memory().await.unwrap();
        let config = Config::default();
        db::seed_defaults(&pool, &config.auth).await.unwrap();
        create_router(Arc::new(AppState::new(config, pool)))
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Sign up a patient and return an access/refresh token pair.
    async fn patient_tokens(app: &Router, email: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": email,
                    "name": "Test Patient",
                    "password": "patient-password"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(form_request(
                "/api/auth/login",
                &format!("username={}&password=patient-password", email),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Log in as the bootstrap admin and return the access token.
    async fn admin_token(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/login",
                None,
                json!({ "username": "admin", "password": "admin123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        body["access_token"].as_str().unwrap().to_string()
    }

    fn sample_article(status: &str) -> Value {
        json!({
            "title": "New cardiology wing opens",
            "summary": "The hospital opens a dedicated cardiology wing.",
            "content": "Full press release text.",
            "category": "announcements",
            "image_url": "https://hospital.example/images/wing.jpg",
            "date": Utc::now().to_rfc3339(),
            "status": status
        })
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = test_app().await;

        let response = app.clone().oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("Hospital"));
    }

    #[tokio::test]
    async fn test_signup_login_me() {
        let app = test_app().await;
        let (access, _) = patient_tokens(&app, "alice@example.com").await;

        let response = app
            .oneshot(get_request("/api/auth/me", Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["email"], "alice@example.com");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_rejected() {
        let app = test_app().await;
        patient_tokens(&app, "bob@example.com").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": "bob@example.com",
                    "name": "Bob Again",
                    "password": "another-password"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Email already registered");
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_generic_401() {
        let app = test_app().await;
        patient_tokens(&app, "carol@example.com").await;

        let response = app
            .clone()
            .oneshot(form_request(
                "/api/auth/login",
                "username=carol@example.com&password=wrong-password",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let wrong_password = body_json(response).await;

        let response = app
            .oneshot(form_request(
                "/api/auth/login",
                "username=nobody@example.com&password=wrong-password",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let unknown_account = body_json(response).await;

        // Unknown accounts and bad passwords are indistinguishable
        assert_eq!(
            wrong_password["error"]["message"],
            unknown_account["error"]["message"]
        );
    }

    #[tokio::test]
    async fn test_me_rejects_garbage_token() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(get_request("/api/auth/me", Some("not-a-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get_request("/api/auth/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_rotation_invalidates_old_token() {
        let app = test_app().await;
        let (_, refresh) = patient_tokens(&app, "dave@example.com").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/refresh",
                None,
                json!({ "refresh_token": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let new_refresh = body["refresh_token"].as_str().unwrap().to_string();
        assert_ne!(new_refresh, refresh);

        // The consumed token no longer refreshes
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/refresh",
                None,
                json!({ "refresh_token": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The replacement still works
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/refresh",
                None,
                json!({ "refresh_token": new_refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_single_use() {
        let app = test_app().await;
        let (_, refresh) = patient_tokens(&app, "oscar@example.com").await;

        let request = || {
            json_request(
                "POST",
                "/api/auth/refresh",
                None,
                json!({ "refresh_token": refresh }),
            )
        };
        let (first, second) =
            tokio::join!(app.clone().oneshot(request()), app.clone().oneshot(request()));
        let statuses = [first.unwrap().status(), second.unwrap().status()];

        // Exactly one presentation wins, whatever the interleaving
        assert_eq!(
            statuses.iter().filter(|s| **s == StatusCode::OK).count(),
            1,
            "statuses: {:?}",
            statuses
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == StatusCode::UNAUTHORIZED)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_login_survives_session_audit_failure() {
        let pool = db::init_in_memory().await.unwrap();
        let config = Config::default();
        db::seed_defaults(&pool, &config.auth).await.unwrap();
        let app = create_router(Arc::new(AppState::new(config, pool.clone())));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": "pat@example.com",
                    "name": "Pat",
                    "password": "patient-password"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Break the audit table; login must still hand out tokens
        sqlx::query("DROP TABLE user_sessions")
            .execute(&pool)
            .await
            .unwrap();

        let response = app
            .oneshot(form_request(
                "/api/auth/login",
                "username=pat@example.com&password=patient-password",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["access_token"].is_string());
    }

    #[tokio::test]
    async fn test_logout_revokes_and_always_succeeds() {
        let app = test_app().await;
        let (_, refresh) = patient_tokens(&app, "erin@example.com").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/logout",
                None,
                json!({ "refresh_token": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/refresh",
                None,
                json!({ "refresh_token": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Logging out an unknown token still reports success
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/logout",
                None,
                json!({ "refresh_token": "completely-made-up" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Successfully logged out");
    }

    #[tokio::test]
    async fn test_admin_login_wrong_password_not_locked_out() {
        let app = test_app().await;

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/admin/login",
                    None,
                    json!({ "username": "admin", "password": "wrong" }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        // Correct credentials still work after failed attempts
        admin_token(&app).await;
    }

    #[tokio::test]
    async fn test_published_article_views_increment() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/news",
                Some(&token),
                sample_article("published"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let article = body_json(response).await;
        let id = article["id"].as_str().unwrap().to_string();
        assert_eq!(article["views_count"], 0);
        assert!(article["published_at"].is_string());

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/news/{}", id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["views_count"], 1);

        let response = app
            .oneshot(get_request(&format!("/api/news/{}", id), None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["views_count"], 2);
    }

    #[tokio::test]
    async fn test_draft_article_hidden_from_public() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/news",
                Some(&token),
                sample_article("draft"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let article = body_json(response).await;
        let id = article["id"].as_str().unwrap().to_string();
        assert!(article["published_at"].is_null());

        // Invisible through the public endpoints
        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/news/{}", id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(get_request("/api/news", None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        // Visible in the editorial list
        let response = app
            .clone()
            .oneshot(get_request("/api/admin/news", Some(&token)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);

        // Publishing stamps published_at and exposes the article
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/admin/news/{}", id),
                Some(&token),
                json!({ "status": "published" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert!(updated["published_at"].is_string());

        let response = app
            .oneshot(get_request(&format!("/api/news/{}", id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_lists_categories() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/news",
                Some(&token),
                sample_article("published"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(get_request("/api/admin/categories", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!(["announcements"]));
    }

    #[tokio::test]
    async fn test_editor_permissions_enforced() {
        let pool = db::init_in_memory().await.unwrap();
        let config = Config::default();
        db::seed_defaults(&pool, &config.auth).await.unwrap();

        // An editor who may read news but not create it
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO admins (id, username, email, password_hash, role, permissions,
                                is_active, created_at, updated_at)
            VALUES (?, 'editor', 'editor@hospital.com', ?, 'editor', ?, 1, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(crate::auth::hash_password("editor-password").unwrap())
        .bind(r#"{"news": ["read"]}"#)
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let app = create_router(Arc::new(AppState::new(config, pool)));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/login",
                None,
                json!({ "username": "editor", "password": "editor-password" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_request("/api/admin/news", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/news",
                Some(&token),
                sample_article("draft"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(get_request("/api/admin/users", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_user_token_rejected_on_admin_routes() {
        let app = test_app().await;
        let (access, _) = patient_tokens(&app, "frank@example.com").await;

        let response = app
            .oneshot(get_request("/api/admin/news", Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_appointment_lifecycle() {
        let app = test_app().await;
        let (access, _) = patient_tokens(&app, "grace@example.com").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/appointments",
                Some(&access),
                json!({
                    "date": "2026-09-15T10:00:00Z",
                    "reason": "Annual check-up"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let appointment = body_json(response).await;
        let id = appointment["id"].as_str().unwrap().to_string();
        assert_eq!(appointment["status"], "pending");

        let response = app
            .clone()
            .oneshot(get_request("/api/appointments", Some(&access)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // Cancellation keeps the row
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/appointments/{}", id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "cancelled");

        let response = app
            .oneshot(get_request(
                &format!("/api/appointments/{}", id),
                Some(&access),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_appointments_scoped_to_owner() {
        let app = test_app().await;
        let (owner, _) = patient_tokens(&app, "heidi@example.com").await;
        let (other, _) = patient_tokens(&app, "ivan@example.com").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/appointments",
                Some(&owner),
                json!({
                    "date": "2026-10-01T09:00:00Z",
                    "reason": "Follow-up"
                }),
            ))
            .await
            .unwrap();
        let appointment = body_json(response).await;
        let id = appointment["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(get_request(&format!("/api/appointments/{}", id), Some(&other)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_assigns_doctor() {
        let app = test_app().await;
        let (access, _) = patient_tokens(&app, "judy@example.com").await;
        let token = admin_token(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/appointments",
                Some(&access),
                json!({
                    "date": "2026-11-20T14:30:00Z",
                    "reason": "Chest pain consultation"
                }),
            ))
            .await
            .unwrap();
        let appointment = body_json(response).await;
        let id = appointment["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_request("/api/doctors", None))
            .await
            .unwrap();
        let doctors = body_json(response).await;
        let doctor_id = doctors[0]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/admin/appointments/{}/assign", id),
                Some(&token),
                json!({ "doctor_id": doctor_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["doctor_id"], doctor_id.as_str());

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/admin/appointments/{}", id),
                Some(&token),
                json!({ "status": "confirmed" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_admin_statistics() {
        let app = test_app().await;
        let token = admin_token(&app).await;
        patient_tokens(&app, "kim@example.com").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/news",
                Some(&token),
                sample_article("published"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(get_request("/api/admin/statistics", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_articles"], 1);
        assert_eq!(body["published_articles"], 1);
        assert_eq!(body["draft_articles"], 0);
        assert_eq!(body["total_users"], 1);
    }

    #[tokio::test]
    async fn test_admin_manages_users() {
        let app = test_app().await;
        let token = admin_token(&app).await;
        patient_tokens(&app, "leo@example.com").await;

        let response = app
            .clone()
            .oneshot(get_request("/api/admin/users", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        let user_id = body["items"][0]["id"].as_str().unwrap().to_string();

        // Deactivate the account; their access tokens stop working
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/admin/users/{}", user_id),
                Some(&token),
                json!({ "is_active": false }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_active"], false);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/admin/users/{}", user_id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(get_request("/api/admin/users", Some(&token)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_deactivated_user_token_rejected() {
        let app = test_app().await;
        let token = admin_token(&app).await;
        let (access, _) = patient_tokens(&app, "mallory@example.com").await;

        let response = app
            .clone()
            .oneshot(get_request("/api/admin/users", Some(&token)))
            .await
            .unwrap();
        let body = body_json(response).await;
        let user_id = body["items"][0]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/admin/users/{}", user_id),
                Some(&token),
                json!({ "is_active": false }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(get_request("/api/auth/me", Some(&access)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_validation_errors_reported_per_field() {
        let app = test_app().await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": "not-an-email",
                    "name": "",
                    "password": "short"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
        let details = body["error"]["details"].as_object().unwrap();
        assert!(details.contains_key("email"));
        assert!(details.contains_key("name"));
        assert!(details.contains_key("password"));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let app = test_app().await;
        patient_tokens(&app, "nina@example.com").await;

        // The response never reveals whether the account exists
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/forgot-password",
                None,
                json!({ "email": "nina@example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let known = body_json(response).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/forgot-password",
                None,
                json!({ "email": "missing@example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let unknown = body_json(response).await;
        assert_eq!(known["message"], unknown["message"]);

        // A fabricated token is rejected
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/auth/reset-password",
                None,
                json!({
                    "token": "made-up-token",
                    "new_password": "brand-new-password"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
