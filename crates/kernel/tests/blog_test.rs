#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the blog kernel.
//!
//! These drive the REAL router and middleware stack over the in-memory
//! store, one fresh application per test.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;

mod common;
use common::TestApp;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn healthz_reports_draining_after_shutdown_begins() {
    let app = TestApp::new();

    let response = app
        .send(Request::get("/healthz").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "OK");

    app.state.begin_shutdown();

    let response = app
        .send(Request::get("/healthz").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, "Shutting down");
}

// =============================================================================
// Publishing
// =============================================================================

#[tokio::test]
async fn same_title_twice_gets_suffixed_slugs() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "correct horse").await;

    let first = alice.create_post("Hello, World!", "<p>First</p>").await;
    let second = alice.create_post("Hello, World!", "<p>Second</p>").await;

    assert_eq!(first, "hello-world");
    assert_eq!(second, "hello-world-2");

    let page = alice.get("/posts/hello-world-2").await;
    assert_eq!(page.status, StatusCode::OK);
    let context = page.json();
    assert_eq!(context["view"], "post.html");
    assert_eq!(context["post"]["title"], "Hello, World!");
    assert_eq!(context["post"]["author_username"], "alice");
    assert_eq!(context["is_author"], true);
    assert_eq!(
        page.messages(),
        vec!["Post has been created successfully.".to_string()]
    );
}

#[tokio::test]
async fn year_titled_post_can_be_published_twice() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "correct horse").await;

    let first = alice.create_post("Best of 2024", "<p>One</p>").await;
    let second = alice.create_post("Best of 2024", "<p>Two</p>").await;

    assert_eq!(first, "best-of-2024");
    assert_eq!(second, "best-of-2025");
    assert_eq!(alice.get("/posts/best-of-2025").await.status, StatusCode::OK);
}

#[tokio::test]
async fn post_content_is_sanitized_on_create() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let slug = alice
        .create_post(
            "Unsafe",
            "<p onclick=\"steal()\">Hi <script>alert(1)</script><a href=\"javascript:x()\">x</a></p>",
        )
        .await;

    let post = alice.get(&format!("/posts/{slug}")).await.json()["post"].clone();
    let content = post["content"].as_str().unwrap();
    assert!(content.contains("<p>"));
    assert!(!content.contains("script"));
    assert!(!content.contains("onclick"));
    assert!(!content.contains("javascript:"));
    assert_eq!(post["excerpt"], "Hi x");
}

#[tokio::test]
async fn posts_new_is_never_shadowed_by_a_post() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let slug = alice.create_post("New", "<p>x</p>").await;
    assert_eq!(slug, "new-2");

    let page = alice.get("/posts/new").await;
    assert_eq!(page.json()["view"], "post_form.html");
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    let response = visitor.get("/posts/does-not-exist").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_can_edit_and_delete_own_post() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;
    let slug = alice.create_post("Draft", "<p>v1</p>").await;

    alice.get(&format!("/posts/{slug}/edit")).await;
    let response = alice
        .post(
            &format!("/posts/{slug}/edit"),
            &[("title", "Final Title"), ("content", "<p>v2</p>")],
        )
        .await;
    response.assert_redirect("/posts/final-title");

    alice.get("/posts/final-title").await;
    let response = alice.post("/posts/final-title/delete", &[]).await;
    response.assert_redirect("/");

    assert_eq!(app.state.store().posts.count().await.unwrap(), 0);
}

#[tokio::test]
async fn non_author_cannot_edit_or_delete() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;
    let slug = alice.create_post("Mine", "<p>mine</p>").await;

    let mut bob = app.browser();
    bob.register("bob", "pw").await;

    let response = bob.get(&format!("/posts/{slug}/edit")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    bob.get("/").await;
    let response = bob
        .post(
            &format!("/posts/{slug}/edit"),
            &[("title", "Hijacked"), ("content", "<p>x</p>")],
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    bob.get("/").await;
    let response = bob.post(&format!("/posts/{slug}/delete"), &[]).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let post = app.state.store().posts.get_by_slug(&slug).await.unwrap();
    assert_eq!(post.unwrap().post.title, "Mine");
}

#[tokio::test]
async fn empty_title_is_reported_as_form_error() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    alice.get("/posts/new").await;
    let response = alice
        .post("/posts", &[("title", "  "), ("content", "<p>x</p>")])
        .await;
    response.assert_redirect("/posts/new");

    let page = alice.get("/posts/new").await;
    assert_eq!(
        page.json()["form_errors"]["post_form"]["title"],
        "Title is required"
    );
    assert_eq!(app.state.store().posts.count().await.unwrap(), 0);
}

// =============================================================================
// Front page
// =============================================================================

#[tokio::test]
async fn front_page_paginates_newest_first() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;
    for i in 1..=11 {
        alice
            .create_post(&format!("Post {i}"), "<p>body</p>")
            .await;
    }

    let first = alice.get("/").await.json();
    assert_eq!(first["posts"].as_array().unwrap().len(), 10);
    assert_eq!(first["total_pages"], 2);
    assert_eq!(first["has_next"], true);
    assert_eq!(first["posts"][0]["title"], "Post 11");

    let second = alice.get("/?page=2").await.json();
    assert_eq!(second["posts"].as_array().unwrap().len(), 1);
    assert_eq!(second["posts"][0]["title"], "Post 1");
}

#[tokio::test]
async fn invalid_page_is_bad_request() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    assert_eq!(visitor.get("/?page=0").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(visitor.get("/?page=abc").await.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Flash notifications
// =============================================================================

#[tokio::test]
async fn notifications_are_shown_exactly_once() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let first = alice.get("/").await;
    assert_eq!(
        first.messages(),
        vec!["User has been registered successfully.".to_string()]
    );

    let second = alice.get("/").await;
    assert!(second.messages().is_empty());
}

#[tokio::test]
async fn logout_flash_follows_registration_flash() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let profile = alice.get("/profile").await;
    assert_eq!(
        profile.messages(),
        vec!["User has been registered successfully.".to_string()]
    );

    let response = alice.post("/logout", &[]).await;
    response.assert_redirect("/");

    let home = alice.get("/").await;
    assert_eq!(home.messages(), vec!["Logged out successfully.".to_string()]);
    assert_eq!(home.json()["current_user"], Value::Null);
}

// =============================================================================
// Authentication and guards
// =============================================================================

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    visitor.get("/profile").await.assert_redirect("/login");
    visitor.get("/posts/new").await.assert_redirect("/login");
}

#[tokio::test]
async fn signed_in_users_are_sent_home_from_guest_pages() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    alice.get("/login").await.assert_redirect("/");
    alice.get("/register").await.assert_redirect("/");
    alice.get("/forgot-password").await.assert_redirect("/");
}

#[tokio::test]
async fn failed_login_rerenders_with_401() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "right").await;
    alice.get("/").await;
    alice.post("/logout", &[]).await.assert_redirect("/");

    alice.get("/login").await;
    let response = alice
        .post("/login", &[("username", "alice"), ("password", "wrong")])
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["view"], "login.html");
    assert_eq!(
        response.messages(),
        vec!["Invalid username or password.".to_string()]
    );

    let response = alice
        .post("/login", &[("username", "alice"), ("password", "right")])
        .await;
    response.assert_redirect("/");
    let home = alice.get("/").await;
    assert_eq!(home.json()["current_user"]["username"], "alice");
}

#[tokio::test]
async fn deleted_user_session_becomes_anonymous() {
    let app = TestApp::new();
    let mut bob = app.browser();
    bob.register("bob", "pw").await;

    let user = app
        .state
        .store()
        .users
        .get_by_username("bob")
        .await
        .unwrap()
        .unwrap();
    assert!(app.state.store().users.delete(user.id).await.unwrap());

    let home = bob.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.json()["current_user"], Value::Null);

    // The stale claim was cleared, so a new "bob" is not signed in either
    app.state
        .store()
        .users
        .create(quire_kernel::models::NewUser::new("bob", "bob2@example.com", "pw").unwrap())
        .await
        .unwrap();
    bob.get("/profile").await.assert_redirect("/login");
}

#[tokio::test]
async fn registration_errors_are_flashed_to_the_form() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    visitor.get("/register").await;
    let response = visitor
        .post(
            "/register",
            &[
                ("username", "carol"),
                ("email_address", "carol@example.com"),
                ("password", "one"),
                ("password_confirmation", "two"),
            ],
        )
        .await;
    response.assert_redirect("/register");

    let page = visitor.get("/register").await;
    let context = page.json();
    assert_eq!(
        context["form_errors"]["register_form"]["password_confirmation"],
        "Password and confirmation do not match"
    );
    assert_eq!(page.messages(), vec!["Invalid form submission.".to_string()]);
    assert!(
        !app.state
            .store()
            .users
            .exists_by_username("carol")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::new();
    app.browser().register("dave", "pw").await;

    let mut other = app.browser();
    other.get("/register").await;
    other
        .post(
            "/register",
            &[
                ("username", "dave"),
                ("email_address", "someone-else@example.com"),
                ("password", "pw"),
                ("password_confirmation", "pw"),
            ],
        )
        .await
        .assert_redirect("/register");

    let page = other.get("/register").await;
    assert_eq!(
        page.json()["form_errors"]["register_form"]["username"],
        "Username is already taken"
    );
}

// =============================================================================
// CSRF
// =============================================================================

#[tokio::test]
async fn post_without_token_is_forbidden() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let response = alice
        .post_with_token("/posts", "", &[("title", "Sneaky"), ("content", "x")])
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body, "Forbidden - CSRF token invalid");
    assert_eq!(app.state.store().posts.count().await.unwrap(), 0);
}

#[tokio::test]
async fn tokens_are_single_use() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let page = alice.get("/posts/new").await;
    let token = page.json()["csrf_token"].as_str().unwrap().to_string();

    let first = alice
        .post_with_token("/posts", &token, &[("title", "Once"), ("content", "x")])
        .await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);

    let replay = alice
        .post_with_token("/posts", &token, &[("title", "Twice"), ("content", "x")])
        .await;
    assert_eq!(replay.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn foreign_origin_is_forbidden_even_with_token() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let page = alice.get("/posts/new").await;
    let token = page.json()["csrf_token"].as_str().unwrap().to_string();
    let body = format!("_token={token}&title=Cross&content=x");

    let response = alice
        .send(
            Request::post("/posts")
                .header(header::HOST, "blog.example.com")
                .header(header::ORIGIN, "https://evil.example.net")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn header_token_is_accepted() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;

    let page = alice.get("/posts/new").await;
    let token = page.json()["csrf_token"].as_str().unwrap().to_string();

    let response = alice
        .send(
            Request::post("/posts")
                .header("x-csrf-token", &token)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("title=Via+Header&content=x"))
                .unwrap(),
        )
        .await;
    response.assert_redirect("/posts/via-header");
}

// =============================================================================
// Comments
// =============================================================================

#[tokio::test]
async fn comments_are_sanitized_and_owned() {
    let app = TestApp::new();
    let mut alice = app.browser();
    alice.register("alice", "pw").await;
    let slug = alice.create_post("Discuss", "<p>Topic</p>").await;

    let page = alice.get(&format!("/posts/{slug}")).await;
    let post_id = page.json()["post"]["id"].as_str().unwrap().to_string();

    let response = alice
        .post(
            "/comments",
            &[
                ("post_id", post_id.as_str()),
                ("content", "<p>Nice <img src=x onerror=alert(1)></p>"),
            ],
        )
        .await;
    response.assert_redirect(&format!("/posts/{slug}"));

    let page = alice.get(&format!("/posts/{slug}")).await;
    let comments = page.json()["comments"].clone();
    let comment = &comments[0];
    assert_eq!(comment["author_username"], "alice");
    assert!(!comment["content"].as_str().unwrap().contains("onerror"));
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let mut bob = app.browser();
    bob.register("bob", "pw").await;
    bob.get("/").await;
    let response = bob
        .post(&format!("/comments/{comment_id}/delete"), &[])
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    alice.get(&format!("/comments/{comment_id}/edit")).await;
    alice
        .post(
            &format!("/comments/{comment_id}/edit"),
            &[("content", "<p>Edited</p>")],
        )
        .await
        .assert_redirect(&format!("/posts/{slug}"));

    let page = alice.get(&format!("/posts/{slug}")).await;
    assert_eq!(page.json()["comments"][0]["content"], "<p>Edited</p>");

    alice
        .post(&format!("/comments/{comment_id}/delete"), &[])
        .await
        .assert_redirect(&format!("/posts/{slug}"));
    let page = alice.get(&format!("/posts/{slug}")).await;
    assert!(page.json()["comments"].as_array().unwrap().is_empty());
}

// =============================================================================
// Profile and password reset
// =============================================================================

#[tokio::test]
async fn profile_update_and_password_change() {
    let app = TestApp::new();
    let mut erin = app.browser();
    erin.register("erin", "old-pass").await;

    erin.get("/profile").await;
    erin.post(
        "/profile",
        &[
            ("name", "Erin E."),
            ("email_address", "erin@example.org"),
            ("avatar_url", "https://example.org/erin.png"),
        ],
    )
    .await
    .assert_redirect("/profile");

    let page = erin.get("/profile").await;
    let user = page.json()["current_user"].clone();
    assert_eq!(user["name"], "Erin E.");
    assert_eq!(user["email_address"], "erin@example.org");
    assert_eq!(user["avatar_url"], "https://example.org/erin.png");
    assert!(user.get("password_hash").is_none());

    erin.post(
        "/profile/password",
        &[
            ("current_password", "wrong"),
            ("new_password", "new-pass"),
            ("new_password_confirmation", "new-pass"),
        ],
    )
    .await
    .assert_redirect("/profile");

    let page = erin.get("/profile").await;
    assert_eq!(
        page.json()["form_errors"]["profile_password_form"]["current_password"],
        "Current password is incorrect"
    );

    erin.post(
        "/profile/password",
        &[
            ("current_password", "old-pass"),
            ("new_password", "new-pass"),
            ("new_password_confirmation", "new-pass"),
        ],
    )
    .await
    .assert_redirect("/profile");

    let stored = app
        .state
        .store()
        .users
        .get_by_username("erin")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.verify_password("new-pass"));
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    let mut frank = app.browser();
    frank.register("frank", "forgotten").await;
    frank.get("/").await;
    frank.post("/logout", &[]).await.assert_redirect("/");

    frank.get("/forgot-password").await;
    frank
        .post("/forgot-password", &[("email_address", "frank@example.com")])
        .await
        .assert_redirect("/");

    let mail = app.sent_mail();
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].to, "frank@example.com");
    let link = mail[0]
        .body
        .lines()
        .find(|line| line.starts_with("http://localhost/reset-password?token="))
        .expect("reset link in body")
        .to_string();
    let token = link.rsplit('=').next().unwrap().to_string();

    let page = frank.get(&format!("/reset-password?token={token}")).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.json()["token"], token.as_str());

    frank
        .post(
            "/reset-password",
            &[
                ("token", token.as_str()),
                ("new_password", "remembered"),
                ("new_password_confirmation", "remembered"),
            ],
        )
        .await
        .assert_redirect("/login");

    frank.get("/login").await;
    frank
        .post(
            "/login",
            &[("username", "frank"), ("password", "remembered")],
        )
        .await
        .assert_redirect("/");

    // The token is single-use
    let mut other = app.browser();
    other.get("/").await;
    other
        .post(
            "/reset-password",
            &[
                ("token", token.as_str()),
                ("new_password", "again"),
                ("new_password_confirmation", "again"),
            ],
        )
        .await
        .assert_redirect("/forgot-password");
}

#[tokio::test]
async fn forgot_password_does_not_reveal_unknown_addresses() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    visitor.get("/forgot-password").await;
    visitor
        .post("/forgot-password", &[("email_address", "nobody@example.com")])
        .await
        .assert_redirect("/");

    let home = visitor.get("/").await;
    assert_eq!(
        home.messages(),
        vec!["Reset password link has been sent successfully.".to_string()]
    );
    assert!(app.sent_mail().is_empty());
}

#[tokio::test]
async fn reset_page_requires_token() {
    let app = TestApp::new();
    let mut visitor = app.browser();

    let response = visitor.get("/reset-password").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
