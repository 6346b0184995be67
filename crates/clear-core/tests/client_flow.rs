use std::path::Path;

use clear_core::App;
use clear_core::ClientError;
use clear_core::config::Config;
use clear_core::datastore::DataStore;
use clear_core::filter::StatusFilter;
use clear_core::notify::ToastKind;
use clear_core::session::SESSION_KEY;
use clear_core::task::TaskDraft;
use clear_shared::{Credentials, SessionUser};
use serde_json::{Value, json};
use tempfile::tempdir;
use wiremock::matchers::{any, body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 1, "msg": null, "data": data }))
}

fn record(id: u64, title: &str, status: i64) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": null,
        "status": status,
        "categoryId": 7,
        "categoryName": "Work",
        "dueDate": "2030-01-01 09:00:00",
        "createdAt": "2026-01-01T00:00:00Z"
    })
}

fn page(records: Vec<Value>, total: u64) -> ResponseTemplate {
    ok(json!({ "records": records, "total": total }))
}

fn open_app(server: &MockServer, dir: &Path) -> App {
    App::with_base_url(Config::default(), dir, &server.uri()).expect("app")
}

fn logged_in_app(server: &MockServer, dir: &Path) -> App {
    let mut storage = DataStore::open(dir).expect("storage");
    storage
        .set_json(
            SESSION_KEY,
            &SessionUser {
                id: "1".to_string(),
                username: "a".to_string(),
                tk: "T".to_string(),
                theme: Some(1),
            },
        )
        .expect("seed session");
    open_app(server, dir)
}

async fn mount_list(server: &MockServer, page_no: &str, size: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(header("Authorization", "Bearer T"))
        .and(query_param("page", page_no))
        .and(query_param("pageSize", size))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_normalizes_theme_and_persists_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .and(body_json(json!({ "username": "a", "password": "p" })))
        .respond_with(ok(json!({ "id": 1, "username": "a", "tk": "T", "theme": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = open_app(&server, temp.path());
    assert!(!app.auth.is_authenticated());

    app.login(&Credentials {
        username: "a".to_string(),
        password: "p".to_string(),
    })
    .await
    .expect("login");

    assert!(app.auth.is_authenticated());
    assert_eq!(app.auth.theme_id(), Some(1));
    assert_eq!(app.theme.active_name(), "Azure");

    let stored = DataStore::open(temp.path())
        .expect("reopen")
        .get_json::<SessionUser>(SESSION_KEY)
        .expect("stored session");
    assert_eq!(stored.tk, "T");
    assert_eq!(stored.id, "1");
    assert_eq!(stored.theme, Some(1));

    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Success);
}

#[tokio::test]
async fn failed_login_shows_server_message_and_keeps_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "wrong password", "data": null
        })))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = open_app(&server, temp.path());
    let err = app
        .login(&Credentials {
            username: "a".to_string(),
            password: "x".to_string(),
        })
        .await
        .expect_err("rejected");

    assert!(matches!(err, ClientError::Api(ref msg) if msg == "wrong password"));
    assert!(!app.auth.is_authenticated());
    assert_eq!(app.storage.get(SESSION_KEY), None);
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Error);
    assert_eq!(toasts[0].message, "wrong password");
}

#[tokio::test]
async fn unauthenticated_calls_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ok(json!(null)))
        .expect(0)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = open_app(&server, temp.path());

    app.tasks.fetch(&app.api, app.auth.token()).await.expect("no-op");
    assert!(app.tasks.snapshot().is_empty());
    assert!(!app.tasks.is_initialized());

    let added = app
        .tasks
        .add(
            &app.api,
            app.auth.token(),
            &TaskDraft {
                title: "milk".to_string(),
                ..TaskDraft::default()
            },
        )
        .await
        .expect("no-op");
    assert!(added.is_none());

    let err = app
        .api
        .list_categories(None)
        .await
        .expect_err("unauthenticated");
    assert!(err.is_unauthenticated());
    assert!(app.notifier.drain().is_empty());
}

#[tokio::test]
async fn listing_normalizes_records_and_counts_pages() {
    let server = MockServer::start().await;
    mount_list(
        &server,
        "1",
        "3",
        page(
            vec![
                record(11, "first", 1),
                record(12, "second", 2),
                json!({ "id": "13", "status": 1, "categoryId": null }),
            ],
            7,
        ),
    )
    .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");

    let tasks = app.tasks.snapshot();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].id, "11");
    assert_eq!(tasks[0].category_id.as_deref(), Some("7"));
    assert!(!tasks[0].completed);
    assert!(tasks[1].completed);
    assert_eq!(tasks[2].title, "");
    assert_eq!(tasks[2].category, "Default");
    assert!(tasks[2].is_uncategorized());

    let cursor = app.tasks.cursor();
    assert_eq!(cursor.current_page, 1);
    assert_eq!(cursor.total_pages, 3);
    assert_eq!(app.tasks.total(), 7);
    assert_eq!(app.tasks.pending_count(), 2);
}

#[tokio::test]
async fn page_past_the_end_settles_on_the_last_page() {
    let server = MockServer::start().await;
    mount_list(&server, "5", "3", page(vec![], 4)).await;
    mount_list(&server, "2", "3", page(vec![record(4, "four", 1)], 4)).await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks
        .go_to_page(&app.api, app.auth.token(), 5)
        .await
        .expect("fetch");

    assert_eq!(app.tasks.cursor().current_page, 2);
    assert_eq!(app.tasks.cursor().total_pages, 2);
    assert_eq!(app.tasks.snapshot().len(), 1);
}

#[tokio::test]
async fn only_messages_from_the_server_become_error_toasts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/category"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "category already exists", "data": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/category/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());

    let err = app.add_category("Work").await.expect_err("duplicate");
    assert!(matches!(err, ClientError::Api(_)));
    assert_eq!(app.categories.error(), Some("category already exists"));
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "category already exists");

    let err = app.delete_category("9").await.expect_err("server error");
    assert!(matches!(err, ClientError::Http(500)));
    assert!(app.notifier.drain().is_empty());
}

#[tokio::test]
async fn category_fetch_is_memoized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/category"))
        .and(header("Authorization", "Bearer T"))
        .respond_with(ok(json!([
            { "id": 7, "categoryName": "Work" },
            { "id": "8", "categoryName": "Home" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    let first = app
        .categories
        .fetch(&app.api, app.auth.token())
        .await
        .expect("fetch")
        .len();
    let second = app
        .categories
        .fetch(&app.api, app.auth.token())
        .await
        .expect("cached")
        .len();

    assert_eq!(first, 2);
    assert_eq!(second, 2);
    assert_eq!(app.categories.resolve("home").map(|c| c.id.as_str()), Some("8"));
}

#[tokio::test]
async fn added_category_without_confirmed_id_triggers_reload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/category"))
        .and(body_json(json!({ "name": "Gym" })))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/category"))
        .respond_with(ok(json!([{ "id": 3, "categoryName": "Gym" }])))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.add_category("Gym").await.expect("add");

    assert_eq!(app.categories.categories().len(), 1);
    assert!(app.categories.take_change().is_none());
    assert_eq!(app.notifier.drain()[0].kind, ToastKind::Success);
}

#[tokio::test]
async fn deleting_a_category_uncategorizes_its_cached_tasks() {
    let server = MockServer::start().await;
    mount_list(&server, "1", "3", page(vec![record(1, "one", 1)], 1)).await;
    Mock::given(method("GET"))
        .and(path("/category"))
        .respond_with(ok(json!([{ "id": 7, "categoryName": "Work" }])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/category/7"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");
    app.categories
        .fetch(&app.api, app.auth.token())
        .await
        .expect("categories");

    app.delete_category("7").await.expect("delete");

    assert!(app.categories.categories().is_empty());
    let task = app.tasks.get("1").expect("task");
    assert!(task.is_uncategorized());
    assert_eq!(task.category, "Default");
}

#[tokio::test]
async fn delete_tops_up_a_short_page_from_the_next_one() {
    let server = MockServer::start().await;
    mount_list(
        &server,
        "1",
        "3",
        page(vec![record(1, "a", 1), record(2, "b", 1), record(3, "c", 1)], 6),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/todo/2"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "3"))
        .and(query_param("pageSize", "1"))
        .respond_with(page(vec![record(4, "d", 1)], 5))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");
    assert_eq!(app.tasks.cursor().total_pages, 2);

    app.tasks
        .delete(&app.api, app.auth.token(), "2")
        .await
        .expect("delete");

    let ids = app
        .tasks
        .snapshot()
        .iter()
        .map(|t| t.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "3", "4"]);
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().total_pages, 2);
    assert_eq!(app.tasks.total(), 5);
}

#[tokio::test]
async fn deleting_the_only_task_on_a_later_page_steps_back() {
    let server = MockServer::start().await;
    mount_list(&server, "2", "3", page(vec![record(4, "d", 1)], 4)).await;
    mount_list(
        &server,
        "1",
        "3",
        page(vec![record(1, "a", 1), record(2, "b", 1), record(3, "c", 1)], 3),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/todo/4"))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks
        .go_to_page(&app.api, app.auth.token(), 2)
        .await
        .expect("page 2");
    assert_eq!(app.tasks.cursor().current_page, 2);

    app.tasks
        .delete(&app.api, app.auth.token(), "4")
        .await
        .expect("delete");

    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().total_pages, 1);
    assert_eq!(app.tasks.snapshot().len(), 3);
}

#[tokio::test]
async fn deleting_the_last_task_empties_the_view() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .respond_with(page(vec![record(1, "a", 1)], 1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/todo/1"))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");
    app.tasks
        .delete(&app.api, app.auth.token(), "1")
        .await
        .expect("delete");

    assert!(app.tasks.snapshot().is_empty());
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().total_pages, 0);
}

#[tokio::test]
async fn completing_a_task_under_the_in_progress_filter_reloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("status", "1"))
        .respond_with(page(vec![record(1, "a", 1), record(2, "b", 1)], 2))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("status", "1"))
        .respond_with(page(vec![record(2, "b", 1)], 1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/todo"))
        .and(body_json(json!({ "id": "1", "status": 2 })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks
        .set_status(&app.api, app.auth.token(), Some(StatusFilter::InProgress))
        .await
        .expect("filter");
    assert_eq!(app.tasks.snapshot().len(), 2);

    app.tasks
        .toggle_completion(&app.api, app.auth.token(), "1")
        .await
        .expect("toggle");

    assert!(app.tasks.get("1").is_none());
    assert_eq!(app.tasks.snapshot().len(), 1);
}

#[tokio::test]
async fn completing_a_task_without_a_status_filter_patches_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .respond_with(page(vec![record(1, "a", 1), record(2, "b", 1)], 2))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/todo"))
        .and(body_json(json!({ "id": "1", "status": 2 })))
        .respond_with(ok(json!(true)))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");
    let before = app.tasks.snapshot();

    app.tasks
        .toggle_completion(&app.api, app.auth.token(), "1")
        .await
        .expect("toggle");

    assert_eq!(app.tasks.get("1").map(|t| t.completed), Some(true));
    assert!(!before[0].completed);
    assert_eq!(app.tasks.completed_count(), 1);
}

#[tokio::test]
async fn date_range_checks_shape_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("startDate", "2024-13-01"))
        .respond_with(page(vec![], 0))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());

    app.tasks
        .set_date_range(&app.api, app.auth.token(), Some("2024-13-01"), None)
        .await
        .expect("shape is valid");
    assert_eq!(
        app.tasks.cursor().filters.start_date.as_deref(),
        Some("2024-13-01")
    );
    assert_eq!(app.tasks.cursor().total_pages, 0);

    let err = app
        .tasks
        .set_date_range(&app.api, app.auth.token(), Some("2024/01/01"), None)
        .await
        .expect_err("bad shape");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(
        app.tasks.cursor().filters.start_date.as_deref(),
        Some("2024-13-01")
    );
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Error);
}

#[tokio::test]
async fn adding_a_task_returns_to_page_one() {
    let server = MockServer::start().await;
    mount_list(&server, "2", "3", page(vec![record(4, "d", 1)], 4)).await;
    mount_list(
        &server,
        "1",
        "3",
        page(vec![record(9, "milk", 1), record(1, "a", 1), record(2, "b", 1)], 5),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/todo"))
        .and(body_partial_json(json!({ "title": "milk", "content": "" })))
        .respond_with(ok(json!({ "id": 9 })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks
        .go_to_page(&app.api, app.auth.token(), 2)
        .await
        .expect("page 2");

    let created = app
        .tasks
        .add(
            &app.api,
            app.auth.token(),
            &TaskDraft {
                title: "milk".to_string(),
                ..TaskDraft::default()
            },
        )
        .await
        .expect("add")
        .expect("created");

    assert_eq!(created.id, "9");
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.snapshot()[0].id, "9");
    assert_eq!(app.tasks.cursor().total_pages, 2);
}

#[tokio::test]
async fn created_task_is_reported_even_when_the_reload_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/todo"))
        .respond_with(ok(json!({ "id": 9 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    let created = app
        .tasks
        .add(
            &app.api,
            app.auth.token(),
            &TaskDraft {
                title: "milk".to_string(),
                ..TaskDraft::default()
            },
        )
        .await
        .expect("server accepted the task")
        .expect("created");

    assert_eq!(created.id, "9");
    assert!(!app.tasks.is_loading());
    assert!(app.tasks.snapshot().is_empty());
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Success);
    assert_eq!(toasts[0].message, "Task \"milk\" added");
}

#[tokio::test]
async fn deleted_task_stays_deleted_when_the_backfill_fails() {
    let server = MockServer::start().await;
    mount_list(
        &server,
        "1",
        "3",
        page(vec![record(1, "a", 1), record(2, "b", 1), record(3, "c", 1)], 6),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/todo/2"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");

    app.tasks
        .delete(&app.api, app.auth.token(), "2")
        .await
        .expect("server accepted the delete");

    let ids = app
        .tasks
        .snapshot()
        .iter()
        .map(|t| t.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "3"]);
    assert!(!app.tasks.is_loading());
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Task deleted");
}

#[tokio::test]
async fn filter_setters_restart_at_page_one() {
    let server = MockServer::start().await;
    // Mount order decides between overlapping matchers: filtered pages first.
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .and(query_param("categoryId", "7"))
        .respond_with(page(vec![record(1, "a", 1), record(2, "b", 1)], 2))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .and(query_param("keyword", "milk"))
        .respond_with(page(vec![record(9, "milk", 1)], 1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .respond_with(page(vec![record(1, "a", 1), record(2, "b", 1), record(3, "c", 1)], 4))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "2"))
        .respond_with(page(vec![record(4, "d", 1)], 4))
        .expect(3)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    let token = app.auth.token().map(str::to_string);
    let token = token.as_deref();

    app.tasks.go_to_page(&app.api, token, 2).await.expect("page 2");
    app.tasks
        .set_category(&app.api, token, Some("7".to_string()))
        .await
        .expect("category");
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().filters.category_id.as_deref(), Some("7"));
    assert_eq!(app.tasks.snapshot().len(), 2);

    // Unchanged category: no request.
    app.tasks
        .set_category(&app.api, token, Some("7".to_string()))
        .await
        .expect("same category");

    app.tasks.go_to_page(&app.api, token, 2).await.expect("page 2");
    app.tasks.clear_filters(&app.api, token).await.expect("clear");
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().filters.category_id, None);
    assert_eq!(app.tasks.snapshot().len(), 3);

    app.tasks.go_to_page(&app.api, token, 2).await.expect("page 2");
    app.tasks
        .set_keyword(&app.api, token, Some("  milk ".to_string()))
        .await
        .expect("keyword");
    assert_eq!(app.tasks.cursor().current_page, 1);
    assert_eq!(app.tasks.cursor().filters.keyword.as_deref(), Some("milk"));
    assert_eq!(app.tasks.snapshot()[0].id, "9");
}

#[tokio::test]
async fn paging_stops_at_both_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .respond_with(page(vec![record(1, "a", 1), record(2, "b", 1), record(3, "c", 1)], 5))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "2"))
        .respond_with(page(vec![record(4, "d", 1), record(5, "e", 1)], 5))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    let token = app.auth.token().map(str::to_string);
    let token = token.as_deref();
    app.tasks.fetch(&app.api, token).await.expect("fetch");
    assert_eq!(app.tasks.cursor().total_pages, 2);

    assert!(!app.tasks.prev_page(&app.api, token).await.expect("prev at start"));
    assert_eq!(app.tasks.cursor().current_page, 1);

    assert!(app.tasks.next_page(&app.api, token).await.expect("next"));
    assert_eq!(app.tasks.cursor().current_page, 2);
    assert_eq!(app.tasks.snapshot().len(), 2);

    assert!(!app.tasks.next_page(&app.api, token).await.expect("next at end"));
    assert_eq!(app.tasks.cursor().current_page, 2);

    assert!(app.tasks.prev_page(&app.api, token).await.expect("prev"));
    assert_eq!(app.tasks.cursor().current_page, 1);
}

#[tokio::test]
async fn reopening_a_task_under_the_completed_filter_reloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .and(query_param("status", "2"))
        .respond_with(page(vec![record(1, "a", 2), record(2, "b", 2)], 2))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("page", "1"))
        .and(query_param("status", "2"))
        .respond_with(page(vec![record(2, "b", 2)], 1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/todo"))
        .and(body_json(json!({ "id": "1", "status": 1 })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks
        .set_status(&app.api, app.auth.token(), Some(StatusFilter::Completed))
        .await
        .expect("filter");
    assert_eq!(app.tasks.completed_count(), 2);

    app.tasks
        .toggle_completion(&app.api, app.auth.token(), "1")
        .await
        .expect("toggle");

    assert!(app.tasks.get("1").is_none());
    assert_eq!(app.tasks.snapshot().len(), 1);
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Task marked as not done");
}

#[tokio::test]
async fn applying_a_theme_saves_it_for_the_user() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/user/theme/3"))
        .and(header("Authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1, "msg": "Theme updated", "data": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    let palette = app.apply_theme("rouge").await.expect("apply");

    assert_eq!(palette.name, "Rouge");
    assert_eq!(app.theme.active_name(), "Rouge");
    for (variable, value) in palette.colors() {
        assert_eq!(app.theme.root_style().get_property(variable), Some(value));
    }
    assert_eq!(app.auth.theme_id(), Some(3));
    assert_eq!(
        app.storage
            .get_json::<SessionUser>(SESSION_KEY)
            .and_then(|u| u.theme),
        Some(3)
    );
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Theme updated");

    let css = app.write_theme_css().expect("css");
    assert!(
        std::fs::read_to_string(css)
            .expect("read css")
            .contains("--primary-color: #c74c3c;")
    );
}

#[tokio::test]
async fn failed_theme_save_keeps_the_new_palette() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/user/theme/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.apply_theme("Ink Jade").await.expect("applied locally");

    assert_eq!(app.theme.active_name(), "Ink Jade");
    assert_eq!(app.auth.theme_id(), Some(1));

    let err = app.apply_theme("Neon").await.expect_err("unknown");
    assert!(matches!(err, ClientError::ThemeNotFound(_)));
    assert_eq!(app.theme.active_name(), "Ink Jade");
    let toasts = app.notifier.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, ToastKind::Error);
}

#[tokio::test]
async fn logout_clears_cached_views() {
    let server = MockServer::start().await;
    mount_list(&server, "1", "3", page(vec![record(1, "a", 1)], 1)).await;

    let temp = tempdir().expect("tempdir");
    let mut app = logged_in_app(&server, temp.path());
    app.tasks.fetch(&app.api, app.auth.token()).await.expect("fetch");
    app.save_cursor().expect("cursor");

    app.logout().expect("logout");

    assert!(!app.auth.is_authenticated());
    assert!(app.tasks.snapshot().is_empty());
    assert!(!app.tasks.is_initialized());
    assert_eq!(app.storage.get(SESSION_KEY), None);
    assert_eq!(app.storage.get("cursor"), None);
}
