//! REST client behaviour against an in-process Unisphere stand-in.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use unityvol::{ArrayClient, Host, Lun, UnityApiError, UnityClient, UnityConfig};

const CSRF_HEADER: &str = "emc-csrf-token";
const CSRF_TOKEN: &str = "token-7f3a";
const IN_USE_MESSAGE: &str = "The LUN cannot be deleted because it has host access configured.";

#[derive(Debug, Default)]
struct ArrayState {
    luns: BTreeMap<String, Vec<String>>,
    hosts: BTreeMap<String, String>,
    modify_bodies: Vec<(String, Value)>,
    mutation_tokens: Vec<Option<String>>,
}

#[derive(Clone, Debug, Default)]
struct FakeUnisphere {
    state: Arc<Mutex<ArrayState>>,
}

impl FakeUnisphere {
    fn lock(&self) -> MutexGuard<'_, ArrayState> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("fake array state poisoned: {err}"))
    }

    fn modify_bodies(&self) -> Vec<(String, Value)> {
        self.lock().modify_bodies.clone()
    }

    fn mutation_tokens(&self) -> Vec<Option<String>> {
        self.lock().mutation_tokens.clone()
    }

    fn hosts_of(&self, lun_id: &str) -> Vec<String> {
        self.lock().luns.get(lun_id).cloned().unwrap_or_default()
    }

    /// Records the presented CSRF token and reports whether it is valid.
    fn check_token(&self, headers: &HeaderMap) -> bool {
        let token = headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let valid = token.as_deref() == Some(CSRF_TOKEN);
        self.lock().mutation_tokens.push(token);
        valid
    }
}

fn error_body(status: StatusCode, code: u64, message: &str) -> Response {
    let body = json!({
        "error": {
            "errorCode": code,
            "httpStatusCode": status.as_u16(),
            "messages": [{ "en-US": message }],
        }
    });
    (status, Json(body)).into_response()
}

fn host_json(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

async fn login() -> Response {
    (
        StatusCode::OK,
        [(CSRF_HEADER, CSRF_TOKEN)],
        Json(json!({ "entries": [] })),
    )
        .into_response()
}

async fn get_lun(State(fake): State<FakeUnisphere>, Path(id): Path<String>) -> Response {
    let state = fake.lock();
    let Some(hosts) = state.luns.get(&id) else {
        return error_body(StatusCode::NOT_FOUND, 131_149_829, "The requested resource does not exist.");
    };
    let access: Vec<Value> = hosts
        .iter()
        .map(|host_id| json!({ "host": { "id": host_id }, "accessMask": 1 }))
        .collect();
    Json(json!({
        "content": {
            "id": id,
            "name": format!("{id}-data"),
            "sizeTotal": 10_u64 << 30,
            "hostAccess": access,
        }
    }))
    .into_response()
}

async fn get_host(State(fake): State<FakeUnisphere>, Path(id): Path<String>) -> Response {
    fake.lock().hosts.get(&id).map_or_else(
        || error_body(StatusCode::NOT_FOUND, 131_149_829, "The requested resource does not exist."),
        |name| Json(json!({ "content": host_json(&id, name) })).into_response(),
    )
}

async fn list_hosts(
    State(fake): State<FakeUnisphere>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Response {
    let wanted = query
        .get("filter")
        .and_then(|filter| filter.strip_prefix("name eq \""))
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_owned);
    let entries: Vec<Value> = fake
        .lock()
        .hosts
        .iter()
        .filter(|(_, name)| wanted.as_deref().is_none_or(|target| target == name.as_str()))
        .map(|(id, name)| json!({ "content": host_json(id, name) }))
        .collect();
    Json(json!({ "entries": entries })).into_response()
}

async fn modify_lun(
    State(fake): State<FakeUnisphere>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !fake.check_token(&headers) {
        return error_body(StatusCode::UNAUTHORIZED, 131_149_861, "Missing or invalid CSRF token.");
    }
    let hosts: Vec<String> = body
        .pointer("/lunParameters/hostAccess")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.pointer("/host/id").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    let mut state = fake.lock();
    let Some(stored) = state.luns.get_mut(&id) else {
        return error_body(StatusCode::NOT_FOUND, 131_149_829, "The requested resource does not exist.");
    };
    *stored = hosts;
    state.modify_bodies.push((id, body));
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_resource(
    State(fake): State<FakeUnisphere>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !fake.check_token(&headers) {
        return error_body(StatusCode::UNAUTHORIZED, 131_149_861, "Missing or invalid CSRF token.");
    }
    let mut state = fake.lock();
    match state.luns.get(&id).map(Vec::is_empty) {
        None => error_body(StatusCode::NOT_FOUND, 131_149_829, "The requested resource does not exist."),
        Some(false) => error_body(StatusCode::CONFLICT, 108_007_744, IN_USE_MESSAGE),
        Some(true) => {
            state.luns.remove(&id);
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

struct Harness {
    fake: FakeUnisphere,
    client: UnityClient,
}

#[fixture]
fn seeded() -> FakeUnisphere {
    let fake = FakeUnisphere::default();
    {
        let mut state = fake.lock();
        for (id, name) in [("Host_1", "node-a"), ("Host_2", "node-b"), ("Host_3", "node-c")] {
            state.hosts.insert(id.to_owned(), name.to_owned());
        }
        state.luns.insert(String::from("sv_1"), vec![String::from("Host_2")]);
        state.luns.insert(String::from("sv_2"), Vec::new());
    }
    fake
}

async fn start(fake: FakeUnisphere) -> Harness {
    let app = Router::new()
        .route("/api/types/loginSessionInfo/instances", get(login))
        .route("/api/instances/lun/:id", get(get_lun))
        .route("/api/instances/host/:id", get(get_host))
        .route("/api/types/host/instances", get(list_hosts))
        .route(
            "/api/instances/storageResource/:id/action/modifyLun",
            post(modify_lun),
        )
        .route("/api/instances/storageResource/:id", delete(delete_resource))
        .with_state(fake.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind fake array: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("fake array address: {err}"));
    tokio::spawn(async move { axum::serve(listener, app).await });

    let config = UnityConfig {
        endpoint: format!("http://{addr}"),
        user_name: String::from("admin"),
        password: String::from("Password123!"),
        storage_pool_id: Some(String::from("pool_1")),
        storage_pool_name: None,
        insecure: false,
        api_timeout_secs: 5,
        instance_id_file: None,
        host_id: None,
        host_name: None,
    };
    let client = UnityClient::new(&config).unwrap_or_else(|err| panic!("client: {err}"));
    Harness { fake, client }
}

async fn logged_in(fake: FakeUnisphere) -> Harness {
    let harness = start(fake).await;
    harness
        .client
        .authenticate()
        .await
        .unwrap_or_else(|err| panic!("login: {err}"));
    harness
}

async fn lun(client: &UnityClient, id: &str) -> Lun {
    client
        .lun_by_id(id)
        .await
        .unwrap_or_else(|err| panic!("lun {id}: {err}"))
        .unwrap_or_else(|| panic!("lun {id} should exist"))
}

fn host(id: &str, name: &str) -> Host {
    Host {
        id: id.to_owned(),
        name: name.to_owned(),
    }
}

fn host_access_body(host_ids: &[&str]) -> Value {
    let entries: Vec<Value> = host_ids
        .iter()
        .map(|id| json!({ "host": { "id": id }, "accessMask": 1 }))
        .collect();
    json!({ "lunParameters": { "hostAccess": entries } })
}

#[rstest]
#[tokio::test]
async fn missing_resources_resolve_to_none(seeded: FakeUnisphere) {
    let harness = start(seeded).await;
    let client = &harness.client;
    let missing_lun = client
        .lun_by_id("sv_404")
        .await
        .unwrap_or_else(|err| panic!("lun lookup: {err}"));
    let missing_host = client
        .host_by_id("Host_9")
        .await
        .unwrap_or_else(|err| panic!("host lookup: {err}"));
    let unknown_name = client
        .host_by_name("node-z")
        .await
        .unwrap_or_else(|err| panic!("host name lookup: {err}"));
    assert!(missing_lun.is_none());
    assert!(missing_host.is_none());
    assert!(unknown_name.is_none());
}

#[rstest]
#[tokio::test]
async fn host_lookups_decode_array_hosts(seeded: FakeUnisphere) {
    let harness = start(seeded).await;
    let by_id = harness
        .client
        .host_by_id("Host_3")
        .await
        .unwrap_or_else(|err| panic!("host lookup: {err}"));
    let by_name = harness
        .client
        .host_by_name("node-b")
        .await
        .unwrap_or_else(|err| panic!("host name lookup: {err}"));
    assert_eq!(by_id, Some(host("Host_3", "node-c")));
    assert_eq!(by_name, Some(host("Host_2", "node-b")));
}

#[rstest]
#[tokio::test]
async fn lun_lookup_reads_host_access(seeded: FakeUnisphere) {
    let harness = start(seeded).await;
    let found = lun(&harness.client, "sv_1").await;
    let associations = harness
        .client
        .host_associations(&found)
        .await
        .unwrap_or_else(|err| panic!("associations: {err}"));
    assert_eq!(found.size_total, 10 << 30);
    assert_eq!(
        associations
            .iter()
            .map(|access| access.host.id.as_str())
            .collect::<Vec<_>>(),
        vec!["Host_2"]
    );
}

#[rstest]
#[tokio::test]
async fn login_token_is_presented_on_mutations(seeded: FakeUnisphere) {
    let harness = logged_in(seeded).await;
    let target = lun(&harness.client, "sv_2").await;
    harness
        .client
        .attach_host(&target, &host("Host_1", "node-a"))
        .await
        .unwrap_or_else(|err| panic!("attach: {err}"));
    assert_eq!(
        harness.fake.mutation_tokens(),
        vec![Some(String::from(CSRF_TOKEN))]
    );
}

#[rstest]
#[tokio::test]
async fn mutation_without_session_keeps_array_message(seeded: FakeUnisphere) {
    let harness = start(seeded).await;
    let target = lun(&harness.client, "sv_1").await;
    let Err(err) = harness.client.detach_all_hosts(&target).await else {
        panic!("mutation without a CSRF token must be refused");
    };
    let UnityApiError::Api {
        status,
        code,
        ref message,
    } = err
    else {
        panic!("expected an API error, got {err}");
    };
    assert_eq!(status, 401);
    assert_eq!(code, Some(131_149_861));
    assert_eq!(message, "Missing or invalid CSRF token.");
    assert_eq!(harness.fake.mutation_tokens(), vec![None]);
    assert_eq!(harness.fake.hosts_of("sv_1"), vec![String::from("Host_2")]);
}

#[rstest]
#[tokio::test]
async fn host_access_changes_send_full_lists(seeded: FakeUnisphere) {
    let harness = logged_in(seeded).await;
    let client = &harness.client;

    let target = lun(client, "sv_1").await;
    client
        .attach_host(&target, &host("Host_1", "node-a"))
        .await
        .unwrap_or_else(|err| panic!("attach: {err}"));
    client
        .detach_host(&target, &host("Host_2", "node-b"))
        .await
        .unwrap_or_else(|err| panic!("detach: {err}"));
    client
        .replace_host_access(&target, &host("Host_3", "node-c"))
        .await
        .unwrap_or_else(|err| panic!("replace: {err}"));
    client
        .detach_all_hosts(&target)
        .await
        .unwrap_or_else(|err| panic!("detach all: {err}"));

    let expected: Vec<(String, Value)> = [
        host_access_body(&["Host_2", "Host_1"]),
        host_access_body(&["Host_1"]),
        host_access_body(&["Host_3"]),
        host_access_body(&[]),
    ]
    .into_iter()
    .map(|body| (String::from("sv_1"), body))
    .collect();
    assert_eq!(harness.fake.modify_bodies(), expected);
    assert!(harness.fake.hosts_of("sv_1").is_empty());
}

#[rstest]
#[tokio::test]
async fn attach_of_present_host_sends_nothing(seeded: FakeUnisphere) {
    let harness = logged_in(seeded).await;
    let target = lun(&harness.client, "sv_1").await;
    harness
        .client
        .attach_host(&target, &host("Host_2", "node-b"))
        .await
        .unwrap_or_else(|err| panic!("attach: {err}"));
    assert!(harness.fake.modify_bodies().is_empty());
}

#[rstest]
#[tokio::test]
async fn detach_reads_hosts_from_array(seeded: FakeUnisphere) {
    let harness = logged_in(seeded).await;
    let stale = lun(&harness.client, "sv_2").await;
    harness.fake.lock().luns.insert(
        String::from("sv_2"),
        vec![String::from("Host_1"), String::from("Host_3")],
    );
    harness
        .client
        .detach_host(&stale, &host("Host_1", "node-a"))
        .await
        .unwrap_or_else(|err| panic!("detach: {err}"));
    assert_eq!(harness.fake.hosts_of("sv_2"), vec![String::from("Host_3")]);
}

#[rstest]
#[tokio::test]
async fn delete_refusal_keeps_array_message(seeded: FakeUnisphere) {
    let harness = logged_in(seeded).await;
    let target = lun(&harness.client, "sv_1").await;
    let Err(err) = harness.client.delete_lun(&target).await else {
        panic!("deleting an attached LUN must be refused");
    };
    assert!(err.to_string().contains(IN_USE_MESSAGE), "message: {err}");
    assert!(
        matches!(err, UnityApiError::Api { status: 409, code: Some(108_007_744), .. }),
        "unexpected error: {err:?}"
    );

    let detached = lun(&harness.client, "sv_2").await;
    harness
        .client
        .delete_lun(&detached)
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    let gone = harness
        .client
        .lun_by_id("sv_2")
        .await
        .unwrap_or_else(|err| panic!("lookup after delete: {err}"));
    assert!(gone.is_none());
}
