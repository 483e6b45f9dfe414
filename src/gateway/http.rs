use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use serde::Deserialize;

use super::envelope::{decode_body, decode_data, decode_required, error_message};
use super::{GatewayError, RequestGateway};
use crate::auth::{AuthApi, SignInForm, SignInGrant};
use crate::config::ClientConfig;
use crate::models::{AuthUser, LabTestRequest, ResultEntry};
use crate::session::Session;
use crate::worklist::WorklistSource;

const LAB_STAFF: &str = "api/v1/lab-staff";
const AUTH: &str = "api/v1/auth";

/// Lab API client over blocking HTTP.
///
/// The bearer credential is read from the injected `Session` on every call.
/// A session without a credential fails with `Unauthorized` before any
/// request is sent.
pub struct HttpGateway {
    base_url: Url,
    client: Client,
    session: Arc<Session>,
}

/// Response body from POST /api/v1/auth/signin
#[derive(Deserialize)]
struct SignInResponse {
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid API URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Transport(format!(
                "invalid API URL: {}",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Base URL plus percent-encoded path segments.
    fn url(&self, prefix: &str, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(prefix.split('/'));
            path.extend(segments);
        }
        url
    }

    fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, GatewayError> {
        let bearer = self.session.bearer().ok_or_else(|| {
            tracing::warn!(url = %url, "No credential in session, request not sent");
            GatewayError::Unauthorized
        })?;
        Ok(self.client.request(method, url).header(AUTHORIZATION, bearer))
    }

    fn execute(&self, builder: RequestBuilder) -> Result<(u16, String), GatewayError> {
        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                GatewayError::Transport(format!("cannot reach {}", self.base_url))
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if status == 401 || status == 403 {
            tracing::warn!(status, "Lab API rejected credential");
        }
        Ok((status, body))
    }

    /// PUT a mutation and return the updated record.
    ///
    /// When the server acknowledges without a record, the record is fetched.
    fn mutate(
        &self,
        id: &str,
        action: &str,
        entry: Option<&ResultEntry>,
    ) -> Result<LabTestRequest, GatewayError> {
        let mut builder = self.authorized(Method::PUT, self.url(LAB_STAFF, &[id, action]))?;
        if let Some(entry) = entry {
            builder = builder.json(entry);
        }
        let (status, body) = self.execute(builder)?;
        match decode_data::<LabTestRequest>(status, &body)? {
            Some(record) => Ok(record),
            None => {
                tracing::debug!(request_id = id, action, "Mutation returned no record, refetching");
                self.fetch_request(id).map_err(|err| {
                    tracing::warn!(request_id = id, action, error = %err, "Mutation applied but reload failed");
                    GatewayError::ReloadFailed(err.to_string())
                })
            }
        }
    }

    fn get_list(&self, segments: &[&str]) -> Result<Vec<LabTestRequest>, GatewayError> {
        let builder = self.authorized(Method::GET, self.url(LAB_STAFF, segments))?;
        let (status, body) = self.execute(builder)?;
        Ok(decode_data(status, &body)?.unwrap_or_default())
    }
}

impl RequestGateway for HttpGateway {
    fn fetch_request(&self, id: &str) -> Result<LabTestRequest, GatewayError> {
        let builder = self.authorized(Method::GET, self.url(LAB_STAFF, &["sending-lab", id]))?;
        let (status, body) = self.execute(builder)?;
        decode_required(status, &body)
    }

    fn submit_result(&self, id: &str, entry: &ResultEntry) -> Result<LabTestRequest, GatewayError> {
        self.mutate(id, "result", Some(entry))
    }

    fn request_ai_suggestion(
        &self,
        id: &str,
        entry: &ResultEntry,
    ) -> Result<LabTestRequest, GatewayError> {
        self.mutate(id, "ai-suggestion", Some(entry))
    }

    fn finalize_request(&self, id: &str) -> Result<LabTestRequest, GatewayError> {
        self.mutate(id, "complete", None)
    }
}

impl WorklistSource for HttpGateway {
    fn list_sending_lab(&self) -> Result<Vec<LabTestRequest>, GatewayError> {
        self.get_list(&["sending-lab"])
    }

    fn list_completed(&self) -> Result<Vec<LabTestRequest>, GatewayError> {
        self.get_list(&["complete"])
    }
}

impl AuthApi for HttpGateway {
    fn sign_in(&self, form: &SignInForm) -> Result<SignInGrant, GatewayError> {
        let builder = self
            .client
            .post(self.url(AUTH, &["signin"]))
            .json(form);
        let (status, body) = self.execute(builder)?;
        // A refused sign-in is a credential problem, not an expired session.
        if !(200..300).contains(&status) {
            return Err(GatewayError::Server {
                status,
                message: error_message(status, &body),
            });
        }
        let parsed: SignInResponse = decode_body(status, &body)?;

        if !parsed.success {
            return Err(GatewayError::Server {
                status,
                message: parsed.error.unwrap_or_else(|| "Sign in failed".to_string()),
            });
        }
        match (parsed.token, parsed.user) {
            (Some(token), Some(user)) if !token.trim().is_empty() => Ok(SignInGrant { token, user }),
            _ => Err(GatewayError::Decode(
                "sign-in response missing token or user".to_string(),
            )),
        }
    }

    fn profile(&self) -> Result<AuthUser, GatewayError> {
        let builder = self.authorized(Method::GET, self.url(AUTH, &["profile"]))?;
        let (status, body) = self.execute(builder)?;
        decode_required(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::models::{RequestStatus, UserRole};

    /// Serve `router` on a loopback port from a background runtime.
    fn spawn_server(router: Router) -> String {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });
        format!("http://{}", rx.recv().unwrap())
    }

    fn record_json(id: &str) -> Value {
        json!({
            "id": id,
            "requestId": "R-1001",
            "priority": "URGENT",
            "status": "SENDING_LAB",
            "resultValue": null,
            "aiSuggestion": null,
            "pdfLink": null
        })
    }

    fn is_authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer tok")
    }

    fn gateway(base: &str, token: Option<&str>) -> HttpGateway {
        let session = match token {
            Some(t) => Session::with_token(t),
            None => Session::new(),
        };
        HttpGateway::new(&ClientConfig::new(base), Arc::new(session)).unwrap()
    }

    fn entry() -> ResultEntry {
        ResultEntry {
            result_value: "5.4".into(),
            result_unit: "mg/dL".into(),
            reference_range: "3.5-5.5".into(),
            remarks: "Normal".into(),
        }
    }

    #[test]
    fn fetch_attaches_bearer_and_decodes() {
        let router = Router::new().route(
            "/api/v1/lab-staff/sending-lab/:id",
            get(|headers: HeaderMap, Path(id): Path<String>| async move {
                if !is_authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
                }
                (
                    StatusCode::OK,
                    Json(json!({"success": true, "statusCode": 200, "data": record_json(&id)})),
                )
            }),
        );
        let base = spawn_server(router);

        let record = gateway(&base, Some("tok")).fetch_request("abc").unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.status, RequestStatus::SendingLab);

        let err = gateway(&base, Some("stale")).fetch_request("abc").unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
    }

    #[test]
    fn missing_credential_sends_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/v1/lab-staff/sending-lab/:id",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }
            }),
        );
        let base = spawn_server(router);

        let err = gateway(&base, None).fetch_request("abc").unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn submit_result_puts_entry_and_returns_record() {
        let router = Router::new().route(
            "/api/v1/lab-staff/:id/result",
            put(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                let mut record = record_json(&id);
                for key in ["resultValue", "resultUnit", "referenceRange", "remarks"] {
                    record[key] = body[key].clone();
                }
                Json(json!({"success": true, "statusCode": 200, "data": record}))
            }),
        );
        let base = spawn_server(router);

        let record = gateway(&base, Some("tok")).submit_result("abc", &entry()).unwrap();
        assert_eq!(record.result_entry().unwrap(), entry());
    }

    #[test]
    fn mutation_without_data_refetches() {
        let router = Router::new()
            .route(
                "/api/v1/lab-staff/:id/complete",
                put(|| async { Json(json!({"success": true, "statusCode": 200})) }),
            )
            .route(
                "/api/v1/lab-staff/sending-lab/:id",
                get(|Path(id): Path<String>| async move {
                    let mut record = record_json(&id);
                    record["pdfLink"] = json!("https://files.example/report.pdf");
                    record["status"] = json!("COMPLETED");
                    Json(json!({"success": true, "statusCode": 200, "data": record}))
                }),
            );
        let base = spawn_server(router);

        let record = gateway(&base, Some("tok")).finalize_request("abc").unwrap();
        assert_eq!(record.pdf_link(), Some("https://files.example/report.pdf"));
        assert_eq!(record.status, RequestStatus::Complete);
    }

    #[test]
    fn failed_reload_after_mutation_is_distinct() {
        let router = Router::new()
            .route(
                "/api/v1/lab-staff/:id/result",
                put(|| async { Json(json!({"success": true, "statusCode": 200})) }),
            )
            .route(
                "/api/v1/lab-staff/sending-lab/:id",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": "database busy"})),
                    )
                }),
            );
        let base = spawn_server(router);

        let err = gateway(&base, Some("tok"))
            .submit_result("abc", &entry())
            .unwrap_err();
        match err {
            GatewayError::ReloadFailed(reason) => assert!(reason.contains("database busy")),
            other => panic!("expected reload failure, got {other:?}"),
        }
    }

    #[test]
    fn not_found_and_server_errors_map() {
        let router = Router::new()
            .route(
                "/api/v1/lab-staff/sending-lab/:id",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"error": "Lab test request not found"})),
                    )
                }),
            )
            .route(
                "/api/v1/lab-staff/:id/ai-suggestion",
                put(|| async {
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(json!({"error": "AI provider unavailable"})),
                    )
                }),
            );
        let base = spawn_server(router);
        let gw = gateway(&base, Some("tok"));

        assert_eq!(
            gw.fetch_request("missing").unwrap_err(),
            GatewayError::NotFound("Lab test request not found".into())
        );
        assert_eq!(
            gw.request_ai_suggestion("abc", &entry()).unwrap_err(),
            GatewayError::Server {
                status: 502,
                message: "AI provider unavailable".into()
            }
        );
    }

    #[test]
    fn ids_are_path_encoded() {
        let router = Router::new().route(
            "/api/v1/lab-staff/sending-lab/:id",
            get(|Path(id): Path<String>| async move {
                Json(json!({"success": true, "data": record_json(&id)}))
            }),
        );
        let base = spawn_server(router);

        let record = gateway(&base, Some("tok")).fetch_request("a/b c").unwrap();
        assert_eq!(record.id, "a/b c");
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = gateway(&format!("http://{addr}"), Some("tok"))
            .fetch_request("abc")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(err.user_message(), "Service Unavailable");
    }

    #[test]
    fn lists_decode_worklists() {
        let router = Router::new()
            .route(
                "/api/v1/lab-staff/sending-lab",
                get(|| async {
                    Json(json!({"success": true, "data": [record_json("a"), record_json("b")]}))
                }),
            )
            .route(
                "/api/v1/lab-staff/complete",
                get(|| async { Json(json!({"success": true, "data": []})) }),
            );
        let base = spawn_server(router);
        let gw = gateway(&base, Some("tok"));

        assert_eq!(gw.list_sending_lab().unwrap().len(), 2);
        assert!(gw.list_completed().unwrap().is_empty());
    }

    #[test]
    fn sign_in_and_profile() {
        let router = Router::new()
            .route(
                "/api/v1/auth/signin",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] != "secret" {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"error": "Invalid credentials"})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "success": true,
                            "token": "tok",
                            "user": {"id": "u1", "name": "Lab", "email": body["email"], "user_role": "LabStaff"}
                        })),
                    )
                }),
            )
            .route(
                "/api/v1/auth/profile",
                get(|headers: HeaderMap| async move {
                    if !is_authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({"success": true, "data": {"id": "u1", "name": "Lab", "email": "lab@example.org", "user_role": "LabStaff"}})),
                    )
                }),
            );
        let base = spawn_server(router);
        let gw = gateway(&base, None);

        let grant = gw
            .sign_in(&SignInForm::new("lab@example.org", "secret"))
            .unwrap();
        assert_eq!(grant.token, "tok");
        assert_eq!(grant.user.user_role, UserRole::LabStaff);

        assert_eq!(
            gw.sign_in(&SignInForm::new("lab@example.org", "wrong")).unwrap_err(),
            GatewayError::Server {
                status: 401,
                message: "Invalid credentials".into()
            }
        );

        gw.session().set_token(&grant.token);
        assert_eq!(gw.profile().unwrap().email, "lab@example.org");
    }

    #[test]
    fn refused_sign_in_shows_server_text() {
        let router = Router::new().route(
            "/api/v1/auth/signin",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Invalid email or password"})),
                )
            }),
        );
        let base = spawn_server(router);
        let gw = gateway(&base, None);
        let dir = tempfile::tempdir().unwrap();
        let store = crate::session::SessionStore::new(dir.path().join("credential"));
        let notices = crate::notify::NoticeBoard::new();

        let result = crate::auth::sign_in(
            &gw,
            gw.session(),
            &store,
            &notices,
            &SignInForm::new("lab@example.org", "wrong"),
        );
        assert!(result.is_err());
        assert_eq!(notices.errors()[0].message, "Invalid email or password");
        assert!(!gw.session().has_credential());
    }

    #[test]
    fn rejects_non_base_url() {
        let result = HttpGateway::new(
            &ClientConfig::new("mailto:lab@example.org"),
            Arc::new(Session::new()),
        );
        assert!(result.is_err());
    }
}
