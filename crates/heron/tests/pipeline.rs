//! Request pipeline tests.
//!
//! Each test builds a controller and dispatches in-memory requests:
//!
//! 1. Components - extraction and combined validation
//! 2. Handlers - raw values and native responses
//! 3. Errors - auth, error handler chain, response contract breaks

use heron::extract::SyncAuth;
use heron::prelude::*;
use http::StatusCode;
use serde_json::{json, Value};

fn user() -> Schema {
    Schema::object("UserCreateModel")
        .field("email", Schema::string())
        .field("age", Schema::integer())
        .into()
}

fn json_request(method: &str, body: &str) -> Request {
    Request::builder()
        .method(method)
        .uri("/users")
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .build()
        .unwrap()
}

fn body_of(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

async fn echo_body(ctx: EndpointContext) -> HeronResult<Value> {
    ctx.body()
}

fn user_controller() -> Controller {
    Controller::builder("UserController")
        .body(user())
        .endpoint("post", ModifyPayload::new(user()), echo_body)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_user_echoes_model() {
    let response = user_controller()
        .dispatch(json_request("POST", r#"{"email":"a@b.com","age":1}"#))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.content_type(), Some("application/json"));
    assert_eq!(body_of(&response), json!({"email": "a@b.com", "age": 1}));
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let request = Request::builder()
        .method("POST")
        .header("Content-Type", "application/xml")
        .body("<user/>")
        .build()
        .unwrap();
    let response = user_controller().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_of(&response),
        json!({"detail": [{
            "msg": "Cannot parse request body with content type 'application/xml', expected=['application/json']",
            "type": "value_error",
        }]})
    );
}

#[tokio::test]
async fn test_invalid_body_is_located() {
    let response = user_controller()
        .dispatch(json_request("POST", r#"{"email":"a@b.com"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_of(&response),
        json!({"detail": [{"msg": "Field required", "loc": ["parsed_body", "age"], "type": "missing"}]})
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let response = user_controller().dispatch(json_request("POST", "{")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn search_controller(force_list: bool) -> Controller {
    let search = Schema::object("Search");
    let search = if force_list {
        search
            .field("query", Schema::array(Schema::string()))
            .force_list(["query"])
    } else {
        search.field("query", Schema::string())
    };
    Controller::builder("SearchController")
        .query(search)
        .endpoint("get", ModifyPayload::new(Schema::any()), |ctx| async move {
            Ok::<_, HeronError>(ctx.parsed().get("parsed_query").cloned().unwrap_or_default())
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_query_force_list() {
    let request = || {
        Request::builder()
            .uri("/search?query=a&query=b")
            .build()
            .unwrap()
    };

    let response = search_controller(true).dispatch(request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(&response), json!({"query": ["a", "b"]}));

    let response = search_controller(false).dispatch(request()).await;
    assert_eq!(body_of(&response), json!({"query": "b"}));
}

#[tokio::test]
async fn test_undeclared_status_code_is_contract_break() {
    let controller = Controller::builder("ConflictController")
        .endpoint(
            "get",
            ValidatePayload::new([ResponseSpec::new(user(), StatusCode::OK)]),
            |_ctx| async {
                Response::json(StatusCode::CONFLICT, &json!({"email": "a@b.com", "age": 1}))
            },
        )
        .build()
        .unwrap();

    let response = controller.dispatch(Request::builder().build().unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let msg = body_of(&response)["detail"][0]["msg"].as_str().unwrap().to_string();
    assert_eq!(
        msg,
        "Returned status code 409 is not specified in the list of allowed status codes: [200, 422, 406]"
    );
}

#[tokio::test]
async fn test_response_validation_can_be_disabled() {
    let controller = Controller::builder("ConflictController")
        .validate_responses(false)
        .endpoint(
            "get",
            ValidatePayload::new([ResponseSpec::new(user(), StatusCode::OK)]),
            |_ctx| async { Ok::<_, HeronError>(Response::new(StatusCode::CONFLICT)) },
        )
        .build()
        .unwrap();

    let response = controller.dispatch(Request::builder().build().unwrap()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_native_no_content_response_passes_validation() {
    let controller = Controller::builder("SessionController")
        .endpoint(
            "delete",
            ValidatePayload::new([ResponseSpec::new(Schema::null(), StatusCode::NO_CONTENT)]),
            |_ctx| async { Ok::<_, HeronError>(Response::new(StatusCode::NO_CONTENT)) },
        )
        .build()
        .unwrap();

    let response = controller
        .dispatch(Request::builder().method("DELETE").build().unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_raw_value_must_match_return_type() {
    let controller = Controller::builder("UserController")
        .endpoint("get", ModifyPayload::new(user()), |_ctx| async {
            Ok::<_, HeronError>(json!({"email": "a@b.com", "age": "one"}))
        })
        .build()
        .unwrap();

    let response = controller.dispatch(Request::builder().build().unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = &body_of(&response)["detail"][0];
    assert_eq!(detail["loc"], json!(["age"]));
}

#[tokio::test]
async fn test_modification_headers_and_cookies() {
    let payload = ModifyPayload::new(Schema::null())
        .status_code(StatusCode::NO_CONTENT)
        .header("X-Deleted-By", NewHeader::new("heron"))
        .cookie("session", NewCookie::new("gone"));
    let controller = Controller::builder("SessionController")
        .endpoint("delete", payload, |_ctx| async { Ok::<_, HeronError>(Value::Null) })
        .build()
        .unwrap();

    let response = controller
        .dispatch(Request::builder().method("DELETE").build().unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.body().is_empty());
    assert_eq!(response.headers()["x-deleted-by"], "heron");
    assert_eq!(response.cookies()["session"].value, "gone");
}

#[tokio::test]
async fn test_conditional_body_by_content_type() {
    let by_email: Schema = Schema::object("ByEmail").field("email", Schema::string()).into();
    let by_age: Schema = Schema::object("ByAge").field("age", Schema::integer()).into();
    let conditional = Schema::conditional([
        ("application/json", by_email),
        ("application/x-www-form-urlencoded", by_age),
    ])
    .unwrap();
    let controller = Controller::builder("LookupController")
        .body(conditional)
        .form_parsers()
        .endpoint("post", ModifyPayload::new(Schema::any()), echo_body)
        .build()
        .unwrap();

    let response = controller
        .dispatch(json_request("POST", r#"{"email":"a@b.com"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_of(&response), json!({"email": "a@b.com"}));

    let form = |body: &str| {
        Request::builder()
            .method("POST")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .build()
            .unwrap()
    };
    let response = controller.dispatch(form("age=3")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_of(&response), json!({"age": 3}));

    let response = controller.dispatch(form("email=a%40b.com")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(&response)["detail"][0]["loc"], json!(["parsed_body", "age"]));
}

#[tokio::test]
async fn test_multipart_files_and_fields() {
    const BOUNDARY: &str = "X-HERON-BOUNDARY";
    let body = [
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nReceipt\r\n"),
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"r.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n"
        ),
        format!("--{BOUNDARY}--\r\n"),
    ]
    .concat();
    let file: Schema = Schema::object("File")
        .field("filename", Schema::string())
        .field("size", Schema::integer().maximum_int(1024))
        .into();
    let controller = Controller::builder("UploadController")
        .body(Schema::object("Upload").field("title", Schema::string()))
        .file_metadata(Schema::object("Files").field("receipt", file))
        .form_parsers()
        .endpoint("post", ModifyPayload::new(Schema::any()), |ctx| async move {
            let files = ctx.parsed().get("parsed_file_metadata").cloned().unwrap_or_default();
            Ok::<_, HeronError>(json!({"title": ctx.body::<Value>()?["title"], "files": files}))
        })
        .build()
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .header("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(body)
        .build()
        .unwrap();
    let response = controller.dispatch(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_of(&response),
        json!({"title": "Receipt", "files": {"receipt": {"filename": "r.txt", "size": 5}}})
    );
}

#[test]
fn test_file_metadata_needs_file_parser() {
    let err = Controller::builder("UploadController")
        .file_metadata(Schema::any())
        .endpoint("post", ModifyPayload::new(Schema::any()), echo_body)
        .build()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Component FileMetadata requires at least one parser that can parse files, found: ['application/json']"
    );
}

#[test]
fn test_get_with_body_is_rejected() {
    let err = Controller::builder("UserController")
        .body(user())
        .endpoint("get", ModifyPayload::new(user()), echo_body)
        .build()
        .unwrap_err();
    assert!(err.to_string().starts_with("HTTP method 'GET' cannot have a request body"));

    let allowed = Controller::builder("UserController")
        .body(user())
        .no_validate_http_spec(HttpSpec::EmptyRequestBody)
        .endpoint("get", ModifyPayload::new(user()), echo_body)
        .build();
    assert!(allowed.is_ok());
}

#[derive(Debug)]
struct TokenAuth;

impl SyncAuth for TokenAuth {
    fn authenticate(&self, request: &Request) -> HeronResult<Option<Value>> {
        Ok(request.header("X-Token").map(|token| json!({"token": token})))
    }
}

fn whoami_controller() -> Controller {
    Controller::builder("WhoAmIController")
        .auth(AuthProvider::sync(TokenAuth))
        .endpoint("get", ModifyPayload::new(Schema::any()), |ctx| async move {
            Ok::<_, HeronError>(ctx.identity().cloned().unwrap_or_default())
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_auth_identity_reaches_handler() {
    let controller = whoami_controller();
    let metadata = controller.endpoint("get").unwrap().metadata();
    assert!(metadata.responses.contains_key(&StatusCode::UNAUTHORIZED));

    let request = Request::builder().header("X-Token", "t0k3n").build().unwrap();
    let response = controller.dispatch(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(&response), json!({"token": "t0k3n"}));
}

#[tokio::test]
async fn test_auth_declined() {
    let response = whoami_controller()
        .dispatch(Request::builder().build().unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_of(&response),
        json!({"detail": [{"msg": "Not authenticated", "type": "security"}]})
    );
}

#[tokio::test]
async fn test_endpoint_can_disable_auth() {
    let options = EndpointOptions::default().no_auth();
    let controller = Controller::builder("PublicController")
        .auth(AuthProvider::sync(TokenAuth))
        .endpoint(
            "get",
            ModifyPayload::new(Schema::any()).options(options),
            |ctx| async move { Ok::<_, HeronError>(json!(ctx.identity().is_none())) },
        )
        .build()
        .unwrap();
    assert!(controller.endpoint("get").unwrap().metadata().auth.is_none());

    let response = controller.dispatch(Request::builder().build().unwrap()).await;
    assert_eq!(body_of(&response), json!(true));
}

#[tokio::test]
async fn test_api_error_payload() {
    let controller = Controller::builder("UserController")
        .endpoint("get", ModifyPayload::new(user()), |_ctx| async {
            Err::<Value, HeronError>(
                ApiError::new(json!({"code": "taken"}), StatusCode::CONFLICT).into(),
            )
        })
        .build()
        .unwrap();
    let response = controller.dispatch(Request::builder().build().unwrap()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_of(&response), json!({"code": "taken"}));
}

#[tokio::test]
async fn test_error_handler_chain() {
    // The endpoint handler only knows about conflicts.
    let endpoint_handler = |_request: &Request, error: HeronError| -> HeronResult<Response> {
        match error {
            HeronError::Api { status, .. } if status == StatusCode::CONFLICT => {
                Ok(Response::new(StatusCode::SEE_OTHER).try_header("Location", "/users/1")?)
            }
            other => Err(other),
        }
    };
    let controller_handler = |_request: &Request, error: HeronError| -> HeronResult<Response> {
        match error {
            HeronError::Validation { detail, .. } => {
                Response::json(StatusCode::UNPROCESSABLE_ENTITY, &json!({"errors": detail.len()}))
            }
            other => Err(other),
        }
    };
    let options = EndpointOptions::default().error_handler(endpoint_handler);
    let controller = Controller::builder("UserController")
        .body(user())
        .error_handler(controller_handler)
        .endpoint(
            "post",
            ModifyPayload::new(user()).options(options),
            |ctx| async move {
                let user: Value = ctx.body()?;
                if user["email"] == "taken@b.com" {
                    return Err(HeronError::from(ApiError::new(Value::Null, StatusCode::CONFLICT)));
                }
                if user["age"] == 0 {
                    let payload = json!({"too": "young"});
                    return Err(HeronError::from(ApiError::new(payload, StatusCode::FORBIDDEN)));
                }
                Ok::<_, HeronError>(user)
            },
        )
        .build()
        .unwrap();

    let response = controller
        .dispatch(json_request("POST", r#"{"email":"taken@b.com","age":1}"#))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/users/1");

    let response = controller.dispatch(json_request("POST", "{}")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_of(&response), json!({"errors": 2}));

    let response = controller
        .dispatch(json_request("POST", r#"{"email":"a@b.com","age":0}"#))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_of(&response), json!({"too": "young"}));
}

#[test]
fn test_duplicate_operation_ids() {
    let get = ModifyPayload::new(Schema::any())
        .options(EndpointOptions::default().operation_id("users"));
    let put = ModifyPayload::new(Schema::any())
        .options(EndpointOptions::default().operation_id("users"));
    let err = Controller::builder("UserController")
        .endpoint("get", get, echo_body)
        .endpoint("put", put, echo_body)
        .build()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Controller UserController has duplicate operation_id ['users']"
    );
}

#[test]
fn test_invalid_pattern_fails_build() {
    let err = Controller::builder("CodeController")
        .body(Schema::object("Code").field("code", Schema::string().pattern("([a-z")))
        .endpoint("post", ModifyPayload::new(Schema::any()), echo_body)
        .build()
        .unwrap_err();
    assert!(matches!(err, HeronError::EndpointMetadata { .. }));
    assert!(err.to_string().starts_with("Invalid pattern '([a-z'"));
}

#[tokio::test]
async fn test_meta_lists_allowed_methods() {
    let controller = Controller::builder("UserController")
        .meta()
        .endpoint("put", ModifyPayload::new(Schema::any()), |_ctx| async {
            Ok::<_, HeronError>(json!(1))
        })
        .endpoint("post", ModifyPayload::new(Schema::any()), |_ctx| async {
            Ok::<_, HeronError>(json!(2))
        })
        .build()
        .unwrap();
    assert_eq!(controller.allowed_methods(), ["PUT", "POST", "OPTIONS"]);
    let responses = &controller.endpoint("options").unwrap().metadata().responses;
    assert!(responses[&StatusCode::NO_CONTENT].headers.as_ref().unwrap().contains_key("Allow"));

    let response = controller
        .dispatch(Request::builder().method("OPTIONS").build().unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["allow"], "OPTIONS, POST, PUT");
    assert!(response.body().is_empty());
}

#[test]
fn test_meta_conflicts_with_options_endpoint() {
    let err = Controller::builder("UserController")
        .meta()
        .endpoint(
            "options",
            ValidatePayload::new([ResponseSpec::new(Schema::null(), StatusCode::NO_CONTENT)]),
            |_ctx| async { Ok::<_, HeronError>(Response::new(StatusCode::NO_CONTENT)) },
        )
        .build()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Controller UserController has more than one endpoint for method OPTIONS"
    );
}
