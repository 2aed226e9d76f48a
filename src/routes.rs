use std::sync::Arc;

use crate::{
    http::{HttpError, HttpRequest, HttpResponse, StatusCode},
    resolutions::{
        ApiErrorBody, ApiErrorKind, ResolutionError, ResolutionHandler, ResolutionId,
        ResolutionPayload, ResolutionStore,
        error::{RESOLUTION_NOT_FOUND, VALIDATION_FAILED},
    },
};

const COLLECTION_PATH: &str = "/resolutions";
const COLLECTION_METHODS: &str = "GET, POST";
const ITEM_METHODS: &str = "GET, PUT, DELETE";

enum Route<'a> {
    Collection,
    Item(&'a str),
}

fn match_route(path: &str) -> Option<Route<'_>> {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    if path == COLLECTION_PATH {
        return Some(Route::Collection);
    }

    let raw_id = path.strip_prefix(COLLECTION_PATH)?.strip_prefix('/')?;
    if raw_id.is_empty() || raw_id.contains('/') {
        return None;
    }
    Some(Route::Item(raw_id))
}

/// Maps HTTP requests onto resolution operations.
#[derive(Debug, Clone)]
pub struct Router {
    handler: ResolutionHandler,
}

impl Router {
    pub fn new(store: Arc<ResolutionStore>) -> Self {
        Self {
            handler: ResolutionHandler::new(store),
        }
    }

    pub fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        match match_route(&request.path) {
            Some(Route::Collection) => match request.method.as_str() {
                "GET" => self.list(request),
                "POST" => self.create(request),
                other => method_not_allowed(other, COLLECTION_METHODS),
            },
            Some(Route::Item(raw_id)) => {
                if !matches!(request.method.as_str(), "GET" | "PUT" | "DELETE") {
                    return method_not_allowed(&request.method, ITEM_METHODS);
                }
                let Ok(id) = raw_id.parse::<ResolutionId>() else {
                    return bad_request("id must be an integer");
                };
                match request.method.as_str() {
                    "GET" => self.get(id),
                    "PUT" => self.replace(id, request),
                    _ => self.delete(id),
                }
            }
            None => HttpResponse::json(
                StatusCode::NotFound,
                &ApiErrorBody::not_found("Route not found.", [format!("path: {}", request.path)]),
            ),
        }
    }

    fn list(&self, request: &HttpRequest) -> HttpResponse {
        let is_done = request.query_param("isDone");
        let title = request.query_param("title");
        match self.handler.list(is_done.as_deref(), title.as_deref()) {
            Ok(list) => HttpResponse::json(StatusCode::Ok, &list),
            Err(err) => error_response(&err),
        }
    }

    fn get(&self, id: ResolutionId) -> HttpResponse {
        match self.handler.get(id) {
            Ok(detail) => HttpResponse::json(StatusCode::Ok, &detail),
            Err(err) => error_response(&err),
        }
    }

    fn create(&self, request: &HttpRequest) -> HttpResponse {
        let payload = match parse_payload(&request.body) {
            Ok(payload) => payload,
            Err(response) => return response,
        };
        match self.handler.create(payload) {
            Ok(created) => {
                let location = match request.header("host").filter(|host| is_plain_host(host)) {
                    Some(host) => format!("http://{host}{COLLECTION_PATH}/{}", created.id),
                    None => format!("{COLLECTION_PATH}/{}", created.id),
                };
                HttpResponse::json(StatusCode::Created, &created).with_header("Location", location)
            }
            Err(err) => error_response(&err),
        }
    }

    fn replace(&self, id: ResolutionId, request: &HttpRequest) -> HttpResponse {
        let payload = match parse_payload(&request.body) {
            Ok(payload) => payload,
            Err(response) => return response,
        };
        match self.handler.replace(id, payload) {
            Ok(updated) => HttpResponse::json(StatusCode::Ok, &updated),
            Err(err) => error_response(&err),
        }
    }

    fn delete(&self, id: ResolutionId) -> HttpResponse {
        match self.handler.delete(id) {
            Ok(()) => HttpResponse::no_content(),
            Err(err) => error_response(&err),
        }
    }
}

/// Host values that are safe to echo into `Location`.
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host.bytes().all(|byte| {
            byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b':' | b'[' | b']' | b'_')
        })
}

/// Empty bodies and a JSON `null` are both an absent payload.
fn parse_payload(body: &[u8]) -> Result<Option<ResolutionPayload>, HttpResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<ResolutionPayload>>(body)
        .map_err(|_| bad_request("request body must be valid JSON"))
}

fn bad_request(detail: &str) -> HttpResponse {
    HttpResponse::json(
        StatusCode::BadRequest,
        &ApiErrorBody::bad_request(VALIDATION_FAILED, [detail]),
    )
}

fn method_not_allowed(method: &str, allow: &'static str) -> HttpResponse {
    HttpResponse::json(
        StatusCode::MethodNotAllowed,
        &ApiErrorBody::new(
            ApiErrorKind::MethodNotAllowed,
            "Method not allowed.",
            [format!("method {method} is not allowed")],
        ),
    )
    .with_header("Allow", allow)
}

pub fn error_response(err: &ResolutionError) -> HttpResponse {
    match err {
        ResolutionError::Validation(detail) => bad_request(detail),
        ResolutionError::NotFound(id) => HttpResponse::json(
            StatusCode::NotFound,
            &ApiErrorBody::not_found(RESOLUTION_NOT_FOUND, [format!("id: {id}")]),
        ),
        // Kept as its own literal body rather than going through ApiErrorBody.
        ResolutionError::IdMismatch { route_id, body_id } => HttpResponse::json(
            StatusCode::BadRequest,
            &serde_json::json!({
                "error": "BadRequest",
                "message": "Route id does not match body id.",
                "details": [
                    format!("route id: {route_id}"),
                    format!("body id: {body_id}"),
                ],
            }),
        ),
        ResolutionError::IdsExhausted => {
            tracing::error!(target: "http", error = %err, "resolution_ids_exhausted");
            HttpResponse::json(
                StatusCode::InternalServerError,
                &ApiErrorBody::internal([err.to_string()]),
            )
        }
    }
}

/// Response for a request that could not be framed. `None` for IO failures,
/// where nothing can be written back.
pub fn framing_error_response(err: &HttpError) -> Option<HttpResponse> {
    let (status, kind, message) = match err {
        HttpError::Malformed(_) => (
            StatusCode::BadRequest,
            ApiErrorKind::BadRequest,
            "Malformed request.",
        ),
        HttpError::HeadTooLarge { .. } => (
            StatusCode::RequestHeaderFieldsTooLarge,
            ApiErrorKind::RequestHeaderFieldsTooLarge,
            "Request header too large.",
        ),
        HttpError::BodyTooLarge { .. } => (
            StatusCode::PayloadTooLarge,
            ApiErrorKind::PayloadTooLarge,
            "Request body too large.",
        ),
        HttpError::UnsupportedTransferEncoding => (
            StatusCode::NotImplemented,
            ApiErrorKind::NotImplemented,
            "Transfer encoding not supported.",
        ),
        HttpError::Io(_) => return None,
    };
    let detail = match err {
        HttpError::Malformed(detail) => detail.clone(),
        other => other.to_string(),
    };
    Some(HttpResponse::json(
        status,
        &ApiErrorBody::new(kind, message, [detail]),
    ))
}

/// Sent to connections accepted while the server is at its connection cap.
pub fn busy_response() -> HttpResponse {
    HttpResponse::json(
        StatusCode::ServiceUnavailable,
        &ApiErrorBody::new(
            ApiErrorKind::ServiceUnavailable,
            "Server busy.",
            ["too many open connections"],
        ),
    )
}
