use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    flash::{self, Notice, Notifications},
    input::{Envelope, Ttl, ValidationError},
    lifecycle::LifecycleError,
    store::SecretStore,
    AppState,
};

const LANDING: &str = "/";
const OOPS: &str = "/oops";

// ── Landing pages ─────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn index(jar: CookieJar) -> Response {
    let (jar, notes) = flash::take(jar);
    (jar, Json(notes)).into_response()
}

pub async fn oops() -> impl IntoResponse {
    Json(json!({"error": "Something went wrong. Please try again."}))
}

/// Shown to browsers that cannot run the client-side encryption.
pub async fn nojs() -> impl IntoResponse {
    Json(json!({
        "error": "JavaScript is required to encrypt and decrypt secrets in your browser."
    }))
}

// ── Create ────────────────────────────────────────────────────────────────────

/// Form posted by the browser after encrypting client-side.
#[derive(Debug, Deserialize)]
pub struct CreateForm {
    #[serde(rename = "encryptedSecret")]
    pub encrypted_secret: Option<String>,
    pub ttl: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub management_id: String,
}

pub async fn create_secret<S: SecretStore>(
    State(state): State<AppState<S>>,
    form: Result<Form<CreateForm>, FormRejection>,
) -> Response {
    let Ok(Form(form)) = form else {
        return bad_request(ValidationError::Form);
    };

    let envelope = match Envelope::parse(form.encrypted_secret.as_deref().unwrap_or_default()) {
        Ok(e) => e,
        Err(e) => return bad_request(e),
    };
    let ttl = match Ttl::parse(form.ttl.as_deref().unwrap_or_default()) {
        Ok(t) => t,
        Err(e) => return bad_request(e),
    };

    match state.secrets.create(&envelope, ttl) {
        Ok(management_id) => (
            StatusCode::CREATED,
            [(header::LOCATION, format!("/manage-secret/{management_id}"))],
            Json(CreateResponse {
                management_id: management_id.to_string(),
            }),
        )
            .into_response(),
        Err(LifecycleError::Invalid(e)) => bad_request(e),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

// ── View ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub cipher_text: String,
    #[serde(flatten)]
    pub notifications: Notifications,
}

pub async fn view_secret<S: SecretStore>(
    State(state): State<AppState<S>>,
    jar: CookieJar,
    Path(viewing_id): Path<String>,
) -> Response {
    match state.secrets.view(&viewing_id) {
        Ok(cipher_text) => {
            let (jar, notifications) = flash::take(jar);
            let body = ViewResponse {
                cipher_text,
                notifications,
            };
            (jar, Json(body)).into_response()
        }
        Err(e) => redirect_for(jar, e),
    }
}

// ── Manage ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ManageResponse {
    pub management_id: String,
    pub viewing_url: String,
    pub delete_url: String,
    #[serde(flatten)]
    pub notifications: Notifications,
}

pub async fn manage_secret<S: SecretStore>(
    State(state): State<AppState<S>>,
    jar: CookieJar,
    Path(management_id): Path<String>,
) -> Response {
    match state.secrets.manage(&management_id) {
        Ok(managed) => {
            let (jar, notifications) = flash::take(jar);
            let body = ManageResponse {
                management_id: managed.management_id.to_string(),
                viewing_url: managed.viewing_url,
                delete_url: managed.delete_url,
                notifications,
            };
            (jar, Json(body)).into_response()
        }
        Err(e) => redirect_for(jar, e),
    }
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_secret<S: SecretStore>(
    State(state): State<AppState<S>>,
    jar: CookieJar,
    Path(management_id): Path<String>,
) -> Response {
    match state.secrets.delete(&management_id) {
        Ok(()) => (flash::set(jar, Notice::SecretDeleted), Redirect::to(LANDING)).into_response(),
        Err(_) => Redirect::to(OOPS).into_response(),
    }
}

// ── Expire ────────────────────────────────────────────────────────────────────

/// Mark every elapsed secret expired, on the server's clock. Lets an external
/// scheduler drive expiration while this process holds the database.
pub async fn sweep_secrets<S: SecretStore>(State(state): State<AppState<S>>) -> Response {
    match state.secrets.sweep_expired(crate::lifecycle::now_millis()) {
        Ok(expired) => Json(json!({ "expired": expired })).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn bad_request(e: ValidationError) -> Response {
    (StatusCode::BAD_REQUEST, e.to_string()).into_response()
}

/// Not-found goes back to the landing page with a notice; anything else to
/// the generic failure page. Internal errors were logged by the lifecycle.
fn redirect_for(jar: CookieJar, e: LifecycleError) -> Response {
    match e {
        LifecycleError::NotFound => {
            (flash::set(jar, Notice::SecretNotFound), Redirect::to(LANDING)).into_response()
        }
        _ => Redirect::to(OOPS).into_response(),
    }
}
