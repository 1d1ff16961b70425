//! Profile pages
//!
//! - GET|POST /rango/register_profile/   - create the signed-in user's profile
//! - GET|POST /rango/profile/{username}/ - view a profile; the owner may update it
//! - GET      /rango/profiles/           - all profiles
//!
//! Profile forms are multipart with a `website` text field and an optional
//! `picture` file.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use tera::Context as TeraContext;

use crate::api::middleware::{found, AppState, LoginRequired};
use crate::api::render::HtmlRequest;
use crate::models::{ProfileInput, ProfileWithUser};
use crate::services::{validate_website, ProfileServiceError};

/// Room for the website field and multipart framing around the picture
const FORM_OVERHEAD: usize = 64 * 1024;

/// Profile routes; request bodies may carry a picture of up to
/// `max_file_size` bytes.
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD);

    Router::new()
        .route(
            "/rango/register_profile/",
            get(register_profile_form).post(register_profile),
        )
        .route("/rango/profile/{username}/", get(show_profile).post(update_profile))
        .route("/rango/profiles/", get(list_profiles))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// An uploaded file, not yet stored
#[derive(Debug)]
struct Upload {
    content_type: String,
    data: Vec<u8>,
}

/// Raw profile form fields
#[derive(Debug, Default)]
struct ProfileForm {
    website: Option<String>,
    picture: Option<Upload>,
}

async fn read_profile_form(mut multipart: Multipart) -> Result<ProfileForm, String> {
    let mut form = ProfileForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form: {}", e))?
    {
        match field.name().unwrap_or("") {
            "website" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read website: {}", e))?;
                form.website = Some(text);
            }
            "picture" => {
                // Browsers send an empty part when no file was chosen.
                if field.file_name().map_or(true, str::is_empty) {
                    continue;
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read picture: {}", e))?;
                if !data.is_empty() {
                    form.picture = Some(Upload {
                        content_type,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Check the website, then store the picture, if any, and turn the form
/// into service input
async fn to_input(state: &AppState, form: ProfileForm) -> Result<ProfileInput, ProfileServiceError> {
    let mut input = ProfileInput {
        website: form.website.as_deref().map(validate_website).transpose()?,
        picture: None,
    };
    if let Some(upload) = form.picture {
        let path = state
            .profile_service
            .save_picture(&upload.content_type, &upload.data)
            .await?;
        input = input.with_picture(path);
    }
    Ok(input)
}

/// Remove a just-stored picture when the profile change did not go through
async fn discard_on_error<T>(
    state: &AppState,
    result: &Result<T, ProfileServiceError>,
    picture: Option<&str>,
) {
    if let (Err(_), Some(picture)) = (result, picture) {
        state.profile_service.remove_picture(picture).await;
    }
}

/// Validation failures become form errors; anything else is logged and returned
fn form_errors(
    page: &HtmlRequest,
    err: ProfileServiceError,
) -> Result<Vec<String>, ProfileServiceError> {
    match err {
        ProfileServiceError::ValidationError(msg) => Ok(vec![msg]),
        other => {
            tracing::error!(error = %other, path = %page.path, "Profile update failed");
            Err(other)
        }
    }
}

async fn render_registration(
    state: &AppState,
    page: &HtmlRequest,
    website: &str,
    errors: &[String],
) -> Response {
    let mut context = TeraContext::new();
    context.insert("form", &serde_json::json!({ "website": website }));
    context.insert("errors", errors);
    page.render(state, "rango/profile_registration.html", context)
        .await
}

async fn server_error(state: &AppState, page: &HtmlRequest) -> Response {
    page.render_error(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong on our side.",
    )
    .await
}

/// GET /rango/register_profile/
async fn register_profile_form(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
) -> Response {
    render_registration(&state, &page, "", &[]).await
}

/// POST /rango/register_profile/
async fn register_profile(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    page: HtmlRequest,
    multipart: Multipart,
) -> Response {
    let form = match read_profile_form(multipart).await {
        Ok(form) => form,
        Err(msg) => return render_registration(&state, &page, "", &[msg]).await,
    };
    let website = form.website.clone().unwrap_or_default();

    let result = match to_input(&state, form).await {
        Ok(input) => {
            let picture = input.picture.clone();
            let result = state.profile_service.register_profile(user.id, input).await;
            discard_on_error(&state, &result, picture.as_deref()).await;
            result
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => found("/rango/"),
        Err(ProfileServiceError::AlreadyExists(_)) => {
            found(&format!("/rango/profile/{}/", urlencoding::encode(&user.username)))
        }
        Err(e) => match form_errors(&page, e) {
            Ok(errors) => render_registration(&state, &page, &website, &errors).await,
            Err(_) => server_error(&state, &page).await,
        },
    }
}

async fn render_profile(
    state: &AppState,
    page: &HtmlRequest,
    viewer_id: i64,
    username: &str,
    errors: &[String],
) -> Response {
    let (selected_user, profile) = match state.profile_service.get_or_create(username).await {
        Ok(found_profile) => found_profile,
        Err(ProfileServiceError::UserNotFound(_)) => return found("/rango/"),
        Err(e) => {
            tracing::error!(error = %e, %username, "Failed to load profile");
            return server_error(state, page).await;
        }
    };

    let mut context = TeraContext::new();
    context.insert("is_owner", &(selected_user.id == viewer_id));
    context.insert(
        "profile",
        &ProfileWithUser::new(selected_user.username.clone(), profile),
    );
    context.insert("selected_user", &selected_user);
    context.insert("errors", errors);
    page.render(state, "rango/profile.html", context).await
}

/// GET /rango/profile/{username}/
async fn show_profile(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    page: HtmlRequest,
    Path(username): Path<String>,
) -> Response {
    render_profile(&state, &page, user.id, &username, &[]).await
}

/// POST /rango/profile/{username}/
async fn update_profile(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    page: HtmlRequest,
    Path(username): Path<String>,
    multipart: Multipart,
) -> Response {
    if user.username != username {
        return page
            .render_error(
                &state,
                StatusCode::FORBIDDEN,
                "You can only edit your own profile.",
            )
            .await;
    }

    let form = match read_profile_form(multipart).await {
        Ok(form) => form,
        Err(msg) => return render_profile(&state, &page, user.id, &username, &[msg]).await,
    };

    let result = match to_input(&state, form).await {
        Ok(input) => {
            let picture = input.picture.clone();
            let result = state.profile_service.update(user.id, &username, input).await;
            discard_on_error(&state, &result, picture.as_deref()).await;
            result
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => found(&format!("/rango/profile/{}/", urlencoding::encode(&username))),
        Err(ProfileServiceError::Forbidden) => {
            page.render_error(
                &state,
                StatusCode::FORBIDDEN,
                "You can only edit your own profile.",
            )
            .await
        }
        Err(ProfileServiceError::UserNotFound(_)) => found("/rango/"),
        Err(e) => match form_errors(&page, e) {
            Ok(errors) => render_profile(&state, &page, user.id, &username, &errors).await,
            Err(_) => server_error(&state, &page).await,
        },
    }
}

/// GET /rango/profiles/
async fn list_profiles(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
) -> Response {
    let profiles = match state.profile_service.list().await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list profiles");
            return server_error(&state, &page).await;
        }
    };

    let mut context = TeraContext::new();
    context.insert("profiles", &profiles);
    page.render(&state, "rango/list_profiles.html", context).await
}
