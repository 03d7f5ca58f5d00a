// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP route handlers: translates wire requests into calls against
//! `discovery`, `dcr`, `par`, `consent`, `introspect` and the `flows::*`
//! grant engines, and renders their results (or `OidcError`) back onto the
//! wire per spec §7.

use rocket::form::{Form, FromForm};
use rocket::http::{ContentType, Cookie, CookieJar, Status};
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};

use crate::client_auth::{self, PresentedCredential};
use crate::consent::{self, ConsentOutcome};
use crate::dcr::{self, ClientRegistrationRequest};
use crate::discovery::{self, DiscoveryDocument, JwksDocument};
use crate::error::{ErrorBody, OidcError, OidcResult};
use crate::flows::{client_credentials, code, delete_token, device, implicit, refresh, ropc, TokenResponse};
use crate::introspect::{self, IntrospectionResponse};
use crate::par;
use crate::request::{validate_authorize_request, AuthorizeParams};

use super::guards::BearerToken;
use super::AppState;

const SESSION_COOKIE: &str = "oidc_session";

fn error_response(e: OidcError) -> (Status, Json<ErrorBody>) {
    (e.http_status(), Json(e.as_wire_body()))
}

fn percent_encode(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '&' => "%26".to_string(),
            '=' => "%3D".to_string(),
            '#' => "%23".to_string(),
            '+' => "%2B".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[get("/.well-known/openid-configuration")]
pub fn discovery_document(state: &State<AppState>) -> Json<DiscoveryDocument> {
    Json(discovery::discovery_document(&state.config, &state.config.signing_algorithm))
}

#[get("/jwks")]
pub fn jwks(state: &State<AppState>) -> Json<JwksDocument> {
    Json(discovery::jwks_document(&state.keys))
}

// --- /authorize -----------------------------------------------------------

async fn resolve_authorize_params(state: &AppState, params: AuthorizeParams) -> OidcResult<AuthorizeParams> {
    match &params.request_uri {
        Some(uri) => par::redeem_pushed_request(state.store.as_ref(), uri, &params.client_id).await,
        None => Ok(params),
    }
}

#[get("/authorize?<params..>")]
pub async fn authorize(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    params: AuthorizeParams,
) -> Result<Redirect, (Status, Json<ErrorBody>)> {
    let params = resolve_authorize_params(state, params).await.map_err(error_response)?;
    let authorize_url = format!("{}?client_id={}", state.config.endpoint("authorize"), percent_encode(&params.client_id));

    let client = state
        .host
        .get_client(&params.client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))
        .map_err(error_response)?;

    let validated = validate_authorize_request(&params, &client, state.config.pkce_required_for_public_clients)
        .map_err(error_response)?;

    let session_id = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let outcome = consent::reconcile(state.host.as_ref(), &validated, session_id.as_deref(), &authorize_url)
        .await
        .map_err(error_response)?;

    match outcome {
        ConsentOutcome::RequireLogin { login_url } => Ok(Redirect::to(login_url)),
        ConsentOutcome::RequireConsent { subject, missing_scopes, amr } => {
            Ok(Redirect::to(consent_redirect(state, &validated, &subject, &missing_scopes, &amr)))
        }
        ConsentOutcome::Proceed { subject, amr } => {
            complete_authorization(state, &validated, &subject, amr).await.map_err(error_response)
        }
    }
}

fn consent_redirect(
    state: &AppState,
    request: &crate::request::ValidatedRequest,
    subject: &str,
    missing_scopes: &[String],
    amr: &[String],
) -> String {
    format!(
        "{}/consent?client_id={}&subject={}&missing_scope={}&redirect_uri={}&state={}&amr={}",
        state.config.server.endpoint_prefix.trim_end_matches('/'),
        percent_encode(&request.client_id),
        percent_encode(subject),
        percent_encode(&missing_scopes.join(" ")),
        percent_encode(&request.redirect_uri),
        percent_encode(request.state.as_deref().unwrap_or("")),
        percent_encode(&amr.join(" ")),
    )
}

/// A minimal consent page: the `MemoryHost` reference implementation has no
/// durable per-user grant store, so approving here only authorizes this one
/// redirect rather than persisting a grant a future silent request could
/// rely on. A production `Host` would persist the grant in
/// `get_client_granted_scopes`'s backing store instead.
#[get("/consent?<client_id>&<subject>&<missing_scope>&<redirect_uri>&<state>&<amr>")]
pub fn consent_page(
    client_id: String,
    subject: String,
    missing_scope: String,
    redirect_uri: String,
    state: Option<String>,
    amr: String,
) -> RawHtml<String> {
    RawHtml(format!(
        "<html><body><h1>Authorize {client_id}</h1><p>requests: {missing_scope}</p>\
         <form method=\"get\" action=\"approve\">\
         <input type=\"hidden\" name=\"client_id\" value=\"{client_id}\">\
         <input type=\"hidden\" name=\"subject\" value=\"{subject}\">\
         <input type=\"hidden\" name=\"redirect_uri\" value=\"{redirect_uri}\">\
         <input type=\"hidden\" name=\"scope\" value=\"{missing_scope}\">\
         <input type=\"hidden\" name=\"state\" value=\"{state}\">\
         <input type=\"hidden\" name=\"amr\" value=\"{amr}\">\
         <button name=\"approve\" value=\"true\">Allow</button>\
         <button name=\"approve\" value=\"false\">Deny</button></form></body></html>",
        state = state.unwrap_or_default(),
    ))
}

#[get("/consent/approve?<client_id>&<subject>&<redirect_uri>&<scope>&<state>&<amr>&<approve>")]
pub async fn consent_approve(
    app_state: &State<AppState>,
    client_id: String,
    subject: String,
    redirect_uri: String,
    scope: String,
    state: Option<String>,
    amr: String,
    approve: bool,
) -> Result<Redirect, (Status, Json<ErrorBody>)> {
    if !approve {
        let sep = if redirect_uri.contains('?') { '&' } else { '?' };
        return Ok(Redirect::to(format!("{redirect_uri}{sep}error=access_denied")));
    }

    let validated = crate::request::ValidatedRequest {
        response_type: vec!["code".to_string()],
        client_id,
        redirect_uri,
        scopes: scope.split_whitespace().map(String::from).collect(),
        state,
        nonce: None,
        code_challenge: None,
        code_challenge_method: None,
        resource: vec![],
        prompt: vec![],
        max_age: None,
        acr_values: vec![],
        authorization_details: None,
    };
    let amr: Vec<String> = amr.split_whitespace().map(String::from).collect();
    complete_authorization(app_state, &validated, &subject, amr).await.map_err(error_response)
}

async fn complete_authorization(
    state: &AppState,
    request: &crate::request::ValidatedRequest,
    subject: &str,
    amr: Vec<String>,
) -> OidcResult<Redirect> {
    let ctx = state.grant_context();
    let auth_time = crate::store::now();

    if request.response_type.iter().any(|t| t == "code") {
        let issued = code::issue_authorization_code(&ctx, request, subject, auth_time, amr, None).await?;
        let mut query = format!("code={}", issued.code);
        if let Some(s) = &request.state {
            query.push_str(&format!("&state={}", percent_encode(s)));
        }
        let sep = if request.redirect_uri.contains('?') { '&' } else { '?' };
        Ok(Redirect::to(format!("{}{sep}{query}", request.redirect_uri)))
    } else {
        let result = implicit::issue_implicit_response(&ctx, request, subject, auth_time).await?;
        let fragment = serde_json::to_value(&result)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| match v {
                        serde_json::Value::String(s) => Some(format!("{k}={}", percent_encode(s))),
                        serde_json::Value::Number(n) => Some(format!("{k}={n}")),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .unwrap_or_default();
        Ok(Redirect::to(format!("{}#{fragment}", request.redirect_uri)))
    }
}

// --- /token -----------------------------------------------------------------

#[derive(Debug, FromForm)]
pub struct TokenRequestForm {
    pub grant_type: String,
    #[field(default = None)]
    pub code: Option<String>,
    #[field(default = None)]
    pub redirect_uri: Option<String>,
    #[field(default = None)]
    pub client_id: Option<String>,
    #[field(default = None)]
    pub client_secret: Option<String>,
    #[field(default = None)]
    pub code_verifier: Option<String>,
    #[field(default = None)]
    pub refresh_token: Option<String>,
    #[field(default = None)]
    pub scope: Option<String>,
    #[field(default = None)]
    pub username: Option<String>,
    #[field(default = None)]
    pub password: Option<String>,
    #[field(default = None)]
    pub device_code: Option<String>,
    #[field(default = None)]
    pub token: Option<String>,
    #[field(default = None)]
    pub client_assertion: Option<String>,
    #[field(default = None)]
    pub client_assertion_type: Option<String>,
}

fn presented_credential(form: &TokenRequestForm, basic: Option<(String, String)>) -> OidcResult<(String, PresentedCredential)> {
    if let Some((id, secret)) = basic {
        return Ok((id.clone(), PresentedCredential::Basic { client_id: id, client_secret: secret }));
    }
    if let (Some(assertion), Some(client_id)) = (&form.client_assertion, &form.client_id) {
        return Ok((
            client_id.clone(),
            PresentedCredential::ClientAssertion {
                client_id: client_id.clone(),
                assertion: assertion.clone(),
                assertion_type: form.client_assertion_type.clone().unwrap_or_default(),
            },
        ));
    }
    match (&form.client_id, &form.client_secret) {
        (Some(id), Some(secret)) => Ok((id.clone(), PresentedCredential::Post { client_id: id.clone(), client_secret: secret.clone() })),
        (Some(id), None) => Ok((id.clone(), PresentedCredential::None)),
        _ => Err(OidcError::invalid_client("no client authentication presented")),
    }
}

#[post("/token", data = "<form>")]
pub async fn token(
    state: &State<AppState>,
    headers: TokenHeaders<'_>,
    dpop: super::guards::DpopProof,
    form: Form<TokenRequestForm>,
) -> Result<Json<TokenResponse>, (Status, Json<ErrorBody>)> {
    let form = form.into_inner();
    let basic = headers.authorization.as_deref().and_then(client_auth::parse_basic_auth_header);
    let (client_id, credential) = presented_credential(&form, basic).map_err(error_response)?;

    let client = state
        .host
        .get_client(&client_id)
        .await
        .ok_or_else(|| OidcError::invalid_client("unknown client"))
        .map_err(error_response)?;

    client_auth::authenticate_client(&client, &credential, &state.config.issuer, &state.config.endpoint("token"), state.store.as_ref(), state.host.as_ref())
        .await
        .map_err(error_response)?;

    let proof_jkt = match &dpop.0 {
        Some(proof) => Some(
            crate::dpop::verify_dpop_proof(proof, "POST", &state.config.endpoint("token"), state.store.as_ref())
                .await
                .map_err(error_response)?
                .jkt,
        ),
        None if state.config.dpop_required => {
            return Err(error_response(OidcError::invalid_request("a DPoP proof is required on this server")))
        }
        None => None,
    };

    let ctx = state.grant_context();
    let scopes: Vec<String> = form.scope.clone().map(|s| s.split_whitespace().map(String::from).collect()).unwrap_or_default();

    let response = match form.grant_type.as_str() {
        "authorization_code" => {
            let code_value = form.code.as_deref().ok_or_else(|| OidcError::invalid_request("code is required")).map_err(error_response)?;
            let redirect_uri = form
                .redirect_uri
                .clone()
                .or_else(|| client.redirect_uris.first().cloned())
                .unwrap_or_default();
            code::exchange_authorization_code(&ctx, code_value, &redirect_uri, &client_id, form.code_verifier.as_deref(), proof_jkt)
                .await
                .map_err(error_response)?
        }
        "refresh_token" => {
            let token_value = form.refresh_token.as_deref().ok_or_else(|| OidcError::invalid_request("refresh_token is required")).map_err(error_response)?;
            let requested = if scopes.is_empty() { None } else { Some(scopes.as_slice()) };
            refresh::exchange_refresh_token(&ctx, &client_id, token_value, requested).await.map_err(error_response)?
        }
        "client_credentials" => client_credentials::exchange_client_credentials(&ctx, &client_id, &scopes).await.map_err(error_response)?,
        "password" => {
            let username = form.username.as_deref().ok_or_else(|| OidcError::invalid_request("username is required")).map_err(error_response)?;
            let password = form.password.as_deref().ok_or_else(|| OidcError::invalid_request("password is required")).map_err(error_response)?;
            ropc::exchange_password_credentials(&ctx, &client_id, username, password, &scopes).await.map_err(error_response)?
        }
        "urn:ietf:params:oauth:grant-type:device_code" => {
            let device_code_value = form.device_code.as_deref().ok_or_else(|| OidcError::invalid_request("device_code is required")).map_err(error_response)?;
            device::poll_device_token(&ctx, &client_id, device_code_value).await.map_err(error_response)?
        }
        "urn:params:oauth:grant-type:delete_token" => {
            let token_value = form.token.as_deref().ok_or_else(|| OidcError::invalid_request("token is required")).map_err(error_response)?;
            delete_token::delete_token(&ctx, &client_id, token_value).await.map_err(error_response)?;
            TokenResponse { access_token: String::new(), token_type: "N/A".to_string(), expires_in: 0, refresh_token: None, id_token: None, scope: String::new() }
        }
        other => return Err(error_response(OidcError::protocol(crate::error::ProtocolErrorCode::UnsupportedResponseType, format!("unsupported grant_type: {other}")))),
    };

    let response = encrypt_id_token(response, &client).map_err(error_response)?;

    Ok(Json(response))
}

/// Apply the client's `id_token_encrypted_response_alg`/`_enc` (spec §4.1)
/// to a freshly minted `TokenResponse`, leaving it unchanged if the client
/// never registered one.
fn encrypt_id_token(mut response: TokenResponse, client: &crate::config::ClientConfig) -> OidcResult<TokenResponse> {
    if let Some(id_token) = response.id_token {
        response.id_token = Some(crate::token_factory::encrypt_for_client(
            &id_token,
            client.id_token_encrypted_response_alg.as_deref(),
            client.client_secret.as_deref(),
            client.jwks.as_ref(),
        )?);
    }
    Ok(response)
}

/// A request guard pulling the raw `Authorization` header without
/// requiring a `Bearer` prefix, for `/token`'s HTTP Basic client auth.
pub struct TokenHeaders<'r> {
    authorization: Option<&'r str>,
}

#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for TokenHeaders<'r> {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r rocket::Request<'_>) -> rocket::request::Outcome<Self, Self::Error> {
        rocket::request::Outcome::Success(TokenHeaders { authorization: request.headers().get_one("Authorization") })
    }
}

// --- /userinfo ----------------------------------------------------------------

#[get("/userinfo")]
pub async fn userinfo(
    state: &State<AppState>,
    bearer: BearerToken,
    dpop: super::guards::DpopProof,
) -> Result<(ContentType, String), (Status, Json<ErrorBody>)> {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.required_spec_claims.clear();
    let claims = state
        .keys
        .verify::<crate::token_factory::AccessTokenClaims>(&bearer.0, &validation)
        .map_err(error_response)?
        .claims;

    let record = state
        .store
        .get_access_token(&claims.jti)
        .await
        .map_err(|e| OidcError::Persistence(e.to_string()))
        .map_err(error_response)?
        .ok_or_else(|| OidcError::invalid_client("access token is unknown"))
        .map_err(error_response)?;

    if record.revoked || record.expires_at < crate::store::now() {
        return Err(error_response(OidcError::invalid_client("access token is expired or revoked")));
    }

    if let Some(bound_jkt) = &record.dpop_jkt {
        let proof = dpop.0.as_deref().ok_or_else(|| OidcError::invalid_client("this token requires a DPoP proof")).map_err(error_response)?;
        let verified = crate::dpop::verify_dpop_proof(proof, "GET", &state.config.endpoint("userinfo"), state.store.as_ref())
            .await
            .map_err(error_response)?;
        crate::dpop::check_access_token_binding(None, &bearer.0, bound_jkt, &verified.jkt).map_err(error_response)?;
    }

    let user = state.host.get_user(&claims.sub).await;
    let body = match user {
        Some(user) => crate::claims::userinfo_response(&claims.sub, &record.scopes, &user),
        None => {
            let mut map = serde_json::Map::new();
            map.insert("sub".to_string(), serde_json::json!(claims.sub));
            map
        }
    };

    // Spec §4.1 "outbound encryption": a client that registered
    // `userinfo_encrypted_response_alg` gets a nested JWT (signed, then
    // JWE-wrapped) instead of plain JSON.
    let client = state.host.get_client(&claims.client_id).await;
    let alg = client.as_ref().and_then(|c| c.userinfo_encrypted_response_alg.clone());
    match (client, alg) {
        (Some(client), Some(alg)) => {
            let jws = state
                .keys
                .sign(&serde_json::Value::Object(body), None)
                .map_err(error_response)?;
            let jwe = crate::token_factory::encrypt_for_client(&jws, Some(&alg), client.client_secret.as_deref(), client.jwks.as_ref())
                .map_err(error_response)?;
            Ok((ContentType::new("application", "jwt"), jwe))
        }
        _ => Ok((
            ContentType::JSON,
            serde_json::to_string(&serde_json::Value::Object(body)).map_err(|e| error_response(OidcError::Crypto(e.to_string())))?,
        )),
    }
}

// --- /introspect and /revoke ----------------------------------------------------

#[derive(Debug, FromForm)]
pub struct TokenOperationForm {
    pub token: String,
    #[field(default = None)]
    pub client_id: Option<String>,
    #[field(default = None)]
    pub client_secret: Option<String>,
}

async fn authenticate_for_token_operation(state: &AppState, headers: &TokenHeaders<'_>, form: &TokenOperationForm) -> OidcResult<String> {
    let basic = headers.authorization.and_then(client_auth::parse_basic_auth_header);
    let (client_id, credential) = match (basic, &form.client_id, &form.client_secret) {
        (Some((id, secret)), _, _) => (id.clone(), PresentedCredential::Basic { client_id: id, client_secret: secret }),
        (None, Some(id), Some(secret)) => (id.clone(), PresentedCredential::Post { client_id: id.clone(), client_secret: secret.clone() }),
        (None, Some(id), None) => (id.clone(), PresentedCredential::None),
        _ => return Err(OidcError::invalid_client("no client authentication presented")),
    };
    let client = state.host.get_client(&client_id).await.ok_or_else(|| OidcError::invalid_client("unknown client"))?;
    client_auth::authenticate_client(&client, &credential, &state.config.issuer, &state.config.endpoint("introspect"), state.store.as_ref(), state.host.as_ref()).await?;
    Ok(client_id)
}

#[post("/introspect", data = "<form>")]
pub async fn introspect(
    state: &State<AppState>,
    headers: TokenHeaders<'_>,
    form: Form<TokenOperationForm>,
) -> Result<(ContentType, String), (Status, Json<ErrorBody>)> {
    let form = form.into_inner();
    let client_id = authenticate_for_token_operation(state, &headers, &form).await.map_err(error_response)?;
    let response = introspect::introspect_token(state.store.as_ref(), &state.keys, &form.token, &client_id).await.map_err(error_response)?;

    // Spec §4.1 "outbound encryption" applies to this response too; this
    // plugin has no introspection-specific registration field, so a
    // client's `userinfo_encrypted_response_alg` governs both nested-JWT
    // responses it can receive.
    let client = state.host.get_client(&client_id).await;
    let alg = client.as_ref().and_then(|c| c.userinfo_encrypted_response_alg.clone());
    match (client, alg) {
        (Some(client), Some(alg)) => {
            let body = serde_json::to_value(&response).map_err(|e| error_response(OidcError::Crypto(e.to_string())))?;
            let jws = state.keys.sign(&body, None).map_err(error_response)?;
            let jwe = crate::token_factory::encrypt_for_client(&jws, Some(&alg), client.client_secret.as_deref(), client.jwks.as_ref())
                .map_err(error_response)?;
            Ok((ContentType::new("application", "jwt"), jwe))
        }
        _ => Ok((
            ContentType::JSON,
            serde_json::to_string(&response).map_err(|e| error_response(OidcError::Crypto(e.to_string())))?,
        )),
    }
}

#[post("/revoke", data = "<form>")]
pub async fn revoke(state: &State<AppState>, headers: TokenHeaders<'_>, form: Form<TokenOperationForm>) -> Result<(), (Status, Json<ErrorBody>)> {
    let form = form.into_inner();
    let client_id = authenticate_for_token_operation(state, &headers, &form).await.map_err(error_response)?;
    introspect::revoke_token(state.store.as_ref(), &form.token, &client_id).await.map_err(error_response)
}

// --- /par -------------------------------------------------------------------

#[post("/par", data = "<params>")]
pub async fn par(
    state: &State<AppState>,
    headers: TokenHeaders<'_>,
    params: Form<AuthorizeParams>,
) -> Result<Json<serde_json::Value>, (Status, Json<ErrorBody>)> {
    let params = params.into_inner();
    let basic = headers.authorization.and_then(client_auth::parse_basic_auth_header);
    let client_id = match basic {
        Some((id, secret)) => {
            let client = state.host.get_client(&id).await.ok_or_else(|| OidcError::invalid_client("unknown client")).map_err(error_response)?;
            client_auth::authenticate_client(&client, &PresentedCredential::Basic { client_id: id.clone(), client_secret: secret }, &state.config.issuer, &state.config.endpoint("par"), state.store.as_ref(), state.host.as_ref())
                .await
                .map_err(error_response)?;
            id
        }
        None => params.client_id.clone(),
    };

    let pushed = par::push_authorization_request(state.store.as_ref(), &client_id, &params, state.config.lifetimes.par_seconds)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "request_uri": pushed.request_uri, "expires_in": pushed.expires_in })))
}

// --- dynamic client registration ---------------------------------------------

#[post("/register", data = "<request>")]
pub async fn register_client(
    state: &State<AppState>,
    request: Json<ClientRegistrationRequest>,
) -> Result<Json<dcr::ClientRegistrationResponse>, (Status, Json<ErrorBody>)> {
    let response = dcr::register_client(state.store.as_ref(), &state.config.issuer, request.into_inner())
        .await
        .map_err(error_response)?;
    Ok(Json(response))
}

#[get("/register/<client_id>")]
pub async fn read_client(state: &State<AppState>, client_id: &str, bearer: BearerToken) -> Result<Json<serde_json::Value>, (Status, Json<ErrorBody>)> {
    let metadata = dcr::read_client(state.store.as_ref(), client_id, &bearer.0).await.map_err(error_response)?;
    Ok(Json(metadata))
}

#[delete("/register/<client_id>")]
pub async fn delete_client(state: &State<AppState>, client_id: &str, bearer: BearerToken) -> Result<(), (Status, Json<ErrorBody>)> {
    dcr::delete_client(state.store.as_ref(), client_id, &bearer.0).await.map_err(error_response)
}

// --- device flow --------------------------------------------------------------

#[derive(Debug, FromForm)]
pub struct DeviceAuthorizationForm {
    pub client_id: String,
    #[field(default = None)]
    pub scope: Option<String>,
}

#[post("/device_authorization", data = "<form>")]
pub async fn device_authorization(
    state: &State<AppState>,
    form: Form<DeviceAuthorizationForm>,
) -> Result<Json<device::DeviceAuthorizationResponse>, (Status, Json<ErrorBody>)> {
    let form = form.into_inner();
    let scopes: Vec<String> = form.scope.map(|s| s.split_whitespace().map(String::from).collect()).unwrap_or_default();
    let ctx = state.grant_context();
    let response = device::start_device_authorization(&ctx, &form.client_id, &scopes).await.map_err(error_response)?;
    Ok(Json(response))
}

#[get("/device?<user_code>")]
pub fn device_verify_page(user_code: Option<String>) -> RawHtml<String> {
    RawHtml(format!(
        "<html><body><h1>Device authorization</h1>\
         <form method=\"get\" action=\"device/approve\">\
         <input name=\"user_code\" value=\"{}\">\
         <input name=\"subject\" placeholder=\"subject\">\
         <button name=\"approve\" value=\"true\">Allow</button>\
         <button name=\"approve\" value=\"false\">Deny</button></form></body></html>",
        user_code.unwrap_or_default(),
    ))
}

#[get("/device/approve?<user_code>&<subject>&<approve>")]
pub async fn device_verify_approve(state: &State<AppState>, user_code: String, subject: String, approve: bool) -> Result<RawHtml<&'static str>, (Status, Json<ErrorBody>)> {
    let ctx = state.grant_context();
    device::resolve_user_code(&ctx, &user_code, &subject, approve).await.map_err(error_response)?;
    Ok(RawHtml(if approve { "<html><body>Device approved, you may close this window.</body></html>" } else { "<html><body>Device denied.</body></html>" }))
}

// --- session management --------------------------------------------------------

#[get("/end_session?<post_logout_redirect_uri>")]
pub fn end_session(state: &State<AppState>, cookies: &CookieJar<'_>, post_logout_redirect_uri: Option<String>) -> Redirect {
    cookies.remove(Cookie::from(SESSION_COOKIE));
    Redirect::to(post_logout_redirect_uri.unwrap_or_else(|| state.config.issuer.clone()))
}

#[get("/check_session_iframe")]
pub fn check_session_iframe() -> RawHtml<&'static str> {
    RawHtml("<html><body><script>/* session status is checked via the oidc_session cookie */</script></body></html>")
}
