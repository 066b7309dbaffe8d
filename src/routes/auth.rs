use log::{error, info, warn};
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

use crate::models::{
    AuthProvider, LoginDto, LoginResponse, OtpReservation, PendingRegistration, RegisterDto,
    RegisterResponse,
};
use crate::services::AppState;
use crate::utils::{ApiError, ApiResponse};

const OTP_SUBJECT: &str = "Your OTP Code";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn cooldown_error(email: &str, seconds: u64) -> ApiError {
    warn!("OTP requested for {} during cooldown ({}s left)", email, seconds);
    ApiError::bad_request(format!(
        "Please wait {} seconds before requesting a new OTP",
        seconds
    ))
}

/// --------------------
/// Register (send OTP)
/// --------------------
#[openapi(tag = "Auth")]
#[post("/register", data = "<dto>")]
pub async fn register(
    state: &State<AppState>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<RegisterResponse>>, ApiError> {
    let mut dto = dto.into_inner();
    dto.email = normalize_email(&dto.email);
    dto.validate()?;

    if dto.provider != AuthProvider::Local {
        return Err(ApiError::bad_request("Unsupported auth provider"));
    }

    let email = dto.email;
    if let Some(user) = state.store.find_by_email(&email).await? {
        if user.is_registered() {
            return Err(ApiError::conflict("Username already exists"));
        }
        // Skip hashing for requests that cannot be served; the store still
        // makes the final call below.
        if let Some(seconds) = user
            .pending_otp
            .as_ref()
            .and_then(|otp| state.otp.cooldown_remaining(otp))
        {
            return Err(cooldown_error(&email, seconds));
        }
    }

    let code = state.otp.generate();
    let registration = PendingRegistration {
        email: email.clone(),
        password_hash: state.auth.hash_password(&dto.password).await?,
        provider: dto.provider,
        code,
    };

    match state.otp.save(&registration).await? {
        OtpReservation::Issued => {}
        OtpReservation::Wait { seconds } => return Err(cooldown_error(&email, seconds)),
        // Lost a race with another request that completed the account.
        OtpReservation::AlreadyRegistered => {
            return Err(ApiError::conflict("Username already exists"));
        }
    }

    info!("OTP generated for email: {}", email);

    let body = format!("Your OTP is: {}", registration.code);
    if let Err(e) = state.mailer.send(&email, OTP_SUBJECT, &body).await {
        error!("Failed to send OTP email to {} via {}: {}", email, state.mailer.name(), e);
        return Err(ApiError::bad_gateway("Failed to send OTP email"));
    }

    info!("OTP email sent successfully to: {}", email);
    Ok(Json(ApiResponse::success_with_message(
        "otp sent",
        RegisterResponse { email },
    )))
}

/// --------------------
/// Login
/// --------------------
#[openapi(tag = "Auth")]
#[post("/login", data = "<dto>")]
pub async fn login(
    state: &State<AppState>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let email = normalize_email(&dto.email);

    match state.auth.verify(&email, &dto.password).await? {
        Some(token) => Ok(Json(ApiResponse::success(LoginResponse { token }))),
        None => {
            info!("Rejected login for {}", email);
            Err(ApiError::bad_request("Invalid credentials"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mongodb::bson::DateTime;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::config::AppConfig;
    use crate::db::{DbConn, MemoryStore};
    use crate::models::{AuthProvider, PendingRegistration, User};
    use crate::services::AppState;
    use crate::services::Clock;
    use crate::services::mail::mock::MockMailer;
    use crate::services::otp::testing::ManualClock;

    struct TestApp {
        client: Client,
        store: DbConn,
        mailer: Arc<MockMailer>,
        clock: Arc<ManualClock>,
    }

    async fn app() -> TestApp {
        app_with(AppConfig::test()).await
    }

    async fn app_with(config: AppConfig) -> TestApp {
        let store: DbConn = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MockMailer::new());
        let clock = Arc::new(ManualClock::new(DateTime::from_millis(1_700_000_000_000)));

        let state = AppState::new(&config, store.clone(), mailer.clone(), clock.clone());
        let client = Client::tracked(crate::build_rocket(state)).await.unwrap();

        TestApp {
            client,
            store,
            mailer,
            clock,
        }
    }

    impl TestApp {
        async fn register(&self, email: &str, password: &str) -> (Status, Value) {
            let res = self
                .client
                .post("/register")
                .json(&json!({ "email": email, "password": password, "provider": "local" }))
                .dispatch()
                .await;
            let status = res.status();
            (status, res.into_json::<Value>().await.unwrap())
        }

        async fn login(&self, email: &str, password: &str) -> (Status, Value) {
            let res = self
                .client
                .post("/login")
                .json(&json!({ "email": email, "password": password }))
                .dispatch()
                .await;
            let status = res.status();
            (status, res.into_json::<Value>().await.unwrap())
        }

        async fn stored_code(&self, email: &str) -> String {
            let user = self.store.find_by_email(email).await.unwrap().unwrap();
            user.pending_otp.unwrap().code
        }
    }

    fn wait_seconds(body: &Value) -> u64 {
        let message = body["message"].as_str().unwrap();
        message
            .strip_prefix("Please wait ")
            .and_then(|rest| rest.strip_suffix(" seconds before requesting a new OTP"))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[rocket::async_test]
    async fn first_registration_sends_exactly_one_code() {
        let app = app().await;

        let (status, body) = app.register("Fay@Example.com ", "password123").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["message"], "otp sent");
        assert_eq!(body["data"]["email"], "fay@example.com");

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "fay@example.com");
        assert_eq!(sent[0].subject, "Your OTP Code");

        let code = app.stored_code("fay@example.com").await;
        assert_eq!(code.len(), 6);
        assert_eq!(sent[0].body, format!("Your OTP is: {}", code));
    }

    #[rocket::async_test]
    async fn repeat_registration_within_cooldown_is_rejected_with_wait_time() {
        let app = app().await;
        assert_eq!(app.register("gus@example.com", "password123").await.0, Status::Ok);
        let first_code = app.stored_code("gus@example.com").await;

        app.clock.advance(Duration::from_secs(5));
        let (status, body) = app.register("gus@example.com", "password123").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["success"], false);
        let early = wait_seconds(&body);
        assert!(early <= 60);
        assert_eq!(early, 55);

        app.clock.advance(Duration::from_secs(30));
        let (status, body) = app.register("gus@example.com", "password123").await;
        assert_eq!(status, Status::BadRequest);
        assert!(wait_seconds(&body) < early);

        // Nothing was sent or overwritten while cooling down.
        assert_eq!(app.mailer.sent().len(), 1);
        assert_eq!(app.stored_code("gus@example.com").await, first_code);
    }

    #[rocket::async_test]
    async fn cooldown_rejection_skips_password_hashing() {
        // bcrypt refuses cost 3, so any request that reaches hashing fails with 500.
        let mut config = AppConfig::test();
        config.bcrypt_cost = 3;
        let app = app_with(config).await;

        let now = app.clock.now();
        app.store
            .reserve_otp(
                &PendingRegistration {
                    email: "oz@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    provider: AuthProvider::Local,
                    code: "123456".to_string(),
                },
                now,
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        app.clock.advance(Duration::from_secs(20));
        let (status, body) = app.register("oz@example.com", "password123").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(wait_seconds(&body), 40);
        assert!(app.mailer.sent().is_empty());

        // Once the cooldown is over the request does reach hashing.
        app.clock.advance(Duration::from_secs(40));
        let (status, _) = app.register("oz@example.com", "password123").await;
        assert_eq!(status, Status::InternalServerError);
    }

    #[rocket::async_test]
    async fn registration_after_cooldown_issues_new_code() {
        let app = app().await;
        assert_eq!(app.register("hal@example.com", "password123").await.0, Status::Ok);

        app.clock.advance(Duration::from_secs(60));
        let (status, _) = app.register("hal@example.com", "password123").await;
        assert_eq!(status, Status::Ok);

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 2);
        let latest = app.stored_code("hal@example.com").await;
        assert_eq!(sent[1].body, format!("Your OTP is: {}", latest));
    }

    #[rocket::async_test]
    async fn mail_failure_is_bad_gateway() {
        let app = app().await;
        app.mailer.set_failing(true);

        let (status, body) = app.register("ivy@example.com", "password123").await;
        assert_eq!(status, Status::BadGateway);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Failed to send OTP email");
        assert!(app.mailer.sent().is_empty());
    }

    #[rocket::async_test]
    async fn completed_account_conflicts() {
        let app = app().await;
        app.store
            .insert(User {
                id: None,
                email: "jon@example.com".to_string(),
                password: bcrypt::hash("password123", 4).unwrap(),
                provider: AuthProvider::Local,
                pending_otp: None,
                created_at: DateTime::now(),
                updated_at: DateTime::now(),
            })
            .await
            .unwrap();

        let (status, body) = app.register("jon@example.com", "password123").await;
        assert_eq!(status, Status::Conflict);
        assert_eq!(body["message"], "Username already exists");
        assert!(app.mailer.sent().is_empty());
    }

    #[rocket::async_test]
    async fn invalid_payloads_are_rejected() {
        let app = app().await;

        let (status, body) = app.register("not-an-email", "password123").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["message"], "Invalid email");

        let (status, body) = app.register("kim@example.com", "short").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["message"], "Invalid password");

        let res = app
            .client
            .post("/register")
            .json(&json!({ "email": "kim@example.com", "password": "password123", "provider": "google" }))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);

        assert!(app.mailer.sent().is_empty());
    }

    #[rocket::async_test]
    async fn concurrent_registrations_send_once() {
        let app = app().await;

        let (a, b) = rocket::tokio::join!(
            app.register("lea@example.com", "password123"),
            app.register("lea@example.com", "password123"),
        );

        let mut statuses = [a.0, b.0];
        statuses.sort_by_key(|s| s.code);
        assert_eq!(statuses, [Status::Ok, Status::BadRequest]);
        assert_eq!(app.mailer.sent().len(), 1);
    }

    #[rocket::async_test]
    async fn login_returns_token_for_valid_credentials() {
        let app = app().await;
        assert_eq!(app.register("max@example.com", "password123").await.0, Status::Ok);

        let (status, body) = app.login("MAX@example.com", "password123").await;
        assert_eq!(status, Status::Ok);
        let token = body["data"]["token"].as_str().unwrap();
        assert!(!token.is_empty());
    }

    #[rocket::async_test]
    async fn login_with_wrong_password_is_bad_request() {
        let app = app().await;
        assert_eq!(app.register("ned@example.com", "password123").await.0, Status::Ok);

        let (status, body) = app.login("ned@example.com", "password124").await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["message"], "Invalid credentials");
        assert!(body.get("data").is_none());

        let (status, _) = app.login("nobody@example.com", "password123").await;
        assert_eq!(status, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn malformed_body_uses_json_envelope() {
        let app = app().await;

        let res = app
            .client
            .post("/login")
            .header(rocket::http::ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["success"], false);
    }
}
