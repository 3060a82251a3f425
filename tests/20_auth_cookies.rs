mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use wiremock::matchers::{header as match_header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn login_request(body: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::HOST, "acme.joee.com.ng")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

#[tokio::test]
async fn full_login_sets_the_session_cookie_contract() -> Result<()> {
    let (router, backend) = common::gateway_with_backend().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "token": "auth-token-abcdef123456",
                "refresh_token": "refresh-token-abcdef123456",
                "user": {"id": 9, "name": "Ada Obi", "role": "admin"}
            }
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let response =
        common::send(router, login_request(r#"{"email":"ada@acme.test","password":"pw"}"#)?).await?;
    assert_eq!(response.status, StatusCode::OK);

    let auth = response.set_cookie("auth_token").expect("auth_token cookie");
    assert!(auth.contains("auth-token-abcdef123456"));
    assert!(auth.contains("SameSite=Lax"));
    assert!(auth.contains("Path=/"));
    assert!(auth.contains("Max-Age=604800"), "7 days: {auth}");

    let refresh = response
        .set_cookie("refresh_token")
        .expect("refresh_token cookie");
    assert!(refresh.contains("Max-Age=2592000"), "30 days: {refresh}");

    let user = response.set_cookie("user").expect("user cookie");
    assert!(user.contains("Ada"));
    Ok(())
}

#[tokio::test]
async fn otp_challenge_sets_only_the_mfa_cookie() -> Result<()> {
    let (router, backend) = common::gateway_with_backend().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"mfa_token": "mfa-token-abcdef123456", "message": "OTP sent"}
        })))
        .mount(&backend)
        .await;

    let response =
        common::send(router, login_request(r#"{"email":"ada@acme.test","password":"pw"}"#)?).await?;
    assert_eq!(response.status, StatusCode::OK);

    let mfa = response.set_cookie("mfa_token").expect("mfa_token cookie");
    assert!(mfa.contains("mfa-token-abcdef123456"));
    assert!(mfa.contains("Max-Age=3600"), "1 hour: {mfa}");
    assert!(response.set_cookie("auth_token").is_none());
    assert!(response.set_cookie("refresh_token").is_none());
    Ok(())
}

#[tokio::test]
async fn failed_login_relays_the_backend_error_and_sets_nothing() -> Result<()> {
    let (router, backend) = common::gateway_with_backend().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&backend)
        .await;

    let response =
        common::send(router, login_request(r#"{"email":"ada@acme.test","password":"no"}"#)?).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()?, json!({"message": "Invalid credentials"}));
    assert!(response.set_cookies().is_empty());
    Ok(())
}

#[tokio::test]
async fn verify_otp_promotes_the_session_and_marks_otp_verified() -> Result<()> {
    let (router, backend) = common::gateway_with_backend().await;

    // The pending MFA credential is the bearer for the verification call
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .and(match_header(
            "authorization",
            "Bearer mfa-token-abcdef123456",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "auth-token-after-otp-1",
            "refreshToken": "refresh-token-after-otp-1",
            "user": {"id": 9}
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/verify-otp")
        .header(header::HOST, "acme.joee.com.ng")
        .header(header::COOKIE, "mfa_token=mfa-token-abcdef123456")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"otp":"123456"}"#))?;

    let response = common::send(router, request).await?;
    assert_eq!(response.status, StatusCode::OK);

    assert!(response
        .set_cookie("auth_token")
        .expect("auth_token cookie")
        .contains("auth-token-after-otp-1"));
    let otp = response
        .set_cookie("otp_verified")
        .expect("otp_verified cookie");
    assert!(otp.contains("Max-Age=31536000"), "365 days: {otp}");
    // The consumed MFA challenge is dropped with the same response
    let mfa = response.set_cookie("mfa_token").expect("mfa removal");
    assert!(mfa.contains("Max-Age=0"), "removed: {mfa}");
    Ok(())
}

#[tokio::test]
async fn verify_otp_without_a_challenge_is_rejected_locally() -> Result<()> {
    let (router, backend) = common::gateway_with_backend().await;

    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/verify-otp")
        .header(header::HOST, "acme.joee.com.ng")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"otp":"123456"}"#))?;

    let response = common::send(router, request).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_clears_every_credential_cookie() -> Result<()> {
    let (router, _backend) = common::gateway_with_backend().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::HOST, "acme.joee.com.ng")
        .header(
            header::COOKIE,
            "auth_token=a-token-123456789; refresh_token=r-token-123456789",
        )
        .body(Body::empty())?;

    let response = common::send(router, request).await?;
    assert_eq!(response.status, StatusCode::OK);

    for name in ["auth_token", "refresh_token", "user", "mfa_token"] {
        let cookie = response
            .set_cookie(name)
            .unwrap_or_else(|| panic!("missing removal cookie for {name}"));
        assert!(cookie.contains("Max-Age=0"), "{name} not removed: {cookie}");
    }
    Ok(())
}
