#![allow(
    clippy::unwrap_used,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]

//! Integration tests for REST calls made through [`netlayer::Client`].
//!
//! These tests use `httpmock` to mock HTTP responses, ensuring deterministic
//! and fast test execution without requiring network access.

pub mod common;

mod requests {
    use std::collections::HashMap;

    use httpmock::Method::{DELETE, GET, POST};
    use httpmock::MockServer;
    use netlayer::localization::Locale;
    use netlayer::{ApiRequest, Client};
    use reqwest::StatusCode;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::common::{TOKEN, config};

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    #[derive(Serialize)]
    struct Login<'a> {
        username: &'a str,
        password: &'a str,
    }

    #[tokio::test]
    async fn get_should_send_headers_and_decode() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(
            config(&server.base_url(), "ws://unused")
                .with_bearer_token(TOKEN)
                .with_locale(Some(Locale::Tr))
                .with_custom_headers(HashMap::from([("X-App".to_owned(), "demo".to_owned())])),
        )?;

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/users/7")
                .query_param("expand", "profile")
                .header("authorization", format!("Bearer {TOKEN}"))
                .header("language", "tr")
                .header("x-app", "demo");
            then.status(StatusCode::OK)
                .json_body(json!({ "id": 7, "name": "Ada" }));
        });

        let user: User = client
            .send_request(
                ApiRequest::get("/users/{id}")
                    .path_param("id", "7")
                    .query_param("expand", "profile"),
            )
            .await?;

        assert_eq!(
            user,
            User {
                id: 7,
                name: "Ada".to_owned()
            }
        );
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn empty_token_should_omit_authorization() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let with_auth = server.mock(|when, then| {
            when.method(GET).path("/health").header_exists("authorization");
            then.status(StatusCode::OK).json_body(json!("auth"));
        });
        let without_auth = server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(StatusCode::OK).json_body(json!("anonymous"));
        });

        let body: String = client.send_request(ApiRequest::get("/health")).await?;

        assert_eq!(body, "anonymous");
        with_auth.assert_calls(0);
        without_auth.assert();

        Ok(())
    }

    #[tokio::test]
    async fn post_should_send_json_body() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/auth/login")
                .header("content-type", "application/json")
                .json_body(json!({ "username": "ada", "password": "hunter2" }));
            then.status(StatusCode::OK)
                .json_body(json!({ "token": "fresh" }));
        });

        let session: HashMap<String, String> = client
            .send_request(ApiRequest::post("/auth/login").json(&Login {
                username: "ada",
                password: "hunter2",
            }))
            .await?;

        assert_eq!(session.get("token").map(String::as_str), Some("fresh"));
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn repeated_query_values_should_all_be_sent() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/users")
                .query_param("id", "1")
                .query_param("id", "2");
            then.status(StatusCode::OK).json_body(json!([]));
        });

        let users: Vec<User> = client
            .send_request(ApiRequest::get("/users").query_values("id", [1, 2]))
            .await?;

        assert!(users.is_empty(), "expected no users");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn no_content_should_decode_as_unit() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/users/7");
            then.status(StatusCode::NO_CONTENT);
        });

        client
            .send_request::<()>(ApiRequest::delete("/users/{id}").path_param("id", "7"))
            .await?;
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn raw_response_should_be_returned_undecoded() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(GET).path("/report.csv");
            then.status(StatusCode::OK).body("a,b\n1,2\n");
        });

        let response = client
            .send_request_raw(ApiRequest::get("/report.csv"))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await?, "a,b\n1,2\n");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn token_refresh_should_apply_to_later_calls() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/me")
                .header("authorization", "Bearer refreshed");
            then.status(StatusCode::OK)
                .json_body(json!({ "id": 1, "name": "Ada" }));
        });

        client.set_bearer_token("refreshed");
        let user: User = client.send_request(ApiRequest::get("/me")).await?;

        assert_eq!(user.id, 1);
        mock.assert();

        Ok(())
    }

    #[cfg(feature = "multipart")]
    #[tokio::test]
    async fn upload_should_send_multipart_form() -> anyhow::Result<()> {
        use netlayer::rest::upload::Upload;

        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/users/7/avatar")
                .header_exists("content-type");
            then.status(StatusCode::OK)
                .json_body(json!({ "url": "https://cdn.example.com/a.png" }));
        });

        let upload = Upload::new("avatar.png", vec![0x89, b'P', b'N', b'G']).field("userId", "7");
        let body: HashMap<String, String> = client
            .send_request(
                ApiRequest::post("/users/{id}/avatar")
                    .path_param("id", "7")
                    .upload(upload),
            )
            .await?;

        assert_eq!(
            body.get("url").map(String::as_str),
            Some("https://cdn.example.com/a.png")
        );
        mock.assert();

        Ok(())
    }
}

mod errors {
    use std::collections::HashMap;

    use httpmock::Method::GET;
    use httpmock::MockServer;
    use netlayer::error::{Kind, Status};
    use netlayer::localization::Locale;
    use netlayer::{ApiRequest, Client};
    use reqwest::StatusCode;
    use serde::Deserialize;
    use serde_json::json;

    use crate::common::{closed_addr, config};

    #[derive(Debug, Deserialize)]
    struct User {
        #[expect(dead_code, reason = "Only decoded to exercise the codec")]
        id: u32,
    }

    async fn failing_call(server: &MockServer, client: &Client, status: StatusCode, body: Option<&str>) -> netlayer::Error {
        server.mock(|when, then| {
            when.method(GET).path("/fail");
            let then = then.status(status);
            if let Some(body) = body {
                then.body(body);
            }
        });

        client
            .send_request::<serde_json::Value>(ApiRequest::get("/fail"))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn unauthorized_should_use_localized_default() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let error = failing_call(&server, &client, StatusCode::UNAUTHORIZED, None).await;

        assert_eq!(error.kind(), Kind::Unauthorized);
        assert_eq!(error.message(), "Unauthorized access");
        assert_eq!(error.status_code(), Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }

    #[tokio::test]
    async fn structured_message_should_override_default() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let error = failing_call(
            &server,
            &client,
            StatusCode::UNAUTHORIZED,
            Some(r#"{"message":"bad creds"}"#),
        )
        .await;

        assert_eq!(error.kind(), Kind::Unauthorized);
        assert_eq!(error.message(), "bad creds");
        let status = error.downcast_ref::<Status>().unwrap();
        assert_eq!(status.path, "/fail");
        assert_eq!(status.message.as_deref(), Some("bad creds"));

        Ok(())
    }

    #[tokio::test]
    async fn malformed_error_body_should_be_tolerated() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let error = failing_call(
            &server,
            &client,
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("<html>oops</html>"),
        )
        .await;

        assert_eq!(error.kind(), Kind::Server);
        assert_eq!(error.message(), "Server error occurred");

        Ok(())
    }

    #[tokio::test]
    async fn not_found_should_follow_the_locale() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;
        client.set_locale(Some(Locale::Tr));

        let error = failing_call(&server, &client, StatusCode::NOT_FOUND, None).await;

        assert_eq!(error.kind(), Kind::NotFound);
        assert_eq!(error.message(), "Kaynak bulunamadı");

        Ok(())
    }

    #[tokio::test]
    async fn unmapped_status_should_be_unknown() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        let error = failing_call(&server, &client, StatusCode::FORBIDDEN, None).await;

        assert_eq!(error.kind(), Kind::Unknown);
        assert_eq!(error.message(), "Unknown error: 403 Forbidden");

        Ok(())
    }

    #[tokio::test]
    async fn decode_failure_should_be_unknown() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(config(&server.base_url(), "ws://unused"))?;

        server.mock(|when, then| {
            when.method(GET).path("/users/7");
            then.status(StatusCode::OK)
                .json_body(json!({ "id": "seven" }));
        });

        let error = client
            .send_request::<User>(ApiRequest::get("/users/7"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Unknown);
        assert!(
            error.downcast_ref::<serde_json::Error>().is_some(),
            "decode error should be the source"
        );

        Ok(())
    }

    #[tokio::test]
    async fn strict_path_params_should_reject_unresolved_placeholders() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(
            netlayer::Config::builder()
                .rest_base_url(server.base_url())
                .socket_base_url("ws://unused")
                .strict_path_params(true)
                .build(),
        )?;

        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(StatusCode::OK).json_body(json!(null));
        });

        let error = client
            .send_request::<()>(ApiRequest::get("/users/{id}"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Unknown);
        mock.assert_calls(0);

        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_should_be_a_network_error() -> anyhow::Result<()> {
        let addr = closed_addr().await;
        let client = Client::new(config(&format!("http://{addr}"), "ws://unused"))?;

        let error = client
            .send_request::<()>(ApiRequest::get("/health"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Network);
        assert!(
            error.message().starts_with("Network error"),
            "unexpected message {}",
            error.message()
        );

        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_host_should_be_a_connection_error() -> anyhow::Result<()> {
        let client = Client::new(config("http://netlayer-test.invalid", "ws://unused"))?;

        let error = client
            .send_request::<()>(ApiRequest::get("/health"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Connection);

        Ok(())
    }

    #[test]
    fn invalid_custom_header_should_be_rejected_up_front() {
        let result = Client::new(
            config("http://localhost", "ws://unused")
                .with_custom_headers(HashMap::from([("bad header".to_owned(), "x".to_owned())])),
        );

        assert!(result.is_err(), "invalid header names must be rejected");
    }
}
