//! Tests for the cms-bridge-cli library module.

use super::*;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["cms-bridge"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

mod parsing {
    use super::*;

    #[test]
    fn test_sign_command_parses() {
        let cli = parse(&["sign", "--secret", "s3cret", "--data", "{}", "--header"]);

        match cli.command {
            Commands::Sign {
                secret,
                data,
                header,
            } => {
                assert_eq!(secret, "s3cret");
                assert_eq!(data, "{}");
                assert!(header);
            }
            _ => panic!("Expected Sign command"),
        }
        assert_eq!(cli.log_level, "warn");
        assert!(!cli.json_logs);
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = parse(&["config", "--config", "/tmp/bridge.yaml"]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.yaml")));
    }

    #[test]
    fn test_send_url_requires_secret() {
        let result = Cli::try_parse_from([
            "cms-bridge",
            "send",
            "--url",
            "https://hooks.example.com",
            "--event",
            "content.published",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_send_needs_url_or_target() {
        let result = Cli::try_parse_from(["cms-bridge", "send", "--event", "content.published"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_transform_preset_and_mapping_conflict() {
        let result = Cli::try_parse_from([
            "cms-bridge",
            "transform",
            "--preset",
            "wordpress",
            "--mapping",
            "mapping.yaml",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_config_format_parses() {
        let cli = parse(&["config", "--show", "--format", "json"]);

        match cli.command {
            Commands::Config { show, format, .. } => {
                assert!(show);
                assert_eq!(format, ConfigFormat::Json);
            }
            _ => panic!("Expected Config command"),
        }
    }
}

mod signatures {
    use super::*;

    #[tokio::test]
    async fn test_sign_prints_hex_digest() {
        let output = execute(parse(&["sign", "--secret", "key", "--data", "payload"]))
            .await
            .unwrap();

        assert_eq!(output, sign(b"payload", "key"));
        assert_eq!(output.len(), 64);
    }

    #[tokio::test]
    async fn test_sign_header_form() {
        let output = execute(parse(&[
            "sign", "--secret", "key", "--data", "payload", "--header",
        ]))
        .await
        .unwrap();

        assert!(output.starts_with("sha256="));
    }

    #[tokio::test]
    async fn test_verify_accepts_matching_signature() {
        let signature = signature_header_value(&sign(b"payload", "key"));

        let output = execute(parse(&[
            "verify",
            "--secret",
            "key",
            "--signature",
            &signature,
            "--data",
            "payload",
        ]))
        .await
        .unwrap();

        assert_eq!(output, "Signature is valid");
    }

    #[tokio::test]
    async fn test_verify_rejects_other_secret() {
        let signature = sign(b"payload", "key");

        let error = execute(parse(&[
            "verify",
            "--secret",
            "other",
            "--signature",
            &signature,
            "--data",
            "payload",
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::VerificationFailed));
        assert_eq!(error.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_data_can_come_from_file() {
        let file = write_yaml("payload");
        let data = format!("@{}", file.path().display());

        let output = execute(parse(&["sign", "--secret", "key", "--data", &data]))
            .await
            .unwrap();

        assert_eq!(output, sign(b"payload", "key"));
    }
}

mod transform {
    use super::*;

    #[tokio::test]
    async fn test_forward_with_preset() {
        let output = execute(parse(&[
            "transform",
            "--preset",
            "wordpress",
            "--data",
            r#"{"id":"abc123","title":"Hello","status":"published"}"#,
        ]))
        .await
        .unwrap();

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["title"], "Hello");
        assert_eq!(json["status"], "publish");
        assert_eq!(json["meta"]["cms_id"], "abc123");
    }

    #[tokio::test]
    async fn test_direction_by_name() {
        let output = execute(parse(&[
            "transform",
            "--preset",
            "wordpress",
            "--direction",
            "wp_to_cms",
            "--data",
            r#"{"meta":{"cms_id":"abc123"},"title":"Hello","status":"publish"}"#,
        ]))
        .await
        .unwrap();

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["id"], "abc123");
        assert_eq!(json["status"], "published");
    }

    #[tokio::test]
    async fn test_unknown_direction_is_transform_error() {
        let error = execute(parse(&[
            "transform",
            "--preset",
            "wordpress",
            "--direction",
            "sideways",
            "--data",
            r#"{"id":"abc123","title":"Hello"}"#,
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::Transform(_)));
        assert_eq!(error.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_argument() {
        let error = execute(parse(&[
            "transform",
            "--preset",
            "wordpress",
            "--data",
            "not json",
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::InvalidArgument { .. }));
        assert_eq!(error.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_missing_mapping_file_is_io_error() {
        let error = execute(parse(&[
            "transform",
            "--mapping",
            "/nonexistent/mapping.yaml",
            "--data",
            "{}",
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::Io(_)));
        assert_eq!(error.exit_code(), 4);
    }
}

mod config {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_valid_without_file() {
        let output = execute(parse(&["config"])).await.unwrap();

        assert_eq!(output, "Configuration is valid");
    }

    #[tokio::test]
    async fn test_show_redacts_secrets() {
        let file = write_yaml(
            r#"
targets:
  primary:
    url: https://hooks.example.com/cms
    secret: s3cret
"#,
        );
        let path = file.path().to_str().unwrap();

        let output = execute(parse(&["config", "--file", path, "--show"]))
            .await
            .unwrap();

        assert!(output.contains("https://hooks.example.com/cms"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_show_as_json() {
        let output = execute(parse(&["config", "--show", "--format", "json"]))
            .await
            .unwrap();

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["server"]["port"], 8080);
    }

    #[tokio::test]
    async fn test_invalid_file_is_configuration_error() {
        let file = write_yaml(
            r#"
delivery:
  max_concurrent: 0
"#,
        );
        let path = file.path().to_str().unwrap();

        let error = execute(parse(&["config", "--file", path])).await.unwrap_err();

        assert!(matches!(error, CliError::Configuration(_)));
        assert_eq!(error.exit_code(), 3);
    }
}

mod send {
    use super::*;

    fn fast_retry_config(max_attempts: u32) -> tempfile::NamedTempFile {
        write_yaml(&format!(
            r#"
retry:
  max_attempts: {}
  base_delay_ms: 10
  max_delay_ms: 100
delivery:
  poll_interval_ms: 10
"#,
            max_attempts
        ))
    }

    #[tokio::test]
    async fn test_send_prints_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("X-CMS-Signature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        let url = format!("{}/hook", server.uri());

        let output = execute(parse(&[
            "send",
            "--url",
            &url,
            "--secret",
            "s3cret",
            "--event",
            "content.published",
            "--data",
            r#"{"id":"abc123","title":"Hello"}"#,
        ]))
        .await
        .unwrap();

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["data"]["ok"], true);
        assert!(json["job_id"].is_string());
    }

    #[tokio::test]
    async fn test_send_to_configured_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        let file = write_yaml(&format!(
            r#"
targets:
  primary:
    url: {}/hook
    secret: s3cret
"#,
            server.uri()
        ));
        let config_path = file.path().to_str().unwrap();

        let output = execute(parse(&[
            "--config",
            config_path,
            "send",
            "--target",
            "primary",
            "--event",
            "content.updated",
            "--data",
            r#"{"id":"abc123"}"#,
        ]))
        .await
        .unwrap();

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["status"], 202);
    }

    #[tokio::test]
    async fn test_send_unknown_target_is_queue_error() {
        let error = execute(parse(&[
            "send",
            "--target",
            "ghost",
            "--event",
            "content.updated",
            "--data",
            r#"{"id":"abc123"}"#,
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::Queue(_)));
        assert_eq!(error.exit_code(), 6);
    }

    #[tokio::test]
    async fn test_send_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        let file = fast_retry_config(2);
        let config_path = file.path().to_str().unwrap();
        let url = format!("{}/hook", server.uri());

        let error = execute(parse(&[
            "--config",
            config_path,
            "send",
            "--url",
            &url,
            "--secret",
            "s3cret",
            "--event",
            "content.published",
            "--data",
            r#"{"id":"abc123"}"#,
        ]))
        .await
        .unwrap_err();

        match error {
            CliError::Delivery(DeliveryError::Exhausted { attempts, .. }) => {
                assert_eq!(attempts, 2)
            }
            other => panic!("Expected exhausted delivery, got {:?}", other),
        }
    }
}

mod sync {
    use super::*;

    fn platform_config(server: &MockServer) -> tempfile::NamedTempFile {
        write_yaml(&format!(
            r#"
platforms:
  blog:
    kind: wordpress
    base_url: {}/api/posts
    preset: wordpress
"#,
            server.uri()
        ))
    }

    #[tokio::test]
    async fn test_sync_creates_missing_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;
        let file = platform_config(&server);
        let config_path = file.path().to_str().unwrap();

        let output = execute(parse(&[
            "--config",
            config_path,
            "sync",
            "--platform",
            "blog",
            "--data",
            r#"{"id":"abc123","title":"Hello","status":"published"}"#,
        ]))
        .await
        .unwrap();

        assert_eq!(output, "created 7");
    }

    #[tokio::test]
    async fn test_sync_delete_removes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/posts/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let file = platform_config(&server);
        let config_path = file.path().to_str().unwrap();

        let output = execute(parse(&[
            "--config",
            config_path,
            "sync",
            "--platform",
            "blog",
            "--delete",
            "--data",
            r#"{"id":"abc123"}"#,
        ]))
        .await
        .unwrap();

        assert_eq!(output, "deleted 7");
    }

    #[tokio::test]
    async fn test_unknown_platform_is_invalid_argument() {
        let error = execute(parse(&[
            "sync",
            "--platform",
            "ghost",
            "--data",
            r#"{"id":"abc123"}"#,
        ]))
        .await
        .unwrap_err();

        assert!(matches!(error, CliError::InvalidArgument { .. }));
    }
}
