//! Tests for platform error normalization.

use super::*;
use serde_json::json;

mod normalize_tests {
    use super::*;

    #[test]
    fn test_wordpress_message_is_extracted() {
        let body = r#"{"code":"rest_post_invalid_id","message":"Invalid post ID.","data":{"status":404}}"#;

        let error = normalize_http_error(PlatformKind::WordPress, 404, body);

        assert_eq!(error.message, "Invalid post ID.");
        assert_eq!(error.kind, PlatformErrorKind::Http { status: 404 });
        assert_eq!(error.raw.as_ref().and_then(|r| r.get("code")), Some(&json!("rest_post_invalid_id")));
    }

    #[test]
    fn test_shopify_string_errors() {
        let error = normalize_http_error(PlatformKind::Shopify, 404, r#"{"errors":"Not Found"}"#);

        assert_eq!(error.message, "Not Found");
    }

    #[test]
    fn test_shopify_field_errors_are_joined() {
        let body = r#"{"errors":{"title":["can't be blank"],"handle":["has already been taken"]}}"#;

        let error = normalize_http_error(PlatformKind::Shopify, 422, body);

        assert!(error.message.contains("title can't be blank"));
        assert!(error.message.contains("handle has already been taken"));
        assert_eq!(error.message.matches("; ").count(), 1);
    }

    #[test]
    fn test_drupal_prefers_detail_over_title() {
        let body = r#"{"errors":[{"title":"Unprocessable Entity","detail":"title: This value should not be null."},{"title":"Forbidden"}]}"#;

        let error = normalize_http_error(PlatformKind::Drupal, 422, body);

        assert_eq!(
            error.message,
            "title: This value should not be null.; Forbidden"
        );
    }

    #[test]
    fn test_facebook_nested_error_message() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;

        let error = normalize_http_error(PlatformKind::Facebook, 400, body);

        assert_eq!(error.message, "Invalid OAuth access token.");
    }

    #[test]
    fn test_linkedin_message() {
        let body = r#"{"message":"Empty oauth2_access_token","status":401,"serviceErrorCode":65600}"#;

        let error = normalize_http_error(PlatformKind::LinkedIn, 401, body);

        assert_eq!(error.message, "Empty oauth2_access_token");
    }

    #[test]
    fn test_generic_falls_back_through_common_shapes() {
        let nested = normalize_http_error(PlatformKind::Generic, 500, r#"{"error":{"message":"boom"}}"#);
        let flat = normalize_http_error(PlatformKind::Generic, 500, r#"{"error":"flat boom"}"#);
        let detail = normalize_http_error(PlatformKind::Generic, 500, r#"{"detail":"detail boom"}"#);

        assert_eq!(nested.message, "boom");
        assert_eq!(flat.message, "flat boom");
        assert_eq!(detail.message, "detail boom");
    }

    #[test]
    fn test_platform_specific_shape_missing_uses_generic_fallback() {
        let error = normalize_http_error(PlatformKind::Drupal, 500, r#"{"message":"Server exploded"}"#);

        assert_eq!(error.message, "Server exploded");
    }

    #[test]
    fn test_non_json_body_is_used_verbatim() {
        let error = normalize_http_error(PlatformKind::WordPress, 502, "  Bad Gateway\n");

        assert_eq!(error.message, "Bad Gateway");
        assert!(error.raw.is_none());
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2000);

        let error = normalize_http_error(PlatformKind::Generic, 500, &body);

        assert_eq!(error.message.chars().count(), 515);
        assert!(error.message.ends_with("..."));
    }

    #[test]
    fn test_empty_body_reports_status() {
        let error = normalize_http_error(PlatformKind::Shopify, 503, "");

        assert_eq!(error.message, "request failed with status 503");
    }

    #[test]
    fn test_display_includes_platform_and_status() {
        let error = normalize_http_error(PlatformKind::Shopify, 404, r#"{"errors":"Not Found"}"#);

        assert_eq!(error.to_string(), "shopify HTTP 404: Not Found");
    }
}

mod classification_tests {
    use super::*;

    fn http(status: u16) -> PlatformError {
        normalize_http_error(PlatformKind::Generic, status, "")
    }

    #[test]
    fn test_not_found_statuses() {
        assert!(http(404).is_not_found());
        assert!(http(410).is_not_found());
        assert!(!http(400).is_not_found());
        assert!(!PlatformError::network(PlatformKind::Generic, "refused").is_not_found());
    }

    #[test]
    fn test_conflict_status() {
        assert!(http(409).is_conflict());
        assert!(!http(404).is_conflict());
    }

    #[test]
    fn test_transient_classification() {
        assert!(PlatformError::network(PlatformKind::WordPress, "connection reset").is_transient());
        assert!(http(408).is_transient());
        assert!(http(429).is_transient());
        assert!(http(500).is_transient());
        assert!(http(503).is_transient());

        assert!(!http(400).is_transient());
        assert!(!http(404).is_transient());
        assert!(!PlatformError::validation(PlatformKind::Shopify, "bad").is_transient());
    }

    #[test]
    fn test_status_only_for_http_kind() {
        assert_eq!(http(418).status(), Some(418));
        assert_eq!(PlatformError::network(PlatformKind::Generic, "x").status(), None);
    }
}

mod platform_kind_tests {
    use super::*;

    #[test]
    fn test_parse_accepts_aliases_case_insensitively() {
        assert_eq!("WordPress".parse::<PlatformKind>().unwrap(), PlatformKind::WordPress);
        assert_eq!("wp".parse::<PlatformKind>().unwrap(), PlatformKind::WordPress);
        assert_eq!("fb".parse::<PlatformKind>().unwrap(), PlatformKind::Facebook);
        assert_eq!("LINKEDIN".parse::<PlatformKind>().unwrap(), PlatformKind::LinkedIn);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("optimizely".parse::<PlatformKind>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [
            PlatformKind::WordPress,
            PlatformKind::Shopify,
            PlatformKind::Drupal,
            PlatformKind::Facebook,
            PlatformKind::LinkedIn,
            PlatformKind::Generic,
        ] {
            assert_eq!(kind.to_string().parse::<PlatformKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PlatformKind::WordPress).unwrap();
        assert_eq!(json, "\"wordpress\"");
    }
}
