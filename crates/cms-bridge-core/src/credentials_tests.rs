//! Tests for webhook target credentials.

use super::*;

mod secret_value_tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let secret = SecretValue::from("super-secret-value");

        let debug = format!("{:?}", secret);

        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("18"));
    }

    #[test]
    fn test_serialization_redacts_secret() {
        let target = WebhookTarget::new("https://example.com/hook", "super-secret-value");

        let json = serde_json::to_string(&target).unwrap();

        assert!(!json.contains("super-secret-value"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn test_deserialization_keeps_secret() {
        let target: WebhookTarget =
            serde_yaml::from_str("url: https://example.com/hook\nsecret: s3cret\n").unwrap();

        assert_eq!(target.secret.expose_secret(), "s3cret");
    }

    #[test]
    fn test_blank_secret_is_empty() {
        assert!(SecretValue::from("   ").is_empty());
        assert!(!SecretValue::from("x").is_empty());
    }

    #[test]
    fn test_equality_compares_contents() {
        assert_eq!(SecretValue::from("abc"), SecretValue::from("abc"));
        assert_ne!(SecretValue::from("abc"), SecretValue::from("abd"));
        assert_ne!(SecretValue::from("abc"), SecretValue::from("abcd"));
    }
}

mod store_tests {
    use super::*;

    fn store() -> InMemoryCredentialStore {
        InMemoryCredentialStore::new()
            .with_target(
                "wordpress",
                WebhookTarget::new("https://wp.example.com/hook", "wp-secret"),
            )
            .with_target(
                "shopify",
                WebhookTarget::new("https://shop.example.com/hook", "shop-secret"),
            )
    }

    #[tokio::test]
    async fn test_resolve_known_target() {
        let target = store().resolve("wordpress").await.unwrap();

        assert_eq!(target.url, "https://wp.example.com/hook");
        assert_eq!(target.secret.expose_secret(), "wp-secret");
    }

    #[tokio::test]
    async fn test_resolve_unknown_target() {
        let error = store().resolve("drupal").await.unwrap_err();

        assert_eq!(
            error,
            CredentialError::NotFound {
                name: "drupal".to_string()
            }
        );
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_secret() {
        let store = InMemoryCredentialStore::new()
            .with_target("broken", WebhookTarget::new("https://x.example.com", ""));

        let error = store.resolve("broken").await.unwrap_err();

        assert!(matches!(error, CredentialError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_url() {
        let store = InMemoryCredentialStore::new().with_target("broken", WebhookTarget::new(" ", "s"));

        let error = store.resolve("broken").await.unwrap_err();

        assert!(matches!(error, CredentialError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_target_names_are_sorted() {
        assert_eq!(store().target_names().await, vec!["shopify", "wordpress"]);
    }

    #[tokio::test]
    async fn test_collect_from_iterator() {
        let store: InMemoryCredentialStore = vec![(
            "drupal".to_string(),
            WebhookTarget::new("https://d.example.com", "d"),
        )]
        .into_iter()
        .collect();

        assert!(store.resolve("drupal").await.is_ok());
    }
}
