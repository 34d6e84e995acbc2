//! Built-in mappings for the platforms the bridge ships adapters for.
//!
//! CMS documents use camelCase keys (`publishedAt`, `featuredImage.url`) and
//! RFC 3339 timestamps. Each preset stores the CMS identifier somewhere the
//! platform lets integrations keep metadata, which is what the sync
//! orchestrator looks records up by.

use super::{FieldRule, StatusTable, TransformError, TransformMapping};

/// Names accepted by [`by_name`]
pub const PRESET_NAMES: &[&str] = &["wordpress", "shopify", "drupal"];

/// Look up a preset by name
pub fn by_name(name: &str) -> Result<TransformMapping, TransformError> {
    match name.to_ascii_lowercase().as_str() {
        "wordpress" | "wp" => Ok(wordpress()),
        "shopify" => Ok(shopify()),
        "drupal" => Ok(drupal()),
        _ => Err(TransformError::UnknownPreset {
            name: name.to_string(),
        }),
    }
}

/// WordPress REST API posts (`/wp/v2/posts`)
pub fn wordpress() -> TransformMapping {
    TransformMapping::new("wordpress", "cms_to_wp", "wp_to_cms")
        .with_rule(FieldRule::new("id", "meta.cms_id"))
        .with_rule(FieldRule::new("title", "title"))
        .with_rule(FieldRule::new("body", "content"))
        .with_rule(FieldRule::new("summary", "excerpt"))
        .with_rule(FieldRule::new("slug", "slug"))
        .with_rule(FieldRule::status("status", "status"))
        .with_rule(FieldRule::datetime("publishedAt", "date_gmt", "%Y-%m-%dT%H:%M:%S%.f"))
        .with_rule(FieldRule::new("featuredImage.url", "meta.featured_image_url"))
        .with_rule(FieldRule::new("author.name", "meta.author_name"))
        .with_rule(FieldRule::new("seo.description", "meta.seo_description"))
        .with_status_table(StatusTable::from_pairs([
            ("published", "publish"),
            ("draft", "draft"),
            ("scheduled", "future"),
            ("review", "pending"),
            ("archived", "private"),
        ]))
        .with_required("title", "title")
}

/// Shopify Admin REST API articles
pub fn shopify() -> TransformMapping {
    TransformMapping::new("shopify", "cms_to_shopify", "shopify_to_cms")
        .with_rule(FieldRule::new("id", "metafields.cms.id"))
        .with_rule(FieldRule::new("title", "title"))
        .with_rule(FieldRule::new("body", "body_html"))
        .with_rule(FieldRule::new("summary", "summary_html"))
        .with_rule(FieldRule::new("slug", "handle"))
        .with_rule(FieldRule::new("tags", "tags"))
        .with_rule(FieldRule::new("author.name", "author"))
        .with_rule(FieldRule::status("status", "status"))
        .with_rule(FieldRule::datetime(
            "publishedAt",
            "published_at",
            "%Y-%m-%dT%H:%M:%S%.f%:z",
        ))
        .with_rule(FieldRule::new("featuredImage.url", "image.src"))
        .with_status_table(StatusTable::from_pairs([
            ("published", "active"),
            ("draft", "draft"),
            ("archived", "archived"),
        ]))
        .with_required("title", "title")
}

/// Drupal JSON:API `node--article` resources
pub fn drupal() -> TransformMapping {
    TransformMapping::new("drupal", "cms_to_drupal", "drupal_to_cms")
        .with_rule(FieldRule::new("id", "attributes.field_cms_id"))
        .with_rule(FieldRule::new("title", "attributes.title"))
        .with_rule(FieldRule::new("body", "attributes.body.value"))
        .with_rule(FieldRule::new("summary", "attributes.body.summary"))
        .with_rule(FieldRule::new("slug", "attributes.path.alias"))
        .with_rule(FieldRule::status("status", "attributes.moderation_state"))
        .with_rule(FieldRule::datetime(
            "publishedAt",
            "attributes.created",
            "%Y-%m-%dT%H:%M:%S%.f%:z",
        ))
        .with_status_table(StatusTable::from_pairs([
            ("published", "published"),
            ("draft", "draft"),
            ("review", "needs_review"),
            ("archived", "archived"),
        ]))
        .with_required("attributes.title", "title")
}
