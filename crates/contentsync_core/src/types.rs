//! Well-known collection and field names.

/// The primary document collection.
pub const DOCS_COLLECTION: &str = "docs";

/// The attachment metadata collection.
pub const ATTACHMENTS_COLLECTION: &str = "attachments";

/// Prefix of database-internal collections, never replicated.
pub const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Document id field.
pub const ID_FIELD: &str = "_id";

/// Document type field.
pub const TYPE_FIELD: &str = "type";

/// Slug field, unique per workflow locale.
pub const SLUG_FIELD: &str = "slug";

/// Draft/live locale tag.
pub const WORKFLOW_LOCALE_FIELD: &str = "workflowLocale";

/// Identity shared by all locale variants of one logical document.
pub const WORKFLOW_GUID_FIELD: &str = "workflowGuid";

/// Page-tree path; present only on hierarchical pages.
pub const PATH_FIELD: &str = "path";

/// Suffix distinguishing a draft locale from its live counterpart.
pub const DRAFT_SUFFIX: &str = "-draft";

/// Returns the paired draft/live locale for `locale`.
///
/// `en` pairs with `en-draft` and vice versa.
pub fn paired_locale(locale: &str) -> String {
    match locale.strip_suffix(DRAFT_SUFFIX) {
        Some(live) => live.to_string(),
        None => format!("{locale}{DRAFT_SUFFIX}"),
    }
}
