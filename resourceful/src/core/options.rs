use axum::http::Method;
use serde::Deserialize;

/// Default page size when a resource does not configure one
pub const DEFAULT_TAKE: u64 = 25;
/// Default cap on `limit`
pub const DEFAULT_MAX_TAKE: u64 = 1000;

/// The five operations a resource serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Detail,
    Create,
    Patch,
    Delete,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::List,
        Self::Detail,
        Self::Create,
        Self::Patch,
        Self::Delete,
    ];

    /// HTTP method the operation is routed under
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::List | Self::Detail => Method::GET,
            Self::Create => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

/// Per-resource configuration.
///
/// Deserializable so it can live in a configuration file; every field has a default.
///
/// ```rust,ignore
/// let options: ResourceOptions = serde_json::from_value(json!({
///     "take": 10,
///     "order": ["-created_at"],
///     "relations": ["author"],
///     "read_only_fields": ["created_at"],
///     "methods": ["list", "detail"],
/// }))?;
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    /// Name used in logs, error messages and the `OpenAPI` document; defaults to the table name
    pub resource_name: Option<String>,
    /// Default page size
    pub take: u64,
    /// Largest page a client may ask for
    pub max_take: u64,
    /// Default ordering, as `field` / `-field` terms; replaced by `order_by`
    pub order: Vec<String>,
    /// Relations loaded into every returned row
    pub relations: Vec<String>,
    /// Fields kept in responses; empty keeps all
    pub select: Vec<String>,
    /// When non-empty, the only body keys a patch may change
    pub updatable_fields: Vec<String>,
    /// Body keys a patch never changes
    pub read_only_fields: Vec<String>,
    /// Extra query keys skipped by the filter parser
    pub extra_special_keys: Vec<String>,
    /// Operations served; the rest answer `BadMethod`
    pub methods: Vec<Operation>,
    /// Scheme and host prefixed to `next`/`prev` links, e.g. `https://api.example.com`
    pub base_url: String,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            resource_name: None,
            take: DEFAULT_TAKE,
            max_take: DEFAULT_MAX_TAKE,
            order: Vec::new(),
            relations: Vec::new(),
            select: Vec::new(),
            updatable_fields: Vec::new(),
            read_only_fields: Vec::new(),
            extra_special_keys: Vec::new(),
            methods: Operation::ALL.to_vec(),
            base_url: String::new(),
        }
    }
}

impl ResourceOptions {
    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.methods.contains(&operation)
    }

    /// Whether a patch may write `field`
    #[must_use]
    pub fn is_updatable(&self, field: &str) -> bool {
        let allowed =
            self.updatable_fields.is_empty() || self.updatable_fields.iter().any(|f| f == field);
        allowed && !self.read_only_fields.iter().any(|f| f == field)
    }

    /// Query keys that are never filters
    pub fn special_keys(&self) -> impl Iterator<Item = &str> {
        crate::filtering::SPECIAL_QUERY_KEYS
            .into_iter()
            .chain(self.extra_special_keys.iter().map(String::as_str))
    }

    #[must_use]
    pub fn is_special_key(&self, key: &str) -> bool {
        self.special_keys().any(|special| special == key)
    }
}
