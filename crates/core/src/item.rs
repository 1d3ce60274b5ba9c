use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How an item obtains the data it renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Rendered from a declared (or legacy) data source that may need a fetch.
    #[default]
    Renderer,
    /// Imported from another bundle; opaque, never prefetched.
    Imported,
    /// Carries everything it needs inline.
    Static,
}

impl ItemKind {
    /// Whether items of this kind skip data-source derivation entirely.
    pub fn is_self_contained(self) -> bool {
        matches!(self, ItemKind::Imported | ItemKind::Static)
    }
}

/// Coarse size class used by placement to interleave small tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Minor,
    #[default]
    Regular,
    Important,
    Major,
}

/// Request options attached to a [`DataSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceOptions {
    /// Values substituted into `{name}` placeholders of the URL template.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub path_variables: Map<String, Value>,
    /// Query parameters appended after template expansion.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub request_params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
}

/// Declarative description of the fetch an item needs before it is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// URL template, e.g. `/api/v1/users/{userId}/absences`.
    pub url: String,
    /// HTTP method; `get` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub options: DataSourceOptions,
}

impl DataSource {
    /// Method in upper case, defaulting to GET.
    pub fn method_or_default(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.trim().to_uppercase())
            .unwrap_or_else(|| "GET".to_string())
    }
}

/// A content block in the feed. Owned by the caller; never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable identifier.
    pub id: String,
    /// Category-discriminating code, e.g. `absences:vacations`.
    pub code: String,
    #[serde(default, rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub size: SizeClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    /// Free-form render configuration. May carry legacy `triggers.onMount` requests.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Item {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            kind: ItemKind::default(),
            size: SizeClass::default(),
            data_source: None,
            body: Value::Null,
        }
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size = size;
        self
    }

    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// `id:code`, the unit of generation identity.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.id, self.code)
    }
}

/// An item that passed resolution and may be shown.
///
/// When `data` is present it was prefetched and validated; the item's
/// data source is cleared so the renderer does not fetch a second time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedItem {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl FinalizedItem {
    /// Finalize without attached data: the renderer fetches on its own.
    pub fn unfetched(item: &Item) -> Self {
        Self {
            item: item.clone(),
            data: None,
        }
    }

    /// Finalize with prefetched data, replacing the item's body.
    pub fn prefetched(item: &Item, body: Value, data: Value) -> Self {
        let mut derived = item.clone();
        derived.data_source = None;
        derived.body = body;
        Self {
            item: derived,
            data: Some(data),
        }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn is_prefetched(&self) -> bool {
        self.data.is_some()
    }
}
