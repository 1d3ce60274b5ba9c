//! Data-source derivation, including the legacy `triggers.onMount` form.

use serde_json::{Map, Value};

use feedshelf_core::{DataSource, DataSourceOptions, Item};

/// A fetch descriptor plus the body a prefetched item should carry.
///
/// For legacy items the body has the migrated request removed so the
/// renderer does not repeat it on mount.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSource {
    pub source: DataSource,
    pub body: Value,
}

/// Derive the fetch descriptor for an item, if it has one.
pub fn derive_data_source(item: &Item) -> Option<DerivedSource> {
    if let Some(source) = &item.data_source {
        return Some(DerivedSource {
            source: source.clone(),
            body: item.body.clone(),
        });
    }
    migrate_legacy_trigger(&item.body)
}

/// Lift the first `http.*` action out of `body.triggers.onMount.action`.
pub fn migrate_legacy_trigger(body: &Value) -> Option<DerivedSource> {
    let actions = body.pointer("/triggers/onMount/action")?.as_array()?;
    let index = actions.iter().position(|action| {
        action
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| kind.starts_with("http."))
    })?;
    let action = &actions[index];

    let method = action
        .get("type")
        .and_then(Value::as_str)
        .and_then(|kind| kind.split('.').nth(1))
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let url = action.get("url").and_then(Value::as_str)?.to_string();

    let options = DataSourceOptions {
        path_variables: object_or_empty(action.get("pathVariables")),
        request_params: object_or_empty(action.get("params")),
        headers: object_or_empty(action.get("headers")),
        request_body: action.get("body").filter(|b| !b.is_null()).cloned(),
    };

    let mut stripped = body.clone();
    strip_action(&mut stripped, index);

    Some(DerivedSource {
        source: DataSource { url, method, options },
        body: stripped,
    })
}

fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

/// Remove the migrated action and prune `onMount`/`triggers` left empty.
fn strip_action(body: &mut Value, index: usize) {
    let Some(triggers) = body.get_mut("triggers").and_then(Value::as_object_mut) else {
        return;
    };
    let on_mount_drained = match triggers
        .get_mut("onMount")
        .and_then(|on_mount| on_mount.get_mut("action"))
        .and_then(Value::as_array_mut)
    {
        Some(actions) => {
            actions.remove(index);
            actions.is_empty()
        }
        None => false,
    };
    if on_mount_drained {
        triggers.remove("onMount");
        if triggers.is_empty() {
            if let Some(fields) = body.as_object_mut() {
                fields.remove("triggers");
            }
        }
    }
}
