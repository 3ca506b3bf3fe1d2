//! Ordered field aliases for upstream payloads whose key names drift between
//! integrations ("results" or "entreprises", "adresse" or "adresse_complete", ...).

use serde_json::Value;

/// Accepted keys for one logical field, tried in order. A key may be a dotted
/// path into nested objects (`siege.adresse`).
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases(pub &'static [&'static str]);

pub const RESULT_LIST: FieldAliases = FieldAliases(&["results", "entreprises"]);
pub const SIREN: FieldAliases = FieldAliases(&["siren"]);
pub const NAME: FieldAliases = FieldAliases(&[
    "denomination",
    "nom_complet",
    "nom",
    "nom_raison_sociale",
]);
pub const ADDRESS: FieldAliases =
    FieldAliases(&["adresse", "adresse_complete", "siege.adresse"]);
pub const LOCALITY: FieldAliases =
    FieldAliases(&["ville", "commune", "siege.libelle_commune"]);

impl FieldAliases {
    /// First alias whose value is present and not null.
    pub fn value<'a>(&self, object: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .filter_map(|alias| lookup(object, alias))
            .find(|v| !v.is_null())
    }

    /// First alias holding a non-blank string (numbers are rendered as text).
    pub fn text(&self, object: &Value) -> Option<String> {
        self.0.iter().find_map(|alias| {
            let text = match lookup(object, alias)? {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            (!text.is_empty()).then_some(text)
        })
    }

    /// First alias holding a boolean.
    pub fn flag(&self, object: &Value) -> Option<bool> {
        self.0
            .iter()
            .find_map(|alias| lookup(object, alias).and_then(Value::as_bool))
    }

    /// First alias holding a non-empty array; an empty list when none does.
    pub fn list<'a>(&self, object: &'a Value) -> &'a [Value] {
        self.0
            .iter()
            .filter_map(|alias| lookup(object, alias).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn lookup<'a>(object: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(object, |current, key| current.get(key))
}
