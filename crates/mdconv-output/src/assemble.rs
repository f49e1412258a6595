//! Merging directive outputs into one ordered output tree.

use mdconv_directives::DirectiveOutput;
use mdconv_validate::ValueKind;
use serde_json::{Map, Value};
use tracing::debug;

use crate::format::Layout;

/// Merge `outputs` into `tree[table][name]`, with `section` outputs becoming
/// `tree[table]` itself, then apply `layout`.
///
/// Tables only appear once something was produced for them.
pub fn assemble(outputs: &[DirectiveOutput], layout: &Layout) -> Value {
    let mut tree: Map<String, Value> = Map::new();
    for output in outputs {
        let table = &output.key.table;
        match output.kind {
            ValueKind::Section => {
                tree.insert(table.clone(), output.value.clone());
            }
            ValueKind::Str | ValueKind::Matrix => {
                let entry = tree
                    .entry(table.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(section) = entry {
                    section.insert(output.key.name.clone(), output.value.clone());
                }
            }
        }
    }

    let mut ordered = order_keys(tree, &layout.section_order);
    for (section, value) in &mut ordered {
        let leading = layout.leading_keys(section);
        if !leading.is_empty()
            && let Value::Object(fields) = value
        {
            *fields = order_keys(std::mem::take(fields), leading);
        }
    }
    debug!(sections = ordered.len(), "assembled output tree");

    match layout.root {
        Some(root) => into_root(ordered, root),
        None => Value::Object(ordered),
    }
}

/// `keys` first in the given order, then the remaining entries as they were.
fn order_keys(mut map: Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut ordered = Map::with_capacity(map.len());
    for key in keys {
        if let Some(value) = map.shift_remove(*key) {
            ordered.insert((*key).to_string(), value);
        }
    }
    ordered.extend(map);
    ordered
}

fn into_root(mut sections: Map<String, Value>, root: &str) -> Value {
    if !matches!(sections.get(root), Some(Value::Object(_))) {
        return Value::Object(sections);
    }
    let Some(Value::Object(mut document)) = sections.shift_remove(root) else {
        return Value::Object(sections);
    };
    for (name, value) in sections {
        document.insert(name, value);
    }
    Value::Object(document)
}
