//! Patch interpreter: path-addressed edits over a JSON document tree.
//!
//! Implements the add/replace/remove/move/copy/test vocabulary over
//! `serde_json::Value`. Paths are slash-delimited with the standard `~1`/`~0`
//! escapes for `/` and `~` in keys, and `-` as the sequence append marker.
//! A batch applies sequentially: operation *i+1* sees the result of
//! operation *i*.
//!
//! Resolution failures (a parent that is not a container, a malformed
//! sequence index, a missing move/copy source) are never raised to the
//! caller. They degrade to a whole-document replace: the raw operation is
//! re-attempted against a clone of the full document and the clone is
//! installed as the new root either way, so observers still see a real
//! structural change instead of a silently skipped frame. Only malformed
//! operations (add/replace without a value, move/copy without a source
//! path) abort a batch, and they do so before any mutation happens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while validating or applying patch operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A non-root path's parent did not resolve to a container.
    #[error("path {0:?} does not resolve inside a container")]
    Resolution(String),
    /// A sequence token was neither a valid index nor the append marker.
    #[error("invalid sequence index {index:?} in path {path:?}")]
    InvalidIndex {
        /// Full path of the failing operation.
        path: String,
        /// The offending token.
        index: String,
    },
    /// A move/copy source path had no value.
    #[error("source path {0:?} has no value")]
    MissingSource(String),
    /// The operation kind requires a value but none was supplied.
    #[error("{0} operation is missing a value")]
    MissingValue(&'static str),
    /// The operation kind requires a source path but none was supplied.
    #[error("{0} operation is missing a source path")]
    MissingFrom(&'static str),
}

/// Operation kind of a [`PatchOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    /// Insert a value, creating map keys and shifting sequence elements.
    Add,
    /// Overwrite the value at the path.
    Replace,
    /// Delete the value at the path.
    Remove,
    /// Relocate the value at `from` to the path.
    Move,
    /// Duplicate the value at `from` to the path.
    Copy,
    /// Assert the value at the path; accepted but never mutates.
    Test,
}

impl PatchKind {
    fn as_str(self) -> &'static str {
        match self {
            PatchKind::Add => "add",
            PatchKind::Replace => "replace",
            PatchKind::Remove => "remove",
            PatchKind::Move => "move",
            PatchKind::Copy => "copy",
            PatchKind::Test => "test",
        }
    }
}

/// A single path-addressed edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// What to do at `path`.
    pub op: PatchKind,
    /// Slash-delimited target path; the empty string addresses the root.
    pub path: String,
    /// Value for add/replace/test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Source path for move/copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Unescape one path token (`~1` → `/`, `~0` → `~`).
///
/// Order matters: `~1` must be replaced before `~0`.
pub fn unescape_token(token: &str) -> String {
    if !token.contains('~') {
        return token.to_string();
    }
    token.replace("~1", "/").replace("~0", "~")
}

/// Escape one path token (`/` → `~1`, `~` → `~0`).
///
/// Order matters: `~` must be escaped before `/`.
pub fn escape_token(token: &str) -> String {
    if !token.contains('/') && !token.contains('~') {
        return token.to_string();
    }
    token.replace('~', "~0").replace('/', "~1")
}

/// Parse a pointer string into path tokens. The empty string is the root.
pub fn parse_pointer(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer[1..].split('/').map(unescape_token).collect()
}

/// Format path tokens back into a pointer string.
pub fn format_pointer(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        out.push('/');
        out.push_str(&escape_token(token));
    }
    out
}

/// Where a token lands inside a sequence.
enum SeqSlot {
    Index(usize),
    Append,
}

fn is_valid_index(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let bytes = token.as_bytes();
    // Leading zeros are not valid indices, except "0" itself.
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

fn seq_slot(token: &str, path: &str) -> Result<SeqSlot, PatchError> {
    if token == "-" {
        return Ok(SeqSlot::Append);
    }
    if !is_valid_index(token) {
        return Err(PatchError::InvalidIndex {
            path: path.to_string(),
            index: token.to_string(),
        });
    }
    token
        .parse()
        .map(SeqSlot::Index)
        .map_err(|_| PatchError::InvalidIndex {
            path: path.to_string(),
            index: token.to_string(),
        })
}

/// Resolve the container holding the final token of `tokens`.
///
/// `tokens` must be non-empty; every intermediate token must land on a
/// container or the resolution fails.
fn resolve_parent<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = doc;
    for token in &tokens[..tokens.len() - 1] {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::Resolution(path.to_string()))?,
            Value::Array(items) => {
                let idx = match seq_slot(token, path)? {
                    SeqSlot::Index(idx) => idx,
                    SeqSlot::Append => return Err(PatchError::Resolution(path.to_string())),
                };
                items
                    .get_mut(idx)
                    .ok_or_else(|| PatchError::Resolution(path.to_string()))?
            }
            _ => return Err(PatchError::Resolution(path.to_string())),
        };
    }
    Ok(current)
}

/// Read the value at `tokens`, if any.
fn value_at<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get(token)?,
            Value::Array(items) => {
                if token == "-" {
                    return None;
                }
                let idx: usize = token.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn insert_value(
    doc: &mut Value,
    path: &str,
    tokens: &[String],
    value: Value,
) -> Result<(), PatchError> {
    let (last, _) = match tokens.split_last() {
        Some(parts) => parts,
        None => {
            // Root add replaces the whole document.
            *doc = value;
            return Ok(());
        }
    };
    let parent = resolve_parent(doc, tokens, path)?;
    match parent {
        Value::Array(items) => match seq_slot(last, path)? {
            SeqSlot::Append => match value {
                // An array value appends element-wise, not as one nested item.
                Value::Array(tail) => items.extend(tail),
                other => items.push(other),
            },
            SeqSlot::Index(idx) => {
                let idx = idx.min(items.len());
                items.insert(idx, value);
            }
        },
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        _ => return Err(PatchError::Resolution(path.to_string())),
    }
    Ok(())
}

fn replace_value(
    doc: &mut Value,
    path: &str,
    tokens: &[String],
    value: Value,
) -> Result<(), PatchError> {
    let (last, _) = match tokens.split_last() {
        Some(parts) => parts,
        None => {
            *doc = value;
            return Ok(());
        }
    };
    let parent = resolve_parent(doc, tokens, path)?;
    match parent {
        Value::Array(items) => {
            let idx = match seq_slot(last, path)? {
                SeqSlot::Index(idx) if idx < items.len() => idx,
                _ => return Err(PatchError::Resolution(path.to_string())),
            };
            items[idx] = value;
        }
        Value::Object(map) => {
            // Delete-then-set: key replacement must read as a structural
            // removal plus addition, not an invisible in-place write.
            map.remove(last);
            map.insert(last.clone(), value);
        }
        _ => return Err(PatchError::Resolution(path.to_string())),
    }
    Ok(())
}

fn remove_value(doc: &mut Value, path: &str, tokens: &[String]) -> Result<(), PatchError> {
    let (last, _) = match tokens.split_last() {
        Some(parts) => parts,
        None => {
            *doc = Value::Null;
            return Ok(());
        }
    };
    let parent = resolve_parent(doc, tokens, path)?;
    match parent {
        Value::Array(items) => match seq_slot(last, path)? {
            SeqSlot::Index(idx) if idx < items.len() => {
                items.remove(idx);
            }
            _ => {
                log::debug!("[Patch] remove at {path:?} targets no element; skipping");
            }
        },
        Value::Object(map) => {
            if map.remove(last).is_none() {
                log::debug!("[Patch] remove at {path:?} targets no key; skipping");
            }
        }
        _ => return Err(PatchError::Resolution(path.to_string())),
    }
    Ok(())
}

/// Reject operations that are structurally incomplete.
///
/// Runs before any mutation so a malformed batch never commits a prefix.
fn validate_op(op: &PatchOp) -> Result<(), PatchError> {
    match op.op {
        PatchKind::Add | PatchKind::Replace if op.value.is_none() => {
            Err(PatchError::MissingValue(op.op.as_str()))
        }
        PatchKind::Move | PatchKind::Copy if op.from.is_none() => {
            Err(PatchError::MissingFrom(op.op.as_str()))
        }
        _ => Ok(()),
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    let tokens = parse_pointer(&op.path);
    match op.op {
        PatchKind::Add => {
            let value = op
                .value
                .clone()
                .ok_or(PatchError::MissingValue("add"))?;
            insert_value(doc, &op.path, &tokens, value)
        }
        PatchKind::Replace => {
            let value = op
                .value
                .clone()
                .ok_or(PatchError::MissingValue("replace"))?;
            replace_value(doc, &op.path, &tokens, value)
        }
        PatchKind::Remove => remove_value(doc, &op.path, &tokens),
        PatchKind::Move => {
            let from = op.from.as_deref().ok_or(PatchError::MissingFrom("move"))?;
            if from == op.path {
                // Aliasing move is a no-op.
                return Ok(());
            }
            let from_tokens = parse_pointer(from);
            // Clone first, delete second, insert third. The clone detaches
            // the moved value from its original storage so later mutation of
            // either location cannot affect the other.
            let value = value_at(doc, &from_tokens)
                .cloned()
                .ok_or_else(|| PatchError::MissingSource(from.to_string()))?;
            remove_value(doc, from, &from_tokens)?;
            insert_value(doc, &op.path, &tokens, value)
        }
        PatchKind::Copy => {
            let from = op.from.as_deref().ok_or(PatchError::MissingFrom("copy"))?;
            let from_tokens = parse_pointer(from);
            let value = value_at(doc, &from_tokens)
                .cloned()
                .ok_or_else(|| PatchError::MissingSource(from.to_string()))?;
            insert_value(doc, &op.path, &tokens, value)
        }
        PatchKind::Test => {
            let actual = value_at(doc, &tokens);
            if actual != op.value.as_ref() {
                log::warn!(
                    "[Patch] test at {:?} failed: expected {:?}, found {:?}",
                    op.path,
                    op.value,
                    actual
                );
            }
            Ok(())
        }
    }
}

/// Re-attempt a failed operation against a clone of the whole document and
/// install the clone as the new root.
///
/// Last-resort safety net for resolution failures: even when the retry on
/// the clone cannot apply the operation, the root swap keeps the failure
/// observable as a structural change instead of a dropped frame.
fn apply_with_fallback(doc: &mut Value, op: &PatchOp) {
    match apply_op(doc, op) {
        Ok(()) => {}
        Err(err) => {
            log::warn!(
                "[Patch] {err}; falling back to whole-document replace for {} at {:?}",
                op.op.as_str(),
                op.path
            );
            let mut next = doc.clone();
            if let Err(retry) = apply_op(&mut next, op) {
                log::warn!("[Patch] fallback left the document unchanged: {retry}");
            }
            *doc = next;
        }
    }
}

/// Apply a batch of operations to `doc`, strictly in sequence.
///
/// The batch is one atomic logical step: malformed operations fail
/// validation up front, before any mutation, so a returned error means the
/// document was not touched. Resolution failures inside individual
/// operations degrade to the whole-document fallback and never abort the
/// batch.
pub fn apply_batch(doc: &mut Value, batch: &[PatchOp]) -> Result<(), PatchError> {
    for op in batch {
        validate_op(op)?;
    }
    for op in batch {
        apply_with_fallback(doc, op);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(kind: PatchKind, path: &str, value: Option<Value>, from: Option<&str>) -> PatchOp {
        PatchOp {
            op: kind,
            path: path.to_string(),
            value,
            from: from.map(str::to_string),
        }
    }

    #[test]
    fn test_token_escapes_round_trip() {
        assert_eq!(unescape_token("a~0b"), "a~b");
        assert_eq!(unescape_token("c~1d"), "c/d");
        assert_eq!(escape_token("a~b"), "a~0b");
        assert_eq!(escape_token("c/d"), "c~1d");
        for pointer in ["", "/foo", "/foo/bar", "/a~0b/c~1d/1", "/"] {
            assert_eq!(format_pointer(&parse_pointer(pointer)), pointer);
        }
    }

    #[test]
    fn test_parse_pointer_root_and_tokens() {
        assert_eq!(parse_pointer(""), Vec::<String>::new());
        assert_eq!(parse_pointer("/"), vec![""]);
        assert_eq!(parse_pointer("/foo/0/-"), vec!["foo", "0", "-"]);
    }

    #[test]
    fn test_replace_scalar_scenario() {
        let mut doc = json!({"count": 0});
        let batch = vec![op(PatchKind::Replace, "/count", Some(json!(5)), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!({"count": 5}));
    }

    #[test]
    fn test_sequence_insert_shifts_right() {
        let mut doc = json!({"items": [1, 2, 3]});
        let batch = vec![op(PatchKind::Add, "/items/1", Some(json!(99)), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!({"items": [1, 99, 2, 3]}));
    }

    #[test]
    fn test_append_marker_concatenates_array_value() {
        let mut doc = json!({"items": [1]});
        let batch = vec![op(PatchKind::Add, "/items/-", Some(json!([2, 3])), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn test_append_marker_single_value() {
        let mut doc = json!({"items": []});
        let batch = vec![op(PatchKind::Add, "/items/-", Some(json!({"x": 1})), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!({"items": [{"x": 1}]}));
    }

    #[test]
    fn test_root_add_discards_prior_content() {
        let mut doc = json!({"a": 1, "b": [2, 3]});
        let batch = vec![op(PatchKind::Add, "", Some(json!({"fresh": true})), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!({"fresh": true}));
    }

    #[test]
    fn test_root_replace_discards_prior_content() {
        let mut doc = json!({"a": 1});
        let batch = vec![op(PatchKind::Replace, "", Some(json!([1, 2])), None)];
        apply_batch(&mut doc, &batch).unwrap();
        assert_eq!(doc, json!([1, 2]));
    }

    #[test]
    fn test_map_add_creates_key() {
        let mut doc = json!({});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Add, "/created", Some(json!(42)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"created": 42}));
    }

    #[test]
    fn test_remove_makes_key_truly_absent() {
        let mut doc = json!({"keep": 1, "drop": 2});
        apply_batch(&mut doc, &[op(PatchKind::Remove, "/drop", None, None)]).unwrap();
        let map = doc.as_object().unwrap();
        assert!(!map.contains_key("drop"));
        assert_eq!(map.get("keep"), Some(&json!(1)));
    }

    #[test]
    fn test_sequence_remove_shifts_left() {
        let mut doc = json!({"items": [1, 2, 3]});
        apply_batch(&mut doc, &[op(PatchKind::Remove, "/items/0", None, None)]).unwrap();
        assert_eq!(doc, json!({"items": [2, 3]}));
    }

    #[test]
    fn test_remove_then_add_equals_replace() {
        let original = json!({"a": {"x": 1}, "b": 2});
        let value = json!({"nested": [true]});

        let mut via_replace = original.clone();
        apply_batch(
            &mut via_replace,
            &[op(PatchKind::Replace, "/a", Some(value.clone()), None)],
        )
        .unwrap();

        let mut via_remove_add = original.clone();
        apply_batch(
            &mut via_remove_add,
            &[
                op(PatchKind::Remove, "/a", None, None),
                op(PatchKind::Add, "/a", Some(value), None),
            ],
        )
        .unwrap();

        assert_eq!(via_replace, via_remove_add);
    }

    #[test]
    fn test_move_between_maps_scenario() {
        let mut doc = json!({"a": {"x": 1}, "b": {}});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Move, "/b/x", None, Some("/a/x"))],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": {}, "b": {"x": 1}}));
    }

    #[test]
    fn test_move_round_trip_restores_document() {
        let original = json!({"a": {"x": [1, 2]}, "b": {}});
        let mut doc = original.clone();
        apply_batch(
            &mut doc,
            &[op(PatchKind::Move, "/b/x", None, Some("/a/x"))],
        )
        .unwrap();
        apply_batch(
            &mut doc,
            &[op(PatchKind::Move, "/a/x", None, Some("/b/x"))],
        )
        .unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_move_to_same_path_is_noop() {
        let original = json!({"items": [1, 2, 3]});
        let mut doc = original.clone();
        apply_batch(
            &mut doc,
            &[op(PatchKind::Move, "/items/1", None, Some("/items/1"))],
        )
        .unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_copy_leaves_source_and_does_not_alias() {
        let mut doc = json!({"src": {"inner": [1]}, "dst": {}});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Copy, "/dst/copy", None, Some("/src"))],
        )
        .unwrap();
        assert_eq!(doc["src"], json!({"inner": [1]}));
        assert_eq!(doc["dst"]["copy"], json!({"inner": [1]}));

        // Mutating the copy must not touch the source.
        apply_batch(
            &mut doc,
            &[op(
                PatchKind::Replace,
                "/dst/copy/inner",
                Some(json!([9, 9])),
                None,
            )],
        )
        .unwrap();
        assert_eq!(doc["src"]["inner"], json!([1]));
        assert_eq!(doc["dst"]["copy"]["inner"], json!([9, 9]));
    }

    #[test]
    fn test_batch_sequential_composition() {
        // Applying one op at a time must equal applying the batch at once.
        let original = json!({"items": [1, 2], "n": 0});
        let batch = vec![
            op(PatchKind::Add, "/items/-", Some(json!([3, 4])), None),
            op(PatchKind::Remove, "/items/0", None, None),
            op(PatchKind::Replace, "/n", Some(json!(7)), None),
            op(PatchKind::Copy, "/copy", None, Some("/items")),
        ];

        let mut at_once = original.clone();
        apply_batch(&mut at_once, &batch).unwrap();

        let mut stepwise = original.clone();
        for single in &batch {
            apply_batch(&mut stepwise, std::slice::from_ref(single)).unwrap();
        }
        assert_eq!(at_once, stepwise);
        assert_eq!(at_once, json!({"items": [2, 3, 4], "n": 7, "copy": [2, 3, 4]}));
    }

    #[test]
    fn test_later_op_sees_earlier_result() {
        let mut doc = json!({});
        apply_batch(
            &mut doc,
            &[
                op(PatchKind::Add, "/list", Some(json!([])), None),
                op(PatchKind::Add, "/list/-", Some(json!(1)), None),
            ],
        )
        .unwrap();
        assert_eq!(doc, json!({"list": [1]}));
    }

    #[test]
    fn test_add_clamps_out_of_range_index() {
        let mut doc = json!({"items": [1]});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Add, "/items/9", Some(json!(2)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"items": [1, 2]}));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let original = json!({"a": 1});
        let mut doc = original.clone();
        apply_batch(&mut doc, &[op(PatchKind::Remove, "/missing", None, None)]).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_root_remove_clears_document() {
        let mut doc = json!({"a": 1});
        apply_batch(&mut doc, &[op(PatchKind::Remove, "", None, None)]).unwrap();
        assert_eq!(doc, Value::Null);
    }

    #[test]
    fn test_test_op_never_fails_batch() {
        let mut doc = json!({"a": 1});
        apply_batch(
            &mut doc,
            &[
                op(PatchKind::Test, "/a", Some(json!(999)), None),
                op(PatchKind::Add, "/b", Some(json!(2)), None),
            ],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_escaped_keys_resolve() {
        let mut doc = json!({"a/b": {"c~d": 1}});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Replace, "/a~1b/c~0d", Some(json!(2)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"a/b": {"c~d": 2}}));
    }

    // --- fallback triggers ---

    #[test]
    fn test_fallback_on_scalar_parent() {
        // The parent of /a/b is the number 1, not a container: the batch
        // must not error and the document must survive as a whole.
        let mut doc = json!({"a": 1});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Add, "/a/b", Some(json!(2)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_fallback_on_missing_intermediate() {
        let mut doc = json!({"a": {}});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Add, "/a/missing/deep", Some(json!(1)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": {}}));
    }

    #[test]
    fn test_fallback_on_bad_sequence_index() {
        let mut doc = json!({"items": [1, 2]});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Add, "/items/not-a-number", Some(json!(3)), None)],
        )
        .unwrap();
        assert_eq!(doc, json!({"items": [1, 2]}));
    }

    #[test]
    fn test_fallback_on_missing_move_source() {
        let mut doc = json!({"a": {}});
        apply_batch(
            &mut doc,
            &[op(PatchKind::Move, "/a/x", None, Some("/ghost"))],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": {}}));
    }

    #[test]
    fn test_fallback_does_not_abort_rest_of_batch() {
        let mut doc = json!({"a": 1});
        apply_batch(
            &mut doc,
            &[
                op(PatchKind::Add, "/a/b", Some(json!(2)), None),
                op(PatchKind::Add, "/c", Some(json!(3)), None),
            ],
        )
        .unwrap();
        assert_eq!(doc, json!({"a": 1, "c": 3}));
    }

    // --- malformed operations are fatal before any mutation ---

    #[test]
    fn test_malformed_add_rejected_without_mutation() {
        let original = json!({"a": 1});
        let mut doc = original.clone();
        let batch = vec![
            op(PatchKind::Add, "/b", Some(json!(2)), None),
            op(PatchKind::Add, "/c", None, None),
        ];
        let err = apply_batch(&mut doc, &batch).unwrap_err();
        assert_eq!(err, PatchError::MissingValue("add"));
        // Validation runs first: the valid prefix was not applied either.
        assert_eq!(doc, original);
    }

    #[test]
    fn test_malformed_move_rejected() {
        let mut doc = json!({});
        let err =
            apply_batch(&mut doc, &[op(PatchKind::Move, "/a", None, None)]).unwrap_err();
        assert_eq!(err, PatchError::MissingFrom("move"));
    }

    #[test]
    fn test_patch_op_wire_shape() {
        let json = r#"{"op":"move","path":"/b/x","from":"/a/x"}"#;
        let parsed: PatchOp = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.op, PatchKind::Move);
        assert_eq!(parsed.path, "/b/x");
        assert_eq!(parsed.from.as_deref(), Some("/a/x"));
        assert!(parsed.value.is_none());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }
}
