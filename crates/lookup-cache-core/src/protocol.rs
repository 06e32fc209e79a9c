//! LLM batch lookup protocol.
//!
//! One batch is a list of words sent together with a system prompt that
//! pins down a strict JSON schema. Words are addressed by their zero-based
//! position in the batch:
//!
//! ```text
//! request:  {"input_language": "...", "definition_language": "...",
//!            "items": [{"id": 0, "word": "..."}, ...]}
//! response: {"items": [{"id": 0, "word": "...", "type": "...",
//!                       "definition": "...", ...}, ...]}
//!           or a bare array of item objects
//! ```
//!
//! Models are sloppy about ids, so [`parse_batch_items`] accepts ids under
//! several keys and in several numeric shapes, falls back to the item's
//! position only when the response has exactly one item per input word, and
//! finally falls back to the item's own `word` field. Items without a word
//! or a definition are dropped.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::models::{LookupCacheEntry, LookupResult, RelatedLanguage};

/// Keys that may carry an item's positional id, in priority order.
const ID_KEYS: &[&str] = &["id", "index", "word_id"];

/// Maximum related-language entries requested per word.
pub const MAX_RELATED_LANGUAGES: usize = 3;

/// Build the system prompt for a batch.
pub fn build_system_prompt(input_language: &str, definition_language: &str) -> String {
    format!(
        r#"You are a bilingual dictionary. For every input word written in {input}, produce a concise dictionary entry written in {definition}.

Respond with a single JSON object and nothing else, using exactly this schema:
{{"items":[{{"id":0,"word":"","type":"","definition":"","part_of_speech":null,"pronunciation":null,"etymology":null,"example":null,"example_translation":null,"example_transliteration":null,"related_languages":[{{"language":"","word":"","transliteration":null}}]}}]}}

Rules:
- Return one item per input word, in the same order as the input, copying its "id" and "word" unchanged.
- "type" is "word", "phrase", "name" or "number".
- "definition" must be in {definition} and must never be empty.
- Words in Arabic or Hebrew must be written with full diacritics in "pronunciation" and "example".
- "example" is a short sentence in {input}; "example_translation" translates it into {definition}; "example_transliteration" romanizes it when {input} uses a non-Latin script.
- "related_languages" lists at most {max_related} cognates or equivalents in related languages.
- Use null for any field you are not certain about. Never invent etymologies, pronunciations or examples."#,
        input = input_language,
        definition = definition_language,
        max_related = MAX_RELATED_LANGUAGES,
    )
}

/// Build the user payload for a batch: words keyed by zero-based position.
pub fn build_user_payload(
    words: &[String],
    input_language: &str,
    definition_language: &str,
) -> Value {
    let items: Vec<Value> = words
        .iter()
        .enumerate()
        .map(|(id, word)| json!({"id": id, "word": word}))
        .collect();
    json!({
        "input_language": input_language,
        "definition_language": definition_language,
        "items": items,
    })
}

/// The item list of a response payload (`{"items": [...]}` or a bare array).
pub fn payload_items(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get("items").and_then(Value::as_array),
        _ => None,
    }
}

/// Payload validator: accept only payloads with a non-empty item list.
pub fn is_valid_payload(payload: &Value) -> bool {
    payload_items(payload)
        .map(|items| !items.is_empty())
        .unwrap_or(false)
}

/// Decode a model's text reply into JSON.
///
/// Tolerates Markdown code fences and prose around the JSON body.
pub fn extract_json_payload(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    // Outermost span first: whichever bracket kind opens earliest.
    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|(open, close)| Some((unfenced.find(*open)?, unfenced.rfind(*close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort();
    spans
        .into_iter()
        .find_map(|(start, end)| serde_json::from_str(&unfenced[start..=end]).ok())
}

/// Resolve an item id given as an integer, an integral float, or a numeric string.
fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn item_id(item: &Value) -> Option<i64> {
    ID_KEYS
        .iter()
        .find_map(|key| item.get(*key).and_then(coerce_id))
}

/// A trimmed, non-empty string field, or `None`.
fn clean_text(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn clean_idioms(item: &Value) -> Option<Vec<String>> {
    let idioms: Vec<String> = match item.get("idioms") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    if idioms.is_empty() {
        None
    } else {
        Some(idioms)
    }
}

fn clean_related_languages(item: &Value) -> Option<Vec<RelatedLanguage>> {
    let related: Vec<RelatedLanguage> = item
        .get("related_languages")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|rel| {
                    Some(RelatedLanguage {
                        language: clean_text(rel, "language")?,
                        word: clean_text(rel, "word")?,
                        transliteration: clean_text(rel, "transliteration"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    if related.is_empty() {
        None
    } else {
        Some(related)
    }
}

/// Build the structured lookup result from one response item.
///
/// Returns `None` when the definition is missing or blank.
pub fn parse_lookup_result(item: &Value) -> Option<LookupResult> {
    let definition = clean_text(item, "definition")?;
    Some(LookupResult {
        kind: clean_text(item, "type").unwrap_or_else(|| "word".to_string()),
        definition,
        part_of_speech: clean_text(item, "part_of_speech"),
        pronunciation: clean_text(item, "pronunciation"),
        etymology: clean_text(item, "etymology"),
        example: clean_text(item, "example"),
        example_translation: clean_text(item, "example_translation"),
        example_transliteration: clean_text(item, "example_transliteration"),
        idioms: clean_idioms(item),
        related_languages: clean_related_languages(item),
    })
}

/// Turn a validated response payload into cache entries keyed by
/// normalized word.
///
/// `words` is the batch input in request order. When two items resolve to
/// the same normalized key the later item overwrites the earlier one.
///
/// TODO: merge non-empty fields of same-key items instead of overwriting.
pub fn parse_batch_items(
    payload: &Value,
    words: &[String],
    input_language: &str,
    definition_language: &str,
) -> BTreeMap<String, LookupCacheEntry> {
    let mut entries = BTreeMap::new();
    let items = match payload_items(payload) {
        Some(items) => items,
        None => return entries,
    };
    let positional = items.len() == words.len();

    for (position, item) in items.iter().enumerate() {
        if !item.is_object() {
            continue;
        }

        let id = item_id(item).or(if positional {
            Some(position as i64)
        } else {
            None
        });

        let word = id
            .filter(|id| *id >= 0 && (*id as usize) < words.len())
            .map(|id| words[id as usize].clone())
            .or_else(|| clean_text(item, "word"));
        let word = match word {
            Some(word) if !word.trim().is_empty() => word,
            _ => continue,
        };

        let result = match parse_lookup_result(item) {
            Some(result) => result,
            None => continue,
        };

        if let Ok(entry) =
            LookupCacheEntry::new(&word, input_language, definition_language, result)
        {
            entries.insert(entry.word_normalized.clone(), entry);
        }
    }

    entries
}
