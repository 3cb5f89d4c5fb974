//! YAML fixture and schema documents.
//!
//! Documents are written in block style. Multi-line strings become literal
//! block scalars with an explicit indentation indicator, so padded blank
//! lines and trailing spaces in queries survive without escapes.

use serde_yaml::{Mapping, Value};

use crate::error::HarvestError;
use crate::harness::FixtureRecord;

/// Content of a literal block sits this many columns past its parent node.
const BLOCK_INDENT: usize = 2;

/// A rendered fixture document and the records left out of it.
#[derive(Debug)]
pub struct FixtureDocument {
    pub yaml: String,
    pub written: usize,
    pub dropped: Vec<HarvestError>,
}

/// Serializes records in order. A record holding a value YAML cannot encode
/// (a function, a stand-in, a schema handle) is dropped and reported; the
/// rest of the document is still produced.
pub fn render_fixtures(file: &str, records: &[FixtureRecord]) -> FixtureDocument {
    let mut values = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();
    for record in records {
        match serde_yaml::to_value(record) {
            Ok(value) => values.push(value),
            Err(err) => {
                let failure = HarvestError::UnrepresentableRecord {
                    name: record.name.clone(),
                    reason: err.to_string(),
                };
                let code = failure.code();
                tracing::warn!(
                    file,
                    code = %code,
                    category = code.category(),
                    error = %failure,
                    "dropping fixture"
                );
                dropped.push(failure);
            }
        }
    }
    let written = values.len();
    let yaml = to_block_yaml(&Value::Sequence(values));
    FixtureDocument {
        yaml,
        written,
        dropped,
    }
}

/// The schema document: one entry per registry slot, `null` for schemas the
/// printer rejected.
pub fn render_schemas(slots: &[Option<String>]) -> String {
    let entries = slots
        .iter()
        .map(|slot| match slot {
            Some(sdl) => Value::String(sdl.clone()),
            None => Value::Null,
        })
        .collect();
    to_block_yaml(&Value::Sequence(entries))
}

/// Renders a document root in block style.
fn to_block_yaml(value: &Value) -> String {
    let mut writer = BlockWriter::default();
    match value {
        Value::Sequence(items) if !items.is_empty() => writer.sequence(items, 0, false),
        Value::Mapping(map) if !map.is_empty() => writer.mapping(map, 0, false),
        other => {
            let text = writer.inline_text(other);
            writer.out.push_str(text.trim_start());
            writer.out.push('\n');
        }
    }
    writer.out
}

#[derive(Default)]
struct BlockWriter {
    out: String,
}

impl BlockWriter {
    fn indent(&mut self, column: usize) {
        self.out.extend(std::iter::repeat_n(' ', column));
    }

    /// Entries start at `column`; with `continues_line` the first entry
    /// follows an indicator already on the current line.
    fn sequence(&mut self, items: &[Value], column: usize, continues_line: bool) {
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 || !continues_line {
                self.indent(column);
            }
            self.out.push('-');
            match item {
                Value::Sequence(inner) if !inner.is_empty() => {
                    self.out.push(' ');
                    self.sequence(inner, column + 2, true);
                }
                Value::Mapping(map) if !map.is_empty() => {
                    self.out.push(' ');
                    self.mapping(map, column + 2, true);
                }
                other => self.scalar(other, column),
            }
        }
    }

    fn mapping(&mut self, map: &Mapping, column: usize, continues_line: bool) {
        for (idx, (key, value)) in map.iter().enumerate() {
            if idx > 0 || !continues_line {
                self.indent(column);
            }
            let key = self.inline_text(key);
            self.out.push_str(key.trim_start());
            self.out.push(':');
            match value {
                Value::Sequence(items) if !items.is_empty() => {
                    self.out.push('\n');
                    self.sequence(items, column + 2, false);
                }
                Value::Mapping(inner) if !inner.is_empty() => {
                    self.out.push('\n');
                    self.mapping(inner, column + 2, false);
                }
                other => self.scalar(other, column),
            }
        }
    }

    /// Writes a scalar after an indicator whose node sits at `column`.
    fn scalar(&mut self, value: &Value, column: usize) {
        match value {
            Value::String(text) if fits_literal_block(text) => self.literal(text, column),
            other => {
                let text = self.inline_text(other);
                self.out.push_str(&text);
                self.out.push('\n');
            }
        }
    }

    fn literal(&mut self, text: &str, column: usize) {
        let (body, chomp) = match text.strip_suffix('\n') {
            Some(body) if body.is_empty() || body.ends_with('\n') => (body, "+"),
            Some(body) => (body, ""),
            None => (text, "-"),
        };
        self.out.push_str(&format!(" |{BLOCK_INDENT}{chomp}\n"));
        for line in body.split('\n') {
            if !line.is_empty() {
                self.indent(column + BLOCK_INDENT);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    /// Single-line form with its leading separator.
    fn inline_text(&self, value: &Value) -> String {
        match value {
            Value::Null => " null".to_string(),
            Value::Bool(flag) => format!(" {flag}"),
            Value::Number(number) => format!(" {number}"),
            Value::String(text) => format!(" {}", quote(text)),
            Value::Sequence(_) => " []".to_string(),
            Value::Mapping(_) => " {}".to_string(),
            Value::Tagged(tagged) => self.inline_text(&tagged.value),
        }
    }
}

/// Literal blocks hold printable text only; a carriage return or other
/// control character would not read back unchanged.
fn fits_literal_block(text: &str) -> bool {
    text.contains('\n')
        && text.chars().all(|c| {
            c == '\n' || c == '\t' || !(c.is_control() || matches!(c, '\u{feff}' | '\u{2028}' | '\u{2029}'))
        })
}

const RESERVED_WORDS: &[&str] = &[
    "true", "false", "null", "yes", "no", "on", "off", "y", "n",
];

fn quote(text: &str) -> String {
    if is_plain_safe(text) {
        return text.to_string();
    }
    let printable = text.chars().all(|c| {
        !(c.is_control() || matches!(c, '\u{feff}' | '\u{2028}' | '\u{2029}'))
    });
    if printable {
        format!("'{}'", text.replace('\'', "''"))
    } else {
        double_quoted(text)
    }
}

fn is_plain_safe(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '.' | ',' | '(' | ')' | '/' | '-'))
        && !text.ends_with(' ')
        && !RESERVED_WORDS.iter().any(|word| text.eq_ignore_ascii_case(word))
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || matches!(c, '\u{feff}' | '\u{2028}' | '\u{2029}') => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Output name for a test source: `KnownTypeNamesRule-test.ts` becomes
/// `KnownTypeNamesRule.spec.yml`.
pub fn fixture_file_name(source: &str, test_suffix: &str, fixture_suffix: &str) -> String {
    match source.strip_suffix(test_suffix) {
        Some(stem) => format!("{stem}{fixture_suffix}"),
        None => source.replacen(test_suffix, fixture_suffix, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::ErrorDescriptor;
    use crate::script::{ObjectMap, Value};
    use std::rc::Rc;

    fn record(name: &str, errors: Vec<ErrorDescriptor>) -> FixtureRecord {
        FixtureRecord {
            name: name.to_string(),
            rule: "Example".to_string(),
            schema: 0,
            query: "{ a }".to_string(),
            errors,
        }
    }

    #[test]
    fn test_record_key_order() {
        let doc = render_fixtures("Example-test.ts", &[record("passes", vec![])]);
        assert_eq!(doc.written, 1);
        let name = doc.yaml.find("name:").unwrap();
        let rule = doc.yaml.find("rule:").unwrap();
        let schema = doc.yaml.find("schema:").unwrap();
        let query = doc.yaml.find("query:").unwrap();
        let errors = doc.yaml.find("errors:").unwrap();
        assert!(name < rule && rule < schema && schema < query && query < errors);
    }

    #[test]
    fn test_unrepresentable_record_is_dropped() {
        let mut error = ObjectMap::new();
        error.insert("message".to_string(), Value::str("bad"));
        error.insert("rule".to_string(), Value::Rule(Rc::from("OopsRule")));
        let records = vec![
            record("first", vec![]),
            record("broken", vec![ErrorDescriptor(Value::object(error))]),
            record("last", vec![]),
        ];

        let doc = render_fixtures("Example-test.ts", &records);
        assert_eq!(doc.written, 2);
        assert_eq!(doc.dropped.len(), 1);
        assert!(matches!(
            &doc.dropped[0],
            HarvestError::UnrepresentableRecord { name, .. } if name == "broken"
        ));
        assert!(!doc.dropped[0].code().is_fatal());
        let parsed: Vec<serde_yaml::Value> = serde_yaml::from_str(&doc.yaml).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["name"], serde_yaml::Value::from("last"));
    }

    #[test]
    fn test_schema_document_keeps_null_slots() {
        let yaml = render_schemas(&[Some("type Query { a: String }".into()), None, Some(String::new())]);
        let parsed: Vec<Option<String>> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed,
            vec![Some("type Query { a: String }".to_string()), None, Some(String::new())]
        );
    }

    #[test]
    fn test_padded_query_is_a_literal_block() {
        let mut padded = record("padded", vec![]);
        padded.query = "\n      {\n        dog { name }\n      \n      }\n      ".to_string();
        let doc = render_fixtures("Example-test.ts", &[padded.clone()]);

        assert!(doc.yaml.contains("  query: |2-\n"), "{}", doc.yaml);
        assert!(doc.yaml.contains("\n            dog { name }\n"), "{}", doc.yaml);
        assert!(!doc.yaml.contains("\\n"), "{}", doc.yaml);
        let parsed: Vec<serde_yaml::Value> = serde_yaml::from_str(&doc.yaml).unwrap();
        assert_eq!(parsed[0]["query"], serde_yaml::Value::from(padded.query));
    }

    #[test]
    fn test_literal_blocks_keep_trailing_newlines() {
        let texts = [
            "a\n",
            "a\n\n",
            "\n",
            "  indented first\nsecond",
            "tab\there\n  \n",
        ];
        for text in texts {
            let mut rec = record("chomping", vec![]);
            rec.query = text.to_string();
            let doc = render_fixtures("Example-test.ts", &[rec]);
            assert!(doc.yaml.contains("query: |2"), "{text:?}: {}", doc.yaml);
            let parsed: Vec<serde_yaml::Value> = serde_yaml::from_str(&doc.yaml).unwrap();
            assert_eq!(parsed[0]["query"], serde_yaml::Value::from(text), "{}", doc.yaml);
        }
    }

    #[test]
    fn test_scalars_that_need_quotes() {
        let mut error = ObjectMap::new();
        error.insert("message".to_string(), Value::str("Unknown type \"Dog\"."));
        error.insert("hint".to_string(), Value::str("it's: #1"));
        error.insert("word".to_string(), Value::str("yes"));
        error.insert("number".to_string(), Value::str("42"));
        error.insert("control".to_string(), Value::str("carriage\rreturn"));
        error.insert("empty".to_string(), Value::str(""));
        let doc = render_fixtures(
            "Example-test.ts",
            &[record("quoted", vec![ErrorDescriptor(Value::object(error))])],
        );

        let parsed: Vec<serde_yaml::Value> = serde_yaml::from_str(&doc.yaml).unwrap();
        let error = &parsed[0]["errors"][0];
        assert_eq!(error["message"], serde_yaml::Value::from("Unknown type \"Dog\"."));
        assert_eq!(error["hint"], serde_yaml::Value::from("it's: #1"));
        assert_eq!(error["word"], serde_yaml::Value::from("yes"));
        assert_eq!(error["number"], serde_yaml::Value::from("42"));
        assert_eq!(error["control"], serde_yaml::Value::from("carriage\rreturn"));
        assert_eq!(error["empty"], serde_yaml::Value::from(""));
    }

    #[test]
    fn test_schema_document_uses_literal_blocks() {
        let sdl = "type Query {\n  a: String\n}\n";
        let yaml = render_schemas(&[Some(sdl.to_string()), None, Some(String::new())]);
        assert!(yaml.starts_with("- |2\n  type Query {\n    a: String\n  }\n- null\n"), "{yaml}");
        let parsed: Vec<Option<String>> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed[0].as_deref(), Some(sdl));
    }

    #[test]
    fn test_fixture_file_name() {
        assert_eq!(
            fixture_file_name("KnownTypeNamesRule-test.ts", "-test.ts", ".spec.yml"),
            "KnownTypeNamesRule.spec.yml"
        );
        assert_eq!(
            fixture_file_name("UniqueNames-test.js", "-test.js", ".spec.yml"),
            "UniqueNames.spec.yml"
        );
    }
}
