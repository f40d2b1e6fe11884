use serde_json::{Value, json};

use super::generator::{GenerateError, Generator, GeneratorOutput, OutputKey, type_name};

/// Keeps evaluated values verbatim as one global JSON document.
#[derive(Debug, Default)]
pub struct RawGenerator {
    entries: Vec<(String, Value)>,
}

impl Generator for RawGenerator {
    fn ingest(&mut self, file: &str, value: &Value) -> Result<(), GenerateError> {
        if !value.is_object() {
            return Err(GenerateError::NotAnObject(type_name(value)));
        }
        self.entries.push((file.to_string(), value.clone()));
        Ok(())
    }

    fn finish(&mut self) -> GeneratorOutput {
        let mut output = GeneratorOutput::new();
        if self.entries.is_empty() {
            return output;
        }
        let document: Vec<Value> = self
            .entries
            .iter()
            .map(|(file, value)| json!({ "file": file, "value": value }))
            .collect();
        output.insert(
            OutputKey::Global,
            serde_json::to_string_pretty(&document).unwrap_or_default(),
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_output_is_global_and_ordered() {
        let mut raw = RawGenerator::default();
        raw.ingest("/a.ts", &json!({ "color": "red" })).unwrap();
        raw.ingest("/b.ts", &json!({ "size": 2 })).unwrap();

        let output = raw.finish();
        assert_eq!(output.len(), 1);
        let parsed: Value = serde_json::from_str(&output[&OutputKey::Global]).unwrap();
        assert_eq!(
            parsed,
            json!([
                { "file": "/a.ts", "value": { "color": "red" } },
                { "file": "/b.ts", "value": { "size": 2 } }
            ])
        );
    }

    #[test]
    fn test_raw_rejects_non_objects() {
        let mut raw = RawGenerator::default();
        assert_eq!(
            raw.ingest("/a.ts", &json!(null)),
            Err(GenerateError::NotAnObject("null"))
        );
        assert!(raw.finish().is_empty());
    }
}
