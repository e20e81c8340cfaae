use anyhow::{Context, Result};
use formcheck::{FieldError, Path, Schema, ValidationTree, compile_path};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;

/// Outcome of one check, printed as JSON.
#[derive(Serialize, Debug)]
pub struct Report {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<Path>,
    pub errors: Vec<FieldError>,
}

fn read_text(path: &std::path::Path) -> Result<String> {
    if path == std::path::Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

pub fn read_json(path: &std::path::Path) -> Result<Value> {
    let content = read_text(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn read_schema(path: &std::path::Path) -> Result<Schema> {
    let content = read_text(path)?;
    Schema::from_json(&content).with_context(|| format!("Failed to parse schema {:?}", path))
}

/// Test `input` against `schema`, either whole or only at the accessor
/// expression `field`.
pub fn check(schema: &Schema, input: &Value, field: Option<&str>) -> Result<Report> {
    let mut tree = ValidationTree::new(schema.build().context("Failed to build schema")?);
    let Some(expr) = field else {
        let valid = tree.test_root(input);
        return Ok(Report {
            valid,
            field: None,
            errors: tree.root().errors().to_vec(),
        });
    };

    let keys = compile_path(expr);
    let (node, value) = tree
        .locate(tree.root_id(), input, &keys)
        .with_context(|| format!("No validation at {:?}", expr))?;
    tracing::debug!(field = expr, node = %node, "checking single field");
    let valid = tree.test(node, value)?;
    let errors = tree
        .node(node)
        .map(|n| n.errors().to_vec())
        .unwrap_or_default();
    Ok(Report {
        valid,
        field: Some(keys),
        errors,
    })
}

pub fn run(
    schema: &std::path::Path,
    input: &std::path::Path,
    field: Option<&str>,
    pretty: bool,
) -> Result<bool> {
    let schema = read_schema(schema)?;
    let input = read_json(input)?;
    let report = check(&schema, &input, field)?;
    println!("{}", crate::format_output(&report, pretty)?);
    Ok(report.valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn person_schema() -> Schema {
        Schema::from_value(json!({
            "fields": {
                "name": { "rules": [{ "rule": "required" }, { "rule": "maxLength", "value": 10 }] },
                "emails": {
                    "every": { "schema": { "rules": [{ "rule": "email", "message": "not an email" }] } }
                }
            }
        }))
        .unwrap()
    }

    fn write_temp(value: &Value) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", value).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_check_valid_document() {
        let report = check(&person_schema(), &json!({ "name": "Ada", "emails": ["ada@example.com"] }), None).unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.field.is_none());
    }

    #[test]
    fn test_check_invalid_document() {
        let report = check(
            &person_schema(),
            &json!({ "name": "", "emails": ["ada@example.com", "nope"] }),
            None,
        )
        .unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.clone()).collect();
        assert!(paths.contains(&vec![formcheck::Key::from("name")]));
        assert!(paths.contains(&vec![formcheck::Key::from("emails"), formcheck::Key::Index(1)]));
    }

    #[test]
    fn test_check_single_field() {
        let input = json!({ "name": "", "emails": ["ada@example.com", "nope"] });
        let report = check(&person_schema(), &input, Some("emails[1]")).unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message, "not an email");
        assert_eq!(
            report.field,
            Some(vec![formcheck::Key::from("emails"), formcheck::Key::Index(1)])
        );

        let report = check(&person_schema(), &input, Some("emails[0]")).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn test_check_unknown_field() {
        assert!(check(&person_schema(), &json!({}), Some("address.city")).is_err());
    }

    #[test]
    fn test_report_json_shape() {
        let report = check(&person_schema(), &json!({ "name": null }), None).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            json!({
                "valid": false,
                "errors": [{ "rule": "required", "path": ["name"], "message": "required", "fromKey": "name" }]
            })
        );
    }

    #[test]
    fn test_run_from_files() {
        let schema = write_temp(&serde_json::to_value(person_schema()).unwrap());
        let good = write_temp(&json!({ "name": "Ada" }));
        let bad = write_temp(&json!({ "name": "Ada Lovelace King" }));
        assert!(run(schema.path(), good.path(), None, false).unwrap());
        assert!(!run(schema.path(), bad.path(), None, true).unwrap());
    }

    #[test]
    fn test_run_bad_schema() {
        let schema = write_temp(&json!({ "rules": [{ "rule": "pattern", "value": "[a-" }] }));
        let input = write_temp(&json!("x"));
        assert!(run(schema.path(), input.path(), None, false).is_err());
    }

    #[test]
    fn test_read_json_invalid_path() {
        assert!(read_json(std::path::Path::new("/nonexistent/file.json")).is_err());
    }
}
