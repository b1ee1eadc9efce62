use std::fs;
use std::path::PathBuf;

use htmpl::{load_model, render_str, ModelError, SemanticError, Value};
use tempfile::TempDir;

const PEOPLE: &str = "firstname,lastname,salary,age
Brad,Smith,2500.00,34
Will,Pitt,3000.00,42
Jennifer,Polez,100.00,17
";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn render_csv(template: &str) -> htmpl::Result<String> {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "people.csv", PEOPLE);
    let model = load_model(&path).unwrap();
    render_str(template, Some(model))
}

#[test]
fn csv_fields_are_typed() {
    assert_eq!(render_csv("{{ csv[0]['age'] }}").unwrap(), "34");
    assert_eq!(render_csv("{{ csv[0]['salary'] }}").unwrap(), "2500.0");
    assert_eq!(render_csv("{{ csv[0]['age'] + csv[1]['age'] }}").unwrap(), "76");
    assert_eq!(render_csv("{{ csv[-1]['age'] }}").unwrap(), "17");
}

#[test]
fn csv_text_fields_concatenate() {
    assert_eq!(
        render_csv("{{ csv[0]['firstname'] + ' ' + csv[0]['lastname'] }}").unwrap(),
        "Brad Smith"
    );
}

#[test]
fn csv_unknown_column_is_semantic_error() {
    let err = render_csv("{{ csv[0]['date_of_birth'] }}").unwrap_err();
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::MissingKey("date_of_birth".into()))
    );
}

#[test]
fn csv_rows_drive_a_loop() {
    let template = "<ul>{% for p in csv %}{% if p.age > 18 %}<li>{{ p.firstname }}</li>{% endif %}{% endfor %}</ul>";
    assert_eq!(
        render_csv(template).unwrap(),
        "<ul><li>Brad</li><li>Will</li></ul>"
    );
}

#[test]
fn json_model_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "page.json",
        r#"{"title": "Reports", "items": [{"name": "a", "count": 2}, {"name": "b", "count": 5}]}"#,
    );
    let model = load_model(&path).unwrap();
    let out = render_str(
        "<h1>{{ title }}</h1>{% for i in items %}{{ i.name }}={{ i.count * 10 }};{% endfor %}",
        Some(model),
    )
    .unwrap();
    assert_eq!(out, "<h1>Reports</h1>a=20;b=50;");
}

#[test]
fn yaml_model_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "site.yaml",
        "title: Home\nlinks:\n  - href: /a\n    label: A\n  - href: /b\n    label: B\n",
    );
    let model = load_model(&path).unwrap();
    let out = render_str(
        "{% for l in links %}<a href=\"{{ l.href }}\">{{ l.label }}</a>{% endfor %}",
        Some(model),
    )
    .unwrap();
    assert_eq!(out, "<a href=\"/a\">A</a><a href=\"/b\">B</a>");
}

#[test]
fn toml_model_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "conf.toml", "name = \"demo\"\nversion = 3\n[owner]\nlogin = \"ann\"\n");
    let model = load_model(&path).unwrap();
    let out = render_str("{{ name }} v{{ version }} by {{ owner.login }}", Some(model)).unwrap();
    assert_eq!(out, "demo v3 by ann");
}

#[test]
fn unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "data.txt", "a,b\n1,2\n");
    assert!(matches!(
        load_model(&path),
        Err(ModelError::UnsupportedFormat(_))
    ));
}

#[test]
fn missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load_model(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, ModelError::Io { .. }));
    assert!(err.to_string().contains("absent.csv"));
}

#[test]
fn malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bad.json", "{ not json");
    assert!(matches!(load_model(&path), Err(ModelError::Json(_))));
}

#[test]
fn empty_csv_has_no_rows() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "empty.csv", "firstname,lastname\n");
    let model = load_model(&path).unwrap();
    assert_eq!(model.get("csv"), Some(&Value::Array(vec![])));
}
