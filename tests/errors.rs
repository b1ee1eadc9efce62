use htmpl::{render_str, Model, Position, SemanticError, TemplateError, Value};

fn fail(template: &str) -> TemplateError {
    match render_str(template, None) {
        Ok(out) => panic!("expected an error, rendered {out:?}"),
        Err(e) => e,
    }
}

// ── Syntax errors ──

#[test]
fn unclosed_regions() {
    assert!(fail("{{ 1 + 2").is_syntax());
    assert!(fail("{% if True %}never closed").is_syntax());
    assert!(fail("{% for x in xs %}").is_syntax());
    assert!(fail("{% macro m() %}body").is_syntax());
}

#[test]
fn stray_closers() {
    assert!(fail("{% endif %}").is_syntax());
    assert!(fail("{% else %}").is_syntax());
    assert!(fail("{% if True %}{% endfor %}").is_syntax());
}

#[test]
fn malformed_statements() {
    assert!(fail("{% set = 3 %}").is_syntax());
    assert!(fail("{% for in xs %}{% endfor %}").is_syntax());
    assert!(fail("{% unknown %}").is_syntax());
    assert!(fail("{% macro m(1) %}{% endmacro %}").is_syntax());
}

#[test]
fn malformed_expressions() {
    assert!(fail("{{ }}").is_syntax());
    assert!(fail("{{ (1 + 2 }}").is_syntax());
    assert!(fail("{{ 'unclosed }}").is_syntax());
    assert!(fail("{{ a ! b }}").is_syntax());
    assert!(fail("{{ x[1 }}").is_syntax());
}

#[test]
fn syntax_error_message_format() {
    let err = fail("{{ }}");
    assert_eq!(err.to_string(), "1:4: syntax error: expected expression, found \"}}\"");
}

#[test]
fn syntax_error_on_later_line() {
    let err = fail("<p>\n  {{ 1 + }}\n</p>");
    assert_eq!(err.position(), Some(Position::new(2, 10)));
}

#[test]
fn syntax_errors_win_over_earlier_semantic_errors() {
    // The whole document is parsed before anything is evaluated.
    assert!(fail("{{ 1 / 0 }}{{ (").is_syntax());
}

// ── Semantic errors ──

#[test]
fn division_by_zero() {
    let err = fail("{{ 1 / 0 }}");
    assert_eq!(err.semantic_kind(), Some(&SemanticError::DivisionByZero));
    assert_eq!(err.to_string(), "1:6: semantic error: division by zero");

    let err = fail("{{7 % 0}}");
    assert_eq!(err.semantic_kind(), Some(&SemanticError::DivisionByZero));
}

#[test]
fn unknown_identifier() {
    let err = fail("text {{ missing }}");
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::UnknownIdentifier("missing".into()))
    );
    assert_eq!(err.position(), Some(Position::new(1, 9)));
}

#[test]
fn missing_key_in_model() {
    let row: Value = Value::Map([("age".to_string(), Value::Int(34))].into_iter().collect());
    let model = Model::from([("csv".to_string(), Value::Array(vec![row]))]);
    let err = render_str("{{ csv[0]['date_of_birth'] }}", Some(model)).unwrap_err();
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::MissingKey("date_of_birth".into()))
    );
}

#[test]
fn index_out_of_range() {
    let model = Model::from([("xs".to_string(), Value::Array(vec![Value::Int(1)]))]);
    let err = render_str("{{ xs[5] }}", Some(model)).unwrap_err();
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::IndexOutOfRange { index: 5, len: 1 })
    );
}

#[test]
fn invalid_operand_types() {
    assert!(fail("{{ 'a' - 'b' }}").is_semantic());
    assert!(fail("{{ 'a' + 1 }}").is_semantic());
    assert!(fail("{{ -'a' }}").is_semantic());
    assert!(fail("{{ 'a' < 1 }}").is_semantic());
}

#[test]
fn membership_requires_compatible_types() {
    let err = fail("{{ True in \"str\" }}");
    assert!(matches!(
        err.semantic_kind(),
        Some(SemanticError::InvalidMembership { .. })
    ));
    assert!(fail("{{ 1 in 2 }}").is_semantic());
}

#[test]
fn iterating_a_number() {
    let err = fail("{% for x in 3 %}{% endfor %}");
    assert_eq!(err.semantic_kind(), Some(&SemanticError::NotIterable("int")));
}

#[test]
fn macro_call_errors() {
    let err = fail("{% macro m(a) %}{{ a }}{% endmacro %}{{ m() }}");
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::ArgumentCount {
            name: "m".into(),
            expected: 1,
            found: 0,
        })
    );

    let err = fail("{% set x = 1 %}{{ x() }}");
    assert_eq!(err.semantic_kind(), Some(&SemanticError::NotCallable("x".into())));

    let err = fail("{{ nope() }}");
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::UnknownIdentifier("nope".into()))
    );
}

#[test]
fn macro_parameters_are_gone_after_call() {
    let err = fail("{% macro m(p) %}{{ p }}{% endmacro %}{{ m(1) }}{{ p }}");
    assert_eq!(
        err.semantic_kind(),
        Some(&SemanticError::UnknownIdentifier("p".into()))
    );
}

#[test]
fn errors_inside_macro_body_point_into_the_body() {
    let err = fail("{% macro bad() %}\n  {{ 1 / 0 }}\n{% endmacro %}{{ bad() }}");
    assert_eq!(err.position(), Some(Position::new(2, 8)));
}

#[test]
fn error_discards_partial_output() {
    assert!(render_str("lots of text before {{ 1 / 0 }}", None).is_err());
}

#[test]
fn huge_string_repetition_is_semantic_error() {
    let err = fail("{{ 'ab' * 9223372036854775807 }}");
    assert!(matches!(
        err.semantic_kind(),
        Some(SemanticError::StringTooLong(_))
    ));
}
