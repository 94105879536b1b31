use rstest::rstest;
use serde_json::json;
use tagexpr::{Context, Engine, Error, ParseError, Value};

fn render(template: &str, data: serde_json::Value) -> Result<String, Error> {
    Engine::new().evaluate(template, &Value::context_from_json(&data))
}

// ── Edge cases around the template surface ──

#[test]
fn empty_list_produces_empty_output() {
    let template = "{{each item in items}}{{ item.title }}{{endeach}}";
    assert_eq!(render(template, json!({ "items": [] })), Ok("".into()));
}

#[test]
fn plain_text_template_no_tags() {
    assert_eq!(render("Hello, world!", json!({})), Ok("Hello, world!".into()));
}

#[test]
fn empty_template() {
    assert_eq!(Engine::new().evaluate("", &Context::new()), Ok("".into()));
}

#[test]
fn context_var_outside_loop() {
    let template = "{{ site }}|PAGE|{{ footer }}";
    let rendered = render(template, json!({ "site": "Acme", "footer": "©" }));
    assert_eq!(rendered, Ok("Acme|PAGE|©".into()));
}

#[test]
fn dot_access_resolves_and_missing_is_empty() {
    let data = json!({ "user": { "name": "Ann" } });
    assert_eq!(render("{{ user.name }}", data.clone()), Ok("Ann".into()));
    assert_eq!(render("[{{ user.missing }}]", data.clone()), Ok("[]".into()));
    assert_eq!(render("[{{ nobody.name }}]", data.clone()), Ok("[]".into()));
    assert_eq!(render("[{{ user.name.first }}]", data).map_err(|e| e.is_parse()), Err(true));
}

#[test]
fn dot_access_on_scalar_is_empty() {
    assert_eq!(render("[{{ title.length }}]", json!({ "title": "x" })), Ok("[]".into()));
}

#[test]
fn loop_first_and_last_single_item() {
    let template =
        "{{each x in items}}{{if loop.first}}F{{endif}}{{if loop.last}}L{{endif}}{{endeach}}";
    assert_eq!(render(template, json!({ "items": ["only"] })), Ok("FL".into()));
}

#[test]
fn loop_metadata_at_each_position() {
    let template = "{{each x in items}}{{if loop.first}}[{{endif}}{{ loop.index }}:{{ loop.count }}={{ x }}{{if loop.last}}]{{else}},{{endif}}{{endeach}}";
    assert_eq!(
        render(template, json!({ "items": ["a", "b", "c"] })),
        Ok("[0:1=a,1:2=b,2:3=c]".into())
    );
}

#[test]
fn loop_over_map_exposes_keys_in_insertion_order() {
    let mut context = Context::new();
    let prices: Value = [("tea", 3), ("coffee", 4), ("juice", 5)].into_iter().collect();
    context.insert("prices".into(), prices);
    let out = Engine::new().evaluate(
        "{{each p in prices}}{{ loop.key }}={{ p }};{{endeach}}",
        &context,
    );
    assert_eq!(out, Ok("tea=3;coffee=4;juice=5;".into()));
}

#[test]
fn json_maps_keep_document_order() {
    let out = render(
        "{{each v in m}}{{ loop.key }}={{ v }};{{endeach}}",
        json!({ "m": { "zeta": 1, "alpha": 2, "mid": 3 } }),
    );
    assert_eq!(out, Ok("zeta=1;alpha=2;mid=3;".into()));
}

#[test]
fn scalar_iterable_runs_once() {
    let template = "{{each x in tag}}<{{ x }}>{{endeach}}";
    assert_eq!(render(template, json!({ "tag": "news" })), Ok("<news>".into()));
    assert_eq!(render(template, json!({ "tag": "" })), Ok("".into()));
    assert_eq!(render(template, json!({})), Ok("".into()));
}

#[test]
fn nested_loops_see_outer_variables() {
    let template = "{{each row in rows}}{{each cell in row}}{{ cell }}{{ sep }}{{endeach}}/{{endeach}}";
    let out = render(template, json!({ "rows": [[1, 2], [3]], "sep": "." }));
    assert_eq!(out, Ok("1.2./3./".into()));
}

#[test]
fn or_operator_in_condition() {
    let template = r#"{{each r in roles}}{{if r == "user" or r == "admin"}}Y{{else}}N{{endif}}{{endeach}}"#;
    let out = render(template, json!({ "roles": ["guest", "user", "admin"] }));
    assert_eq!(out, Ok("NYY".into()));
}

#[test]
fn elif_chain_picks_first_truthy() {
    let template = r#"{{each r in roles}}{{if r == "user"}}U{{elif r == "system"}}S{{else}}O{{endif}}{{endeach}}"#;
    let out = render(template, json!({ "roles": ["user", "system", "tool"] }));
    assert_eq!(out, Ok("USO".into()));
}

#[test]
fn if_without_else_renders_nothing() {
    assert_eq!(render("a{{if missing}}b{{endif}}c", json!({})), Ok("ac".into()));
}

#[test]
fn special_characters_are_escaped_unless_raw() {
    let data = json!({ "content": "Hello <world> & \"friends\"" });
    assert_eq!(
        render("{{ content }}", data.clone()),
        Ok("Hello &lt;world&gt; &amp; &quot;friends&quot;".into())
    );
    assert_eq!(render("{{! content }}", data), Ok("Hello <world> & \"friends\"".into()));
}

#[test]
fn text_is_never_escaped() {
    assert_eq!(render("<b>&amp;</b>", json!({})), Ok("<b>&amp;</b>".into()));
}

#[test]
fn unicode_content() {
    let out = render("{{ greeting }} {{ \"🌍\" }}", json!({ "greeting": "こんにちは" }));
    assert_eq!(out, Ok("こんにちは 🌍".into()));
}

#[test]
fn flag_default_false_when_missing() {
    let template = "{{each x in items}}{{ x }}{{if loop.last and show_more}}MORE{{endif}}{{endeach}}";
    assert_eq!(render(template, json!({ "items": ["a"] })), Ok("a".into()));
}

#[test]
fn string_literal_may_contain_tag_delimiters() {
    assert_eq!(render(r#"{{ "{{ not a tag }}" }}"#, json!({})), Ok("{{ not a tag }}".into()));
}

#[test]
fn numbers_print_without_float_artifacts() {
    let out = render("{{ n }} {{ half }} {{ 3 }} {{ 2.50 }}", json!({ "n": 3, "half": 0.5 }));
    assert_eq!(out, Ok("3 0.5 3 2.5".into()));
}

#[test]
fn null_and_missing_render_empty() {
    assert_eq!(render("[{{ null }}][{{ gone }}][{{ nothing }}]", json!({ "nothing": null })), Ok("[][][]".into()));
}

#[rstest]
#[case(r#"{{if a == "1"}}T{{else}}F{{endif}}"#, json!({ "a": 1 }), "T")]
#[case(r#"{{if a == "true"}}T{{else}}F{{endif}}"#, json!({ "a": true }), "T")]
#[case(r#"{{if a != b}}T{{else}}F{{endif}}"#, json!({ "a": 2, "b": 2.0 }), "F")]
#[case(r#"{{if a == null}}T{{else}}F{{endif}}"#, json!({ "a": "" }), "T")]
#[case(r#"{{if a >= 10}}T{{else}}F{{endif}}"#, json!({ "a": "10" }), "T")]
#[case(r#"{{if a > b}}T{{else}}F{{endif}}"#, json!({ "a": "10", "b": "9" }), "T")]
#[case(r#"{{if a > b}}T{{else}}F{{endif}}"#, json!({ "a": "apple", "b": "banana" }), "F")]
#[case(r#"{{if a < b}}T{{else}}F{{endif}}"#, json!({ "a": "1e3", "b": "5" }), "T")]
#[case(r#"{{if not (a and b)}}T{{else}}F{{endif}}"#, json!({ "a": 1, "b": 0 }), "T")]
fn comparisons(#[case] template: &str, #[case] data: serde_json::Value, #[case] expected: &str) {
    assert_eq!(render(template, data), Ok(expected.to_string()));
}

#[rstest]
#[case("{{ name", "unclosed expression")]
#[case("{{ a + b }}", "unexpected character")]
#[case(r#"{{ "open }}"#, "unclosed expression")]
#[case("{{if a}}x", "unclosed {{if}}")]
#[case("{{endeach}}", "unexpected {{endeach}}")]
#[case("{{each in items}}{{endeach}}", "invalid each syntax")]
#[case("{{ shout(name) }}", "unknown function")]
#[case("{{ }}", "empty expression")]
fn parse_errors_are_descriptive(#[case] template: &str, #[case] fragment: &str) {
    let err = render(template, json!({})).unwrap_err();
    assert!(
        matches!(err, Error::Parse(_)),
        "expected parse error for {template:?}, got {err:?}"
    );
    assert!(
        err.to_string().contains(fragment),
        "{err} should mention {fragment:?}"
    );
}

#[test]
fn unclosed_tag_reports_offset() {
    assert_eq!(
        render("ok {{ name", json!({})),
        Err(Error::Parse(ParseError::UnclosedExpression { offset: 3 }))
    );
}
