use super::{consumes_match, parse_accept, select_produced, split_header_values, MediaType, Negotiation};

fn declared(values: &[&str]) -> Vec<MediaType> {
    values.iter().map(|v| MediaType::parse(v)).collect()
}

#[test]
fn test_parse_full_media_range() {
    let m = MediaType::parse("Text/HTML; level=1; q=0.7");
    assert_eq!(m.component(), "text");
    assert_eq!(m.subcomponent(), "html");
    assert_eq!(m.parameter("level"), Some("1"));
    assert!((m.weight() - 0.7).abs() < f32::EPSILON);
}

#[test]
fn test_bare_token_is_wildcard_type() {
    let m = MediaType::parse("json");
    assert_eq!(m.component(), "*");
    assert_eq!(m.subcomponent(), "json");
    assert!(m.matches(&MediaType::parse("application/json")));
    assert!(!m.matches(&MediaType::parse("text/plain")));
}

#[test]
fn test_bad_quality_keeps_default_weight() {
    let m = MediaType::parse("text/plain;q=high");
    assert!((m.weight() - 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_non_finite_quality_keeps_default_weight() {
    for value in ["NaN", "inf", "-infinity"] {
        let m = MediaType::parse(&format!("text/plain;q={value}"));
        assert!((m.weight() - 1.0).abs() < f32::EPSILON, "q={value}");
    }
}

#[test]
fn test_nan_quality_does_not_displace_earlier_entry() {
    let accept = parse_accept("text/plain, application/json;q=NaN");
    let produces = declared(&["application/json", "text/plain"]);
    let chosen = select_produced(&accept, &produces).map(MediaType::raw);
    assert_eq!(chosen, Some("text/plain"));
}

#[test]
fn test_split_respects_quotes() {
    let parts = split_header_values(r#"text/plain; foo="a,b", application/json"#, ',');
    assert_eq!(parts, vec![r#"text/plain; foo="a,b""#, "application/json"]);
}

#[test]
fn test_split_drops_empty_entries() {
    assert_eq!(split_header_values(" a , , b ,", ','), vec!["a", "b"]);
}

#[test]
fn test_quoted_parameter_unescaped() {
    let m = MediaType::parse(r#"text/plain; title="say \"hi\"""#);
    assert_eq!(m.parameter("title"), Some(r#"say "hi""#));
}

#[test]
fn test_equal_quality_earliest_accept_entry_wins() {
    let produces = declared(&["application/json", "text/plain"]);
    let accept = parse_accept("text/html,text/plain,application/json");
    let chosen = select_produced(&accept, &produces).map(MediaType::raw);
    assert_eq!(chosen, Some("text/plain"));
}

#[test]
fn test_higher_quality_wins() {
    let produces = declared(&["application/json", "text/plain"]);
    let accept = parse_accept("text/html,text/plain;q=0.9,application/json");
    let chosen = select_produced(&accept, &produces).map(MediaType::raw);
    assert_eq!(chosen, Some("application/json"));
}

#[test]
fn test_wildcard_accept_selects_first_declared() {
    let produces = declared(&["application/xml", "application/json"]);
    let accept = parse_accept("*/*");
    let chosen = select_produced(&accept, &produces).map(MediaType::raw);
    assert_eq!(chosen, Some("application/xml"));
}

#[test]
fn test_subtype_wildcard_accept() {
    let produces = declared(&["text/plain", "application/json"]);
    let accept = parse_accept("application/*");
    let chosen = select_produced(&accept, &produces).map(MediaType::raw);
    assert_eq!(chosen, Some("application/json"));
}

#[test]
fn test_zero_quality_is_refused() {
    let produces = declared(&["application/json"]);
    let accept = parse_accept("application/json;q=0");
    assert!(select_produced(&accept, &produces).is_none());
}

#[test]
fn test_no_matching_accept_rejects() {
    let produces = declared(&["application/json"]);
    assert!(Negotiation::evaluate(Some("text/html"), &produces).is_rejected());
}

#[test]
fn test_missing_accept_selects_first_declared() {
    let produces = declared(&["text/plain", "application/json"]);
    match Negotiation::evaluate(None, &produces) {
        Negotiation::Selected(m) => assert_eq!(m.raw(), "text/plain"),
        other => panic!("unexpected negotiation: {other:?}"),
    }
}

#[test]
fn test_no_produces_not_applicable() {
    assert_eq!(
        Negotiation::evaluate(Some("text/html"), &[]),
        Negotiation::NotApplicable
    );
}

#[test]
fn test_consumes_ignores_charset() {
    let consumes = declared(&["application/json"]);
    assert!(consumes_match(Some("application/json; charset=utf-8"), &consumes));
}

#[test]
fn test_consumes_wildcards_either_side() {
    assert!(consumes_match(Some("text/html"), &declared(&["text/*"])));
    assert!(consumes_match(Some("*/*"), &declared(&["application/json"])));
    assert!(!consumes_match(Some("text/html"), &declared(&["application/*"])));
}

#[test]
fn test_consumes_requires_header_when_declared() {
    assert!(!consumes_match(None, &declared(&["application/json"])));
    assert!(consumes_match(None, &[]));
}
