//! Property tests: scope containment and transcript robustness.

use std::path::Path;

use bugctx::core::callgraph::{TranscriptError, parse_list};
use bugctx::core::{LineRange, ScopeKind, ScopeResolver, SourceParser};
use proptest::prelude::*;

/// A class with one method per body length; returns source and 1-based method spans.
fn class_with_methods(bodies: &[usize]) -> (String, Vec<LineRange>)
{
    let mut src = String::from("class Gen {\n");
    let mut line = 1;
    let mut spans = Vec::new();

    for (m, &body) in bodies.iter().enumerate()
    {
        let start = line + 1;
        src.push_str(&format!("    void m{m}() {{\n"));
        for j in 0..body
        {
            src.push_str(&format!("        int v{j} = {j};\n"));
        }
        src.push_str("    }\n");
        line = start + body + 1;
        spans.push(LineRange::new(start, line).unwrap());
    }

    src.push_str("}\n");
    (src, spans)
}

proptest! {
    #[test]
    fn range_inside_a_method_resolves_to_it(
        bodies in prop::collection::vec(1usize..6, 1..5),
        pick in any::<prop::sample::Index>(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (src, spans) = class_with_methods(&bodies);
        let k = pick.index(spans.len());
        let span = spans[k];

        let x = span.start + a.index(span.line_count());
        let y = span.start + b.index(span.line_count());
        let range = LineRange::new(x.min(y), x.max(y)).unwrap();

        let parser = SourceParser::new();
        let file = parser.parse_bytes(Path::new("Gen.java"), src.into_bytes()).unwrap();
        let scope = ScopeResolver::new(parser)
            .unwrap()
            .resolve_in(&file, range)
            .unwrap()
            .unwrap();

        prop_assert_eq!(scope.kind, ScopeKind::Method);
        prop_assert_eq!(scope.span, span);
        prop_assert!(scope.span.start <= range.start && range.end <= scope.span.end);
    }

    #[test]
    fn range_across_siblings_falls_back_to_class(
        bodies in prop::collection::vec(1usize..6, 2..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let (src, spans) = class_with_methods(&bodies);
        let k = pick.index(spans.len() - 1);
        let range = LineRange::new(spans[k].end, spans[k + 1].start).unwrap();

        let parser = SourceParser::new();
        let file = parser.parse_bytes(Path::new("Gen.java"), src.into_bytes()).unwrap();
        let scope = ScopeResolver::new(parser)
            .unwrap()
            .resolve_in(&file, range)
            .unwrap()
            .unwrap();

        prop_assert_eq!(scope.kind, ScopeKind::Class);
        prop_assert!(scope.span.contains(&range));
    }

    #[test]
    fn transcript_parser_never_panics(raw in ".{0,200}") {
        let _ = parse_list(&raw);
    }

    #[test]
    fn transcript_without_result_binding_is_marker_not_found(
        lines in prop::collection::vec("[a-zA-Z0-9 =:>\\[\\]{}\",]{0,40}", 0..6),
    ) {
        let raw = lines.join("\n");
        prop_assume!(!raw.contains("val res"));

        prop_assert!(matches!(parse_list(&raw), Err(TranscriptError::MarkerNotFound)));
    }

    #[test]
    fn colored_result_lines_are_recovered(
        items in prop::collection::vec("[a-zA-Z0-9.:()]{0,12}", 0..5),
    ) {
        let json = serde_json::to_string(&items).unwrap();
        let literal = serde_json::to_string(&json).unwrap();
        let raw = format!(
            "\x1b[33mjoern>\x1b[0m q\n\x1b[32mval\x1b[0m \x1b[36mres7\x1b[0m: \x1b[32mString\x1b[0m = {literal}\n"
        );

        let parsed = parse_list(&raw).unwrap();
        let back: Vec<String> = parsed
            .into_iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        prop_assert_eq!(back, items);
    }
}
