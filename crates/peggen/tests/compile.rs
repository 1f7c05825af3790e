//! End-to-end pipeline tests: grammar text in, generated C++ text (or
//! diagnostics) out.

use peggen::{compile, EmitNames, ErrorAccumulator, Output, Severity, Source};

fn names() -> EmitNames {
    EmitNames {
        source_file_name: "lang.cpp".to_owned(),
        header_file_name: "lang.h".to_owned(),
        header_name_from_source: "lang.h".to_owned(),
    }
}

fn compile_ok(grammar: &str) -> Output {
    let err = ErrorAccumulator::new();
    let source = Source::new("lang.peg", grammar);
    let output = compile(&source, &names(), &err);
    let diagnostics = err.take();
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    output.expect("expected output")
}

fn compile_messages(grammar: &str) -> Vec<(Severity, String)> {
    let err = ErrorAccumulator::new();
    let source = Source::new("lang.peg", grammar);
    let output = compile(&source, &names(), &err);
    assert!(output.is_none(), "expected compilation to fail");
    err.take()
        .into_iter()
        .map(|d| (d.severity, d.message))
        .collect()
}

#[test]
fn character_literal_grammar() {
    let output = compile_ok(r#"goal = "x" EOF;"#);
    assert!(output.source.contains("\"missing x\""));
    assert!(output.source.contains("\"expected end of file\""));
    assert!(output.header.contains("void parseGoal();"));
}

#[test]
fn choice_keeps_farthest_failure_information() {
    let output = compile_ok(r#"goal = "ab" / "ac" EOF;"#);
    // Both arms share the leading 'a'; the distinguishing failures are
    // at 'b' and 'c', and the merge keeps the farther end location so
    // the reported error sits at offset 1, not 0.
    assert!(output.source.contains("\"missing b\""));
    assert!(output.source.contains("\"missing c\""));
    assert!(output
        .source
        .contains("if(lastRuleResult__.endLocation >= ruleResult__.endLocation)"));
    // The failure bookkeeping resolves ties toward the newest message.
    assert!(output
        .source
        .contains("if(isRequiredForSuccess && errorInputEndLocation <= inputEndLocation)"));
}

#[test]
fn character_class_binding_grammar() {
    let output = compile_ok("digit = [0-9]; goal = digit:d EOF;");
    assert!(output.header.contains("char32_t parseDigit();"));
    assert!(output.source.contains("\"missing decimal digit\""));
    assert!(output.source.contains("char32_t d{};"));
}

#[test]
fn lookahead_consumes_nothing() {
    let output = compile_ok(r#"goal = &"x" "xy" EOF;"#);
    assert!(output
        .source
        .contains("if(ruleResult__.success())\n        ruleResult__.location = startLocation__;"));
}

#[test]
fn variable_inside_negative_predicate_is_an_error() {
    let messages = compile_messages("goal = !(a:v) EOF; a = \"x\";");
    assert!(messages
        .iter()
        .any(|(s, m)| *s == Severity::Error && m == "variable not allowed inside !"));
}

#[test]
fn left_recursive_rule_is_an_error() {
    let messages = compile_messages("a = a \"x\" / \"y\";");
    assert!(messages
        .iter()
        .any(|(s, m)| *s == Severity::Error && m == "left-recursive rule"));
}

#[test]
fn memoized_rule_gets_a_slot_and_entry_check() {
    let output = compile_ok("goal = a EOF; a = \"x\" a / \"x\";");
    assert!(output.header.contains("RuleResult resultA;"));
    assert!(output
        .source
        .contains("auto &ruleResult__ = this->getResults(startLocation__).resultA;"));
    assert!(output
        .source
        .contains("if(!ruleResult__.empty() && (ruleResult__.fail() || !isRequiredForSuccess__))"));
    // Lazily chunked memo storage.
    assert!(output.header.contains("static constexpr std::size_t allocated = 0x100;"));
    assert!(output.header.contains("std::vector<Results *> resultsPointers;"));
}

#[test]
fn unicode_terminal_compares_decoded_codepoint() {
    let output = compile_ok("goal = \"\u{e9}\" EOF;");
    assert!(output.source.contains("== U'\\u00E9'"));
    assert!(output
        .source
        .contains("\"missing character with code 233 (0xE9)\""));
    // The input constructor decodes UTF-8 with replacement characters.
    assert!(output.source.contains("U'\\uFFFD'"));
}

#[test]
fn undefined_rule_blocks_emission() {
    let messages = compile_messages("goal = missing EOF;");
    assert!(messages
        .iter()
        .any(|(s, m)| *s == Severity::Error && m == "rule not defined"));
}

#[test]
fn fatal_error_stops_the_pipeline() {
    let err = ErrorAccumulator::new();
    let source = Source::new("lang.peg", "goal = \"unterminated;");
    assert!(compile(&source, &names(), &err).is_none());
    let diagnostics = err.take();
    assert_eq!(diagnostics.last().unwrap().severity, Severity::Fatal);
    assert_eq!(diagnostics.last().unwrap().message, "missing closing \"");
}

#[test]
fn diagnostics_point_into_the_grammar() {
    let err = ErrorAccumulator::new();
    let source = Source::new("lang.peg", "a = \"x\";\nb = a:v;");
    assert!(compile(&source, &names(), &err).is_none());
    let diagnostic = err
        .take()
        .into_iter()
        .find(|d| d.message == "variable not allowed on rule returning void")
        .expect("diagnostic present");
    // Reported at the rule reference being bound.
    let span = diagnostic.span.expect("has location");
    assert_eq!(source.location_string(span.start()), "lang.peg:2:5");
}

#[test]
fn crlf_grammars_parse() {
    let output = compile_ok("goal = \"x\"\r\n       EOF;\r\n");
    assert!(output.source.contains("\"missing x\""));
}

#[test]
fn full_grammar_with_all_block_kinds() {
    let grammar = r#"
code license
{
    /* license text */
}
code header
{
    #include <string>
}
code source
{
    static int helperCalls__ = 0;
}
typedef ::std::size_t count;

blank = [ \t]*;
digit = [0-9];
number : count = digit:d (digit:e)? { $$ = 1; };
goal = blank number EOF;
"#;
    let err = ErrorAccumulator::new();
    let source = Source::new("lang.peg", grammar);
    let output = compile(&source, &names(), &err);
    let diagnostics = err.take();
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let output = output.unwrap();
    assert!(output.header.contains("/* license text */"));
    assert!(output.source.contains("/* license text */"));
    assert!(output.header.contains("#include <string>"));
    assert!(output.source.contains("static int helperCalls__ = 0;"));
    assert!(output.header.contains("::std::size_t parseNumber();"));
    assert!(output.source.contains("returnValue__ = 1;"));
    assert!(output.source.contains("\"missing space or tab\""));
}

#[test]
fn calculator_grammar_end_to_end() {
    let grammar = r#"
typedef int value;

ws = [ \t\n\r]*;
digit = [0-9];
number : value = digit:d { $$ = d - U'0'; }
         (digit:e { $$ = $$ * 10 + (e - U'0'); })* ws;
primary : value = number:n { $$ = n; }
        / "(" ws expr:e ")" ws { $$ = e; };
expr : value = primary:p { $$ = p; } ("+" ws primary:q { $$ = $$ + q; })*;
goal : value = ws expr:e EOF { $$ = e; };
"#;
    let err = ErrorAccumulator::new();
    let source = Source::new("calc.peg", grammar);
    let output = compile(&source, &names(), &err);
    let diagnostics = err.take();
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let output = output.unwrap();
    assert!(output.header.contains("int parseGoal();"));
    assert!(output.header.contains("int parseExpr();"));
    assert!(output.header.contains("char32_t parseDigit();"));
    // The recursive rules are all memoized.
    assert!(output.header.contains("RuleResult resultNumber;"));
    assert!(output.header.contains("RuleResult resultPrimary;"));
    assert!(output.header.contains("RuleResult resultExpr;"));
    // Multiple substitutions in one snippet splice in order.
    assert!(output
        .source
        .contains("returnValue__ = returnValue__ * 10 + (e - U'0');"));
    assert!(output.source.contains("int n{};"));
    assert!(output.source.contains("\"missing (\""));
}

#[test]
fn line_directives_alternate_between_files() {
    let output = compile_ok("goal = { int x = 0; (void)x; };");
    let grammar_directives = output.source.matches("\"lang.peg\"").count();
    let resync_directives = output.source.matches("#line").count();
    assert!(grammar_directives >= 1);
    assert!(resync_directives >= 2);
}

#[test]
fn emitted_text_is_deterministic() {
    let grammar = "digit = [0-9]; goal = digit:d EOF;";
    let first = compile_ok(grammar);
    let second = compile_ok(grammar);
    assert_eq!(first.header, second.header);
    assert_eq!(first.source, second.source);
}
