//! C++11 code emitter. Produces a header and a source file: a `Parser`
//! class with one public entry per rule, per-rule `internalParse`
//! routines realizing the PEG semantics inline, and a packrat memo
//! table over the cached rules.

pub mod buffer;
pub mod escape;
pub mod runtime;

use crate::ast::{CodeBlock, Expr, Grammar, NonterminalHandle, SubstitutionKind, TopLevelCodeKind};
use crate::source::Source;
use crate::span::Span;

use buffer::CodeBuf;

/// Output paths as they appear inside the generated text: in `#line`
/// directives, the include of the header, and the include guard.
pub struct EmitNames {
    pub source_file_name: String,
    pub header_file_name: String,
    /// The header as referenced from the source file, normally just
    /// its file name.
    pub header_name_from_source: String,
}

pub struct Output {
    pub header: String,
    pub source: String,
}

pub fn emit(grammar: &Grammar, source: &Source, names: &EmitNames) -> Output {
    let mut emitter = Emitter {
        grammar,
        source,
        names,
        header: CodeBuf::new(),
        body: CodeBuf::new(),
        needs_is_required: false,
    };
    emitter.emit_prelude();
    for &handle in &grammar.order {
        emitter.emit_rule(handle);
    }
    emitter.finish()
}

fn translate_name(prefix: &str, name: &str) -> String {
    let mut out = String::from(prefix);
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out
}

fn result_variable_name(name: &str) -> String {
    translate_name("result", name)
}

fn parse_function_name(name: &str) -> String {
    translate_name("parse", name)
}

fn internal_parse_function_name(name: &str) -> String {
    translate_name("internalParse", name)
}

/// Include-guard macro derived from the header name as seen from the
/// source file. A leading non-letter is replaced by a `HEADER_` prefix.
fn guard_macro_name(header_name: &str) -> String {
    let bytes = header_name.as_bytes();
    let mut out = String::with_capacity(header_name.len() + 8);
    let mut start = 0;
    if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic()) {
        start = 1;
        out.push_str("HEADER_");
    }
    for &byte in bytes.iter().skip(start) {
        if byte.is_ascii_alphanumeric() {
            out.push(byte.to_ascii_uppercase() as char);
        } else {
            out.push('_');
        }
    }
    out.push('_');
    out
}

fn splice_substitutions(block: &CodeBlock) -> String {
    let mut code = block.code.clone();
    for substitution in block.substitutions.iter().rev() {
        let name = match substitution.kind {
            SubstitutionKind::ReturnValue => "returnValue__",
            SubstitutionKind::PredicateReturnValue => "predicateReturnValue__",
        };
        code.insert_str(substitution.offset as usize, name);
    }
    code
}

struct Emitter<'a> {
    grammar: &'a Grammar,
    source: &'a Source,
    names: &'a EmitNames,
    header: CodeBuf,
    body: CodeBuf,
    /// Whether the rule body being lowered ever reads the
    /// `isRequiredForSuccess__` parameter; when it never does, a
    /// silencing cast is emitted.
    needs_is_required: bool,
}

impl<'a> Emitter<'a> {
    fn type_code(&self, handle: NonterminalHandle) -> &str {
        &self.grammar.types[self.grammar.rule_type(handle)].code
    }

    fn user_code_into(buf: &mut CodeBuf, source: &Source, code: &str, span: Span) {
        let position = source.line_col(span.start());
        buf.user_code(code, &source.file_name, position.line, position.column);
    }

    fn emit_prelude(&mut self) {
        let banner = format!("// automatically generated from {}", self.source.file_name);
        self.header.push(&banner);
        self.body.push(&banner);

        for block in self.grammar.code_blocks(TopLevelCodeKind::License) {
            Self::user_code_into(&mut self.body, self.source, &block.code, block.span);
            Self::user_code_into(&mut self.header, self.source, &block.code, block.span);
        }

        self.body
            .push(&format!("#include \"{}\"", self.names.header_name_from_source));
        self.body.blank();
        self.body.push("namespace parser\n{");

        let guard = guard_macro_name(&self.names.header_name_from_source);
        self.header.push(&format!("#ifndef {guard}"));
        self.header.push(&format!("#define {guard}"));
        self.header.blank();
        self.header.verbatim(runtime::HEADER_INCLUDES);
        for block in self.grammar.code_blocks(TopLevelCodeKind::Header) {
            Self::user_code_into(&mut self.header, self.source, &block.code, block.span);
        }
        self.header.blank();
        self.header.push("namespace parser\n{\nclass Parser final\n{");
        self.header
            .push("    Parser(const Parser &) = delete;\n    Parser &operator=(const Parser &) = delete;");
        self.header.blank();
        self.header.push("private:");
        self.header.verbatim(runtime::RULE_RESULT);
        self.header.push("    struct Results final\n    {");
        for &handle in &self.grammar.order {
            let nonterminal = &self.grammar.nonterminals[handle];
            if nonterminal.settings.caching {
                self.header.push(&format!(
                    "        RuleResult {};",
                    result_variable_name(&nonterminal.name)
                ));
            }
        }
        self.header.push("    };");
        self.header.verbatim(runtime::RESULTS_CHUNK);
        self.header.blank();
        self.header.push("public:");
        self.header.verbatim(runtime::PARSE_ERROR);
        self.header.blank();
        self.header.push("private:");
        self.header.verbatim(runtime::PARSER_MEMBERS);
        self.header.blank();
        self.header.push("private:");
        self.header.verbatim(runtime::PARSER_HELPERS);
        self.header.blank();
        self.header.push("public:");
        self.header.verbatim(runtime::PARSER_CONSTRUCTOR_DECLS);
        self.header.blank();
        self.header.push("public:");
        for &handle in &self.grammar.order {
            let nonterminal = &self.grammar.nonterminals[handle];
            self.header.push(&format!(
                "    {} {}();",
                self.type_code(handle),
                parse_function_name(&nonterminal.name)
            ));
        }
        self.header.blank();
        self.header.push("private:");

        for block in self.grammar.code_blocks(TopLevelCodeKind::Source) {
            Self::user_code_into(&mut self.body, self.source, &block.code, block.span);
        }
        self.body.blank();
        self.body.verbatim(runtime::PARSER_DEFINITIONS);
    }

    fn emit_rule(&mut self, handle: NonterminalHandle) {
        let nonterminal = &self.grammar.nonterminals[handle];
        let Some(expr) = &nonterminal.expr else {
            return;
        };
        let ty = &self.grammar.types[self.grammar.rule_type(handle)];
        let parse_name = parse_function_name(&nonterminal.name);
        let internal_name = internal_parse_function_name(&nonterminal.name);

        self.header.push(&format!(
            "    {} {}(std::size_t startLocation, RuleResult &ruleResult, bool isRequiredForSuccess);",
            ty.code, internal_name
        ));

        self.body.blank();
        self.body
            .push(&format!("{} Parser::{}()", ty.code, parse_name));
        self.body.push("{");
        self.body.indent();
        self.body.push("RuleResult result;");
        if ty.is_void {
            self.body.push(&format!("{internal_name}(0, result, true);"));
        } else {
            self.body
                .push(&format!("auto retval = {internal_name}(0, result, true);"));
        }
        self.body.push("assert(!result.empty());");
        self.body
            .push("if(result.fail())\n    throw ParseError(errorLocation, errorMessage);");
        if !ty.is_void {
            self.body.push("return retval;");
        }
        self.body.dedent();
        self.body.push("}");

        self.body.blank();
        self.body.push(&format!(
            "{} Parser::{}(std::size_t startLocation__, RuleResult &ruleResultOut__, bool isRequiredForSuccess__)",
            ty.code, internal_name
        ));
        self.body.push("{");
        self.body.indent();
        if !ty.is_void {
            self.body.push(&format!("{} returnValue__{{}};", ty.code));
        }
        self.declare_locals(expr);
        self.needs_is_required = false;
        if nonterminal.settings.caching {
            self.needs_is_required = true;
            self.body.push(&format!(
                "auto &ruleResult__ = this->getResults(startLocation__).{};",
                result_variable_name(&nonterminal.name)
            ));
            self.body
                .push("if(!ruleResult__.empty() && (ruleResult__.fail() || !isRequiredForSuccess__))\n{");
            self.body.push("    ruleResultOut__ = ruleResult__;");
            if ty.is_void {
                self.body.push("    return;");
            } else {
                self.body.push("    return returnValue__;");
            }
            self.body.push("}");
        } else {
            self.body.push("Parser::RuleResult ruleResult__;");
        }
        self.lower(expr);
        if !self.needs_is_required {
            self.body.push("static_cast<void>(isRequiredForSuccess__);");
        }
        let is_char_class_rule = self.grammar.rule_type(handle) == self.grammar.char_type
            && matches!(expr, Expr::CharacterClass { variable: None, .. });
        if is_char_class_rule {
            self.body.push(
                "if(ruleResult__.success())\n    returnValue__ = this->source.get()[startLocation__];",
            );
        }
        self.body.push("ruleResultOut__ = ruleResult__;");
        if !ty.is_void {
            self.body.push("return returnValue__;");
        }
        self.body.dedent();
        self.body.push("}");
    }

    /// First pass over the rule body: a default-initialized local for
    /// every bound variable.
    fn declare_locals(&mut self, expr: &Expr) {
        let grammar = self.grammar;
        let mut lines = Vec::new();
        expr.walk(&mut |node| match node {
            Expr::NonterminalRef {
                target,
                variable: Some(variable),
                ..
            } => {
                let code = &grammar.types[grammar.rule_type(*target)].code;
                lines.push(format!("{code} {variable}{{}};"));
            }
            Expr::CharacterClass {
                variable: Some(variable),
                ..
            } => {
                lines.push(format!("char32_t {variable}{{}};"));
            }
            _ => {}
        });
        for line in lines {
            self.body.push(&line);
        }
    }

    fn spliced_user_code(&mut self, block: &CodeBlock, span: Span) {
        let code = splice_substitutions(block);
        Self::user_code_into(&mut self.body, self.source, &code, span);
    }

    /// Second pass: evaluate. `startLocation__`, `ruleResult__`, and
    /// `isRequiredForSuccess__` are in scope at every splice point.
    fn lower(&mut self, expr: &Expr) {
        match expr {
            Expr::Empty { .. } => {
                self.body
                    .push("ruleResult__ = this->makeSuccess(startLocation__);");
            }
            Expr::Terminal { value, .. } => {
                self.needs_is_required = true;
                let message = escape::escape_string(&format!("missing {}", escape::char_name(*value)));
                let literal = escape::escape_char(*value);
                self.body.push(&format!(
                    "if(startLocation__ >= this->sourceSize)\n\
                     {{\n    \
                         ruleResult__ = this->makeFail(startLocation__, \"{message}\", isRequiredForSuccess__);\n\
                     }}\n\
                     else if(this->source.get()[startLocation__] == U'{literal}')\n\
                     {{\n    \
                         ruleResult__ = this->makeSuccess(startLocation__ + 1, startLocation__ + 1);\n\
                     }}\n\
                     else\n\
                     {{\n    \
                         ruleResult__ = this->makeFail(startLocation__, startLocation__ + 1, \"{message}\", isRequiredForSuccess__);\n\
                     }}"
                ));
            }
            Expr::EofTerminal { .. } => {
                self.needs_is_required = true;
                self.body.push(
                    "if(startLocation__ >= this->sourceSize)\n\
                     {\n    \
                         ruleResult__ = this->makeSuccess(startLocation__);\n\
                     }\n\
                     else\n\
                     {\n    \
                         ruleResult__ = this->makeFail(startLocation__, startLocation__, \"expected end of file\", isRequiredForSuccess__);\n\
                     }",
                );
            }
            Expr::CharacterClass {
                inverted,
                ranges,
                variable,
                ..
            } => {
                self.needs_is_required = true;
                self.body.push(
                    "if(startLocation__ >= this->sourceSize)\n\
                     {\n    \
                         ruleResult__ = this->makeFail(startLocation__, \"unexpected end of input\", isRequiredForSuccess__);\n\
                     }\n\
                     else\n\
                     {",
                );
                self.body.indent();
                self.body.push("bool matches = false;");
                let mut keyword = "if";
                for range in ranges.iter() {
                    let condition = if range.is_single() {
                        format!(
                            "this->source.get()[startLocation__] == U'{}'",
                            escape::escape_char(range.min)
                        )
                    } else {
                        format!(
                            "this->source.get()[startLocation__] >= U'{}' && this->source.get()[startLocation__] <= U'{}'",
                            escape::escape_char(range.min),
                            escape::escape_char(range.max)
                        )
                    };
                    self.body
                        .push(&format!("{keyword}({condition})\n{{\n    matches = true;\n}}"));
                    keyword = "else if";
                }
                self.body
                    .push(if *inverted { "if(!matches)" } else { "if(matches)" });
                self.body.push("{");
                self.body
                    .push("    ruleResult__ = this->makeSuccess(startLocation__ + 1, startLocation__ + 1);");
                if let Some(variable) = variable {
                    self.body.push(&format!(
                        "    {variable} = this->source.get()[startLocation__];"
                    ));
                }
                self.body.push("}");
                let message = escape::escape_string(&escape::class_fail_message(*inverted, ranges));
                self.body.push(&format!(
                    "else\n{{\n    ruleResult__ = this->makeFail(startLocation__, startLocation__ + 1, \"{message}\", isRequiredForSuccess__);\n}}"
                ));
                self.body.dedent();
                self.body.push("}");
            }
            Expr::NonterminalRef {
                target, variable, ..
            } => {
                self.needs_is_required = true;
                self.body.push("ruleResult__ = Parser::RuleResult();");
                let call = format!(
                    "this->{}(startLocation__, ruleResult__, isRequiredForSuccess__);",
                    internal_parse_function_name(&self.grammar.nonterminals[*target].name)
                );
                match variable {
                    Some(variable) => self.body.push(&format!("{variable} = {call}")),
                    None => self.body.push(&call),
                }
                self.body.push("assert(!ruleResult__.empty());");
            }
            Expr::Sequence { first, second, .. } => {
                self.lower(first);
                self.body.push("if(ruleResult__.success())\n{");
                self.body.indent();
                self.body.push("auto savedStartLocation__ = startLocation__;");
                self.body.push("startLocation__ = ruleResult__.location;");
                self.lower(second);
                self.body.push("startLocation__ = savedStartLocation__;");
                self.body.dedent();
                self.body.push("}");
            }
            Expr::OrderedChoice { first, second, .. } => {
                self.lower(first);
                self.body.push("if(ruleResult__.fail())\n{");
                self.body.indent();
                self.body
                    .push("Parser::RuleResult lastRuleResult__ = ruleResult__;");
                self.lower(second);
                self.body.push(
                    "if(ruleResult__.success())\n\
                     {\n    \
                         if(lastRuleResult__.endLocation >= ruleResult__.endLocation)\n    \
                         {\n        \
                             ruleResult__.endLocation = lastRuleResult__.endLocation;\n    \
                         }\n\
                     }",
                );
                self.body.dedent();
                self.body.push("}");
            }
            Expr::Optional { inner, .. } => {
                self.lower(inner);
                self.body.push(
                    "if(ruleResult__.fail())\n    ruleResult__ = this->makeSuccess(startLocation__, ruleResult__.endLocation);",
                );
            }
            Expr::ZeroOrMore { inner, .. } => {
                self.body
                    .push("ruleResult__ = this->makeSuccess(startLocation__);");
                self.repetition_loop(inner);
            }
            Expr::OneOrMore { inner, .. } => {
                self.lower(inner);
                self.body.push("if(ruleResult__.success())");
                self.repetition_loop(inner);
            }
            Expr::FollowedBy { inner, .. } => {
                self.lower(inner);
                self.body
                    .push("if(ruleResult__.success())\n    ruleResult__.location = startLocation__;");
            }
            Expr::NotFollowedBy { inner, .. } => {
                self.needs_is_required = true;
                self.body
                    .push("isRequiredForSuccess__ = !isRequiredForSuccess__;");
                self.lower(inner);
                self.body
                    .push("isRequiredForSuccess__ = !isRequiredForSuccess__;");
                self.body.push(
                    "if(ruleResult__.success())\n    \
                         ruleResult__ = this->makeFail(startLocation__, \"not allowed here\", isRequiredForSuccess__);\n\
                     else\n    \
                         ruleResult__ = this->makeSuccess(startLocation__);",
                );
            }
            Expr::CodeSnippet { span, code } => {
                self.body.push("{");
                self.spliced_user_code(code, *span);
                self.body.push("}");
                self.body
                    .push("ruleResult__ = this->makeSuccess(startLocation__);");
            }
            Expr::CustomPredicate { span, code } => {
                self.needs_is_required = true;
                self.body.push("{");
                self.body.indent();
                self.body
                    .push("const char *predicateReturnValue__ = nullptr;");
                self.body.push("{");
                self.spliced_user_code(code, *span);
                self.body.push("}");
                self.body
                    .push("ruleResult__ = this->makeSuccess(startLocation__);");
                self.body.push(
                    "if(predicateReturnValue__ != nullptr)\n    \
                         ruleResult__ = this->makeFail(startLocation__, predicateReturnValue__, isRequiredForSuccess__);",
                );
                self.body.dedent();
                self.body.push("}");
            }
        }
    }

    /// The shared greedy-repetition loop: keep applying the inner
    /// expression while it succeeds and consumes input, absorbing the
    /// last attempt's end location so error tracking survives the exit.
    fn repetition_loop(&mut self, inner: &Expr) {
        self.body.push("{");
        self.body.indent();
        self.body.push("auto savedStartLocation__ = startLocation__;");
        self.body.push("auto &savedRuleResult__ = ruleResult__;");
        self.body.push("while(true)\n{");
        self.body.indent();
        self.body.push("Parser::RuleResult ruleResult__;");
        self.body.push("startLocation__ = savedRuleResult__.location;");
        self.lower(inner);
        self.body.push(
            "if(ruleResult__.fail() || ruleResult__.location == startLocation__)\n\
             {\n    \
                 savedRuleResult__ = this->makeSuccess(savedRuleResult__.location, ruleResult__.endLocation);\n    \
                 startLocation__ = savedStartLocation__;\n    \
                 break;\n\
             }",
        );
        self.body
            .push("savedRuleResult__ = this->makeSuccess(ruleResult__.location, ruleResult__.endLocation);");
        self.body.dedent();
        self.body.push("}");
        self.body.dedent();
        self.body.push("}");
    }

    fn finish(self) -> Output {
        let mut header = self.header;
        let mut body = self.body;
        header.push("};\n}");
        header.blank();
        let guard = guard_macro_name(&self.names.header_name_from_source);
        header.push(&format!("#endif /* {guard} */"));
        body.push("}");
        Output {
            header: header.render(&self.names.header_file_name),
            source: body.render(&self.names.source_file_name),
        }
    }
}
