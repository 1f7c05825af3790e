//! Grammar AST. Nonterminals and semantic types live in entity maps on
//! [`Grammar`]; expression trees reference them by handle, so the shared
//! call-site structure is a DAG without real pointer cycles and the
//! whole grammar drops in one piece.

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::ranges::CharRanges;
use crate::span::Span;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NonterminalHandle(u32);
entity_impl!(NonterminalHandle);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TypeHandle(u32);
entity_impl!(TypeHandle);

/// A user- or built-in-declared semantic type.
#[derive(Clone, Debug)]
pub struct Type {
    pub span: Span,
    /// Display name, unique within the grammar.
    pub name: String,
    /// Emitted target-language text, e.g. `::std::string`.
    pub code: String,
    pub is_void: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TopLevelCodeKind {
    License,
    Header,
    Source,
}

#[derive(Clone, Debug)]
pub struct TopLevelCode {
    pub span: Span,
    pub kind: TopLevelCodeKind,
    pub code: String,
}

/// Analysis results; every flag starts pessimistic and is narrowed by
/// the fixed-point passes.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub caching: bool,
    pub has_left_recursion: bool,
    pub can_accept_empty_string: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            caching: true,
            has_left_recursion: true,
            can_accept_empty_string: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Nonterminal {
    /// First mention in the grammar.
    pub span: Span,
    pub name: String,
    /// `None` until (and unless) a defining rule is parsed.
    pub expr: Option<Expr>,
    /// Explicit annotation from the rule header; analysis fills in the
    /// inferred type.
    pub ty: Option<TypeHandle>,
    pub settings: Settings,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubstitutionKind {
    ReturnValue,
    PredicateReturnValue,
}

/// A `$$` marker in a code snippet: the kind to splice and the offset
/// in the snippet text where it goes. Offsets are strictly increasing.
#[derive(Clone, Copy, Debug)]
pub struct Substitution {
    pub kind: SubstitutionKind,
    pub offset: u32,
}

#[derive(Clone, Debug)]
pub struct CodeBlock {
    pub code: String,
    pub substitutions: Vec<Substitution>,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Empty {
        span: Span,
    },
    Terminal {
        span: Span,
        /// A single codepoint; kept as a raw scalar because escapes can
        /// name values `char` cannot hold.
        value: u32,
    },
    EofTerminal {
        span: Span,
    },
    CharacterClass {
        span: Span,
        inverted: bool,
        ranges: CharRanges,
        variable: Option<String>,
    },
    NonterminalRef {
        span: Span,
        target: NonterminalHandle,
        variable: Option<String>,
    },
    Sequence {
        span: Span,
        first: Box<Expr>,
        second: Box<Expr>,
    },
    OrderedChoice {
        span: Span,
        first: Box<Expr>,
        second: Box<Expr>,
    },
    Optional {
        span: Span,
        inner: Box<Expr>,
    },
    ZeroOrMore {
        span: Span,
        inner: Box<Expr>,
    },
    OneOrMore {
        span: Span,
        inner: Box<Expr>,
    },
    FollowedBy {
        span: Span,
        inner: Box<Expr>,
    },
    NotFollowedBy {
        span: Span,
        inner: Box<Expr>,
    },
    CodeSnippet {
        span: Span,
        code: CodeBlock,
    },
    /// `&{ ... }`: user code deciding success, consuming nothing.
    CustomPredicate {
        span: Span,
        code: CodeBlock,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Empty { span }
            | Expr::Terminal { span, .. }
            | Expr::EofTerminal { span }
            | Expr::CharacterClass { span, .. }
            | Expr::NonterminalRef { span, .. }
            | Expr::Sequence { span, .. }
            | Expr::OrderedChoice { span, .. }
            | Expr::Optional { span, .. }
            | Expr::ZeroOrMore { span, .. }
            | Expr::OneOrMore { span, .. }
            | Expr::FollowedBy { span, .. }
            | Expr::NotFollowedBy { span, .. }
            | Expr::CodeSnippet { span, .. }
            | Expr::CustomPredicate { span, .. } => *span,
        }
    }

    /// Pre-order walk over this expression tree.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Sequence { first, second, .. } | Expr::OrderedChoice { first, second, .. } => {
                first.walk(f);
                second.walk(f);
            }
            Expr::Optional { inner, .. }
            | Expr::ZeroOrMore { inner, .. }
            | Expr::OneOrMore { inner, .. }
            | Expr::FollowedBy { inner, .. }
            | Expr::NotFollowedBy { inner, .. } => inner.walk(f),
            _ => {}
        }
    }

    /// Whether a rule consisting of this expression is worth memoizing.
    /// Cheap leaves are not; anything with backtracking structure is.
    pub fn default_needs_caching(&self) -> bool {
        match self {
            Expr::Empty { .. }
            | Expr::Terminal { .. }
            | Expr::EofTerminal { .. }
            | Expr::NonterminalRef { .. } => false,
            Expr::Sequence { .. }
            | Expr::OrderedChoice { .. }
            | Expr::ZeroOrMore { .. }
            | Expr::OneOrMore { .. }
            | Expr::CharacterClass { .. }
            | Expr::CodeSnippet { .. }
            | Expr::CustomPredicate { .. } => true,
            Expr::Optional { inner, .. }
            | Expr::FollowedBy { inner, .. }
            | Expr::NotFollowedBy { inner, .. } => inner.default_needs_caching(),
        }
    }

    /// Nullability, reading the current fixed-point state of referenced
    /// nonterminals from `grammar`.
    pub fn can_accept_empty_string(&self, grammar: &Grammar) -> bool {
        match self {
            Expr::Empty { .. }
            | Expr::Optional { .. }
            | Expr::ZeroOrMore { .. }
            | Expr::FollowedBy { .. }
            | Expr::NotFollowedBy { .. }
            | Expr::CodeSnippet { .. }
            | Expr::CustomPredicate { .. } => true,
            Expr::Terminal { .. } | Expr::EofTerminal { .. } | Expr::CharacterClass { .. } => false,
            Expr::NonterminalRef { target, .. } => {
                grammar.nonterminals[*target].settings.can_accept_empty_string
            }
            Expr::Sequence { first, second, .. } => {
                first.can_accept_empty_string(grammar) && second.can_accept_empty_string(grammar)
            }
            Expr::OrderedChoice { first, second, .. } => {
                first.can_accept_empty_string(grammar) || second.can_accept_empty_string(grammar)
            }
            Expr::OneOrMore { inner, .. } => inner.can_accept_empty_string(grammar),
        }
    }

    /// Whether this expression can reach a left-recursive nonterminal
    /// without consuming input first, under the current fixed-point
    /// state.
    pub fn has_left_recursion(&self, grammar: &Grammar) -> bool {
        match self {
            Expr::Empty { .. }
            | Expr::Terminal { .. }
            | Expr::EofTerminal { .. }
            | Expr::CharacterClass { .. }
            | Expr::CodeSnippet { .. }
            | Expr::CustomPredicate { .. } => false,
            Expr::NonterminalRef { target, .. } => {
                grammar.nonterminals[*target].settings.has_left_recursion
            }
            Expr::Sequence { first, second, .. } => {
                first.has_left_recursion(grammar)
                    || (first.can_accept_empty_string(grammar) && second.has_left_recursion(grammar))
            }
            Expr::OrderedChoice { first, second, .. } => {
                first.has_left_recursion(grammar) || second.has_left_recursion(grammar)
            }
            Expr::Optional { inner, .. }
            | Expr::ZeroOrMore { inner, .. }
            | Expr::OneOrMore { inner, .. }
            | Expr::FollowedBy { inner, .. }
            | Expr::NotFollowedBy { inner, .. } => inner.has_left_recursion(grammar),
        }
    }
}

pub struct Grammar {
    pub span: Span,
    pub top_level_code: Vec<TopLevelCode>,
    pub types: PrimaryMap<TypeHandle, Type>,
    pub nonterminals: PrimaryMap<NonterminalHandle, Nonterminal>,
    /// Rule declaration order; this is the emission order.
    pub order: Vec<NonterminalHandle>,
    pub void_type: TypeHandle,
    pub char_type: TypeHandle,
}

impl Grammar {
    pub fn new(span: Span) -> Grammar {
        let mut types = PrimaryMap::new();
        let void_type = types.push(Type {
            span: Span::empty(),
            name: "void".to_owned(),
            code: "void".to_owned(),
            is_void: true,
        });
        let char_type = types.push(Type {
            span: Span::empty(),
            name: "char".to_owned(),
            code: "char32_t".to_owned(),
            is_void: false,
        });
        Grammar {
            span,
            top_level_code: Vec::new(),
            types,
            nonterminals: PrimaryMap::new(),
            order: Vec::new(),
            void_type,
            char_type,
        }
    }

    pub fn rule_type(&self, handle: NonterminalHandle) -> TypeHandle {
        self.nonterminals[handle].ty.unwrap_or(self.void_type)
    }

    pub fn code_blocks(
        &self,
        kind: TopLevelCodeKind,
    ) -> impl Iterator<Item = &TopLevelCode> + '_ {
        self.top_level_code
            .iter()
            .filter(move |block| block.kind == kind)
    }
}
