use vector_map::VecMap;

use crate::error::GrammarError;

use super::{
    charclass::CharClassSet,
    lexer::{Lexer, Token, TokenKind},
    node::{Node, NodeArena, NodeId, NodeKind},
    quantifier::repetition_of,
};

/// What kind of container the parser is currently filling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    None,
    Expression,
    SubExpression,
    Alternative,
    LookAhead,
}

/// Node graph and rule table as produced by one pass over the source,
/// before references are linked.
pub struct ParsedGrammar {
    pub nodes: NodeArena,
    pub rules: VecMap<String, NodeId>,
}

pub fn parse_source(source: &str) -> Result<ParsedGrammar, GrammarError> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        nodes: NodeArena::default(),
        rules: VecMap::new(),
        root: None,
        current: None,
    };

    parser.run()?;

    Ok(ParsedGrammar {
        nodes: parser.nodes,
        rules: parser.rules,
    })
}

struct Parser<'s> {
    lexer: Lexer<'s>,
    nodes: NodeArena,
    rules: VecMap<String, NodeId>,
    /// expression of the rule being defined
    root: Option<NodeId>,
    /// open container new nodes are added to
    current: Option<NodeId>,
}

impl<'s> Parser<'s> {
    fn state(&self) -> State {
        let Some(current) = self.current else {
            return State::None;
        };

        match self.nodes[current].kind {
            NodeKind::Expression { .. } => State::Expression,
            NodeKind::SubExpression(_) => State::SubExpression,
            NodeKind::Alternative(_) => State::Alternative,
            NodeKind::LookAhead { .. } => State::LookAhead,
            // leaves never become the current container
            _ => State::None,
        }
    }

    fn run(&mut self) -> Result<(), GrammarError> {
        while self.lexer.has_next()? {
            let token = self.lexer.next()?;

            match self.state() {
                State::None => self.open_rule(token)?,
                state => {
                    if token.is(TokenKind::Name) && self.lexer.peek()?.is(TokenKind::Define) {
                        self.close_rule(&token)?;
                        self.open_rule(token)?;
                    } else {
                        self.read_element(token, state)?;
                    }
                }
            }
        }

        if let Some(root) = self.root {
            if self.current != Some(root) {
                let position = self.lexer.peek()?.position;
                return Err(GrammarError::parse(
                    position,
                    format!(
                        "unexpected end of grammar: unterminated subexpression in rule `{}`",
                        self.rule_name(root)
                    ),
                ));
            }
        }

        Ok(())
    }

    fn rule_name(&self, root: NodeId) -> &str {
        match &self.nodes[root].kind {
            NodeKind::Expression { rule, .. } => rule,
            _ => "",
        }
    }

    fn open_rule(&mut self, token: Token) -> Result<(), GrammarError> {
        if !token.is(TokenKind::Name) {
            return Err(GrammarError::parse(
                token.position,
                format!("expected rule name, found {token}"),
            ));
        }

        let define = self.lexer.next()?;
        if !define.is(TokenKind::Define) {
            return Err(GrammarError::parse(
                define.position,
                format!("expected '::=' after rule name `{}`, found {define}", token.text),
            ));
        }

        if self.rules.contains_key(&token.text) {
            return Err(GrammarError::parse(
                token.position,
                format!("redefining rule `{}`", token.text),
            ));
        }

        let mut expression = Node::new(
            NodeKind::Expression {
                rule: token.text.clone(),
                children: vec![],
            },
            token.position,
        );
        expression.name = Some(token.text.clone());

        let id = self.nodes.alloc(expression);
        self.rules.insert(token.text, id);
        self.root = Some(id);
        self.current = Some(id);

        Ok(())
    }

    fn close_rule(&mut self, next_rule: &Token) -> Result<(), GrammarError> {
        match self.root {
            Some(root) if self.current == Some(root) => Ok(()),
            Some(root) => Err(GrammarError::parse(
                next_rule.position,
                format!(
                    "rule `{}` starts before subexpression in rule `{}` is closed",
                    next_rule.text,
                    self.rule_name(root)
                ),
            )),
            None => Ok(()),
        }
    }

    fn read_element(&mut self, token: Token, state: State) -> Result<(), GrammarError> {
        let node = match token.kind {
            TokenKind::ExpStart => {
                self.open_container(Node::new(NodeKind::SubExpression(vec![]), token.position));
                return Ok(());
            }

            TokenKind::PosLookAhead | TokenKind::NegLookAhead => {
                if state == State::LookAhead {
                    return Err(GrammarError::parse(
                        token.position,
                        "lookahead must be followed by a single operand, found another lookahead",
                    ));
                }

                let positive = token.is(TokenKind::PosLookAhead);
                self.open_container(Node::new(
                    NodeKind::LookAhead {
                        positive,
                        child: None,
                    },
                    token.position,
                ));
                return Ok(());
            }

            TokenKind::ExpEnd => self.close_group(&token, state)?,

            _ => self.create_leaf(&token)?,
        };

        if self.lexer.peek()?.is_quantifier() {
            let quantifier = self.lexer.next()?;
            self.set_name(node, &quantifier)?;
            let repetition = repetition_of(&quantifier)?;
            self.nodes[node].set_repetition(repetition);
        }

        self.attach(node)
    }

    /// Builds the leaf node a primary token stands for.
    fn create_leaf(&mut self, token: &Token) -> Result<NodeId, GrammarError> {
        let kind = match token.kind {
            TokenKind::String => NodeKind::Terminal(token.text.clone()),
            TokenKind::Name => NodeKind::NonTerminal {
                rule: token.text.clone(),
                target: None,
            },
            TokenKind::CharClass => {
                NodeKind::CharClass(CharClassSet::parse(&token.text, token.position)?)
            }
            TokenKind::Cut => NodeKind::Cut,
            _ => {
                return Err(GrammarError::parse(
                    token.position,
                    format!("unexpected token: cannot create grammar node from {token}"),
                ))
            }
        };

        Ok(self.nodes.alloc(Node::new(kind, token.position)))
    }

    /// A new container is parented to the current one but only becomes its
    /// child once it is closed.
    fn open_container(&mut self, mut node: Node) {
        node.parent = self.current;
        self.current = Some(self.nodes.alloc(node));
    }

    fn close_group(&mut self, token: &Token, state: State) -> Result<NodeId, GrammarError> {
        if state == State::Alternative {
            self.current = self.current.and_then(|alternative| self.nodes[alternative].parent);
        }

        let group = match (self.current, self.state()) {
            (Some(group), State::SubExpression) => group,
            (_, State::LookAhead) => {
                return Err(GrammarError::parse(
                    token.position,
                    "lookahead is missing its operand before ')'",
                ))
            }
            _ => {
                return Err(GrammarError::parse(
                    token.position,
                    "found end of subexpression outside a subexpression",
                ))
            }
        };

        self.set_name(group, token)?;
        self.current = self.nodes[group].parent;

        Ok(group)
    }

    fn set_name(&mut self, node: NodeId, token: &Token) -> Result<(), GrammarError> {
        let Some(name) = &token.binding else {
            return Ok(());
        };

        if let Some(existing) = &self.nodes[node].name {
            return Err(GrammarError::parse(
                token.position,
                format!("node may not have multiple names (`{existing}` and `{name}`)"),
            ));
        }

        self.nodes[node].name = Some(name.clone());
        Ok(())
    }

    /// Adds a finished node to the current container, opening an alternation
    /// around it when an `|` follows, and closing containers that are
    /// complete afterwards.
    fn attach(&mut self, mut node: NodeId) -> Result<(), GrammarError> {
        loop {
            let Some(container) = self.current else {
                return Err(GrammarError::parse(
                    self.nodes[node].position,
                    "grammar element outside of a rule",
                ));
            };

            if self.state() == State::LookAhead {
                self.adopt(container, node)?;
                // the finished lookahead is itself an operand of its parent
                node = container;
                self.current = self.nodes[container].parent;
                continue;
            }

            let state = self.state();
            let next = self.lexer.peek()?;
            if state != State::Alternative && next.is(TokenKind::Or) {
                let alternative = self.nodes.alloc(Node::alternative(next.position));
                self.adopt(container, alternative)?;
                self.current = Some(alternative);
            }

            let container = self.current.unwrap_or(container);
            self.adopt(container, node)?;

            if self.state() == State::Alternative {
                if self.lexer.peek()?.is(TokenKind::Or) {
                    self.lexer.next()?;
                } else {
                    self.current = self.nodes[container].parent;
                }
            }

            return Ok(());
        }
    }

    fn adopt(&mut self, container: NodeId, node: NodeId) -> Result<(), GrammarError> {
        if self.nodes.adopt(container, node) {
            Ok(())
        } else {
            Err(GrammarError::parse(
                self.nodes[node].position,
                format!("{} cannot hold another element", self.nodes[container].describe()),
            ))
        }
    }
}
