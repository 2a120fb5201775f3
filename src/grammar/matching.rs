use std::fmt::Display;

use itertools::Itertools;
use ringbuffer::{AllocRingBuffer, RingBufferExt, RingBufferWrite};

use crate::cursor::{Cursor, Position};

use super::node::{NodeArena, NodeId, NodeKind};

const TRACE_CAPACITY: usize = 4096;

macro_rules! trace {
    ($context:expr, $($e:expr),+) => {
        if $context.trace.is_some() {
            let line = format!("{}{}", "  ".repeat($context.depth), format!($($e),+));
            if let Some(trace) = $context.trace.as_mut() {
                trace.push(line);
            }
        }
    };
}

/// One step of a failure chain, deepest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceEntry {
    pub node: Option<NodeId>,
    pub label: String,
    pub position: Position,
    pub message: String,
}

impl Display for BacktraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = [self.label.as_str(), self.message.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .join(" ");
        write!(f, "at line {}: {}", self.position, text)
    }
}

/// Structured reason a match failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchFailure {
    pub backtrace: Vec<BacktraceEntry>,
}

impl MatchFailure {
    /// Position of the deepest failure.
    pub fn position(&self) -> Option<Position> {
        self.backtrace.first().map(|entry| entry.position)
    }

    /// Whether the text matched but left input unconsumed.
    pub fn is_trailing_input(&self) -> bool {
        self.backtrace.len() == 1 && self.backtrace[0].node.is_none()
    }
}

impl Display for MatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matching Error:")?;
        for entry in &self.backtrace {
            write!(f, "\n    {entry}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MatchOutcome {
    failure: Option<MatchFailure>,
    trace: Vec<String>,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&MatchFailure> {
        self.failure.as_ref()
    }

    /// Verbose per-node trace; empty unless tracing was enabled.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

struct RawEntry {
    node: Option<NodeId>,
    position: Position,
    message: String,
}

/// State of a single match call. Nothing here outlives the call, so several
/// matches may run against one grammar at the same time.
struct MatchContext<'g> {
    nodes: &'g NodeArena,
    /// one cut flag per alternative attempt in progress, innermost last
    cut_stack: Vec<bool>,
    error: Vec<RawEntry>,
    trace: Option<AllocRingBuffer<String>>,
    depth: usize,
}

/// Matches `text` against the rule rooted at `root`. The whole text must be
/// consumed for the match to succeed.
pub fn match_text(nodes: &NodeArena, root: NodeId, text: &str, create_trace: bool) -> MatchOutcome {
    let mut context = MatchContext {
        nodes,
        cut_stack: vec![],
        error: vec![],
        trace: create_trace.then(|| AllocRingBuffer::with_capacity(TRACE_CAPACITY)),
        depth: 0,
    };

    let mut cursor = Cursor::new(text);
    let matched = context.match_node(root, &mut cursor);

    if matched && cursor.has_next() {
        context.error(
            None,
            cursor.position(),
            format!("There are unmatched characters left: '{}'", cursor.remainder()),
        );
    }

    let failure = if matched && !cursor.has_next() {
        None
    } else {
        Some(context.failure())
    };

    let trace = context
        .trace
        .map(|trace| trace.iter().cloned().collect_vec())
        .unwrap_or_default();

    MatchOutcome { failure, trace }
}

impl<'g> MatchContext<'g> {
    /// Starts a new failure chain.
    fn error<M: Into<String>>(&mut self, node: Option<NodeId>, position: Position, message: M) {
        self.error.clear();
        self.append(node, position, message);
    }

    fn append<M: Into<String>>(&mut self, node: Option<NodeId>, position: Position, message: M) {
        self.error.push(RawEntry {
            node,
            position,
            message: message.into(),
        });
    }

    fn failure(&mut self) -> MatchFailure {
        let nodes = self.nodes;
        let backtrace = self
            .error
            .drain(..)
            .map(|entry| BacktraceEntry {
                node: entry.node,
                label: entry
                    .node
                    .map(|id| nodes[id].match_error_label())
                    .unwrap_or_default(),
                position: entry.position,
                message: entry.message,
            })
            .collect();

        MatchFailure { backtrace }
    }

    /// Repetition driver shared by every node kind.
    fn match_node(&mut self, id: NodeId, cursor: &mut Cursor) -> bool {
        let repetition = self.nodes[id].repetition;
        let start = *cursor;
        let mut count = 0;

        while repetition.max.map_or(true, |max| count < max) {
            let before = cursor.index();
            if !self.try_match(id, cursor) {
                break;
            }
            count += 1;

            // an empty occurrence would repeat forever
            if cursor.index() == before {
                count = count.max(repetition.min);
                break;
            }
        }

        if count >= repetition.min {
            true
        } else {
            *cursor = start;
            false
        }
    }

    /// Attempts exactly one occurrence. The cursor only moves on success.
    fn try_match(&mut self, id: NodeId, cursor: &mut Cursor) -> bool {
        let nodes = self.nodes;
        let node = &nodes[id];

        trace!(self, "{} at {}", node.describe(), cursor.position());
        self.depth += 1;

        let position = cursor.position();
        let matched = match &node.kind {
            NodeKind::Terminal(literal) => {
                if cursor.consume(literal) {
                    true
                } else {
                    let found = cursor.peek(literal.chars().count());
                    self.error(Some(id), position, found_message(found));
                    false
                }
            }

            NodeKind::CharClass(set) => match cursor.current() {
                Some(c) if set.contains(c) => {
                    cursor.next();
                    true
                }
                Some(c) => {
                    self.error(Some(id), position, format!("found '{c}'"));
                    false
                }
                None => {
                    self.error(Some(id), position, "unexpected end of input");
                    false
                }
            },

            NodeKind::NonTerminal { target, rule } => match target {
                Some(target) => self.try_match(*target, cursor),
                None => {
                    self.error(Some(id), position, format!("rule `{rule}` is not linked"));
                    false
                }
            },

            NodeKind::SubExpression(children) | NodeKind::Expression { children, .. } => {
                let mut probe = *cursor;
                let matched = children
                    .iter()
                    .all(|child| self.match_node(*child, &mut probe));

                if matched {
                    *cursor = probe;
                } else {
                    self.append(Some(id), position, "");
                }
                matched
            }

            NodeKind::Alternative(alternation) => {
                self.cut_stack.push(false);

                let mut matched = false;
                for child in &alternation.children {
                    let mut probe = *cursor;
                    if self.match_node(*child, &mut probe) {
                        *cursor = probe;
                        matched = true;
                        break;
                    }
                    if self.cut_stack.last() == Some(&true) {
                        break;
                    }
                }

                let cut = self.cut_stack.pop().unwrap_or(false);
                if !matched {
                    let message = if cut { "(committed by cut)" } else { "" };
                    self.append(Some(id), position, message);
                }
                matched
            }

            NodeKind::LookAhead { positive, child } => match child {
                Some(child) => {
                    let mut probe = *cursor;
                    let matched = self.match_node(*child, &mut probe);

                    if matched == *positive {
                        true
                    } else {
                        if *positive {
                            self.append(Some(id), position, "");
                        } else {
                            let consumed = probe.slice_from(cursor.index());
                            self.error(
                                Some(id),
                                position,
                                format!("operand matched '{consumed}'"),
                            );
                        }
                        false
                    }
                }
                None => true,
            },

            NodeKind::Cut => {
                if let Some(cut) = self.cut_stack.last_mut() {
                    *cut = true;
                }
                true
            }
        };

        self.depth -= 1;
        trace!(
            self,
            "{} {}",
            node.describe(),
            if matched { "matched" } else { "failed" }
        );

        matched
    }
}

fn found_message(found: &str) -> String {
    if found.is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("found '{found}'")
    }
}
