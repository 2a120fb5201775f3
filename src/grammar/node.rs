use std::{
    collections::HashSet,
    ops::{Index, IndexMut},
};

use crate::{cursor::Position, distribution::WeightedDistribution};

use super::charclass::CharClassSet;

/// Stable handle of a node inside its grammar's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Match repetition bounds; `max == None` is unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repetition {
    pub min: usize,
    pub max: Option<usize>,
}

impl Repetition {
    pub const ONCE: Repetition = Repetition {
        min: 1,
        max: Some(1),
    };
    pub const OPTIONAL: Repetition = Repetition {
        min: 0,
        max: Some(1),
    };
    pub const AT_LEAST_ONCE: Repetition = Repetition { min: 1, max: None };
    pub const ANY: Repetition = Repetition { min: 0, max: None };

    pub fn admits(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// Generation repetition bounds. `max == None` falls back to the engine's
/// `max_gen_repetition` ceiling at generation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenRepetition {
    pub min: usize,
    pub max: Option<usize>,
    pub pow: f64,
}

impl From<Repetition> for GenRepetition {
    fn from(value: Repetition) -> Self {
        GenRepetition {
            min: value.min,
            max: value.max,
            pow: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Alternation {
    pub children: Vec<NodeId>,
    /// configured choice weights, keyed by child position
    pub weights: WeightedDistribution<usize>,
    /// one/zero weights selecting only children that cannot recurse
    pub non_recursive: WeightedDistribution<usize>,
}

impl Alternation {
    fn new() -> Self {
        Alternation {
            children: vec![],
            weights: WeightedDistribution::uniform(vec![]),
            non_recursive: WeightedDistribution::uniform(vec![]),
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Terminal(String),
    CharClass(CharClassSet),
    NonTerminal {
        rule: String,
        target: Option<NodeId>,
    },
    SubExpression(Vec<NodeId>),
    Alternative(Alternation),
    Expression {
        rule: String,
        children: Vec<NodeId>,
    },
    LookAhead {
        positive: bool,
        child: Option<NodeId>,
    },
    Cut,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Position,
    pub repetition: Repetition,
    pub generation: GenRepetition,
    pub name: Option<String>,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind, position: Position) -> Self {
        Node {
            kind,
            position,
            repetition: Repetition::ONCE,
            generation: Repetition::ONCE.into(),
            name: None,
            parent: None,
        }
    }

    pub fn alternative(position: Position) -> Self {
        Node::new(NodeKind::Alternative(Alternation::new()), position)
    }

    pub fn set_repetition(&mut self, repetition: Repetition) {
        self.repetition = repetition;
        self.generation = repetition.into();
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::SubExpression(children) | NodeKind::Expression { children, .. } => children,
            NodeKind::Alternative(alternation) => &alternation.children,
            NodeKind::LookAhead {
                child: Some(child), ..
            } => std::slice::from_ref(child),
            _ => &[],
        }
    }

    /// Appends a child to a container node. Leaves and already filled
    /// lookaheads refuse and return `false`.
    pub fn push_child(&mut self, id: NodeId) -> bool {
        match &mut self.kind {
            NodeKind::SubExpression(children) | NodeKind::Expression { children, .. } => {
                children.push(id)
            }
            NodeKind::Alternative(alternation) => alternation.children.push(id),
            NodeKind::LookAhead { child, .. } if child.is_none() => *child = Some(id),
            _ => return false,
        }
        true
    }

    pub fn is_alternative(&self) -> bool {
        matches!(self.kind, NodeKind::Alternative(_))
    }

    /// Short description used in backtraces and match traces.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Terminal(literal) => format!("Terminal: '{literal}'"),
            NodeKind::CharClass(set) => format!("CharacterClass: '{}'", set.source()),
            NodeKind::NonTerminal { rule, .. } => format!("NonTerminal: '{rule}'"),
            NodeKind::SubExpression(_) => "SubExpression".to_string(),
            NodeKind::Alternative(_) => "AlternativeExpression".to_string(),
            NodeKind::Expression { rule, .. } => format!("Expression: '{rule}'"),
            NodeKind::LookAhead { positive: true, .. } => "positive LookAhead".to_string(),
            NodeKind::LookAhead { positive: false, .. } => "negative LookAhead".to_string(),
            NodeKind::Cut => "Cut".to_string(),
        }
    }

    pub fn match_error_label(&self) -> String {
        format!("Could not match {}", self.describe())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    /// rule roots whose expansion can never reach a rule reference cycle
    finite_rules: HashSet<NodeId>,
}

impl NodeArena {
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Links `child` under `parent`, recording the back-reference.
    pub fn adopt(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.nodes[parent.0].push_child(child) {
            return false;
        }
        self.nodes[child.0].parent = Some(parent);
        true
    }

    pub fn set_finite_rules(&mut self, rules: HashSet<NodeId>) {
        self.finite_rules = rules;
    }

    pub fn is_finite_rule(&self, id: NodeId) -> bool {
        self.finite_rules.contains(&id)
    }

    /// Whether the subtree under `id` references a rule that is not finite.
    /// Lookaheads never generate anything and count as non-recursive.
    pub fn is_potentially_recursive(&self, id: NodeId) -> bool {
        match &self[id].kind {
            NodeKind::NonTerminal { target, .. } => {
                target.map_or(true, |target| !self.is_finite_rule(target))
            }
            NodeKind::LookAhead { .. } => false,
            _ => self[id]
                .children()
                .iter()
                .any(|child| self.is_potentially_recursive(*child)),
        }
    }

    /// Targets of the rule references generated under `id`, skipping lookaheads.
    pub fn referenced_rules(&self, id: NodeId) -> Vec<NodeId> {
        match &self[id].kind {
            NodeKind::NonTerminal { target, .. } => target.iter().copied().collect(),
            NodeKind::LookAhead { .. } => vec![],
            _ => self[id]
                .children()
                .iter()
                .flat_map(|child| self.referenced_rules(*child))
                .collect(),
        }
    }

    /// Depth-first search for a node bound to `name` within one rule.
    pub fn find_named(&self, root: NodeId, name: &str) -> Option<NodeId> {
        if self[root].name.as_deref() == Some(name) {
            return Some(root);
        }

        self[root]
            .children()
            .iter()
            .find_map(|child| self.find_named(*child, name))
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output {
        &mut self.nodes[index.0]
    }
}
