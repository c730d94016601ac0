//! Parse trees and their event traversal.
//!
//! A tree node is a terminal character, a single child (a unary production
//! re-inserted after the chart fill), or a binary branch. Nodes of named
//! rules carry `fire = true` and produce a [`Visit::Pre`] before their
//! children and a [`Visit::Post`] after them. Synthetic nodes are walked
//! through silently.

use crate::intern::{RuleIndex, EOF_SIGN};

/// Position of an event relative to a node's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visit {
    Pre,
    Post,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Terminal(char),
    Chain(Box<TreeNode>),
    Branch(Box<TreeNode>, Box<TreeNode>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub rule: RuleIndex,
    pub fire: bool,
    pub kind: NodeKind,
}

impl TreeNode {
    pub fn terminal(rule: RuleIndex, fire: bool, c: char) -> Self {
        TreeNode {
            rule,
            fire,
            kind: NodeKind::Terminal(c),
        }
    }

    pub fn chain(rule: RuleIndex, fire: bool, child: TreeNode) -> Self {
        TreeNode {
            rule,
            fire,
            kind: NodeKind::Chain(Box::new(child)),
        }
    }

    pub fn branch(rule: RuleIndex, fire: bool, left: TreeNode, right: TreeNode) -> Self {
        TreeNode {
            rule,
            fire,
            kind: NodeKind::Branch(Box::new(left), Box::new(right)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal(_))
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&TreeNode> {
        match &self.kind {
            NodeKind::Terminal(_) => Vec::new(),
            NodeKind::Chain(child) => vec![&**child],
            NodeKind::Branch(left, right) => vec![&**left, &**right],
        }
    }

    /// The input text covered by this node, without the end-of-input sentinel.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Terminal(c) if *c == EOF_SIGN => {}
                NodeKind::Terminal(c) => out.push(*c),
                NodeKind::Chain(child) => stack.push(&**child),
                NodeKind::Branch(left, right) => {
                    stack.push(&**right);
                    stack.push(&**left);
                }
            }
        }
    }

    /// Number of nodes in the subtree.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            match &node.kind {
                NodeKind::Terminal(_) => {}
                NodeKind::Chain(child) => stack.push(&**child),
                NodeKind::Branch(left, right) => {
                    stack.push(&**left);
                    stack.push(&**right);
                }
            }
        }
        count
    }

    /// Walk the tree depth first, left to right.
    ///
    /// `visit` is called with [`Visit::Pre`] before and [`Visit::Post`]
    /// after the subtree of every node marked to fire. The first error
    /// stops the walk.
    pub fn walk<F, E>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(Visit, &TreeNode) -> Result<(), E>,
    {
        let mut stack = vec![(self, Visit::Pre)];
        while let Some((node, step)) = stack.pop() {
            match step {
                Visit::Pre => {
                    if node.fire {
                        visit(Visit::Pre, node)?;
                        stack.push((node, Visit::Post));
                    }
                    match &node.kind {
                        NodeKind::Terminal(_) => {}
                        NodeKind::Chain(child) => stack.push((&**child, Visit::Pre)),
                        NodeKind::Branch(left, right) => {
                            stack.push((&**right, Visit::Pre));
                            stack.push((&**left, Visit::Pre));
                        }
                    }
                }
                Visit::Post => visit(Visit::Post, node)?,
            }
        }
        Ok(())
    }
}
