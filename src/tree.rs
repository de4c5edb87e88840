//! Category hierarchy.
//!
//! The categories endpoint returns a flat list where each record may point at a parent.
//! [`build_forest`] turns that into a forest that is always safe to walk: parents that do not
//! exist, duplicate ids and reference cycles are recovered from locally (the affected category
//! becomes a root) and reported through [`Forest::issues`] instead of failing.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::warn;

use crate::client::Category;
use crate::types::CategoryId;

/// One category placed in a [`Forest`]. Parent and children are positions in the forest, so
/// nothing that walks or drops a tree recurses on its depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: Category,
    pub depth: usize,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Data problems found while building the forest. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralIssue {
    #[error("category {category} points at missing parent {parent}; shown as a root")]
    UnresolvedParent {
        category: CategoryId,
        parent: CategoryId,
    },
    #[error("category {category} is part of a parent cycle; shown as a root")]
    Cycle { category: CategoryId },
    #[error("category id {category} appears more than once; later copies shown as roots")]
    DuplicateId { category: CategoryId },
}

/// How siblings are ordered under a parent (and among roots).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SiblingOrder {
    /// Keep the order the server returned.
    #[default]
    Input,
    /// Case-insensitive by name; ties keep input order.
    Name,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    /// One node per input record, in input order.
    nodes: Vec<CategoryNode>,
    roots: Vec<usize>,
    index: HashMap<CategoryId, usize>,
    pub issues: Vec<StructuralIssue>,
}

impl Forest {
    pub fn roots(&self) -> impl Iterator<Item = &CategoryNode> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(&'a self, node: &'a CategoryNode) -> impl Iterator<Item = &'a CategoryNode> {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// The node's parent in the tree. Categories demoted to roots have none, whatever their
    /// record says.
    pub fn parent(&self, node: &CategoryNode) -> Option<&CategoryNode> {
        node.parent.map(|p| &self.nodes[p])
    }

    pub fn find(&self, id: &CategoryId) -> Option<&CategoryNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Pre-order visit of every node.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a CategoryNode)) {
        let nodes = &self.nodes;
        self.walk_positions(|i| visit(&nodes[i]));
    }

    fn walk_positions(&self, mut visit: impl FnMut(usize)) {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            visit(i);
            stack.extend(self.nodes[i].children.iter().rev());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(|n| out.push(n));
        out.into_iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Categories an edit form may offer as the new parent of `category_id`: everything except
    /// the category itself and its descendants.
    pub fn valid_parents(&self, category_id: &CategoryId) -> Vec<&Category> {
        let mut excluded = vec![false; self.nodes.len()];
        if let Some(&start) = self.index.get(category_id) {
            let mut stack = vec![start];
            while let Some(i) = stack.pop() {
                excluded[i] = true;
                stack.extend(&self.nodes[i].children);
            }
        }
        let nodes = &self.nodes;
        let mut out = Vec::new();
        self.walk_positions(|i| {
            let category = &nodes[i].category;
            if !excluded[i] && &category.id != category_id {
                out.push(category);
            }
        });
        out
    }
}

pub fn build_forest(categories: &[Category]) -> Forest {
    build_forest_with(categories, SiblingOrder::Input)
}

pub fn build_forest_with(categories: &[Category], order: SiblingOrder) -> Forest {
    let n = categories.len();
    let mut issues = Vec::new();

    let mut index: HashMap<&CategoryId, usize> = HashMap::with_capacity(n);
    let mut duplicate = vec![false; n];
    for (i, c) in categories.iter().enumerate() {
        if index.contains_key(&c.id) {
            duplicate[i] = true;
            issues.push(StructuralIssue::DuplicateId {
                category: c.id.clone(),
            });
        } else {
            index.insert(&c.id, i);
        }
    }

    let mut parent: Vec<Option<usize>> = vec![None; n];
    for (i, c) in categories.iter().enumerate() {
        if duplicate[i] {
            continue;
        }
        let Some(pid) = c.parent_id.as_ref() else {
            continue;
        };
        match index.get(pid) {
            Some(&p) => parent[i] = Some(p),
            None => issues.push(StructuralIssue::UnresolvedParent {
                category: c.id.clone(),
                parent: pid.clone(),
            }),
        }
    }

    for i in cycle_members(&parent) {
        parent[i] = None;
        issues.push(StructuralIssue::Cycle {
            category: categories[i].id.clone(),
        });
    }

    for issue in &issues {
        warn!(%issue, "category structure");
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for i in 0..n {
        match parent[i] {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    if order == SiblingOrder::Name {
        let key = |i: &usize| categories[*i].name.to_lowercase();
        roots.sort_by_key(key);
        for list in &mut children {
            list.sort_by_key(key);
        }
    }

    let mut depth = vec![0; n];
    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    while let Some(i) = queue.pop_front() {
        for &c in &children[i] {
            depth[c] = depth[i] + 1;
            queue.push_back(c);
        }
    }

    let nodes = categories
        .iter()
        .zip(parent)
        .zip(children)
        .zip(depth)
        .map(|(((category, parent), children), depth)| CategoryNode {
            category: category.clone(),
            depth,
            parent,
            children,
        })
        .collect();
    let index = index.into_iter().map(|(id, i)| (id.clone(), i)).collect();

    Forest {
        nodes,
        roots,
        index,
        issues,
    }
}

// Every node has at most one outgoing edge, so each walk either ends at a root or runs into a
// node seen earlier. Each node is entered once, which bounds the walk by the collection size.
fn cycle_members(parent: &[Option<usize>]) -> Vec<usize> {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parent.len()];
    let mut members = Vec::new();

    for start in 0..parent.len() {
        let mut path = Vec::new();
        let mut cur = Some(start);
        while let Some(i) = cur {
            match state[i] {
                DONE => break,
                ON_PATH => {
                    if let Some(pos) = path.iter().position(|&p| p == i) {
                        members.extend_from_slice(&path[pos..]);
                    }
                    break;
                }
                _ => {
                    state[i] = ON_PATH;
                    path.push(i);
                    cur = parent[i];
                }
            }
        }
        for i in path {
            state[i] = DONE;
        }
    }

    members.sort_unstable();
    members
}

/// True when `candidate_parent_id` sits strictly below `category_id` in `forest`, i.e. making
/// it the parent would detach the category's subtree.
pub fn is_descendant(
    candidate_parent_id: &CategoryId,
    category_id: &CategoryId,
    forest: &Forest,
) -> bool {
    let (Some(&ancestor), Some(&candidate)) = (
        forest.index.get(category_id),
        forest.index.get(candidate_parent_id),
    ) else {
        return false;
    };
    let mut cur = forest.nodes[candidate].parent;
    while let Some(i) = cur {
        if i == ancestor {
            return true;
        }
        cur = forest.nodes[i].parent;
    }
    false
}
