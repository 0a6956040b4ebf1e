//! Hierarchical resource: a tree of path segments sharing one root.
//!
//! Locking `/a/b` conflicts with incompatible holders of `/a`, of `/a/b` and
//! of anything below `/a/b`; siblings such as `/a/c` are independent.

use std::collections::VecDeque;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockSpec;
use flom_core::mode::LockMode;
use flom_core::traits::ConnectionId;
use tracing::trace;

use crate::name::split_path;
use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

/// One path segment with the connections locking it.
#[derive(Debug, Default)]
struct PathNode {
    name: String,
    holders: Vec<ConnectionLockRecord>,
    children: Vec<PathNode>,
}

impl PathNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.children.is_empty()
    }

    /// Checks the holders of this node and, following `path`, of the nodes
    /// below it. Once `path` is exhausted every descendant is checked.
    fn can_lock(&self, requested: LockMode, path: &[&str]) -> bool {
        let holders_ok = self
            .holders
            .iter()
            .filter_map(ConnectionLockRecord::mode)
            .all(|held| requested.is_compatible_with(held));
        if !holders_ok {
            trace!(node = %self.name, ?requested, "blocked by a holder");
            return false;
        }
        self.children.iter().all(|child| match path.split_first() {
            Some((head, rest)) => child.name != *head || child.can_lock(requested, rest),
            None => child.can_lock(requested, &[]),
        })
    }

    fn child_mut(&mut self, name: &str) -> &mut PathNode {
        let position = match self.children.iter().position(|c| c.name == name) {
            Some(position) => position,
            None => {
                self.children.push(PathNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[position]
    }

    fn remove_holder(&mut self, connection: ConnectionId) -> Option<ConnectionLockRecord> {
        if let Some(position) = self.holders.iter().position(|h| h.connection == connection) {
            return Some(self.holders.remove(position));
        }
        self.children
            .iter_mut()
            .find_map(|child| child.remove_holder(connection))
    }

    fn contains_holder(&self, connection: ConnectionId) -> bool {
        self.holders.iter().any(|h| h.connection == connection)
            || self.children.iter().any(|c| c.contains_holder(connection))
    }

    fn prune(&mut self) {
        self.children.retain_mut(|child| {
            child.prune();
            !child.is_empty()
        });
    }

    fn find(&self, path: &[&str]) -> Option<&PathNode> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter()
                .find(|c| c.name == *head)
                .and_then(|c| c.find(rest)),
        }
    }

    fn clear(&mut self) {
        self.holders.clear();
        self.children.clear();
    }
}

/// Tree of every locked path below one root segment.
///
/// The tree hangs off an unnamed anchor node; nodes with neither holders nor
/// children are pruned after every release.
#[derive(Debug)]
pub struct HierResource {
    name: String,
    separator: String,
    root_segment: String,
    tree: PathNode,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl HierResource {
    /// Creates the resource for `name`, which must start with `separator`.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::InvalidResourceName`] for a malformed path.
    pub fn new(name: impl Into<String>, separator: impl Into<String>) -> FlomResult<Self> {
        let name = name.into();
        let separator = separator.into();
        let root_segment = split_path(&name, &separator)?[0].to_string();
        Ok(Self {
            name,
            separator,
            root_segment,
            tree: PathNode::default(),
            waiters: VecDeque::new(),
        })
    }

    /// First segment shared by every path of this resource.
    pub fn root_segment(&self) -> &str {
        &self.root_segment
    }

    /// Is there a node for `path`, i.e. is `path` or a path below it locked?
    pub fn has_node(&self, path: &str) -> bool {
        split_path(path, &self.separator)
            .map(|segments| self.tree.find(&segments).is_some())
            .unwrap_or(false)
    }

    /// Connections holding exactly `path`.
    pub fn holders_of(&self, path: &str) -> Vec<ConnectionId> {
        split_path(path, &self.separator)
            .ok()
            .and_then(|segments| self.tree.find(&segments))
            .map(|node| node.holders.iter().map(|h| h.connection).collect())
            .unwrap_or_default()
    }

    pub fn is_tree_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.tree.clear();
        self.waiters.clear();
    }

    fn segments_of<'a>(&self, record: &'a ConnectionLockRecord) -> FlomResult<Vec<&'a str>> {
        let path = record.resource_path.as_deref().ok_or_else(|| {
            FlomError::Internal(format!(
                "record of {} on '{}' has no path",
                record.connection, self.name
            ))
        })?;
        split_path(path, &self.separator)
    }

    fn belongs_here(&self, path: &str) -> bool {
        matches!(split_path(path, &self.separator), Ok(segments) if segments[0] == self.root_segment)
    }
}

impl Resource for HierResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn waiters(&self) -> &VecDeque<ConnectionLockRecord> {
        &self.waiters
    }

    fn waiters_mut(&mut self) -> &mut VecDeque<ConnectionLockRecord> {
        &mut self.waiters
    }

    fn new_record(
        &self,
        spec: &LockSpec,
        connection: ConnectionId,
    ) -> FlomResult<ConnectionLockRecord> {
        let segments = split_path(&spec.name, &self.separator)?;
        if segments[0] != self.root_segment {
            return Err(FlomError::InvalidResourceName(format!(
                "'{}' is not below '{}{}'",
                spec.name, self.separator, self.root_segment
            )));
        }
        Ok(ConnectionLockRecord::new(connection, LockInfo::Mode(spec.mode)).with_path(&spec.name))
    }

    fn can_lock(&self, record: &ConnectionLockRecord) -> bool {
        let (Some(requested), Ok(segments)) = (record.mode(), self.segments_of(record)) else {
            return false;
        };
        self.tree.can_lock(requested, &segments)
    }

    fn grant(&mut self, record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        let path = self
            .segments_of(&record)?
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let node = path
            .iter()
            .fold(&mut self.tree, |node, segment| node.child_mut(segment));
        node.holders.push(record);
        Ok(None)
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        _rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        self.tree.remove_holder(connection)
    }

    fn holds(&self, connection: ConnectionId) -> bool {
        self.tree.contains_holder(connection)
    }

    fn has_holders(&self) -> bool {
        !self.tree.is_empty()
    }

    fn accept_name(&mut self, name: &str) -> bool {
        if !self.belongs_here(name) {
            return false;
        }
        self.name = name.to_string();
        true
    }

    fn after_release(&mut self) {
        self.tree.prune();
    }
}
