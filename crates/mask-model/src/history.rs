//! Undo/redo history for mask edits.
//!
//! Each entry is the full node list before an edit. Masks are small, so
//! whole-list snapshots keep undo trivially correct for every operation.

use std::collections::VecDeque;

use gphyx_common::error::GphyxResult;

use crate::path::{ControlPoint, PathModel};

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct EditHistory {
    undo: VecDeque<Vec<ControlPoint>>,
    redo: Vec<Vec<ControlPoint>>,
    depth: usize,
}

impl EditHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Remember the node list as it was before an edit. Clears redo.
    pub fn record(&mut self, before: &[ControlPoint]) {
        self.redo.clear();
        if self.undo.back().is_some_and(|last| last.as_slice() == before) {
            return;
        }
        self.undo.push_back(before.to_vec());
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Restore the previous state into `path`. Returns whether anything changed.
    pub fn undo(&mut self, path: &mut PathModel) -> GphyxResult<bool> {
        let Some(previous) = self.undo.pop_back() else {
            return Ok(false);
        };
        let current = path.nodes().to_vec();
        path.replace_nodes(previous)?;
        self.redo.push(current);
        Ok(true)
    }

    /// Re-apply the most recently undone state.
    pub fn redo(&mut self, path: &mut PathModel) -> GphyxResult<bool> {
        let Some(next) = self.redo.pop() else {
            return Ok(false);
        };
        let current = path.nodes().to_vec();
        path.replace_nodes(next)?;
        self.undo.push_back(current);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
