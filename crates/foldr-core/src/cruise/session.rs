use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use super::node::NodeId;
use super::tree::CruiseTree;
use crate::error::CoreResult;
use crate::query::QueryPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

/// A cursor over a [`CruiseTree`].
///
/// At most one step runs at a time: starting a step cancels the one still
/// in flight, whose caller then receives [`crate::CoreError::Cancelled`].
#[derive(Debug)]
pub struct CruiseSession {
    tree: Arc<CruiseTree>,
    current: Mutex<Option<NodeId>>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl CruiseSession {
    pub fn new(tree: Arc<CruiseTree>) -> Self {
        Self {
            tree,
            current: Mutex::new(None),
            in_flight: Mutex::new(None),
        }
    }

    pub fn tree(&self) -> &Arc<CruiseTree> {
        &self.tree
    }

    pub fn current(&self) -> Option<NodeId> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Places the cursor on `query`.
    pub async fn start(&self, query: &QueryPath) -> CoreResult<NodeId> {
        let token = self.begin();
        let id = self.tree.node_at(query, &token).await?;
        self.finish(&token, Some(id));
        Ok(id)
    }

    /// Moves to the next node; `None` (cursor unchanged) past the end.
    pub async fn next(&self) -> CoreResult<Option<NodeId>> {
        self.step(Direction::Next).await
    }

    /// Moves to the previous node; `None` (cursor unchanged) before the start.
    pub async fn prev(&self) -> CoreResult<Option<NodeId>> {
        self.step(Direction::Prev).await
    }

    /// Cancels the step in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    async fn step(&self, direction: Direction) -> CoreResult<Option<NodeId>> {
        let Some(from) = self.current() else {
            return Ok(None);
        };
        let token = self.begin();
        let to = match direction {
            Direction::Next => self.tree.cruise_next(from, &token).await?,
            Direction::Prev => self.tree.cruise_prev(from, &token).await?,
        };
        self.finish(&token, to);
        Ok(to)
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    fn finish(&self, token: &CancellationToken, to: Option<NodeId>) {
        if token.is_cancelled() {
            return;
        }
        if let Some(id) = to {
            *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        }
    }
}
