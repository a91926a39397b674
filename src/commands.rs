//! Command types for the Elm-style architecture
//!
//! Commands represent side effects that should be performed after an update.

use crate::query::{Answer, Request};

/// Commands returned by update functions
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cmd {
    /// No command - do nothing
    #[default]
    None,
    /// The presentation should repaint from the current answer
    Redraw,
    /// Run a query on the worker thread
    /// Sends Msg::Viewport(QueryCompleted) when done
    RunQuery {
        request: Request,
        /// Buffers to reuse for the result
        scratch: Answer,
    },
    /// Scan the file again from the start
    RestartIndex,
    /// Execute multiple commands
    Batch(Vec<Cmd>),
}

impl Cmd {
    /// Create a batch of commands
    pub fn batch(cmds: Vec<Cmd>) -> Self {
        Cmd::Batch(cmds)
    }

    /// Check if this command requires a redraw
    pub fn needs_redraw(&self) -> bool {
        match self {
            Cmd::None => false,
            Cmd::Redraw => true,
            // The completion message triggers the redraw
            Cmd::RunQuery { .. } | Cmd::RestartIndex => false,
            Cmd::Batch(cmds) => cmds.iter().any(|c| c.needs_redraw()),
        }
    }

    /// Flatten nested batches into a list of leaf commands
    pub fn into_leaves(self) -> Vec<Cmd> {
        match self {
            Cmd::None => Vec::new(),
            Cmd::Batch(cmds) => cmds.into_iter().flat_map(Cmd::into_leaves).collect(),
            cmd => vec![cmd],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_redraw() {
        assert!(!Cmd::None.needs_redraw());
        assert!(Cmd::Redraw.needs_redraw());
        let query = Cmd::RunQuery {
            request: Request::default(),
            scratch: Answer::default(),
        };
        assert!(!query.needs_redraw());
        assert!(Cmd::batch(vec![query, Cmd::Redraw]).needs_redraw());
    }

    #[test]
    fn test_into_leaves_flattens() {
        let cmd = Cmd::batch(vec![
            Cmd::None,
            Cmd::batch(vec![Cmd::Redraw, Cmd::None]),
            Cmd::Redraw,
        ]);
        assert_eq!(cmd.into_leaves(), vec![Cmd::Redraw, Cmd::Redraw]);
    }
}
