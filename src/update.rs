//! Update functions for the Elm-style architecture
//!
//! All state transformations flow through these functions.

use crate::commands::Cmd;
use crate::messages::{IndexMsg, Msg, ViewportMsg};
use crate::model::{IndexStatus, ViewerModel};

/// Main update function - dispatches to sub-handlers
pub fn update(model: &mut ViewerModel, msg: Msg) -> Option<Cmd> {
    match msg {
        Msg::Viewport(m) => update_viewport(model, m),
        Msg::Index(m) => update_index(model, m),
    }
}

/// Handle viewport changes and query results
pub fn update_viewport(model: &mut ViewerModel, msg: ViewportMsg) -> Option<Cmd> {
    match msg {
        ViewportMsg::Desired(request) => model.controller.submit(request),
        ViewportMsg::QueryCompleted(outcome) => model.controller.complete(outcome),
        ViewportMsg::Refresh => model.controller.invalidate(),
    }
}

/// Handle background indexer reports
pub fn update_index(model: &mut ViewerModel, msg: IndexMsg) -> Option<Cmd> {
    match msg {
        IndexMsg::Progress {
            rows,
            bytes,
            file_len,
        } => {
            model.index = IndexStatus::Scanning {
                rows,
                bytes,
                file_len,
            };
            Some(Cmd::Redraw)
        }

        IndexMsg::Completed { rows } => {
            model.index = IndexStatus::Complete { rows };
            // The current answer's total was an estimate; recompute it
            let refresh = model.controller.invalidate();
            Some(match refresh {
                Some(cmd) => Cmd::batch(vec![Cmd::Redraw, cmd]),
                None => Cmd::Redraw,
            })
        }

        IndexMsg::Failed(error) => {
            tracing::warn!("Background index failed: {}", error);
            model.index = IndexStatus::Failed(error);
            Some(Cmd::Redraw)
        }

        IndexMsg::FileChanged { file_len } => {
            tracing::info!("File is now {} bytes, rescanning", file_len);
            model.index = IndexStatus::Pending;
            Some(Cmd::batch(vec![Cmd::Redraw, Cmd::RestartIndex]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Answer, QueryOutcome, Request};

    fn run_query(cmd: &Cmd) -> Option<&Request> {
        match cmd {
            Cmd::RunQuery { request, .. } => Some(request),
            Cmd::Batch(cmds) => cmds.iter().find_map(run_query),
            _ => None,
        }
    }

    #[test]
    fn test_desired_routes_to_controller() {
        let mut model = ViewerModel::new();
        let cmd = update(&mut model, Msg::desired(Request::at_rank(0, 4)));
        assert!(cmd.as_ref().and_then(run_query).is_some());
        assert!(model.controller.is_busy());
    }

    #[test]
    fn test_index_completion_refreshes_viewport() {
        let mut model = ViewerModel::new();
        let request = Request::at_rank(0, 4);
        update(&mut model, Msg::desired(request.clone()));
        let answer = Answer {
            cells: vec![0],
            ..Answer::default()
        };
        update(
            &mut model,
            Msg::completed(QueryOutcome::new(request.clone(), Ok(answer))),
        );

        let cmd = update(&mut model, Msg::Index(IndexMsg::Completed { rows: 9 }));
        assert_eq!(cmd.as_ref().and_then(run_query), Some(&request));
        assert!(model.index.is_complete());
    }

    #[test]
    fn test_file_change_restarts_scan() {
        let mut model = ViewerModel::new();
        update(&mut model, Msg::Index(IndexMsg::Completed { rows: 3 }));
        let cmd = update(&mut model, Msg::Index(IndexMsg::FileChanged { file_len: 99 })).unwrap();
        assert_eq!(cmd.into_leaves(), vec![Cmd::Redraw, Cmd::RestartIndex]);
        assert_eq!(model.index, IndexStatus::Pending);
    }

    #[test]
    fn test_index_progress_redraws() {
        let mut model = ViewerModel::new();
        let cmd = update(
            &mut model,
            Msg::Index(IndexMsg::Progress {
                rows: 1,
                bytes: 2,
                file_len: 4,
            }),
        );
        assert_eq!(cmd, Some(Cmd::Redraw));
        assert_eq!(model.index.progress(), Some(0.5));
    }
}
