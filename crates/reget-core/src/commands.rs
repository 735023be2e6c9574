//! Reversible pause/resume actions with linear undo/redo history.

use crate::error::RegetError;
use crate::manager::DownloadManager;
use reget_types::TaskStatus;

/// Direction of a [`TaskAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Pause,
    Resume,
}

/// One reversible pause/resume of a task.
///
/// `apply` records the status observed immediately before acting so that
/// `invert` can check its precondition later: undoing a pause only resumes
/// if the task was running beforehand, and vice versa. When the state has
/// moved on incompatibly, inversion is a silent no-op.
#[derive(Debug)]
pub struct TaskAction {
    kind: ActionKind,
    task_id: i64,
    prior_status: Option<TaskStatus>,
}

impl TaskAction {
    pub fn pause(task_id: i64) -> Self {
        Self {
            kind: ActionKind::Pause,
            task_id,
            prior_status: None,
        }
    }

    pub fn resume(task_id: i64) -> Self {
        Self {
            kind: ActionKind::Resume,
            task_id,
            prior_status: None,
        }
    }

    pub async fn apply(&mut self, manager: &DownloadManager) -> Result<(), RegetError> {
        self.prior_status = manager
            .store()
            .find_by_id(self.task_id)
            .await?
            .map(|t| t.status);

        match self.kind {
            ActionKind::Pause => manager.pause(self.task_id).await,
            ActionKind::Resume => manager.resume(self.task_id).await,
        }
    }

    pub async fn invert(&self, manager: &DownloadManager) -> Result<(), RegetError> {
        match (self.kind, self.prior_status) {
            (ActionKind::Pause, Some(TaskStatus::Running)) => manager.resume(self.task_id).await,
            (ActionKind::Resume, Some(TaskStatus::Paused)) => manager.pause(self.task_id).await,
            // State moved on incompatibly; nothing to restore.
            _ => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        let verb = match self.kind {
            ActionKind::Pause => "pause",
            ActionKind::Resume => "resume",
        };
        format!("{verb} task #{}", self.task_id)
    }
}

/// Applied and undone-but-redoable action sequences.
#[derive(Default)]
pub struct CommandHistory {
    applied: Vec<TaskAction>,
    undone: Vec<TaskAction>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `action` and record it. A fresh action invalidates any
    /// previously undone branch.
    pub async fn execute(
        &mut self,
        manager: &DownloadManager,
        mut action: TaskAction,
    ) -> Result<(), RegetError> {
        action.apply(manager).await?;
        self.applied.push(action);
        self.undone.clear();
        Ok(())
    }

    /// Invert the most recent action. `None` when there is nothing to undo;
    /// otherwise the description of what was undone.
    ///
    /// A failed inversion leaves the action on the applied stack so the
    /// undo can be retried; the history never shrinks silently.
    pub async fn undo(&mut self, manager: &DownloadManager) -> Result<Option<String>, RegetError> {
        let Some(action) = self.applied.pop() else {
            return Ok(None);
        };
        if let Err(e) = action.invert(manager).await {
            self.applied.push(action);
            return Err(e);
        }
        let description = action.describe();
        self.undone.push(action);
        Ok(Some(description))
    }

    /// Re-apply the most recently undone action. `None` when the redo
    /// sequence is empty. A failed re-application leaves the action on the
    /// redo stack.
    pub async fn redo(&mut self, manager: &DownloadManager) -> Result<Option<String>, RegetError> {
        let Some(mut action) = self.undone.pop() else {
            return Ok(None);
        };
        if let Err(e) = action.apply(manager).await {
            self.undone.push(action);
            return Err(e);
        }
        let description = action.describe();
        self.applied.push(action);
        Ok(Some(description))
    }

    /// Applied actions in chronological order.
    pub fn descriptions(&self) -> Vec<String> {
        self.applied.iter().map(TaskAction::describe).collect()
    }

    pub fn can_undo(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }
}
