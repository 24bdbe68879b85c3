//! Pending despawn tasks
//!
//! Despawn callback запускается fire-and-forget на `AsyncComputeTaskPool`:
//! tick его не ждёт. Task handles складываются сюда, чтобы результат
//! (в том числе ошибка callback) можно было забрать через `poll` / `wait_all`.
//!
//! Host может не поллить вовсе: каждый `spawn` сам убирает завершённые tasks.
//! Успешные результаты при этом отбрасываются, ошибки ждут следующего `poll`.

use bevy::tasks::{block_on, AsyncComputeTaskPool, Task, TaskPool};
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::ProjectileError;
use crate::state::{lock, DespawnEvent};

pub type DespawnResult = Result<DespawnEvent, ProjectileError>;

#[derive(Default)]
struct Pending {
    tasks: Vec<Task<DespawnResult>>,
    failed: Vec<DespawnResult>,
}

#[derive(Clone, Default)]
pub struct PendingDespawns {
    inner: Arc<Mutex<Pending>>,
}

impl PendingDespawns {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawn<F>(&self, job: F)
    where
        F: Future<Output = DespawnResult> + Send + 'static,
    {
        let pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        let task = pool.spawn(job);

        let finished = {
            let mut inner = lock(&self.inner);
            let finished = take_finished(&mut inner.tasks);
            inner.tasks.push(task);
            finished
        };
        let failed: Vec<_> = finished
            .into_iter()
            .map(block_on)
            .filter(Result::is_err)
            .collect();
        if !failed.is_empty() {
            lock(&self.inner).failed.extend(failed);
        }
    }

    /// Tasks, результаты которых ещё не забраны
    pub fn len(&self) -> usize {
        lock(&self.inner).tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).tasks.is_empty()
    }

    /// Забирает результаты завершившихся tasks, не блокируясь на остальных
    pub fn poll(&self) -> Vec<DespawnResult> {
        let (mut results, finished) = {
            let mut inner = lock(&self.inner);
            let finished = take_finished(&mut inner.tasks);
            (std::mem::take(&mut inner.failed), finished)
        };
        results.extend(finished.into_iter().map(block_on));
        results
    }

    /// Ждёт все tasks (включая поставленные во время ожидания)
    pub fn wait_all(&self) -> Vec<DespawnResult> {
        let mut results = Vec::new();
        loop {
            let (failed, batch) = {
                let mut inner = lock(&self.inner);
                (std::mem::take(&mut inner.failed), std::mem::take(&mut inner.tasks))
            };
            results.extend(failed);
            if batch.is_empty() {
                break;
            }
            results.extend(batch.into_iter().map(block_on));
        }
        results
    }
}

fn take_finished(tasks: &mut Vec<Task<DespawnResult>>) -> Vec<Task<DespawnResult>> {
    let (finished, pending): (Vec<_>, Vec<_>) =
        std::mem::take(tasks).into_iter().partition(Task::is_finished);
    *tasks = pending;
    finished
}
