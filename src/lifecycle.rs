// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Mount/unmount tracking for panels.
//!
//! Every mount bumps a generation counter. Work started under a
//! [`MountToken`] stops applying results as soon as the generation moves on.

use std::future::Future;
use tokio::sync::watch;

/// Owned by a panel; hands out tokens for the current mount
pub struct Lifecycle {
    generation: watch::Sender<u64>,
}

/// Ties async work to a single mounting of a panel
#[derive(Clone)]
pub struct MountToken {
    rx: watch::Receiver<u64>,
    generation: u64,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Start a new mount, invalidating tokens from earlier mounts
    pub fn mount(&self) -> MountToken {
        self.generation.send_modify(|g| *g += 1);
        self.current()
    }

    /// Invalidate every outstanding token
    pub fn unmount(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    /// Token for the mount that is live right now
    pub fn current(&self) -> MountToken {
        let rx = self.generation.subscribe();
        let generation = *rx.borrow();
        MountToken { rx, generation }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl MountToken {
    /// Whether the mount this token belongs to is still live
    pub fn is_live(&self) -> bool {
        *self.rx.borrow() == self.generation
    }

    /// Resolves once the mount has ended
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() != self.generation {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Run `fut` unless the mount ends first; `None` means it was cancelled
    pub async fn run<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            output = fut => Some(output),
            _ = self.cancelled() => None,
        }
    }
}
