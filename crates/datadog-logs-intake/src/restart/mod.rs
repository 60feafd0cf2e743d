// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle helpers shared by launchers and tailers.

mod parallel;
mod serial;

pub use parallel::ParallelStopper;
pub use serial::SerialStopper;

/// A resource that can be torn down.
///
/// `stop` must return only once the resource has released what it holds;
/// calling it on an already stopped resource is a no-op.
#[async_trait::async_trait]
pub trait Stoppable: Send {
    async fn stop(&mut self);
}

/// A resource that can be started again after a stop.
#[async_trait::async_trait]
pub trait Restartable: Stoppable {
    async fn start(&mut self);
}
