// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::restart::Stoppable;

/// Stops registered resources one after the other, in registration order.
#[derive(Default)]
pub struct SerialStopper {
    resources: Vec<Box<dyn Stoppable>>,
}

impl SerialStopper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S>(&mut self, resource: S)
    where
        S: Stoppable + 'static,
    {
        self.resources.push(Box::new(resource));
    }

    pub async fn stop(self) {
        for mut resource in self.resources {
            resource.stop().await;
        }
    }
}
