// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Datadog Logs Intake
//!
//! Discovers log origins from the agent configuration, runs one tailer per
//! origin and feeds every line into a fixed pool of pipeline channels,
//! resuming each origin from its last committed checkpoint.
//!
//! ## Architecture
//!
//! - [`config`]: unified configuration (defaults, `datadog.yaml`, `DD_*` env)
//! - [`sources`]: source builder and the read-only source registry
//! - [`auditor`]: checkpoint stores, in-memory and durable
//! - [`pipeline`]: messages and the round-robin pipeline provider
//! - [`tailers`]: file, TCP and journald readers
//! - [`launchers`]: per-origin-type reconciliation of sources into tailers
//! - [`restart`]: stoppable resources and the parallel stopper

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod auditor;
pub mod config;
pub mod launchers;
pub mod pipeline;
pub mod restart;
pub mod sources;
pub mod tailers;
