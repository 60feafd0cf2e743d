// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log source discovery.
//!
//! The [`builder`] evaluates configuration rules into [`LogSource`]s, and the
//! [`registry`] exposes them to launchers as read-only, ordered views.

pub mod builder;
pub mod registry;
pub mod source;

pub use builder::build;
pub use registry::LogSources;
pub use source::{
    DockerConfig, FileConfig, JournaldConfig, LogSource, SourceConfig, SourceStatus, SourceType,
    TcpConfig,
};
