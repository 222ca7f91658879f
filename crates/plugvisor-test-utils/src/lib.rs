// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Plugvisor integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic tests without real plugin processes or downloads.
//!
//! # Components
//!
//! - [`MockBackend`] - Scriptable backend plugin with crash simulation
//! - [`MockInstaller`] - Installer that writes manifest fixtures
//! - [`RecordingWriter`] - Response writer that records every call
//! - [`TestHarness`] - Plugin manager over temporary plugin directories

pub mod collaborators;
pub mod harness;
pub mod manifest;
pub mod mock_backend;
pub mod mock_installer;
pub mod recording_writer;

pub use collaborators::{MockInitializer, MockValidator};
pub use harness::TestHarness;
pub use manifest::{JsonManifestFinder, JsonManifestLoader, ManifestFixture};
pub use mock_backend::{MockBackend, MockFailure};
pub use mock_installer::MockInstaller;
pub use recording_writer::{RecordingWriter, WriterEvent};
