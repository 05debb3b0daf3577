// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Session Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │            ┌──────────────────┐              │
//! │            │     Camera       │              │
//! │            │   (GStreamer)    │              │
//! │            └──────────────────┘              │
//! └─────────────────────────────────────────────┘
//! ```

pub mod camera;
