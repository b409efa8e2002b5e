// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

mod finding;
mod report;
mod request;
mod service;
mod task;

pub use finding::*;
pub use report::*;
pub use request::*;
pub use service::*;
pub use task::*;
