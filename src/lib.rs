// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

pub mod config;
pub mod delivery;
pub mod discovery;
pub mod gmp;
pub mod lookup;
pub mod models;
pub mod normalizer;
pub mod notification;
pub mod orchestrator;
pub mod scan;
pub mod storage;
