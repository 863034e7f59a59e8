// SPDX-License-Identifier: GPL-3.0-or-later

pub mod arglets;
pub mod args;
pub mod builtins;
pub mod config;
pub mod diagnostics;
pub mod modes;
pub mod output;
pub mod settings;
pub mod sniffer;
pub mod tools;
