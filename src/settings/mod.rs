// SPDX-License-Identifier: GPL-3.0-or-later
mod cli;

pub use cli::Args;
