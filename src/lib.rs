// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Headless content management for Hexo blogs hosted on GitHub.
//!
//! Hexcms edits the Markdown posts and configuration files of a Hexo site
//! directly inside the GitHub repository that holds it. There is no server and
//! no database: every save is a commit through the GitHub contents API, and
//! every commit triggers whatever workflow rebuilds the site.
//!
//! # Layout
//!
//! - [`store`] is the path-addressed, versioned file store everything else
//!   runs on, with a GitHub and an in-memory implementation.
//! - [`codec`] turns post files into frontmatter plus body and back.
//! - [`post`] implements the post lifecycle: create, update, publish,
//!   unpublish, delete, and list.
//! - [`vault`] keeps the access token sealed on disk.
//! - [`session`] binds a validated token to a store client, and hands out the
//!   services above.
//! - [`snapshot`] edits site and theme configuration with manual restore
//!   points, and [`build`] watches the workflow runs that tell whether the
//!   site still builds.
//! - [`image`] uploads images into post assets, [`asset`] manages the
//!   favicon, custom code, and web fonts of the whole site.
//! - [`version`] checks for hexcms updates.

pub mod asset;
pub mod build;
pub mod codec;
pub mod config;
pub mod image;
pub mod path;
pub mod post;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod vault;
pub mod version;
