#![warn(
    clippy::pedantic,
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2021_compatibility
)]
// #![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Welcome to `dexamine`, a library for asking structural questions about
//! [DEX](https://source.android.com/docs/core/runtime/dex-format) images:
//! which methods load a string constant, which methods call (or are called
//! by) a method, which methods read or write a field, and which fields are
//! declared of a type.
//!
//! The entry point is [`DexIndex`], built over one or more parsed
//! [`dex::DexReader`]s covering the `classes*.dex` series of a single
//! application. Queries return engine-wide *global indices* that hide which
//! physical DEX a symbol lives in; [`DexIndex::decode_method`] and friends
//! turn them back into names.
//!
//! Bytecode is scanned lazily: the first query that needs a method's
//! cross-references walks its instructions once and caches the edges for
//! the lifetime of the index.
//!
//! ## Features
#![doc = document_features::document_features!()]

pub mod dex;
pub mod index;

pub use index::{ClassView, DexIndex, FieldView, MethodFilter, MethodView};
