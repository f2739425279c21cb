//! The indexed query engine built over one or more DEX readers.
//!
//! [`DexIndex`] preprocesses every image once at construction (string
//! table, method → code-item mapping, reverse lookup tables) and then
//! answers queries by combining a lazy bytecode scanner with a signature
//! predicate. Cross-DEX symbols are addressed through *global indices*:
//! opaque integers allocated on demand, each backed by one slot per DEX.
//!
//! # Concurrency
//!
//! The engine mutates lazy caches from queries that look read-only, using
//! unsynchronized interior mutability. A `DexIndex` is therefore strictly
//! single-threaded; callers that share one across threads must serialize
//! every call externally.

use std::{cell::RefCell, fmt};

use itertools::Itertools;

use crate::dex::{DexReader, Mutf8Str};

mod matcher;
mod queries;
mod scanner;
mod symbols;
mod tables;

pub use queries::MethodFilter;

use symbols::SymbolTables;
use tables::DexState;

/// The query engine: a read-only, lazily-indexed view over a set of DEX
/// images covering one application.
///
/// The index borrows the image buffers through the readers it is built
/// from; the buffers must outlive it. All queries take `&self`: lazy
/// scan state lives behind interior mutability (see the module docs for
/// the threading contract).
#[derive(Debug)]
pub struct DexIndex<'a> {
    dexes: Vec<DexState<'a>>,
    symbols: RefCell<SymbolTables>,
}

impl<'a> DexIndex<'a> {
    /// Sentinel returned by the `create_*_index` family when the requested
    /// symbol exists in none of the DEXes. Feeding it back into a query is
    /// harmless: out-of-range inputs produce empty results.
    pub const NOT_FOUND: usize = usize::MAX;

    /// Builds the index, preprocessing every reader in input order.
    ///
    /// The position of a reader in `readers` is its DEX index, used by the
    /// `dex_priority` argument of every query.
    #[must_use]
    pub fn new(readers: Vec<DexReader<'a>>) -> Self {
        let dexes: Vec<DexState<'a>> = readers.into_iter().map(DexState::new).collect();
        let symbols = SymbolTables::new(&dexes);
        Self {
            dexes,
            symbols: RefCell::new(symbols),
        }
    }

    /// Number of DEX images behind this index.
    #[must_use]
    pub fn dex_count(&self) -> usize {
        self.dexes.len()
    }
}

/// A class, decoded from a global class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassView<'a> {
    /// The type descriptor, e.g. `Ljava/lang/Object;`.
    pub name: &'a Mutf8Str,
}

impl fmt::Display for ClassView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A field, decoded from a global field index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldView<'a> {
    /// The class declaring the field.
    pub declaring_class: ClassView<'a>,
    /// The declared type of the field.
    pub field_type: ClassView<'a>,
    /// The field name.
    pub name: &'a Mutf8Str,
}

impl fmt::Display for FieldView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.declaring_class, self.name, self.field_type)
    }
}

/// A method, decoded from a global method index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodView<'a> {
    /// The class declaring the method.
    pub declaring_class: ClassView<'a>,
    /// The method name.
    pub name: &'a Mutf8Str,
    /// The parameter types, in order.
    pub parameters: Vec<ClassView<'a>>,
    /// The return type.
    pub return_type: ClassView<'a>,
}

impl fmt::Display for MethodView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}({}){}",
            self.declaring_class,
            self.name,
            self.parameters.iter().format(""),
            self.return_type
        )
    }
}
