//! The cross-DEX symbol table: engine-wide indices for classes, fields
//! and methods, each backed by one per-DEX id slot.

use crate::dex::format::NO_INDEX;

use super::{ClassView, DexIndex, FieldView, MethodView};
use super::tables::DexState;

/// Reverse-map sentinel: no global index assigned to this local id yet.
const UNMAPPED: usize = usize::MAX;

/// Global index rows and their per-DEX reverse maps.
///
/// Row `g` of each table holds one `u32` slot per DEX: the local id of the
/// symbol in that DEX, or [`NO_INDEX`] where it is absent. Rows are only
/// appended; a global index stays valid for the engine's lifetime.
#[derive(Debug)]
pub(crate) struct SymbolTables {
    pub(crate) class_rows: Vec<Box<[u32]>>,
    pub(crate) field_rows: Vec<Box<[u32]>>,
    pub(crate) method_rows: Vec<Box<[u32]>>,
    /// `[dex][type_id]` → global class index.
    rev_class: Vec<Vec<usize>>,
    /// `[dex][field_id]` → global field index.
    rev_field: Vec<Vec<usize>>,
    /// `[dex][method_id]` → global method index.
    rev_method: Vec<Vec<usize>>,
}

impl SymbolTables {
    pub(crate) fn new(dexes: &[DexState<'_>]) -> Self {
        Self {
            class_rows: Vec::new(),
            field_rows: Vec::new(),
            method_rows: Vec::new(),
            rev_class: dexes
                .iter()
                .map(|dex| vec![UNMAPPED; dex.reader.type_ids().len()])
                .collect(),
            rev_field: dexes
                .iter()
                .map(|dex| vec![UNMAPPED; dex.reader.field_ids().len()])
                .collect(),
            rev_method: dexes
                .iter()
                .map(|dex| vec![UNMAPPED; dex.reader.method_ids().len()])
                .collect(),
        }
    }
}

impl<'a> DexIndex<'a> {
    /// Allocates (or returns the existing) global index for the class with
    /// the given type descriptor, e.g. `"Ljava/lang/Object;"`.
    ///
    /// Returns [`Self::NOT_FOUND`] when no DEX defines or references the
    /// descriptor.
    pub fn create_class_index(&self, descriptor: &str) -> usize {
        self.create_class_index_bytes(descriptor.as_bytes())
    }

    pub(crate) fn create_class_index_bytes(&self, descriptor: &[u8]) -> usize {
        let mut symbols = self.symbols.borrow_mut();
        let mut staged = vec![NO_INDEX; self.dexes.len()];
        let mut created = false;
        for (dex_idx, dex) in self.dexes.iter().enumerate() {
            let Some(string_id) = dex.exact_string_id(descriptor) else {
                continue;
            };
            let type_id = dex.type_by_string[string_id as usize];
            if type_id == NO_INDEX {
                continue;
            }
            let existing = symbols.rev_class[dex_idx][type_id as usize];
            if existing != UNMAPPED {
                return existing;
            }
            created = true;
            staged[dex_idx] = type_id;
        }
        if !created {
            return Self::NOT_FOUND;
        }
        let index = symbols.class_rows.len();
        for (dex_idx, &type_id) in staged.iter().enumerate() {
            if type_id != NO_INDEX {
                symbols.rev_class[dex_idx][type_id as usize] = index;
            }
        }
        symbols.class_rows.push(staged.into_boxed_slice());
        index
    }

    /// Allocates (or returns the existing) global index for a field,
    /// addressed by declaring-class descriptor and field name.
    ///
    /// Returns [`Self::NOT_FOUND`] when no DEX declares such a field.
    pub fn create_field_index(&self, class_descriptor: &str, field_name: &str) -> usize {
        self.create_field_index_bytes(class_descriptor.as_bytes(), field_name.as_bytes())
    }

    pub(crate) fn create_field_index_bytes(&self, class_descriptor: &[u8], field_name: &[u8]) -> usize {
        let mut symbols = self.symbols.borrow_mut();
        let mut staged = vec![NO_INDEX; self.dexes.len()];
        let mut created = false;
        for (dex_idx, dex) in self.dexes.iter().enumerate() {
            let Some(class_sid) = dex.exact_string_id(class_descriptor) else {
                continue;
            };
            let Some(name_sid) = dex.exact_string_id(field_name) else {
                continue;
            };
            let type_id = dex.type_by_string[class_sid as usize];
            if type_id == NO_INDEX {
                continue;
            }
            let Some(&field_id) = dex.field_by_class_name[type_id as usize].get(&name_sid) else {
                continue;
            };
            let existing = symbols.rev_field[dex_idx][field_id as usize];
            if existing != UNMAPPED {
                return existing;
            }
            created = true;
            staged[dex_idx] = field_id;
        }
        if !created {
            return Self::NOT_FOUND;
        }
        let index = symbols.field_rows.len();
        for (dex_idx, &field_id) in staged.iter().enumerate() {
            if field_id != NO_INDEX {
                symbols.rev_field[dex_idx][field_id as usize] = index;
            }
        }
        symbols.field_rows.push(staged.into_boxed_slice());
        index
    }

    /// Allocates (or returns the existing) global index for a method,
    /// addressed by declaring-class descriptor, method name, and the exact
    /// parameter descriptor list (an empty slice means "no parameters").
    ///
    /// A candidate overload is accepted only when every parameter
    /// descriptor matches. Returns [`Self::NOT_FOUND`] when no DEX has a
    /// matching method.
    pub fn create_method_index(
        &self,
        class_descriptor: &str,
        method_name: &str,
        parameter_descriptors: &[&str],
    ) -> usize {
        let parameters: Vec<&[u8]> = parameter_descriptors
            .iter()
            .map(|descriptor| descriptor.as_bytes())
            .collect();
        self.create_method_index_bytes(
            class_descriptor.as_bytes(),
            method_name.as_bytes(),
            &parameters,
        )
    }

    pub(crate) fn create_method_index_bytes(
        &self,
        class_descriptor: &[u8],
        method_name: &[u8],
        parameter_descriptors: &[&[u8]],
    ) -> usize {
        let mut symbols = self.symbols.borrow_mut();
        let mut staged = vec![NO_INDEX; self.dexes.len()];
        let mut created = false;
        for (dex_idx, dex) in self.dexes.iter().enumerate() {
            let Some(name_sid) = dex.exact_string_id(method_name) else {
                continue;
            };
            let Some(class_sid) = dex.exact_string_id(class_descriptor) else {
                continue;
            };
            let type_id = dex.type_by_string[class_sid as usize];
            if type_id == NO_INDEX {
                continue;
            }
            let Some(candidates) = dex.method_by_class_name[type_id as usize].get(&name_sid) else {
                continue;
            };
            'candidates: for &method_id in candidates {
                let method = dex.reader.method_ids()[method_id as usize];
                let Some(&proto) = dex.reader.proto_ids().get(usize::from(method.proto_idx))
                else {
                    continue;
                };
                let list = dex.reader.type_list_at(proto.parameters_off);
                if list.len() != parameter_descriptors.len() {
                    continue;
                }
                for (i, &want) in parameter_descriptors.iter().enumerate() {
                    let descriptor = dex.type_descriptor(u32::from(list.type_idx(i)));
                    if descriptor.map_or(true, |d| d.as_bytes() != want) {
                        continue 'candidates;
                    }
                }
                let existing = symbols.rev_method[dex_idx][method_id as usize];
                if existing != UNMAPPED {
                    return existing;
                }
                created = true;
                staged[dex_idx] = method_id;
            }
        }
        if !created {
            return Self::NOT_FOUND;
        }
        let index = symbols.method_rows.len();
        for (dex_idx, &method_id) in staged.iter().enumerate() {
            if method_id != NO_INDEX {
                symbols.rev_method[dex_idx][method_id as usize] = index;
            }
        }
        symbols.method_rows.push(staged.into_boxed_slice());
        index
    }

    /// Global index for a class already located in one DEX.
    pub(crate) fn class_global(&self, dex_idx: usize, type_id: u32) -> usize {
        let existing = self.symbols.borrow().rev_class[dex_idx][type_id as usize];
        if existing != UNMAPPED {
            return existing;
        }
        let Some(descriptor) = self.dexes[dex_idx].type_descriptor(type_id) else {
            return Self::NOT_FOUND;
        };
        self.create_class_index_bytes(descriptor.as_bytes())
    }

    /// Global index for a field already located in one DEX.
    pub(crate) fn field_global(&self, dex_idx: usize, field_id: u32) -> usize {
        let existing = self.symbols.borrow().rev_field[dex_idx][field_id as usize];
        if existing != UNMAPPED {
            return existing;
        }
        let dex = &self.dexes[dex_idx];
        let Some(&field) = dex.reader.field_ids().get(field_id as usize) else {
            return Self::NOT_FOUND;
        };
        let Some(class_descriptor) = dex.type_descriptor(u32::from(field.class_idx)) else {
            return Self::NOT_FOUND;
        };
        let Some(name) = dex.string_at(field.name_idx) else {
            return Self::NOT_FOUND;
        };
        self.create_field_index_bytes(class_descriptor.as_bytes(), name.as_bytes())
    }

    /// Global index for a method already located in one DEX.
    pub(crate) fn method_global(&self, dex_idx: usize, method_id: u32) -> usize {
        let existing = self.symbols.borrow().rev_method[dex_idx][method_id as usize];
        if existing != UNMAPPED {
            return existing;
        }
        let dex = &self.dexes[dex_idx];
        let Some(&method) = dex.reader.method_ids().get(method_id as usize) else {
            return Self::NOT_FOUND;
        };
        let Some(class_descriptor) = dex.type_descriptor(u32::from(method.class_idx)) else {
            return Self::NOT_FOUND;
        };
        let Some(name) = dex.string_at(method.name_idx) else {
            return Self::NOT_FOUND;
        };
        let Some(&proto) = dex.reader.proto_ids().get(usize::from(method.proto_idx)) else {
            return Self::NOT_FOUND;
        };
        let list = dex.reader.type_list_at(proto.parameters_off);
        let mut parameters = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            let Some(descriptor) = dex.type_descriptor(u32::from(list.type_idx(i))) else {
                return Self::NOT_FOUND;
            };
            parameters.push(descriptor.as_bytes());
        }
        self.create_method_index_bytes(class_descriptor.as_bytes(), name.as_bytes(), &parameters)
    }

    /// Decodes a global class index back to its descriptor. The first DEX
    /// holding the class wins; `None` for an out-of-range index.
    #[must_use]
    pub fn decode_class(&self, class_index: usize) -> Option<ClassView<'a>> {
        let symbols = self.symbols.borrow();
        let row = symbols.class_rows.get(class_index)?;
        row.iter().enumerate().find_map(|(dex_idx, &type_id)| {
            if type_id == NO_INDEX {
                return None;
            }
            let name = self.dexes[dex_idx].type_descriptor(type_id)?;
            Some(ClassView { name })
        })
    }

    /// Decodes a global field index. `None` for an out-of-range index.
    #[must_use]
    pub fn decode_field(&self, field_index: usize) -> Option<FieldView<'a>> {
        let symbols = self.symbols.borrow();
        let row = symbols.field_rows.get(field_index)?;
        row.iter().enumerate().find_map(|(dex_idx, &field_id)| {
            if field_id == NO_INDEX {
                return None;
            }
            let dex = &self.dexes[dex_idx];
            let field = *dex.reader.field_ids().get(field_id as usize)?;
            Some(FieldView {
                declaring_class: ClassView {
                    name: dex.type_descriptor(u32::from(field.class_idx))?,
                },
                field_type: ClassView {
                    name: dex.type_descriptor(u32::from(field.type_idx))?,
                },
                name: dex.string_at(field.name_idx)?,
            })
        })
    }

    /// Decodes a global method index. `None` for an out-of-range index.
    #[must_use]
    pub fn decode_method(&self, method_index: usize) -> Option<MethodView<'a>> {
        let symbols = self.symbols.borrow();
        let row = symbols.method_rows.get(method_index)?;
        row.iter().enumerate().find_map(|(dex_idx, &method_id)| {
            if method_id == NO_INDEX {
                return None;
            }
            let dex = &self.dexes[dex_idx];
            let method = *dex.reader.method_ids().get(method_id as usize)?;
            let proto = *dex.reader.proto_ids().get(usize::from(method.proto_idx))?;
            let list = dex.reader.type_list_at(proto.parameters_off);
            let mut parameters = Vec::with_capacity(list.len());
            for type_idx in list.iter() {
                parameters.push(ClassView {
                    name: dex.type_descriptor(u32::from(type_idx))?,
                });
            }
            Some(MethodView {
                declaring_class: ClassView {
                    name: dex.type_descriptor(u32::from(method.class_idx))?,
                },
                name: dex.string_at(method.name_idx)?,
                parameters,
                return_type: ClassView {
                    name: dex.type_descriptor(proto.return_type_idx)?,
                },
            })
        })
    }

    /// Copies the per-DEX slot row of a global class index.
    pub(crate) fn class_row(&self, class_index: usize) -> Option<Vec<u32>> {
        self.symbols
            .borrow()
            .class_rows
            .get(class_index)
            .map(|row| row.to_vec())
    }

    /// Copies the per-DEX slot row of a global field index.
    pub(crate) fn field_row(&self, field_index: usize) -> Option<Vec<u32>> {
        self.symbols
            .borrow()
            .field_rows
            .get(field_index)
            .map(|row| row.to_vec())
    }

    /// Copies the per-DEX slot row of a global method index.
    pub(crate) fn method_row(&self, method_index: usize) -> Option<Vec<u32>> {
        self.symbols
            .borrow()
            .method_rows
            .get(method_index)
            .map(|row| row.to_vec())
    }
}
