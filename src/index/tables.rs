//! Per-DEX preprocessed tables and the lazy cross-reference caches.

use std::{cell::RefCell, collections::HashMap, num::NonZeroU32};

use crate::dex::{
    format::NO_INDEX,
    leb128::Cursor,
    DexReader, Mutf8Str,
};

/// Everything the engine knows about one DEX: the borrowed reader, the
/// tables built once at construction, and the caches the scanner fills in
/// lazily.
#[derive(Debug)]
pub(crate) struct DexState<'a> {
    pub(crate) reader: DexReader<'a>,
    /// String views indexed by string id, in string-id (= MUTF-8) order.
    pub(crate) strings: Vec<&'a Mutf8Str>,
    /// Per method id, the data offset of its code item. `None` for
    /// abstract and native methods.
    pub(crate) method_code: Vec<Option<NonZeroU32>>,
    /// Descriptor string id → type id, [`NO_INDEX`] where the string is
    /// not a type descriptor.
    pub(crate) type_by_string: Vec<u32>,
    /// Type id → class-def index for classes defined in this DEX.
    pub(crate) class_by_type: Vec<u32>,
    /// Per declaring type id, field name string id → field id.
    pub(crate) field_by_class_name: Vec<HashMap<u32, u32>>,
    /// Per declaring type id, method name string id → method ids
    /// (several for overloads).
    pub(crate) method_by_class_name: Vec<HashMap<u32, Vec<u32>>>,
    /// Per type id, the fields declared *of* that type.
    pub(crate) declaring_fields: Vec<Vec<u32>>,
    /// Lazily scanned cross-references. Interior mutability: queries are
    /// logically read-only but populate these on first use.
    pub(crate) xrefs: RefCell<XrefCache>,
}

/// The five cross-reference caches plus the per-method scanned bitmap.
///
/// Lists may hold the same method several times when a method contains
/// several matching instructions; consumers tolerate duplicates.
#[derive(Debug)]
pub(crate) struct XrefCache {
    /// String id → methods holding a `const-string`/`const-string/jumbo`
    /// on it.
    pub(crate) string_uses: Vec<Vec<u32>>,
    /// Caller method id → callee method ids.
    pub(crate) invokes_out: Vec<Vec<u32>>,
    /// Callee method id → caller method ids.
    pub(crate) invokes_in: Vec<Vec<u32>>,
    /// Field id → methods reading it.
    pub(crate) field_reads: Vec<Vec<u32>>,
    /// Field id → methods writing it.
    pub(crate) field_writes: Vec<Vec<u32>>,
    /// True once a method's code item has been walked.
    pub(crate) scanned: Vec<bool>,
}

impl<'a> DexState<'a> {
    pub(crate) fn new(reader: DexReader<'a>) -> Self {
        let string_count = reader.string_ids().len();
        let type_count = reader.type_ids().len();
        let field_count = reader.field_ids().len();
        let method_count = reader.method_ids().len();

        let mut strings = Vec::with_capacity(string_count);
        for id in reader.string_ids() {
            // The reader validated that the offset is inside the data
            // section. The ULEB128 prefix is the UTF-16 length, not the
            // byte length; the view ends at the NUL terminator.
            let bytes = reader.data_at(id.string_data_off).unwrap_or(&[]);
            let mut cursor = Cursor::new(bytes);
            cursor.uleb128();
            strings.push(Mutf8Str::from_nul_terminated(cursor.remaining()));
        }

        let mut class_by_type = vec![NO_INDEX; type_count];
        let mut method_code: Vec<Option<NonZeroU32>> = vec![None; method_count];
        for (class_def_index, def) in reader.class_defs().iter().enumerate() {
            if let Some(slot) = class_by_type.get_mut(def.class_idx as usize) {
                *slot = class_def_index as u32;
            }
            let Some(class_data) = reader.class_data_at(def.class_data_off) else {
                continue;
            };
            for method in class_data
                .direct_methods
                .iter()
                .chain(&class_data.virtual_methods)
            {
                if method.code_off != 0 {
                    if let Some(slot) = method_code.get_mut(method.method_idx as usize) {
                        *slot = NonZeroU32::new(method.code_off);
                    }
                }
            }
        }

        let mut type_by_string = vec![NO_INDEX; string_count];
        for (type_id, rec) in reader.type_ids().iter().enumerate() {
            if let Some(slot) = type_by_string.get_mut(rec.descriptor_idx as usize) {
                *slot = type_id as u32;
            }
        }

        let mut field_by_class_name: Vec<HashMap<u32, u32>> = vec![HashMap::new(); type_count];
        let mut declaring_fields: Vec<Vec<u32>> = vec![Vec::new(); type_count];
        for (field_id, rec) in reader.field_ids().iter().enumerate() {
            if let Some(by_name) = field_by_class_name.get_mut(rec.class_idx as usize) {
                by_name.insert(rec.name_idx, field_id as u32);
            }
            if let Some(fields) = declaring_fields.get_mut(rec.type_idx as usize) {
                fields.push(field_id as u32);
            }
        }

        let mut method_by_class_name: Vec<HashMap<u32, Vec<u32>>> = vec![HashMap::new(); type_count];
        for (method_id, rec) in reader.method_ids().iter().enumerate() {
            if let Some(by_name) = method_by_class_name.get_mut(rec.class_idx as usize) {
                by_name.entry(rec.name_idx).or_default().push(method_id as u32);
            }
        }

        let xrefs = RefCell::new(XrefCache {
            string_uses: vec![Vec::new(); string_count],
            invokes_out: vec![Vec::new(); method_count],
            invokes_in: vec![Vec::new(); method_count],
            field_reads: vec![Vec::new(); field_count],
            field_writes: vec![Vec::new(); field_count],
            scanned: vec![false; method_count],
        });

        Self {
            reader,
            strings,
            method_code,
            type_by_string,
            class_by_type,
            field_by_class_name,
            method_by_class_name,
            declaring_fields,
            xrefs,
        }
    }

    /// The string at `string_id`, if in range.
    pub(crate) fn string_at(&self, string_id: u32) -> Option<&'a Mutf8Str> {
        self.strings.get(string_id as usize).copied()
    }

    /// The descriptor string of `type_id`, if both indirections are in
    /// range.
    pub(crate) fn type_descriptor(&self, type_id: u32) -> Option<&'a Mutf8Str> {
        let rec = self.reader.type_ids().get(type_id as usize)?;
        self.string_at(rec.descriptor_idx)
    }

    /// Binary-searches the string pool for an exact match.
    pub(crate) fn exact_string_id(&self, needle: &[u8]) -> Option<u32> {
        let lower = self.strings.partition_point(|s| s.as_bytes() < needle);
        (lower < self.strings.len() && self.strings[lower].as_bytes() == needle)
            .then_some(lower as u32)
    }

    /// The half-open string-id range matching `needle`: exactly, or as a
    /// byte prefix. `None` when the range is empty.
    pub(crate) fn string_id_range(&self, needle: &[u8], prefix: bool) -> Option<(u32, u32)> {
        if prefix {
            let lower = self.strings.partition_point(|s| s.as_bytes() < needle);
            // 0xFF never occurs in MUTF-8, so `needle ++ 0xFF` sorts after
            // every string extending the prefix.
            let mut sentinel = needle.to_vec();
            sentinel.push(0xff);
            let upper = self
                .strings
                .partition_point(|s| s.as_bytes() <= sentinel.as_slice());
            (lower < upper).then_some((lower as u32, upper as u32))
        } else {
            let lower = self.exact_string_id(needle)?;
            Some((lower, lower + 1))
        }
    }
}
