//! The signature predicate shared by every method query, and the
//! translation of global filter arguments into per-DEX local ids.

use super::queries::MethodFilter;
use super::tables::DexState;
use super::DexIndex;

/// Matcher wildcard for per-DEX id slots, distinct from
/// [`NO_INDEX`](crate::dex::format::NO_INDEX): a slot that is `NO_INDEX`
/// (symbol absent in that DEX) must *fail* comparisons, a wildcard must
/// pass them.
pub(crate) const WILDCARD: u32 = u32::MAX - 1;

/// A [`MethodFilter`] with every global class index resolved to one local
/// type id per DEX (or [`WILDCARD`]).
#[derive(Debug)]
pub(crate) struct ResolvedFilter {
    return_type: Vec<u32>,
    declaring_class: Vec<u32>,
    parameter_count: Option<usize>,
    shorty: Vec<u8>,
    parameter_types: Vec<Vec<u32>>,
    contains_types: Vec<Vec<u32>>,
}

impl ResolvedFilter {
    /// The slice of the filter that applies to one DEX.
    pub(crate) fn for_dex(&self, dex_idx: usize) -> FilterView<'_> {
        FilterView {
            return_type: self.return_type[dex_idx],
            declaring_class: self.declaring_class[dex_idx],
            parameter_count: self.parameter_count,
            shorty: &self.shorty,
            parameter_types: &self.parameter_types[dex_idx],
            contains_types: &self.contains_types[dex_idx],
        }
    }
}

/// The per-DEX view handed to [`DexState::matches_signature`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterView<'f> {
    return_type: u32,
    declaring_class: u32,
    parameter_count: Option<usize>,
    shorty: &'f [u8],
    parameter_types: &'f [u32],
    contains_types: &'f [u32],
}

impl DexIndex<'_> {
    /// Translates a filter's global class indices into per-DEX local ids.
    ///
    /// `None` means some non-wildcard input is out of range; per the shared
    /// query precondition the caller then returns an empty result.
    pub(crate) fn resolve_filter(&self, filter: &MethodFilter) -> Option<ResolvedFilter> {
        let dex_count = self.dexes.len();
        let symbols = self.symbols.borrow();
        let class_count = symbols.class_rows.len();

        let resolve = |global: Option<usize>| -> Option<Vec<u32>> {
            match global {
                None => Some(vec![WILDCARD; dex_count]),
                Some(index) if index < class_count => {
                    Some(symbols.class_rows[index].to_vec())
                }
                Some(_) => None,
            }
        };
        let return_type = resolve(filter.return_type)?;
        let declaring_class = resolve(filter.declaring_class)?;

        let mut parameter_types = vec![Vec::new(); dex_count];
        for &entry in &filter.parameter_types {
            match entry {
                None => {
                    for per_dex in &mut parameter_types {
                        per_dex.push(WILDCARD);
                    }
                }
                Some(index) if index < class_count => {
                    for (dex_idx, per_dex) in parameter_types.iter_mut().enumerate() {
                        per_dex.push(symbols.class_rows[index][dex_idx]);
                    }
                }
                Some(_) => return None,
            }
        }

        let mut contains_types = vec![Vec::new(); dex_count];
        for &index in &filter.contains_parameter_types {
            if index >= class_count {
                return None;
            }
            for (dex_idx, per_dex) in contains_types.iter_mut().enumerate() {
                per_dex.push(symbols.class_rows[index][dex_idx]);
            }
        }

        Some(ResolvedFilter {
            return_type,
            declaring_class,
            parameter_count: filter.parameter_count,
            shorty: filter
                .shorty
                .as_deref()
                .unwrap_or("")
                .as_bytes()
                .to_vec(),
            parameter_types,
            contains_types,
        })
    }
}

impl DexState<'_> {
    /// Whether the method satisfies every constraint of the filter.
    ///
    /// Unset constraints always pass. Wildcard id slots pass, `NO_INDEX`
    /// slots (the filter's class exists but not in this DEX) never match a
    /// real id. A method that does not exist rejects outright.
    pub(crate) fn matches_signature(&self, method_id: u32, filter: &FilterView<'_>) -> bool {
        let Some(&method) = self.reader.method_ids().get(method_id as usize) else {
            return false;
        };
        if filter.declaring_class != WILDCARD
            && u32::from(method.class_idx) != filter.declaring_class
        {
            return false;
        }
        let Some(&proto) = self.reader.proto_ids().get(usize::from(method.proto_idx)) else {
            return false;
        };
        if filter.return_type != WILDCARD && proto.return_type_idx != filter.return_type {
            return false;
        }
        if !filter.shorty.is_empty()
            && self
                .string_at(proto.shorty_idx)
                .map_or(true, |shorty| shorty.as_bytes() != filter.shorty)
        {
            return false;
        }
        if filter.parameter_count.is_some()
            || !filter.parameter_types.is_empty()
            || !filter.contains_types.is_empty()
        {
            // A proto without a parameter list has zero parameters.
            let list = self.reader.type_list_at(proto.parameters_off);
            if filter.parameter_count.is_some_and(|count| list.len() != count) {
                return false;
            }
            if !filter.parameter_types.is_empty() {
                if filter.parameter_types.len() != list.len() {
                    return false;
                }
                for (i, &want) in filter.parameter_types.iter().enumerate() {
                    if want != WILDCARD && want != u32::from(list.type_idx(i)) {
                        return false;
                    }
                }
            }
            for &want in filter.contains_types {
                if !list.iter().any(|type_idx| u32::from(type_idx) == want) {
                    return false;
                }
            }
        }
        true
    }
}
