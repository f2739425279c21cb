//! The public query surface: six lazy-scanning lookups plus the full-cache
//! warm-up.
//!
//! Every query walks the requested DEXes in priority order and emits
//! global method or field indices. The string, reverse-invocation and
//! field-access queries share a three-phase shape per DEX: serve from the
//! already-scanned cache when an early exit is wanted, scan the remaining
//! candidate methods, then collect from the (now richer) cache.

use crate::dex::format::NO_INDEX;

use super::DexIndex;

/// A partial method signature. Every field defaults to "match anything";
/// set only the constraints you care about:
///
/// ```
/// use dexamine::MethodFilter;
///
/// let filter = MethodFilter {
///     parameter_count: Some(1),
///     shorty: Some("VI".to_owned()),
///     ..MethodFilter::default()
/// };
/// # let _ = filter;
/// ```
///
/// Class constraints are global class indices from
/// [`DexIndex::create_class_index`]. An out-of-range index anywhere in the
/// filter makes the query return an empty result.
#[derive(Debug, Clone, Default)]
pub struct MethodFilter {
    /// Required return type.
    pub return_type: Option<usize>,
    /// Required declaring class.
    pub declaring_class: Option<usize>,
    /// Required number of parameters.
    pub parameter_count: Option<usize>,
    /// Required shorty descriptor, e.g. `"VIL"`. `None` and the empty
    /// string both match anything.
    pub shorty: Option<String>,
    /// Required parameter list, position by position; `None` entries match
    /// any type at their position. An empty list matches anything (use
    /// `parameter_count: Some(0)` to require zero parameters).
    pub parameter_types: Vec<Option<usize>>,
    /// Types that must each occur somewhere in the parameter list. No
    /// wildcards. An empty list matches anything.
    pub contains_parameter_types: Vec<usize>,
}

impl<'a> DexIndex<'a> {
    /// The DEX visit order for a query: the priority list with out-of-range
    /// entries dropped, or natural order when the list is empty. Duplicate
    /// entries are honored and may produce duplicate results.
    fn priority_order(&self, dex_priority: &[usize]) -> Vec<usize> {
        if dex_priority.is_empty() {
            (0..self.dexes.len()).collect()
        } else {
            dex_priority
                .iter()
                .copied()
                .filter(|&dex_idx| dex_idx < self.dexes.len())
                .collect()
        }
    }

    /// Finds methods that load a string constant equal to `needle`, or
    /// starting with it when `match_prefix` is set.
    ///
    /// With `find_first` the query returns as soon as one match is
    /// confirmed; otherwise it scans every candidate method in every
    /// requested DEX and collects all matches.
    #[must_use]
    pub fn find_method_using_string(
        &self,
        needle: &str,
        match_prefix: bool,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(resolved) = self.resolve_filter(filter) else {
            return out;
        };
        for dex_idx in self.priority_order(dex_priority) {
            let dex = &self.dexes[dex_idx];
            let Some((lower, upper)) = dex.string_id_range(needle.as_bytes(), match_prefix)
            else {
                continue;
            };
            let view = resolved.for_dex(dex_idx);

            // Anything recorded by earlier scans can satisfy a find-first
            // immediately.
            if find_first {
                let xrefs = dex.xrefs.borrow();
                for string_id in lower..upper {
                    for &method_id in &xrefs.string_uses[string_id as usize] {
                        if dex.matches_signature(method_id, &view) {
                            let global = self.method_global(dex_idx, method_id);
                            if global != Self::NOT_FOUND {
                                out.push(global);
                                return out;
                            }
                        }
                    }
                }
            }

            // Scan what is still unscanned, cheapest filter first. The
            // scanner reports whether it hit the string range, which lets
            // a find-first stop early.
            for method_id in 0..dex.method_code.len() as u32 {
                if dex.xrefs.borrow().scanned[method_id as usize] {
                    continue;
                }
                if dex.matches_signature(method_id, &view) {
                    let hit = dex.scan_method(method_id, Some((lower, upper)));
                    if hit && find_first {
                        break;
                    }
                }
            }

            let xrefs = dex.xrefs.borrow();
            for string_id in lower..upper {
                for &method_id in &xrefs.string_uses[string_id as usize] {
                    if dex.matches_signature(method_id, &view) {
                        let global = self.method_global(dex_idx, method_id);
                        if global != Self::NOT_FOUND {
                            out.push(global);
                            if find_first {
                                return out;
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Finds the methods *invoked by* `caller` (forward call edges) that
    /// satisfy the filter.
    #[must_use]
    pub fn find_method_invoking(
        &self,
        caller: usize,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(row) = self.method_row(caller) else {
            return out;
        };
        let Some(resolved) = self.resolve_filter(filter) else {
            return out;
        };
        for dex_idx in self.priority_order(dex_priority) {
            let caller_id = row[dex_idx];
            if caller_id == NO_INDEX {
                continue;
            }
            let dex = &self.dexes[dex_idx];
            let view = resolved.for_dex(dex_idx);
            dex.scan_method(caller_id, None);
            let xrefs = dex.xrefs.borrow();
            for &callee in &xrefs.invokes_out[caller_id as usize] {
                if dex.matches_signature(callee, &view) {
                    let global = self.method_global(dex_idx, callee);
                    if global != Self::NOT_FOUND {
                        out.push(global);
                        if find_first {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Finds the methods *invoking* `callee` (reverse call edges) that
    /// satisfy the filter.
    ///
    /// Reverse edges only exist once callers have been scanned, so without
    /// a populated cache this scans every candidate method in the DEX
    /// before collecting.
    #[must_use]
    pub fn find_method_invoked(
        &self,
        callee: usize,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(row) = self.method_row(callee) else {
            return out;
        };
        let Some(resolved) = self.resolve_filter(filter) else {
            return out;
        };
        for dex_idx in self.priority_order(dex_priority) {
            let callee_id = row[dex_idx];
            if callee_id == NO_INDEX {
                continue;
            }
            let dex = &self.dexes[dex_idx];
            let view = resolved.for_dex(dex_idx);

            if find_first {
                let xrefs = dex.xrefs.borrow();
                for &caller in &xrefs.invokes_in[callee_id as usize] {
                    if dex.matches_signature(caller, &view) {
                        let global = self.method_global(dex_idx, caller);
                        if global != Self::NOT_FOUND {
                            out.push(global);
                            return out;
                        }
                    }
                }
            }

            for method_id in 0..dex.method_code.len() as u32 {
                if dex.xrefs.borrow().scanned[method_id as usize] {
                    continue;
                }
                if dex.matches_signature(method_id, &view) {
                    dex.scan_method(method_id, None);
                    if find_first && !dex.xrefs.borrow().invokes_in[callee_id as usize].is_empty()
                    {
                        break;
                    }
                }
            }

            let xrefs = dex.xrefs.borrow();
            for &caller in &xrefs.invokes_in[callee_id as usize] {
                if dex.matches_signature(caller, &view) {
                    let global = self.method_global(dex_idx, caller);
                    if global != Self::NOT_FOUND {
                        out.push(global);
                        if find_first {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Finds methods reading the field behind the global `field` index.
    #[must_use]
    pub fn find_method_getting_field(
        &self,
        field: usize,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        self.find_field_accessors(field, filter, dex_priority, find_first, FieldAccess::Read)
    }

    /// Finds methods writing the field behind the global `field` index.
    #[must_use]
    pub fn find_method_setting_field(
        &self,
        field: usize,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        self.find_field_accessors(field, filter, dex_priority, find_first, FieldAccess::Write)
    }

    fn find_field_accessors(
        &self,
        field: usize,
        filter: &MethodFilter,
        dex_priority: &[usize],
        find_first: bool,
        access: FieldAccess,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(row) = self.field_row(field) else {
            return out;
        };
        let Some(resolved) = self.resolve_filter(filter) else {
            return out;
        };
        for dex_idx in self.priority_order(dex_priority) {
            let field_id = row[dex_idx];
            if field_id == NO_INDEX {
                continue;
            }
            let dex = &self.dexes[dex_idx];
            let view = resolved.for_dex(dex_idx);

            if find_first {
                let xrefs = dex.xrefs.borrow();
                for &accessor in access.cache(&xrefs, field_id) {
                    if dex.matches_signature(accessor, &view) {
                        let global = self.method_global(dex_idx, accessor);
                        if global != Self::NOT_FOUND {
                            out.push(global);
                            return out;
                        }
                    }
                }
            }

            for method_id in 0..dex.method_code.len() as u32 {
                if dex.xrefs.borrow().scanned[method_id as usize] {
                    continue;
                }
                if dex.matches_signature(method_id, &view) {
                    dex.scan_method(method_id, None);
                    if find_first && !access.cache(&dex.xrefs.borrow(), field_id).is_empty() {
                        break;
                    }
                }
            }

            let xrefs = dex.xrefs.borrow();
            for &accessor in access.cache(&xrefs, field_id) {
                if dex.matches_signature(accessor, &view) {
                    let global = self.method_global(dex_idx, accessor);
                    if global != Self::NOT_FOUND {
                        out.push(global);
                        if find_first {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Finds the fields declared *of* the type behind the global class
    /// index `field_type` (e.g. every field of type `Ljava/lang/String;`).
    /// No scanning is involved.
    #[must_use]
    pub fn find_field(
        &self,
        field_type: usize,
        dex_priority: &[usize],
        find_first: bool,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(row) = self.class_row(field_type) else {
            return out;
        };
        for dex_idx in self.priority_order(dex_priority) {
            let type_id = row[dex_idx];
            if type_id == NO_INDEX {
                continue;
            }
            let dex = &self.dexes[dex_idx];
            for &field_id in &dex.declaring_fields[type_id as usize] {
                let global = self.field_global(dex_idx, field_id);
                if global != Self::NOT_FOUND {
                    out.push(global);
                    if find_first {
                        return out;
                    }
                }
            }
        }
        out
    }

    /// Scans every method of every DEX, so that subsequent queries are
    /// served entirely from the caches. Idempotent: methods already
    /// scanned are skipped.
    pub fn create_full_cache(&self) {
        for dex in &self.dexes {
            for method_id in 0..dex.method_code.len() as u32 {
                dex.scan_method(method_id, None);
            }
        }
    }
}

/// Which of the two field-access caches a query reads.
#[derive(Debug, Clone, Copy)]
enum FieldAccess {
    Read,
    Write,
}

impl FieldAccess {
    fn cache<'c>(
        self,
        xrefs: &'c super::tables::XrefCache,
        field_id: u32,
    ) -> &'c [u32] {
        match self {
            Self::Read => &xrefs.field_reads[field_id as usize],
            Self::Write => &xrefs.field_writes[field_id as usize],
        }
    }
}
