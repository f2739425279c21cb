//! The lazy bytecode scanner: a single linear sweep per method that pushes
//! edges into the cross-reference caches.

use crate::dex::format::{code, compact_code, OPCODE_LEN};

use super::tables::DexState;

const OP_NOP: u8 = 0x00;
const OP_CONST_STRING: u8 = 0x1a;
const OP_CONST_STRING_JUMBO: u8 = 0x1b;
const OP_IGET_FIRST: u8 = 0x52;
const OP_IGET_LAST: u8 = 0x58;
const OP_IPUT_FIRST: u8 = 0x59;
const OP_IPUT_LAST: u8 = 0x5f;
const OP_SGET_FIRST: u8 = 0x60;
const OP_SGET_LAST: u8 = 0x66;
const OP_SPUT_FIRST: u8 = 0x67;
const OP_SPUT_LAST: u8 = 0x6d;
const OP_INVOKE_FIRST: u8 = 0x6e;
const OP_INVOKE_LAST: u8 = 0x72;
const OP_INVOKE_RANGE_FIRST: u8 = 0x74;
const OP_INVOKE_RANGE_LAST: u8 = 0x78;

// Payload pseudo-instructions share opcode 0x00 with nop and are told
// apart by the full 16-bit unit.
const PACKED_SWITCH_PAYLOAD: u16 = 0x0100;
const SPARSE_SWITCH_PAYLOAD: u16 = 0x0200;
const FILL_ARRAY_DATA_PAYLOAD: u16 = 0x0300;

/// A bounds-checked view of a method's instruction stream, counted in
/// 16-bit code units.
struct CodeUnits<'a> {
    bytes: &'a [u8],
    len: usize,
}

impl CodeUnits<'_> {
    fn unit(&self, index: usize) -> Option<u16> {
        if index >= self.len {
            return None;
        }
        let bytes = self.bytes.get(index * 2..index * 2 + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn unit_u32(&self, index: usize) -> Option<u32> {
        Some(u32::from(self.unit(index)?) | u32::from(self.unit(index + 1)?) << 16)
    }
}

impl<'a> DexState<'a> {
    /// Resolves the instruction stream of the code item at `code_off`,
    /// handling both the standard and the compact header layout.
    fn code_units(&self, code_off: u32) -> Option<CodeUnits<'a>> {
        let data = self.reader.data();
        let start = code_off as usize;
        if self.reader.is_compact() {
            let word = start + compact_code::INSNS_COUNT_AND_FLAGS_OFFSET;
            let bytes = data.get(word..word + 2)?;
            let count_and_flags = u16::from_le_bytes([bytes[0], bytes[1]]);
            let mut count = u32::from(count_and_flags) >> compact_code::INSNS_SIZE_SHIFT;
            let flags = compact_code::PreHeaderFlags::from_bits_truncate(count_and_flags);
            if flags.contains(compact_code::PreHeaderFlags::INSNS_SIZE) {
                // The two 16-bit words immediately before the code item
                // extend the count: first the low half, then the high.
                let low_off = start.checked_sub(2)?;
                let high_off = start.checked_sub(4)?;
                let low = data.get(low_off..low_off + 2)?;
                let high = data.get(high_off..high_off + 2)?;
                count = count
                    .wrapping_add(u32::from(u16::from_le_bytes([low[0], low[1]])))
                    .wrapping_add(u32::from(u16::from_le_bytes([high[0], high[1]])) << 16);
            }
            let bytes = data.get(start + compact_code::INSNS_OFFSET..)?;
            Some(CodeUnits {
                bytes,
                len: count as usize,
            })
        } else {
            let word = start + code::INSNS_SIZE_OFFSET;
            let bytes = data.get(word..word + 4)?;
            let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let bytes = data.get(start + code::INSNS_OFFSET..)?;
            Some(CodeUnits {
                bytes,
                len: count as usize,
            })
        }
    }

    /// Walks one method's instruction stream and records its string uses,
    /// invocations and field accesses. Returns whether the method loads a
    /// string with an id in `string_range` (`None` never matches).
    ///
    /// The sweep is strictly linear: branches are not followed, and the
    /// three payload pseudo-instructions are stepped over as opaque blocks.
    /// A method is scanned at most once; repeated calls return `false`
    /// without rescanning. Truncated or malformed streams end the sweep at
    /// the first read past the recorded unit count, keeping whatever edges
    /// were collected up to that point.
    pub(crate) fn scan_method(&self, method_id: u32, string_range: Option<(u32, u32)>) -> bool {
        let mut xrefs = self.xrefs.borrow_mut();
        if xrefs.scanned[method_id as usize] {
            return false;
        }
        xrefs.scanned[method_id as usize] = true;
        let Some(code_off) = self.method_code[method_id as usize] else {
            return false;
        };
        let Some(insns) = self.code_units(code_off.get()) else {
            return false;
        };

        let mut in_range = false;
        let mut pc = 0usize;
        while pc < insns.len {
            let Some(unit) = insns.unit(pc) else { break };
            let op = (unit & 0xff) as u8;
            match op {
                OP_CONST_STRING => {
                    if let Some(string_id) = insns.unit(pc + 1).map(u32::from) {
                        if string_range.is_some_and(|(lo, hi)| lo <= string_id && string_id < hi) {
                            in_range = true;
                        }
                        if let Some(uses) = xrefs.string_uses.get_mut(string_id as usize) {
                            uses.push(method_id);
                        }
                    }
                }
                OP_CONST_STRING_JUMBO => {
                    if let Some(string_id) = insns.unit_u32(pc + 1) {
                        if string_range.is_some_and(|(lo, hi)| lo <= string_id && string_id < hi) {
                            in_range = true;
                        }
                        if let Some(uses) = xrefs.string_uses.get_mut(string_id as usize) {
                            uses.push(method_id);
                        }
                    }
                }
                OP_IGET_FIRST..=OP_IGET_LAST | OP_SGET_FIRST..=OP_SGET_LAST => {
                    if let Some(field_id) = insns.unit(pc + 1) {
                        if let Some(readers) = xrefs.field_reads.get_mut(usize::from(field_id)) {
                            readers.push(method_id);
                        }
                    }
                }
                OP_IPUT_FIRST..=OP_IPUT_LAST | OP_SPUT_FIRST..=OP_SPUT_LAST => {
                    if let Some(field_id) = insns.unit(pc + 1) {
                        if let Some(writers) = xrefs.field_writes.get_mut(usize::from(field_id)) {
                            writers.push(method_id);
                        }
                    }
                }
                OP_INVOKE_FIRST..=OP_INVOKE_LAST
                | OP_INVOKE_RANGE_FIRST..=OP_INVOKE_RANGE_LAST => {
                    if let Some(callee) = insns.unit(pc + 1).map(u32::from) {
                        xrefs.invokes_out[method_id as usize].push(callee);
                        if let Some(callers) = xrefs.invokes_in.get_mut(callee as usize) {
                            callers.push(method_id);
                        }
                    }
                }
                OP_NOP => match unit {
                    PACKED_SWITCH_PAYLOAD => {
                        if let Some(size) = insns.unit(pc + 1) {
                            pc += usize::from(size) * 2 + 3;
                        }
                    }
                    SPARSE_SWITCH_PAYLOAD => {
                        if let Some(size) = insns.unit(pc + 1) {
                            pc += usize::from(size) * 4 + 1;
                        }
                    }
                    FILL_ARRAY_DATA_PAYLOAD => {
                        if let (Some(width), Some(size)) =
                            (insns.unit(pc + 1), insns.unit_u32(pc + 2))
                        {
                            let data_units = (u64::from(size) * u64::from(width) + 1) / 2;
                            pc = pc
                                .saturating_add(usize::try_from(data_units).unwrap_or(usize::MAX))
                                .saturating_add(3);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
            pc = pc.saturating_add(usize::from(OPCODE_LEN[usize::from(op)]));
        }
        in_range
    }
}
