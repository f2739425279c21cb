//! On-disk structures of the DEX format: header fields, id-table records,
//! code-item layouts and the Dalvik instruction width table.
//!
//! Multi-byte values are little-endian throughout; the endian tag in the
//! header is checked by [`crate::dex::DexReader`] and the byte-swapped
//! variant is rejected.

use bitflags::bitflags;

/// `dex\n`, the first half of a standard DEX magic.
pub const DEX_MAGIC: &[u8; 4] = b"dex\n";
/// `cdex`, the first half of a compact DEX magic.
pub const COMPACT_DEX_MAGIC: &[u8; 4] = b"cdex";

/// The constant an un-swapped header stores in its endian tag field.
pub const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// The sentinel meaning "no index" in DEX tables and in this crate's
/// per-DEX id slots.
pub const NO_INDEX: u32 = u32::MAX;

/// Size of both header layouts' shared fixed prefix, which carries all the
/// id-table offsets this crate consumes.
pub const HEADER_SIZE: usize = 0x70;

/// The format revision parsed out of the eight magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// A standard DEX, versions `035` through `041`.
    Standard(u16),
    /// A compact DEX (`cdex`), the ART-internal layout with packed
    /// code-item headers.
    Compact(u16),
}

impl Format {
    /// Whether code items use the compact layout.
    #[must_use]
    pub const fn is_compact(self) -> bool {
        matches!(self, Self::Compact(_))
    }
}

/// The fixed-size header fields the reader consumes.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    /// Parsed magic.
    pub format: Format,
    /// Declared size of the whole image.
    pub file_size: u32,
    /// Offset of the map list (unused by this crate).
    pub map_off: u32,
    /// Number of entries in the string id table.
    pub string_ids_size: u32,
    /// Offset of the string id table.
    pub string_ids_off: u32,
    /// Number of entries in the type id table.
    pub type_ids_size: u32,
    /// Offset of the type id table.
    pub type_ids_off: u32,
    /// Number of entries in the proto id table.
    pub proto_ids_size: u32,
    /// Offset of the proto id table.
    pub proto_ids_off: u32,
    /// Number of entries in the field id table.
    pub field_ids_size: u32,
    /// Offset of the field id table.
    pub field_ids_off: u32,
    /// Number of entries in the method id table.
    pub method_ids_size: u32,
    /// Offset of the method id table.
    pub method_ids_off: u32,
    /// Number of entries in the class def table.
    pub class_defs_size: u32,
    /// Offset of the class def table.
    pub class_defs_off: u32,
    /// Declared size of the data section.
    pub data_size: u32,
    /// Offset of the data section within the image.
    pub data_off: u32,
}

/// A `string_id_item`: one offset into the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringId {
    /// Offset of the `string_data_item` (ULEB128 length, MUTF-8 bytes,
    /// NUL) in the data section.
    pub string_data_off: u32,
}

/// A `type_id_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeId {
    /// String id of the type descriptor.
    pub descriptor_idx: u32,
}

/// A `proto_id_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtoId {
    /// String id of the shorty descriptor.
    pub shorty_idx: u32,
    /// Type id of the return type.
    pub return_type_idx: u32,
    /// Offset of the parameter `type_list` in the data section, or 0 for
    /// no parameters.
    pub parameters_off: u32,
}

/// A `field_id_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldId {
    /// Type id of the declaring class.
    pub class_idx: u16,
    /// Type id of the field's type.
    pub type_idx: u16,
    /// String id of the field name.
    pub name_idx: u32,
}

/// A `method_id_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodId {
    /// Type id of the declaring class.
    pub class_idx: u16,
    /// Proto id of the method prototype.
    pub proto_idx: u16,
    /// String id of the method name.
    pub name_idx: u32,
}

/// A `class_def_item`.
#[derive(Debug, Clone, Copy)]
pub struct ClassDef {
    /// Type id of this class.
    pub class_idx: u32,
    /// Access flags of the class.
    pub access_flags: AccessFlags,
    /// Type id of the superclass, or [`NO_INDEX`].
    pub superclass_idx: u32,
    /// Offset of the interface `type_list`, or 0.
    pub interfaces_off: u32,
    /// String id of the source file name, or [`NO_INDEX`].
    pub source_file_idx: u32,
    /// Offset of the annotations directory, or 0.
    pub annotations_off: u32,
    /// Offset of the `class_data_item`, or 0 for a class with no fields
    /// and no methods.
    pub class_data_off: u32,
    /// Offset of the static value initializers, or 0.
    pub static_values_off: u32,
}

bitflags! {
    /// DEX access flags, as found on classes, fields and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere.
        const PUBLIC = 0x0001;
        /// Visible only to the defining class.
        const PRIVATE = 0x0002;
        /// Visible to the package and subclasses.
        const PROTECTED = 0x0004;
        /// Static member.
        const STATIC = 0x0008;
        /// Not mutable, overridable or subclassable.
        const FINAL = 0x0010;
        /// Locks the monitor around invocation (methods only).
        const SYNCHRONIZED = 0x0020;
        /// Volatile field, or bridge method.
        const VOLATILE_OR_BRIDGE = 0x0040;
        /// Transient field, or varargs method.
        const TRANSIENT_OR_VARARGS = 0x0080;
        /// Implemented in native code.
        const NATIVE = 0x0100;
        /// An interface rather than a class.
        const INTERFACE = 0x0200;
        /// Abstract; carries no code item.
        const ABSTRACT = 0x0400;
        /// Strict floating-point semantics.
        const STRICT = 0x0800;
        /// Not present in source.
        const SYNTHETIC = 0x1000;
        /// An annotation interface.
        const ANNOTATION = 0x2000;
        /// An enum class or field.
        const ENUM = 0x4000;
        /// A constructor.
        const CONSTRUCTOR = 0x1_0000;
        /// `synchronized` declared in source.
        const DECLARED_SYNCHRONIZED = 0x2_0000;
    }
}

/// Layout of a standard `code_item`: six `u16` fields and a `u32` debug
/// offset precede the instruction count.
pub mod code {
    /// Byte offset of `insns_size` (a `u32`, counted in 16-bit units).
    pub const INSNS_SIZE_OFFSET: usize = 12;
    /// Byte offset of the first instruction unit.
    pub const INSNS_OFFSET: usize = 16;
}

/// Layout of a compact `code_item`: a packed `fields` word and a combined
/// count-and-flags word precede the instructions.
pub mod compact_code {
    use bitflags::bitflags;

    /// Byte offset of `insns_count_and_flags`.
    pub const INSNS_COUNT_AND_FLAGS_OFFSET: usize = 2;
    /// Byte offset of the first instruction unit.
    pub const INSNS_OFFSET: usize = 4;
    /// The instruction count occupies the bits above the flag nibble.
    pub const INSNS_SIZE_SHIFT: u32 = 5;

    bitflags! {
        /// Flags in the low bits of `insns_count_and_flags`; each marks a
        /// field that overflowed into the pre-header words preceding the
        /// code item.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct PreHeaderFlags: u16 {
            /// Register count continues in the pre-header.
            const REGISTERS_SIZE = 0x01;
            /// Incoming argument count continues in the pre-header.
            const INS_SIZE = 0x02;
            /// Outgoing argument count continues in the pre-header.
            const OUTS_SIZE = 0x04;
            /// Try-block count continues in the pre-header.
            const TRIES_SIZE = 0x08;
            /// Instruction count continues in the pre-header: the two
            /// 16-bit words immediately before the code item hold the low
            /// and high halves of a 32-bit addend.
            const INSNS_SIZE = 0x10;
        }
    }
}

/// Widths of Dalvik instructions in 16-bit code units, indexed by opcode.
///
/// Payload pseudo-instructions (`packed-switch-payload`,
/// `sparse-switch-payload`, `fill-array-data-payload`) share opcode `0x00`
/// and have data-dependent sizes the scanner computes separately.
#[rustfmt::skip]
pub const OPCODE_LEN: [u8; 256] = [
    // 0x00: nop .. return
    1, 1, 2, 3, 1, 2, 3, 1, 2, 3, 1, 1, 1, 1, 1, 1,
    // 0x10: return-wide .. check-cast
    1, 1, 1, 2, 3, 2, 2, 3, 5, 2, 2, 3, 2, 1, 1, 2,
    // 0x20: instance-of .. cmpl-double
    2, 1, 2, 2, 3, 3, 3, 1, 1, 2, 3, 3, 3, 2, 2, 2,
    // 0x30: cmpg-double .. unused
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1,
    // 0x40: unused .. aput-byte
    1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0x50: aput-char .. iput-short
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0x60: sget .. invoke-super
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 3,
    // 0x70: invoke-direct .. neg-float
    3, 3, 3, 1, 3, 3, 3, 3, 3, 1, 1, 1, 1, 1, 1, 1,
    // 0x80: neg-double .. int-to-short
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0x90: add-int .. xor-long
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xa0: shl-long .. rem-double
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xb0: add-int/2addr .. xor-long/2addr
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0xc0: shl-long/2addr .. rem-double/2addr
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0xd0: add-int/lit16 .. rsub-int/lit8
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xe0: and-int/lit8 .. unused
    2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0xf0: unused .. const-method-type
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 4, 4, 3, 3, 2, 2,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_spot_checks() {
        assert_eq!(OPCODE_LEN[0x00], 1); // nop
        assert_eq!(OPCODE_LEN[0x0e], 1); // return-void
        assert_eq!(OPCODE_LEN[0x18], 5); // const-wide
        assert_eq!(OPCODE_LEN[0x1a], 2); // const-string
        assert_eq!(OPCODE_LEN[0x1b], 3); // const-string/jumbo
        assert_eq!(OPCODE_LEN[0x2b], 3); // packed-switch
        assert_eq!(OPCODE_LEN[0x52], 2); // iget
        assert_eq!(OPCODE_LEN[0x60], 2); // sget
        assert_eq!(OPCODE_LEN[0x6e], 3); // invoke-virtual
        assert_eq!(OPCODE_LEN[0x78], 3); // invoke-interface/range
        assert_eq!(OPCODE_LEN[0xfa], 4); // invoke-polymorphic
        assert_eq!(OPCODE_LEN[0xff], 2); // const-method-type
    }

    #[test]
    fn compact_count_bits_do_not_overlap_flags() {
        let flags = compact_code::PreHeaderFlags::all().bits();
        assert_eq!(u32::from(flags) >> compact_code::INSNS_SIZE_SHIFT, 0);
    }
}
