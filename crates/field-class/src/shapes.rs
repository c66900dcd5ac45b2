//! The concrete shapes a [`crate::FieldClass`] can take.

use crate::scope::Link;
use flowtrace_ranges::RangeSet;

/// A named flag over a [`BitArrayFc`], active when the bit-array's
/// value has at least one bit set within the flag's range set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitArrayFlag {
    pub(crate) label: String,
    pub(crate) bit_ranges: RangeSet,
}

impl BitArrayFlag {
    /// The flag's label, unique within its bit-array field class.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The bit positions (as an unsigned range set) that activate this
    /// flag.
    pub fn bit_ranges(&self) -> &RangeSet {
        &self.bit_ranges
    }
}

/// A fixed-length sequence of bits, interpreted as a set of named
/// flags rather than a number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitArrayFc {
    pub(crate) length: u64,
    pub(crate) flags: Vec<BitArrayFlag>,
}

impl BitArrayFc {
    /// The bit-array's fixed length, in bits.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The flags defined over this bit-array, in declaration order.
    pub fn flags(&self) -> &[BitArrayFlag] {
        &self.flags
    }

    /// The labels of the flags active for `value`, in declaration
    /// order.
    pub fn active_flags(&self, value: u64) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|f| (0..self.length).any(|bit| (value >> bit) & 1 == 1 && f.bit_ranges.contains_unsigned(bit)))
            .map(|f| f.label.as_str())
            .collect()
    }
}

/// How an integer field class's value should be rendered by a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerDisplayBase {
    /// Base 2.
    Binary,
    /// Base 8.
    Octal,
    /// Base 10.
    Decimal,
    /// Base 16.
    Hexadecimal,
}

/// A fixed-length integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerFc {
    pub(crate) length: u64,
    pub(crate) display_base: IntegerDisplayBase,
}

impl IntegerFc {
    /// The integer's fixed length, in bits (1 to 64 inclusive).
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The preferred display base for this integer's values.
    pub fn display_base(&self) -> IntegerDisplayBase {
        self.display_base
    }
}

/// A named mapping of an enumeration, covering the integer values for
/// which it applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationMapping {
    pub(crate) label: String,
    pub(crate) ranges: RangeSet,
}

impl EnumerationMapping {
    /// The mapping's label, unique within its enumeration field class.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The integer ranges covered by this mapping. Overlapping ranges
    /// across distinct mappings of the same enumeration are permitted:
    /// a single value may carry more than one label.
    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }
}

/// An integer field class with a set of named mappings attached to
/// ranges of its values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationFc {
    pub(crate) integer: IntegerFc,
    pub(crate) mappings: Vec<EnumerationMapping>,
}

impl EnumerationFc {
    /// The underlying integer shape.
    pub fn integer(&self) -> &IntegerFc {
        &self.integer
    }

    /// The mappings defined on this enumeration, in declaration order.
    pub fn mappings(&self) -> &[EnumerationMapping] {
        &self.mappings
    }

    /// The labels of the mappings that cover the unsigned `value`.
    pub fn labels_for_unsigned(&self, value: u64) -> Vec<&str> {
        self.mappings
            .iter()
            .filter(|m| m.ranges.contains_unsigned(value))
            .map(|m| m.label.as_str())
            .collect()
    }

    /// The labels of the mappings that cover the signed `value`.
    pub fn labels_for_signed(&self, value: i64) -> Vec<&str> {
        self.mappings
            .iter()
            .filter(|m| m.ranges.contains_signed(value))
            .map(|m| m.label.as_str())
            .collect()
    }
}

/// A fixed-length byte sequence (MIP >= 1 only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticBlobFc {
    pub(crate) length_bytes: u64,
}

impl StaticBlobFc {
    /// The blob's fixed length, in bytes.
    pub fn length_bytes(&self) -> u64 {
        self.length_bytes
    }
}

/// A variable-length byte sequence whose length is carried by the
/// field value itself (MIP >= 1 only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicBlobFc {}

/// A variable-length byte sequence whose length is supplied by a
/// linked anterior field (MIP >= 1 only).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicBlobWithLengthFc {
    pub(crate) length_link: Link,
}

impl DynamicBlobWithLengthFc {
    /// The link to this blob's length field.
    pub fn length_link(&self) -> &Link {
        &self.length_link
    }
}

/// A fixed-length, homogeneous sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticArrayFc {
    pub(crate) element_field_class: Box<crate::FieldClass>,
    pub(crate) length: u64,
}

impl StaticArrayFc {
    /// The shape of each element.
    pub fn element_field_class(&self) -> &crate::FieldClass {
        &self.element_field_class
    }

    /// The array's fixed element count.
    pub fn length(&self) -> u64 {
        self.length
    }
}

/// A variable-length, homogeneous sequence whose length is carried by
/// the field value itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicArrayFc {
    pub(crate) element_field_class: Box<crate::FieldClass>,
}

impl DynamicArrayFc {
    /// The shape of each element.
    pub fn element_field_class(&self) -> &crate::FieldClass {
        &self.element_field_class
    }
}

/// A variable-length, homogeneous sequence whose length is supplied by
/// a linked anterior field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicArrayWithLengthFc {
    pub(crate) element_field_class: Box<crate::FieldClass>,
    pub(crate) length_link: Link,
}

impl DynamicArrayWithLengthFc {
    /// The shape of each element.
    pub fn element_field_class(&self) -> &crate::FieldClass {
        &self.element_field_class
    }

    /// The link to this array's length field.
    pub fn length_link(&self) -> &Link {
        &self.length_link
    }
}

/// One named member of a [`StructureFc`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureMember {
    pub(crate) name: String,
    pub(crate) field_class: Box<crate::FieldClass>,
}

impl StructureMember {
    /// The member's name, unique within its structure.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member's field class.
    pub fn field_class(&self) -> &crate::FieldClass {
        &self.field_class
    }
}

/// An ordered collection of named, heterogeneous members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureFc {
    pub(crate) members: Vec<StructureMember>,
}

impl StructureFc {
    /// The members, in declaration order.
    pub fn members(&self) -> &[StructureMember] {
        &self.members
    }

    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&StructureMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// The index of a member by name.
    pub fn member_index(&self, name: &str) -> Option<u32> {
        self.members.iter().position(|m| m.name == name).map(|i| i as u32)
    }
}

/// An optional field with no selector field class attached: whether
/// the content is present is decided by the reader/writer out of band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionFc {
    pub(crate) content_field_class: Box<crate::FieldClass>,
}

impl OptionFc {
    /// The shape of the content, when present.
    pub fn content_field_class(&self) -> &crate::FieldClass {
        &self.content_field_class
    }
}

/// An optional field whose presence is decided by a linked `bool`
/// selector field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionWithBoolSelectorFc {
    pub(crate) content_field_class: Box<crate::FieldClass>,
    pub(crate) selector_link: Link,
    pub(crate) selector_is_reversed: bool,
}

impl OptionWithBoolSelectorFc {
    /// The shape of the content, when present.
    pub fn content_field_class(&self) -> &crate::FieldClass {
        &self.content_field_class
    }

    /// The link to the boolean selector field.
    pub fn selector_link(&self) -> &Link {
        &self.selector_link
    }

    /// When `true`, a selector value of `false` means "present" (the
    /// usual boolean meaning is reversed).
    pub fn selector_is_reversed(&self) -> bool {
        self.selector_is_reversed
    }
}

/// An optional field whose presence is decided by whether a linked
/// integer selector's value falls within a fixed range set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionWithIntegerSelectorFc {
    pub(crate) content_field_class: Box<crate::FieldClass>,
    pub(crate) selector_link: Link,
    pub(crate) selector_ranges: RangeSet,
}

impl OptionWithIntegerSelectorFc {
    /// The shape of the content, when present.
    pub fn content_field_class(&self) -> &crate::FieldClass {
        &self.content_field_class
    }

    /// The link to the integer selector field.
    pub fn selector_link(&self) -> &Link {
        &self.selector_link
    }

    /// The selector ranges for which the content is present.
    pub fn selector_ranges(&self) -> &RangeSet {
        &self.selector_ranges
    }
}

/// One option of a selector-less [`VariantFc`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantOption {
    pub(crate) name: Option<String>,
    pub(crate) field_class: Box<crate::FieldClass>,
}

impl VariantOption {
    /// The option's name, if any (MIP 0 requires one; MIP >= 1 allows
    /// an unnamed option).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The option's field class.
    pub fn field_class(&self) -> &crate::FieldClass {
        &self.field_class
    }
}

/// A union of named, heterogeneous options with no selector field
/// class attached: which option is active is decided out of band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantFc {
    pub(crate) options: Vec<VariantOption>,
}

impl VariantFc {
    /// The options, in declaration order.
    pub fn options(&self) -> &[VariantOption] {
        &self.options
    }
}

/// One option of a selector-bearing variant, active when the linked
/// integer selector's value falls within `ranges`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantSelectorOption {
    pub(crate) name: Option<String>,
    pub(crate) field_class: Box<crate::FieldClass>,
    pub(crate) ranges: RangeSet,
}

impl VariantSelectorOption {
    /// The option's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The option's field class.
    pub fn field_class(&self) -> &crate::FieldClass {
        &self.field_class
    }

    /// The selector ranges for which this option is active.
    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }
}

/// A union of named, heterogeneous options selected by a linked
/// integer field's value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantWithSelectorFc {
    pub(crate) options: Vec<VariantSelectorOption>,
    pub(crate) selector_link: Link,
}

impl VariantWithSelectorFc {
    /// The options, in declaration order.
    pub fn options(&self) -> &[VariantSelectorOption] {
        &self.options
    }

    /// The link to the integer selector field.
    pub fn selector_link(&self) -> &Link {
        &self.selector_link
    }
}

/// The shape of a [`crate::FieldClass`]: everything that distinguishes
/// one kind of field from another, beyond the common tag/attributes/
/// freeze state carried by the wrapper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldClassShape {
    /// `bool`.
    Bool,
    /// `bit-array`.
    BitArray(BitArrayFc),
    /// `unsigned-integer`.
    UnsignedInteger(IntegerFc),
    /// `signed-integer`.
    SignedInteger(IntegerFc),
    /// `unsigned-enumeration`.
    UnsignedEnumeration(EnumerationFc),
    /// `signed-enumeration`.
    SignedEnumeration(EnumerationFc),
    /// `single-precision-real`.
    SinglePrecisionReal,
    /// `double-precision-real`.
    DoublePrecisionReal,
    /// `string`.
    String,
    /// `static-blob`.
    StaticBlob(StaticBlobFc),
    /// `dynamic-blob` without a linked length.
    DynamicBlobWithoutLength(DynamicBlobFc),
    /// `dynamic-blob` with a linked length.
    DynamicBlobWithLength(DynamicBlobWithLengthFc),
    /// `static-array`.
    StaticArray(StaticArrayFc),
    /// `dynamic-array` without a linked length.
    DynamicArrayWithoutLength(DynamicArrayFc),
    /// `dynamic-array` with a linked length.
    DynamicArrayWithLength(DynamicArrayWithLengthFc),
    /// `structure`.
    Structure(StructureFc),
    /// `option-without-selector`.
    OptionWithoutSelector(OptionFc),
    /// `option-with-bool-selector`.
    OptionWithBoolSelector(OptionWithBoolSelectorFc),
    /// `option-with-unsigned-integer-selector`.
    OptionWithUnsignedIntegerSelector(OptionWithIntegerSelectorFc),
    /// `option-with-signed-integer-selector`.
    OptionWithSignedIntegerSelector(OptionWithIntegerSelectorFc),
    /// `variant-without-selector`.
    VariantWithoutSelector(VariantFc),
    /// `variant-with-unsigned-integer-selector`.
    VariantWithUnsignedIntegerSelector(VariantWithSelectorFc),
    /// `variant-with-signed-integer-selector`.
    VariantWithSignedIntegerSelector(VariantWithSelectorFc),
}
