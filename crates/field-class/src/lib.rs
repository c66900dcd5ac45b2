#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! The field class tree: the recursive description of the shape a
//! field takes, from scalars (`bool`, integers, reals, strings) up
//! through composites (structures, arrays, options, variants).
//!
//! A [`FieldClass`] owns its children outright (`Box`, never `Rc`): a
//! field class belongs to exactly one parent and, transitively, to
//! exactly one trace class. This is enforced by the type system rather
//! than by a runtime check — there is no way to attach the same
//! [`FieldClass`] value under two parents, because attaching one moves
//! it.
//!
//! Field classes referencing an anterior field (a dynamic array's
//! length, an option's or variant's selector) hold a
//! [`scope::Link`] rather than a raw reference to that field, since the
//! anterior field lives in a different part of the same owned tree and
//! cannot be borrowed from here.
//!
//! Freezing is transitive and viral: freezing a field class recursively
//! freezes every field class nested within it, and a frozen field
//! class (or any container that already contains one) rejects further
//! mutation.

mod kind;
mod scope;
mod shapes;

pub use kind::{type_is, FieldClassType};
pub use scope::{FieldClassTag, FieldLocation, FieldPath, Link, Scope};
pub use shapes::{
    BitArrayFc, BitArrayFlag, DynamicArrayFc, DynamicArrayWithLengthFc, DynamicBlobFc, DynamicBlobWithLengthFc,
    EnumerationFc, EnumerationMapping, FieldClassShape, IntegerDisplayBase, IntegerFc, OptionFc,
    OptionWithBoolSelectorFc, OptionWithIntegerSelectorFc, StaticArrayFc, StaticBlobFc, StructureFc, StructureMember,
    VariantFc, VariantOption, VariantSelectorOption, VariantWithSelectorFc,
};

use flowtrace_attrs::UserAttributes;
use flowtrace_ranges::{RangeSet, Signedness};
use thiserror::Error;

/// Errors raised while constructing or mutating a field class.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An integer or bit-array length was zero or exceeded 64 bits.
    #[error("invalid field length in bits: {length} (must be in 1..=64)")]
    InvalidLength {
        /// The rejected length.
        length: u64,
    },

    /// Two flags, mappings, or members share a label/name that must be
    /// unique within their container.
    #[error("duplicate label {label:?} in {container}")]
    DuplicateLabel {
        /// The container field class kind (e.g. `"bit-array"`,
        /// `"structure"`).
        container: &'static str,
        /// The label or name that was already present.
        label: String,
    },

    /// A range set passed the wrong [`Signedness`] for its container.
    #[error("range signedness mismatch: expected {expected:?}, got {actual:?}")]
    SignednessMismatch {
        /// The signedness required by the container.
        expected: Signedness,
        /// The signedness actually supplied.
        actual: Signedness,
    },

    /// Two options of the same selector-bearing variant (or two flags
    /// of the same bit-array) have overlapping ranges where disjoint
    /// ranges are required.
    #[error("overlapping ranges in {container}")]
    OverlappingRanges {
        /// The container field class kind.
        container: &'static str,
    },

    /// A variant or a structure was built with zero options/members
    /// where at least one is required.
    #[error("{container} must have at least one {item}")]
    Empty {
        /// The container field class kind.
        container: &'static str,
        /// What is missing (e.g. `"option"`, `"member"`).
        item: &'static str,
    },

    /// A construct requiring a minimum Message Interchange Protocol
    /// version was attempted below it (e.g. blobs, unnamed variant
    /// options — MIP >= 1 only).
    #[error("{what} requires MIP >= {required}, trace class is MIP {actual}")]
    MipTooLow {
        /// What required the higher MIP version.
        what: &'static str,
        /// The minimum MIP version required.
        required: u8,
        /// The MIP version actually in use.
        actual: u8,
    },

    /// A mutating operation (appending a member, a flag, a mapping, an
    /// option) was attempted on a field class that has already been
    /// frozen.
    #[error("field class is frozen and cannot be mutated")]
    Frozen,

    /// Propagated from the underlying range/range-set construction.
    #[error(transparent)]
    Range(#[from] flowtrace_ranges::Error),
}

/// The Message Interchange Protocol version a field class tree is
/// built against. Only `0` and `AtLeastOne` affect construction rules
/// here (blobs and unnamed variant options require `AtLeastOne`);
/// higher graduations within MIP >= 1 are not distinguished at this
/// layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mip {
    /// MIP 0: field paths are index-based, blobs don't exist, variant
    /// options must be named.
    Zero,
    /// MIP >= 1: field locations are name-based, blobs are available,
    /// variant options may be unnamed.
    AtLeastOne,
}

impl Mip {
    fn require_at_least_one(self, what: &'static str) -> Result<(), Error> {
        match self {
            Mip::AtLeastOne => Ok(()),
            Mip::Zero => Err(Error::MipTooLow {
                what,
                required: 1,
                actual: 0,
            }),
        }
    }
}

/// A node in the field class tree.
///
/// Every field class carries a process-wide [`FieldClassTag`] assigned
/// at construction (used to resolve MIP 0 links post-hoc), an
/// arbitrary bag of [`UserAttributes`], and a frozen flag set the
/// first time the field class (or an ancestor of it) is attached to a
/// frozen trace class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldClass {
    tag: FieldClassTag,
    shape: FieldClassShape,
    user_attributes: UserAttributes,
    frozen: bool,
}

impl FieldClass {
    fn new(shape: FieldClassShape) -> Self {
        Self {
            tag: FieldClassTag::fresh(),
            shape,
            user_attributes: UserAttributes::new(),
            frozen: false,
        }
    }

    /// This field class's identity tag.
    pub fn tag(&self) -> FieldClassTag {
        self.tag
    }

    /// The field class's shape.
    pub fn shape(&self) -> &FieldClassShape {
        &self.shape
    }

    /// This field class's user attributes.
    pub fn user_attributes(&self) -> &UserAttributes {
        &self.user_attributes
    }

    /// A mutable view of this field class's user attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this field class is frozen.
    pub fn user_attributes_mut(&mut self) -> Result<&mut UserAttributes, Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        Ok(&mut self.user_attributes)
    }

    /// Whether this field class has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freezes this field class and, recursively, every field class
    /// nested within it.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;
        for child in self.children_mut() {
            child.freeze();
        }
    }

    fn children_mut(&mut self) -> Vec<&mut FieldClass> {
        match &mut self.shape {
            FieldClassShape::StaticArray(a) => vec![a.element_field_class.as_mut()],
            FieldClassShape::DynamicArrayWithoutLength(a) => vec![a.element_field_class.as_mut()],
            FieldClassShape::DynamicArrayWithLength(a) => vec![a.element_field_class.as_mut()],
            FieldClassShape::Structure(s) => s.members.iter_mut().map(|m| m.field_class.as_mut()).collect(),
            FieldClassShape::OptionWithoutSelector(o) => vec![o.content_field_class.as_mut()],
            FieldClassShape::OptionWithBoolSelector(o) => vec![o.content_field_class.as_mut()],
            FieldClassShape::OptionWithUnsignedIntegerSelector(o) => vec![o.content_field_class.as_mut()],
            FieldClassShape::OptionWithSignedIntegerSelector(o) => vec![o.content_field_class.as_mut()],
            FieldClassShape::VariantWithoutSelector(v) => v.options.iter_mut().map(|o| o.field_class.as_mut()).collect(),
            FieldClassShape::VariantWithUnsignedIntegerSelector(v) => {
                v.options.iter_mut().map(|o| o.field_class.as_mut()).collect()
            }
            FieldClassShape::VariantWithSignedIntegerSelector(v) => {
                v.options.iter_mut().map(|o| o.field_class.as_mut()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// This field class's concrete [`FieldClassType`], usable with
    /// [`type_is`] to test supertype membership.
    pub fn field_class_type(&self) -> FieldClassType {
        use FieldClassShape as S;
        match &self.shape {
            S::Bool => FieldClassType::BOOL,
            S::BitArray(_) => FieldClassType::BIT_ARRAY,
            S::UnsignedInteger(_) => FieldClassType::UNSIGNED_INTEGER,
            S::SignedInteger(_) => FieldClassType::SIGNED_INTEGER,
            S::UnsignedEnumeration(_) => FieldClassType::UNSIGNED_ENUMERATION,
            S::SignedEnumeration(_) => FieldClassType::SIGNED_ENUMERATION,
            S::SinglePrecisionReal => FieldClassType::SINGLE_PRECISION_REAL,
            S::DoublePrecisionReal => FieldClassType::DOUBLE_PRECISION_REAL,
            S::String => FieldClassType::STRING,
            S::StaticBlob(_) => FieldClassType::STATIC_BLOB,
            S::DynamicBlobWithoutLength(_) => FieldClassType::DYNAMIC_BLOB_WITHOUT_LENGTH_FIELD,
            S::DynamicBlobWithLength(_) => FieldClassType::DYNAMIC_BLOB_WITH_LENGTH_FIELD,
            S::StaticArray(_) => FieldClassType::STATIC_ARRAY,
            S::DynamicArrayWithoutLength(_) => FieldClassType::DYNAMIC_ARRAY_WITHOUT_LENGTH_FIELD,
            S::DynamicArrayWithLength(_) => FieldClassType::DYNAMIC_ARRAY_WITH_LENGTH_FIELD,
            S::Structure(_) => FieldClassType::STRUCTURE,
            S::OptionWithoutSelector(_) => FieldClassType::OPTION_WITHOUT_SELECTOR_FIELD,
            S::OptionWithBoolSelector(_) => FieldClassType::OPTION_WITH_BOOL_SELECTOR_FIELD,
            S::OptionWithUnsignedIntegerSelector(_) => FieldClassType::OPTION_WITH_UNSIGNED_INTEGER_SELECTOR_FIELD,
            S::OptionWithSignedIntegerSelector(_) => FieldClassType::OPTION_WITH_SIGNED_INTEGER_SELECTOR_FIELD,
            S::VariantWithoutSelector(_) => FieldClassType::VARIANT_WITHOUT_SELECTOR_FIELD,
            S::VariantWithUnsignedIntegerSelector(_) => FieldClassType::VARIANT_WITH_UNSIGNED_INTEGER_SELECTOR_FIELD,
            S::VariantWithSignedIntegerSelector(_) => FieldClassType::VARIANT_WITH_SIGNED_INTEGER_SELECTOR_FIELD,
        }
    }

    /// Returns `true` if this field class is of type `super_`, directly
    /// or through an abstract supertype.
    pub fn is_a(&self, super_: FieldClassType) -> bool {
        type_is(self.field_class_type(), super_)
    }

    // -- scalar constructors --------------------------------------------

    /// Creates a `bool` field class.
    pub fn new_bool() -> Self {
        Self::new(FieldClassShape::Bool)
    }

    /// Creates a `bit-array` field class with no flags yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] unless `1 <= length <= 64`.
    pub fn new_bit_array(length: u64) -> Result<Self, Error> {
        check_length(length)?;
        Ok(Self::new(FieldClassShape::BitArray(BitArrayFc { length, flags: Vec::new() })))
    }

    /// Creates an `unsigned-integer` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] unless `1 <= length <= 64`.
    pub fn new_unsigned_integer(length: u64, display_base: IntegerDisplayBase) -> Result<Self, Error> {
        check_length(length)?;
        Ok(Self::new(FieldClassShape::UnsignedInteger(IntegerFc { length, display_base })))
    }

    /// Creates a `signed-integer` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] unless `1 <= length <= 64`.
    pub fn new_signed_integer(length: u64, display_base: IntegerDisplayBase) -> Result<Self, Error> {
        check_length(length)?;
        Ok(Self::new(FieldClassShape::SignedInteger(IntegerFc { length, display_base })))
    }

    /// Creates an `unsigned-enumeration` field class with no mappings
    /// yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] unless `1 <= length <= 64`.
    pub fn new_unsigned_enumeration(length: u64, display_base: IntegerDisplayBase) -> Result<Self, Error> {
        check_length(length)?;
        Ok(Self::new(FieldClassShape::UnsignedEnumeration(EnumerationFc {
            integer: IntegerFc { length, display_base },
            mappings: Vec::new(),
        })))
    }

    /// Creates a `signed-enumeration` field class with no mappings yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] unless `1 <= length <= 64`.
    pub fn new_signed_enumeration(length: u64, display_base: IntegerDisplayBase) -> Result<Self, Error> {
        check_length(length)?;
        Ok(Self::new(FieldClassShape::SignedEnumeration(EnumerationFc {
            integer: IntegerFc { length, display_base },
            mappings: Vec::new(),
        })))
    }

    /// Creates a `single-precision-real` field class.
    pub fn new_single_precision_real() -> Self {
        Self::new(FieldClassShape::SinglePrecisionReal)
    }

    /// Creates a `double-precision-real` field class.
    pub fn new_double_precision_real() -> Self {
        Self::new(FieldClassShape::DoublePrecisionReal)
    }

    /// Creates a `string` field class.
    pub fn new_string() -> Self {
        Self::new(FieldClassShape::String)
    }

    // -- blobs (MIP >= 1 only) ------------------------------------------

    /// Creates a `static-blob` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MipTooLow`] if `mip` is [`Mip::Zero`].
    pub fn new_static_blob(mip: Mip, length_bytes: u64) -> Result<Self, Error> {
        mip.require_at_least_one("static-blob")?;
        Ok(Self::new(FieldClassShape::StaticBlob(StaticBlobFc { length_bytes })))
    }

    /// Creates a `dynamic-blob` field class with no linked length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MipTooLow`] if `mip` is [`Mip::Zero`].
    pub fn new_dynamic_blob_without_length(mip: Mip) -> Result<Self, Error> {
        mip.require_at_least_one("dynamic-blob")?;
        Ok(Self::new(FieldClassShape::DynamicBlobWithoutLength(DynamicBlobFc {})))
    }

    /// Creates a `dynamic-blob` field class whose length is supplied by
    /// `length_link`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MipTooLow`] if `mip` is [`Mip::Zero`].
    pub fn new_dynamic_blob_with_length(mip: Mip, length_link: Link) -> Result<Self, Error> {
        mip.require_at_least_one("dynamic-blob")?;
        Ok(Self::new(FieldClassShape::DynamicBlobWithLength(DynamicBlobWithLengthFc { length_link })))
    }

    // -- arrays -----------------------------------------------------------

    /// Creates a `static-array` field class.
    pub fn new_static_array(element_field_class: FieldClass, length: u64) -> Self {
        Self::new(FieldClassShape::StaticArray(StaticArrayFc {
            element_field_class: Box::new(element_field_class),
            length,
        }))
    }

    /// Creates a `dynamic-array` field class with no linked length.
    pub fn new_dynamic_array_without_length(element_field_class: FieldClass) -> Self {
        Self::new(FieldClassShape::DynamicArrayWithoutLength(DynamicArrayFc {
            element_field_class: Box::new(element_field_class),
        }))
    }

    /// Creates a `dynamic-array` field class whose length is supplied
    /// by `length_link`.
    pub fn new_dynamic_array_with_length(element_field_class: FieldClass, length_link: Link) -> Self {
        Self::new(FieldClassShape::DynamicArrayWithLength(DynamicArrayWithLengthFc {
            element_field_class: Box::new(element_field_class),
            length_link,
        }))
    }

    // -- structures ---------------------------------------------------------

    /// Creates a `structure` field class with no members yet.
    pub fn new_structure() -> Self {
        Self::new(FieldClassShape::Structure(StructureFc { members: Vec::new() }))
    }

    /// Appends a named member to a `structure` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if this field class is frozen, or
    /// [`Error::DuplicateLabel`] if `name` is already used by another
    /// member.
    pub fn append_member(&mut self, name: impl Into<String>, mut field_class: FieldClass) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        let FieldClassShape::Structure(s) = &mut self.shape else {
            panic!("append_member called on a non-structure field class");
        };
        let name = name.into();
        if s.members.iter().any(|m| m.name == name) {
            return Err(Error::DuplicateLabel { container: "structure", label: name });
        }
        field_class.freeze();
        s.members.push(StructureMember { name, field_class: Box::new(field_class) });
        Ok(())
    }

    // -- options --------------------------------------------------------

    /// Creates an `option-without-selector` field class.
    pub fn new_option_without_selector(content_field_class: FieldClass) -> Self {
        Self::new(FieldClassShape::OptionWithoutSelector(OptionFc {
            content_field_class: Box::new(content_field_class),
        }))
    }

    /// Creates an `option-with-bool-selector` field class.
    pub fn new_option_with_bool_selector(
        content_field_class: FieldClass,
        selector_link: Link,
        selector_is_reversed: bool,
    ) -> Self {
        Self::new(FieldClassShape::OptionWithBoolSelector(OptionWithBoolSelectorFc {
            content_field_class: Box::new(content_field_class),
            selector_link,
            selector_is_reversed,
        }))
    }

    /// Creates an `option-with-unsigned-integer-selector` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignednessMismatch`] if `selector_ranges` is
    /// not [`Signedness::Unsigned`].
    pub fn new_option_with_unsigned_integer_selector(
        content_field_class: FieldClass,
        selector_link: Link,
        selector_ranges: RangeSet,
    ) -> Result<Self, Error> {
        require_signedness(&selector_ranges, Signedness::Unsigned)?;
        Ok(Self::new(FieldClassShape::OptionWithUnsignedIntegerSelector(OptionWithIntegerSelectorFc {
            content_field_class: Box::new(content_field_class),
            selector_link,
            selector_ranges,
        })))
    }

    /// Creates an `option-with-signed-integer-selector` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignednessMismatch`] if `selector_ranges` is
    /// not [`Signedness::Signed`].
    pub fn new_option_with_signed_integer_selector(
        content_field_class: FieldClass,
        selector_link: Link,
        selector_ranges: RangeSet,
    ) -> Result<Self, Error> {
        require_signedness(&selector_ranges, Signedness::Signed)?;
        Ok(Self::new(FieldClassShape::OptionWithSignedIntegerSelector(OptionWithIntegerSelectorFc {
            content_field_class: Box::new(content_field_class),
            selector_link,
            selector_ranges,
        })))
    }

    // -- variants -------------------------------------------------------

    /// Creates a `variant-without-selector` field class with no
    /// options yet.
    pub fn new_variant_without_selector() -> Self {
        Self::new(FieldClassShape::VariantWithoutSelector(VariantFc { options: Vec::new() }))
    }

    /// Appends an option to a `variant-without-selector` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if frozen, [`Error::MipTooLow`] if
    /// `name` is `None` and `mip` is [`Mip::Zero`] (MIP 0 variant
    /// options must be named), or [`Error::DuplicateLabel`] if `name`
    /// is already used by another option.
    pub fn append_option(&mut self, mip: Mip, name: Option<String>, mut field_class: FieldClass) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if name.is_none() {
            mip.require_at_least_one("an unnamed variant option")?;
        }
        let FieldClassShape::VariantWithoutSelector(v) = &mut self.shape else {
            panic!("append_option called on a non-variant-without-selector field class");
        };
        if let Some(name) = &name {
            if v.options.iter().any(|o| o.name.as_deref() == Some(name.as_str())) {
                return Err(Error::DuplicateLabel { container: "variant", label: name.clone() });
            }
        }
        field_class.freeze();
        v.options.push(VariantOption { name, field_class: Box::new(field_class) });
        Ok(())
    }

    /// Creates a `variant-with-unsigned-integer-selector` field class
    /// with no options yet.
    pub fn new_variant_with_unsigned_integer_selector(selector_link: Link) -> Self {
        Self::new(FieldClassShape::VariantWithUnsignedIntegerSelector(VariantWithSelectorFc {
            options: Vec::new(),
            selector_link,
        }))
    }

    /// Creates a `variant-with-signed-integer-selector` field class
    /// with no options yet.
    pub fn new_variant_with_signed_integer_selector(selector_link: Link) -> Self {
        Self::new(FieldClassShape::VariantWithSignedIntegerSelector(VariantWithSelectorFc {
            options: Vec::new(),
            selector_link,
        }))
    }

    /// Appends a ranged option to a selector-bearing variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if frozen, [`Error::MipTooLow`] if
    /// `name` is `None` and `mip` is [`Mip::Zero`],
    /// [`Error::SignednessMismatch`] if `ranges`'s signedness doesn't
    /// match the variant's selector kind, [`Error::DuplicateLabel`] if
    /// `name` collides, or [`Error::OverlappingRanges`] if `ranges`
    /// overlaps an already-appended option's ranges.
    pub fn append_selector_option(
        &mut self,
        mip: Mip,
        name: Option<String>,
        mut field_class: FieldClass,
        ranges: RangeSet,
    ) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if name.is_none() {
            mip.require_at_least_one("an unnamed variant option")?;
        }
        let expected = match &self.shape {
            FieldClassShape::VariantWithUnsignedIntegerSelector(_) => Signedness::Unsigned,
            FieldClassShape::VariantWithSignedIntegerSelector(_) => Signedness::Signed,
            _ => panic!("append_selector_option called on a non-selector-variant field class"),
        };
        require_signedness(&ranges, expected)?;

        let options: &mut Vec<VariantSelectorOption> = match &mut self.shape {
            FieldClassShape::VariantWithUnsignedIntegerSelector(v) => &mut v.options,
            FieldClassShape::VariantWithSignedIntegerSelector(v) => &mut v.options,
            _ => unreachable!("matched above"),
        };

        if let Some(name) = &name {
            if options.iter().any(|o| o.name.as_deref() == Some(name.as_str())) {
                return Err(Error::DuplicateLabel { container: "variant", label: name.clone() });
            }
        }
        for existing in options.iter() {
            if existing.ranges.overlaps_with(&ranges)? {
                return Err(Error::OverlappingRanges { container: "variant" });
            }
        }
        field_class.freeze();
        options.push(VariantSelectorOption { name, field_class: Box::new(field_class), ranges });
        Ok(())
    }

    // -- bit-array flags / enumeration mappings --------------------------

    /// Appends a flag to a `bit-array` field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if frozen, [`Error::DuplicateLabel`]
    /// if `label` is already used, or [`Error::SignednessMismatch`] if
    /// `bit_ranges` is not [`Signedness::Unsigned`].
    pub fn add_flag(&mut self, label: impl Into<String>, mut bit_ranges: RangeSet) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        require_signedness(&bit_ranges, Signedness::Unsigned)?;
        let FieldClassShape::BitArray(b) = &mut self.shape else {
            panic!("add_flag called on a non-bit-array field class");
        };
        let label = label.into();
        if b.flags.iter().any(|f| f.label == label) {
            return Err(Error::DuplicateLabel { container: "bit-array", label });
        }
        bit_ranges.freeze();
        b.flags.push(BitArrayFlag { label, bit_ranges });
        Ok(())
    }

    /// Appends a mapping to an enumeration field class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if frozen, [`Error::DuplicateLabel`]
    /// if `label` is already used, or [`Error::SignednessMismatch`] if
    /// `ranges`'s signedness doesn't match the enumeration's kind.
    /// Overlapping ranges across distinct mappings are permitted.
    pub fn add_mapping(&mut self, label: impl Into<String>, mut ranges: RangeSet) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        let expected = match &self.shape {
            FieldClassShape::UnsignedEnumeration(_) => Signedness::Unsigned,
            FieldClassShape::SignedEnumeration(_) => Signedness::Signed,
            _ => panic!("add_mapping called on a non-enumeration field class"),
        };
        require_signedness(&ranges, expected)?;
        let mappings = match &mut self.shape {
            FieldClassShape::UnsignedEnumeration(e) => &mut e.mappings,
            FieldClassShape::SignedEnumeration(e) => &mut e.mappings,
            _ => unreachable!("matched above"),
        };
        let label = label.into();
        if mappings.iter().any(|m| m.label == label) {
            return Err(Error::DuplicateLabel { container: "enumeration", label });
        }
        ranges.freeze();
        mappings.push(EnumerationMapping { label, ranges });
        Ok(())
    }
}

fn check_length(length: u64) -> Result<(), Error> {
    if length == 0 || length > 64 {
        return Err(Error::InvalidLength { length });
    }
    Ok(())
}

fn require_signedness(ranges: &RangeSet, expected: Signedness) -> Result<(), Error> {
    if ranges.signedness() != expected {
        return Err(Error::SignednessMismatch { expected, actual: ranges.signedness() });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use flowtrace_ranges::IntegerRange;

    #[test]
    fn bool_is_not_frozen_on_construction() {
        let fc = FieldClass::new_bool();
        assert!(!fc.is_frozen());
        assert!(fc.is_a(FieldClassType::BOOL));
    }

    #[test]
    fn integer_rejects_out_of_range_length() {
        assert!(matches!(
            FieldClass::new_unsigned_integer(0, IntegerDisplayBase::Decimal),
            Err(Error::InvalidLength { length: 0 })
        ));
        assert!(matches!(
            FieldClass::new_unsigned_integer(65, IntegerDisplayBase::Decimal),
            Err(Error::InvalidLength { length: 65 })
        ));
    }

    #[test]
    fn enumeration_is_a_its_integer_and_enumeration_supers() {
        let fc = FieldClass::new_unsigned_enumeration(8, IntegerDisplayBase::Hexadecimal).unwrap();
        assert!(fc.is_a(FieldClassType::ENUMERATION));
        assert!(fc.is_a(FieldClassType::UNSIGNED_INTEGER));
        assert!(fc.is_a(FieldClassType::INTEGER));
    }

    #[test]
    fn structure_rejects_duplicate_member_names() {
        let mut s = FieldClass::new_structure();
        s.append_member("a", FieldClass::new_bool()).unwrap();
        let err = s.append_member("a", FieldClass::new_bool()).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel { container: "structure", .. }));
    }

    #[test]
    fn freeze_is_transitive_and_rejects_further_mutation() {
        let mut inner = FieldClass::new_structure();
        inner.append_member("x", FieldClass::new_bool()).unwrap();
        let mut outer = FieldClass::new_structure();
        outer.append_member("inner", inner).unwrap();
        outer.freeze();

        assert!(outer.is_frozen());
        let FieldClassShape::Structure(s) = outer.shape() else { unreachable!() };
        assert!(s.member("inner").unwrap().field_class().is_frozen());

        let err = outer.append_member("late", FieldClass::new_bool()).unwrap_err();
        assert!(matches!(err, Error::Frozen));
    }

    #[test]
    fn blob_requires_mip_at_least_one() {
        assert!(matches!(
            FieldClass::new_static_blob(Mip::Zero, 4),
            Err(Error::MipTooLow { required: 1, actual: 0, .. })
        ));
        assert!(FieldClass::new_static_blob(Mip::AtLeastOne, 4).is_ok());
    }

    #[test]
    fn unnamed_variant_option_requires_mip_at_least_one() {
        let mut v = FieldClass::new_variant_without_selector();
        let err = v.append_option(Mip::Zero, None, FieldClass::new_bool()).unwrap_err();
        assert!(matches!(err, Error::MipTooLow { .. }));
        v.append_option(Mip::AtLeastOne, None, FieldClass::new_bool()).unwrap();
    }

    #[test]
    fn selector_variant_rejects_overlapping_ranges() {
        let link = Link::unresolved_path(FieldClassTag::fresh());
        let mut v = FieldClass::new_variant_with_unsigned_integer_selector(link);
        let ranges_a = RangeSet::from_ranges([IntegerRange::unsigned(0, 5).unwrap()]).unwrap();
        let ranges_b = RangeSet::from_ranges([IntegerRange::unsigned(5, 10).unwrap()]).unwrap();
        v.append_selector_option(Mip::AtLeastOne, Some("a".into()), FieldClass::new_bool(), ranges_a)
            .unwrap();
        let err = v
            .append_selector_option(Mip::AtLeastOne, Some("b".into()), FieldClass::new_bool(), ranges_b)
            .unwrap_err();
        assert!(matches!(err, Error::OverlappingRanges { .. }));
    }

    #[test]
    fn bit_array_active_flags() {
        let mut b = FieldClass::new_bit_array(8).unwrap();
        b.add_flag("low", RangeSet::from_ranges([IntegerRange::unsigned(0, 0).unwrap()]).unwrap())
            .unwrap();
        b.add_flag("high", RangeSet::from_ranges([IntegerRange::unsigned(7, 7).unwrap()]).unwrap())
            .unwrap();
        let FieldClassShape::BitArray(ba) = b.shape() else { unreachable!() };
        assert_eq!(ba.active_flags(0b1000_0001), vec!["low", "high"]);
        assert_eq!(ba.active_flags(0b0000_0010), Vec::<&str>::new());
    }
}
