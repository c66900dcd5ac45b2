//! The field class type bitmask and the `type_is` predicate.

use bitflags::bitflags;

bitflags! {
    /// A 64-bit bitfield identifying the shape of a field class.
    ///
    /// `type_is(t, super)` holds iff `(t & super) == super`: a
    /// concrete type's bits always include the bits of every abstract
    /// supertype it belongs to. No field class is ever *of* a pure
    /// abstract type (e.g. [`FieldClassType::INTEGER`]) — those bits
    /// exist only to be tested with [`type_is`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FieldClassType: u64 {
        /// `bool`.
        const BOOL = 1 << 0;
        /// `bit-array`.
        const BIT_ARRAY = 1 << 1;

        /// Abstract: any integer.
        const INTEGER = 1 << 2;
        /// `unsigned-integer`. Is-a [`FieldClassType::INTEGER`].
        const UNSIGNED_INTEGER = (1 << 3) | Self::INTEGER.bits();
        /// `signed-integer`. Is-a [`FieldClassType::INTEGER`].
        const SIGNED_INTEGER = (1 << 4) | Self::INTEGER.bits();

        /// Abstract: any enumeration.
        const ENUMERATION = 1 << 5;
        /// `unsigned-enumeration`. Is-a [`FieldClassType::ENUMERATION`] and
        /// [`FieldClassType::UNSIGNED_INTEGER`].
        const UNSIGNED_ENUMERATION = Self::ENUMERATION.bits() | Self::UNSIGNED_INTEGER.bits();
        /// `signed-enumeration`. Is-a [`FieldClassType::ENUMERATION`] and
        /// [`FieldClassType::SIGNED_INTEGER`].
        const SIGNED_ENUMERATION = Self::ENUMERATION.bits() | Self::SIGNED_INTEGER.bits();

        /// Abstract: any real.
        const REAL = 1 << 6;
        /// `single-precision-real`. Is-a [`FieldClassType::REAL`].
        const SINGLE_PRECISION_REAL = (1 << 7) | Self::REAL.bits();
        /// `double-precision-real`. Is-a [`FieldClassType::REAL`].
        const DOUBLE_PRECISION_REAL = (1 << 8) | Self::REAL.bits();

        /// `string`.
        const STRING = 1 << 9;

        /// `structure`.
        const STRUCTURE = 1 << 10;

        /// Abstract: any array.
        const ARRAY = 1 << 11;
        /// `static-array`. Is-a [`FieldClassType::ARRAY`].
        const STATIC_ARRAY = (1 << 12) | Self::ARRAY.bits();
        /// Abstract: any dynamic array. Is-a [`FieldClassType::ARRAY`].
        const DYNAMIC_ARRAY = (1 << 13) | Self::ARRAY.bits();
        /// `dynamic-array` without a linked length.
        const DYNAMIC_ARRAY_WITHOUT_LENGTH_FIELD = (1 << 14) | Self::DYNAMIC_ARRAY.bits();
        /// `dynamic-array` with a linked length.
        const DYNAMIC_ARRAY_WITH_LENGTH_FIELD = (1 << 15) | Self::DYNAMIC_ARRAY.bits();

        /// Abstract: any option.
        const OPTION = 1 << 16;
        /// `option-without-selector`. Is-a [`FieldClassType::OPTION`].
        const OPTION_WITHOUT_SELECTOR_FIELD = (1 << 17) | Self::OPTION.bits();
        /// Abstract: any option with a selector. Is-a [`FieldClassType::OPTION`].
        const OPTION_WITH_SELECTOR_FIELD = (1 << 18) | Self::OPTION.bits();
        /// `option-with-bool-selector`.
        const OPTION_WITH_BOOL_SELECTOR_FIELD = (1 << 19) | Self::OPTION_WITH_SELECTOR_FIELD.bits();
        /// Abstract: option with an integer selector.
        const OPTION_WITH_INTEGER_SELECTOR_FIELD = (1 << 20) | Self::OPTION_WITH_SELECTOR_FIELD.bits();
        /// `option-with-unsigned-integer-selector`.
        const OPTION_WITH_UNSIGNED_INTEGER_SELECTOR_FIELD = (1 << 21) | Self::OPTION_WITH_INTEGER_SELECTOR_FIELD.bits();
        /// `option-with-signed-integer-selector`.
        const OPTION_WITH_SIGNED_INTEGER_SELECTOR_FIELD = (1 << 22) | Self::OPTION_WITH_INTEGER_SELECTOR_FIELD.bits();

        /// Abstract: any variant.
        const VARIANT = 1 << 23;
        /// `variant-without-selector`. Is-a [`FieldClassType::VARIANT`].
        const VARIANT_WITHOUT_SELECTOR_FIELD = (1 << 24) | Self::VARIANT.bits();
        /// Abstract: variant with a selector. Is-a [`FieldClassType::VARIANT`].
        const VARIANT_WITH_SELECTOR_FIELD = (1 << 25) | Self::VARIANT.bits();
        /// `variant-with-unsigned-integer-selector`.
        const VARIANT_WITH_UNSIGNED_INTEGER_SELECTOR_FIELD = (1 << 26) | Self::VARIANT_WITH_SELECTOR_FIELD.bits();
        /// `variant-with-signed-integer-selector`.
        const VARIANT_WITH_SIGNED_INTEGER_SELECTOR_FIELD = (1 << 27) | Self::VARIANT_WITH_SELECTOR_FIELD.bits();

        /// Abstract: any blob.
        const BLOB = 1 << 28;
        /// `static-blob`. Is-a [`FieldClassType::BLOB`].
        const STATIC_BLOB = (1 << 29) | Self::BLOB.bits();
        /// Abstract: any dynamic blob. Is-a [`FieldClassType::BLOB`].
        const DYNAMIC_BLOB = (1 << 30) | Self::BLOB.bits();
        /// `dynamic-blob` without a linked length.
        const DYNAMIC_BLOB_WITHOUT_LENGTH_FIELD = (1 << 31) | Self::DYNAMIC_BLOB.bits();
        /// `dynamic-blob` with a linked length.
        const DYNAMIC_BLOB_WITH_LENGTH_FIELD = (1 << 32) | Self::DYNAMIC_BLOB.bits();
    }
}

/// Returns `true` iff `t` is of type `super_` — i.e. `t` carries every
/// bit `super_` carries, concrete or abstract.
pub fn type_is(t: FieldClassType, super_: FieldClassType) -> bool {
    t.contains(super_)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn concrete_type_is_a_its_supers() {
        assert!(type_is(FieldClassType::UNSIGNED_ENUMERATION, FieldClassType::ENUMERATION));
        assert!(type_is(FieldClassType::UNSIGNED_ENUMERATION, FieldClassType::UNSIGNED_INTEGER));
        assert!(type_is(FieldClassType::UNSIGNED_ENUMERATION, FieldClassType::INTEGER));
    }

    #[test]
    fn unrelated_concrete_types_are_not_related() {
        assert!(!type_is(FieldClassType::UNSIGNED_INTEGER, FieldClassType::SIGNED_INTEGER));
        assert!(!type_is(FieldClassType::STRING, FieldClassType::INTEGER));
        assert!(!type_is(FieldClassType::STATIC_ARRAY, FieldClassType::DYNAMIC_ARRAY));
    }

    #[test]
    fn no_type_is_a_pure_abstract_tag_by_accident() {
        // BOOL never carries any of the INTEGER bits.
        assert!(!type_is(FieldClassType::BOOL, FieldClassType::INTEGER));
    }
}
