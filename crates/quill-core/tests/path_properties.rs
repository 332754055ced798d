//! Property-based tests for quill-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use proptest::prelude::*;
use quill_core::{DerivationPath, PathComponent, DERIVATION_ROOT_DEPTH};

fn arb_component() -> impl Strategy<Value = PathComponent> {
    (0u32..0x8000_0000, prop::bool::ANY).prop_map(|(index, hardened)| PathComponent {
        index,
        hardened,
    })
}

fn arb_path() -> impl Strategy<Value = DerivationPath> {
    prop::collection::vec(arb_component(), 1..8).prop_map(DerivationPath::new)
}

proptest! {
    #[test]
    fn encode_is_four_bytes_per_element(path in arb_path()) {
        prop_assert_eq!(path.to_bytes().len(), 4 * path.depth());
    }

    #[test]
    fn hardened_elements_set_the_top_bit(path in arb_path()) {
        let bytes = path.to_bytes();
        for (i, component) in path.components.iter().enumerate() {
            let top_bit = bytes[i * 4] & 0x80 != 0;
            prop_assert_eq!(top_bit, component.hardened);
        }
    }

    #[test]
    fn encode_is_deterministic(path in arb_path()) {
        prop_assert_eq!(path.to_bytes(), path.to_bytes());
    }

    #[test]
    fn display_parse_roundtrip(path in arb_path()) {
        let reparsed: DerivationPath = path.to_string().parse().unwrap();
        prop_assert_eq!(reparsed, path);
    }

    #[test]
    fn derived_paths_share_the_root(index in any::<u32>().prop_filter("hardened bit", |i| i & 0x8000_0000 == 0)) {
        let path = DerivationPath::derive(index);
        prop_assert_eq!(path.depth(), DERIVATION_ROOT_DEPTH + 1);
        prop_assert_eq!(
            &path.to_bytes()[..4 * DERIVATION_ROOT_DEPTH],
            &DerivationPath::root().to_bytes()[..]
        );
    }

    #[test]
    fn distinct_indices_yield_distinct_paths(a in 0u32..1_000_000, b in 0u32..1_000_000) {
        prop_assume!(a != b);
        prop_assert_ne!(
            DerivationPath::derive(a).to_bytes(),
            DerivationPath::derive(b).to_bytes()
        );
    }
}
