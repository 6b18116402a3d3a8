use proptest::prelude::*;

use chaind_types::{ChainSpec, StateFilter, Status, StatusBits, TxHash};

fn any_status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

proptest! {
    /// TxHash hex roundtrip: to_hex -> parse produces identical hash.
    #[test]
    fn tx_hash_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let parsed: TxHash = hash.to_hex().parse().unwrap();
        prop_assert_eq!(parsed, hash);
    }

    /// TxHash bincode serialization roundtrip.
    #[test]
    fn tx_hash_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let encoded = bincode::serialize(&hash).unwrap();
        let decoded: TxHash = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded.as_bytes(), hash.as_bytes());
    }

    /// Content hashing is a function of the payload only.
    #[test]
    fn content_hash_deterministic(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_eq!(TxHash::of(&payload), TxHash::of(&payload));
    }

    /// The exact filter of a state matches that state and no other.
    #[test]
    fn exact_filter_matches_only_its_state(a in any_status(), b in any_status()) {
        prop_assert_eq!(StateFilter::exact(a).matches(b.bits()), a == b);
    }

    /// Every valid state is either pending, upcoming, in flight or final.
    #[test]
    fn valid_states_are_classified(s in any_status()) {
        let bits = s.bits();
        let classes = [
            StateFilter::exact(Status::Pending).matches(bits),
            StateFilter::upcoming().matches(bits),
            StateFilter::in_flight().matches(bits),
            bits.is_final(),
        ];
        prop_assert_eq!(classes.iter().filter(|c| **c).count(), 1);
    }

    /// Random bit patterns either name a state or are rejected.
    #[test]
    fn raw_bits_roundtrip_or_invalid(raw in any::<u32>()) {
        let bits = StatusBits::from_bits(raw);
        if let Some(status) = bits.status() {
            prop_assert_eq!(status.bits(), bits);
        }
    }

    /// ChainSpec display/parse roundtrip.
    #[test]
    fn chain_spec_roundtrip(
        arch in "[a-z]{1,8}",
        fork in "[a-z]{1,10}",
        id in any::<u64>(),
        name in prop::option::of("[a-z]{1,10}"),
    ) {
        let spec = ChainSpec { arch, fork, network_id: id, common_name: name };
        let parsed: ChainSpec = spec.to_string().parse().unwrap();
        prop_assert_eq!(parsed, spec);
    }
}
