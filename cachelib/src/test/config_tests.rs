use std::error::Error;
use rstest::rstest;
use crate::address::AddressDecoder;
use crate::config::{Geometry, PolicyKind, SimulationConfig, TimingConfig};
use crate::error::ConfigurationError;

#[rstest]
#[case(8192, 64, 4, 32, 32, 6, 5, 21)]
#[case(256, 64, 4, 32, 1, 6, 0, 26)]
#[case(256, 64, 1, 32, 4, 6, 2, 24)]
#[case(32768, 32, 8, 48, 128, 5, 7, 36)]
#[case(64, 64, 1, 6, 1, 6, 0, 0)]
fn derived_geometry(
    #[case] size: u64,
    #[case] block_size: u64,
    #[case] associativity: u64,
    #[case] address_bits: u32,
    #[case] sets: u64,
    #[case] offset_bits: u32,
    #[case] index_bits: u32,
    #[case] tag_bits: u32,
) -> Result<(), ConfigurationError> {
    let geometry = Geometry::new(size, block_size, associativity, address_bits)?;
    assert_eq!(geometry.num_sets, sets);
    assert_eq!(geometry.num_lines, size / block_size);
    assert_eq!((geometry.offset_bits, geometry.index_bits, geometry.tag_bits), (offset_bits, index_bits, tag_bits));
    assert_eq!(geometry.offset_bits + geometry.index_bits + geometry.tag_bits, address_bits);
    assert_eq!(geometry.num_sets * geometry.associativity * geometry.block_size, size);
    Ok(())
}

#[rstest]
#[case(0, 64, 4, 32, ConfigurationError::ZeroParameter { name: "size" })]
#[case(8192, 0, 4, 32, ConfigurationError::ZeroParameter { name: "block size" })]
#[case(8192, 64, 0, 32, ConfigurationError::ZeroParameter { name: "associativity" })]
#[case(8192, 48, 4, 32, ConfigurationError::NotPowerOfTwo { name: "block size", value: 48 })]
#[case(8192, 64, 3, 32, ConfigurationError::NotPowerOfTwo { name: "associativity", value: 3 })]
#[case(1000, 64, 1, 32, ConfigurationError::UnevenSize { size: 1000, block_size: 64, associativity: 1 })]
#[case(192, 64, 1, 32, ConfigurationError::NotPowerOfTwo { name: "number of sets", value: 3 })]
#[case(8192, 64, 4, 0, ConfigurationError::AddressWidth(0))]
#[case(8192, 64, 4, 65, ConfigurationError::AddressWidth(65))]
#[case(8192, 64, 4, 8, ConfigurationError::AddressTooNarrow { address_bits: 8, offset_bits: 6, index_bits: 5 })]
fn rejected_geometry(
    #[case] size: u64,
    #[case] block_size: u64,
    #[case] associativity: u64,
    #[case] address_bits: u32,
    #[case] expected: ConfigurationError,
) {
    assert_eq!(Geometry::new(size, block_size, associativity, address_bits), Err(expected));
}

#[test]
fn decodes_fields() -> Result<(), ConfigurationError> {
    let decoder = AddressDecoder::new(&Geometry::new(8192, 64, 4, 32)?);
    let decoded = decoder.decode(0x1234_5678);
    assert_eq!(decoded.offset, 0x38);
    assert_eq!(decoded.set_index, 25);
    assert_eq!(decoded.tag, 0x2468A);
    assert_eq!(decoder.reconstruct(decoded.tag, decoded.set_index), 0x1234_5640);
    Ok(())
}

#[test]
fn bits_above_the_address_width_stay_in_the_tag() -> Result<(), ConfigurationError> {
    let decoder = AddressDecoder::new(&Geometry::new(8192, 64, 4, 32)?);
    let low = decoder.decode(0x40);
    let high = decoder.decode((1 << 40) | 0x40);
    assert_eq!(low.set_index, high.set_index);
    assert_ne!(low.tag, high.tag);
    Ok(())
}

#[test]
fn parses_configuration() -> Result<(), Box<dyn Error>> {
    let config: SimulationConfig = serde_json::from_str(
        r#"{
            "caches": [
                {
                    "name": "L1",
                    "size": 1024,
                    "block_size": 64,
                    "associativity": 2,
                    "policy": "fifo",
                    "timing": { "miss_latency": 50 }
                },
                {
                    "name": "L2",
                    "size": 4096,
                    "block_size": 64,
                    "associativity": 4,
                    "address_bits": 48,
                    "policy": "PseudoLeastRecentlyUsed",
                    "seed": 7
                },
                { "name": "L3", "size": 4096, "block_size": 64, "associativity": 4 }
            ]
        }"#,
    )?;
    let [l1, l2, l3] = &config.caches[..] else {
        panic!("expected three caches, got {}", config.caches.len());
    };
    assert_eq!(l1.policy, PolicyKind::FirstInFirstOut);
    assert_eq!(l1.address_bits, 32);
    let timing = l1.timing.ok_or("L1 should be timed")?;
    assert_eq!(timing, TimingConfig { hit_latency: 1, miss_latency: 50, writeback_latency: None });
    assert_eq!(timing.writeback(), 50);
    assert_eq!(l2.policy, PolicyKind::PseudoLeastRecentlyUsed);
    assert_eq!(l2.seed, Some(7));
    assert_eq!(l2.geometry()?.tag_bits, 48 - 6 - 4);
    assert!(l2.timing.is_none());
    assert_eq!(l3.policy, PolicyKind::LeastRecentlyUsed);
    assert_eq!(l3.seed, None);
    Ok(())
}

#[test]
fn rejects_unknown_policy() {
    let parsed = serde_json::from_str::<SimulationConfig>(
        r#"{"caches": [{"name": "L1", "size": 1024, "block_size": 64, "associativity": 2, "policy": "mru"}]}"#,
    );
    assert!(parsed.is_err());
}

#[test]
fn geometry_dump() -> Result<(), ConfigurationError> {
    let dump = Geometry::new(8192, 64, 4, 32)?.to_string();
    assert!(dump.contains("Number of sets: 32"));
    assert!(dump.contains("Associativity: 4-way"));
    assert!(dump.ends_with("Tag bits: 21"));
    Ok(())
}
