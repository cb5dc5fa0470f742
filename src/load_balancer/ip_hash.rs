//! Client affinity by hashing the routing key.

use std::sync::Arc;

use crate::load_balancer::{host::HostEntity, Selector, IP_HASH};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maps the same key to the same host for as long as the host set is
/// unchanged.
#[derive(Debug, Default)]
pub struct IpHash;

impl IpHash {
    pub fn new() -> Self {
        Self
    }
}

/// 64-bit FNV-1a. Stable across processes and releases, unlike
/// `DefaultHasher`.
fn fnv1a(key: &str) -> u64 {
    key.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

impl Selector for IpHash {
    const NAME: &'static str = IP_HASH;

    fn select(&self, hosts: &[Arc<HostEntity>], key: &str) -> usize {
        (fnv1a(key) % hosts.len() as u64) as usize
    }
}
