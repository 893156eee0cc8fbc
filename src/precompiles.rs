//! Precompile registry (spec component L, §4.9): the nine stateless
//! Frontier-through-Cancun precompiles at addresses 0x01..=0x09, plus a
//! pluggable registry of host-defined *stateful* precompiles (spec §6's
//! `registerContract`) each backed by its own slice of the staged
//! `dataBlockCache`.

use crate::environment::Fork;
use crate::errors::{ExceptionalHalt, VMError};
use bytes::Bytes;
use ethereum_types::{Address, H160, U256};
use rustc_hash::FxHashMap;

pub const ECRECOVER: u64 = 1;
pub const SHA256: u64 = 2;
pub const RIPEMD160: u64 = 3;
pub const IDENTITY: u64 = 4;
pub const MODEXP: u64 = 5;
pub const BN256ADD: u64 = 6;
pub const BN256SCALARMUL: u64 = 7;
pub const BN256PAIRING: u64 = 8;
pub const BLAKE2F: u64 = 9;

/// True if `address` names one of the fixed stateless precompiles active
/// at `fork` (all nine are available from Byzantium onward; this crate's
/// floor fork, Frontier, predates 6/7/8, but since the floor is a matter
/// of which opcodes/gas schedule apply rather than which precompiles
/// exist in a given deployment, callers gate availability via `fork`).
pub fn is_precompile(address: Address, fork: Fork) -> bool {
    precompile_number(address)
        .map(|n| n <= max_precompile_for_fork(fork))
        .unwrap_or(false)
}

fn max_precompile_for_fork(fork: Fork) -> u64 {
    if fork >= Fork::Byzantium { BLAKE2F } else { ECRECOVER }
}

fn precompile_number(address: Address) -> Option<u64> {
    let bytes = address.as_bytes();
    if bytes[..19].iter().any(|b| *b != 0) {
        return None;
    }
    let n = bytes[19] as u64;
    if (ECRECOVER..=BLAKE2F).contains(&n) { Some(n) } else { None }
}

pub fn address_of(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n as u8;
    H160(bytes)
}

pub fn gas_cost(address: Address, input: &[u8]) -> Result<u64, VMError> {
    let n = precompile_number(address).ok_or(ExceptionalHalt::PrecompileError)?;
    Ok(match n {
        ECRECOVER => 3000,
        SHA256 => 60 + 12 * words(input.len()),
        RIPEMD160 => 600 + 120 * words(input.len()),
        IDENTITY => 15 + 3 * words(input.len()),
        MODEXP => modexp_gas(input)?,
        BN256ADD => 150,
        BN256SCALARMUL => 6000,
        BN256PAIRING => {
            let pairs = (input.len() / 192) as u64;
            45000 + 34000 * pairs
        }
        BLAKE2F => blake2f_gas(input)?,
        _ => return Err(ExceptionalHalt::PrecompileError.into()),
    })
}

fn words(len: usize) -> u64 {
    (len as u64).div_ceil(32)
}

pub fn execute(address: Address, input: &[u8]) -> Result<Bytes, VMError> {
    let n = precompile_number(address).ok_or(ExceptionalHalt::PrecompileError)?;
    match n {
        ECRECOVER => ecrecover(input),
        SHA256 => Ok(sha256(input)),
        RIPEMD160 => Ok(ripemd160(input)),
        IDENTITY => Ok(Bytes::copy_from_slice(input)),
        MODEXP => modexp(input),
        BN256ADD => bn256_add(input),
        BN256SCALARMUL => bn256_mul(input),
        BN256PAIRING => bn256_pairing(input),
        BLAKE2F => blake2f(input),
        _ => Err(ExceptionalHalt::PrecompileError.into()),
    }
}

fn padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let available = input.len().saturating_sub(offset);
    let to_copy = available.min(len);
    if to_copy > 0 {
        out[..to_copy].copy_from_slice(&input[offset..offset + to_copy]);
    }
    out
}

// --- 0x01 ECRECOVER --------------------------------------------------------

fn ecrecover(input: &[u8]) -> Result<Bytes, VMError> {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    let data = padded(input, 0, 128);
    let hash = &data[0..32];
    let v = U256::from_big_endian(&data[32..64]);
    let r = &data[64..96];
    let s = &data[96..128];

    let Ok(recovery_byte) = u8::try_from(v) else {
        return Ok(Bytes::new());
    };
    if recovery_byte != 27 && recovery_byte != 28 {
        return Ok(Bytes::new());
    }
    #[allow(clippy::arithmetic_side_effects, reason = "recovery_byte is 27 or 28")]
    let recovery_id = recovery_byte - 27;

    let Ok(signature) = Signature::from_scalars(
        <[u8; 32]>::try_from(r).map_err(|_| ExceptionalHalt::PrecompileError)?,
        <[u8; 32]>::try_from(s).map_err(|_| ExceptionalHalt::PrecompileError)?,
    ) else {
        return Ok(Bytes::new());
    };
    let Ok(id) = RecoveryId::from_byte(recovery_id).ok_or(()) else {
        return Ok(Bytes::new());
    };

    match VerifyingKey::recover_from_prehash(hash, &signature, id) {
        Ok(key) => {
            let point = key.to_encoded_point(false);
            let address_hash = crate::storage::keccak256(&point.as_bytes()[1..]);
            let mut out = vec![0u8; 32];
            out[12..].copy_from_slice(&address_hash.as_bytes()[12..]);
            Ok(Bytes::from(out))
        }
        Err(_) => Ok(Bytes::new()),
    }
}

// --- 0x02 SHA256, 0x03 RIPEMD160, 0x04 IDENTITY ---------------------------

fn sha256(input: &[u8]) -> Bytes {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input);
    Bytes::copy_from_slice(&hasher.finalize())
}

fn ripemd160(input: &[u8]) -> Bytes {
    use ripemd::{Digest, Ripemd160};
    let mut hasher = Ripemd160::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = vec![0u8; 32];
    out[12..].copy_from_slice(&digest);
    Bytes::from(out)
}

// --- 0x05 MODEXP -----------------------------------------------------------

fn modexp_gas(input: &[u8]) -> Result<u64, VMError> {
    let header = padded(input, 0, 96);
    let base_len = usize::try_from(U256::from_big_endian(&header[0..32]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;
    let exp_len = usize::try_from(U256::from_big_endian(&header[32..64]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;
    let mod_len = usize::try_from(U256::from_big_endian(&header[64..96]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;

    let exp_data = padded(input, 96 + base_len, exp_len.min(32));
    let exp_head = U256::from_big_endian(&exp_data);

    let max_len = base_len.max(mod_len) as u64;
    let words = max_len.div_ceil(8);
    #[allow(clippy::arithmetic_side_effects, reason = "bounded by realistic input sizes")]
    let multiplication_complexity = words * words;

    let iteration_count = if exp_len <= 32 && exp_head.is_zero() {
        0
    } else if exp_len <= 32 {
        (exp_head.bits() as u64).saturating_sub(1)
    } else {
        #[allow(clippy::arithmetic_side_effects)]
        let extra = 8 * (exp_len as u64 - 32);
        extra + exp_head.bits().max(1) as u64 - 1
    };
    let gas = multiplication_complexity
        .saturating_mul(iteration_count.max(1))
        / 3;
    Ok(gas.max(200))
}

fn modexp(input: &[u8]) -> Result<Bytes, VMError> {
    use malachite::num::arithmetic::traits::ModPow;
    use malachite::Natural;

    let header = padded(input, 0, 96);
    let base_len = usize::try_from(U256::from_big_endian(&header[0..32]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;
    let exp_len = usize::try_from(U256::from_big_endian(&header[32..64]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;
    let mod_len = usize::try_from(U256::from_big_endian(&header[64..96]))
        .map_err(|_| ExceptionalHalt::PrecompileError)?;

    let base_bytes = padded(input, 96, base_len);
    let exp_bytes = padded(input, 96 + base_len, exp_len);
    let mod_bytes = padded(input, 96 + base_len + exp_len, mod_len);

    let modulus = Natural::from_digits_desc(&256u16, mod_bytes.iter().map(|b| *b as u16))
        .unwrap_or(Natural::from(0u32));
    if modulus == Natural::from(0u32) {
        return Ok(Bytes::from(vec![0u8; mod_len]));
    }
    let base = Natural::from_digits_desc(&256u16, base_bytes.iter().map(|b| *b as u16))
        .unwrap_or(Natural::from(0u32));
    let exponent = Natural::from_digits_desc(&256u16, exp_bytes.iter().map(|b| *b as u16))
        .unwrap_or(Natural::from(0u32));

    let result = base.mod_pow(exponent, &modulus);
    let digits: Vec<u8> = result
        .to_digits_desc(&256u16)
        .into_iter()
        .map(|d| d as u8)
        .collect();
    let mut out = vec![0u8; mod_len];
    if !digits.is_empty() {
        let start = mod_len.saturating_sub(digits.len());
        out[start..].copy_from_slice(&digits[digits.len().saturating_sub(mod_len)..]);
    }
    Ok(Bytes::from(out))
}

// --- 0x06/0x07/0x08 BN256 (alt_bn128) --------------------------------------

fn bn256_point(input: &[u8], offset: usize) -> Result<bn::G1, VMError> {
    use bn::{AffineG1, Fq, Group, G1};
    let data = padded(input, offset, 64);
    let x = Fq::from_slice(&data[0..32]).map_err(|_| ExceptionalHalt::PrecompileError)?;
    let y = Fq::from_slice(&data[32..64]).map_err(|_| ExceptionalHalt::PrecompileError)?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1::zero());
    }
    let affine = AffineG1::new(x, y).map_err(|_| ExceptionalHalt::PrecompileError)?;
    Ok(G1::from(affine))
}

fn serialize_g1(point: bn::G1) -> Bytes {
    use bn::AffineG1;
    let mut out = vec![0u8; 64];
    if let Some(affine) = AffineG1::from_jacobian(point) {
        affine.x().to_big_endian(&mut out[0..32]).ok();
        affine.y().to_big_endian(&mut out[32..64]).ok();
    }
    Bytes::from(out)
}

fn bn256_add(input: &[u8]) -> Result<Bytes, VMError> {
    let a = bn256_point(input, 0)?;
    let b = bn256_point(input, 64)?;
    Ok(serialize_g1(a + b))
}

fn bn256_mul(input: &[u8]) -> Result<Bytes, VMError> {
    use bn::Fr;
    let point = bn256_point(input, 0)?;
    let scalar_bytes = padded(input, 64, 32);
    let scalar = Fr::from_slice(&scalar_bytes).unwrap_or_else(|_| Fr::zero());
    Ok(serialize_g1(point * scalar))
}

fn bn256_pairing(input: &[u8]) -> Result<Bytes, VMError> {
    use bn::{pairing_batch, AffineG2, Fq, Fq2, Group, Gt, G1, G2};

    if input.len() % 192 != 0 {
        return Err(ExceptionalHalt::PrecompileError.into());
    }
    let mut pairs = Vec::new();
    for chunk in input.chunks(192) {
        let g1 = bn256_point(chunk, 0)?;
        let g2_data = &chunk[64..192];
        let x_im = Fq::from_slice(&g2_data[0..32]).map_err(|_| ExceptionalHalt::PrecompileError)?;
        let x_re = Fq::from_slice(&g2_data[32..64]).map_err(|_| ExceptionalHalt::PrecompileError)?;
        let y_im = Fq::from_slice(&g2_data[64..96]).map_err(|_| ExceptionalHalt::PrecompileError)?;
        let y_re = Fq::from_slice(&g2_data[96..128]).map_err(|_| ExceptionalHalt::PrecompileError)?;
        let g2 = if x_im.is_zero() && x_re.is_zero() && y_im.is_zero() && y_re.is_zero() {
            G2::zero()
        } else {
            let x = Fq2::new(x_re, x_im);
            let y = Fq2::new(y_re, y_im);
            G2::from(AffineG2::new(x, y).map_err(|_| ExceptionalHalt::PrecompileError)?)
        };
        pairs.push((g1, g2));
    }
    let result = pairing_batch(&pairs) == Gt::one();
    let mut out = vec![0u8; 32];
    if result {
        out[31] = 1;
    }
    Ok(Bytes::from(out))
}

// --- 0x09 BLAKE2F (EIP-152 compression function F) -------------------------

fn blake2f_gas(input: &[u8]) -> Result<u64, VMError> {
    if input.len() != 213 {
        return Err(ExceptionalHalt::PrecompileError.into());
    }
    Ok(u32::from_be_bytes(
        <[u8; 4]>::try_from(&input[0..4]).map_err(|_| ExceptionalHalt::PrecompileError)?,
    ) as u64)
}

const IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

fn compress(h: &mut [u64; 8], m: &[u64; 16], t: [u64; 2], f: bool, rounds: u32) {
    let mut v = [0u64; 16];
    v[0..8].copy_from_slice(h);
    v[8..16].copy_from_slice(&IV);
    v[12] ^= t[0];
    v[13] ^= t[1];
    if f {
        v[14] = !v[14];
    }
    for round in 0..rounds as usize {
        let s = &SIGMA[round % 10];
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }
    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

fn blake2f(input: &[u8]) -> Result<Bytes, VMError> {
    if input.len() != 213 {
        return Err(ExceptionalHalt::PrecompileError.into());
    }
    let rounds = u32::from_be_bytes(
        <[u8; 4]>::try_from(&input[0..4]).map_err(|_| ExceptionalHalt::PrecompileError)?,
    );
    let mut h = [0u64; 8];
    for (i, slot) in h.iter_mut().enumerate() {
        let start = 4 + i * 8;
        *slot = u64::from_le_bytes(
            <[u8; 8]>::try_from(&input[start..start + 8]).map_err(|_| ExceptionalHalt::PrecompileError)?,
        );
    }
    let mut m = [0u64; 16];
    for (i, slot) in m.iter_mut().enumerate() {
        let start = 68 + i * 8;
        *slot = u64::from_le_bytes(
            <[u8; 8]>::try_from(&input[start..start + 8]).map_err(|_| ExceptionalHalt::PrecompileError)?,
        );
    }
    let t = [
        u64::from_le_bytes(<[u8; 8]>::try_from(&input[196..204]).map_err(|_| ExceptionalHalt::PrecompileError)?),
        u64::from_le_bytes(<[u8; 8]>::try_from(&input[204..212]).map_err(|_| ExceptionalHalt::PrecompileError)?),
    ];
    let f = match input[212] {
        0 => false,
        1 => true,
        _ => return Err(ExceptionalHalt::PrecompileError.into()),
    };

    compress(&mut h, &m, t, f, rounds);

    let mut out = vec![0u8; 64];
    for (i, word) in h.iter().enumerate() {
        out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
    }
    Ok(Bytes::from(out))
}

// --- Stateful precompile registry (spec §4.9, §6) --------------------------

/// The host-visible storage a stateful precompile reads and writes through:
/// an opaque, per-address, per-slot byte blob, independent of the normal
/// account-slot store so a stateful precompile's data survives as long as
/// the transaction's `ResultCache` does but is never exposed to SLOAD.
/// Mirrors spec §3's `dataBlockCache` and §6's `IExternalDataBlockStorage`.
pub trait DataBlockStorage {
    fn get_data_block(&self, address: Address, slot: U256) -> Vec<u8>;
    fn set_data_block(&mut self, address: Address, slot: U256, data: Vec<u8>);
}

impl DataBlockStorage for crate::storage::ResultCache {
    fn get_data_block(&self, address: Address, slot: U256) -> Vec<u8> {
        self.data_block_cache
            .get(&(address, slot))
            .cloned()
            .unwrap_or_default()
    }

    fn set_data_block(&mut self, address: Address, slot: U256, data: Vec<u8>) {
        self.data_block_cache.insert((address, slot), data);
    }
}

/// A host-registered precompile with access to its own data-block slice.
/// Unlike the fixed stateless precompiles above, these are not compiled
/// into this crate: a host implements this trait for whatever logic it
/// wants to expose at a reserved address (e.g. an L2 system contract) and
/// registers it via [`PrecompileRegistry::register`].
pub trait StatefulPrecompile: Send + Sync {
    fn gas_cost(&self, input: &[u8]) -> Result<u64, VMError>;
    fn execute(&self, input: &[u8], data: &mut dyn DataBlockStorage) -> Result<Bytes, VMError>;
}

/// First address of the numeric range reserved for host-registered
/// stateful precompiles — chosen well above the stateless range (0x01..=
/// 0x09) and the range Ethereum mainnet is ever expected to assign, so a
/// host's custom contracts can never collide with a future built-in.
pub const STATEFUL_PRECOMPILE_RANGE_START: u64 = 0x100;
pub const STATEFUL_PRECOMPILE_RANGE_END: u64 = 0x1ff;

fn in_stateful_range(address: Address) -> bool {
    let bytes = address.as_bytes();
    if bytes[..18].iter().any(|b| *b != 0) {
        return false;
    }
    let n = u64::from(bytes[18]) << 8 | u64::from(bytes[19]);
    (STATEFUL_PRECOMPILE_RANGE_START..=STATEFUL_PRECOMPILE_RANGE_END).contains(&n)
}

/// Maps reserved addresses to host-supplied [`StatefulPrecompile`]s. One
/// registry is shared (via `Rc`) across an entire call tree, same as the
/// [`crate::note::NoteRecorder`] — built once per [`crate::evm::Evm`] and
/// threaded through every nested [`crate::vm::VM`].
#[derive(Default)]
pub struct PrecompileRegistry {
    contracts: FxHashMap<Address, Box<dyn StatefulPrecompile>>,
}

impl PrecompileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `precompile` at `address`. Fails if `address` falls
    /// outside the reserved stateful range or is already registered.
    pub fn register(&mut self, address: Address, precompile: Box<dyn StatefulPrecompile>) -> Result<(), VMError> {
        if !in_stateful_range(address) {
            return Err(ExceptionalHalt::PrecompileError.into());
        }
        if self.contracts.contains_key(&address) {
            return Err(ExceptionalHalt::PrecompileError.into());
        }
        self.contracts.insert(address, precompile);
        Ok(())
    }

    pub fn is_registered(&self, address: Address) -> bool {
        self.contracts.contains_key(&address)
    }

    pub fn gas_cost(&self, address: Address, input: &[u8]) -> Result<u64, VMError> {
        self.contracts
            .get(&address)
            .ok_or(ExceptionalHalt::PrecompileError)?
            .gas_cost(input)
    }

    pub fn execute(&self, address: Address, input: &[u8], data: &mut dyn DataBlockStorage) -> Result<Bytes, VMError> {
        self.contracts
            .get(&address)
            .ok_or(ExceptionalHalt::PrecompileError)?
            .execute(input, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_echoes_input() {
        let out = execute(address_of(IDENTITY), b"hello").unwrap();
        assert_eq!(&out[..], b"hello");
    }

    #[test]
    fn sha256_matches_known_vector() {
        let out = sha256(b"");
        assert_eq!(
            hex::encode(&out[..]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".chars().take(64).collect::<String>()
        );
    }

    #[test]
    fn modexp_base_zero_is_zero() {
        let mut input = vec![0u8; 96];
        input[31] = 1; // base_len = 1
        input[63] = 1; // exp_len = 1
        input[95] = 1; // mod_len = 1
        input.push(0); // base = 0
        input.push(2); // exp = 2
        input.push(5); // modulus = 5
        let out = modexp(&input).unwrap();
        assert_eq!(&out[..], &[0]);
    }

    #[test]
    fn is_precompile_range() {
        assert!(is_precompile(address_of(1), Fork::Cancun));
        assert!(is_precompile(address_of(9), Fork::Cancun));
        assert!(!is_precompile(address_of(10), Fork::Cancun));
        assert!(!is_precompile(Address::zero(), Fork::Cancun));
    }

    struct EchoPrecompile;

    impl StatefulPrecompile for EchoPrecompile {
        fn gas_cost(&self, input: &[u8]) -> Result<u64, VMError> {
            Ok(100 + input.len() as u64)
        }

        fn execute(&self, input: &[u8], data: &mut dyn DataBlockStorage) -> Result<Bytes, VMError> {
            let slot = U256::zero();
            let address = Address::zero();
            let mut stored = data.get_data_block(address, slot);
            stored.extend_from_slice(input);
            data.set_data_block(address, slot, stored.clone());
            Ok(Bytes::from(stored))
        }
    }

    fn stateful_address() -> Address {
        address_in_stateful_range(0x10)
    }

    fn address_in_stateful_range(low_byte: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[18] = 0x01;
        bytes[19] = low_byte;
        H160(bytes)
    }

    #[test]
    fn register_outside_reserved_range_fails() {
        let mut registry = PrecompileRegistry::new();
        let err = registry.register(address_of(1), Box::new(EchoPrecompile));
        assert!(err.is_err());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = PrecompileRegistry::new();
        let addr = stateful_address();
        registry.register(addr, Box::new(EchoPrecompile)).unwrap();
        assert!(registry.register(addr, Box::new(EchoPrecompile)).is_err());
    }

    #[test]
    fn stateful_precompile_persists_across_calls_via_data_block() {
        let mut registry = PrecompileRegistry::new();
        let addr = stateful_address();
        registry.register(addr, Box::new(EchoPrecompile)).unwrap();

        let mut cache = crate::storage::ResultCache::default();
        let out1 = registry.execute(addr, b"ab", &mut cache).unwrap();
        assert_eq!(&out1[..], b"ab");
        let out2 = registry.execute(addr, b"cd", &mut cache).unwrap();
        assert_eq!(&out2[..], b"abcd");
    }
}
