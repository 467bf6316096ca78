use std::fmt::Write;

/// 20-byte hash160 digest identifying a public key or redeem script.
pub type Hash160 = [u8; 20];

/// The base32 alphabet shared by the bech32 encoding family.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// AddressType
///
/// The two standard payment patterns we recognize. The variant picks the
/// version byte embedded in the address payload and the locking-script
/// shape matched by `decode_locking_script`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    P2pkh,
    P2sh,
}

impl AddressType {
    fn version_byte(self) -> u8 {
        match self {
            AddressType::P2pkh => 0,
            AddressType::P2sh => 8,
        }
    }
}

/// CashAddr checksum over 5-bit symbols.
///
/// BCH code with five 40-bit feedback polynomials; the accumulator needs
/// more than 40 bits so it lives in a u64. CashAddr XORs the final value
/// with 1.
fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &v in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(v);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// Re-pack 8-bit bytes into 5-bit groups, MSB first, zero-padding the last
/// group on the low end.
fn to_five_bit_groups(payload: &[u8]) -> Vec<u8> {
    let mut groups = Vec::with_capacity(payload.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &byte in payload {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            groups.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        groups.push(((acc << (5 - bits)) & 31) as u8);
    }
    groups
}

/// Encode a hash160 as a CashAddr string, e.g.
/// `bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2`.
///
/// Pure and deterministic; the 20-byte length is guaranteed by the
/// `Hash160` type so there is no failure path.
pub fn encode(hash_type: AddressType, hash: &Hash160, prefix: &str) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(hash_type.version_byte());
    payload.extend_from_slice(hash);
    let data = to_five_bit_groups(&payload);

    // Checksum input: prefix chars masked to 5 bits, a zero separator, the
    // payload groups, then 8 zero groups standing in for the checksum.
    let mut checksum_input: Vec<u8> = prefix.bytes().map(|b| b & 31).collect();
    checksum_input.push(0);
    checksum_input.extend_from_slice(&data);
    checksum_input.extend_from_slice(&[0u8; 8]);
    let checksum = polymod(&checksum_input);

    let mut address = String::with_capacity(prefix.len() + 1 + data.len() + 8);
    address.push_str(prefix);
    address.push(':');
    for &d in &data {
        address.push(CHARSET[d as usize] as char);
    }
    for i in 0..8 {
        let symbol = ((checksum >> (5 * (7 - i))) & 31) as usize;
        address.push(CHARSET[symbol] as char);
    }
    address
}

/// Match a locking script against the two standard payment patterns and
/// extract the embedded hash160.
///
/// - P2PKH: `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
///   (`76a914<40 hex>88ac`)
/// - P2SH:  `OP_HASH160 <20 bytes> OP_EQUAL` (`a914<40 hex>87`)
///
/// Anything else (multisig, OP_RETURN, non-standard) is None, not an
/// error: only standard payment outputs count as fund recipients.
/// Chaingraph returns bytecode with a `\x` escape prefix, stripped here.
pub fn decode_locking_script(bytecode_hex: &str) -> Option<(AddressType, Hash160)> {
    let hex_str = bytecode_hex
        .strip_prefix("\\x")
        .unwrap_or(bytecode_hex)
        .to_ascii_lowercase();

    let (hash_type, hash_hex) = if hex_str.len() == 50
        && hex_str.starts_with("76a914")
        && hex_str.ends_with("88ac")
    {
        (AddressType::P2pkh, &hex_str[6..46])
    } else if hex_str.len() == 46 && hex_str.starts_with("a914") && hex_str.ends_with("87") {
        (AddressType::P2sh, &hex_str[4..44])
    } else {
        return None;
    };

    let bytes = hex::decode(hash_hex).ok()?;
    let hash: Hash160 = bytes.try_into().ok()?;
    Some((hash_type, hash))
}

/// Decode a locking script and render the recovered hash as a CashAddr in
/// one step. None when the script is not a standard payment output.
pub fn locking_script_address(bytecode_hex: &str, prefix: &str) -> Option<String> {
    let (hash_type, hash) = decode_locking_script(bytecode_hex)?;
    Some(encode(hash_type, &hash, prefix))
}

/// Shorten an address for display labels.
/// `bitcoincash:qz7tywh9j0n77ed63232en9vnxq5jr40gulr5m9p0m` -> `qz7tyw...9p0m`
pub fn shorten_address(address: &str) -> String {
    let addr = address.strip_prefix("bitcoincash:").unwrap_or(address);
    if addr.len() <= 12 {
        return addr.to_string();
    }
    let mut label = String::with_capacity(13);
    let _ = write!(label, "{}...{}", &addr[..6], &addr[addr.len() - 4..]);
    label
}
