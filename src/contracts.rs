//! ABI descriptors and calldata helpers for the token and distribution
//! contracts. Calls are encoded by hand-built `Function` descriptors; the
//! contract surface is small enough that generated bindings would be noise.

use anyhow::{anyhow, Result};
use ethers::abi::{Function, Param, ParamType, StateMutability, Token};
use ethers::types::{Address, U256};

fn param(name: &str, kind: ParamType) -> Param {
    Param {
        name: name.to_string(),
        kind,
        internal_type: None,
    }
}

#[allow(deprecated)]
fn function(
    name: &str,
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    state_mutability: StateMutability,
) -> Function {
    Function {
        name: name.to_string(),
        inputs,
        outputs,
        constant: None,
        state_mutability,
    }
}

/// ERC-20 `balanceOf(address) -> uint256`
pub fn erc20_balance_of() -> Function {
    function(
        "balanceOf",
        vec![param("account", ParamType::Address)],
        vec![param("", ParamType::Uint(256))],
        StateMutability::View,
    )
}

/// ERC-20 `decimals() -> uint8`
pub fn erc20_decimals() -> Function {
    function(
        "decimals",
        vec![],
        vec![param("", ParamType::Uint(8))],
        StateMutability::View,
    )
}

/// ERC-20 `allowance(address owner, address spender) -> uint256`
pub fn erc20_allowance() -> Function {
    function(
        "allowance",
        vec![
            param("owner", ParamType::Address),
            param("spender", ParamType::Address),
        ],
        vec![param("", ParamType::Uint(256))],
        StateMutability::View,
    )
}

/// ERC-20 `approve(address spender, uint256 amount) -> bool`
pub fn erc20_approve() -> Function {
    function(
        "approve",
        vec![
            param("spender", ParamType::Address),
            param("amount", ParamType::Uint(256)),
        ],
        vec![param("", ParamType::Bool)],
        StateMutability::NonPayable,
    )
}

/// `distributePayment(address[] recipients, uint256[] amounts, uint256 totalAmount)`
pub fn distribute_payment() -> Function {
    function(
        "distributePayment",
        vec![
            param("recipients", ParamType::Array(Box::new(ParamType::Address))),
            param("amounts", ParamType::Array(Box::new(ParamType::Uint(256)))),
            param("totalAmount", ParamType::Uint(256)),
        ],
        vec![],
        StateMutability::NonPayable,
    )
}

/// `validateDistribution(address[] recipients, uint256[] amounts, uint256 totalAmount) -> bool`
/// Optional dry-run entry point; not every deployment exposes it.
pub fn validate_distribution() -> Function {
    function(
        "validateDistribution",
        vec![
            param("recipients", ParamType::Array(Box::new(ParamType::Address))),
            param("amounts", ParamType::Array(Box::new(ParamType::Uint(256)))),
            param("totalAmount", ParamType::Uint(256)),
        ],
        vec![param("", ParamType::Bool)],
        StateMutability::View,
    )
}

pub fn selector(func: &Function) -> [u8; 4] {
    func.short_signature()
}

pub fn encode_call(func: &Function, args: &[Token]) -> Result<Vec<u8>> {
    func.encode_input(args)
        .map_err(|e| anyhow!("failed to encode {} call: {}", func.name, e))
}

pub fn address_array(addresses: &[Address]) -> Token {
    Token::Array(addresses.iter().map(|a| Token::Address(*a)).collect())
}

pub fn uint_array(values: &[U256]) -> Token {
    Token::Array(values.iter().map(|v| Token::Uint(*v)).collect())
}

/// Calldata or return data as the 0x-prefixed hex string the wire expects.
pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode the single 32-byte uint word an eth_call returned.
pub fn decode_uint(hex_output: &str) -> Result<U256> {
    let bytes = hex::decode(hex_output.trim_start_matches("0x"))
        .map_err(|e| anyhow!("invalid hex in call output: {}", e))?;
    if bytes.len() < 32 {
        return Err(anyhow!(
            "call output too short: {} bytes, expected at least 32",
            bytes.len()
        ));
    }
    Ok(U256::from_big_endian(&bytes[..32]))
}

/// Decode a single bool word an eth_call returned.
pub fn decode_bool(hex_output: &str) -> Result<bool> {
    Ok(!decode_uint(hex_output)?.is_zero())
}

/// Parse a bare JSON-RPC hex quantity ("0xde0b6b3a7640000").
pub fn parse_quantity(raw: &str) -> Result<U256> {
    let trimmed = raw.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Err(anyhow!("empty hex quantity"));
    }
    U256::from_str_radix(trimmed, 16).map_err(|e| anyhow!("invalid hex quantity '{}': {}", raw, e))
}
