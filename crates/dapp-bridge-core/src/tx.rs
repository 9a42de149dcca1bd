use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxConversionError {
    #[error("transaction descriptor missing")]
    Missing,
    #[error("malformed transaction descriptor: {0}")]
    Malformed(String),
    #[error("invalid {field} quantity {value:?}")]
    InvalidQuantity { field: &'static str, value: String },
    #[error("invalid recipient {0:?}")]
    InvalidRecipient(String),
    #[error("invalid data hex: {0}")]
    InvalidData(String),
}

/// Transaction fields as a dapp sends them with `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTransaction {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl WireTransaction {
    pub fn from_param(param: Option<&Value>) -> Result<Self, TxConversionError> {
        let param = param.ok_or(TxConversionError::Missing)?;
        serde_json::from_value(param.clone())
            .map_err(|e| TxConversionError::Malformed(e.to_string()))
    }
}

/// Transaction shape the signing gateway accepts (ethereum family).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayTransaction {
    pub amount: U256,
    pub recipient: Option<Address>,
    pub gas_limit: Option<U256>,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub data: Option<Bytes>,
}

impl GatewayTransaction {
    pub const FAMILY: &'static str = "ethereum";

    /// EIP-55 form of the recipient.
    pub fn recipient_checksummed(&self) -> Option<String> {
        self.recipient.map(|a| a.to_checksum(None))
    }
}

impl TryFrom<&WireTransaction> for GatewayTransaction {
    type Error = TxConversionError;

    fn try_from(wire: &WireTransaction) -> Result<Self, Self::Error> {
        let recipient = match wire.to.as_deref() {
            Some(raw) => Some(
                raw.parse::<Address>()
                    .map_err(|_| TxConversionError::InvalidRecipient(raw.to_owned()))?,
            ),
            None => None,
        };
        let data = match wire.data.as_deref() {
            Some(raw) => Some(Bytes::from(
                alloy::hex::decode(strip_hex_prefix(raw))
                    .map_err(|e| TxConversionError::InvalidData(e.to_string()))?,
            )),
            None => None,
        };

        Ok(Self {
            amount: optional_quantity("value", wire.value.as_deref())?.unwrap_or(U256::ZERO),
            recipient,
            gas_limit: optional_quantity("gas", wire.gas.as_deref())?,
            gas_price: optional_quantity("gasPrice", wire.gas_price.as_deref())?,
            max_fee_per_gas: optional_quantity("maxFeePerGas", wire.max_fee_per_gas.as_deref())?,
            max_priority_fee_per_gas: optional_quantity(
                "maxPriorityFeePerGas",
                wire.max_priority_fee_per_gas.as_deref(),
            )?,
            data,
        })
    }
}

pub fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}

fn optional_quantity(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<U256>, TxConversionError> {
    raw.map(|value| parse_quantity(field, value)).transpose()
}

/// Hex quantity with an optional `0x`; empty means zero.
pub fn parse_quantity(field: &'static str, raw: &str) -> Result<U256, TxConversionError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|_| TxConversionError::InvalidQuantity {
        field,
        value: raw.to_owned(),
    })
}
