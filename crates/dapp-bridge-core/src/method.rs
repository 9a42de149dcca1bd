const TYPED_DATA_METHOD: &str = "eth_signTypedData";

/// Methods the bridge answers itself; everything else goes to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMethod {
    /// EIP-695.
    ChainId,
    /// `eth_requestAccounts` (EIP-1102), legacy `enable`, `eth_accounts`.
    Accounts,
    /// EIP-3326.
    SwitchChain,
    SendTransaction,
    /// EIP-191.
    PersonalSign,
    /// EIP-712, every revision.
    SignTypedData,
    Relay,
}

impl BridgeMethod {
    pub fn classify(method: &str) -> Self {
        match method {
            "eth_chainId" => Self::ChainId,
            "eth_requestAccounts" | "enable" | "eth_accounts" => Self::Accounts,
            "wallet_switchEthereumChain" => Self::SwitchChain,
            "eth_sendTransaction" => Self::SendTransaction,
            "personal_sign" => Self::PersonalSign,
            m if is_typed_data_method(m) => Self::SignTypedData,
            _ => Self::Relay,
        }
    }

    pub fn is_local(self) -> bool {
        !matches!(self, Self::Relay)
    }
}

/// Matches `eth_signTypedData` optionally followed by `_v` and one more character.
fn is_typed_data_method(method: &str) -> bool {
    if method.ends_with(TYPED_DATA_METHOD) {
        return true;
    }
    let mut chars = method.chars();
    if chars.next_back().is_none() {
        return false;
    }
    chars
        .as_str()
        .strip_suffix("_v")
        .is_some_and(|head| head.ends_with(TYPED_DATA_METHOD))
}
