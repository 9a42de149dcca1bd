use serde::Deserialize;
use thiserror::Error;
use url::form_urlencoded;

use dapp_bridge_core::{ChainConfig, LaunchParams, DEFAULT_DAPP_NAME};

const PARAMS_KEY: &str = "params";
const ACCOUNT_ID_KEY: &str = "accountId";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("launch query has no `params` entry")]
    MissingParams,
    #[error("launch params are not valid JSON: {0}")]
    InvalidParams(String),
    #[error("launch params have no dappUrl")]
    MissingDappUrl,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLaunchParams {
    #[serde(default)]
    dapp_url: Option<String>,
    #[serde(default)]
    dapp_name: Option<String>,
    #[serde(default)]
    nano_app: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    networks: Vec<ChainConfig>,
}

/// Splits a page query into launch params, the launch account and the dapp's own query.
///
/// `params` holds the JSON launch object and `accountId` the initial account;
/// the first occurrence of each wins. Every other pair is kept, in order, for
/// the embedded dapp URL.
pub fn parse_launch_query(query: &str) -> Result<LaunchParams, LaunchError> {
    let query = query.strip_prefix('?').unwrap_or(query);

    let mut raw_params = None;
    let mut initial_account_id = None;
    let mut dapp_query = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            PARAMS_KEY => {
                raw_params.get_or_insert_with(|| value.into_owned());
            }
            ACCOUNT_ID_KEY => {
                initial_account_id.get_or_insert_with(|| value.into_owned());
            }
            _ => dapp_query.push((key.into_owned(), value.into_owned())),
        }
    }

    let raw_params = raw_params.ok_or(LaunchError::MissingParams)?;
    let raw: RawLaunchParams = serde_json::from_str(&raw_params)
        .map_err(|e| LaunchError::InvalidParams(e.to_string()))?;
    let dapp_url = raw
        .dapp_url
        .filter(|u| !u.is_empty())
        .ok_or(LaunchError::MissingDappUrl)?;

    let mut launch = LaunchParams::new(dapp_url, raw.networks);
    launch.dapp_name = raw
        .dapp_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_DAPP_NAME.to_owned());
    launch.nano_app = raw.nano_app.filter(|n| !n.is_empty());
    launch.dependencies = raw.dependencies;
    launch.initial_account_id = initial_account_id.filter(|id| !id.is_empty());
    launch.dapp_query = dapp_query;
    Ok(launch)
}
