//! Read-only query surface over settlement state, answering in JSON.
//!
//! ```text
//! pools                    every pool
//! pool/<asset>             one pool
//! stakers/<asset>          staker records of a pool
//! staker/<address>         a staker's records across pools
//! vaults/pubkeys           vault keys grouped by role
//! vault/<pubkey>           one vault
//! outbound/<height>        items staged at a height, unclaimed
//! events/<from_id>         events with id >= from_id
//! gas/<chain>              gas estimate of a chain
//! reserve                  protocol reserve
//! admin/<key>              admin setting
//! ```

use serde_json::{json, Value};
use tidepool_ingress::NodeRegistry;
use tidepool_types::{
    Address, Asset, Chain, PubKey, Result, StakerUnit, TidepoolError, VaultStatus, VaultType,
};

use crate::Settler;

impl<R: NodeRegistry> Settler<R> {
    /// Answer a query path.
    ///
    /// # Errors
    /// - `UnknownQuery` for a path outside the table above, or a bad numeric argument
    /// - `InvalidAsset`, `InvalidAddress`, `InvalidPubKey` for a malformed argument
    /// - `PoolNotFound`, `VaultNotFound` for a missing record
    pub fn query(&self, path: &str) -> Result<Value> {
        let path = path.trim().trim_matches('/');
        let (head, arg) = path.split_once('/').unwrap_or((path, ""));
        let state = self.state();
        let unknown = || TidepoolError::UnknownQuery(path.to_string());

        let value = match (head, arg) {
            ("pools", "") => to_json(&state.pools.pools().collect::<Vec<_>>())?,
            ("pool", asset) => {
                let asset: Asset = asset.parse()?;
                let pool = state
                    .pools
                    .pool(&asset)
                    .ok_or(TidepoolError::PoolNotFound(asset))?;
                to_json(pool)?
            }
            ("stakers", asset) => {
                let asset: Asset = asset.parse()?;
                if !state.pools.pool_exists(&asset) {
                    return Err(TidepoolError::PoolNotFound(asset));
                }
                to_json(&state.pools.stakers(&asset).collect::<Vec<_>>())?
            }
            ("staker", address) => {
                let address = Address::new(address)?;
                let records: Vec<&StakerUnit> = state
                    .pools
                    .pools_of(&address)
                    .iter()
                    .filter_map(|asset| state.pools.staker(asset, &address))
                    .collect();
                json!({ "address": address, "pools": to_json(&records)? })
            }
            ("vaults", "pubkeys") => {
                let keys = |vault_type: VaultType| -> Vec<String> {
                    state
                        .vaults
                        .list_active(vault_type)
                        .map(|v| v.pubkey.to_string())
                        .collect()
                };
                let retiring: Vec<String> = state
                    .vaults
                    .vaults()
                    .filter(|v| v.status == VaultStatus::Retiring)
                    .map(|v| v.pubkey.to_string())
                    .collect();
                json!({
                    "pooled": keys(VaultType::Pooled),
                    "dedicated": keys(VaultType::Dedicated),
                    "retiring": retiring,
                })
            }
            ("vault", pubkey) => {
                let pubkey = PubKey::from_hex(pubkey)?;
                let vault = state
                    .vaults
                    .get(&pubkey)
                    .ok_or(TidepoolError::VaultNotFound(pubkey))?;
                to_json(vault)?
            }
            ("outbound", height) => {
                let height: u64 = height.parse().map_err(|_| unknown())?;
                to_json(state.outbound.pending(height))?
            }
            ("events", from) => {
                let from: u64 = from.parse().map_err(|_| unknown())?;
                to_json(self.events().since(from))?
            }
            ("gas", chain) => {
                let chain = Chain::new(chain)?;
                state.gas.get(&chain).map_or(Ok(Value::Null), to_json)?
            }
            ("reserve", "") => json!({ "reserve": state.reserve }),
            ("admin", key) if !key.is_empty() => {
                json!({ "key": key, "value": state.admin_config.get(key) })
            }
            _ => return Err(unknown()),
        };
        Ok(value)
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| TidepoolError::Serialization(e.to_string()))
}
