//! Transaction memo grammar.
//!
//! Every inbound transaction names its instruction in the memo, as
//! colon-separated fields with the kind first:
//!
//! ```text
//! CREATE:<asset>                         c:<asset>
//! STAKE:<asset>[:<asset_address>]        +:...
//! ADD:<asset>                            %:...
//! WITHDRAW:<asset>[:<basis_points>]      -:...
//! SWAP:<asset>[:<dest>[:<limit>]]        =:...
//! ADMIN:KEY:<key>:<value>                !:...
//! ADMIN:POOLSTATUS:<asset>:<status>
//! OUTBOUND:<txid>
//! REFUND:<txid>
//! ```
//!
//! Kinds are case-insensitive. Anything else is rejected as
//! [`TidepoolError::InvalidMemo`] before any state is touched.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, Address, Amount, Asset, PoolStatus, Result, TidepoolError, TxId};

/// Which admin setting an `ADMIN` memo changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminKind {
    /// Free-form key/value configuration.
    Key,
    /// Pool status change; the key is the pool asset.
    PoolStatus,
}

impl FromStr for AdminKind {
    type Err = TidepoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Ok(Self::Key),
            "poolstatus" => Ok(Self::PoolStatus),
            other => Err(TidepoolError::memo(format!("unknown admin kind {other:?}"))),
        }
    }
}

impl fmt::Display for AdminKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => write!(f, "KEY"),
            Self::PoolStatus => write!(f, "POOLSTATUS"),
        }
    }
}

/// Payload of an `ADMIN` memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminMemo {
    pub kind: AdminKind,
    pub key: String,
    pub value: String,
}

impl AdminMemo {
    /// Pool asset and target status of a `POOLSTATUS` memo.
    pub fn pool_status(&self) -> Result<(Asset, PoolStatus)> {
        if self.kind != AdminKind::PoolStatus {
            return Err(TidepoolError::memo("not a POOLSTATUS instruction"));
        }
        Ok((self.key.parse()?, self.value.parse()?))
    }
}

/// A parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Memo {
    Create {
        asset: Asset,
    },
    Stake {
        asset: Asset,
        asset_address: Option<Address>,
    },
    Add {
        asset: Asset,
    },
    Withdraw {
        asset: Asset,
        basis_points: u64,
    },
    Swap {
        asset: Asset,
        destination: Option<Address>,
        /// Minimum acceptable output in base units; zero disables the check.
        trade_target: Amount,
    },
    Admin(AdminMemo),
    Outbound {
        tx_id: TxId,
    },
    Refund {
        tx_id: TxId,
    },
}

impl Memo {
    /// Parse a memo string.
    pub fn parse(memo: &str) -> Result<Self> {
        let memo = memo.trim();
        if memo.is_empty() {
            return Err(TidepoolError::memo("memo is empty"));
        }
        let parts: Vec<&str> = memo.split(':').map(str::trim).collect();
        let kind = parts[0].to_ascii_lowercase();
        let field = |i: usize| parts.get(i).copied().filter(|p| !p.is_empty());

        match kind.as_str() {
            "create" | "c" => Ok(Self::Create {
                asset: required_asset(field(1))?,
            }),
            "stake" | "+" => Ok(Self::Stake {
                asset: required_asset(field(1))?,
                asset_address: field(2).map(Address::new).transpose()?,
            }),
            "add" | "%" => Ok(Self::Add {
                asset: required_asset(field(1))?,
            }),
            "withdraw" | "-" => {
                let asset = required_asset(field(1))?;
                let basis_points = match field(2) {
                    None => constants::MAX_WITHDRAW_BASIS_POINTS,
                    Some(raw) => raw
                        .parse::<u64>()
                        .map_err(|_| TidepoolError::memo(format!("bad basis points {raw:?}")))?,
                };
                if basis_points == 0 || basis_points > constants::MAX_WITHDRAW_BASIS_POINTS {
                    return Err(TidepoolError::InvalidBasisPoints(basis_points));
                }
                Ok(Self::Withdraw {
                    asset,
                    basis_points,
                })
            }
            "swap" | "=" => Ok(Self::Swap {
                asset: required_asset(field(1))?,
                destination: field(2).map(Address::new).transpose()?,
                trade_target: field(3).map_or(Ok(Decimal::ZERO), parse_limit)?,
            }),
            "admin" | "!" => {
                if parts.len() < 4 {
                    return Err(TidepoolError::memo("admin memo needs kind, key and value"));
                }
                let admin = AdminMemo {
                    kind: parts[1].parse()?,
                    key: parts[2].to_string(),
                    value: parts[3].to_string(),
                };
                if admin.key.is_empty() || admin.value.is_empty() {
                    return Err(TidepoolError::memo("admin key and value cannot be empty"));
                }
                if admin.kind == AdminKind::PoolStatus {
                    admin.pool_status()?;
                }
                Ok(Self::Admin(admin))
            }
            "outbound" => Ok(Self::Outbound {
                tx_id: required_tx_id(field(1))?,
            }),
            "refund" => Ok(Self::Refund {
                tx_id: required_tx_id(field(1))?,
            }),
            other => Err(TidepoolError::memo(format!("unknown memo kind {other:?}"))),
        }
    }

    /// The pool asset the instruction targets, if any.
    #[must_use]
    pub fn asset(&self) -> Option<&Asset> {
        match self {
            Self::Create { asset }
            | Self::Stake { asset, .. }
            | Self::Add { asset }
            | Self::Withdraw { asset, .. }
            | Self::Swap { asset, .. } => Some(asset),
            _ => None,
        }
    }

    /// Whether this memo settles a previously staged outbound payment.
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound { .. } | Self::Refund { .. })
    }

    /// Short lowercase name, for log fields.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Stake { .. } => "stake",
            Self::Add { .. } => "add",
            Self::Withdraw { .. } => "withdraw",
            Self::Swap { .. } => "swap",
            Self::Admin(_) => "admin",
            Self::Outbound { .. } => "outbound",
            Self::Refund { .. } => "refund",
        }
    }
}

impl FromStr for Memo {
    type Err = TidepoolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn required_asset(raw: Option<&str>) -> Result<Asset> {
    raw.ok_or_else(|| TidepoolError::memo("missing asset"))?
        .parse()
}

fn required_tx_id(raw: Option<&str>) -> Result<TxId> {
    TxId::new(raw.ok_or_else(|| TidepoolError::memo("missing tx id"))?)
}

/// Whole-unit decimal limit scaled to base units (`8.7` → `870000000`).
fn parse_limit(raw: &str) -> Result<Amount> {
    let limit: Decimal = raw
        .parse()
        .map_err(|_| TidepoolError::memo(format!("bad trade target {raw:?}")))?;
    if limit.is_sign_negative() {
        return Err(TidepoolError::memo(format!("negative trade target {raw:?}")));
    }
    limit
        .checked_mul(Decimal::from(constants::ONE))
        .map(|v| v.floor())
        .ok_or(TidepoolError::MathOverflow { op: "trade target" })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEST: &str = "bnb1lejrrtta9cgr49fuh7ktu3sddhe0ff7wenlpn6";

    fn rune() -> Asset {
        "RUNE-1BA".parse().unwrap()
    }

    #[test]
    fn abbreviated_forms() {
        assert_eq!(Memo::parse("c:RUNE-1BA").unwrap(), Memo::Create { asset: rune() });
        assert_eq!(Memo::parse("%:RUNE-1BA").unwrap(), Memo::Add { asset: rune() });
        assert_eq!(
            Memo::parse("+:RUNE-1BA").unwrap(),
            Memo::Stake {
                asset: rune(),
                asset_address: None
            }
        );
        assert_eq!(
            Memo::parse("-:RUNE-1BA:25").unwrap(),
            Memo::Withdraw {
                asset: rune(),
                basis_points: 25
            }
        );
    }

    #[test]
    fn swap_limit_is_scaled_to_base_units() {
        let memo = Memo::parse(&format!("=:RUNE-1BA:{DEST}:8.7")).unwrap();
        let Memo::Swap {
            destination,
            trade_target,
            ..
        } = memo
        else {
            panic!("expected swap");
        };
        assert_eq!(destination.unwrap().as_str(), DEST);
        assert_eq!(trade_target, Decimal::from(870_000_000i64));

        for memo in [format!("=:RUNE-1BA:{DEST}"), format!("=:RUNE-1BA:{DEST}:")] {
            let Memo::Swap { trade_target, .. } = Memo::parse(&memo).unwrap() else {
                panic!("expected swap");
            };
            assert!(trade_target.is_zero());
        }
    }

    #[test]
    fn long_forms_are_case_insensitive() {
        assert!(matches!(Memo::parse("CREATE:RUNE-1BA").unwrap(), Memo::Create { .. }));
        assert!(matches!(Memo::parse("add:RUNE-1BA").unwrap(), Memo::Add { .. }));
        assert!(matches!(
            Memo::parse("withdraw:bnb").unwrap(),
            Memo::Withdraw {
                basis_points: 10_000,
                ..
            }
        ));
        let hash = "A1C7D97D5DB51FFDBC3FE29FFF6ADAA2DAF112D2CEAADA0902822333A59BD218";
        assert!(matches!(
            Memo::parse(&format!("outbound:{hash}")).unwrap(),
            Memo::Outbound { .. }
        ));
        assert!(Memo::parse(&format!("REFUND:{hash}")).unwrap().is_outbound());
    }

    #[test]
    fn admin_memos() {
        let Memo::Admin(admin) = Memo::parse("!:KEY:TSL:15").unwrap() else {
            panic!("expected admin");
        };
        assert_eq!(admin.kind, AdminKind::Key);
        assert_eq!(admin.key, "TSL");
        assert_eq!(admin.value, "15");

        let Memo::Admin(admin) = Memo::parse("!:poolstatus:BNB:active").unwrap() else {
            panic!("expected admin");
        };
        let (asset, status) = admin.pool_status().unwrap();
        assert_eq!(asset, Asset::bnb());
        assert_eq!(status, PoolStatus::Enabled);
    }

    #[test]
    fn rejects_malformed_memos() {
        for bad in [
            "",
            "bogus",
            "CREATE",
            "c:",
            "-:bnb:twenty-two",
            "-:bnb:0",
            "-:bnb:10001",
            "=:bnb:bad_DES:5.6",
            "=:bnb:bnb1lejrrtta9cgr49fuh7ktu3sddhe0ff7wenlpn6:five",
            ">:bnb:bnb1lejrrtta9cgr49fuh7ktu3sddhe0ff7wenlpn6:5",
            "!:key:val",
            "!:bogus:key:value",
            "!:poolstatus:BNB:paused",
            "OUTBOUND:nothex",
        ] {
            assert!(Memo::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn asset_accessor() {
        assert_eq!(Memo::parse("c:bnb").unwrap().asset(), Some(&Asset::bnb()));
        assert!(Memo::parse("!:KEY:a:b").unwrap().asset().is_none());
        assert_eq!(Memo::parse("=:bnb").unwrap().kind_name(), "swap");
    }
}
