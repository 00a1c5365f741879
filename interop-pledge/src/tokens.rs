use interop_core::driver::{LoadedToken, TokenLoader};
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, TokenId};
use interop_core::quantity::Quantity;
use interop_core::token::{PledgeScript, Token, UnspentToken};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

struct Entry {
    token: Token,
    output: Vec<u8>,
    opening: Vec<u8>,
}

/// A committed output as recorded after a successful submit
pub struct CreatedOutput {
    pub id: TokenId,
    pub token: Token,
    pub output: Vec<u8>,
    pub opening: Vec<u8>,
}

/// An unspent pledge output with its script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PledgedToken {
    pub id: TokenId,
    pub script: PledgeScript,
    pub token: Token,
}

/// Unspent outputs of a ledger known to this node, with their openings
#[derive(Default)]
pub struct TokenVault {
    entries: RwLock<BTreeMap<TokenId, Entry>>,
}

impl TokenVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<RwLockReadGuard<'_, BTreeMap<TokenId, Entry>>> {
        self.entries
            .read()
            .map_err(|_| InteropError::Other("token vault lock poisoned".to_string()))
    }

    /// Record the effect of a committed request
    pub fn apply(&self, spent: &[TokenId], created: Vec<CreatedOutput>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| InteropError::Other("token vault lock poisoned".to_string()))?;
        for id in spent {
            entries.remove(id);
        }
        for output in created {
            if output.token.is_burn() {
                continue;
            }
            entries.insert(
                output.id,
                Entry {
                    token: output.token,
                    output: output.output,
                    opening: output.opening,
                },
            );
        }
        debug!("token vault holds {} unspent outputs", entries.len());
        Ok(())
    }

    pub fn get(&self, id: &TokenId) -> Result<Option<Token>> {
        Ok(self.entries()?.get(id).map(|e| e.token.clone()))
    }

    /// Unspent tokens of a type owned directly by `owner`
    pub fn unspent(&self, owner: &Identity, token_type: &str) -> Result<Vec<UnspentToken>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|(_, e)| e.token.token_type == token_type)
            .filter(|(_, e)| matches!(e.token.owner(), Ok(Some(o)) if o.as_identity() == Some(owner)))
            .map(|(id, e)| UnspentToken {
                id: id.clone(),
                token: e.token.clone(),
            })
            .collect())
    }

    /// Unspent pledge outputs in which `party` is sender, recipient or issuer
    pub fn pledged(&self, party: &Identity) -> Result<Vec<PledgedToken>> {
        Ok(self
            .entries()?
            .iter()
            .filter_map(|(id, e)| {
                let owner = e.token.owner().ok()??;
                if !owner.involves(party) {
                    return None;
                }
                owner.as_pledge().map(|script| PledgedToken {
                    id: id.clone(),
                    script: script.clone(),
                    token: e.token.clone(),
                })
            })
            .collect())
    }

    pub fn balance(&self, owner: &Identity, token_type: &str, precision: u32) -> Result<Quantity> {
        self.unspent(owner, token_type)?
            .iter()
            .try_fold(Quantity::zero(precision)?, |sum, t| {
                sum.checked_add(&t.token.quantity(precision)?)
            })
    }

    /// Pick inputs covering `amount`, in token id order.
    ///
    /// # Returns
    /// The selected ids and the total value they hold
    pub fn select(&self, owner: &Identity, token_type: &str, amount: &Quantity) -> Result<(Vec<TokenId>, Quantity)> {
        let precision = amount.precision();
        let mut selected = Vec::new();
        let mut total = Quantity::zero(precision)?;
        for unspent in self.unspent(owner, token_type)? {
            if total.compare(amount)?.is_ge() {
                break;
            }
            total = total.checked_add(&unspent.token.quantity(precision)?)?;
            selected.push(unspent.id);
        }
        if total.compare(amount)?.is_lt() {
            return Err(InteropError::InsufficientBalance {
                token_type: token_type.to_string(),
                requested: amount.to_string(),
                available: total.to_string(),
            });
        }
        Ok((selected, total))
    }
}

impl TokenLoader for TokenVault {
    fn load_tokens(&self, ids: &[TokenId]) -> Result<Vec<LoadedToken>> {
        let entries = self.entries()?;
        ids.iter()
            .map(|id| {
                entries
                    .get(id)
                    .map(|e| LoadedToken {
                        id: id.clone(),
                        output: e.output.clone(),
                        output_metadata: e.opening.clone(),
                    })
                    .ok_or_else(|| InteropError::NotFound(format!("token {} is not in the vault", id)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use interop_core::id::{PledgeId, TxId};
    use interop_core::token::Owner;

    fn q(value: u64) -> Quantity {
        Quantity::from_u64(value, 64).unwrap()
    }

    fn created(tx: &str, owner: &Identity, value: u64) -> CreatedOutput {
        let token = Token::new(&Owner::Identity(owner.clone()), "USD", &q(value)).unwrap();
        CreatedOutput {
            id: TokenId::new(TxId::new(tx), 0),
            output: token.to_json().unwrap(),
            opening: token.to_json().unwrap(),
            token,
        }
    }

    #[test]
    fn test_pledged_outputs_by_party() {
        let vault = TokenVault::new();
        let (alice, bob, issuer) = (
            Identity::from_label("alice"),
            Identity::from_label("bob"),
            Identity::from_label("issuer"),
        );
        let script = PledgeScript {
            sender: alice.clone(),
            recipient: bob.clone(),
            issuer: issuer.clone(),
            id: PledgeId::new("p1"),
            deadline: Utc::now(),
            destination_network: "fabric://beta../".to_string(),
        };
        let token = Token::new(&Owner::Pledge(script.clone()), "USD", &q(10)).unwrap();
        let pledged = CreatedOutput {
            id: TokenId::new(TxId::new("p"), 0),
            output: token.to_json().unwrap(),
            opening: token.to_json().unwrap(),
            token,
        };
        vault.apply(&[], vec![pledged, created("a", &alice, 5)]).unwrap();

        for party in [&alice, &bob, &issuer] {
            let found = vault.pledged(party).unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].script, script);
        }
        assert!(vault.pledged(&Identity::from_label("mallory")).unwrap().is_empty());

        // Pledged value is not part of the sender's balance
        assert_eq!(vault.balance(&alice, "USD", 64).unwrap(), q(5));
    }

    #[test]
    fn test_select_and_balance() {
        let vault = TokenVault::new();
        let alice = Identity::from_label("alice");
        vault
            .apply(&[], vec![created("a", &alice, 30), created("b", &alice, 20)])
            .unwrap();
        assert_eq!(vault.balance(&alice, "USD", 64).unwrap(), q(50));

        let (ids, total) = vault.select(&alice, "USD", &q(40)).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(total, q(50));

        assert!(matches!(
            vault.select(&alice, "USD", &q(60)),
            Err(InteropError::InsufficientBalance { .. })
        ));
        assert!(vault.select(&alice, "EUR", &q(1)).is_err());

        vault.apply(&ids[..1], vec![]).unwrap();
        assert_eq!(vault.balance(&alice, "USD", 64).unwrap(), q(20));
        assert!(vault.load_tokens(&ids).is_err());
        assert_eq!(vault.load_tokens(&ids[1..]).unwrap().len(), 1);
    }
}
