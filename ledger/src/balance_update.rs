//! Linearization of a block's balance changes.
//!
//! Application order, most significant first:
//!
//! 1. block-level updates;
//! 2. per operation, in batch order, the fee updates of all its contents;
//! 3. then, per content, its result updates followed by the updates of its
//!    internal results in reverse.
//!
//! Reversal applies to the flattened internal updates of one content item:
//! internal results `[A, B, C]` contribute `C`'s updates (last first), then
//! `B`'s, then `A`'s. `internal_index` keeps the original position.

use rewards_chain::{BalanceChange, Block, Operation};
use rewards_types::{Address, Mutez, OperationHash};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceUpdateSource {
    Block,
    OperationFee,
    OperationResult,
    InternalResult,
}

impl BalanceUpdateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::OperationFee => "operation_fee",
            Self::OperationResult => "operation_result",
            Self::InternalResult => "internal_result",
        }
    }
}

/// One attributed balance delta, positioned within its block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub address: Address,
    pub amount: Mutez,
    pub source: BalanceUpdateSource,
    /// Absent for block-level updates.
    pub operation: Option<OperationHash>,
    pub content_index: Option<usize>,
    pub internal_index: Option<usize>,
}

impl BalanceUpdate {
    fn block(change: &BalanceChange) -> Self {
        Self {
            address: change.address.clone(),
            amount: change.change.clone(),
            source: BalanceUpdateSource::Block,
            operation: None,
            content_index: None,
            internal_index: None,
        }
    }

    fn operation(
        change: &BalanceChange,
        source: BalanceUpdateSource,
        operation: &OperationHash,
        content_index: usize,
        internal_index: Option<usize>,
    ) -> Self {
        Self {
            address: change.address.clone(),
            amount: change.change.clone(),
            source,
            operation: Some(operation.clone()),
            content_index: Some(content_index),
            internal_index,
        }
    }
}

/// Build the ordered ledger of `block`.
pub fn build_ledger(block: &Block) -> Vec<BalanceUpdate> {
    let mut ledger: Vec<BalanceUpdate> =
        block.balance_updates.iter().map(BalanceUpdate::block).collect();

    for operation in block.operations.iter().flatten() {
        push_operation(&mut ledger, operation);
    }
    ledger
}

fn push_operation(ledger: &mut Vec<BalanceUpdate>, operation: &Operation) {
    let hash = &operation.hash;

    for (content_index, content) in operation.contents.iter().enumerate() {
        ledger.extend(content.fee_updates.iter().map(|change| {
            BalanceUpdate::operation(
                change,
                BalanceUpdateSource::OperationFee,
                hash,
                content_index,
                None,
            )
        }));
    }

    for (content_index, content) in operation.contents.iter().enumerate() {
        ledger.extend(content.result_updates.iter().map(|change| {
            BalanceUpdate::operation(
                change,
                BalanceUpdateSource::OperationResult,
                hash,
                content_index,
                None,
            )
        }));

        let internal = content
            .internal_results
            .iter()
            .enumerate()
            .flat_map(|(internal_index, result)| {
                result
                    .balance_updates
                    .iter()
                    .map(move |change| (internal_index, change))
            })
            .collect::<Vec<_>>();

        ledger.extend(internal.into_iter().rev().map(|(internal_index, change)| {
            BalanceUpdate::operation(
                change,
                BalanceUpdateSource::InternalResult,
                hash,
                content_index,
                Some(internal_index),
            )
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewards_chain::{InternalResult, OperationContent};

    fn addr(i: usize) -> Address {
        const POOL: [&str; 4] = [
            "tz1ELYevTeKz1tb8J8cqtYnz2vRdv9tamNmr",
            "tz1VNRtHZdLzSJfyvvz2cxAoR1kWoNDWMisL",
            "tz18vxoSEtntT8WJnjrXKD8qxcepcJeTGmkA",
            "KT1VNRtHZdLzSJfyvvz2cxAoR1kWoNDWMisL",
        ];
        Address::new(POOL[i])
    }

    fn change(i: usize, amount: i64) -> BalanceChange {
        BalanceChange::new(addr(i), amount)
    }

    fn amounts(ledger: &[BalanceUpdate]) -> Vec<i64> {
        ledger
            .iter()
            .map(|u| u.amount.to_i64().unwrap_or_default())
            .collect()
    }

    #[test]
    fn empty_block_yields_empty_ledger() {
        assert!(build_ledger(&Block::default()).is_empty());
    }

    #[test]
    fn block_updates_come_first() {
        let block = Block {
            level: 10,
            balance_updates: vec![change(0, 1), change(1, 2)],
            operations: vec![vec![Operation {
                hash: OperationHash::new("opA"),
                contents: vec![OperationContent {
                    fee_updates: vec![change(1, 3)],
                    ..Default::default()
                }],
            }]],
        };
        let ledger = build_ledger(&block);
        assert_eq!(amounts(&ledger), vec![1, 2, 3]);
        assert_eq!(ledger[0].source, BalanceUpdateSource::Block);
        assert!(ledger[0].operation.is_none());
        assert!(ledger[0].content_index.is_none());
        assert_eq!(ledger[2].source, BalanceUpdateSource::OperationFee);
    }

    #[test]
    fn fees_of_all_contents_precede_results() {
        let op = Operation {
            hash: OperationHash::new("opBatch"),
            contents: vec![
                OperationContent {
                    fee_updates: vec![change(0, -1)],
                    result_updates: vec![change(0, -10)],
                    internal_results: vec![],
                },
                OperationContent {
                    fee_updates: vec![change(1, -2)],
                    result_updates: vec![change(1, -20)],
                    internal_results: vec![],
                },
            ],
        };
        let block = Block {
            level: 1,
            balance_updates: vec![],
            operations: vec![vec![op]],
        };
        let ledger = build_ledger(&block);
        assert_eq!(amounts(&ledger), vec![-1, -2, -10, -20]);
        let sources: Vec<_> = ledger.iter().map(|u| u.source).collect();
        assert_eq!(
            sources,
            vec![
                BalanceUpdateSource::OperationFee,
                BalanceUpdateSource::OperationFee,
                BalanceUpdateSource::OperationResult,
                BalanceUpdateSource::OperationResult,
            ]
        );
        assert_eq!(ledger[1].content_index, Some(1));
        assert_eq!(ledger[2].content_index, Some(0));
    }

    #[test]
    fn internal_results_are_reversed_after_the_result() {
        let op = Operation {
            hash: OperationHash::new("opInternal"),
            contents: vec![OperationContent {
                fee_updates: vec![],
                result_updates: vec![change(0, 100)],
                internal_results: vec![
                    InternalResult {
                        balance_updates: vec![change(1, 1), change(2, 2)],
                    },
                    InternalResult {
                        balance_updates: vec![change(1, 3)],
                    },
                    InternalResult {
                        balance_updates: vec![change(3, 4), change(2, 5)],
                    },
                ],
            }],
        };
        let block = Block {
            level: 1,
            balance_updates: vec![],
            operations: vec![vec![op]],
        };
        let ledger = build_ledger(&block);
        assert_eq!(amounts(&ledger), vec![100, 5, 4, 3, 2, 1]);
        let internal: Vec<_> = ledger[1..].iter().map(|u| u.internal_index).collect();
        assert_eq!(
            internal,
            vec![Some(2), Some(2), Some(1), Some(0), Some(0)]
        );
        assert!(ledger[1..]
            .iter()
            .all(|u| u.source == BalanceUpdateSource::InternalResult));
    }

    #[test]
    fn batches_and_operations_keep_their_order() {
        let op = |hash: &str, amount: i64| Operation {
            hash: OperationHash::new(hash),
            contents: vec![OperationContent {
                result_updates: vec![change(0, amount)],
                ..Default::default()
            }],
        };
        let block = Block {
            level: 1,
            balance_updates: vec![],
            operations: vec![vec![op("a", 1), op("b", 2)], vec![], vec![op("c", 3)]],
        };
        let ledger = build_ledger(&block);
        let hashes: Vec<_> = ledger
            .iter()
            .filter_map(|u| u.operation.as_ref().map(|h| h.as_str().to_string()))
            .collect();
        assert_eq!(hashes, vec!["a", "b", "c"]);
        assert_eq!(amounts(&ledger), vec![1, 2, 3]);
    }

    #[test]
    fn source_names() {
        assert_eq!(BalanceUpdateSource::Block.as_str(), "block");
        assert_eq!(BalanceUpdateSource::InternalResult.as_str(), "internal_result");
    }
}
