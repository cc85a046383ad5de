//! Per-chain gateway
//!
//! The gateway custodies tokens deposited for cross-chain transfer, assigns
//! each outbound request its content-derived id, and appends it to an
//! append-only outbound log the relayer scans by cursor. On the inbound
//! side it is the replay-protection gate: a message id is admitted by
//! `approve` exactly once, and `execute` transitions it out of `Approved`
//! exactly once, into one of the terminal statuses.
//!
//! A failed execution never destroys funds: the token released for the
//! call is pulled back into gateway custody and the message is left
//! `Failed`, queryable, awaiting administrative recovery.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::chain::executable::{ExecuteError, SwapExecutable};
use crate::chain::pool::PoolFactory;
use crate::chain::token::{TokenError, TokenLedger};
use crate::types::{Address, Message, MessageId, MessageRecord, MessageStatus, TokenTransfer};

/// Errors raised by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("message {0} is already approved")]
    AlreadyApproved(MessageId),
    #[error("caller {0} is not the trusted relayer")]
    UnauthorizedRelayer(Address),
    #[error("message {id} is addressed to `{destination_chain}`, not this chain")]
    WrongDestination {
        id: MessageId,
        destination_chain: String,
    },
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),
    #[error("message {id} is {status}, not Approved")]
    NotExecutable { id: MessageId, status: MessageStatus },
}

/// Gateway state for one chain.
#[derive(Debug)]
pub struct Gateway {
    /// Name of the chain this gateway lives on
    chain: String,
    /// Custody account in the chain's ledger
    address: Address,
    /// The only address allowed to approve inbound messages
    relayer: Address,
    /// Outbound sequence number; each message consumes one
    nonce: u64,
    /// Append-only outbound log, scanned by the relayer from a cursor
    outbound: Vec<Message>,
    /// Inbound messages keyed by id, with their status state machine
    inbound: HashMap<MessageId, MessageRecord>,
}

impl Gateway {
    pub fn new(chain: &str, address: Address, relayer: Address) -> Self {
        Gateway {
            chain: chain.to_string(),
            address,
            relayer,
            nonce: 0,
            outbound: Vec::new(),
            inbound: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Lock `token` from the caller and emit a cross-chain call request.
    ///
    /// The caller must have pre-approved the gateway for the amount; the
    /// debit goes through the allowance path and fails with the ledger's
    /// `InsufficientAllowance` / `InsufficientBalance` otherwise.
    pub fn lock_and_call(
        &mut self,
        ledger: &mut TokenLedger,
        caller: Address,
        destination_chain: &str,
        destination_address: Address,
        payload: Vec<u8>,
        token: Option<TokenTransfer>,
    ) -> Result<MessageId, GatewayError> {
        if let Some(transfer) = &token {
            ledger.transfer_from(
                &transfer.symbol,
                self.address,
                caller,
                self.address,
                transfer.amount,
            )?;
        }

        let id = MessageId::derive(&self.chain, self.nonce);
        self.nonce += 1;

        let message = Message {
            id,
            source_chain: self.chain.clone(),
            destination_chain: destination_chain.to_string(),
            sender: caller,
            destination_address,
            payload,
            token,
        };
        info!(
            "gateway `{}`: emitting message {} for `{}`",
            self.chain, id, destination_chain
        );
        self.outbound.push(message);
        Ok(id)
    }

    /// Number of messages ever emitted; the upper bound for relay cursors.
    pub fn outbound_len(&self) -> u64 {
        self.outbound.len() as u64
    }

    /// The outbound log from `cursor` onwards.
    pub fn outbound_since(&self, cursor: u64) -> Vec<Message> {
        let start = (cursor as usize).min(self.outbound.len());
        self.outbound[start..].to_vec()
    }

    /// Admit an inbound message. Trusted-relayer-only; this is the sole
    /// replay-protection gate: an id that already exists (whatever its
    /// status) is rejected with `AlreadyApproved`.
    pub fn approve(&mut self, caller: Address, message: Message) -> Result<(), GatewayError> {
        if caller != self.relayer {
            return Err(GatewayError::UnauthorizedRelayer(caller));
        }
        if message.destination_chain != self.chain {
            return Err(GatewayError::WrongDestination {
                id: message.id,
                destination_chain: message.destination_chain,
            });
        }
        if self.inbound.contains_key(&message.id) {
            return Err(GatewayError::AlreadyApproved(message.id));
        }
        let id = message.id;
        self.inbound.insert(
            id,
            MessageRecord {
                message,
                status: MessageStatus::Approved,
                updated_at: now(),
            },
        );
        info!("gateway `{}`: approved message {}", self.chain, id);
        Ok(())
    }

    /// Execute an approved message: release the accompanying token to the
    /// executable, invoke it, and record the terminal status. Callable by
    /// anyone; only an `Approved` message can be executed, and only once.
    pub fn execute(
        &mut self,
        ledger: &mut TokenLedger,
        factories: &mut HashMap<Address, PoolFactory>,
        executable: &SwapExecutable,
        id: MessageId,
    ) -> Result<MessageStatus, GatewayError> {
        let record = self
            .inbound
            .get(&id)
            .ok_or(GatewayError::UnknownMessage(id))?;
        if record.status != MessageStatus::Approved {
            return Err(GatewayError::NotExecutable { id, status: record.status });
        }
        let message = record.message.clone();

        let status = match self.dispatch(ledger, factories, executable, &message) {
            Ok(()) => {
                info!("gateway `{}`: executed message {}", self.chain, id);
                MessageStatus::Executed
            }
            Err(err) => {
                // Absorbed into the terminal Failed status; the funds stay
                // locked at the gateway.
                warn!(
                    "gateway `{}`: execution of message {} failed: {}",
                    self.chain, id, err
                );
                MessageStatus::Failed
            }
        };

        let record = self.inbound.get_mut(&id).expect("checked above");
        record.status = status;
        record.updated_at = now();
        Ok(status)
    }

    /// Release the accompanying token and invoke the executable. On a
    /// failed invocation the released token is pulled back into gateway
    /// custody before the error is reported.
    fn dispatch(
        &self,
        ledger: &mut TokenLedger,
        factories: &mut HashMap<Address, PoolFactory>,
        executable: &SwapExecutable,
        message: &Message,
    ) -> Result<(), ExecuteError> {
        match &message.token {
            Some(transfer) => {
                // The gateway is the token authority on its chain, so a
                // bridged-in amount is minted against the supply locked on
                // the source chain.
                ledger.mint(&transfer.symbol, executable.address(), transfer.amount)?;
                let result = executable.execute_with_token(
                    ledger,
                    factories,
                    message.id,
                    &message.source_chain,
                    message.sender,
                    &message.payload,
                    &transfer.symbol,
                    transfer.amount,
                );
                if result.is_err() {
                    if let Err(custody_err) = ledger.transfer(
                        &transfer.symbol,
                        executable.address(),
                        self.address,
                        transfer.amount,
                    ) {
                        warn!(
                            "gateway `{}`: failed to reclaim custody for {}: {}",
                            self.chain, message.id, custody_err
                        );
                    }
                }
                result
            }
            None => executable.execute(
                ledger,
                factories,
                message.id,
                &message.source_chain,
                message.sender,
                &message.payload,
            ),
        }
    }

    /// Status record for an inbound message.
    pub fn message(&self, id: MessageId) -> Option<&MessageRecord> {
        self.inbound.get(&id)
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}
