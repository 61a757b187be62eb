//! Chain-facing plumbing: the chain and attestation client interfaces, a
//! JSON-RPC multiplexer implementing them, and a simulated chain.

pub mod attestation;
pub mod chain;
pub mod mock;
pub mod rpc;

pub use attestation::{poll_attestation, AttestationService, AttestationStatus};
pub use chain::{
    ChainClient, ChainError, Confirmation, RedeemableClaim, Transaction, TxHash, TxPayload,
};
pub use mock::{mock_attestation, MockAttestationService, MockChainClient, SubmitFault};
pub use rpc::{
    ChannelTransport, RpcChainClient, RpcErrorObject, RpcMultiplexer, RpcRequest, RpcResponse,
    RpcTransport,
};
