//! Custodian wire messages.
//!
//! Requests and responses travel as CBOR frames carrying a protocol
//! version. A custodian only ever sees its own request; nothing in these
//! messages reveals what other custodians decided.

use std::fmt;

use ciborium::value::Value;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use seal_core::{AccessPolicyRef, ContentId, Identity, IdentityProof};
use seal_shares::{Share, WrappedShare};

use crate::error::{KeyServerError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Requests a custodian understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CustodianRequest {
    /// Upload path: hold one share for a content item.
    StoreShare {
        content_id: ContentId,
        share: Share,
        policy: AccessPolicyRef,
        owner: Identity,
    },

    /// Read path: release the share to the prover if policy allows.
    RequestShare {
        content_id: ContentId,
        proof: IdentityProof,
    },

    /// Rollback: the owner withdraws a share from a failed upload.
    DiscardShare {
        content_id: ContentId,
        proof: IdentityProof,
    },
}

impl CustodianRequest {
    /// The content item this request is about.
    pub fn content_id(&self) -> &ContentId {
        match self {
            CustodianRequest::StoreShare { content_id, .. }
            | CustodianRequest::RequestShare { content_id, .. }
            | CustodianRequest::DiscardShare { content_id, .. } => content_id,
        }
    }
}

/// Why a custodian with a valid proof in hand refused to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    /// This custodian holds no share for the content item.
    ContentNotFound,
    /// The policy was evaluated and does not admit the requester.
    PolicyNotSatisfied,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::ContentNotFound => f.write_str("content not found"),
            DenyReason::PolicyNotSatisfied => f.write_str("policy not satisfied"),
        }
    }
}

/// Why a custodian refused to even look at the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Signature invalid, stale, or bound to something else.
    BadProof(String),
}

/// A custodian's answer to a share request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseStatus {
    /// The share, wrapped to the requester's session key.
    Granted(WrappedShare),
    Denied(DenyReason),
    Rejected(RejectReason),
}

/// Error codes for custodian responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// Protocol version mismatch.
    VersionMismatch = 1,
    /// Frame too large.
    MessageTooLarge = 2,
    /// Invalid message format.
    InvalidMessage = 3,
    /// A different share is already stored for this content item.
    Conflict = 4,
    /// The caller may not perform this operation.
    Unauthorized = 5,
    /// Internal error on the custodian.
    InternalError = 6,
}

/// Responses a custodian sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodianResponse {
    /// Answer to `RequestShare`.
    Release(ReleaseStatus),
    /// Answer to `StoreShare`; also sent when the same share was already held.
    Stored,
    /// Answer to `DiscardShare`; also sent when there was nothing to discard.
    Discarded,
    /// The request failed.
    Error { code: ErrorCode, message: String },
}

impl CustodianResponse {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        CustodianResponse::Error {
            code,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Frame<T> {
    version: u8,
    body: T,
}

/// Encode a message into a versioned CBOR frame.
pub fn encode_frame<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    let frame = Frame {
        version: PROTOCOL_VERSION,
        body,
    };
    let mut buf = Vec::new();
    ciborium::into_writer(&frame, &mut buf)
        .map_err(|e| KeyServerError::InvalidMessage(e.to_string()))?;
    Ok(buf)
}

/// Decode a versioned CBOR frame of at most `max_bytes`.
///
/// The version is checked before the body is interpreted.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8], max_bytes: usize) -> Result<T> {
    if bytes.len() > max_bytes {
        return Err(KeyServerError::FrameTooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let frame: Frame<Value> =
        ciborium::from_reader(bytes).map_err(|e| KeyServerError::InvalidMessage(e.to_string()))?;
    if frame.version != PROTOCOL_VERSION {
        return Err(KeyServerError::VersionMismatch {
            local: PROTOCOL_VERSION,
            peer: frame.version,
        });
    }

    frame
        .body
        .deserialized()
        .map_err(|e| KeyServerError::InvalidMessage(e.to_string()))
}
