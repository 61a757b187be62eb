//! Pedersen commitments to trade amounts over secp256k1.
//!
//! `C = a·G + r·H`, where `G` is the curve generator and `H` is a second
//! generator derived by hash-and-increment so that nobody knows `log_G(H)`.
//! The scheme is hiding (a fresh `r` masks `a`), binding (opening to a
//! different amount requires solving a discrete log) and additively
//! homomorphic: summing commitments yields a commitment to the summed
//! amounts under the summed randomness.
//!
//! Only the [`SealedCommitment`] ever leaves the process before the reveal
//! stage. Amounts and [`Randomness`] are disclosed only when a netting round
//! is revealed.

use cosmwasm_std::{Binary, Uint256};
use k256::elliptic_curve::ff::PrimeField;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar, U256};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::CommitmentError;

const GENERATOR_H_DOMAIN: &[u8] = b"intent-settle/pedersen/generator-h/v1";

lazy_static! {
    static ref GENERATOR_H: ProjectivePoint = derive_generator_h();
}

/// Hash-and-increment onto the curve: the first candidate x-coordinate
/// that decompresses to a valid point becomes `H`.
fn derive_generator_h() -> ProjectivePoint {
    let g = ProjectivePoint::GENERATOR.to_affine().to_encoded_point(true);
    let mut counter: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(GENERATOR_H_DOMAIN);
        hasher.update(g.as_bytes());
        hasher.update(counter.to_be_bytes());
        let digest = hasher.finalize();

        let mut candidate = [0u8; 33];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&digest);

        if let Ok(encoded) = EncodedPoint::from_bytes(candidate) {
            let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
            if let Some(point) = point {
                return ProjectivePoint::from(point);
            }
        }
        counter = counter.wrapping_add(1);
    }
}

/// 32-byte secret blinding factor. Generated fresh per commitment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Randomness([u8; 32]);

impl Randomness {
    /// Draw 32 bytes from the operating system RNG.
    pub fn generate() -> Result<Self, CommitmentError> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| CommitmentError::RandomnessUnavailable(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_scalar(&self) -> Scalar {
        <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(self.0))
    }
}

impl fmt::Debug for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Randomness(..)")
    }
}

/// Public half of a commitment: the SEC1-compressed point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedCommitment(Binary);

impl SealedCommitment {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Binary::from(bytes.into()))
    }

    pub fn from_hex(value: &str) -> Result<Self, CommitmentError> {
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| CommitmentError::MalformedCommitment(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// `0x`-prefixed hex form used on the wire next to the raw bytes.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }

    fn from_point(point: ProjectivePoint) -> Self {
        Self::from_bytes(point.to_affine().to_encoded_point(true).as_bytes().to_vec())
    }

    fn to_point(&self) -> Result<ProjectivePoint, CommitmentError> {
        let encoded = EncodedPoint::from_bytes(self.as_bytes())
            .map_err(|e| CommitmentError::MalformedCommitment(e.to_string()))?;
        let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        point
            .map(ProjectivePoint::from)
            .ok_or_else(|| CommitmentError::MalformedCommitment("point not on curve".to_string()))
    }
}

/// A commitment together with its blinding factor, held by the committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    sealed: SealedCommitment,
    randomness: Randomness,
}

impl Commitment {
    pub fn sealed(&self) -> &SealedCommitment {
        &self.sealed
    }

    pub fn randomness(&self) -> &Randomness {
        &self.randomness
    }

    pub fn to_hex(&self) -> String {
        self.sealed.to_hex()
    }

    pub fn into_parts(self) -> (SealedCommitment, Randomness) {
        (self.sealed, self.randomness)
    }
}

/// Map an amount into the scalar field. Amounts at or above the group
/// order have no unique representative and are rejected.
fn amount_scalar(amount: Uint256) -> Result<Scalar, CommitmentError> {
    let repr = FieldBytes::from(amount.to_be_bytes());
    Option::<Scalar>::from(Scalar::from_repr(repr)).ok_or_else(|| {
        CommitmentError::InvalidAmount(format!("{amount} exceeds the commitment domain"))
    })
}

fn pedersen(amount: Scalar, blinding: Scalar) -> ProjectivePoint {
    ProjectivePoint::GENERATOR * amount + *GENERATOR_H * blinding
}

/// Parse a decimal base-unit amount for committing.
pub fn parse_amount(value: &str) -> Result<Uint256, CommitmentError> {
    intent_settle_types::parse_amount(value)
        .map_err(|e| CommitmentError::InvalidAmount(e.to_string()))
}

/// Commit to `amount`. Fresh randomness is drawn when none is supplied.
pub fn commit(
    amount: Uint256,
    randomness: Option<Randomness>,
) -> Result<Commitment, CommitmentError> {
    let a = amount_scalar(amount)?;
    let randomness = match randomness {
        Some(r) => r,
        None => Randomness::generate()?,
    };
    let sealed = SealedCommitment::from_point(pedersen(a, randomness.to_scalar()));
    Ok(Commitment { sealed, randomness })
}

/// Check that `(amount, randomness)` opens `commitment`. Malformed input of
/// any kind yields `false`.
pub fn verify(commitment: &SealedCommitment, amount: Uint256, randomness: &[u8]) -> bool {
    let Ok(bytes) = <[u8; 32]>::try_from(randomness) else {
        return false;
    };
    let Ok(a) = amount_scalar(amount) else {
        return false;
    };
    let expected = SealedCommitment::from_point(pedersen(a, Randomness(bytes).to_scalar()));
    expected.as_bytes() == commitment.as_bytes()
}

/// Homomorphic sum of commitments.
pub fn aggregate<'a, I>(commitments: I) -> Result<SealedCommitment, CommitmentError>
where
    I: IntoIterator<Item = &'a SealedCommitment>,
{
    let mut sum = ProjectivePoint::IDENTITY;
    for commitment in commitments {
        sum += commitment.to_point()?;
    }
    Ok(SealedCommitment::from_point(sum))
}

/// Check that an aggregate commitment opens to the sum of `openings`
/// (amounts and randomness both summed modulo the group order).
pub fn verify_aggregate(aggregate: &SealedCommitment, openings: &[(Uint256, Randomness)]) -> bool {
    let mut amount_sum = Scalar::ZERO;
    let mut blinding_sum = Scalar::ZERO;
    for (amount, randomness) in openings {
        let Ok(a) = amount_scalar(*amount) else {
            return false;
        };
        amount_sum += a;
        blinding_sum += randomness.to_scalar();
    }
    let expected = SealedCommitment::from_point(pedersen(amount_sum, blinding_sum));
    expected.as_bytes() == aggregate.as_bytes()
}
