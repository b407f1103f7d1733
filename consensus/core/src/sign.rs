use crate::{Hash, event::MutableEvent};
use secp256k1::{Keypair, Message, XOnlyPublicKey, schnorr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signature length {0} is not 64")]
    SigLength(usize),

    #[error("Secp256k1 -> {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Signs `hash` with schnorr and returns the 64 signature bytes
pub fn sign_hash(hash: Hash, keypair: &Keypair) -> Vec<u8> {
    let msg = Message::from_digest(hash.as_bytes());
    let sig: [u8; 64] = *keypair.sign_schnorr(msg).as_ref();
    sig.to_vec()
}

/// Signs the event in place
pub fn sign_event(event: &mut MutableEvent, keypair: &Keypair) {
    event.signature = sign_hash(event.signing_hash(), keypair);
}

pub fn parse_pubkey(pubkey: &[u8]) -> Result<XOnlyPublicKey, SignError> {
    Ok(XOnlyPublicKey::from_slice(pubkey)?)
}

pub fn pubkey_bytes(keypair: &Keypair) -> Vec<u8> {
    keypair.x_only_public_key().0.serialize().to_vec()
}

pub fn verify_hash(hash: Hash, signature: &[u8], pubkey: &XOnlyPublicKey) -> Result<(), SignError> {
    if signature.len() != 64 {
        return Err(SignError::SigLength(signature.len()));
    }
    let sig = schnorr::Signature::from_slice(signature)?;
    let msg = Message::from_digest(hash.as_bytes());
    Ok(sig.verify(&msg, pubkey)?)
}

/// Generates a fresh random keypair
pub fn generate_keypair() -> Keypair {
    Keypair::new(secp256k1::SECP256K1, &mut rand::thread_rng())
}
