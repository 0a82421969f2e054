//! Stealth address derivation (sender side) and recovery (recipient side).

use serde::{Deserialize, Serialize};

use cloak_core::error::{CloakError, Result};
use cloak_core::types::{Announcement, EthAddress, StealthAddress, StealthMetaAddress, ViewingKey};
use cloak_crypto::{
    compute_commitment, compute_shared_secret, compute_view_tag, derive_stealth_address,
    generate_keypair, parse_public_key, verify_commitment, verify_view_tag,
};

/// Derives one-time addresses for recipients and recognises them again.
///
/// Stateless: every call to [`generate`](Self::generate) draws a fresh
/// ephemeral key, and the ephemeral secret is dropped (zeroized) before the
/// call returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct StealthAddressDeriver;

impl StealthAddressDeriver {
    /// Creates a deriver.
    pub fn new() -> Self {
        Self
    }

    /// Generates a fresh stealth address for a recipient meta-address.
    ///
    /// # Errors
    /// `InvalidKeyFormat` if either recipient key is not a valid curve point.
    pub fn generate(&self, recipient: &StealthMetaAddress) -> Result<StealthAddress> {
        let ephemeral = generate_keypair();
        let shared_secret = compute_shared_secret(&ephemeral.secret, &recipient.viewing_pk)?;

        let view_tag = compute_view_tag(&shared_secret);
        let address = derive_stealth_address(&recipient.spending_pk, &shared_secret)?;
        let commitment = compute_commitment(&address, &ephemeral.public);

        Ok(StealthAddress::new(
            address,
            ephemeral.public,
            view_tag,
            commitment,
        ))
    }

    /// Generates a stealth address from a raw recipient public key.
    ///
    /// Accepts a 33/65-byte SEC1 key (single-key recipient, the key serves
    /// both roles) or a 66-byte meta-address.
    ///
    /// # Errors
    /// - `RecipientKeyRequired` for empty input
    /// - `InvalidKeyFormat` for anything that does not decode
    pub fn generate_for_key(&self, recipient_public_key: &[u8]) -> Result<StealthAddress> {
        if recipient_public_key.is_empty() {
            return Err(CloakError::RecipientKeyRequired);
        }
        let meta = parse_recipient(recipient_public_key)?;
        self.generate(&meta)
    }

    /// Recomputes the stealth address an announcement would carry if it
    /// were addressed to `viewing_key`.
    ///
    /// Returns `Ok(None)` when the view tag does not match; no address
    /// derivation happens in that case. A `Some` result still has to be
    /// compared against the announced address to rule out the 1/256 view
    /// tag false positives.
    ///
    /// # Errors
    /// `InvalidKeyFormat` if the ephemeral key does not decode.
    pub fn recover_if_mine(
        &self,
        viewing_key: &ViewingKey,
        ephemeral_pub_key: &[u8],
        observed_view_tag: u8,
    ) -> Result<Option<StealthAddress>> {
        let ephemeral = parse_public_key(ephemeral_pub_key)?;
        let shared_secret = compute_shared_secret(&viewing_key.viewing_sk, &ephemeral)?;

        if !verify_view_tag(&shared_secret, observed_view_tag) {
            return Ok(None);
        }

        let address = derive_stealth_address(&viewing_key.spending_pk, &shared_secret)?;
        let commitment = compute_commitment(&address, &ephemeral);
        Ok(Some(StealthAddress::new(
            address,
            ephemeral,
            observed_view_tag,
            commitment,
        )))
    }

    /// Full check that `announced` was derived for `viewing_key`, including
    /// its commitment.
    pub fn verify_stealth_address(&self, viewing_key: &ViewingKey, announced: &StealthAddress) -> Result<bool> {
        let recovered = self.recover_if_mine(
            viewing_key,
            announced.ephemeral_pub_key.as_bytes(),
            announced.view_tag,
        )?;
        Ok(match recovered {
            Some(r) => {
                r.address == announced.address
                    && verify_commitment(
                        &announced.address,
                        &announced.ephemeral_pub_key,
                        &announced.commitment,
                    )
            }
            None => false,
        })
    }
}

/// Decodes a recipient given as SEC1 key bytes or meta-address bytes.
fn parse_recipient(bytes: &[u8]) -> Result<StealthMetaAddress> {
    match bytes.len() {
        33 | 65 => Ok(StealthMetaAddress::single_key(parse_public_key(bytes)?)),
        66 => {
            let meta = StealthMetaAddress::from_bytes(bytes)
                .map_err(|e| CloakError::InvalidKeyFormat(e.to_string()))?;
            Ok(StealthMetaAddress::new(
                parse_public_key(meta.spending_pk.as_bytes())?,
                parse_public_key(meta.viewing_pk.as_bytes())?,
            ))
        }
        n => Err(CloakError::InvalidKeyFormat(format!(
            "recipient key of {} bytes is neither a public key nor a meta-address",
            n
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAYMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Stealth payment: address to send to and announcement to publish.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StealthPayment {
    /// Derived stealth address and its announcement data
    pub stealth: StealthAddress,
    /// The announcement to publish
    pub announcement: Announcement,
    /// Off-chain notes about the payment
    pub metadata: PaymentMetadata,
}

/// Off-chain notes about a stealth payment. Never published.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaymentMetadata {
    /// Payment amount (informational only)
    pub amount: Option<String>,
    /// Payment token (e.g., "ETH", "USDC")
    pub token: Option<String>,
    /// Optional memo
    pub memo: Option<String>,
}

/// Creates a stealth payment for a recipient.
pub fn create_stealth_payment(
    recipient: &StealthMetaAddress,
    caller: EthAddress,
) -> Result<StealthPayment> {
    StealthPaymentBuilder::new()
        .recipient(*recipient)
        .caller(caller)
        .build()
}

/// Builder for stealth payments with optional notes and metadata bytes.
#[derive(Default)]
pub struct StealthPaymentBuilder {
    recipient: Option<StealthMetaAddress>,
    caller: Option<EthAddress>,
    extra_metadata: Vec<u8>,
    amount: Option<String>,
    token: Option<String>,
    memo: Option<String>,
}

impl StealthPaymentBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipient (required).
    pub fn recipient(mut self, meta: StealthMetaAddress) -> Self {
        self.recipient = Some(meta);
        self
    }

    /// Sets the account that will publish the announcement.
    pub fn caller(mut self, caller: EthAddress) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Appends opaque bytes after the view tag and commitment.
    pub fn extra_metadata(mut self, bytes: Vec<u8>) -> Self {
        self.extra_metadata = bytes;
        self
    }

    /// Records the amount.
    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    /// Records the token symbol.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Records a memo.
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Derives the stealth address and assembles the payment.
    pub fn build(self) -> Result<StealthPayment> {
        let recipient = self.recipient.ok_or(CloakError::RecipientKeyRequired)?;
        let stealth = StealthAddressDeriver::new().generate(&recipient)?;

        let mut announcement =
            Announcement::for_stealth_address(&stealth, self.caller.unwrap_or_default());
        announcement.metadata.extend_from_slice(&self.extra_metadata);

        Ok(StealthPayment {
            stealth,
            announcement,
            metadata: PaymentMetadata {
                amount: self.amount,
                token: self.token,
                memo: self.memo,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::constants::SCHEME_ID_SECP256K1;
    use cloak_core::types::StealthKeys;
    use cloak_crypto::{
        derive_stealth_secret_key, eth_address_from_secret, generate_keypair_with_rng,
        generate_stealth_keys,
    };
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_generate_then_recover() {
        let keys = generate_stealth_keys();
        let deriver = StealthAddressDeriver::new();

        let stealth = deriver.generate(&keys.meta_address()).unwrap();
        let recovered = deriver
            .recover_if_mine(
                &keys.viewing_key(),
                stealth.ephemeral_pub_key.as_bytes(),
                stealth.view_tag,
            )
            .unwrap()
            .expect("view tag matches");

        assert_eq!(recovered, stealth);
    }

    #[test]
    fn test_generate_is_fresh_each_call() {
        let keys = generate_stealth_keys();
        let deriver = StealthAddressDeriver::new();

        let a = deriver.generate(&keys.meta_address()).unwrap();
        let b = deriver.generate(&keys.meta_address()).unwrap();
        assert_ne!(a.address, b.address);
        assert_ne!(a.ephemeral_pub_key, b.ephemeral_pub_key);
    }

    #[test]
    fn test_wrong_view_tag_returns_none() {
        let keys = generate_stealth_keys();
        let deriver = StealthAddressDeriver::new();
        let stealth = deriver.generate(&keys.meta_address()).unwrap();

        let result = deriver
            .recover_if_mine(
                &keys.viewing_key(),
                stealth.ephemeral_pub_key.as_bytes(),
                stealth.view_tag.wrapping_add(1),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_other_recipient_does_not_recover_address() {
        let alice = generate_stealth_keys();
        let bob = generate_stealth_keys();
        let deriver = StealthAddressDeriver::new();
        let stealth = deriver.generate(&alice.meta_address()).unwrap();

        let result = deriver
            .recover_if_mine(&bob.viewing_key(), stealth.ephemeral_pub_key.as_bytes(), stealth.view_tag)
            .unwrap();
        // A 1/256 tag collision still yields a different address
        if let Some(r) = result {
            assert_ne!(r.address, stealth.address);
        }
        assert!(!deriver.verify_stealth_address(&bob.viewing_key(), &stealth).unwrap());
    }

    #[test]
    fn test_generate_for_key_empty() {
        let result = StealthAddressDeriver::new().generate_for_key(&[]);
        assert!(matches!(result, Err(CloakError::RecipientKeyRequired)));
    }

    #[test]
    fn test_generate_for_key_malformed() {
        let result = StealthAddressDeriver::new().generate_for_key(&[0x02; 12]);
        assert!(matches!(result, Err(CloakError::InvalidKeyFormat(_))));

        let mut off_curve = [0xFFu8; 33];
        off_curve[0] = 0x02;
        let result = StealthAddressDeriver::new().generate_for_key(&off_curve);
        assert!(matches!(result, Err(CloakError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_generate_for_single_key_recipient() {
        let keypair = cloak_crypto::generate_keypair();
        let deriver = StealthAddressDeriver::new();
        let stealth = deriver.generate_for_key(keypair.public.as_bytes()).unwrap();

        let vk = ViewingKey::new(keypair.secret.clone(), keypair.public);
        assert!(deriver.verify_stealth_address(&vk, &stealth).unwrap());
    }

    #[test]
    fn test_recover_rejects_malformed_ephemeral_key() {
        let keys = generate_stealth_keys();
        let result = StealthAddressDeriver::new().recover_if_mine(&keys.viewing_key(), &[1, 2, 3], 0);
        assert!(matches!(result, Err(CloakError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_verify_detects_commitment_tampering() {
        let keys = generate_stealth_keys();
        let deriver = StealthAddressDeriver::new();
        let mut stealth = deriver.generate(&keys.meta_address()).unwrap();
        assert!(deriver.verify_stealth_address(&keys.viewing_key(), &stealth).unwrap());

        stealth.commitment[0] ^= 0x01;
        assert!(!deriver.verify_stealth_address(&keys.viewing_key(), &stealth).unwrap());
    }

    #[test]
    fn test_recipient_can_spend() {
        let keys = generate_stealth_keys();
        let stealth = StealthAddressDeriver::new().generate(&keys.meta_address()).unwrap();

        let ss = compute_shared_secret(&keys.viewing.secret, &stealth.ephemeral_pub_key).unwrap();
        let spend_key = derive_stealth_secret_key(&keys.spending.secret, &ss).unwrap();
        assert_eq!(eth_address_from_secret(&spend_key).unwrap(), stealth.address);
    }

    #[test]
    fn test_payment_builder() {
        let keys = generate_stealth_keys();
        let caller = EthAddress::from_array([0x42; 20]);
        let payment = StealthPaymentBuilder::new()
            .recipient(keys.meta_address())
            .caller(caller)
            .extra_metadata(vec![0xEE, 0xFF])
            .amount("1.5")
            .token("ETH")
            .build()
            .unwrap();

        let ann = &payment.announcement;
        assert_eq!(ann.scheme_id, SCHEME_ID_SECP256K1);
        assert_eq!(ann.caller, caller);
        assert_eq!(ann.stealth_address, payment.stealth.address);
        assert_eq!(ann.view_tag(), Some(payment.stealth.view_tag));
        assert_eq!(ann.commitment(), Some(payment.stealth.commitment));
        assert_eq!(&ann.metadata[33..], &[0xEE, 0xFF]);
        assert_eq!(payment.metadata.token.as_deref(), Some("ETH"));
    }

    #[test]
    fn test_payment_builder_requires_recipient() {
        let result = StealthPaymentBuilder::new().build();
        assert!(matches!(result, Err(CloakError::RecipientKeyRequired)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_generated_addresses_are_recoverable(seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let keys = StealthKeys::new(
                generate_keypair_with_rng(&mut rng),
                generate_keypair_with_rng(&mut rng),
            );
            let deriver = StealthAddressDeriver::new();
            let stealth = deriver.generate(&keys.meta_address()).unwrap();
            let recovered = deriver
                .recover_if_mine(&keys.viewing_key(), stealth.ephemeral_pub_key.as_bytes(), stealth.view_tag)
                .unwrap();
            prop_assert_eq!(recovered, Some(stealth));
        }
    }
}
