//! Conditional Token Vault
//!
//! Each proposal carries two vaults, one per underlying asset. A vault
//! escrows the regular token and issues two conditional token types against
//! it: pass-conditionals and fail-conditionals, always minted 1:1 in pairs.
//!
//! ## Invariant
//!
//! While a vault is `Active`:
//!
//! ```text
//! escrow == outstanding(pass conditionals) == outstanding(fail conditionals)
//! ```
//!
//! A split moves all three up by the same amount; a merge moves all three
//! down by the same amount. Once `Finalized`, only the winning conditional
//! type is redeemable, 1:1, depleting escrow; the losing type is permanently
//! worthless.

use anchor_lang::prelude::*;

use crate::state::Side;

/// Which underlying asset a vault escrows
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum VaultAsset {
    Base,
    Quote,
}

/// Vault lifecycle status
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub enum VaultStatus {
    /// Escrow account not yet created
    #[default]
    Uninitialized,
    /// Open for splits and merges
    Active,
    /// Proposal decided; winning conditionals redeemable
    Finalized,
}

/// Per-asset conditional token vault, embedded in the proposal account
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, InitSpace, Debug, Default,
)]
pub struct VaultState {
    /// Lifecycle status
    pub status: VaultStatus,

    /// Amount of the regular token held, backing all outstanding conditionals
    pub escrow: u64,

    /// Outstanding pass-conditional supply
    pub pass_supply: u64,

    /// Outstanding fail-conditional supply
    pub fail_supply: u64,
}

impl VaultState {
    /// Open the vault for deposits. Valid exactly once.
    pub fn activate(&mut self) -> Result<()> {
        require!(
            self.status == VaultStatus::Uninitialized,
            VaultError::VaultAlreadyActive
        );
        self.status = VaultStatus::Active;
        Ok(())
    }

    /// Deposit `amount` of the regular token, minting `amount` of each
    /// conditional type.
    pub fn split(&mut self, amount: u64) -> Result<()> {
        require!(self.status == VaultStatus::Active, VaultError::VaultNotActive);
        require_gt!(amount, 0, VaultError::ZeroAmount);

        self.escrow = self.escrow.checked_add(amount).ok_or(VaultError::Overflow)?;
        self.pass_supply = self
            .pass_supply
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        self.fail_supply = self
            .fail_supply
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;

        self.invariant()
    }

    /// Burn `amount` of each conditional type, releasing `amount` of the
    /// regular token from escrow.
    pub fn merge(&mut self, amount: u64) -> Result<()> {
        require!(self.status == VaultStatus::Active, VaultError::VaultNotActive);
        require_gt!(amount, 0, VaultError::ZeroAmount);
        require_gte!(
            self.pass_supply,
            amount,
            VaultError::InsufficientConditionalTokens
        );
        require_gte!(
            self.fail_supply,
            amount,
            VaultError::InsufficientConditionalTokens
        );

        self.escrow -= amount;
        self.pass_supply -= amount;
        self.fail_supply -= amount;

        self.invariant()
    }

    /// Stop splits and merges; winning conditionals become redeemable.
    pub fn finalize(&mut self) -> Result<()> {
        require!(self.status == VaultStatus::Active, VaultError::VaultNotActive);
        self.status = VaultStatus::Finalized;
        Ok(())
    }

    /// Burn `amount` of the winning conditional type, releasing `amount` of
    /// the regular token from escrow. Only valid once finalized.
    pub fn redeem(&mut self, amount: u64, winner: Side) -> Result<()> {
        require!(
            self.status == VaultStatus::Finalized,
            VaultError::VaultNotFinalized
        );
        if amount == 0 {
            return Ok(());
        }

        let winning_supply = match winner {
            Side::Pass => &mut self.pass_supply,
            Side::Fail => &mut self.fail_supply,
        };
        require_gte!(
            *winning_supply,
            amount,
            VaultError::InsufficientConditionalTokens
        );
        require_gte!(self.escrow, amount, VaultError::InsufficientEscrow);

        *winning_supply -= amount;
        self.escrow -= amount;

        Ok(())
    }

    /// Conservation check, run as a post-condition after every mutation.
    pub fn invariant(&self) -> Result<()> {
        if self.status == VaultStatus::Active {
            require_eq!(self.escrow, self.pass_supply, VaultError::AssertFailed);
            require_eq!(self.escrow, self.fail_supply, VaultError::AssertFailed);
        }
        Ok(())
    }
}

/// A merge only ever moves equal amounts of both conditional types, so it is
/// only offered up to the minimum of the caller's two balances. Callers must
/// never have an asymmetric partial merge silently performed for them.
pub fn ensure_balances_for_merge(
    pass_balance: u64,
    fail_balance: u64,
    amount: u64,
) -> Result<()> {
    require_gte!(
        pass_balance,
        amount,
        VaultError::InsufficientConditionalTokens
    );
    require_gte!(
        fail_balance,
        amount,
        VaultError::InsufficientConditionalTokens
    );
    Ok(())
}

#[error_code]
pub enum VaultError {
    #[msg("Vault is not active")]
    VaultNotActive,
    #[msg("Vault has already been activated")]
    VaultAlreadyActive,
    #[msg("Vault is not finalized")]
    VaultNotFinalized,
    #[msg("Amount must be greater than zero")]
    ZeroAmount,
    #[msg("Insufficient conditional token balance")]
    InsufficientConditionalTokens,
    #[msg("Insufficient underlying token balance")]
    InsufficientUnderlyingTokens,
    #[msg("Escrow cannot cover redemption")]
    InsufficientEscrow,
    #[msg("Arithmetic overflow")]
    Overflow,
    #[msg("Vault conservation check failed")]
    AssertFailed,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn active_vault() -> VaultState {
        let mut vault = VaultState::default();
        vault.activate().unwrap();
        vault
    }

    #[test]
    fn test_split_mints_both_sides() {
        let mut vault = active_vault();
        vault.split(1000).unwrap();

        assert_eq!(vault.escrow, 1000);
        assert_eq!(vault.pass_supply, 1000);
        assert_eq!(vault.fail_supply, 1000);
    }

    #[test]
    fn test_conservation_over_sequences() {
        let mut vault = active_vault();
        vault.split(1000).unwrap();
        vault.split(500).unwrap();
        vault.merge(300).unwrap();
        vault.split(42).unwrap();
        vault.merge(1242).unwrap();

        assert_eq!(vault.escrow, vault.pass_supply);
        assert_eq!(vault.escrow, vault.fail_supply);
        assert_eq!(vault.escrow, 0);
    }

    #[test]
    fn test_merge_never_creates_tokens() {
        let mut vault = active_vault();
        vault.split(100).unwrap();

        // outstanding supply is 100 on each side; merging more must fail
        assert!(vault.merge(101).is_err());
        assert_eq!(vault.escrow, 100);
    }

    #[test]
    fn test_merge_requires_both_balances() {
        // a holder with 100 pass / 60 fail can merge at most 60
        ensure_balances_for_merge(100, 60, 60).unwrap();
        assert!(ensure_balances_for_merge(100, 60, 70).is_err());
    }

    #[test]
    fn test_split_requires_active() {
        let mut vault = VaultState::default();
        assert!(vault.split(10).is_err());

        vault.activate().unwrap();
        vault.split(10).unwrap();
        vault.finalize().unwrap();
        assert!(vault.split(10).is_err());
        assert!(vault.merge(10).is_err());
    }

    #[test]
    fn test_redeem_winning_side_only() {
        let mut vault = active_vault();
        vault.split(1000).unwrap();
        vault.finalize().unwrap();

        vault.redeem(600, Side::Pass).unwrap();
        assert_eq!(vault.escrow, 400);
        assert_eq!(vault.pass_supply, 400);
        // the losing supply is untouched and permanently worthless
        assert_eq!(vault.fail_supply, 1000);

        vault.redeem(400, Side::Pass).unwrap();
        assert_eq!(vault.escrow, 0);

        // nothing left to redeem against
        assert!(vault.redeem(1, Side::Pass).is_err());
    }

    #[test]
    fn test_redeem_requires_finalized() {
        let mut vault = active_vault();
        vault.split(100).unwrap();
        assert!(vault.redeem(100, Side::Pass).is_err());
    }
}
