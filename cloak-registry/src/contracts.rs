//! Solidity bindings for the ERC-5564 announcer.

use alloy::sol;

sol! {
    /// The ERC-5564 announcer singleton.
    #[derive(Debug, PartialEq, Eq)]
    interface IERC5564Announcer {
        /// Emitted for every stealth payment.
        event Announcement(
            uint256 indexed schemeId,
            address indexed stealthAddress,
            address indexed caller,
            bytes ephemeralPubKey,
            bytes metadata
        );

        /// Publishes an announcement.
        function announce(
            uint256 schemeId,
            address stealthAddress,
            bytes memory ephemeralPubKey,
            bytes memory metadata
        ) external;
    }
}
