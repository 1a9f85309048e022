//! Solidity interfaces read by the engine.

use alloy_sol_types::sol;

sol! {
	/// EIP-2612 surface of an ERC-20 token.
	interface IERC20Permit {
		function DOMAIN_SEPARATOR() external view returns (bytes32);
		function nonces(address owner) external view returns (uint256);
		function name() external view returns (string);
		function version() external view returns (string);
	}

	/// Permit2 allowance and unordered-nonce state.
	interface IPermit2 {
		function allowance(address user, address token, address spender)
			external
			view
			returns (uint160 amount, uint48 expiration, uint48 nonce);
		function nonceBitmap(address owner, uint256 wordPos) external view returns (uint256);
	}
}
