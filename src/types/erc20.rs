use alloy::sol;

sol! {
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 amount);

        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Distributor contract sending both the faucet token and the native asset in one call.
    #[derive(Debug)]
    interface ITokenDistributor {
        function distributeTokensAndEth(address recipient, uint256 tokenAmount, uint256 ethAmount) external;
    }
}
