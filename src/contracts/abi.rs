//! ABI bindings for the deployed Cresca contracts.

use alloy::sol;

sol! {
    /// Instant payment as stored by CrescaPayments.
    #[derive(Debug, PartialEq, Eq)]
    struct Payment {
        address from;
        address to;
        uint256 amount;
        uint256 timestamp;
        string memo;
        bool completed;
    }

    /// Scheduled payment as stored by CrescaCalendarPayments.
    #[derive(Debug, PartialEq, Eq)]
    struct Schedule {
        address payer;
        address recipient;
        uint256 amount;
        uint256 executeAt;
        uint256 intervalSeconds;
        uint256 occurrences;
        uint256 executedCount;
        bool active;
        uint256 escrowBalance;
        uint256 createdAt;
    }

    /// Weighted asset basket as stored by CrescaBucketProtocol.
    #[derive(Debug, PartialEq, Eq)]
    struct BucketInfo {
        address[] assets;
        uint64[] weights;
        uint8 leverage;
        address owner;
        bool exists;
    }

    /// Leveraged position as stored by CrescaBucketProtocol.
    #[derive(Debug, PartialEq, Eq)]
    struct PositionInfo {
        uint64 bucketId;
        bool isLong;
        uint256 margin;
        uint256 entryPrice;
        address owner;
        bool active;
        uint256 openTimestamp;
    }

    interface ICrescaPayments {
        function sendPayment(address to, string memo) external payable returns (bytes32);
        function tapToPay(address to) external payable returns (bool);
        function batchSend(address[] recipients, uint256[] amounts) external payable returns (bool);
        function getSentPayments(address user) external view returns (Payment[]);
        function getReceivedPayments(address user) external view returns (Payment[]);
        function getPaymentCount(address user) external view returns (uint256 sent, uint256 received);
        function getUserVolume(address user) external view returns (uint256 sentVolume, uint256 receivedVolume);
    }

    interface ICrescaCalendarPayments {
        function createSchedule(address recipient, uint256 amount, uint256 executeAt, uint256 intervalSeconds, uint256 occurrences) external payable returns (uint256);
        function executeSchedule(address payer, uint256 scheduleId) external returns (bool);
        function cancelSchedule(uint256 scheduleId) external;
        function getUserSchedules(address user) external view returns (Schedule[]);
        function isExecutable(address payer, uint256 scheduleId) external view returns (bool);
        function getNextExecutionTime(address payer, uint256 scheduleId) external view returns (uint256);
        function getTotalEscrowed(address user) external view returns (uint256);
    }

    interface ICrescaBucketProtocol {
        function createBucket(address[] assets, uint64[] weights, uint8 leverage) external returns (uint64);
        function openPosition(uint64 bucketId, bool isLong, uint256 margin) external returns (uint256);
        function closePosition(uint256 positionId) external returns (int256);
        function depositCollateral() external payable;
        function withdrawCollateral(uint256 amount) external;
        function rebalanceBucket(uint64 bucketId, uint64[] newWeights) external;
        function getCollateralBalance(address user) external view returns (uint256);
        function getUserBuckets(address user) external view returns (BucketInfo[]);
        function getUserPositions(address user) external view returns (PositionInfo[]);
        function getUnrealizedPnL(address owner, uint256 positionId) external view returns (int256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn test_selectors_match_deployed_abi() {
        assert_eq!(ICrescaPayments::sendPaymentCall::SIGNATURE, "sendPayment(address,string)");
        assert_eq!(
            ICrescaCalendarPayments::createScheduleCall::SIGNATURE,
            "createSchedule(address,uint256,uint256,uint256,uint256)"
        );
        assert_eq!(
            ICrescaBucketProtocol::createBucketCall::SIGNATURE,
            "createBucket(address[],uint64[],uint8)"
        );
    }

    #[test]
    fn test_tuple_array_return_decodes() {
        let payments = vec![Payment {
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            amount: U256::from(5u64),
            timestamp: U256::from(1_700_000_000u64),
            memo: "lunch".to_string(),
            completed: true,
        }];
        let encoded = ICrescaPayments::getSentPaymentsCall::abi_encode_returns(&payments);
        let decoded = ICrescaPayments::getSentPaymentsCall::abi_decode_returns(&encoded).unwrap();
        assert_eq!(decoded, payments);
    }
}
