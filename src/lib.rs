pub mod address;
pub mod energy;
pub mod error;
pub mod inout;
pub mod netblock;
pub mod shard;
pub mod timebucket;
