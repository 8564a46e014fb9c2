pub mod gateway_failover;
pub mod http_gateway;
pub mod memory_network;

pub use gateway_failover::GatewayFailover;
pub use http_gateway::HttpGateway;
pub use memory_network::MemoryContentNetwork;
