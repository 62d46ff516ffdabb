pub mod counters;
pub mod domain;
pub mod gateway;
pub mod memory;
pub mod policy;
pub mod ports;

pub use counters::{CounterEngine, Outcome, TriggerEvent, TriggerKind};
pub use domain::{Caller, DocPath, Fields, MembershipRole, Resource, VoteDirection, VoteTarget};
pub use gateway::{DocumentGateway, GatewayError, GatewayResult};
pub use memory::InMemoryDocumentStore;
pub use policy::{authorize, Ancestors, Decision, DenyReason, Operation, Request};
pub use ports::{DocumentStore, IdentityService, PortError, PortResult};
