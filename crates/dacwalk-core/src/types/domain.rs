//! App domain types.

use super::Address;

/// Summary of the runtime's app-domain store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppDomainStore
{
    /// The shared domain
    pub shared_domain: Address,
    /// The system domain
    pub system_domain: Address,
    /// Number of user app domains
    pub domain_count: i32,
}

/// Handle to one app domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppDomain
{
    /// App domain object address
    pub address: Address,
    /// Domain id
    pub id: u32,
    /// Security descriptor
    pub security_descriptor: Address,
    /// Low frequency loader heap
    pub low_frequency_heap: Address,
    /// High frequency loader heap
    pub high_frequency_heap: Address,
    /// Stub loader heap
    pub stub_heap: Address,
    /// Domain local block
    pub domain_local_block: Address,
    /// Domain local module table
    pub domain_local_modules: Address,
    /// Number of loaded assemblies
    pub assembly_count: i32,
    /// Number of assemblies that failed to load
    pub failed_assembly_count: i32,
    /// Raw domain stage
    pub stage: i32,
}
