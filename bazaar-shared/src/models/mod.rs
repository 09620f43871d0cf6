/// Domain models for Bazaar
///
/// # Models
///
/// - `principal`: Users and shops, their profiles, roles and addresses
///
/// Persistence lives behind [`crate::store::PrincipalStore`]; models here are
/// plain data.

pub mod principal;

pub use principal::{
    Address, AddressInput, Avatar, NewPrincipal, PendingPrincipal, Principal, PrincipalKind,
    PrincipalPatch, Profile, Role,
};
