/// Type-state markers for the builder pattern
///
/// These types track which required fields have been set in the builder
/// at compile time, so a session without an endpoint or a credential
/// source cannot be built.

use std::marker::PhantomData;

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint (host and region) has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}

/// Marker trait for credential source state
pub trait CredentialsState {}

/// Credential source has not been set
pub struct NoCredentials;
impl CredentialsState for NoCredentials {}

/// Credential source has been set
pub struct HasCredentials;
impl CredentialsState for HasCredentials {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<E, C> {
    _endpoint: PhantomData<E>,
    _credentials: PhantomData<C>,
}

impl<E, C> TypeState<E, C> {
    pub(crate) fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            _credentials: PhantomData,
        }
    }
}

impl<E, C> Default for TypeState<E, C> {
    fn default() -> Self {
        Self::new()
    }
}
