//! Device location seam.
//!
//! Platform location services live outside this crate; the service only sees
//! the [`LocationResolver`] trait.

use async_trait::async_trait;

use crate::types::{Coordinates, LocationError};

#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn current_location(&self) -> Result<Coordinates, LocationError>;
}

/// Resolver that always reports the same position
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl FixedLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self(Coordinates {
            latitude,
            longitude,
        })
    }
}

#[async_trait]
impl LocationResolver for FixedLocation {
    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Resolver for hosts without location services
#[derive(Debug, Clone, Default)]
pub struct UnavailableLocation;

#[async_trait]
impl LocationResolver for UnavailableLocation {
    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let resolver = FixedLocation::new(21.03, 105.85);
        let coords = resolver.current_location().await.unwrap();
        assert_eq!(coords.latitude, 21.03);
        assert_eq!(coords.longitude, 105.85);
    }

    #[tokio::test]
    async fn test_unavailable_location() {
        let resolver: Box<dyn LocationResolver> = Box::new(UnavailableLocation);
        assert_eq!(
            resolver.current_location().await,
            Err(LocationError::Unavailable)
        );
    }
}
