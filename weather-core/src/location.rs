//! Device location: availability checks and fix subscriptions.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{error::LocationError, model::Coordinates, permission::PermissionKind};

/// Accuracy tier requested from the positioning backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    HighAccuracy,
    Balanced,
    LowPower,
    Passive,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether any positioning backend is active.
    async fn is_location_enabled(&self) -> bool;

    /// Start a long-lived stream of fixes. `granted` must include fine or
    /// coarse location.
    async fn request_location_updates(
        &self,
        granted: &[PermissionKind],
        priority: Priority,
        interval: Duration,
    ) -> Result<LocationSubscription, LocationError>;

    /// A single fix.
    async fn current_location(&self, granted: &[PermissionKind]) -> Result<Coordinates, LocationError>;

    /// Send the user to wherever location services are switched on.
    /// Called when [`is_location_enabled`](Self::is_location_enabled) is false.
    async fn open_location_settings(&self) {
        tracing::debug!("no location settings surface");
    }
}

pub fn ensure_location_granted(granted: &[PermissionKind]) -> Result<(), LocationError> {
    if PermissionKind::location().iter().any(|k| granted.contains(k)) {
        Ok(())
    } else {
        Err(LocationError::PermissionDenied)
    }
}

/// Stream of fixes from a provider.
///
/// Dropping the subscription cancels the producer, so a subscription never
/// outlives its owner.
#[derive(Debug)]
pub struct LocationSubscription {
    fixes: mpsc::Receiver<Coordinates>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl LocationSubscription {
    /// Wrap a receiver fed by a producer that stops when `cancel` fires.
    pub fn new(fixes: mpsc::Receiver<Coordinates>, cancel: CancellationToken) -> Self {
        let _guard = cancel.clone().drop_guard();
        Self { fixes, cancel, _guard }
    }

    /// Next delivered fix, or `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<Coordinates> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            fix = self.fixes.recv() => fix,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn unsubscribe(self) {
        self.cancel.cancel();
        tracing::debug!("location subscription cancelled");
    }
}

/// Reports a fixed, configured position.
///
/// Counts as enabled only when coordinates are configured. Subscriptions emit
/// the fix right away and then once per interval.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationProvider {
    coords: Option<Coordinates>,
}

impl StaticLocationProvider {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { coords }
    }

    fn coords(&self) -> Result<Coordinates, LocationError> {
        self.coords.ok_or(LocationError::ServicesDisabled)
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn is_location_enabled(&self) -> bool {
        self.coords.is_some()
    }

    async fn request_location_updates(
        &self,
        granted: &[PermissionKind],
        priority: Priority,
        interval: Duration,
    ) -> Result<LocationSubscription, LocationError> {
        ensure_location_granted(granted)?;
        let coords = self.coords()?;

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let producer = cancel.clone();

        tracing::debug!(?priority, ?interval, "starting location updates");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = producer.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(coords).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(LocationSubscription::new(rx, cancel))
    }

    async fn current_location(&self, granted: &[PermissionKind]) -> Result<Coordinates, LocationError> {
        ensure_location_granted(granted)?;
        self.coords()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERE: Coordinates = Coordinates { latitude: 51.5072, longitude: -0.1276 };

    #[tokio::test]
    async fn unconfigured_provider_is_disabled() {
        let provider = StaticLocationProvider::new(None);
        assert!(!provider.is_location_enabled().await);

        let err = provider.current_location(PermissionKind::location()).await.unwrap_err();
        assert!(matches!(err, LocationError::ServicesDisabled));
    }

    #[tokio::test]
    async fn updates_require_a_location_grant() {
        let provider = StaticLocationProvider::new(Some(HERE));

        let err = provider
            .request_location_updates(&[], Priority::HighAccuracy, Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(err, LocationError::PermissionDenied));
    }

    #[tokio::test]
    async fn coarse_grant_is_enough() {
        let provider = StaticLocationProvider::new(Some(HERE));
        let fix = provider
            .current_location(&[PermissionKind::CoarseLocation])
            .await
            .expect("fix");
        assert_eq!(fix, HERE);
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_emits_every_interval_until_unsubscribed() {
        let provider = StaticLocationProvider::new(Some(HERE));
        let mut sub = provider
            .request_location_updates(
                PermissionKind::location(),
                Priority::Balanced,
                Duration::from_secs(60),
            )
            .await
            .expect("subscribe");

        assert_eq!(sub.next().await, Some(HERE));
        assert_eq!(sub.next().await, Some(HERE));
        assert!(sub.is_active());

        sub.unsubscribe();
    }

    #[tokio::test]
    async fn cancelled_subscription_yields_nothing() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let mut sub = LocationSubscription::new(rx, cancel.clone());

        tx.send(HERE).await.expect("send");
        cancel.cancel();

        assert_eq!(sub.next().await, None);
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn dropping_subscription_cancels_producer() {
        let (_tx, rx) = mpsc::channel::<Coordinates>(1);
        let cancel = CancellationToken::new();

        drop(LocationSubscription::new(rx, cancel.clone()));

        assert!(cancel.is_cancelled());
    }
}
