//! Foreground weather session: location services → permissions → fixes →
//! fetch → persist → display.
//!
//! Every fix starts its own fetch. Fetches may overlap and are not ordered;
//! each one that succeeds overwrites the cache, and the display always shows
//! what the cache holds, so whichever completes last wins. Saving and
//! emitting the display happen under one lock so the two never disagree.

use parking_lot::Mutex;
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::Config,
    connectivity::Connectivity,
    display::{DisplayModel, map_to_display},
    error::{Error, FetchError, Result},
    location::{LocationProvider, Priority},
    model::{Coordinates, UnitSystem, WeatherResponse},
    permission::{PermissionDecision, PermissionKind, PermissionNegotiator, RationaleChoice},
    provider::WeatherProvider,
    store::{KeyValueStore, WeatherCache},
};

/// Device and network services a session runs against.
#[derive(Clone)]
pub struct Services {
    pub location: Arc<dyn LocationProvider>,
    pub permissions: Arc<dyn PermissionNegotiator>,
    pub connectivity: Arc<dyn Connectivity>,
    pub provider: Arc<dyn WeatherProvider>,
    pub store: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub api_key: String,
    pub units: UnitSystem,
    pub region: String,
    pub priority: Priority,
    pub interval: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: config.api_key()?.to_string(),
            units: config.effective_units(),
            region: config.effective_region(),
            priority: Priority::HighAccuracy,
            interval: config.update_interval(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CheckingLocationServices,
    AwaitingPermission,
    AwaitingFix,
    Fetching,
    Displaying,
    /// The user declined to grant location access. Terminal.
    Blocked,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::CheckingLocationServices => "checking location services",
            SessionState::AwaitingPermission => "awaiting permission",
            SessionState::AwaitingFix => "awaiting fix",
            SessionState::Fetching => "fetching",
            SessionState::Displaying => "displaying",
            SessionState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// New content for the screen, always taken from the cache.
    Display(DisplayModel),
    /// A fetch failed; the screen keeps what it had.
    FetchFailed(FetchError),
    /// A fix arrived while the network was down; no request was made.
    Offline,
    /// Transient message for the user.
    Notice(String),
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Shut down, or the location stream ended.
    Ended,
    LocationServicesDisabled,
    PermissionDenied,
    /// The rationale dialog was cancelled.
    Blocked,
    /// The user went to settings; nothing is re-checked.
    RedirectedToSettings,
}

/// Result of a one-shot refresh.
#[derive(Debug)]
pub enum Refresh {
    Updated(DisplayModel),
    /// The network was down; carries the cached display, if any.
    Offline(Option<DisplayModel>),
    Stopped(SessionOutcome),
}

enum Gate {
    Open(Vec<PermissionKind>),
    Closed(SessionOutcome),
}

pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    services: Services,
    settings: SessionSettings,
    cache: WeatherCache,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: Mutex<SessionState>,
    /// Held while a completed fetch is saved and displayed.
    publish: Mutex<()>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl Session {
    pub fn new(
        services: Services,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let cache = WeatherCache::new(Arc::clone(&services.store));

        let inner = Inner {
            services,
            settings,
            cache,
            events,
            state: Mutex::new(SessionState::Idle),
            publish: Mutex::new(()),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        };

        (Self { inner: Arc::new(inner) }, rx)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.inner.cache
    }

    /// Token that stops [`Session::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn shutdown(&self) {
        tracing::debug!("session shutdown requested");
        self.inner.cancel.cancel();
    }

    /// The cached weather mapped for display, without touching the network.
    pub fn show_cached(&self) -> Result<Option<DisplayModel>> {
        self.inner.cached_display()
    }

    /// Run until shut down or the location stream ends.
    ///
    /// Fix subscriptions are always unsubscribed and in-flight fetches
    /// cancelled or awaited before this returns.
    pub async fn run(&self) -> Result<SessionOutcome> {
        if self.state() == SessionState::Blocked {
            return Ok(SessionOutcome::Blocked);
        }

        self.inner.emit_cached();

        let granted = match self.inner.pass_gates().await {
            Gate::Open(granted) => granted,
            Gate::Closed(outcome) => return Ok(outcome),
        };

        let settings = &self.inner.settings;
        let mut subscription = self
            .inner
            .services
            .location
            .request_location_updates(&granted, settings.priority, settings.interval)
            .await
            .map_err(|e| self.inner.fail(e.into()))?;

        self.inner.transition(SessionState::AwaitingFix);

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                fix = subscription.next() => match fix {
                    Some(coords) => self.on_fix(coords),
                    None => break,
                },
            }
        }

        subscription.unsubscribe();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;

        tracing::debug!("session ended");
        Ok(SessionOutcome::Ended)
    }

    /// Pass the same gates as [`Session::run`], then take a single fix and
    /// wait for its fetch.
    pub async fn refresh_once(&self) -> Result<Refresh> {
        if self.state() == SessionState::Blocked {
            return Ok(Refresh::Stopped(SessionOutcome::Blocked));
        }

        let granted = match self.inner.pass_gates().await {
            Gate::Open(granted) => granted,
            Gate::Closed(outcome) => return Ok(Refresh::Stopped(outcome)),
        };

        self.inner.transition(SessionState::AwaitingFix);
        let coords = self
            .inner
            .services
            .location
            .current_location(&granted)
            .await
            .map_err(|e| self.inner.fail(e.into()))?;

        if !self.inner.services.connectivity.is_network_available().await {
            tracing::info!(%coords, "network unavailable, skipping weather request");
            return Ok(Refresh::Offline(self.inner.cached_display()?));
        }

        self.inner.transition(SessionState::Fetching);
        let published = match self.inner.fetch(coords).await {
            Ok(response) => self.inner.publish(&response),
            Err(err) => Err(err.into()),
        };

        match published {
            Ok(display) => Ok(Refresh::Updated(display)),
            Err(err) => {
                self.inner.transition(SessionState::AwaitingFix);
                Err(err)
            }
        }
    }

    /// Hands the fix to a tracked task so the run loop keeps watching for
    /// shutdown while the network is checked and queried.
    fn on_fix(&self, coords: Coordinates) {
        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {
                    tracing::debug!(%coords, "in-flight fetch cancelled");
                }
                _ = inner.update(coords) => {}
            }
        });
    }
}

impl Inner {
    async fn pass_gates(&self) -> Gate {
        self.transition(SessionState::CheckingLocationServices);
        if !self.services.location.is_location_enabled().await {
            self.notice(Error::LocationServicesDisabled.user_message());
            self.services.location.open_location_settings().await;
            self.transition(SessionState::Idle);
            return Gate::Closed(SessionOutcome::LocationServicesDisabled);
        }

        self.transition(SessionState::AwaitingPermission);
        let kinds = PermissionKind::location();

        match self.services.permissions.request_permissions(kinds).await {
            PermissionDecision::AllGranted => Gate::Open(kinds.to_vec()),
            PermissionDecision::SomeDenied => {
                self.notice(Error::PermissionDenied.user_message());
                self.transition(SessionState::Idle);
                Gate::Closed(SessionOutcome::PermissionDenied)
            }
            PermissionDecision::NeedsRationale => {
                tracing::warn!("location permission previously denied, showing rationale");
                match self.services.permissions.show_rationale().await {
                    RationaleChoice::Cancel => {
                        self.transition(SessionState::Blocked);
                        Gate::Closed(SessionOutcome::Blocked)
                    }
                    RationaleChoice::OpenSettings => {
                        self.services.permissions.open_settings().await;
                        Gate::Closed(SessionOutcome::RedirectedToSettings)
                    }
                }
            }
        }
    }

    /// Connectivity gate, fetch and publish for one fix from the stream.
    async fn update(&self, coords: Coordinates) {
        if !self.services.connectivity.is_network_available().await {
            tracing::info!(%coords, "network unavailable, skipping weather request");
            self.emit(SessionEvent::Offline);
            return;
        }

        self.transition(SessionState::Fetching);
        let response = match self.fetch(coords).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, status = ?err.status_code(), "weather fetch failed");
                self.transition(SessionState::AwaitingFix);
                self.emit(SessionEvent::FetchFailed(err));
                return;
            }
        };

        if let Err(err) = self.publish(&response) {
            tracing::warn!(error = %err, "weather update failed");
            self.transition(SessionState::AwaitingFix);
            self.notice(err.user_message());
        }
    }

    async fn fetch(&self, coords: Coordinates) -> std::result::Result<WeatherResponse, FetchError> {
        let settings = &self.settings;
        self.services
            .provider
            .fetch_weather(coords, settings.units, &settings.api_key)
            .await
    }

    /// Save `response` and show whatever the cache then holds, as one step
    /// with respect to other completions.
    fn publish(&self, response: &WeatherResponse) -> Result<DisplayModel> {
        let _publishing = self.publish.lock();

        self.cache.save(response)?;
        tracing::info!(location = %response.name, "weather updated");

        let shown = self.cache.load()?.unwrap_or_else(|| response.clone());
        let display = map_to_display(&shown, &self.settings.region);

        self.transition(SessionState::Displaying);
        self.emit(SessionEvent::Display(display.clone()));
        Ok(display)
    }

    fn cached_display(&self) -> Result<Option<DisplayModel>> {
        Ok(self
            .cache
            .load()?
            .map(|resp| map_to_display(&resp, &self.settings.region)))
    }

    fn emit_cached(&self) {
        match self.cached_display() {
            Ok(Some(display)) => self.emit(SessionEvent::Display(display)),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "could not read cached weather");
                self.notice(err.user_message());
            }
        }
    }

    fn fail(&self, err: Error) -> Error {
        tracing::warn!(error = %err, "location request failed");
        self.notice(err.user_message());
        err
    }

    fn transition(&self, next: SessionState) {
        let prev = std::mem::replace(&mut *self.state.lock(), next);
        if prev == next {
            return;
        }
        tracing::debug!(from = %prev, to = %next, "session state");
        self.emit(SessionEvent::StateChanged(next));
    }

    fn notice(&self, message: String) {
        self.emit(SessionEvent::Notice(message));
    }

    fn emit(&self, event: SessionEvent) {
        // The receiver may be gone during teardown.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connectivity::{Offline, Online},
        location::StaticLocationProvider,
        model::{Condition, MainReadings, Sys, WeatherResponse, Wind},
        permission::{GrantState, StoredPermissions},
        store::{MemoryStore, WeatherCache},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for CountingProvider {
        async fn fetch_weather(
            &self,
            _coords: Coordinates,
            _units: UnitSystem,
            _api_key: &str,
        ) -> std::result::Result<WeatherResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WeatherResponse {
                weather: vec![Condition {
                    main: "Clear".into(),
                    description: "clear sky".into(),
                    icon: "01d".into(),
                }],
                main: MainReadings { temp: 70.0, temp_min: 65.0, temp_max: 75.0, humidity: 30.0 },
                wind: Wind { speed: 4.0 },
                sys: Sys { sunrise: 0, sunset: 0, country: "US".into() },
                name: "Austin".into(),
            })
        }
    }

    #[derive(Debug, Default)]
    struct BadRequestProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for BadRequestProvider {
        async fn fetch_weather(
            &self,
            _coords: Coordinates,
            _units: UnitSystem,
            _api_key: &str,
        ) -> std::result::Result<WeatherResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status { status: 400, body: "wrong latitude".into() })
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            api_key: "KEY".into(),
            units: UnitSystem::Imperial,
            region: "US".into(),
            priority: Priority::HighAccuracy,
            interval: Duration::from_secs(60),
        }
    }

    fn services(
        provider: Arc<CountingProvider>,
        connectivity: Arc<dyn Connectivity>,
    ) -> (Services, StoredPermissions) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let permissions = StoredPermissions::new(Arc::clone(&store));
        let services = Services {
            location: Arc::new(StaticLocationProvider::new(Some(Coordinates::new(30.27, -97.74)))),
            permissions: Arc::new(permissions.clone()),
            connectivity,
            provider,
            store,
        };
        (services, permissions)
    }

    #[tokio::test]
    async fn refresh_once_fetches_and_displays() {
        let provider = Arc::new(CountingProvider::default());
        let (services, permissions) = services(Arc::clone(&provider), Arc::new(Online));
        permissions.grant_all(PermissionKind::location()).expect("grant");

        let (session, _events) = Session::new(services, settings());
        let refresh = session.refresh_once().await.expect("refresh");

        let display = match refresh {
            Refresh::Updated(display) => display,
            other => panic!("expected an update, got {other:?}"),
        };
        assert_eq!(display.temperature, "70°F");
        assert_eq!(display.name, "Austin");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Displaying);
        assert!(session.show_cached().expect("cached").is_some());
    }

    #[tokio::test]
    async fn refresh_once_offline_skips_request() {
        let provider = Arc::new(CountingProvider::default());
        let (services, permissions) = services(Arc::clone(&provider), Arc::new(Offline));
        permissions.grant_all(PermissionKind::location()).expect("grant");

        let (session, _events) = Session::new(services, settings());
        let refresh = session.refresh_once().await.expect("refresh");

        assert!(matches!(refresh, Refresh::Offline(None)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_once_bad_request_keeps_cache() {
        let counting = Arc::new(CountingProvider::default());
        let (mut services, permissions) = services(Arc::clone(&counting), Arc::new(Online));
        permissions.grant_all(PermissionKind::location()).expect("grant");

        let cached = counting
            .fetch_weather(Coordinates::new(0.0, 0.0), UnitSystem::Metric, "KEY")
            .await
            .expect("seed response");
        WeatherCache::new(Arc::clone(&services.store)).save(&cached).expect("seed cache");

        let failing = Arc::new(BadRequestProvider::default());
        services.provider = failing.clone();

        let (session, mut events) = Session::new(services, settings());
        let err = session.refresh_once().await.unwrap_err();

        match err {
            Error::Fetch(fetch) => {
                assert!(fetch.is_bad_request());
                assert_eq!(fetch.status_code(), Some(400));
            }
            other => panic!("expected a fetch error, got {other:?}"),
        }
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::AwaitingFix);

        let shown = session.show_cached().expect("cached").expect("cache kept");
        assert_eq!(shown.name, "Austin");

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, SessionEvent::Display(_)), "failed refresh must not display");
        }
    }

    #[tokio::test]
    async fn refresh_once_with_location_disabled_stops() {
        let provider = Arc::new(CountingProvider::default());
        let (mut services, permissions) = services(Arc::clone(&provider), Arc::new(Online));
        permissions.grant_all(PermissionKind::location()).expect("grant");
        services.location = Arc::new(StaticLocationProvider::new(None));

        let (session, mut events) = Session::new(services, settings());
        let refresh = session.refresh_once().await.expect("refresh");

        assert!(matches!(refresh, Refresh::Stopped(SessionOutcome::LocationServicesDisabled)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Idle);

        let mut saw_notice = false;
        while let Ok(event) = events.try_recv() {
            saw_notice |= matches!(event, SessionEvent::Notice(_));
        }
        assert!(saw_notice);
    }

    #[tokio::test]
    async fn rationale_cancel_blocks_the_session() {
        let provider = Arc::new(CountingProvider::default());
        let (services, permissions) = services(Arc::clone(&provider), Arc::new(Online));
        permissions.set_state(PermissionKind::FineLocation, GrantState::Denied).expect("deny");

        let (session, _events) = Session::new(services, settings());

        assert_eq!(session.run().await.expect("run"), SessionOutcome::Blocked);
        assert_eq!(session.state(), SessionState::Blocked);

        // Terminal: nothing is asked again.
        assert!(matches!(
            session.refresh_once().await.expect("refresh"),
            Refresh::Stopped(SessionOutcome::Blocked)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_grant_stops_with_permission_denied() {
        let provider = Arc::new(CountingProvider::default());
        let (services, _permissions) = services(Arc::clone(&provider), Arc::new(Online));

        let (session, mut events) = Session::new(services, settings());
        assert_eq!(session.run().await.expect("run"), SessionOutcome::PermissionDenied);

        let mut saw_notice = false;
        while let Ok(event) = events.try_recv() {
            saw_notice |= matches!(event, SessionEvent::Notice(_));
        }
        assert!(saw_notice);
    }

    #[test]
    fn settings_require_api_key() {
        let err = SessionSettings::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn settings_from_config() {
        let cfg = Config {
            api_key: Some("KEY".into()),
            region: Some("LR".into()),
            update_interval_secs: Some(300),
            ..Config::default()
        };
        let settings = SessionSettings::from_config(&cfg).expect("settings");
        assert_eq!(settings.units, UnitSystem::Imperial);
        assert_eq!(settings.region, "LR");
        assert_eq!(settings.interval, Duration::from_secs(300));
    }
}
