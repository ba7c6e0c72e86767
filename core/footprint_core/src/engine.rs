//! Owns all mutable tracking state. Signals, messages and periodic ticks are
//! fed through one queue and applied one at a time, so timer transitions,
//! reducer steps and flushes never interleave.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    analytics::{self, AnalyticsInput, OpenInterval, Timeframe},
    buffer::{EventBuffer, RetentionPolicy, DEFAULT_FLUSH_THRESHOLD},
    categorize::hostname,
    clock::{local_day_start_ms, normalize_tz_offset_minutes, tz_offset_from_minutes, Clock, DAY_MS},
    content,
    event::{snippet, EngagementSample, Event, EventKind},
    message::{
        ExportData, FlushResult, Message, Rejection, Reply, SessionData, TrackingStatus,
        EXPORT_FORMAT_VERSION,
    },
    remote::{AnalyzeRequest, ClosedInterval, RemoteClient},
    session::{apply_event, Session},
    settings::{Settings, SettingsUpdate},
    store::{load_or_init_settings, Store},
    timer::{is_internal_url, ActiveTabState, ActiveTabTimer, BrowserSignal, IdleState, Tab},
};

pub const DEFAULT_HISTORY_CAP: usize = 100;
pub const HISTORY_MAX_AGE_MS: i64 = 90 * DAY_MS;
const QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub retention: RetentionPolicy,
    pub flush_threshold: usize,
    pub flush_interval: Duration,
    pub maintenance_interval: Duration,
    pub history_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: Duration::from_secs(25),
            maintenance_interval: Duration::from_secs(60),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// What the browser last told us, independent of whether we are tracking.
#[derive(Clone, Debug)]
struct BrowserView {
    active_tab: Option<Tab>,
    focused: bool,
    idle: bool,
}

impl BrowserView {
    fn trackable_tab(&self) -> Option<&Tab> {
        if self.focused && !self.idle {
            self.active_tab.as_ref()
        } else {
            None
        }
    }

    fn is_active_tab(&self, tab: &Tab) -> bool {
        match (self.active_tab.as_ref().and_then(|t| t.id), tab.id) {
            (Some(current), Some(id)) => current == id,
            _ => tab.active,
        }
    }
}

impl Default for BrowserView {
    fn default() -> Self {
        Self {
            active_tab: None,
            focused: true,
            idle: false,
        }
    }
}

/// Engagement and text gathered for the interval that is currently open.
#[derive(Debug, Default)]
struct IntervalExtras {
    engagement: EngagementSample,
    text: String,
}

pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    store: Box<dyn Store>,
    remote: Option<RemoteClient>,
    settings: Settings,
    timer: ActiveTabTimer,
    view: BrowserView,
    session: Session,
    buffer: EventBuffer,
    extras: IntervalExtras,
}

impl Engine {
    /// Loads settings, archives a session left over from a previous run and
    /// opens a fresh one.
    pub fn new(
        config: EngineConfig,
        mut store: Box<dyn Store>,
        clock: Arc<dyn Clock>,
        remote: Option<RemoteClient>,
    ) -> anyhow::Result<Self> {
        let now = clock.now_ms();
        let settings = load_or_init_settings(store.as_mut(), Settings::default(), now)?;

        let mut start = now;
        if let Some(previous) = store.load_current_session()? {
            if previous.has_activity() {
                store.archive_session(&previous, config.history_cap)?;
                info!(start_time = previous.start_time, "archived session from previous run");
                start = next_session_start(&previous, now);
            }
        }
        let session = Session::new(start);
        store.save_current_session(&session)?;

        let buffer = EventBuffer::new(config.flush_threshold);
        Ok(Self {
            config,
            clock,
            store,
            remote,
            settings,
            timer: ActiveTabTimer::new(),
            view: BrowserView::default(),
            session,
            buffer,
            extras: IntervalExtras::default(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn timer(&self) -> &ActiveTabTimer {
        &self.timer
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn handle_signal(&mut self, signal: BrowserSignal) {
        let now = self.clock.now_ms();
        let events = match signal {
            BrowserSignal::TabActivated { tab } => {
                self.view.active_tab = Some(tab);
                self.view.focused = true;
                self.view.idle = false;
                self.activate_current(now)
            }
            BrowserSignal::TabUpdated { tab, status } => {
                if status.as_deref() != Some("complete") || !self.view.is_active_tab(&tab) {
                    return;
                }
                let same_url = self.timer.tracked_url() == Some(tab.url.as_str());
                self.view.active_tab = Some(tab);
                if same_url {
                    return;
                }
                self.activate_current(now)
            }
            BrowserSignal::WindowFocusChanged { tab: Some(tab) } => {
                self.view.active_tab = Some(tab);
                self.view.focused = true;
                self.activate_current(now)
            }
            BrowserSignal::WindowFocusChanged { tab: None } => {
                self.view.focused = false;
                self.timer.deactivate(now)
            }
            BrowserSignal::IdleStateChanged { state: IdleState::Active } => {
                self.view.idle = false;
                self.activate_current(now)
            }
            BrowserSignal::IdleStateChanged {
                state: IdleState::Idle | IdleState::Locked,
            } => {
                self.view.idle = true;
                self.timer.deactivate(now)
            }
        };
        self.emit(events);
    }

    fn activate_current(&mut self, now: i64) -> Vec<Event> {
        match self.view.trackable_tab() {
            Some(tab) => self.timer.activate(tab, &self.settings, now),
            None => self.timer.deactivate(now),
        }
    }

    pub fn handle_message(&mut self, message: Message) -> Result<Reply, Rejection> {
        let now = self.clock.now_ms();
        match message {
            Message::PauseTracking => {
                let events = self.timer.pause(now);
                self.emit(events);
                self.session.is_paused = true;
                info!("tracking paused");
                Ok(self.status())
            }
            Message::ResumeTracking => {
                let current = self.view.trackable_tab().cloned();
                let events = self.timer.resume(current.as_ref(), &self.settings, now);
                self.emit(events);
                self.session.is_paused = false;
                info!("tracking resumed");
                Ok(self.status())
            }
            Message::GetStatus => Ok(self.status()),
            Message::GetTodayStats { tz_offset_minutes } => self.today_stats(tz_offset_minutes, now),
            Message::GetSessionData => Ok(Reply::SessionData(Box::new(SessionData {
                session: self.session.clone(),
                timestamp: now,
            }))),
            Message::GetAnalytics {
                timeframe,
                tz_offset_minutes,
            } => self.analytics(timeframe.as_deref(), tz_offset_minutes, now),
            Message::Engagement { url, data, .. } => {
                if data.is_empty() || !self.accepts_page_data(&url) {
                    return Ok(Reply::Accepted);
                }
                if self.is_tracking_host(&url) {
                    self.extras.engagement.add_counters(&data);
                }
                self.record(Event::new(url, now, EventKind::Engagement { data }));
                Ok(Reply::Accepted)
            }
            Message::DumpText { url, text } => {
                if text.trim().is_empty() || !self.accepts_page_data(&url) {
                    return Ok(Reply::Accepted);
                }
                let text_snippet = snippet(&text);
                if self.timer.tracked_url() == Some(url.as_str()) {
                    self.extras.text = text_snippet.clone();
                }
                self.record(Event::new(url, now, EventKind::PageText { text_snippet }));
                Ok(Reply::Accepted)
            }
            Message::ContentAnalysis {
                content: text,
                title,
                url,
            } => {
                if text.trim().is_empty() || !self.accepts_page_data(&url) {
                    return Ok(Reply::Accepted);
                }
                let analysis = content::analyze(&text, now);
                debug!(url = %url, sentiment = ?analysis.sentiment, "content analysed");
                if let (Some(remote), false) = (&self.remote, self.settings.privacy_mode) {
                    remote.spawn_analyze(AnalyzeRequest::new(text, url.clone()));
                }
                self.record(Event::new(url, now, EventKind::ContentAnalysis { title, analysis }));
                Ok(Reply::Accepted)
            }
            Message::UpdateSettings { settings } => self.update_settings(settings, now),
            Message::ExportData => {
                let sessions = self.store.load_sessions().map_err(db_error)?;
                Ok(Reply::Export(Box::new(ExportData {
                    settings: self.settings.clone(),
                    sessions,
                    current_session: self.session.clone(),
                    exported_at: now,
                    version: EXPORT_FORMAT_VERSION,
                })))
            }
            Message::StartNewSession => {
                self.start_new_session(now).map_err(db_error)?;
                Ok(Reply::SessionData(Box::new(SessionData {
                    session: self.session.clone(),
                    timestamp: now,
                })))
            }
            Message::Flush => {
                let flushed = self
                    .buffer
                    .flush(self.store.as_mut(), &self.config.retention, now)
                    .map_err(db_error)?;
                let stored_events = self.store.event_count().map_err(db_error)?;
                Ok(Reply::Flushed(FlushResult {
                    flushed,
                    stored_events,
                }))
            }
        }
    }

    fn status(&self) -> Reply {
        Reply::Status(TrackingStatus {
            paused: self.timer.is_paused(),
            state: self.timer.status(),
        })
    }

    fn accepts_page_data(&self, url: &str) -> bool {
        !self.timer.is_paused()
            && self.settings.tracking_enabled
            && !is_internal_url(url)
            && !self.settings.is_excluded(url)
    }

    fn is_tracking_host(&self, url: &str) -> bool {
        match (self.timer.tracked_url().and_then(hostname), hostname(url)) {
            (Some(tracked), Some(host)) => tracked == host,
            _ => false,
        }
    }

    /// Stored plus buffered events at or after `since`, in append order.
    fn events_since(&mut self, since: i64) -> anyhow::Result<Vec<Event>> {
        let mut events = self.store.events_since(since)?;
        events.extend(self.buffer.pending().iter().filter(|e| e.ts >= since).cloned());
        Ok(events)
    }

    fn today_stats(&mut self, tz_offset_minutes: Option<i32>, now: i64) -> Result<Reply, Rejection> {
        let tz = tz_offset_from_minutes(normalize_tz_offset_minutes(tz_offset_minutes));
        let day_start = local_day_start_ms(now, tz);
        let events = self.events_since(day_start).map_err(db_error)?;

        let open = match self.timer.state() {
            ActiveTabState::Tracking { url, start, .. } => Some(OpenInterval {
                url: url.as_str(),
                start: *start,
            }),
            _ => None,
        };
        Ok(Reply::TodayStats(analytics::today_stats(
            &events,
            open,
            &self.settings,
            day_start,
            now,
            self.timer.is_paused(),
        )))
    }

    fn analytics(
        &mut self,
        timeframe: Option<&str>,
        tz_offset_minutes: Option<i32>,
        now: i64,
    ) -> Result<Reply, Rejection> {
        let timeframe = Timeframe::parse(timeframe);
        let tz = tz_offset_from_minutes(normalize_tz_offset_minutes(tz_offset_minutes));
        let history = self.store.load_sessions().map_err(db_error)?;
        let events = self
            .events_since(now - timeframe.window_ms())
            .map_err(db_error)?;

        let input = AnalyticsInput {
            history: &history,
            current: &self.session,
            events: &events,
            settings: &self.settings,
            tz,
        };
        Ok(Reply::Analytics(Box::new(analytics::aggregate(
            &input, timeframe, now,
        ))))
    }

    fn update_settings(&mut self, update: SettingsUpdate, now: i64) -> Result<Reply, Rejection> {
        let next = self.settings.apply(update).map_err(|code| {
            warn!("rejected settings update: {code}");
            Rejection::Invalid("invalid_settings")
        })?;
        self.store.save_settings(&next, now).map_err(db_error)?;
        self.settings = next;
        info!(
            tracking_enabled = self.settings.tracking_enabled,
            privacy_mode = self.settings.privacy_mode,
            excluded = self.settings.excluded_sites.len(),
            "settings updated"
        );

        let mut events = self.timer.reconcile(&self.settings, now);
        if self.timer.tracked_url().is_none() && !self.timer.is_paused() {
            events.extend(self.activate_current(now));
        }
        self.emit(events);
        Ok(Reply::Settings(self.settings.clone()))
    }

    /// Closes the open interval, archives the current session and starts a
    /// new one on whatever tab is active.
    pub fn start_new_session(&mut self, now: i64) -> anyhow::Result<()> {
        let events = self.timer.deactivate(now);
        self.emit(events);

        if self.session.has_activity() {
            self.store
                .archive_session(&self.session, self.config.history_cap)?;
        }
        let paused = self.timer.is_paused();
        let start = next_session_start(&self.session, now);
        self.session = Session::new(start);
        self.session.is_paused = paused;
        self.store.save_current_session(&self.session)?;
        info!(start_time = start, "started new session");

        let events = self.activate_current(now);
        self.emit(events);
        Ok(())
    }

    fn emit(&mut self, events: Vec<Event>) {
        for event in events {
            match &event.kind {
                EventKind::SessionStart { .. } => self.extras = IntervalExtras::default(),
                EventKind::SessionEnd { title, duration } => {
                    self.send_interval(&event.url, title, event.ts - duration, event.ts);
                    self.extras = IntervalExtras::default();
                }
                _ => {}
            }
            self.record(event);
        }
    }

    fn send_interval(&self, url: &str, title: &str, start_ms: i64, end_ms: i64) {
        let Some(remote) = &self.remote else { return };
        let private = self.settings.privacy_mode;
        let payload = remote.ingest_payload(&ClosedInterval {
            url,
            title: if private { "" } else { title },
            text: if private { "" } else { self.extras.text.as_str() },
            start_ms,
            end_ms,
            engagement: &self.extras.engagement,
        });
        remote.spawn_ingest(payload);
    }

    /// Applies an event to the session and buffers it for persistence.
    fn record(&mut self, event: Event) {
        let event = if self.settings.privacy_mode {
            match event.redacted() {
                Some(e) => e,
                None => return,
            }
        } else {
            event
        };
        apply_event(&mut self.session, &event, &self.settings);
        if self.buffer.push(event) {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        let now = self.clock.now_ms();
        match self
            .buffer
            .flush(self.store.as_mut(), &self.config.retention, now)
        {
            Ok(0) => {}
            Ok(n) => debug!("flushed {n} events"),
            Err(err) => error!(
                "flush failed, {} events kept for retry: {err:#}",
                self.buffer.len()
            ),
        }
    }

    /// Checkpoints the current session and drops history past the age limit.
    pub fn maintenance(&mut self) {
        let now = self.clock.now_ms();
        if let Err(err) = self.store.save_current_session(&self.session) {
            error!("session checkpoint failed: {err:#}");
        }
        match self.store.prune_sessions(now - HISTORY_MAX_AGE_MS) {
            Ok(0) => {}
            Ok(n) => info!("pruned {n} old sessions"),
            Err(err) => error!("session cleanup failed: {err:#}"),
        }
    }

    pub fn shutdown(&mut self) {
        let now = self.clock.now_ms();
        let events = self.timer.deactivate(now);
        self.emit(events);
        self.flush();
        if let Err(err) = self.store.save_current_session(&self.session) {
            error!("session checkpoint failed: {err:#}");
        }
        info!(buffered = self.buffer.len(), "engine stopped");
    }
}

/// History is keyed by start time, so a successor never reuses its predecessor's.
fn next_session_start(previous: &Session, now: i64) -> i64 {
    now.max(previous.start_time + 1)
}

fn db_error(err: anyhow::Error) -> Rejection {
    error!("store error: {err:#}");
    Rejection::Internal("db_error")
}

pub enum Command {
    Signal(BrowserSignal),
    Message(Message, oneshot::Sender<Result<Reply, Rejection>>),
    Shutdown(oneshot::Sender<()>),
}

/// Drains `rx` until shutdown, interleaving the periodic flush and
/// maintenance ticks with incoming commands.
pub async fn run(mut engine: Engine, mut rx: mpsc::Receiver<Command>) {
    let flush_every = engine.config.flush_interval;
    let maintain_every = engine.config.maintenance_interval;
    let mut flush_tick = interval_at(Instant::now() + flush_every, flush_every);
    let mut maintain_tick = interval_at(Instant::now() + maintain_every, maintain_every);
    flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    maintain_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Signal(signal)) => engine.handle_signal(signal),
                Some(Command::Message(message, reply)) => {
                    let _ = reply.send(engine.handle_message(message));
                }
                Some(Command::Shutdown(done)) => {
                    engine.shutdown();
                    let _ = done.send(());
                    break;
                }
                None => {
                    engine.shutdown();
                    break;
                }
            },
            _ = flush_tick.tick() => engine.flush(),
            _ = maintain_tick.tick() => engine.maintenance(),
        }
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub fn spawn(engine: Engine) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(run(engine, rx));
        (Self { tx }, task)
    }

    pub async fn signal(&self, signal: BrowserSignal) -> anyhow::Result<()> {
        self.tx
            .send(Command::Signal(signal))
            .await
            .map_err(|_| anyhow::anyhow!("engine_unavailable"))
    }

    pub async fn request(&self, message: Message) -> anyhow::Result<Result<Reply, Rejection>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Message(message, reply_tx))
            .await
            .map_err(|_| anyhow::anyhow!("engine_unavailable"))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("engine_unavailable"))
    }

    /// Asks the engine to close the open interval, flush and stop. Waits until it has.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}
