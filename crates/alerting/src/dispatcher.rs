//! Alert Dispatcher Implementation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::player::{AlertPlayer, CommandPlayer, SilentPlayer};
use crate::AlertError;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Play alerts at all
    pub enabled: bool,
    /// Audio clip handed to the player
    pub clip_path: String,
    /// Player program; `None` logs alerts without sound
    pub player: Option<String>,
    /// Extra player arguments placed before the clip path
    pub player_args: Vec<String>,
    /// Upper bound on how long one dispatch call blocks its caller,
    /// including time queued behind another session's alert (milliseconds)
    pub max_duration_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clip_path: "airhorn.wav".to_string(),
            player: Some("aplay".to_string()),
            player_args: vec!["-q".to_string()],
            max_duration_ms: 5000,
        }
    }
}

/// What a dispatch call did
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No trigger
    Idle,
    /// Alert played to completion
    Played,
    /// Alerts are disabled
    Suppressed,
    /// Playback failed, or did not finish within the bound; the alert is
    /// not retried
    Lost(AlertError),
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub fired: u64,
    pub lost: u64,
    pub suppressed: u64,
}

/// Serializes alert playback across all sessions
pub struct AlertDispatcher {
    config: AlertConfig,
    player: Arc<dyn AlertPlayer>,
    /// Held until the player exits, even past the caller's deadline
    playing: Arc<Mutex<()>>,
    fired: AtomicU64,
    lost: AtomicU64,
    suppressed: AtomicU64,
}

impl AlertDispatcher {
    /// Create a dispatcher with an explicit player
    pub fn new(config: AlertConfig, player: Arc<dyn AlertPlayer>) -> Self {
        info!("Creating alert dispatcher with config: {:?}", config);
        Self {
            config,
            player,
            playing: Arc::new(Mutex::new(())),
            fired: AtomicU64::new(0),
            lost: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Create a dispatcher with the player named in the configuration
    pub fn from_config(config: AlertConfig) -> Self {
        let player: Arc<dyn AlertPlayer> = match &config.player {
            Some(program) => Arc::new(CommandPlayer::new(
                program.clone(),
                config.player_args.clone(),
                config.clip_path.clone(),
            )),
            None => Arc::new(SilentPlayer::default()),
        };
        Self::new(config, player)
    }

    /// Play the alert if `trigger` is set.
    ///
    /// Resolves once playback has finished (or failed), and never later than
    /// `max_duration_ms` after the call, queueing behind other sessions'
    /// alerts included. A clip still sounding at the deadline is left to
    /// finish in the background and the next alert waits for it.
    pub async fn dispatch(&self, trigger: bool) -> DispatchOutcome {
        if !trigger {
            return DispatchOutcome::Idle;
        }

        if !self.config.enabled {
            debug!("Alert suppressed: alerts disabled");
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::Suppressed;
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.max_duration_ms);

        let playing = match timeout_at(deadline, self.playing.clone().lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Drowsiness alert dropped: another alert still playing");
                return self.timed_out();
            }
        };

        let mut playback = self.player.play();
        match timeout_at(deadline, &mut playback).await {
            Ok(Ok(())) => {
                let count = self.fired.fetch_add(1, Ordering::Relaxed) + 1;
                info!("Drowsiness alert played (count: {})", count);
                DispatchOutcome::Played
            }
            Ok(Err(e)) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                warn!("Drowsiness alert lost: {}", e);
                DispatchOutcome::Lost(e)
            }
            Err(_) => {
                tokio::spawn(async move {
                    let _playing = playing;
                    if let Err(e) = playback.await {
                        debug!("Overrunning alert ended with error: {}", e);
                    }
                });
                warn!("Drowsiness alert overran {}ms", self.config.max_duration_ms);
                self.timed_out()
            }
        }
    }

    fn timed_out(&self) -> DispatchOutcome {
        self.lost.fetch_add(1, Ordering::Relaxed);
        DispatchOutcome::Lost(AlertError::Timeout(self.config.max_duration_ms))
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> AlertStats {
        AlertStats {
            fired: self.fired.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayFuture;
    use std::sync::atomic::AtomicUsize;

    /// Records the highest number of overlapping playbacks
    struct CountingPlayer {
        duration: Duration,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl CountingPlayer {
        fn new(duration_ms: u64) -> Self {
            Self {
                duration: Duration::from_millis(duration_ms),
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn max_active(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }
    }

    impl AlertPlayer for CountingPlayer {
        fn play(&self) -> PlayFuture {
            let duration = self.duration;
            let active = self.active.clone();
            let max_active = self.max_active.clone();
            Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(duration).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    struct FailingPlayer;

    impl AlertPlayer for FailingPlayer {
        fn play(&self) -> PlayFuture {
            Box::pin(async { Err(AlertError::Player("no audio device".into())) })
        }
    }

    fn silent(duration_ms: u64) -> Arc<dyn AlertPlayer> {
        Arc::new(SilentPlayer::new(Duration::from_millis(duration_ms)))
    }

    #[tokio::test]
    async fn test_no_trigger_is_idle() {
        let dispatcher = AlertDispatcher::new(AlertConfig::default(), silent(0));
        assert!(matches!(dispatcher.dispatch(false).await, DispatchOutcome::Idle));
        assert_eq!(dispatcher.stats(), AlertStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_blocks_until_played() {
        let dispatcher = AlertDispatcher::new(AlertConfig::default(), silent(1000));
        let start = tokio::time::Instant::now();
        assert!(matches!(dispatcher.dispatch(true).await, DispatchOutcome::Played));
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(dispatcher.stats().fired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_is_bounded() {
        let config = AlertConfig { max_duration_ms: 500, ..Default::default() };
        let dispatcher = AlertDispatcher::new(config, silent(60_000));
        let start = tokio::time::Instant::now();

        let outcome = dispatcher.dispatch(true).await;
        assert!(matches!(outcome, DispatchOutcome::Lost(AlertError::Timeout(500))));
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(dispatcher.stats().lost, 1);
    }

    #[tokio::test]
    async fn test_failure_is_contained() {
        let dispatcher = AlertDispatcher::new(AlertConfig::default(), Arc::new(FailingPlayer));
        assert!(matches!(
            dispatcher.dispatch(true).await,
            DispatchOutcome::Lost(AlertError::Player(_))
        ));
        assert_eq!(dispatcher.stats(), AlertStats { fired: 0, lost: 1, suppressed: 0 });
    }

    #[tokio::test]
    async fn test_disabled_suppresses() {
        let config = AlertConfig { enabled: false, ..Default::default() };
        let dispatcher = AlertDispatcher::new(config, silent(0));
        assert!(matches!(dispatcher.dispatch(true).await, DispatchOutcome::Suppressed));
        assert_eq!(dispatcher.stats().suppressed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_never_overlaps() {
        let player = Arc::new(CountingPlayer::new(200));
        let dispatcher = Arc::new(AlertDispatcher::new(AlertConfig::default(), player.clone()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(true).await })
            })
            .collect();
        for task in tasks {
            assert!(matches!(task.await.unwrap(), DispatchOutcome::Played));
        }

        assert_eq!(player.max_active(), 1);
        assert_eq!(dispatcher.stats().fired, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_blocks_next_alert() {
        let player = Arc::new(CountingPlayer::new(1000));
        let config = AlertConfig { max_duration_ms: 600, ..Default::default() };
        let dispatcher = AlertDispatcher::new(config, player.clone());

        // First clip overruns and keeps the device until t=1000
        assert!(matches!(
            dispatcher.dispatch(true).await,
            DispatchOutcome::Lost(AlertError::Timeout(600))
        ));
        // Second waits until t=1000, starts, then overruns its own deadline at t=1200
        let start = Instant::now();
        assert!(matches!(dispatcher.dispatch(true).await, DispatchOutcome::Lost(_)));
        assert!(start.elapsed() <= Duration::from_millis(600));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(player.max_active(), 1);
        assert_eq!(player.active.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.stats().lost, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queueing_counts_toward_bound() {
        let config = AlertConfig { max_duration_ms: 1500, ..Default::default() };
        let dispatcher = Arc::new(AlertDispatcher::new(config, silent(1000)));

        let start = Instant::now();
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(true).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(start.elapsed() <= Duration::from_millis(1500));
        assert_eq!(dispatcher.stats(), AlertStats { fired: 1, lost: 1, suppressed: 0 });
    }

    #[tokio::test]
    async fn test_overrunning_command_is_not_overlapped() {
        let log = std::env::temp_dir().join(format!("alert-overlap-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&log);
        let script = format!(
            "echo start >> {0}; sleep 0.3; echo end >> {0}",
            log.display()
        );
        let player = Arc::new(CommandPlayer::new("sh", vec!["-c".into(), script], "airhorn.wav"));
        let config = AlertConfig { max_duration_ms: 100, ..Default::default() };
        let dispatcher = AlertDispatcher::new(config, player);

        dispatcher.dispatch(true).await;
        dispatcher.dispatch(true).await;
        dispatcher.dispatch(true).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let lines = std::fs::read_to_string(&log).unwrap();
        let _ = std::fs::remove_file(&log);
        let lines: Vec<&str> = lines.lines().collect();
        assert!(!lines.is_empty());
        for pair in lines.chunks(2) {
            assert_eq!(pair, ["start", "end"]);
        }
        assert_eq!(dispatcher.stats().lost, 3);
    }

    #[test]
    fn test_from_config_without_player() {
        let config = AlertConfig { player: None, ..Default::default() };
        let dispatcher = AlertDispatcher::from_config(config);
        assert!(dispatcher.config().player.is_none());
    }
}
