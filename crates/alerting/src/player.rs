//! Audio players

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::AlertError;

/// Future returned by [`AlertPlayer::play`]; owns everything it needs so an
/// overrunning playback can be awaited after the caller has moved on
pub type PlayFuture = Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'static>>;

/// Plays the alert clip once, resolving when playback has finished
pub trait AlertPlayer: Send + Sync {
    fn play(&self) -> PlayFuture;
}

/// Runs an external player (e.g. `aplay airhorn.wav`) and waits for it to exit
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    clip_path: String,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>, clip_path: impl Into<String>) -> Self {
        let player = Self {
            program: program.into(),
            args,
            clip_path: clip_path.into(),
        };
        info!("Alert player: {} {:?} {}", player.program, player.args, player.clip_path);
        player
    }
}

impl AlertPlayer for CommandPlayer {
    fn play(&self) -> PlayFuture {
        let player = self.clone();
        Box::pin(async move {
            // Not killed on drop: an interrupted clip would leave the device mid-write
            let mut child = Command::new(&player.program)
                .args(&player.args)
                .arg(&player.clip_path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(false)
                .spawn()
                .map_err(|e| AlertError::Player(format!("{}: {}", player.program, e)))?;

            let status = child
                .wait()
                .await
                .map_err(|e| AlertError::Player(format!("{}: {}", player.program, e)))?;

            if status.success() {
                Ok(())
            } else {
                Err(AlertError::Player(format!("{} exited with {}", player.program, status)))
            }
        })
    }
}

/// Logs the alert and waits out the clip duration without touching an audio device
#[derive(Debug, Clone, Default)]
pub struct SilentPlayer {
    duration: Duration,
}

impl SilentPlayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl AlertPlayer for SilentPlayer {
    fn play(&self) -> PlayFuture {
        let duration = self.duration;
        Box::pin(async move {
            debug!("Silent alert ({}ms)", duration.as_millis());
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_fails() {
        let player = CommandPlayer::new("/nonexistent/alert-player", vec![], "airhorn.wav");
        assert!(matches!(player.play().await, Err(AlertError::Player(_))));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let player = CommandPlayer::new("sh", vec!["-c".into(), "exit 3".into()], "airhorn.wav");
        assert!(matches!(player.play().await, Err(AlertError::Player(_))));
    }

    #[tokio::test]
    async fn test_playback_outlives_caller() {
        let player = CommandPlayer::new("sh", vec!["-c".into(), "exit 0".into()], "airhorn.wav");
        let playback = player.play();
        drop(player);
        assert!(playback.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_player_waits() {
        let start = tokio::time::Instant::now();
        SilentPlayer::new(Duration::from_millis(1500)).play().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
