use std::sync::Arc;

pub trait AlertPlayer: Send + Sync {
    fn start(&self, booking_id: &str);

    fn stop(&self, booking_id: &str);
}

/// A playing offer alert. Stopped exactly once, either explicitly or when the
/// guard is dropped, so no exit path out of a pending offer can leak it.
pub struct AlertGuard {
    player: Arc<dyn AlertPlayer>,
    booking_id: String,
    playing: bool,
}

impl AlertGuard {
    pub fn start(player: Arc<dyn AlertPlayer>, booking_id: &str) -> Self {
        player.start(booking_id);
        Self {
            player,
            booking_id: booking_id.to_string(),
            playing: true,
        }
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.playing {
            self.playing = false;
            self.player.stop(&self.booking_id);
        }
    }
}

impl Drop for AlertGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::AlertGuard;
    use crate::testing::CountingAlert;

    #[test]
    fn explicit_stop_is_not_repeated_on_drop() {
        let alert = Arc::new(CountingAlert::default());
        let guard = AlertGuard::start(alert.clone(), "B-1");

        guard.stop();

        assert_eq!(alert.starts(), 1);
        assert_eq!(alert.stops(), 1);
    }

    #[test]
    fn dropping_the_guard_stops_the_alert() {
        let alert = Arc::new(CountingAlert::default());
        {
            let _guard = AlertGuard::start(alert.clone(), "B-1");
        }

        assert_eq!(alert.stops(), 1);
    }
}
