/// Scheduler Module
///
/// Computes the daily posting slots and fires the posting task at each of
/// them. The loop polls once a minute; a slot fires when its time of day falls
/// between the previous poll and the current one, so missed slots (process
/// down, loop stalled) are never replayed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use thiserror::Error;
use tokio::time;

/// How often the loop wakes up to look for due slots
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One post per minute of the day at most
pub const MAX_SLOTS_PER_DAY: usize = 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("at least 2 posts per day are required, got {0}")]
    TooFewSlots(usize),
    #[error("at most 1440 posts per day are supported, got {0}")]
    TooManySlots(usize),
    #[error("invalid schedule window {start}:00-{end}:00")]
    InvalidWindow { start: u32, end: u32 },
}

/// A fixed UTC time of day at which a post goes out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleSlot {
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleSlot {
    pub fn time(&self) -> NaiveTime {
        // 24:00 is only reachable with end_hour == 24; clamp it to the last minute.
        let (hour, minute) = if self.hour >= 24 {
            (23, 59)
        } else {
            (self.hour, self.minute)
        };
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
    }
}

impl fmt::Display for ScheduleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Spread `count` slots evenly over `[start_hour:00, end_hour:00]`.
///
/// The interval is `total_minutes / (count - 1)` with integer division, so the
/// last slot may land a few minutes before the window end.
pub fn compute_slots(
    start_hour: u32,
    end_hour: u32,
    count: usize,
) -> Result<Vec<ScheduleSlot>, ScheduleError> {
    if count < 2 {
        return Err(ScheduleError::TooFewSlots(count));
    }
    if count > MAX_SLOTS_PER_DAY {
        return Err(ScheduleError::TooManySlots(count));
    }
    let count = u32::try_from(count).map_err(|_| ScheduleError::TooManySlots(count))?;
    if end_hour < start_hour || end_hour > 24 {
        return Err(ScheduleError::InvalidWindow {
            start: start_hour,
            end: end_hour,
        });
    }

    let total_minutes = (end_hour - start_hour) * 60;
    let interval = total_minutes / (count - 1);

    let slots = (0..count)
        .map(|i| {
            let minutes_from_start = i * interval;
            ScheduleSlot {
                hour: start_hour + minutes_from_start / 60,
                minute: minutes_from_start % 60,
            }
        })
        .collect();

    Ok(slots)
}

/// Work executed at each slot
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    async fn run(&self) -> anyhow::Result<()>;
}

/// Daily slot bookkeeping, independent of the real clock
pub struct DailySchedule {
    slots: Vec<ScheduleSlot>,
    last_check: DateTime<Utc>,
}

impl DailySchedule {
    /// Slots that already passed before `now` are not eligible until tomorrow
    pub fn new(mut slots: Vec<ScheduleSlot>, now: DateTime<Utc>) -> Self {
        slots.sort();
        slots.dedup();
        Self {
            slots,
            last_check: now,
        }
    }

    pub fn slots(&self) -> &[ScheduleSlot] {
        &self.slots
    }

    /// Slots whose trigger time lies in `(last_check, now]`. Advances the
    /// check mark, so every slot is returned at most once per day.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduleSlot> {
        if now <= self.last_check {
            return Vec::new();
        }

        let from = self.last_check;
        self.last_check = now;

        let mut due = Vec::new();
        let mut day = from.date_naive();
        while day <= now.date_naive() {
            for slot in &self.slots {
                let at = day.and_time(slot.time()).and_utc();
                if at > from && at <= now && !due.contains(slot) {
                    due.push(*slot);
                }
            }
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        due
    }

    /// The first slot strictly after `now`, today or tomorrow
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let first = self.slots.first()?;

        self.slots
            .iter()
            .map(|slot| today.and_time(slot.time()).and_utc())
            .find(|at| *at > now)
            .or_else(|| {
                today
                    .checked_add_days(Days::new(1))
                    .map(|tomorrow| tomorrow.and_time(first.time()).and_utc())
            })
    }
}

/// Polling scheduler that owns the task and the daily slot state
pub struct Scheduler {
    schedule: DailySchedule,
    task: Arc<dyn ScheduledTask>,
}

impl Scheduler {
    pub fn new(slots: Vec<ScheduleSlot>, task: Arc<dyn ScheduledTask>, now: DateTime<Utc>) -> Self {
        Self {
            schedule: DailySchedule::new(slots, now),
            task,
        }
    }

    /// Check for due slots at `now` and run the task once if any are due.
    ///
    /// Returns the slot that fired. Task errors and panics are logged and
    /// swallowed so the caller's loop keeps going.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<ScheduleSlot> {
        let due = self.schedule.take_due(now);
        let (slot, skipped) = due.split_first()?;

        for missed in skipped {
            log::warn!("Skipping slot {} UTC, a post is already running for this poll", missed);
        }

        log::info!("Scheduled post triggered for slot {} UTC", slot);

        // Spawned so a panic inside the task surfaces as a JoinError instead
        // of unwinding through the loop.
        let task = self.task.clone();
        match tokio::spawn(async move { task.run().await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Scheduled post for slot {} failed: {:#}", slot, e),
            Err(e) => log::error!("Scheduled post for slot {} panicked: {}", slot, e),
        }

        Some(*slot)
    }

    fn log_plan(&self, now: DateTime<Utc>) {
        let slots = self.schedule.slots();
        for slot in slots {
            log::info!("Scheduled post at {} UTC", slot);
        }
        if let (Some(first), Some(last)) = (slots.first(), slots.last()) {
            log::info!(
                "Scheduled {} daily posts from {} to {} UTC",
                slots.len(),
                first,
                last
            );
        }

        log::info!("Current UTC time: {}", now.format("%H:%M:%S"));
        if let Some(next) = self.schedule.next_after(now) {
            log::info!("Next post at {}", next.format("%Y-%m-%d %H:%M UTC"));
        }
    }

    /// Run forever, polling every minute
    pub async fn run(mut self) {
        self.log_plan(Utc::now());

        let mut interval = time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        // Skip the first tick (immediate execution)
        interval.tick().await;

        loop {
            interval.tick().await;

            if self.tick(Utc::now()).await.is_some() {
                if let Some(next) = self.schedule.next_after(Utc::now()) {
                    log::info!("Next post at {}", next.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }
    }
}
