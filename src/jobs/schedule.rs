use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};

/// When a job fires, evaluated once per wall-clock minute in the job
/// timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every `every_minutes` inside `start_hour..=end_hour`, Monday to Friday
    MarketHours {
        every_minutes: u32,
        start_hour: u32,
        end_hour: u32,
    },
    /// Once a day at `hour:minute`
    Daily { hour: u32, minute: u32 },
    /// Every `minutes`, around the clock
    Every { minutes: u32 },
}

impl Schedule {
    pub fn is_due<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let (hour, minute) = (at.hour(), at.minute());
        match *self {
            Schedule::MarketHours {
                every_minutes,
                start_hour,
                end_hour,
            } => {
                let weekday = !matches!(at.weekday(), Weekday::Sat | Weekday::Sun);
                weekday && (start_hour..=end_hour).contains(&hour) && divides(every_minutes, minute)
            }
            Schedule::Daily { hour: h, minute: m } => hour == h && minute == m,
            Schedule::Every { minutes } => divides(minutes, minute),
        }
    }
}

fn divides(step: u32, minute: u32) -> bool {
    step <= 1 || minute % step == 0
}
