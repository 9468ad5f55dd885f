//! Indonesian display strings for the countdown.

/// Shown while an adzan is in progress.
pub const ANNOUNCING_LABEL: &str = "Adzan Berkumandang";

/// Shown when there is no schedule to count down to.
pub const UNAVAILABLE_LABEL: &str = "Jadwal tidak tersedia";

pub const HEADING_ANNOUNCING: &str = "Waktu Sholat";
pub const HEADING_UPCOMING: &str = "Menuju Waktu Sholat";

/// Format a whole-minute countdown: `"2 jam 5 menit lagi"` or `"15 menit lagi"`.
#[must_use]
pub fn remaining_label(total_minutes: i64) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours} jam {minutes} menit lagi")
    } else {
        format!("{minutes} menit lagi")
    }
}
