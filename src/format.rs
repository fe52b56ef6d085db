//! Display helpers for numbers, sizes, dates and enum labels.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Industry, PublishStatus, Region, RoadmapStatus};

/// 1234567 -> "1.2M"; values under a thousand print as-is
#[must_use]
pub fn format_compact_number(num: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
    for (scale, suffix) in UNITS {
        if num >= scale {
            return format!("{:.1}{suffix}", num / scale);
        }
    }
    format!("{num}")
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Thousands-grouped number with a fixed number of decimals
#[must_use]
pub fn format_number(num: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, num.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let sign = if num < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    let mut out = format!("{sign}{}", group_thousands(integer));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Whole-dollar amount, e.g. "US$1,234"
#[must_use]
pub fn format_currency(value: f64) -> String {
    if value < 0.0 {
        format!("-US${}", format_number(-value, 0))
    } else {
        format!("US${}", format_number(value, 0))
    }
}

/// Human-readable byte size using 1024 steps
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `YYYY-MM-DD`
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DD HH:MM:SS` in UTC
#[must_use]
pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Chinese display text of a roadmap status
#[must_use]
pub const fn roadmap_status_label(status: RoadmapStatus) -> &'static str {
    match status {
        RoadmapStatus::Planning => "规划中",
        RoadmapStatus::InProgress => "进行中",
        RoadmapStatus::Completed => "已完成",
        RoadmapStatus::Delayed => "已延期",
        RoadmapStatus::Cancelled => "已取消",
    }
}

/// Chinese display text of a publication status
#[must_use]
pub const fn publish_status_label(status: PublishStatus) -> &'static str {
    match status {
        PublishStatus::Published => "已发布",
        PublishStatus::Draft => "草稿",
    }
}

/// Region with its flag
#[must_use]
pub const fn region_label(region: Region) -> &'static str {
    match region {
        Region::MainlandChina => "🇨🇳 中国大陆",
        Region::Taiwan => "🇹🇼 台湾",
        Region::Usa => "🇺🇸 美国",
        Region::Japan => "🇯🇵 日本",
        Region::Korea => "🇰🇷 韩国",
        Region::Europe => "🇪🇺 欧洲",
        Region::Other => "🌍 其他",
    }
}

/// Icon shown next to an industry segment
#[must_use]
pub const fn industry_icon(industry: Industry) -> &'static str {
    match industry {
        Industry::Design => "💻",
        Industry::Manufacturing => "🏭",
        Industry::PackagingTest => "📦",
        Industry::Equipment => "⚙️",
        Industry::Materials => "🔬",
        Industry::IpEda => "📐",
        Industry::Other => "📊",
    }
}
