//! Template literals embedded in dictionary words.
//!
//! Two forms are recognised:
//!
//! - `<date format="yyyy/MM/dd" type="western" language="ja_JP" delta="1" deltaunit="86400">`
//! - `<random type="int" value="1,6">` (`int`, `double` or `string`)
//!
//! Dates are computed from the system clock at a fixed +09:00 offset.
//! `deltaunit` is in seconds.
use once_cell::sync::Lazy;
use regex::Regex;
use std::hash::BuildHasher;
use std::time::{SystemTime, UNIX_EPOCH};

const UTC_OFFSET_SECONDS: i64 = 9 * 3600;

static DATE_EXPRESSION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"<date format="(.*?)" type="(.*?)" language="(.*?)" delta="(.*?)" deltaunit="(.*?)">"#,
    )
    .ok()
});

static RANDOM_EXPRESSION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"<random type="(.*?)" value="(.*?)">"#).ok());

/// Expand every template literal in `text`. Text without templates is
/// returned unchanged.
pub fn expand(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    let now = now_seconds();
    let mut out = text.to_string();
    if let Some(re) = DATE_EXPRESSION.as_ref() {
        out = re
            .replace_all(&out, |caps: &regex::Captures| {
                let template = DateTemplate {
                    format: caps[1].to_string(),
                    japanese_era: &caps[2] == "japanese",
                    english: caps[3].starts_with("en"),
                    delta: caps[4].parse().unwrap_or(0),
                    delta_unit: caps[5].parse().unwrap_or(1),
                };
                template.render(now)
            })
            .into_owned();
    }
    if let Some(re) = RANDOM_EXPRESSION.as_ref() {
        out = re
            .replace_all(&out, |caps: &regex::Captures| {
                render_random(&caps[1], &caps[2], random_u64())
            })
            .into_owned();
    }
    out
}

fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn random_u64() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    ahash::RandomState::new().hash_one(nanos)
}

struct DateTemplate {
    format: String,
    japanese_era: bool,
    english: bool,
    delta: i64,
    delta_unit: i64,
}

/// Broken-down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalTime {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    /// 0 = Sunday
    weekday: u32,
}

impl LocalTime {
    fn from_unix(seconds: i64) -> Self {
        let local = seconds + UTC_OFFSET_SECONDS;
        let days = local.div_euclid(86400);
        let secs = local.rem_euclid(86400);
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: (secs / 3600) as u32,
            minute: (secs % 3600 / 60) as u32,
            second: (secs % 60) as u32,
            weekday: (days + 4).rem_euclid(7) as u32,
        }
    }
}

/// Days since 1970-01-01 to (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

const WEEKDAYS_JA: [&str; 7] = ["日", "月", "火", "水", "木", "金", "土"];
const WEEKDAYS_EN: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const WEEKDAYS_EN_FULL: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];
const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Era name and year within it. Eras start on the given (year, month, day).
fn japanese_era(t: &LocalTime) -> (&'static str, i64) {
    const ERAS: [(&str, (i64, u32, u32)); 4] = [
        ("令和", (2019, 5, 1)),
        ("平成", (1989, 1, 8)),
        ("昭和", (1926, 12, 25)),
        ("大正", (1912, 7, 30)),
    ];
    for (name, start) in ERAS {
        if (t.year, t.month, t.day) >= start {
            return (name, t.year - start.0 + 1);
        }
    }
    ("明治", t.year - 1867)
}

impl DateTemplate {
    fn render(&self, now: i64) -> String {
        let t = LocalTime::from_unix(now + self.delta * self.delta_unit);
        format_date(&self.format, &t, self.japanese_era, self.english)
    }
}

fn format_date(format: &str, t: &LocalTime, use_japanese_era: bool, english: bool) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        // quoted literal
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        match c {
            'G' => {
                if use_japanese_era {
                    out.push_str(japanese_era_name(t));
                } else {
                    out.push_str(if t.year > 0 { "AD" } else { "BC" });
                }
            }
            'y' => {
                let year = if use_japanese_era { japanese_era(t).1 } else { t.year };
                if run == 2 {
                    out.push_str(&format!("{:02}", year.rem_euclid(100)));
                } else {
                    out.push_str(&format!("{:0width$}", year, width = run));
                }
            }
            'M' => match run {
                1 => out.push_str(&t.month.to_string()),
                2 => out.push_str(&format!("{:02}", t.month)),
                _ => {
                    if english {
                        out.push_str(MONTHS_EN[(t.month - 1) as usize]);
                    } else {
                        out.push_str(&format!("{}月", t.month));
                    }
                }
            },
            'd' => push_number(&mut out, t.day, run),
            'H' => push_number(&mut out, t.hour, run),
            'h' => {
                let h = if t.hour % 12 == 0 { 12 } else { t.hour % 12 };
                push_number(&mut out, h, run)
            }
            'm' => push_number(&mut out, t.minute, run),
            's' => push_number(&mut out, t.second, run),
            'a' => out.push_str(match (t.hour < 12, english) {
                (true, true) => "AM",
                (false, true) => "PM",
                (true, false) => "午前",
                (false, false) => "午後",
            }),
            'E' => {
                let w = t.weekday as usize;
                if english {
                    out.push_str(if run >= 4 { WEEKDAYS_EN_FULL[w] } else { WEEKDAYS_EN[w] });
                } else {
                    out.push_str(WEEKDAYS_JA[w]);
                    if run >= 4 {
                        out.push_str("曜日");
                    }
                }
            }
            _ => {
                for _ in 0..run {
                    out.push(c);
                }
            }
        }
        i += run;
    }
    out
}

fn japanese_era_name(t: &LocalTime) -> &'static str {
    japanese_era(t).0
}

fn push_number(out: &mut String, n: u32, run: usize) {
    if run >= 2 {
        out.push_str(&format!("{:02}", n));
    } else {
        out.push_str(&n.to_string());
    }
}

fn render_random(kind: &str, value: &str, seed: u64) -> String {
    let parts: Vec<&str> = value.split(',').collect();
    match kind {
        "int" => {
            let (Some(lo), Some(hi)) = (
                parts.first().and_then(|s| s.trim().parse::<i64>().ok()),
                parts.get(1).and_then(|s| s.trim().parse::<i64>().ok()),
            ) else {
                return value.to_string();
            };
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            let span = (hi - lo + 1) as u64;
            (lo + (seed % span) as i64).to_string()
        }
        "double" => {
            let (Some(lo), Some(hi)) = (
                parts.first().and_then(|s| s.trim().parse::<f64>().ok()),
                parts.get(1).and_then(|s| s.trim().parse::<f64>().ok()),
            ) else {
                return value.to_string();
            };
            let unit = (seed >> 11) as f64 / (1u64 << 53) as f64;
            (lo + (hi - lo) * unit).to_string()
        }
        "string" => {
            if parts.is_empty() {
                return String::new();
            }
            parts[(seed % parts.len() as u64) as usize].to_string()
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn local_time_uses_jst() {
        // 2024-01-01T15:00:00Z is 2024-01-02 00:00 in Japan
        let t = LocalTime::from_unix(1_704_121_200);
        assert_eq!((t.year, t.month, t.day, t.hour), (2024, 1, 2, 0));
        // Tuesday
        assert_eq!(t.weekday, 2);
    }

    #[test]
    fn formats_western_and_era() {
        let t = LocalTime::from_unix(1_704_121_200);
        assert_eq!(format_date("yyyy/MM/dd", &t, false, false), "2024/01/02");
        assert_eq!(format_date("Gy年M月d日(E)", &t, true, false), "令和6年1月2日(火)");
        assert_eq!(format_date("EEEE, MMM d", &t, false, true), "Tuesday, Jan 2");
        assert_eq!(format_date("H:mm", &t, false, false), "0:00");
    }

    #[test]
    fn era_years_follow_the_era_start() {
        let heisei = LocalTime::from_unix(1_527_778_800);
        assert_eq!(format_date("Gy", &heisei, true, false), "平成30");
        assert_eq!(format_date("yyyy", &heisei, true, false), "0030");
        assert_eq!(format_date("yyyy", &heisei, false, false), "2018");
        let last_heisei = LocalTime::from_unix(1_556_550_000);
        assert_eq!(format_date("Gy", &last_heisei, true, false), "平成31");
        let first_reiwa = LocalTime::from_unix(1_556_636_400);
        assert_eq!(format_date("Gy年", &first_reiwa, true, false), "令和1年");
    }

    #[test]
    fn random_values_stay_in_range() {
        for seed in [0u64, 1, 5, 99, u64::MAX] {
            let v: i64 = render_random("int", "1,6", seed).parse().expect("int");
            assert!((1..=6).contains(&v));
            let d: f64 = render_random("double", "0,1", seed).parse().expect("double");
            assert!((0.0..=1.0).contains(&d));
        }
        assert_eq!(render_random("string", "a,b", 1), "b");
    }

    #[test]
    fn expand_replaces_templates() {
        assert_eq!(expand("plain"), "plain");
        let out = expand(r#"<random type="string" value="x">"#);
        assert_eq!(out, "x");
        let date = expand(
            r#"<date format="yyyy" type="western" language="ja_JP" delta="0" deltaunit="1">"#,
        );
        assert_eq!(date.len(), 4);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
    }
}
