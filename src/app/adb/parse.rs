use std::sync::OnceLock;

use regex::Regex;

fn focus_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:mCurrentFocus|mFocusedApp|mTopFullscreenOpaqueWindowState)=.*?\s([A-Za-z][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)+)/",
        )
        .ok()
    })
    .as_ref()
}

/// Serials of attached devices in the `device` state from `adb devices`.
pub fn parse_ready_serials(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let serial = tokens.next()?;
            let state = tokens.next()?;
            (state == "device").then(|| serial.to_string())
        })
        .collect()
}

/// Packages named by the focus lines of `dumpsys window`
/// (`mCurrentFocus`, `mFocusedApp`, `mTopFullscreenOpaqueWindowState`).
pub fn parse_focused_packages(output: &str) -> Vec<String> {
    let Some(focus_re) = focus_regex() else {
        return Vec::new();
    };
    let mut packages: Vec<String> = Vec::new();
    for line in output.lines() {
        if let Some(caps) = focus_re.captures(line) {
            let package = caps[1].to_string();
            if !packages.contains(&package) {
                packages.push(package);
            }
        }
    }
    packages
}

/// Display size from `wm size`; an override size wins over the physical one.
pub fn parse_wm_size(output: &str) -> Option<(i32, i32)> {
    let mut physical = None;
    let mut override_size = None;
    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let Some((width, height)) = value.trim().split_once('x') else {
            continue;
        };
        let (Ok(width), Ok(height)) = (width.trim().parse::<i32>(), height.trim().parse::<i32>())
        else {
            continue;
        };
        if label.trim().eq_ignore_ascii_case("override size") {
            override_size = Some((width, height));
        } else if label.trim().eq_ignore_ascii_case("physical size") {
            physical = Some((width, height));
        }
    }
    override_size.or(physical)
}
