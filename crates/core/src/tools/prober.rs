//! Media inspection via an external probe tool.
//!
//! The tool is called with a single path and prints whitespace separated
//! `key=value` tokens, e.g. the output of
//! `ffprobe -v error -select_streams v:0 -show_entries stream=width,height,avg_frame_rate:stream_tags=rotate:format=duration -of default=nw=1`.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::config::ToolCommand;
use super::error::ToolError;
use super::runner::{run_checked, ToolInvocation, ToolRunner};
use crate::geometry::Resolution;

const TOOL: &str = "probe";

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)([A-Za-z_][A-Za-z0-9_:]*)=(\S*)").expect("token pattern is valid")
});

/// Attributes read from a media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Geometry as stored in the container, before rotation.
    pub stored: Resolution,
    /// Rotation tag in degrees, 0 when absent.
    pub rotation: i32,
    pub duration_secs: f64,
    pub frame_rate: f64,
}

impl MediaProbe {
    /// Geometry as displayed.
    pub fn resolution(&self) -> Resolution {
        self.stored.rotated(self.rotation)
    }
}

/// First value for `key` among the tokens.
fn first_value<'a>(tokens: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    tokens.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn required<'a>(tokens: &[(&'a str, &'a str)], key: &str) -> Result<&'a str, ToolError> {
    first_value(tokens, key).ok_or_else(|| ToolError::parse(TOOL, format!("missing {}", key)))
}

fn parse_dimension(tokens: &[(&str, &str)], key: &str) -> Result<u32, ToolError> {
    let raw = required(tokens, key)?;
    match raw.parse::<u32>() {
        Ok(0) => Err(ToolError::parse(TOOL, format!("{} is zero", key))),
        Ok(v) => Ok(v),
        Err(_) => Err(ToolError::parse(TOOL, format!("{}={} is not a number", key, raw))),
    }
}

/// Parses `num/den` (or a plain number) into frames per second.
fn parse_frame_rate(raw: &str) -> Result<f64, ToolError> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().map_err(|_| bad_rate(raw))?;
            let den: f64 = den.parse().map_err(|_| bad_rate(raw))?;
            if den == 0.0 {
                return Err(bad_rate(raw));
            }
            num / den
        }
        None => raw.parse().map_err(|_| bad_rate(raw))?,
    };
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(bad_rate(raw))
    }
}

fn bad_rate(raw: &str) -> ToolError {
    ToolError::parse(TOOL, format!("avg_frame_rate={} is not a usable rate", raw))
}

/// Parses captured probe output. The first token for each key wins.
pub fn parse_probe_output(output: &str) -> Result<MediaProbe, ToolError> {
    let tokens: Vec<(&str, &str)> = TOKEN
        .captures_iter(output)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    let width = parse_dimension(&tokens, "width")?;
    let height = parse_dimension(&tokens, "height")?;

    let raw_duration = required(&tokens, "duration")?;
    let duration_secs: f64 = raw_duration
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ToolError::parse(TOOL, format!("duration={} is not a number", raw_duration)))?;

    let frame_rate = parse_frame_rate(required(&tokens, "avg_frame_rate")?)?;

    // Older containers carry a rotate tag, newer ffprobe prints display matrix rotation.
    let rotation = first_value(&tokens, "TAG:rotate")
        .or_else(|| first_value(&tokens, "rotation"))
        .and_then(|r| r.parse::<f64>().ok())
        .map(|r| r.round() as i32)
        .unwrap_or(0);

    Ok(MediaProbe {
        stored: Resolution::new(width, height),
        rotation,
        duration_secs,
        frame_rate,
    })
}

/// Runs the probe tool and parses its output.
#[derive(Clone)]
pub struct MediaProber {
    runner: Arc<dyn ToolRunner>,
    command: ToolCommand,
}

impl MediaProber {
    pub fn new(runner: Arc<dyn ToolRunner>, command: ToolCommand) -> Self {
        Self { runner, command }
    }

    pub async fn probe(&self, path: &Path) -> Result<MediaProbe, ToolError> {
        let invocation = ToolInvocation::new(
            TOOL,
            &self.command,
            vec![path.to_string_lossy().to_string()],
        );
        let output = run_checked(self.runner.as_ref(), &invocation).await?;
        parse_probe_output(&output.stdout())
    }
}
